//! Packaging of local sources into a deployable template.
//!
//! Packaging is delegated to the `aws cloudformation package` command, which
//! uploads code artifacts and rewrites their locations in the template. The
//! rewritten template is then uploaded so full applies can reference it by URL.

use async_trait::async_trait;
use aws_config::SdkConfig;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::DeployTarget;
use crate::error::{RemoteError, Result};

use super::types::CodeLocation;

/// Key prefix of uploaded templates.
const TEMPLATE_PREFIX: &str = "templates";

/// Profile name the CLI picks up without an explicit flag.
const DEFAULT_PROFILE: &str = "default";

/// A packaged template ready for deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagedTemplate {
    /// Local path of the packaged template.
    pub path: PathBuf,
    /// Where the packaged template was uploaded.
    pub location: CodeLocation,
}

/// Turns the configured template into a packaged, uploaded template.
#[async_trait]
pub trait Packager: Send + Sync {
    /// Packages and uploads the template of a deploy target.
    async fn package(&self, target: &DeployTarget) -> Result<PackagedTemplate>;
}

/// Packager using the AWS CLI and an S3 upload.
#[derive(Debug, Clone)]
pub struct AwsCliPackager {
    /// S3 client for the template upload.
    s3: aws_sdk_s3::Client,
    /// Executable name of the AWS CLI.
    program: String,
}

impl AwsCliPackager {
    /// Creates a packager from shared SDK configuration.
    #[must_use]
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            s3: aws_sdk_s3::Client::new(config),
            program: String::from("aws"),
        }
    }

    /// Uses a different AWS CLI executable.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Runs `cloudformation package` for the target.
    async fn run_package(&self, target: &DeployTarget) -> Result<()> {
        let args = package_args(target);
        let rendered = format!("{} {}", self.program, args.join(" "));
        info!("Packaging {}", target.template.display());
        debug!("Running: {rendered}");

        let output = Command::new(&self.program)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await?;

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            let line = line.trim();
            if !line.is_empty() {
                debug!("{line}");
            }
        }

        if !output.status.success() {
            return Err(RemoteError::Command {
                command: rendered,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Uploads the packaged template.
    async fn upload(&self, path: &Path, bucket: &str) -> Result<CodeLocation> {
        let body = tokio::fs::read(path).await?;
        let location = CodeLocation::new(bucket, upload_key(path, &timestamp_digits()));

        info!("Uploading packaged template to {location}");

        self.s3
            .put_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .body(body.into())
            .content_type("application/x-yaml")
            .send()
            .await
            .map_err(|e| RemoteError::storage("PutObject", e.into_service_error().to_string()))?;

        Ok(location)
    }
}

#[async_trait]
impl Packager for AwsCliPackager {
    async fn package(&self, target: &DeployTarget) -> Result<PackagedTemplate> {
        if let Some(parent) = target.packaged_template.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        self.run_package(target).await?;
        let location = self.upload(&target.packaged_template, &target.s3_bucket).await?;

        Ok(PackagedTemplate {
            path: target.packaged_template.clone(),
            location,
        })
    }
}

/// Builds the argument list of the package command.
fn package_args(target: &DeployTarget) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(profile) = target.profile.as_deref().filter(|p| *p != DEFAULT_PROFILE) {
        args.push(String::from("--profile"));
        args.push(profile.to_string());
    }
    args.extend([
        String::from("--region"),
        target.region.clone(),
        String::from("cloudformation"),
        String::from("package"),
        String::from("--template-file"),
        target.template.display().to_string(),
        String::from("--s3-bucket"),
        target.s3_bucket.clone(),
        String::from("--output-template-file"),
        target.packaged_template.display().to_string(),
    ]);
    args
}

/// Current UTC time as a sortable run of digits.
fn timestamp_digits() -> String {
    Utc::now().format("%Y%m%d%H%M%S%3f").to_string()
}

/// Object key of an uploaded template.
fn upload_key(path: &Path, stamp: &str) -> String {
    let name = path
        .file_name()
        .map_or_else(|| String::from("template.yaml"), |n| n.to_string_lossy().into_owned());
    format!("{TEMPLATE_PREFIX}/{stamp}-{name}")
}
