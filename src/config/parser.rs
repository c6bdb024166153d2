//! Configuration parser for loading and resolving configuration files.
//!
//! This module loads the branch-keyed configuration, selects the settings
//! for one branch and stack, and applies environment variable overrides.

use crate::error::{ConfigError, Result, SampicError};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::{DeployTarget, SampicConfig};

/// Directory holding configuration and local state.
pub const DEFAULT_CONFIG_DIR: &str = ".sampic";

/// Configuration file locations, relative to the project root, in search order.
pub const DEFAULT_CONFIG_FILES: &[&str] = &[
    ".sampic/config.yaml",
    ".sampic/config.yml",
    ".sampic/config.json",
    ".sampique/config.json",
];

/// Suffix of the packaged template file name.
const PACKAGED_TEMPLATE_SUFFIX: &str = "packaged-template.yaml";

/// Suffix of the deployed template file name.
const DEPLOYED_TEMPLATE_SUFFIX: &str = "deployed-template.yaml";

/// Environment variables overriding resolved settings.
const ENV_REGION: &str = "SAMPIC_REGION";
const ENV_PROFILE: &str = "SAMPIC_PROFILE";
const ENV_S3_BUCKET: &str = "SAMPIC_S3_BUCKET";
const ENV_STACK_NAME: &str = "SAMPIC_STACK_NAME";

/// Configuration parser for loading deployment configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving relative paths.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML or JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<SampicConfig> {
        let path = self.resolve(path.as_ref());
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(SampicError::Config(ConfigError::FileNotFound { path }));
        }

        let content = std::fs::read_to_string(&path).map_err(|e| {
            SampicError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        Self::parse_yaml(&content).map_err(|e| match e {
            SampicError::Config(ConfigError::ParseError { message, .. }) => {
                SampicError::Config(ConfigError::ParseError {
                    message,
                    location: Some(path.display().to_string()),
                })
            }
            other => other,
        })
    }

    /// Parses configuration from YAML or JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is invalid.
    pub fn parse_yaml(content: &str) -> Result<SampicConfig> {
        debug!("Parsing configuration");

        let config: SampicConfig = serde_yaml::from_str(content).map_err(|e| {
            SampicError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location: None,
            })
        })?;

        debug!("Configuration lists {} branch(es)", config.branches.len());
        Ok(config)
    }

    /// Selects and resolves the settings of one branch and stack.
    ///
    /// `state_dir` is the directory holding the configuration file; relative
    /// template paths are resolved against its parent.
    ///
    /// # Errors
    ///
    /// Returns an error if the branch or stack is unknown, or if a stack name
    /// or template is missing.
    pub fn resolve_target(
        config: &SampicConfig,
        branch: &str,
        stack_key: Option<&str>,
        state_dir: &Path,
    ) -> Result<DeployTarget> {
        let branch_config =
            config
                .branches
                .get(branch)
                .ok_or_else(|| ConfigError::UnknownBranch {
                    branch: branch.to_string(),
                })?;

        let default_bucket = branch_config
            .stack_name
            .as_ref()
            .map(|name| format!("{name}-build-artifacts"));

        let (selected_key, stack_name, template, parameters) = match &branch_config.stacks {
            Some(stacks) if !stacks.is_empty() => {
                let valid: Vec<String> = stacks.keys().cloned().collect();
                let key = match stack_key {
                    Some(key) => key.to_string(),
                    None if valid.len() == 1 => valid[0].clone(),
                    None => return Err(ConfigError::StackNotSelected { valid }.into()),
                };
                let entry = stacks.get(&key).ok_or_else(|| ConfigError::UnknownStack {
                    key: key.clone(),
                    valid: valid.clone(),
                })?;
                (
                    Some(key),
                    entry.name.clone(),
                    entry.template.clone(),
                    entry.parameters.clone(),
                )
            }
            _ => {
                let stack_name = branch_config.stack_name.clone().ok_or_else(|| {
                    ConfigError::validation("stackName is required", format!("{branch}.stackName"))
                })?;
                let template = branch_config.template.clone().ok_or_else(|| {
                    ConfigError::validation("template is required", format!("{branch}.template"))
                })?;
                (None, stack_name, template, branch_config.stack_parameters.clone())
            }
        };

        let s3_bucket = branch_config
            .s3_bucket
            .clone()
            .filter(|bucket| !bucket.is_empty())
            .or(default_bucket)
            .unwrap_or_else(|| format!("{stack_name}-build-artifacts"));

        let root = state_dir.parent().unwrap_or_else(|| Path::new(""));
        let template = if template.is_relative() {
            root.join(template)
        } else {
            template
        };

        let target = DeployTarget {
            branch: branch.to_string(),
            stack_key: selected_key,
            region: branch_config.region.clone(),
            profile: branch_config.profile.clone(),
            template,
            s3_bucket,
            capabilities: branch_config.capabilities.clone(),
            parameters: parameters.unwrap_or_default(),
            state_dir: state_dir.to_path_buf(),
            packaged_template: state_dir.join(format!("{stack_name}-{PACKAGED_TEMPLATE_SUFFIX}")),
            deployed_template: state_dir.join(format!("{stack_name}-{DEPLOYED_TEMPLATE_SUFFIX}")),
            stack_name,
        };

        debug!(
            "Resolved stack {} in {} for branch {branch}",
            target.stack_name, target.region
        );
        Ok(target)
    }

    /// Applies `SAMPIC_*` environment variable overrides.
    pub fn apply_env_overrides(target: &mut DeployTarget) {
        Self::apply_overrides(target, |name| std::env::var(name).ok());
    }

    /// Applies overrides read through `lookup`.
    ///
    /// Derived file paths follow an overridden stack name.
    pub fn apply_overrides(target: &mut DeployTarget, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(region) = lookup(ENV_REGION) {
            debug!("Overriding region from environment");
            target.region = region;
        }

        if let Some(profile) = lookup(ENV_PROFILE) {
            debug!("Overriding profile from environment");
            target.profile = Some(profile);
        }

        if let Some(bucket) = lookup(ENV_S3_BUCKET) {
            debug!("Overriding s3Bucket from environment");
            target.s3_bucket = bucket;
        }

        if let Some(stack_name) = lookup(ENV_STACK_NAME) {
            debug!("Overriding stackName from environment");
            target.packaged_template = target
                .state_dir
                .join(format!("{stack_name}-{PACKAGED_TEMPLATE_SUFFIX}"));
            target.deployed_template = target
                .state_dir
                .join(format!("{stack_name}-{DEPLOYED_TEMPLATE_SUFFIX}"));
            target.stack_name = stack_name;
        }
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self.resolve(Path::new(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                SampicError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_path {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

/// Finds the configuration file in the given directory or its parents.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(SampicError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CONFIG: &str = r"
main:
  region: eu-west-1
  profile: prod-deployer
  stackName: api-prod
  template: template.yaml
  capabilities: [CAPABILITY_IAM, CAPABILITY_AUTO_EXPAND]
  stackParameters:
    Stage: prod
    MemorySize: 512
    Tracing: true
develop:
  region: eu-west-1
  s3Bucket: shared-artifacts
  capabilities: [CAPABILITY_IAM]
  stacks:
    api:
      name: api-dev
      template: api/template.yaml
      parameters:
        Stage: dev
    worker:
      name: worker-dev
      template: worker/template.yaml
";

    fn config() -> SampicConfig {
        ConfigParser::parse_yaml(CONFIG).expect("config should parse")
    }

    #[test]
    fn test_resolve_single_stack_branch() {
        let target = ConfigParser::resolve_target(&config(), "main", None, Path::new("/repo/.sampic"))
            .expect("target");

        assert_eq!(target.stack_name, "api-prod");
        assert_eq!(target.s3_bucket, "api-prod-build-artifacts");
        assert_eq!(target.template, PathBuf::from("/repo/template.yaml"));
        assert_eq!(
            target.packaged_template,
            PathBuf::from("/repo/.sampic/api-prod-packaged-template.yaml")
        );
        assert_eq!(
            target.deployed_template,
            PathBuf::from("/repo/.sampic/api-prod-deployed-template.yaml")
        );
        assert_eq!(target.parameters.get("MemorySize").map(String::as_str), Some("512"));
        assert_eq!(target.parameters.get("Tracing").map(String::as_str), Some("true"));
    }

    #[test]
    fn test_stack_selection() {
        let config = config();

        let target = ConfigParser::resolve_target(&config, "develop", Some("worker"), Path::new(".sampic"))
            .expect("target");
        assert_eq!(target.stack_name, "worker-dev");
        assert_eq!(target.stack_key.as_deref(), Some("worker"));
        assert_eq!(target.s3_bucket, "shared-artifacts");
        assert!(target.parameters.is_empty());

        let err = ConfigParser::resolve_target(&config, "develop", None, Path::new(".sampic"))
            .expect_err("two stacks need a selection");
        assert!(err.to_string().contains("api, worker"));

        let err = ConfigParser::resolve_target(&config, "develop", Some("batch"), Path::new(".sampic"))
            .expect_err("unknown key");
        assert!(err.to_string().contains("batch"));
    }

    #[test]
    fn test_unknown_branch() {
        let err = ConfigParser::resolve_target(&config(), "feature/x", None, Path::new(".sampic"))
            .expect_err("unknown branch");
        assert!(matches!(
            err,
            SampicError::Config(ConfigError::UnknownBranch { .. })
        ));
    }

    #[test]
    fn test_nested_parameter_values_rejected() {
        let yaml = r"
main:
  region: eu-west-1
  stackName: api
  template: template.yaml
  stackParameters:
    Nested:
      a: b
";
        assert!(ConfigParser::parse_yaml(yaml).is_err());
    }

    #[test]
    fn test_json_config_parses() {
        let json = r#"{"main": {"region": "us-east-1", "stackName": "api", "template": "t.yaml"}}"#;
        let config = ConfigParser::parse_yaml(json).expect("json config");
        assert!(config.branches.contains_key("main"));
    }

    #[test]
    fn test_overrides_rename_derived_paths() {
        let mut target =
            ConfigParser::resolve_target(&config(), "main", None, Path::new(".sampic")).expect("target");

        ConfigParser::apply_overrides(&mut target, |name| match name {
            "SAMPIC_STACK_NAME" => Some(String::from("api-canary")),
            "SAMPIC_REGION" => Some(String::from("us-east-1")),
            _ => None,
        });

        assert_eq!(target.stack_name, "api-canary");
        assert_eq!(target.region, "us-east-1");
        assert_eq!(target.profile.as_deref(), Some("prod-deployer"));
        assert_eq!(
            target.deployed_template,
            PathBuf::from(".sampic/api-canary-deployed-template.yaml")
        );
    }

    #[test]
    fn test_find_config_file_prefers_yaml_and_walks_up() {
        let temp = TempDir::new().expect("temp dir");
        let nested = temp.path().join("services/api");
        std::fs::create_dir_all(&nested).expect("nested dir");
        std::fs::create_dir_all(temp.path().join(".sampique")).expect("legacy dir");
        std::fs::write(temp.path().join(".sampique/config.json"), "{}").expect("legacy config");

        let found = find_config_file(&nested).expect("legacy config found");
        assert!(found.ends_with(".sampique/config.json"));

        std::fs::create_dir_all(temp.path().join(".sampic")).expect("config dir");
        std::fs::write(temp.path().join(".sampic/config.yaml"), "{}").expect("config");

        let found = find_config_file(&nested).expect("config found");
        assert!(found.ends_with(".sampic/config.yaml"));
    }
}
