//! Types exchanged with the remote deployment service.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Result, TemplateError};

/// URI scheme of code artifact locations.
const S3_SCHEME: &str = "s3://";

/// Live description of a stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackDescription {
    /// Stack name.
    pub stack_name: String,
    /// Stack identifier (ARN).
    pub stack_id: Option<String>,
    /// Current stack status, e.g. `UPDATE_COMPLETE`.
    pub status: String,
    /// Reason attached to the current status.
    pub status_reason: Option<String>,
    /// Current parameter values keyed by parameter name.
    pub parameters: BTreeMap<String, String>,
}

/// One resource of a live stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackResourceSummary {
    /// Logical identifier from the template.
    pub logical_id: String,
    /// Physical identifier, absent while the resource is being created.
    pub physical_id: Option<String>,
    /// Resource type tag.
    pub resource_type: String,
}

/// One page of a stack resource listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourcePage {
    /// Resources on this page.
    pub resources: Vec<StackResourceSummary>,
    /// Token for the next page, if any.
    pub next_token: Option<String>,
}

/// Where the stack service reads a template from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateSource {
    /// Inline template body.
    Body(String),
    /// HTTPS URL of an uploaded template.
    Url(String),
}

/// Value supplied for a stack parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterSetting {
    /// Explicit new value.
    Value(String),
    /// Keep the value currently applied to the stack.
    UsePrevious,
}

/// A parameter entry of a stack request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackParameter {
    /// Parameter name.
    pub key: String,
    /// Value or carry-forward marker.
    pub setting: ParameterSetting,
}

/// Whether a full apply creates or updates the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StackOperationKind {
    /// Create a new stack.
    Create,
    /// Update an existing stack.
    Update,
}

/// Request applying a whole template to a stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackApplyRequest {
    /// Stack name.
    pub stack_name: String,
    /// Create or update.
    pub kind: StackOperationKind,
    /// Template to apply.
    pub template: TemplateSource,
    /// Acknowledged capabilities, e.g. `CAPABILITY_IAM`.
    pub capabilities: Vec<String>,
    /// Parameter overrides.
    pub parameters: Vec<StackParameter>,
    /// Idempotency token; re-issuing the same request is safe.
    pub client_request_token: String,
}

/// Request updating only the parameters of a stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterUpdateRequest {
    /// Stack name.
    pub stack_name: String,
    /// Acknowledged capabilities.
    pub capabilities: Vec<String>,
    /// One entry per declared parameter.
    pub parameters: Vec<StackParameter>,
    /// Idempotency token.
    pub client_request_token: String,
}

/// Response to a stack-mutating request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackChange {
    /// The service accepted the change and is applying it.
    Started {
        /// Stack identifier to poll.
        stack_id: String,
    },
    /// The service reported nothing to update.
    NoUpdates,
}

/// Location of a deployable code artifact in object storage.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CodeLocation {
    /// Bucket name.
    pub bucket: String,
    /// Object key.
    pub key: String,
}

impl CodeLocation {
    /// Creates a location from bucket and key.
    #[must_use]
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Parses an `s3://bucket/key` URI.
    ///
    /// The bucket ends at the first `/`; everything after it is the key.
    #[must_use]
    pub fn parse(uri: &str) -> Option<Self> {
        let rest = uri.strip_prefix(S3_SCHEME)?;
        let (bucket, key) = rest.split_once('/')?;
        if bucket.is_empty() || key.is_empty() {
            return None;
        }
        Some(Self::new(bucket, key))
    }

    /// Extracts a location from a template value.
    ///
    /// # Errors
    ///
    /// Returns an input error if the value is not a string `s3://bucket/key` URI.
    pub fn from_template_value(logical_id: &str, value: &Value) -> Result<Self> {
        value.as_str().and_then(Self::parse).ok_or_else(|| {
            TemplateError::InvalidCodeLocation {
                logical_id: logical_id.to_string(),
                value: render_value(value),
            }
            .into()
        })
    }

    /// Returns the HTTPS URL of the object in the given region.
    #[must_use]
    pub fn https_url(&self, region: &str) -> String {
        format!("https://{}.s3.{region}.amazonaws.com/{}", self.bucket, self.key)
    }
}

impl fmt::Display for CodeLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{S3_SCHEME}{}/{}", self.bucket, self.key)
    }
}

/// Renders a template value on a single line for error messages.
fn render_value(value: &Value) -> String {
    serde_yaml::to_string(value)
        .map(|s| s.trim().replace('\n', " "))
        .unwrap_or_else(|_| format!("{value:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bucket_and_key() {
        let location = CodeLocation::parse("s3://b/new.zip").expect("valid uri");
        assert_eq!(location.bucket, "b");
        assert_eq!(location.key, "new.zip");
    }

    #[test]
    fn test_key_keeps_nested_prefixes() {
        let location = CodeLocation::parse("s3://artifacts/api/3f9c2a.zip").expect("valid uri");
        assert_eq!(location.bucket, "artifacts");
        assert_eq!(location.key, "api/3f9c2a.zip");
        assert_eq!(location.to_string(), "s3://artifacts/api/3f9c2a.zip");
    }

    #[test]
    fn test_rejects_malformed_uris() {
        assert!(CodeLocation::parse("https://b/key.zip").is_none());
        assert!(CodeLocation::parse("s3://bucket-only").is_none());
        assert!(CodeLocation::parse("s3://bucket/").is_none());
        assert!(CodeLocation::parse("s3:///key.zip").is_none());
        assert!(CodeLocation::parse("./src").is_none());
    }

    #[test]
    fn test_non_string_value_is_input_error() {
        let value: Value = serde_yaml::from_str("{Bucket: b, Key: k}").expect("yaml");
        let err = CodeLocation::from_template_value("Fn", &value).expect_err("mapping is not a uri");
        assert!(err.to_string().contains("Fn"));
    }

    #[test]
    fn test_https_url() {
        let location = CodeLocation::new("deploy-bucket", "templates/20240101-template.yaml");
        assert_eq!(
            location.https_url("eu-west-1"),
            "https://deploy-bucket.s3.eu-west-1.amazonaws.com/templates/20240101-template.yaml"
        );
    }
}
