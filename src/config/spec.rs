//! Configuration specification types for the deployment system.
//!
//! The configuration file maps git branch names to deployment settings, so
//! each branch deploys to its own stack.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::planner::{ParameterMap, StackContext};

/// The root configuration: branch name to branch settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct SampicConfig {
    /// Settings per git branch.
    pub branches: BTreeMap<String, BranchConfig>,
}

/// Deployment settings of one git branch.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BranchConfig {
    /// AWS region.
    #[serde(default)]
    pub region: String,
    /// Named AWS profile.
    #[serde(default)]
    pub profile: Option<String>,
    /// Stack name, unless `stacks` is used.
    #[serde(default)]
    pub stack_name: Option<String>,
    /// Template path, unless `stacks` is used.
    #[serde(default)]
    pub template: Option<PathBuf>,
    /// Artifact bucket; defaults to `<stackName>-build-artifacts`.
    #[serde(default)]
    pub s3_bucket: Option<String>,
    /// Capabilities acknowledged on stack operations.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Desired stack parameters.
    #[serde(default, deserialize_with = "deserialize_parameters")]
    pub stack_parameters: Option<ParameterMap>,
    /// Alternative stacks selectable with `--stack`.
    #[serde(default)]
    pub stacks: Option<BTreeMap<String, StackEntry>>,
}

/// One selectable stack of a branch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StackEntry {
    /// Stack name.
    pub name: String,
    /// Template path.
    pub template: PathBuf,
    /// Desired stack parameters.
    #[serde(default, deserialize_with = "deserialize_parameters")]
    pub parameters: Option<ParameterMap>,
}

/// Fully resolved settings of one deployment.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DeployTarget {
    /// Git branch the settings were selected for.
    pub branch: String,
    /// Selected stack key, when the branch lists several stacks.
    pub stack_key: Option<String>,
    /// Stack name.
    pub stack_name: String,
    /// AWS region.
    pub region: String,
    /// Named AWS profile.
    pub profile: Option<String>,
    /// Source template path.
    pub template: PathBuf,
    /// Artifact bucket.
    pub s3_bucket: String,
    /// Capabilities acknowledged on stack operations.
    pub capabilities: Vec<String>,
    /// Desired stack parameters.
    pub parameters: ParameterMap,
    /// Directory holding local state for this project.
    pub state_dir: PathBuf,
    /// Where the packaged template is written.
    pub packaged_template: PathBuf,
    /// Where the last deployed template is kept.
    pub deployed_template: PathBuf,
}

impl DeployTarget {
    /// Stack-level settings for execution.
    #[must_use]
    pub fn stack_context(&self) -> StackContext {
        StackContext {
            stack_name: self.stack_name.clone(),
            capabilities: self.capabilities.clone(),
        }
    }
}

/// Reads a parameter map whose values may be any YAML scalar.
fn deserialize_parameters<'de, D>(deserializer: D) -> Result<Option<ParameterMap>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, serde_yaml::Value>> = Option::deserialize(deserializer)?;
    let Some(raw) = raw else {
        return Ok(None);
    };

    let mut parameters = ParameterMap::new();
    for (key, value) in raw {
        let Some(rendered) = scalar_to_string(&value) else {
            return Err(D::Error::custom(format!(
                "stack parameter '{key}' must be a string, number or boolean"
            )));
        };
        parameters.insert(key, rendered);
    }
    Ok(Some(parameters))
}

fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
