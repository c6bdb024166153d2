//! Local file-based snapshot storage backend.
//!
//! The applied template is kept as YAML and the deployment state as JSON,
//! both next to the configuration file.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::config::DeployTarget;
use crate::error::{Result, SampicError, StateError};
use crate::template::Template;

use super::store::SnapshotStore;
use super::types::{DeploymentHistoryEntry, DeploymentState};

/// Suffix of the deployed template file name.
const TEMPLATE_SUFFIX: &str = "deployed-template.yaml";

/// Suffix of the state file name.
const STATE_SUFFIX: &str = "state.json";

/// Local file-based snapshot store for one stack.
#[derive(Debug)]
pub struct LocalSnapshotStore {
    /// Stack the snapshot belongs to.
    stack_name: String,
    /// Path to the deployed template.
    template_path: PathBuf,
    /// Path to the state file.
    state_path: PathBuf,
}

impl LocalSnapshotStore {
    /// Creates a store for `stack_name` inside `dir`.
    #[must_use]
    pub fn for_stack(dir: impl AsRef<Path>, stack_name: &str) -> Self {
        let dir = dir.as_ref();
        Self {
            stack_name: stack_name.to_string(),
            template_path: dir.join(format!("{stack_name}-{TEMPLATE_SUFFIX}")),
            state_path: dir.join(format!("{stack_name}-{STATE_SUFFIX}")),
        }
    }

    /// Creates a store at the paths derived for a deploy target.
    #[must_use]
    pub fn for_target(target: &DeployTarget) -> Self {
        Self {
            stack_name: target.stack_name.clone(),
            template_path: target.deployed_template.clone(),
            state_path: target
                .state_dir
                .join(format!("{}-{STATE_SUFFIX}", target.stack_name)),
        }
    }

    /// Path of the deployed template.
    #[must_use]
    pub fn template_path(&self) -> &Path {
        &self.template_path
    }

    /// Writes `content` through a temporary file and a rename.
    async fn write_atomic(path: &Path, content: &str) -> Result<()> {
        let missing_parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty() && !p.exists());
        if let Some(parent) = missing_parent {
            debug!("Creating state directory: {}", parent.display());
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StateError::write(format!("Failed to create state directory: {e}")))?;
        }

        let temp_path = path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| StateError::write(format!("Failed to create temp file: {e}")))?;

        file.write_all(content.as_bytes())
            .await
            .map_err(|e| StateError::write(format!("Failed to write {}: {e}", path.display())))?;

        file.sync_all()
            .await
            .map_err(|e| StateError::write(format!("Failed to sync {}: {e}", path.display())))?;

        fs::rename(&temp_path, path)
            .await
            .map_err(|e| StateError::write(format!("Failed to rename {}: {e}", path.display())))?;

        Ok(())
    }

    async fn read_optional(path: &Path) -> Result<Option<String>> {
        if !path.exists() {
            debug!("Snapshot file does not exist: {}", path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            SampicError::State(StateError::Corrupted {
                message: format!("Failed to read {}: {e}", path.display()),
            })
        })?;
        Ok(Some(content))
    }
}

#[async_trait]
impl SnapshotStore for LocalSnapshotStore {
    async fn load_template(&self) -> Result<Option<Template>> {
        let Some(content) = Self::read_optional(&self.template_path).await? else {
            return Ok(None);
        };

        info!("Loading deployed template from: {}", self.template_path.display());

        let template = Template::from_yaml_str(&content).map_err(|e| {
            SampicError::State(StateError::Corrupted {
                message: format!("Deployed template {}: {e}", self.template_path.display()),
            })
        })?;
        Ok(Some(template))
    }

    async fn load_state(&self) -> Result<Option<DeploymentState>> {
        let Some(content) = Self::read_optional(&self.state_path).await? else {
            return Ok(None);
        };

        let state: DeploymentState = serde_json::from_str(&content).map_err(|e| {
            SampicError::State(StateError::Corrupted {
                message: format!("Failed to parse state file: {e}"),
            })
        })?;
        Ok(Some(state))
    }

    async fn save(
        &self,
        template: &Template,
        entry: DeploymentHistoryEntry,
    ) -> Result<DeploymentState> {
        info!("Saving deployed template to: {}", self.template_path.display());
        Self::write_atomic(&self.template_path, &template.to_yaml_string()?).await?;

        let mut state = self
            .load_state()
            .await?
            .unwrap_or_else(|| DeploymentState::new(&self.stack_name));
        state.record(entry);

        let content = serde_json::to_string_pretty(&state)
            .map_err(|e| StateError::serialization(format!("Failed to serialize state: {e}")))?;
        Self::write_atomic(&self.state_path, &content).await?;

        debug!("Snapshot saved successfully");
        Ok(state)
    }

    fn backend_type(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::UpdateDecision;
    use tempfile::TempDir;

    const TEMPLATE: &str = r"
Parameters:
  Stage:
    Type: String
Resources:
  ApiFunction:
    Type: AWS::Serverless::Function
    Properties:
      CodeUri: s3://artifacts/api.zip
      Role: !GetAtt ApiRole.Arn
";

    fn create_test_store() -> (LocalSnapshotStore, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = LocalSnapshotStore::for_stack(temp_dir.path().join(".sampic"), "api-prod");
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_load_nonexistent() {
        let (store, _temp) = create_test_store();

        assert!(store.load_template().await.expect("load").is_none());
        assert!(store.load_state().await.expect("load").is_none());
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let (store, _temp) = create_test_store();
        let template = Template::from_yaml_str(TEMPLATE).expect("template");

        let state = store
            .save(
                &template,
                DeploymentHistoryEntry::succeeded(UpdateDecision::FullCreate, "d1", Vec::new()),
            )
            .await
            .expect("save");
        assert_eq!(state.history.len(), 1);

        let loaded = store
            .load_template()
            .await
            .expect("load")
            .expect("template should exist");
        assert_eq!(loaded, template);
        assert!(store.template_path().ends_with("api-prod-deployed-template.yaml"));

        store
            .save(
                &template,
                DeploymentHistoryEntry::succeeded(UpdateDecision::ParametersOnly, "d2", Vec::new()),
            )
            .await
            .expect("second save");

        let state = store.load_state().await.expect("load").expect("state");
        assert_eq!(state.stack_name, "api-prod");
        assert_eq!(state.history.len(), 2);
        assert_eq!(state.last_decision, Some(UpdateDecision::ParametersOnly));
        assert_eq!(state.template_digest, "d2");
    }

    #[tokio::test]
    async fn test_corrupted_state_reported() {
        let (store, temp) = create_test_store();
        std::fs::create_dir_all(temp.path().join(".sampic")).expect("dir");
        std::fs::write(temp.path().join(".sampic/api-prod-state.json"), "{not json").expect("write");

        let err = store.load_state().await.expect_err("corrupted");
        assert!(matches!(err, SampicError::State(StateError::Corrupted { .. })));
    }

    #[test]
    fn test_backend_type() {
        let (store, _temp) = create_test_store();
        assert_eq!(store.backend_type(), "local");
    }
}
