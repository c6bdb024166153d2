//! Snapshot store trait definition.
//!
//! This module defines the common interface for deployed-template storage.

use async_trait::async_trait;

use super::types::{DeploymentHistoryEntry, DeploymentState};
use crate::error::Result;
use crate::template::Template;

/// Trait for storage of the last applied template and its history.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Loads the last applied template.
    ///
    /// Returns `None` if nothing was deployed from this machine yet.
    async fn load_template(&self) -> Result<Option<Template>>;

    /// Loads the recorded deployment state.
    async fn load_state(&self) -> Result<Option<DeploymentState>>;

    /// Saves the applied template and appends a history entry.
    ///
    /// Returns the updated state.
    async fn save(&self, template: &Template, entry: DeploymentHistoryEntry)
        -> Result<DeploymentState>;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}
