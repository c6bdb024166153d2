//! State management module for the deployment system.
//!
//! This module keeps the last applied template of each stack together with
//! a bounded deployment history.

mod local;
mod store;
mod types;

pub use local::LocalSnapshotStore;
pub use store::SnapshotStore;
pub use types::{DeploymentHistoryEntry, DeploymentState, MAX_HISTORY, STATE_VERSION};
