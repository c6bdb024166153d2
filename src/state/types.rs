//! State types for tracking deployment history.
//!
//! These types record what the last successful deployment applied, next to
//! the template snapshot itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::planner::UpdateDecision;

/// Current version of the state format.
pub const STATE_VERSION: &str = "1.0";

/// Number of history entries kept.
pub const MAX_HISTORY: usize = 20;

/// The recorded state of one stack.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeploymentState {
    /// State format version.
    pub version: String,
    /// Stack name.
    pub stack_name: String,
    /// Decision of the last recorded deployment.
    #[serde(default)]
    pub last_decision: Option<UpdateDecision>,
    /// Digest of the last applied template.
    pub template_digest: String,
    /// When the state was last updated.
    pub last_updated: DateTime<Utc>,
    /// Deployment history, oldest first.
    #[serde(default)]
    pub history: Vec<DeploymentHistoryEntry>,
}

/// A single entry in the deployment history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeploymentHistoryEntry {
    /// When the deployment occurred.
    pub timestamp: DateTime<Utc>,
    /// Update strategy that was applied.
    pub decision: UpdateDecision,
    /// Digest of the applied template.
    pub template_digest: String,
    /// Logical ids of the resources that changed.
    pub resources: Vec<String>,
    /// Whether the deployment succeeded.
    pub success: bool,
}

impl DeploymentState {
    /// Creates a new empty state for a stack.
    #[must_use]
    pub fn new(stack_name: &str) -> Self {
        Self {
            version: STATE_VERSION.to_string(),
            stack_name: stack_name.to_string(),
            last_decision: None,
            template_digest: String::new(),
            last_updated: Utc::now(),
            history: Vec::new(),
        }
    }

    /// Records a deployment and drops the oldest entries past the limit.
    pub fn record(&mut self, entry: DeploymentHistoryEntry) {
        self.last_decision = Some(entry.decision);
        self.template_digest.clone_from(&entry.template_digest);
        self.last_updated = entry.timestamp;

        self.history.push(entry);
        if self.history.len() > MAX_HISTORY {
            let excess = self.history.len() - MAX_HISTORY;
            self.history.drain(..excess);
        }
    }

    /// Most recent history entry.
    #[must_use]
    pub fn latest(&self) -> Option<&DeploymentHistoryEntry> {
        self.history.last()
    }
}

impl DeploymentHistoryEntry {
    /// Creates a successful history entry stamped now.
    #[must_use]
    pub fn succeeded(decision: UpdateDecision, template_digest: &str, resources: Vec<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            decision,
            template_digest: template_digest.to_string(),
            resources,
            success: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_updates_summary() {
        let mut state = DeploymentState::new("api-prod");
        state.record(DeploymentHistoryEntry::succeeded(
            UpdateDecision::FunctionCodeOnly,
            "abc",
            vec![String::from("ApiFunction")],
        ));

        assert_eq!(state.last_decision, Some(UpdateDecision::FunctionCodeOnly));
        assert_eq!(state.template_digest, "abc");
        assert_eq!(state.latest().map(|e| e.resources.len()), Some(1));
    }

    #[test]
    fn test_history_is_bounded() {
        let mut state = DeploymentState::new("api-prod");
        for i in 0..(MAX_HISTORY + 5) {
            state.record(DeploymentHistoryEntry::succeeded(
                UpdateDecision::FullUpdate,
                &format!("digest-{i}"),
                Vec::new(),
            ));
        }

        assert_eq!(state.history.len(), MAX_HISTORY);
        assert_eq!(state.history[0].template_digest, "digest-5");
        assert_eq!(
            state.latest().map(|e| e.template_digest.as_str()),
            Some(format!("digest-{}", MAX_HISTORY + 4).as_str())
        );
    }

    #[test]
    fn test_state_json_uses_snake_case_decision() {
        let mut state = DeploymentState::new("api-prod");
        state.record(DeploymentHistoryEntry::succeeded(
            UpdateDecision::ParametersOnly,
            "abc",
            Vec::new(),
        ));

        let json = serde_json::to_string(&state).expect("serialize");
        assert!(json.contains("\"parameters_only\""));

        let back: DeploymentState = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, state);
    }
}
