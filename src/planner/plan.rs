//! Deployment plan types and construction.
//!
//! A plan freezes the outcome of diffing and classification so it can be
//! displayed, serialized and executed without re-deciding anything.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::remote::CodeLocation;
use crate::template::ChangeRecord;

use super::classify::{Classification, UpdateDecision};
use super::params::ParameterDelta;

/// A complete deployment plan.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentPlan {
    /// When the plan was created.
    pub created_at: DateTime<Utc>,
    /// Stack the plan applies to.
    pub stack_name: String,
    /// Chosen update strategy.
    pub decision: UpdateDecision,
    /// Rule that chose the strategy.
    pub rule: &'static str,
    /// Template differences in document order.
    pub records: Vec<ChangeRecord>,
    /// Parameters that differ from the live stack.
    pub parameter_delta: ParameterDelta,
    /// Digest of the candidate template.
    pub template_digest: String,
}

/// A function whose code will be replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeTarget {
    /// Logical identifier in the template.
    pub logical_id: String,
    /// New code location.
    pub location: CodeLocation,
}

/// A function resolved to its live handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceTarget {
    /// Logical identifier in the template.
    pub logical_id: String,
    /// Physical handle of the live function.
    pub physical_id: String,
    /// New code location.
    pub location: CodeLocation,
}

impl DeploymentPlan {
    /// Creates a plan from a classification.
    #[must_use]
    pub fn new(
        stack_name: impl Into<String>,
        classification: Classification,
        records: Vec<ChangeRecord>,
        template_digest: impl Into<String>,
    ) -> Self {
        Self {
            created_at: Utc::now(),
            stack_name: stack_name.into(),
            decision: classification.decision,
            rule: classification.rule,
            records,
            parameter_delta: classification.delta,
            template_digest: template_digest.into(),
        }
    }

    /// Returns true if executing the plan does nothing.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        !self.decision.mutates_remote()
    }

    /// Logical identifiers touched by the template changes, without duplicates.
    #[must_use]
    pub fn changed_resources(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for id in self.records.iter().filter_map(ChangeRecord::resource_id) {
            if !seen.contains(&id) {
                seen.push(id);
            }
        }
        seen
    }

    /// Extracts the new code location of every changed function.
    ///
    /// All values are parsed before anything is returned, so one malformed
    /// location fails the whole plan before any remote call is made.
    ///
    /// # Errors
    ///
    /// Returns an input error for a location that is not `s3://bucket/key`.
    pub fn code_targets(&self) -> Result<Vec<CodeTarget>> {
        let mut targets: Vec<CodeTarget> = Vec::new();

        for record in &self.records {
            let (Some(logical_id), Some(value)) = (record.resource_id(), record.rhs()) else {
                continue;
            };
            let location = CodeLocation::from_template_value(logical_id, value)?;
            if targets.iter().any(|t| t.logical_id == logical_id) {
                continue;
            }
            targets.push(CodeTarget {
                logical_id: logical_id.to_string(),
                location,
            });
        }

        Ok(targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{Template, TemplateDiff};

    const CURRENT: &str = r"
Resources:
  Api:
    Type: AWS::Serverless::Function
    Properties:
      CodeUri: s3://b/api-old.zip
  Worker:
    Type: AWS::Serverless::Function
    Properties:
      CodeUri: s3://b/worker-old.zip
";

    fn plan_for(candidate: &str) -> DeploymentPlan {
        let current = Template::from_yaml_str(CURRENT).expect("current");
        let candidate = Template::from_yaml_str(candidate).expect("candidate");
        let records: Vec<ChangeRecord> = TemplateDiff::between(&current, &candidate).collect();
        DeploymentPlan::new(
            "api-prod",
            Classification {
                decision: UpdateDecision::FunctionCodeOnly,
                rule: "code_only",
                delta: ParameterDelta::default(),
            },
            records,
            "digest",
        )
    }

    #[test]
    fn test_code_targets_follow_document_order() {
        let plan = plan_for(
            &CURRENT
                .replace("api-old.zip", "api/new.zip")
                .replace("worker-old.zip", "worker-new.zip"),
        );

        let targets = plan.code_targets().expect("targets");

        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].logical_id, "Api");
        assert_eq!(targets[0].location, CodeLocation::new("b", "api/new.zip"));
        assert_eq!(targets[1].logical_id, "Worker");
        assert_eq!(plan.changed_resources(), vec!["Api", "Worker"]);
    }

    #[test]
    fn test_one_bad_location_fails_all() {
        let plan = plan_for(
            &CURRENT
                .replace("s3://b/api-old.zip", "s3://b/api-new.zip")
                .replace("s3://b/worker-old.zip", "./worker"),
        );

        assert!(plan.code_targets().is_err());
    }

    #[test]
    fn test_noop_plan() {
        let plan = DeploymentPlan::new(
            "api-prod",
            Classification {
                decision: UpdateDecision::NoChange,
                rule: "no_change",
                delta: ParameterDelta::default(),
            },
            Vec::new(),
            "digest",
        );

        assert!(plan.is_noop());
        assert!(plan.code_targets().expect("no targets").is_empty());
    }
}
