//! Classification of a template change into the cheapest safe update strategy.
//!
//! Classification walks an ordered rule table; the first rule that applies
//! wins. Rules that depend on the live parameters trigger a single lazy query
//! the first time one of them is reached, so decisions settled by the template
//! alone never touch the network.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::error::{Result, SampicError};
use crate::template::{ChangeRecord, Template, RESOURCES_SECTION};

use super::params::{ParameterDelta, ParameterMap, ParameterSource};

/// Property names whose edits can be applied by a direct code update.
pub const CODE_LOCATION_PROPERTIES: &[&str] = &["CodeUri"];

/// Resource types whose code can be updated in place.
pub const FUNCTION_RESOURCE_TYPES: &[&str] =
    &["AWS::Serverless::Function", "AWS::Lambda::Function"];

/// Update strategy chosen for a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateDecision {
    /// Nothing to do.
    NoChange,
    /// Re-apply the current template with new parameter values.
    ParametersOnly,
    /// Replace function code directly.
    FunctionCodeOnly,
    /// Replace function code, then update parameters.
    FunctionCodeAndParameters,
    /// Apply the whole candidate template to an existing stack.
    FullUpdate,
    /// Create the stack from the candidate template.
    FullCreate,
}

impl UpdateDecision {
    /// Returns true if executing this decision mutates remote state.
    #[must_use]
    pub const fn mutates_remote(self) -> bool {
        !matches!(self, Self::NoChange)
    }

    /// Returns a stable snake-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoChange => "no_change",
            Self::ParametersOnly => "parameters_only",
            Self::FunctionCodeOnly => "function_code_only",
            Self::FunctionCodeAndParameters => "function_code_and_parameters",
            Self::FullUpdate => "full_update",
            Self::FullCreate => "full_create",
        }
    }
}

impl fmt::Display for UpdateDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Inputs of one classification.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyInput<'a> {
    /// Template currently applied, `None` if the stack does not exist.
    pub current: Option<&'a Template>,
    /// Differences between the current and candidate templates.
    pub records: &'a [ChangeRecord],
    /// Parameter values the user wants applied.
    pub desired: &'a ParameterMap,
    /// Skip the cheap strategies and always apply the whole template.
    pub force: bool,
}

/// Result of a classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Chosen strategy.
    pub decision: UpdateDecision,
    /// Name of the rule that chose it.
    pub rule: &'static str,
    /// Parameters that differ from the live stack; empty unless queried.
    pub delta: ParameterDelta,
}

/// Facts rules are evaluated against.
#[derive(Debug, Clone, Copy)]
struct Facts {
    stack_exists: bool,
    force: bool,
    template_changed: bool,
    only_code_edits: bool,
    /// `None` until the live parameters have been queried.
    parameters_changed: Option<bool>,
}

/// One entry of the decision table.
struct Rule {
    name: &'static str,
    needs_parameters: bool,
    applies: fn(&Facts) -> bool,
    decision: UpdateDecision,
}

/// Decision table in priority order. The last rule always applies.
const RULES: &[Rule] = &[
    Rule {
        name: "stack_absent",
        needs_parameters: false,
        applies: stack_absent,
        decision: UpdateDecision::FullCreate,
    },
    Rule {
        name: "forced",
        needs_parameters: false,
        applies: forced,
        decision: UpdateDecision::FullUpdate,
    },
    Rule {
        name: "beyond_function_code",
        needs_parameters: false,
        applies: beyond_function_code,
        decision: UpdateDecision::FullUpdate,
    },
    Rule {
        name: "code_and_parameters",
        needs_parameters: true,
        applies: code_and_parameters,
        decision: UpdateDecision::FunctionCodeAndParameters,
    },
    Rule {
        name: "code_only",
        needs_parameters: true,
        applies: code_only,
        decision: UpdateDecision::FunctionCodeOnly,
    },
    Rule {
        name: "parameters_only",
        needs_parameters: true,
        applies: parameters_only,
        decision: UpdateDecision::ParametersOnly,
    },
    Rule {
        name: "no_change",
        needs_parameters: true,
        applies: no_change,
        decision: UpdateDecision::NoChange,
    },
];

const fn stack_absent(facts: &Facts) -> bool {
    !facts.stack_exists
}

const fn forced(facts: &Facts) -> bool {
    facts.force
}

const fn beyond_function_code(facts: &Facts) -> bool {
    facts.template_changed && !facts.only_code_edits
}

fn code_and_parameters(facts: &Facts) -> bool {
    facts.template_changed && facts.parameters_changed == Some(true)
}

fn code_only(facts: &Facts) -> bool {
    facts.template_changed && facts.parameters_changed == Some(false)
}

fn parameters_only(facts: &Facts) -> bool {
    !facts.template_changed && facts.parameters_changed == Some(true)
}

fn no_change(facts: &Facts) -> bool {
    !facts.template_changed && facts.parameters_changed == Some(false)
}

/// Returns true if a record can be applied by a direct code update.
///
/// It must be an in-place edit of a code-location property of a function
/// resource, where the type is read from the current template.
#[must_use]
pub fn is_function_code_edit(record: &ChangeRecord, current: &Template) -> bool {
    let ChangeRecord::Edited { path, .. } = record else {
        return false;
    };

    path.key_at(0) == Some(RESOURCES_SECTION)
        && path
            .last_key()
            .is_some_and(|key| CODE_LOCATION_PROPERTIES.contains(&key))
        && path
            .key_at(1)
            .and_then(|logical_id| current.resource_type(logical_id))
            .is_some_and(|kind| FUNCTION_RESOURCE_TYPES.contains(&kind))
}

/// Chooses the update strategy for a change.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeClassifier;

impl ChangeClassifier {
    /// Creates a classifier.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Classifies a change.
    ///
    /// The parameter source is queried at most once, and not at all when the
    /// decision follows from the templates or no parameters are desired.
    ///
    /// # Errors
    ///
    /// Returns an error if the live parameter query fails.
    pub async fn classify(
        &self,
        input: &ClassifyInput<'_>,
        source: &dyn ParameterSource,
    ) -> Result<Classification> {
        let mut facts = Facts {
            stack_exists: input.current.is_some(),
            force: input.force,
            template_changed: !input.records.is_empty(),
            only_code_edits: input.current.is_some_and(|current| {
                input
                    .records
                    .iter()
                    .all(|record| is_function_code_edit(record, current))
            }),
            parameters_changed: None,
        };
        let mut delta = ParameterDelta::default();

        for rule in RULES {
            if rule.needs_parameters && facts.parameters_changed.is_none() {
                delta = Self::parameter_delta(input.desired, source).await?;
                facts.parameters_changed = Some(!delta.is_empty());
            }

            if (rule.applies)(&facts) {
                debug!("Rule {} selected {}", rule.name, rule.decision);
                return Ok(Classification {
                    decision: rule.decision,
                    rule: rule.name,
                    delta,
                });
            }
        }

        Err(SampicError::internal("no classification rule applied"))
    }

    async fn parameter_delta(
        desired: &ParameterMap,
        source: &dyn ParameterSource,
    ) -> Result<ParameterDelta> {
        if desired.is_empty() {
            debug!("No desired parameters, skipping live parameter query");
            return Ok(ParameterDelta::default());
        }

        let live = source.live_parameters().await?.unwrap_or_default();
        Ok(ParameterDelta::compute(desired, &live))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::params::MockParameterSource;
    use crate::template::TemplateDiff;

    const CURRENT: &str = r"
Parameters:
  Stage:
    Type: String
Resources:
  Fn:
    Type: AWS::Serverless::Function
    Properties:
      CodeUri: s3://b/old.zip
      MemorySize: 128
  Legacy:
    Type: AWS::Lambda::Function
    Properties:
      CodeUri: s3://b/legacy-old.zip
  Bucket:
    Type: AWS::S3::Bucket
    Properties:
      CodeUri: s3://b/not-code.zip
";

    fn template(text: &str) -> Template {
        Template::from_yaml_str(text).expect("template")
    }

    fn records(current: &Template, candidate: &Template) -> Vec<ChangeRecord> {
        TemplateDiff::between(current, candidate).collect()
    }

    fn params(pairs: &[(&str, &str)]) -> ParameterMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn never_queried() -> MockParameterSource {
        let mut source = MockParameterSource::new();
        source.expect_live_parameters().times(0);
        source
    }

    fn queried_once(live: &[(&str, &str)]) -> MockParameterSource {
        let live = params(live);
        let mut source = MockParameterSource::new();
        source
            .expect_live_parameters()
            .times(1)
            .returning(move || Ok(Some(live.clone())));
        source
    }

    async fn classify(
        current: Option<&Template>,
        records: &[ChangeRecord],
        desired: &ParameterMap,
        force: bool,
        source: &MockParameterSource,
    ) -> Classification {
        let input = ClassifyInput {
            current,
            records,
            desired,
            force,
        };
        ChangeClassifier::new()
            .classify(&input, source)
            .await
            .expect("classification")
    }

    #[tokio::test]
    async fn test_missing_stack_is_full_create_without_query() {
        let candidate = template(CURRENT);
        let desired = params(&[("Stage", "prod")]);

        let result = classify(None, &[], &desired, false, &never_queried()).await;

        assert_eq!(result.decision, UpdateDecision::FullCreate);
        assert_eq!(result.rule, "stack_absent");
        assert!(candidate.resource("Fn").is_some());
    }

    #[tokio::test]
    async fn test_force_wins_over_everything_but_create() {
        let current = template(CURRENT);
        let desired = params(&[("Stage", "prod")]);

        let result = classify(Some(&current), &[], &desired, true, &never_queried()).await;

        assert_eq!(result.decision, UpdateDecision::FullUpdate);
        assert_eq!(result.rule, "forced");
    }

    #[tokio::test]
    async fn test_code_uri_edit_is_code_only() {
        let current = template(CURRENT);
        let candidate = template(&CURRENT.replace("s3://b/old.zip", "s3://b/new.zip"));
        let changes = records(&current, &candidate);
        let desired = params(&[("Stage", "prod")]);

        let result = classify(
            Some(&current),
            &changes,
            &desired,
            false,
            &queried_once(&[("Stage", "prod")]),
        )
        .await;

        assert_eq!(result.decision, UpdateDecision::FunctionCodeOnly);
        assert!(result.delta.is_empty());
    }

    #[tokio::test]
    async fn test_code_uri_edit_on_plain_lambda_qualifies() {
        let current = template(CURRENT);
        let candidate =
            template(&CURRENT.replace("s3://b/legacy-old.zip", "s3://b/legacy-new.zip"));
        let changes = records(&current, &candidate);

        let result = classify(Some(&current), &changes, &ParameterMap::new(), false, &never_queried())
            .await;

        assert_eq!(result.decision, UpdateDecision::FunctionCodeOnly);
    }

    #[tokio::test]
    async fn test_code_uri_on_non_function_is_full_update() {
        let current = template(CURRENT);
        let candidate = template(&CURRENT.replace("s3://b/not-code.zip", "s3://b/other.zip"));
        let changes = records(&current, &candidate);

        let result = classify(Some(&current), &changes, &params(&[("Stage", "prod")]), false, &never_queried())
            .await;

        assert_eq!(result.decision, UpdateDecision::FullUpdate);
        assert_eq!(result.rule, "beyond_function_code");
    }

    #[tokio::test]
    async fn test_any_other_edit_forces_full_update_without_query() {
        let current = template(CURRENT);
        let candidate = template(
            &CURRENT
                .replace("s3://b/old.zip", "s3://b/new.zip")
                .replace("MemorySize: 128", "MemorySize: 256"),
        );
        let changes = records(&current, &candidate);

        let result = classify(Some(&current), &changes, &params(&[("Stage", "prod")]), false, &never_queried())
            .await;

        assert_eq!(result.decision, UpdateDecision::FullUpdate);
    }

    #[tokio::test]
    async fn test_added_code_uri_is_not_an_edit() {
        let current = template(
            r"
Resources:
  Fn:
    Type: AWS::Serverless::Function
    Properties:
      Handler: index.handler
",
        );
        let candidate = template(
            r"
Resources:
  Fn:
    Type: AWS::Serverless::Function
    Properties:
      Handler: index.handler
      CodeUri: s3://b/new.zip
",
        );
        let changes = records(&current, &candidate);

        let result = classify(Some(&current), &changes, &ParameterMap::new(), false, &never_queried())
            .await;

        assert_eq!(result.decision, UpdateDecision::FullUpdate);
    }

    #[tokio::test]
    async fn test_code_and_parameter_change() {
        let current = template(CURRENT);
        let candidate = template(&CURRENT.replace("s3://b/old.zip", "s3://b/new.zip"));
        let changes = records(&current, &candidate);
        let desired = params(&[("Stage", "prod")]);

        let result = classify(
            Some(&current),
            &changes,
            &desired,
            false,
            &queried_once(&[("Stage", "dev")]),
        )
        .await;

        assert_eq!(result.decision, UpdateDecision::FunctionCodeAndParameters);
        assert_eq!(result.delta.get("Stage"), Some("prod"));
    }

    #[tokio::test]
    async fn test_parameters_only() {
        let current = template(CURRENT);
        let desired = params(&[("Stage", "prod")]);

        let result = classify(
            Some(&current),
            &[],
            &desired,
            false,
            &queried_once(&[("Stage", "dev")]),
        )
        .await;

        assert_eq!(result.decision, UpdateDecision::ParametersOnly);
        assert_eq!(result.rule, "parameters_only");
    }

    #[tokio::test]
    async fn test_no_change_queries_parameters_once() {
        let current = template(CURRENT);
        let desired = params(&[("Stage", "prod")]);

        let result = classify(
            Some(&current),
            &[],
            &desired,
            false,
            &queried_once(&[("Stage", "prod")]),
        )
        .await;

        assert_eq!(result.decision, UpdateDecision::NoChange);
    }

    #[tokio::test]
    async fn test_no_desired_parameters_skips_query() {
        let current = template(CURRENT);

        let result = classify(Some(&current), &[], &ParameterMap::new(), false, &never_queried())
            .await;

        assert_eq!(result.decision, UpdateDecision::NoChange);
    }

    #[tokio::test]
    async fn test_missing_live_key_counts_as_changed() {
        let current = template(CURRENT);
        let desired = params(&[("Stage", "prod"), ("Feature", "on")]);

        let result = classify(
            Some(&current),
            &[],
            &desired,
            false,
            &queried_once(&[("Stage", "prod")]),
        )
        .await;

        assert_eq!(result.decision, UpdateDecision::ParametersOnly);
        assert_eq!(result.delta.len(), 1);
        assert_eq!(result.delta.get("Feature"), Some("on"));
    }

    #[test]
    fn test_last_rule_covers_remaining_facts() {
        let facts = Facts {
            stack_exists: true,
            force: false,
            template_changed: false,
            only_code_edits: true,
            parameters_changed: Some(false),
        };
        let last = RULES.last().expect("rules");
        assert!((last.applies)(&facts));
        assert_eq!(last.decision, UpdateDecision::NoChange);
    }
}
