//! Plan executor for applying deployment plans.
//!
//! Each update strategy has one execution path. No path retries or rolls
//! back on its own; partial outcomes are reported as they happened.

use futures::future::join_all;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::poller::{OperationStatus, StatusPoller, STACK_TERMINAL_STATES};
use crate::remote::{
    ParameterSetting, ParameterUpdateRequest, StackApplyRequest, StackChange,
    StackOperationKind, StackParameter, StackStatusProbe, StackTransport, TemplateSource,
};
use crate::template::Template;

use super::classify::UpdateDecision;
use super::params::{ParameterDelta, ParameterMap};
use super::plan::{DeploymentPlan, ResourceTarget};
use super::resolve::ResourceResolver;

/// Prefix of client request tokens.
const REQUEST_TOKEN_PREFIX: &str = "sampic";

/// Stack-level settings every execution needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackContext {
    /// Stack name.
    pub stack_name: String,
    /// Acknowledged capabilities.
    pub capabilities: Vec<String>,
}

/// A candidate template with the source the service should read it from.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Parsed candidate template.
    pub template: Template,
    /// Body or uploaded URL of the same template.
    pub source: TemplateSource,
}

impl Candidate {
    /// Uses the serialized template itself as the source.
    ///
    /// # Errors
    ///
    /// Returns an error if the template cannot be serialized.
    pub fn inline(template: Template) -> Result<Self> {
        let body = template.to_yaml_string()?;
        Ok(Self {
            template,
            source: TemplateSource::Body(body),
        })
    }
}

/// Outcome of one direct code update.
#[derive(Debug, Clone, Serialize)]
pub struct CodeUpdateResult {
    /// Function that was updated.
    pub target: ResourceTarget,
    /// Error message if the call failed.
    pub error: Option<String>,
}

impl CodeUpdateResult {
    /// Returns true if the call succeeded.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of executing a plan.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    /// Strategy that was executed.
    pub decision: UpdateDecision,
    /// Whether every step succeeded.
    pub success: bool,
    /// Outcome of stack observation, if a stack operation ran.
    pub stack_status: Option<OperationStatus>,
    /// Per-function code update outcomes.
    pub code_updates: Vec<CodeUpdateResult>,
    /// True if the parameter step was skipped because code updates failed.
    pub parameters_skipped: bool,
    /// Rejection of the parameter step after code was already replaced.
    pub parameter_error: Option<String>,
}

impl ExecutionReport {
    const fn empty(decision: UpdateDecision) -> Self {
        Self {
            decision,
            success: true,
            stack_status: None,
            code_updates: Vec::new(),
            parameters_skipped: false,
            parameter_error: None,
        }
    }

    /// Returns true if a stack operation may still be running remotely.
    #[must_use]
    pub fn is_indeterminate(&self) -> bool {
        self.stack_status
            .as_ref()
            .is_some_and(OperationStatus::is_indeterminate)
    }

    /// Returns true if some code updates succeeded and others failed.
    #[must_use]
    pub fn is_mixed(&self) -> bool {
        let ok = self.code_updates.iter().filter(|r| r.succeeded()).count();
        ok > 0 && ok < self.code_updates.len()
    }
}

/// Executor for deployment plans.
pub struct PlanExecutor<'a> {
    /// Transport for every remote call.
    transport: &'a dyn StackTransport,
    /// Poller for stack operations.
    poller: &'a StatusPoller,
    /// Target stack.
    stack: &'a StackContext,
}

impl<'a> PlanExecutor<'a> {
    /// Creates a new plan executor.
    #[must_use]
    pub const fn new(
        transport: &'a dyn StackTransport,
        poller: &'a StatusPoller,
        stack: &'a StackContext,
    ) -> Self {
        Self {
            transport,
            poller,
            stack,
        }
    }

    /// Executes a deployment plan.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed code locations, unresolvable resources
    /// or a rejected stack request. Failures observed after a request was
    /// accepted are reported in the returned [`ExecutionReport`].
    pub async fn execute(
        &self,
        plan: &DeploymentPlan,
        current: Option<&Template>,
        candidate: &Candidate,
        desired: &ParameterMap,
    ) -> Result<ExecutionReport> {
        info!(
            "Executing {} on {} ({} change record(s))",
            plan.decision,
            self.stack.stack_name,
            plan.records.len()
        );

        match plan.decision {
            UpdateDecision::NoChange => Ok(ExecutionReport::empty(plan.decision)),
            UpdateDecision::FullCreate | UpdateDecision::FullUpdate => {
                self.apply_template(plan.decision, current, candidate, desired)
                    .await
            }
            UpdateDecision::FunctionCodeOnly => self.update_function_code(plan).await,
            UpdateDecision::FunctionCodeAndParameters => {
                let mut report = self.update_function_code(plan).await?;
                if !report.success {
                    warn!("Code updates failed, skipping parameter update");
                    report.parameters_skipped = true;
                    return Ok(report);
                }
                let parameters = self
                    .update_parameters(plan.decision, current, &plan.parameter_delta, desired)
                    .await;
                match parameters {
                    Ok(parameters) => {
                        report.success = parameters.success;
                        report.stack_status = parameters.stack_status;
                    }
                    Err(e) => {
                        error!(
                            "Parameter update of {} rejected after function code was replaced: {e}",
                            self.stack.stack_name
                        );
                        report.success = false;
                        report.parameter_error = Some(e.to_string());
                    }
                }
                Ok(report)
            }
            UpdateDecision::ParametersOnly => {
                self.update_parameters(plan.decision, current, &plan.parameter_delta, desired)
                    .await
            }
        }
    }

    /// Applies the whole candidate template and waits for the stack.
    async fn apply_template(
        &self,
        decision: UpdateDecision,
        current: Option<&Template>,
        candidate: &Candidate,
        desired: &ParameterMap,
    ) -> Result<ExecutionReport> {
        let kind = if decision == UpdateDecision::FullCreate {
            StackOperationKind::Create
        } else {
            StackOperationKind::Update
        };

        let request = StackApplyRequest {
            stack_name: self.stack.stack_name.clone(),
            kind,
            template: candidate.source.clone(),
            capabilities: self.stack.capabilities.clone(),
            parameters: full_apply_parameters(kind, current, &candidate.template, desired),
            client_request_token: request_token(),
        };

        let change = self.transport.apply_stack(&request).await?;
        Ok(self.observe(decision, change).await)
    }

    /// Re-applies the current template with changed parameter values.
    async fn update_parameters(
        &self,
        decision: UpdateDecision,
        current: Option<&Template>,
        delta: &ParameterDelta,
        desired: &ParameterMap,
    ) -> Result<ExecutionReport> {
        let request = ParameterUpdateRequest {
            stack_name: self.stack.stack_name.clone(),
            capabilities: self.stack.capabilities.clone(),
            parameters: parameters_only(current, delta, desired),
            client_request_token: request_token(),
        };

        info!(
            "Updating {} parameter(s) on {}",
            delta.len(),
            self.stack.stack_name
        );
        let change = self.transport.update_stack_parameters(&request).await?;
        Ok(self.observe(decision, change).await)
    }

    /// Waits for an accepted stack change.
    async fn observe(&self, decision: UpdateDecision, change: StackChange) -> ExecutionReport {
        let mut report = ExecutionReport::empty(decision);
        match change {
            StackChange::NoUpdates => report,
            StackChange::Started { stack_id } => {
                let probe = StackStatusProbe::new(self.transport);
                let status = self
                    .poller
                    .await_completion(&probe, &stack_id, &STACK_TERMINAL_STATES)
                    .await;
                report.success = status.is_success();
                report.stack_status = Some(status);
                report
            }
        }
    }

    /// Replaces the code of every changed function concurrently.
    async fn update_function_code(&self, plan: &DeploymentPlan) -> Result<ExecutionReport> {
        let code_targets = plan.code_targets()?;
        let logical_ids: Vec<String> = code_targets.iter().map(|t| t.logical_id.clone()).collect();

        let resolved = ResourceResolver::new(self.transport)
            .resolve(&self.stack.stack_name, &logical_ids)
            .await?;

        let targets: Vec<ResourceTarget> = code_targets
            .into_iter()
            .filter_map(|target| {
                let physical_id = resolved.get(&target.logical_id)?.clone();
                Some(ResourceTarget {
                    logical_id: target.logical_id,
                    physical_id,
                    location: target.location,
                })
            })
            .collect();

        info!("Updating code of {} function(s)", targets.len());

        let calls = targets.into_iter().map(|target| async move {
            let outcome = self
                .transport
                .update_function_code(&target.physical_id, &target.location)
                .await;
            match outcome {
                Ok(()) => {
                    info!("Updated {} ({})", target.logical_id, target.physical_id);
                    CodeUpdateResult { target, error: None }
                }
                Err(e) => {
                    error!("Code update of {} failed: {e}", target.logical_id);
                    CodeUpdateResult {
                        target,
                        error: Some(e.to_string()),
                    }
                }
            }
        });
        let results = join_all(calls).await;

        let mut report = ExecutionReport::empty(plan.decision);
        report.success = results.iter().all(CodeUpdateResult::succeeded);
        report.code_updates = results;

        if report.is_mixed() {
            error!(
                "Stack {} is in a mixed state: some functions run new code, others old code",
                self.stack.stack_name
            );
        }

        Ok(report)
    }
}

/// Parameters of a full apply.
///
/// Desired values are sent for parameters the candidate declares. On update,
/// parameters declared by both templates that the user did not set keep their
/// previous value.
fn full_apply_parameters(
    kind: StackOperationKind,
    current: Option<&Template>,
    candidate: &Template,
    desired: &ParameterMap,
) -> Vec<StackParameter> {
    let declared = candidate.declared_parameters();
    warn_undeclared(desired, &declared);

    let mut parameters: Vec<StackParameter> = desired
        .iter()
        .filter(|(key, _)| declared.contains(&key.as_str()))
        .map(|(key, value)| StackParameter {
            key: key.clone(),
            setting: ParameterSetting::Value(value.clone()),
        })
        .collect();

    if let (StackOperationKind::Update, Some(current)) = (kind, current) {
        let previously_declared = current.declared_parameters();
        for key in declared {
            if previously_declared.contains(&key) && !desired.contains_key(key) {
                parameters.push(StackParameter {
                    key: key.to_string(),
                    setting: ParameterSetting::UsePrevious,
                });
            }
        }
    }

    parameters
}

/// Parameters of a parameters-only update.
///
/// Every parameter the applied template declares is sent: changed keys get
/// their new value, the others keep their previous one.
fn parameters_only(
    current: Option<&Template>,
    delta: &ParameterDelta,
    desired: &ParameterMap,
) -> Vec<StackParameter> {
    let keys: Vec<&str> = match current {
        Some(current) => {
            let declared = current.declared_parameters();
            warn_undeclared(desired, &declared);
            declared
        }
        None => delta.iter().map(|(key, _)| key).collect(),
    };

    keys.into_iter()
        .map(|key| StackParameter {
            key: key.to_string(),
            setting: delta.get(key).map_or(ParameterSetting::UsePrevious, |value| {
                ParameterSetting::Value(value.to_string())
            }),
        })
        .collect()
}

/// Logs desired parameters the template does not declare; they are not sent.
fn warn_undeclared(desired: &ParameterMap, declared: &[&str]) {
    for key in desired.keys() {
        if !declared.contains(&key.as_str()) {
            warn!("Parameter {key} is not declared by the template, not sending it");
        }
    }
}

fn request_token() -> String {
    format!("{REQUEST_TOKEN_PREFIX}-{}", Uuid::new_v4())
}
