//! Orchestrator for converging a stack on a candidate template.
//!
//! This module sequences the deploy pipeline: fetch the current template,
//! diff it against the candidate, classify the change once, execute the
//! chosen strategy, and record a snapshot when the deploy succeeded.

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::TemplateHasher;
use crate::error::Result;
use crate::planner::{
    Candidate, ChangeClassifier, ClassifyInput, DeploymentPlan, ExecutionReport,
    LiveStackParameters, ParameterMap, PlanExecutor, StackContext, UpdateDecision,
};
use crate::poller::StatusPoller;
use crate::remote::StackTransport;
use crate::state::{DeploymentHistoryEntry, DeploymentState, SnapshotStore};
use crate::template::{Template, TemplateDiff};

/// Options of one deploy run.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeployOptions {
    /// Apply the whole template even if a cheaper strategy would do.
    pub force: bool,
    /// Diff against the local snapshot before asking the remote service.
    pub prefer_snapshot: bool,
}

/// Result of a deploy run.
#[derive(Debug, Clone, Serialize)]
pub struct DeployOutcome {
    /// Strategy that was chosen.
    pub decision: UpdateDecision,
    /// Whether the deploy converged.
    pub success: bool,
    /// The plan that was executed.
    pub plan: DeploymentPlan,
    /// What execution observed.
    pub report: ExecutionReport,
    /// Recorded state, if a snapshot was written.
    pub snapshot: Option<DeploymentState>,
}

impl DeployOutcome {
    /// Returns true if a stack operation may still be running remotely.
    #[must_use]
    pub fn is_indeterminate(&self) -> bool {
        self.report.is_indeterminate()
    }
}

/// Orchestrator driving one stack.
pub struct Orchestrator<'a> {
    /// Transport for every remote call.
    transport: &'a dyn StackTransport,
    /// Store of the last applied template.
    store: &'a dyn SnapshotStore,
    /// Poller for stack operations.
    poller: StatusPoller,
    /// Target stack.
    stack: StackContext,
    /// Strategy classifier.
    classifier: ChangeClassifier,
    /// Template hasher.
    hasher: TemplateHasher,
}

impl<'a> Orchestrator<'a> {
    /// Creates a new orchestrator.
    #[must_use]
    pub const fn new(
        transport: &'a dyn StackTransport,
        store: &'a dyn SnapshotStore,
        stack: StackContext,
        poller: StatusPoller,
    ) -> Self {
        Self {
            transport,
            store,
            poller,
            stack,
            classifier: ChangeClassifier::new(),
            hasher: TemplateHasher::new(),
        }
    }

    /// Returns the template currently applied to the stack.
    ///
    /// With `prefer_snapshot`, the local snapshot is used when present.
    /// Returns `None` if the stack does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot or the remote template cannot be read.
    pub async fn fetch_current_template(&self, prefer_snapshot: bool) -> Result<Option<Template>> {
        if prefer_snapshot {
            if let Some(template) = self.store.load_template().await? {
                info!("Using local snapshot of {}", self.stack.stack_name);
                return Ok(Some(template));
            }
            debug!("No local snapshot, falling back to the live template");
        }

        match self.transport.get_template(&self.stack.stack_name).await? {
            Some(body) => Ok(Some(Template::from_yaml_str(&body)?)),
            None => {
                info!("Stack {} does not exist yet", self.stack.stack_name);
                Ok(None)
            }
        }
    }

    /// Diffs and classifies a candidate without changing anything remotely.
    ///
    /// # Errors
    ///
    /// Returns an error if live parameters cannot be read or the candidate
    /// cannot be hashed.
    pub async fn plan(
        &self,
        current: Option<&Template>,
        candidate: &Template,
        desired: &ParameterMap,
        force: bool,
    ) -> Result<DeploymentPlan> {
        let records: Vec<_> = current
            .map(|current| TemplateDiff::between(current, candidate).collect())
            .unwrap_or_default();
        debug!("Template diff produced {} record(s)", records.len());

        let input = ClassifyInput {
            current,
            records: &records,
            desired,
            force,
        };
        let source = LiveStackParameters::new(self.transport, &self.stack.stack_name);
        let classification = self.classifier.classify(&input, &source).await?;

        let digest = self.hasher.hash_template(candidate)?;
        info!(
            "Selected {} for {} (rule {}, template {})",
            classification.decision,
            self.stack.stack_name,
            classification.rule,
            self.hasher.short_hash(&digest)
        );

        Ok(DeploymentPlan::new(
            self.stack.stack_name.clone(),
            classification,
            records,
            digest,
        ))
    }

    /// Plans a deploy and executes it.
    ///
    /// The decision is fixed before the first mutating call. The snapshot is
    /// written only when the deploy succeeded.
    ///
    /// # Errors
    ///
    /// Returns an error if planning fails or execution is rejected before any
    /// remote change was accepted.
    pub async fn plan_and_execute(
        &self,
        candidate: &Candidate,
        desired: &ParameterMap,
        options: DeployOptions,
    ) -> Result<DeployOutcome> {
        let current = self.fetch_current_template(options.prefer_snapshot).await?;
        let plan = self
            .plan(current.as_ref(), &candidate.template, desired, options.force)
            .await?;

        let executor = PlanExecutor::new(self.transport, &self.poller, &self.stack);
        let report = executor
            .execute(&plan, current.as_ref(), candidate, desired)
            .await?;

        if plan.is_noop() {
            info!("No changes to deploy for {}", self.stack.stack_name);
            return Ok(DeployOutcome {
                decision: plan.decision,
                success: true,
                plan,
                report,
                snapshot: None,
            });
        }

        let snapshot = if report.success {
            Some(self.record_snapshot(&plan, &candidate.template).await?)
        } else {
            if report.is_indeterminate() {
                warn!(
                    "Stack {} is still changing remotely, snapshot not written",
                    self.stack.stack_name
                );
            } else {
                error!("Deploy of {} failed, snapshot not written", self.stack.stack_name);
            }
            None
        };

        Ok(DeployOutcome {
            decision: plan.decision,
            success: report.success,
            plan,
            report,
            snapshot,
        })
    }

    async fn record_snapshot(
        &self,
        plan: &DeploymentPlan,
        template: &Template,
    ) -> Result<DeploymentState> {
        let resources = plan
            .changed_resources()
            .into_iter()
            .map(str::to_string)
            .collect();
        let entry = DeploymentHistoryEntry::succeeded(plan.decision, &plan.template_digest, resources);

        let state = self.store.save(template, entry).await?;
        debug!(
            "Recorded deploy {} of {} in {} store",
            state.history.len(),
            self.stack.stack_name,
            self.store.backend_type()
        );
        Ok(state)
    }
}
