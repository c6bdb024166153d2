//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::{DeployTarget, TemplateHasher, ValidationResult};
use crate::orchestrator::DeployOutcome;
use crate::planner::{DeploymentPlan, UpdateDecision};
use crate::remote::StackDescription;
use crate::state::DeploymentState;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Change record row for table display.
#[derive(Tabled)]
struct ChangeRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Change")]
    kind: String,
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Path")]
    path: String,
}

/// Code update row for table display.
#[derive(Tabled)]
struct CodeUpdateRow {
    #[tabled(rename = "Function")]
    function: String,
    #[tabled(rename = "Physical ID")]
    physical_id: String,
    #[tabled(rename = "Code")]
    location: String,
    #[tabled(rename = "Result")]
    result: String,
}

/// Key/value row for table display.
#[derive(Tabled)]
struct ValueRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Value")]
    value: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a deployment plan for display.
    #[must_use]
    pub fn format_plan(&self, plan: &DeploymentPlan) -> String {
        match self.format {
            OutputFormat::Json => to_json(plan),
            OutputFormat::Text => Self::format_plan_text(plan),
        }
    }

    /// Formats a plan as text.
    fn format_plan_text(plan: &DeploymentPlan) -> String {
        if plan.is_noop() {
            return format!(
                "{} No changes to deploy for {}. Use --force to apply the template anyway.\n",
                "✓".green(),
                plan.stack_name
            );
        }

        let mut output = String::new();

        let _ = writeln!(output, "\nDeployment plan for {}", plan.stack_name.bold());
        let _ = writeln!(
            output,
            "   Strategy: {} (rule {})",
            Self::format_decision(plan.decision),
            plan.rule
        );
        let _ = write!(
            output,
            "   Template: {}\n\n",
            TemplateHasher::new().short_hash(&plan.template_digest)
        );

        let rows: Vec<ChangeRow> = plan
            .records
            .iter()
            .enumerate()
            .map(|(i, record)| ChangeRow {
                index: i + 1,
                kind: Self::format_kind(record.kind_symbol()),
                resource: record.resource_id().unwrap_or("-").to_string(),
                path: truncate(&record.path().to_string(), 60),
            })
            .collect();

        if !rows.is_empty() {
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        if !plan.parameter_delta.is_empty() {
            output.push_str("\nParameters to change:\n");
            for (key, value) in plan.parameter_delta.iter() {
                let _ = writeln!(output, "   {key} = {}", value.yellow());
            }
        }

        let _ = write!(
            output,
            "\nPlan: {} template change(s), {} parameter change(s)\n",
            plan.records.len().to_string().yellow(),
            plan.parameter_delta.len().to_string().yellow()
        );

        output
    }

    /// Formats the outcome of a deploy run.
    #[must_use]
    pub fn format_outcome(&self, outcome: &DeployOutcome) -> String {
        match self.format {
            OutputFormat::Json => to_json(outcome),
            OutputFormat::Text => Self::format_outcome_text(outcome),
        }
    }

    fn format_outcome_text(outcome: &DeployOutcome) -> String {
        if outcome.plan.is_noop() {
            return Self::format_plan_text(&outcome.plan);
        }

        let report = &outcome.report;
        let status = if outcome.success {
            format!("{} Deployed {} ({})", "✓".green(), outcome.plan.stack_name, outcome.decision)
        } else if outcome.is_indeterminate() {
            format!(
                "{} {} of {} not confirmed",
                "⚠".yellow(),
                outcome.decision,
                outcome.plan.stack_name
            )
        } else {
            format!("{} {} of {} failed", "✗".red(), outcome.decision, outcome.plan.stack_name)
        };

        let mut output = format!("{status}\n");

        if let Some(stack_status) = &report.stack_status {
            let _ = writeln!(output, "   Stack status: {stack_status}");
        }

        if !report.code_updates.is_empty() {
            let rows: Vec<CodeUpdateRow> = report
                .code_updates
                .iter()
                .map(|update| CodeUpdateRow {
                    function: update.target.logical_id.clone(),
                    physical_id: truncate(&update.target.physical_id, 40),
                    location: update.target.location.to_string(),
                    result: update.error.as_ref().map_or_else(
                        || "updated".green().to_string(),
                        |e| truncate(e, 50).red().to_string(),
                    ),
                })
                .collect();
            output.push('\n');
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        if report.is_mixed() {
            let _ = writeln!(
                output,
                "\n{} Some functions run new code and others do not",
                "⚠".yellow()
            );
        }

        if report.parameters_skipped {
            let _ = writeln!(
                output,
                "{} Parameter update skipped because code updates failed",
                "⚠".yellow()
            );
        }

        if let Some(error) = &report.parameter_error {
            let _ = writeln!(
                output,
                "{} Function code was replaced but the parameter update was rejected: {error}",
                "⚠".yellow()
            );
        }

        if let Some(state) = &outcome.snapshot {
            let _ = writeln!(output, "   Snapshot recorded ({} deploy(s) in history)", state.history.len());
        }

        output
    }

    /// Formats live stack status for display.
    #[must_use]
    pub fn format_status(
        &self,
        stack_name: &str,
        description: Option<&StackDescription>,
        state: Option<&DeploymentState>,
    ) -> String {
        match self.format {
            OutputFormat::Json => to_json(&StatusJson {
                stack_name,
                exists: description.is_some(),
                stack: description,
                state,
            }),
            OutputFormat::Text => Self::format_status_text(stack_name, description, state),
        }
    }

    fn format_status_text(
        stack_name: &str,
        description: Option<&StackDescription>,
        state: Option<&DeploymentState>,
    ) -> String {
        let mut output = String::new();

        let _ = write!(output, "\nStack: {}\n\n", stack_name.bold());

        let Some(description) = description else {
            output.push_str("   Stack does not exist.\n");
            return output;
        };

        let _ = writeln!(output, "   Status: {}", Self::format_stack_status(&description.status));
        if let Some(reason) = &description.status_reason {
            let _ = writeln!(output, "   Reason: {reason}");
        }

        if !description.parameters.is_empty() {
            let rows: Vec<ValueRow> = description
                .parameters
                .iter()
                .map(|(key, value)| ValueRow {
                    key: key.clone(),
                    value: truncate(value, 60),
                })
                .collect();
            output.push('\n');
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        if let Some(state) = state {
            let _ = writeln!(output, "\n   Recent deploys ({}):", state.history.len());
            for entry in state.history.iter().rev().take(5) {
                let _ = writeln!(
                    output,
                    "     {} {} - {} ({})",
                    "✓".green(),
                    entry.timestamp.format("%Y-%m-%d %H:%M"),
                    entry.decision,
                    entry.resources.join(", ")
                );
            }
        }

        output
    }

    /// Formats a resolved deploy target.
    #[must_use]
    pub fn format_target(&self, target: &DeployTarget) -> String {
        match self.format {
            OutputFormat::Json => to_json(target),
            OutputFormat::Text => {
                let mut rows = vec![
                    row("branch", &target.branch),
                    row("stackName", &target.stack_name),
                    row("region", &target.region),
                    row("profile", target.profile.as_deref().unwrap_or("-")),
                    row("template", &target.template.display().to_string()),
                    row("s3Bucket", &target.s3_bucket),
                    row("capabilities", &target.capabilities.join(", ")),
                    row("packagedTemplate", &target.packaged_template.display().to_string()),
                    row("deployedTemplate", &target.deployed_template.display().to_string()),
                ];
                if let Some(key) = &target.stack_key {
                    rows.insert(1, row("stack", key));
                }
                rows.extend(
                    target
                        .parameters
                        .iter()
                        .map(|(key, value)| row(&format!("stackParameters.{key}"), value)),
                );
                format!("{}\n", Table::new(rows))
            }
        }
    }

    /// Formats a validation result.
    #[must_use]
    pub fn format_validation(&self, result: &ValidationResult, show_warnings: bool) -> String {
        let warnings: &[String] = if show_warnings { &result.warnings } else { &[] };
        match self.format {
            OutputFormat::Json => to_json(&serde_json::json!({
                "valid": result.is_valid(),
                "errors": result
                    .errors
                    .iter()
                    .map(|e| serde_json::json!({ "field": e.field, "message": e.message }))
                    .collect::<Vec<_>>(),
                "warnings": warnings,
            })),
            OutputFormat::Text => {
                let mut output = if result.is_valid() {
                    format!("{} Configuration is valid\n", "✓".green())
                } else {
                    format!("{} Configuration is invalid\n", "✗".red())
                };
                for error in &result.errors {
                    let _ = writeln!(output, "   - {}: {}", error.field, error.message);
                }
                for warning in warnings {
                    let _ = writeln!(output, "   {} {warning}", "⚠".yellow());
                }
                output
            }
        }
    }

    /// Formats an error message.
    #[must_use]
    pub fn error(&self, message: &str) -> String {
        match self.format {
            OutputFormat::Json => to_json(&serde_json::json!({ "status": "error", "message": message })),
            OutputFormat::Text => format!("{} {message}", "✗".red()),
        }
    }

    /// Colors a strategy by how much it touches.
    fn format_decision(decision: UpdateDecision) -> String {
        match decision {
            UpdateDecision::NoChange => decision.as_str().dimmed().to_string(),
            UpdateDecision::ParametersOnly
            | UpdateDecision::FunctionCodeOnly
            | UpdateDecision::FunctionCodeAndParameters => decision.as_str().green().to_string(),
            UpdateDecision::FullUpdate => decision.as_str().yellow().to_string(),
            UpdateDecision::FullCreate => decision.as_str().cyan().to_string(),
        }
    }

    fn format_kind(symbol: &str) -> String {
        match symbol {
            "+" => symbol.green().to_string(),
            "-" => symbol.red().to_string(),
            _ => symbol.yellow().to_string(),
        }
    }

    fn format_stack_status(status: &str) -> String {
        if status.ends_with("_COMPLETE") && !status.contains("ROLLBACK") && !status.starts_with("DELETE") {
            status.green().to_string()
        } else if status.ends_with("_IN_PROGRESS") {
            status.yellow().to_string()
        } else {
            status.red().to_string()
        }
    }
}

#[derive(Serialize)]
struct StatusJson<'a> {
    stack_name: &'a str,
    exists: bool,
    stack: Option<&'a StackDescription>,
    state: Option<&'a DeploymentState>,
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

fn row(key: &str, value: &str) -> ValueRow {
    ValueRow {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// Truncates a string to at most `max_len` characters.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
