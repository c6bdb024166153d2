//! Configuration validation for deploy targets.
//!
//! This module checks a resolved target before any remote call is made, so
//! naming mistakes surface locally instead of as rejected stack operations.

use crate::error::{ConfigError, Result, SampicError};
use std::collections::HashSet;
use tracing::debug;

use super::spec::DeployTarget;

/// Capabilities accepted by stack operations.
pub const KNOWN_CAPABILITIES: &[&str] = &[
    "CAPABILITY_IAM",
    "CAPABILITY_NAMED_IAM",
    "CAPABILITY_AUTO_EXPAND",
];

/// Maximum length of a stack name.
const MAX_STACK_NAME_LEN: usize = 128;

/// Validator for deploy targets.
#[derive(Debug, Default)]
pub struct ConfigValidator {
    /// Capability names accepted without error.
    known_capabilities: HashSet<String>,
}

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ValidationResult {
    /// Returns true if no errors were found.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

impl ConfigValidator {
    /// Creates a new validator with the known capability names.
    #[must_use]
    pub fn new() -> Self {
        Self {
            known_capabilities: KNOWN_CAPABILITIES.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// Checks a target and collects every problem found.
    #[must_use]
    pub fn check(&self, target: &DeployTarget) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_region(target, &mut result);
        Self::validate_stack_name(&target.stack_name, &mut result);
        self.validate_capabilities(&target.capabilities, &mut result);
        Self::validate_parameters(target, &mut result);

        if target.s3_bucket.is_empty() {
            result.errors.push(ValidationError {
                field: String::from("s3Bucket"),
                message: String::from("Artifact bucket cannot be empty"),
            });
        }

        result
    }

    /// Validates a deploy target.
    ///
    /// # Errors
    ///
    /// Returns the first validation error found.
    pub fn validate(&self, target: &DeployTarget) -> Result<ValidationResult> {
        let mut result = self.check(target);

        if result.errors.is_empty() {
            debug!("Configuration validation passed");
            Ok(result)
        } else {
            let first_error = result.errors.swap_remove(0);
            Err(SampicError::Config(ConfigError::ValidationError {
                message: first_error.message,
                field: Some(first_error.field),
            }))
        }
    }

    fn validate_region(target: &DeployTarget, result: &mut ValidationResult) {
        if target.region.trim().is_empty() {
            result.errors.push(ValidationError {
                field: format!("{}.region", target.branch),
                message: String::from("Region cannot be empty"),
            });
        }
    }

    fn validate_stack_name(name: &str, result: &mut ValidationResult) {
        if name.is_empty() {
            result.errors.push(ValidationError {
                field: String::from("stackName"),
                message: String::from("Stack name cannot be empty"),
            });
        } else if !is_valid_stack_name(name) {
            result.errors.push(ValidationError {
                field: String::from("stackName"),
                message: format!(
                    "Stack name '{name}' is invalid. Must start with a letter, contain only alphanumerics and hyphens, and be at most {MAX_STACK_NAME_LEN} characters."
                ),
            });
        }
    }

    fn validate_capabilities(&self, capabilities: &[String], result: &mut ValidationResult) {
        if capabilities.is_empty() {
            result.warnings.push(String::from(
                "capabilities: none listed, templates creating IAM resources will be rejected",
            ));
            return;
        }

        for (i, capability) in capabilities.iter().enumerate() {
            if !self.known_capabilities.contains(capability) {
                result.errors.push(ValidationError {
                    field: format!("capabilities[{i}]"),
                    message: format!("Unknown capability '{capability}'"),
                });
            }
        }
    }

    fn validate_parameters(target: &DeployTarget, result: &mut ValidationResult) {
        for key in target.parameters.keys() {
            if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric()) {
                result.errors.push(ValidationError {
                    field: format!("stackParameters.{key}"),
                    message: format!("Parameter key '{key}' must be alphanumeric"),
                });
            }
        }
    }
}

/// Checks a name against the stack naming rules.
fn is_valid_stack_name(name: &str) -> bool {
    name.len() <= MAX_STACK_NAME_LEN
        && name.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}
