// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// Tests assert with expect() and panic!()
#![cfg_attr(test, allow(clippy::expect_used, clippy::panic))]

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Sampic
//!
//! A change-aware deployment tool for serverless CloudFormation stacks.
//!
//! ## Overview
//!
//! Sampic packages a template, compares it with what is live and applies the
//! cheapest set of remote operations that converges the two:
//!
//! - Function code only changed: replace the code of each changed function
//! - Parameter values only changed: re-apply the current template with new values
//! - Anything else: a full stack create or update
//!
//! ## Architecture
//!
//! A deploy flows one way through the pipeline:
//!
//! 1. **Differ**: Structural diff of the current and candidate templates
//! 2. **Classifier**: Picks exactly one update strategy
//! 3. **Resolver**: Maps logical function ids to live function names
//! 4. **Executor**: Issues the remote calls of the strategy
//! 5. **Poller**: Waits for asynchronous stack operations to settle
//!
//! ## Modules
//!
//! - [`config`]: Branch-keyed configuration, validation and hashing
//! - [`template`]: Template model and differ
//! - [`planner`]: Classification, plans and execution
//! - [`poller`]: Status polling with timeout and cancellation
//! - [`remote`]: Remote service seam and its AWS implementation
//! - [`state`]: Snapshot of the last applied template
//! - [`orchestrator`]: Sequencing of a whole deploy
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! main:
//!   region: eu-west-1
//!   stackName: api-prod
//!   template: template.yaml
//!   capabilities: [CAPABILITY_IAM, CAPABILITY_AUTO_EXPAND]
//!   stackParameters:
//!     Stage: prod
//! develop:
//!   region: eu-west-1
//!   stackName: api-dev
//!   template: template.yaml
//!   capabilities: [CAPABILITY_IAM]
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod planner;
pub mod poller;
pub mod remote;
pub mod state;
pub mod template;

#[cfg(test)]
mod testing;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, DeployTarget, SampicConfig, TemplateHasher};
pub use error::{Result, SampicError};
pub use orchestrator::{DeployOptions, DeployOutcome, Orchestrator};
pub use planner::{ChangeClassifier, DeploymentPlan, PlanExecutor, UpdateDecision};
pub use poller::{OperationStatus, PollSettings, StatusPoller};
pub use remote::{AwsCliPackager, AwsTransport, Packager, StackTransport};
pub use state::{DeploymentState, LocalSnapshotStore, SnapshotStore};
pub use template::{ChangeRecord, Template, TemplateDiff};
