//! Planning module for deployment operations.
//!
//! This module classifies template and parameter changes into an update
//! strategy, freezes the result into a plan and executes that plan.

mod classify;
mod executor;
mod params;
mod plan;
mod resolve;

pub use classify::{
    is_function_code_edit, ChangeClassifier, Classification, ClassifyInput, UpdateDecision,
    CODE_LOCATION_PROPERTIES, FUNCTION_RESOURCE_TYPES,
};
pub use executor::{Candidate, CodeUpdateResult, ExecutionReport, PlanExecutor, StackContext};
pub use params::{LiveStackParameters, ParameterDelta, ParameterMap, ParameterSource};
pub use plan::{CodeTarget, DeploymentPlan, ResourceTarget};
pub use resolve::ResourceResolver;
