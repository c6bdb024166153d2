//! Remote deployment service access.
//!
//! This module provides:
//! - The [`StackTransport`] trait every remote call goes through
//! - An AWS SDK implementation of it
//! - Template packaging and upload

mod aws;
mod packager;
mod transport;
mod types;

pub use aws::{load_sdk_config, AwsTransport};
pub use packager::{AwsCliPackager, PackagedTemplate, Packager};
pub use transport::{StackStatusProbe, StackTransport};
pub use types::{
    CodeLocation, ParameterSetting, ParameterUpdateRequest, ResourcePage, StackApplyRequest,
    StackChange, StackDescription, StackOperationKind, StackParameter, StackResourceSummary,
    TemplateSource,
};
