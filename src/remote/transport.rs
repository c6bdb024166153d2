//! Transport trait for the remote stack and function services.

use async_trait::async_trait;

use crate::error::Result;
use crate::poller::StatusProbe;

use super::types::{
    CodeLocation, ParameterUpdateRequest, ResourcePage, StackApplyRequest, StackChange,
    StackDescription,
};

/// Calls the deployment core makes against the remote provider.
///
/// Implementations perform exactly one remote call per method and never retry.
#[async_trait]
pub trait StackTransport: Send + Sync {
    /// Fetches the template currently applied to a stack.
    ///
    /// Returns `None` when the stack does not exist.
    async fn get_template(&self, stack_name: &str) -> Result<Option<String>>;

    /// Describes a stack.
    ///
    /// Returns `None` when the stack does not exist.
    async fn describe_stack(&self, stack_name: &str) -> Result<Option<StackDescription>>;

    /// Lists one page of the resources of a stack.
    async fn list_stack_resources(
        &self,
        stack_name: &str,
        next_token: Option<String>,
    ) -> Result<ResourcePage>;

    /// Creates or updates a stack from a whole template.
    async fn apply_stack(&self, request: &StackApplyRequest) -> Result<StackChange>;

    /// Updates parameters while reusing the template already applied.
    async fn update_stack_parameters(&self, request: &ParameterUpdateRequest)
        -> Result<StackChange>;

    /// Replaces the code of one function with an artifact from object storage.
    async fn update_function_code(&self, function_name: &str, location: &CodeLocation)
        -> Result<()>;
}

/// Reads the status string of a stack for the poller.
pub struct StackStatusProbe<'a> {
    transport: &'a dyn StackTransport,
}

impl<'a> StackStatusProbe<'a> {
    /// Creates a probe over a transport.
    #[must_use]
    pub const fn new(transport: &'a dyn StackTransport) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl StatusProbe for StackStatusProbe<'_> {
    async fn probe(&self, handle: &str) -> Result<Option<String>> {
        Ok(self
            .transport
            .describe_stack(handle)
            .await?
            .map(|stack| stack.status))
    }
}
