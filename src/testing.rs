//! In-memory stack transport for unit tests.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::error::{RemoteError, Result};
use crate::remote::{
    CodeLocation, ParameterUpdateRequest, ResourcePage, StackApplyRequest, StackChange,
    StackDescription, StackResourceSummary, StackTransport,
};

/// One recorded transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    GetTemplate,
    DescribeStack,
    ListStackResources,
    ApplyStack(StackApplyRequest),
    UpdateStackParameters(ParameterUpdateRequest),
    UpdateFunctionCode(String, CodeLocation),
}

impl Call {
    const fn name(&self) -> &'static str {
        match self {
            Self::GetTemplate => "get_template",
            Self::DescribeStack => "describe_stack",
            Self::ListStackResources => "list_stack_resources",
            Self::ApplyStack(_) => "apply_stack",
            Self::UpdateStackParameters(_) => "update_stack_parameters",
            Self::UpdateFunctionCode(..) => "update_function_code",
        }
    }
}

/// Scriptable fake of the remote services.
#[derive(Debug, Default)]
pub struct FakeTransport {
    template: Option<String>,
    exists: AtomicBool,
    parameters: BTreeMap<String, String>,
    statuses: Mutex<VecDeque<String>>,
    pages: Vec<Vec<(String, Option<String>)>>,
    failing_functions: BTreeSet<String>,
    no_updates: bool,
    reject_parameters: bool,
    calls: Mutex<Vec<Call>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the stack exist with the given live parameters.
    pub fn with_stack(mut self, parameters: &[(&str, &str)]) -> Self {
        self.exists = AtomicBool::new(true);
        self.parameters = parameters
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        self
    }

    pub fn with_template(mut self, template: &str) -> Self {
        self.exists = AtomicBool::new(true);
        self.template = Some(template.to_string());
        self
    }

    /// Statuses returned by successive describes; the last one repeats.
    pub fn with_statuses(self, statuses: &[&str]) -> Self {
        *self.statuses.lock().expect("statuses lock") =
            statuses.iter().map(|s| (*s).to_string()).collect();
        self
    }

    pub fn with_resource_pages(mut self, pages: Vec<Vec<(&str, Option<&str>)>>) -> Self {
        self.pages = pages
            .into_iter()
            .map(|page| {
                page.into_iter()
                    .map(|(logical, physical)| (logical.to_string(), physical.map(str::to_string)))
                    .collect()
            })
            .collect();
        self
    }

    pub fn with_failing_function(mut self, physical_id: &str) -> Self {
        self.failing_functions.insert(physical_id.to_string());
        self
    }

    /// Answers stack updates with "no updates are to be performed".
    pub const fn with_no_updates(mut self) -> Self {
        self.no_updates = true;
        self
    }

    /// Rejects every parameter update request.
    pub const fn with_rejected_parameter_updates(mut self) -> Self {
        self.reject_parameters = true;
        self
    }

    pub fn calls(&self, name: &str) -> usize {
        self.log().iter().filter(|call| call.name() == name).count()
    }

    /// Names of mutating calls in the order they were made.
    pub fn mutations(&self) -> Vec<&'static str> {
        self.log()
            .iter()
            .map(Call::name)
            .filter(|name| {
                matches!(
                    *name,
                    "apply_stack" | "update_stack_parameters" | "update_function_code"
                )
            })
            .collect()
    }

    pub fn applied(&self) -> Vec<StackApplyRequest> {
        self.log()
            .into_iter()
            .filter_map(|call| match call {
                Call::ApplyStack(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    pub fn parameter_updates(&self) -> Vec<ParameterUpdateRequest> {
        self.log()
            .into_iter()
            .filter_map(|call| match call {
                Call::UpdateStackParameters(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    pub fn code_updates(&self) -> Vec<(String, CodeLocation)> {
        self.log()
            .into_iter()
            .filter_map(|call| match call {
                Call::UpdateFunctionCode(function, location) => Some((function, location)),
                _ => None,
            })
            .collect()
    }

    fn log(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().expect("calls lock").push(call);
    }

    fn next_status(&self) -> String {
        let mut statuses = self.statuses.lock().expect("statuses lock");
        if statuses.len() > 1 {
            statuses.pop_front().unwrap_or_default()
        } else {
            statuses
                .front()
                .cloned()
                .unwrap_or_else(|| String::from("UPDATE_COMPLETE"))
        }
    }

    fn change(&self, stack_name: &str) -> StackChange {
        if self.no_updates {
            StackChange::NoUpdates
        } else {
            StackChange::Started {
                stack_id: format!("arn:aws:cloudformation:eu-west-1:123456789012:stack/{stack_name}/1"),
            }
        }
    }
}

#[async_trait]
impl StackTransport for FakeTransport {
    async fn get_template(&self, _stack_name: &str) -> Result<Option<String>> {
        self.record(Call::GetTemplate);
        Ok(self.template.clone())
    }

    async fn describe_stack(&self, stack_name: &str) -> Result<Option<StackDescription>> {
        self.record(Call::DescribeStack);
        if !self.exists.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(Some(StackDescription {
            stack_name: stack_name.to_string(),
            stack_id: None,
            status: self.next_status(),
            status_reason: None,
            parameters: self.parameters.clone(),
        }))
    }

    async fn list_stack_resources(
        &self,
        _stack_name: &str,
        next_token: Option<String>,
    ) -> Result<ResourcePage> {
        self.record(Call::ListStackResources);
        let index: usize = next_token.and_then(|t| t.parse().ok()).unwrap_or(0);
        let resources = self
            .pages
            .get(index)
            .map(|page| {
                page.iter()
                    .map(|(logical, physical)| StackResourceSummary {
                        logical_id: logical.clone(),
                        physical_id: physical.clone(),
                        resource_type: String::from("AWS::Lambda::Function"),
                    })
                    .collect()
            })
            .unwrap_or_default();
        let next_token = (index + 1 < self.pages.len()).then(|| (index + 1).to_string());
        Ok(ResourcePage {
            resources,
            next_token,
        })
    }

    async fn apply_stack(&self, request: &StackApplyRequest) -> Result<StackChange> {
        self.record(Call::ApplyStack(request.clone()));
        self.exists.store(true, Ordering::SeqCst);
        Ok(self.change(&request.stack_name))
    }

    async fn update_stack_parameters(
        &self,
        request: &ParameterUpdateRequest,
    ) -> Result<StackChange> {
        self.record(Call::UpdateStackParameters(request.clone()));
        if self.reject_parameters {
            return Err(RemoteError::Stack {
                operation: "UpdateStack",
                message: String::from("Parameters: [Stage] must have values"),
            }
            .into());
        }
        Ok(self.change(&request.stack_name))
    }

    async fn update_function_code(
        &self,
        function_name: &str,
        location: &CodeLocation,
    ) -> Result<()> {
        self.record(Call::UpdateFunctionCode(
            function_name.to_string(),
            location.clone(),
        ));
        if self.failing_functions.contains(function_name) {
            return Err(RemoteError::FunctionCode {
                function: function_name.to_string(),
                message: String::from("AccessDeniedException"),
            }
            .into());
        }
        Ok(())
    }
}
