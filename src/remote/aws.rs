//! AWS implementation of the stack transport.
//!
//! Stack operations go to CloudFormation, code updates to Lambda.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_cloudformation::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_cloudformation::types::{Capability, Parameter, Stack, TemplateStage};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::error::{RemoteError, Result};

use super::transport::StackTransport;
use super::types::{
    CodeLocation, ParameterSetting, ParameterUpdateRequest, ResourcePage, StackApplyRequest,
    StackChange, StackDescription, StackOperationKind, StackParameter, StackResourceSummary,
    TemplateSource,
};

/// Error code CloudFormation uses for invalid requests, including missing stacks.
const VALIDATION_ERROR: &str = "ValidationError";

/// Error codes that signal request throttling.
const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "TooManyRequestsException",
    "RequestLimitExceeded",
];

/// Loads shared SDK configuration for a region and optional named profile.
pub async fn load_sdk_config(region: &str, profile: Option<&str>) -> SdkConfig {
    let mut loader =
        aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_string()));
    if let Some(profile) = profile {
        loader = loader.profile_name(profile);
    }
    loader.load().await
}

/// Stack transport backed by the AWS SDK.
#[derive(Debug, Clone)]
pub struct AwsTransport {
    /// CloudFormation client.
    cloudformation: aws_sdk_cloudformation::Client,
    /// Lambda client.
    lambda: aws_sdk_lambda::Client,
}

impl AwsTransport {
    /// Creates a transport from shared SDK configuration.
    #[must_use]
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            cloudformation: aws_sdk_cloudformation::Client::new(config),
            lambda: aws_sdk_lambda::Client::new(config),
        }
    }
}

#[async_trait]
impl StackTransport for AwsTransport {
    async fn get_template(&self, stack_name: &str) -> Result<Option<String>> {
        debug!("Fetching template of stack {stack_name}");

        let result = self
            .cloudformation
            .get_template()
            .stack_name(stack_name)
            .template_stage(TemplateStage::Original)
            .send()
            .await;

        match result {
            Ok(output) => Ok(output.template_body().map(str::to_string)),
            Err(sdk_err) => {
                let err = sdk_err.into_service_error();
                if is_missing_stack(&err) {
                    Ok(None)
                } else {
                    Err(stack_error("GetTemplate", &err).into())
                }
            }
        }
    }

    async fn describe_stack(&self, stack_name: &str) -> Result<Option<StackDescription>> {
        let result = self
            .cloudformation
            .describe_stacks()
            .stack_name(stack_name)
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(sdk_err) => {
                let err = sdk_err.into_service_error();
                if is_missing_stack(&err) {
                    return Ok(None);
                }
                return Err(stack_error("DescribeStacks", &err).into());
            }
        };

        let Some(stack) = output.stacks().first() else {
            return Ok(None);
        };

        Ok(Some(describe(stack)))
    }

    async fn list_stack_resources(
        &self,
        stack_name: &str,
        next_token: Option<String>,
    ) -> Result<ResourcePage> {
        let output = self
            .cloudformation
            .list_stack_resources()
            .stack_name(stack_name)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| stack_error("ListStackResources", &e.into_service_error()))?;

        let resources = output
            .stack_resource_summaries()
            .iter()
            .map(|summary| StackResourceSummary {
                logical_id: summary.logical_resource_id().to_string(),
                physical_id: summary.physical_resource_id().map(str::to_string),
                resource_type: summary.resource_type().to_string(),
            })
            .collect();

        Ok(ResourcePage {
            resources,
            next_token: output.next_token().map(str::to_string),
        })
    }

    async fn apply_stack(&self, request: &StackApplyRequest) -> Result<StackChange> {
        let capabilities = to_capabilities(&request.capabilities);
        let parameters = to_parameters(&request.parameters);

        let result = match request.kind {
            StackOperationKind::Create => {
                info!("Creating stack {}", request.stack_name);
                let builder = self
                    .cloudformation
                    .create_stack()
                    .stack_name(&request.stack_name)
                    .set_capabilities(capabilities)
                    .set_parameters(parameters)
                    .client_request_token(&request.client_request_token);
                let builder = match &request.template {
                    TemplateSource::Body(body) => builder.template_body(body),
                    TemplateSource::Url(url) => builder.template_url(url),
                };
                builder
                    .send()
                    .await
                    .map(|out| out.stack_id().map(str::to_string))
                    .map_err(|e| change_failure("CreateStack", &e.into_service_error()))
            }
            StackOperationKind::Update => {
                info!("Updating stack {}", request.stack_name);
                let builder = self
                    .cloudformation
                    .update_stack()
                    .stack_name(&request.stack_name)
                    .set_capabilities(capabilities)
                    .set_parameters(parameters)
                    .client_request_token(&request.client_request_token);
                let builder = match &request.template {
                    TemplateSource::Body(body) => builder.template_body(body),
                    TemplateSource::Url(url) => builder.template_url(url),
                };
                builder
                    .send()
                    .await
                    .map(|out| out.stack_id().map(str::to_string))
                    .map_err(|e| change_failure("UpdateStack", &e.into_service_error()))
            }
        };

        stack_change(&request.stack_name, result)
    }

    async fn update_stack_parameters(
        &self,
        request: &ParameterUpdateRequest,
    ) -> Result<StackChange> {
        info!("Updating parameters of stack {}", request.stack_name);

        let result = self
            .cloudformation
            .update_stack()
            .stack_name(&request.stack_name)
            .use_previous_template(true)
            .set_capabilities(to_capabilities(&request.capabilities))
            .set_parameters(to_parameters(&request.parameters))
            .client_request_token(&request.client_request_token)
            .send()
            .await
            .map(|out| out.stack_id().map(str::to_string))
            .map_err(|e| change_failure("UpdateStack", &e.into_service_error()));

        stack_change(&request.stack_name, result)
    }

    async fn update_function_code(
        &self,
        function_name: &str,
        location: &CodeLocation,
    ) -> Result<()> {
        debug!("Updating code of {function_name} from {location}");

        self.lambda
            .update_function_code()
            .function_name(function_name)
            .s3_bucket(&location.bucket)
            .s3_key(&location.key)
            .publish(false)
            .send()
            .await
            .map_err(|e| {
                let err = e.into_service_error();
                let message = error_message(&err);
                if is_throttled(&err) {
                    RemoteError::Throttled {
                        service: "lambda",
                        message,
                    }
                } else {
                    RemoteError::FunctionCode {
                        function: function_name.to_string(),
                        message,
                    }
                }
            })?;

        Ok(())
    }
}

/// Failure of a create or update call.
enum ChangeFailure {
    /// The service reported that the stack already matches the request.
    NoUpdates,
    /// Any other error.
    Failed(RemoteError),
}

fn change_failure<E>(operation: &'static str, err: &E) -> ChangeFailure
where
    E: ProvideErrorMetadata + std::error::Error,
{
    if is_no_updates(err) {
        ChangeFailure::NoUpdates
    } else {
        ChangeFailure::Failed(stack_error(operation, err))
    }
}

/// Converts the outcome of a create or update call into a stack change.
fn stack_change(
    stack_name: &str,
    result: std::result::Result<Option<String>, ChangeFailure>,
) -> Result<StackChange> {
    match result {
        Ok(stack_id) => {
            let stack_id = stack_id.unwrap_or_else(|| stack_name.to_string());
            debug!("Change accepted for {stack_id}");
            Ok(StackChange::Started { stack_id })
        }
        Err(ChangeFailure::NoUpdates) => {
            info!("No updates are to be performed on {stack_name}");
            Ok(StackChange::NoUpdates)
        }
        Err(ChangeFailure::Failed(err)) => Err(err.into()),
    }
}

fn to_capabilities(capabilities: &[String]) -> Option<Vec<Capability>> {
    if capabilities.is_empty() {
        return None;
    }
    Some(capabilities.iter().map(|c| Capability::from(c.as_str())).collect())
}

fn to_parameters(parameters: &[StackParameter]) -> Option<Vec<Parameter>> {
    if parameters.is_empty() {
        return None;
    }
    Some(
        parameters
            .iter()
            .map(|param| {
                let builder = Parameter::builder().parameter_key(&param.key);
                match &param.setting {
                    ParameterSetting::Value(value) => builder.parameter_value(value),
                    ParameterSetting::UsePrevious => builder.use_previous_value(true),
                }
                .build()
            })
            .collect(),
    )
}

/// Converts a described stack into its wire-neutral form.
fn describe(stack: &Stack) -> StackDescription {
    let parameters: BTreeMap<String, String> = stack
        .parameters()
        .iter()
        .filter_map(|p| {
            Some((
                p.parameter_key()?.to_string(),
                p.parameter_value().unwrap_or_default().to_string(),
            ))
        })
        .collect();

    StackDescription {
        stack_name: stack.stack_name().to_string(),
        stack_id: stack.stack_id().map(str::to_string),
        status: stack.stack_status().as_str().to_string(),
        status_reason: stack.stack_status_reason().map(str::to_string),
        parameters,
    }
}

fn is_missing_stack<E: ProvideErrorMetadata>(err: &E) -> bool {
    err.code() == Some(VALIDATION_ERROR)
        && err.message().is_some_and(|m| m.contains("does not exist"))
}

fn is_no_updates<E: ProvideErrorMetadata>(err: &E) -> bool {
    err.code() == Some(VALIDATION_ERROR)
        && err
            .message()
            .is_some_and(|m| m.contains("No updates are to be performed"))
}

fn is_throttled<E: ProvideErrorMetadata>(err: &E) -> bool {
    err.code().is_some_and(|code| THROTTLING_CODES.contains(&code))
}

fn error_message<E>(err: &E) -> String
where
    E: ProvideErrorMetadata + std::error::Error,
{
    err.message()
        .map_or_else(|| DisplayErrorContext(err).to_string(), str::to_string)
}

/// Maps a CloudFormation error to a remote error, separating throttling.
fn stack_error<E>(operation: &'static str, err: &E) -> RemoteError
where
    E: ProvideErrorMetadata + std::error::Error,
{
    let message = error_message(err);
    if is_throttled(err) {
        return RemoteError::Throttled {
            service: "cloudformation",
            message,
        };
    }
    RemoteError::stack(operation, message)
}
