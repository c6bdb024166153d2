//! Parsed infrastructure template.

use serde_yaml::{Mapping, Value};
use std::path::Path;
use tracing::debug;

use crate::error::{Result, TemplateError};

/// Name of the section holding resource declarations.
pub const RESOURCES_SECTION: &str = "Resources";

/// Name of the section holding parameter declarations.
pub const PARAMETERS_SECTION: &str = "Parameters";

/// An immutable, ordered infrastructure template.
///
/// CloudFormation short-form intrinsics (`!Ref`, `!GetAtt`, ...) are kept as
/// tagged YAML values so that they compare and serialize faithfully.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    /// Root mapping of the document.
    root: Mapping,
}

impl Template {
    /// Parses a template from YAML or JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid YAML or its root is not a mapping.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(content)
            .map_err(|e| TemplateError::parse(format!("YAML parse error: {e}")))?;

        match value {
            Value::Mapping(root) => Ok(Self { root }),
            other => Err(TemplateError::parse(format!(
                "template root must be a mapping, found {}",
                kind_of(&other)
            ))
            .into()),
        }
    }

    /// Loads a template from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading template from: {}", path.display());

        let content = std::fs::read_to_string(path).map_err(|e| TemplateError::Parse {
            message: format!("Failed to read file: {e}"),
            source_path: Some(path.to_path_buf()),
        })?;

        Self::from_yaml_str(&content).map_err(|e| match e {
            crate::error::SampicError::Template(TemplateError::Parse { message, .. }) => {
                TemplateError::Parse {
                    message,
                    source_path: Some(path.to_path_buf()),
                }
                .into()
            }
            other => other,
        })
    }

    /// Builds a template directly from a root mapping.
    #[must_use]
    pub const fn from_mapping(root: Mapping) -> Self {
        Self { root }
    }

    /// Returns the root mapping.
    #[must_use]
    pub const fn root(&self) -> &Mapping {
        &self.root
    }

    /// Returns a top-level section if present and a mapping.
    #[must_use]
    pub fn section(&self, name: &str) -> Option<&Mapping> {
        self.root.get(name).and_then(Value::as_mapping)
    }

    /// Returns a resource declaration by logical identifier.
    #[must_use]
    pub fn resource(&self, logical_id: &str) -> Option<&Mapping> {
        self.section(RESOURCES_SECTION)
            .and_then(|resources| resources.get(logical_id))
            .and_then(Value::as_mapping)
    }

    /// Returns the `Type` tag of a resource.
    #[must_use]
    pub fn resource_type(&self, logical_id: &str) -> Option<&str> {
        self.resource(logical_id)
            .and_then(|resource| resource.get("Type"))
            .and_then(Value::as_str)
    }

    /// Returns the names of the declared parameters in declaration order.
    #[must_use]
    pub fn declared_parameters(&self) -> Vec<&str> {
        self.section(PARAMETERS_SECTION)
            .map(|params| params.keys().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Serializes the template back to YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(&self.root)
            .map_err(|e| TemplateError::parse(format!("YAML serialization error: {e}")).into())
    }
}

/// Short description of a YAML node kind for error messages.
const fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "an empty document",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
