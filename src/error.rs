//! Error types for the Sampic deployment system.
//!
//! This module provides the error hierarchy for every stage of a deploy:
//! configuration, template loading, resource resolution, remote calls
//! and local snapshot storage.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the Sampic deployment system.
#[derive(Debug, Error)]
pub enum SampicError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Malformed template documents or values inside them.
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// Logical resources that could not be mapped to live resources.
    #[error("Resolution error: {0}")]
    Resolve(#[from] ResolveError),

    /// Errors returned by the remote deployment service.
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Snapshot storage errors.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A deploy ran but did not reach a successful state.
    #[error("Deploy of {stack} did not succeed: {reason}")]
    DeployFailed {
        /// Stack that was deployed.
        stack: String,
        /// Short description of the outcome.
        reason: String,
    },

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// No configuration exists for the active git branch.
    #[error("No deployment configuration set for git branch '{branch}'")]
    UnknownBranch {
        /// The branch that was looked up.
        branch: String,
    },

    /// The configuration lists several stacks and none was selected.
    #[error("Config lists multiple stacks, select one with --stack. Valid stack keys: {}", .valid.join(", "))]
    StackNotSelected {
        /// Stack keys defined for the branch.
        valid: Vec<String>,
    },

    /// The selected stack key is not defined for the branch.
    #[error("Stack key '{key}' not found in branch config. Valid stack keys: {}", .valid.join(", "))]
    UnknownStack {
        /// The requested key.
        key: String,
        /// Stack keys defined for the branch.
        valid: Vec<String>,
    },

    /// The current git branch could not be determined.
    #[error("Unable to determine current git branch: {message}")]
    GitBranch {
        /// Description of the failure.
        message: String,
    },
}

/// Input errors found in template documents.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The template could not be read or parsed.
    #[error("Failed to parse template{}: {message}", .source_path.as_ref().map(|p| format!(" {}", p.display())).unwrap_or_default())]
    Parse {
        /// Description of the parse error.
        message: String,
        /// File the template was read from, if any.
        source_path: Option<PathBuf>,
    },

    /// A code-location value is not a `s3://bucket/key` URI.
    #[error("Invalid code location for resource '{logical_id}': {value}")]
    InvalidCodeLocation {
        /// Logical identifier of the function resource.
        logical_id: String,
        /// The offending value, rendered for display.
        value: String,
    },
}

/// Errors mapping logical identifiers to physical handles.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Some changed resources have no live physical handle.
    #[error(
        "Resource count mismatch on stack {stack}: expected {expected}, resolved {resolved}; missing: {}",
        .missing.join(", ")
    )]
    ResourceCountMismatch {
        /// Stack that was inspected.
        stack: String,
        /// Number of logical identifiers that needed resolving.
        expected: usize,
        /// Number of identifiers that were resolved.
        resolved: usize,
        /// Logical identifiers left unresolved.
        missing: Vec<String>,
    },
}

/// Remote service errors.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// A stack API call failed.
    #[error("CloudFormation {operation} failed: {message}")]
    Stack {
        /// Operation name.
        operation: &'static str,
        /// Error message from the service.
        message: String,
    },

    /// A function code update failed.
    #[error("Lambda code update for {function} failed: {message}")]
    FunctionCode {
        /// Physical function name.
        function: String,
        /// Error message from the service.
        message: String,
    },

    /// An object storage call failed.
    #[error("S3 {operation} failed: {message}")]
    Storage {
        /// Operation name.
        operation: &'static str,
        /// Error message from the service.
        message: String,
    },

    /// The request was throttled.
    #[error("Request throttled by {service}: {message}")]
    Throttled {
        /// Throttling service.
        service: &'static str,
        /// Error message from the service.
        message: String,
    },

    /// The packaging command failed.
    #[error("Command '{command}' exited with code {code:?}: {stderr}")]
    Command {
        /// Rendered command line.
        command: String,
        /// Exit code, if the process exited normally.
        code: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },
}

/// Snapshot storage errors.
#[derive(Debug, Error)]
pub enum StateError {
    /// Stored state is corrupted.
    #[error("State is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// Writing state failed.
    #[error("Failed to write state: {message}")]
    WriteFailed {
        /// Description of the write failure.
        message: String,
    },

    /// Serialization error.
    #[error("State serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },
}

/// Result type alias for Sampic operations.
pub type Result<T> = std::result::Result<T, SampicError>;

impl SampicError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if re-issuing the failed call may succeed.
    ///
    /// The deploy core never retries on its own; this is a hint for callers.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Remote(RemoteError::Throttled { .. }))
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl TemplateError {
    /// Creates a parse error without a source file.
    #[must_use]
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            source_path: None,
        }
    }
}

impl RemoteError {
    /// Creates a stack API error.
    #[must_use]
    pub fn stack(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Stack {
            operation,
            message: message.into(),
        }
    }

    /// Creates a storage API error.
    #[must_use]
    pub fn storage(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Storage {
            operation,
            message: message.into(),
        }
    }
}

impl StateError {
    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    /// Creates a write error with the given message.
    #[must_use]
    pub fn write(message: impl Into<String>) -> Self {
        Self::WriteFailed {
            message: message.into(),
        }
    }
}
