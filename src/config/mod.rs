//! Configuration module for the deployment system.
//!
//! This module handles all configuration-related functionality:
//! - Parsing the branch-keyed configuration file
//! - Selecting and validating the settings of one deployment
//! - Computing digests recorded with each deployment

mod branch;
mod hash;
mod parser;
mod spec;
mod validator;

pub use branch::{current_git_branch, parse_porcelain_branch};
pub use hash::TemplateHasher;
pub use parser::{find_config_file, ConfigParser, DEFAULT_CONFIG_DIR, DEFAULT_CONFIG_FILES};
pub use spec::{BranchConfig, DeployTarget, SampicConfig, StackEntry};
pub use validator::{ConfigValidator, ValidationError, ValidationResult, KNOWN_CAPABILITIES};
