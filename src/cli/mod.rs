//! CLI module for the Sampic deployment tool.
//!
//! This module provides the command-line interface for deploying
//! serverless stacks.

mod commands;
mod output;

pub use commands::{Cli, Commands, DeployArgs, OutputFormat};
pub use output::OutputFormatter;
