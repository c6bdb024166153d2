//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Sampic - branch-aware serverless stack deployer.
#[derive(Parser, Debug)]
#[command(name = "sampic")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "SAMPIC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Git branch whose settings are used (defaults to the checked out branch).
    #[arg(short, long, global = true)]
    pub branch: Option<String>,

    /// Stack key, when the branch lists several stacks.
    #[arg(short, long, global = true)]
    pub stack: Option<String>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Package, analyse and deploy the stack.
    Deploy(DeployArgs),

    /// Package and analyse only; nothing is changed remotely.
    Plan {
        /// Diff against the local snapshot instead of the live template.
        #[arg(long)]
        use_local_snapshot: bool,
    },

    /// Show the live stack status and parameters.
    Status,

    /// Show the resolved deploy settings.
    ShowConfig,

    /// Validate the configuration.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },
}

/// Arguments of the deploy command.
#[derive(Args, Debug, Clone)]
pub struct DeployArgs {
    /// Apply the whole template even if a cheaper strategy would do.
    #[arg(short, long)]
    pub force: bool,

    /// Diff against the local snapshot instead of the live template.
    #[arg(long)]
    pub use_local_snapshot: bool,

    /// Seconds to wait for a stack operation before giving up.
    #[arg(long, default_value = "1800")]
    pub timeout: u64,

    /// Seconds between two status polls.
    #[arg(long, default_value = "5")]
    pub poll_interval: u64,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
