//! Sampic CLI entrypoint.
//!
//! This is the main entrypoint for the sampic command-line tool.

use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use sampic::cli::{Cli, Commands, DeployArgs, OutputFormat, OutputFormatter};
use sampic::config::{
    current_git_branch, find_config_file, ConfigParser, ConfigValidator, DeployTarget,
};
use sampic::error::{Result, SampicError};
use sampic::orchestrator::{DeployOptions, Orchestrator};
use sampic::planner::Candidate;
use sampic::poller::{detach_on_interrupt, PollSettings, StatusPoller};
use sampic::remote::{
    load_sdk_config, AwsCliPackager, AwsTransport, Packager, StackTransport, TemplateSource,
};
use sampic::state::{LocalSnapshotStore, SnapshotStore};
use sampic::template::Template;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// Environment variable naming an alternative AWS CLI executable.
const AWS_CLI_ENV: &str = "SAMPIC_AWS_CLI";

/// Exit code after a second interrupt.
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose, matches!(cli.output, OutputFormat::Json));

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let formatter = OutputFormatter::new(cli.output);
    match runtime.block_on(run(cli, &formatter)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", formatter.error(&e.to_string()));
            if e.is_retryable() {
                eprintln!("The request was throttled; running the command again may succeed.");
            }
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
///
/// `RUST_LOG` takes precedence over the verbosity flag.
fn init_logging(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Main async entry point.
async fn run(cli: Cli, formatter: &OutputFormatter) -> Result<()> {
    let target = load_target(&cli)?;

    match cli.command {
        Commands::ShowConfig => {
            eprintln!("{}", formatter.format_target(&target));
            Ok(())
        }
        Commands::Validate { warnings } => cmd_validate(&target, warnings, formatter),
        Commands::Status => cmd_status(&target, formatter).await,
        Commands::Plan { use_local_snapshot } => {
            cmd_plan(&target, use_local_snapshot, formatter).await
        }
        Commands::Deploy(args) => cmd_deploy(&target, &args, formatter).await,
    }
}

/// Loads the configuration and resolves the settings of this deploy.
fn load_target(cli: &Cli) -> Result<DeployTarget> {
    let cwd = std::env::current_dir()?;
    let config_file = match &cli.config {
        Some(path) if path.is_absolute() => path.clone(),
        Some(path) => cwd.join(path),
        None => find_config_file(&cwd)?,
    };

    let state_dir = config_file
        .parent()
        .map_or_else(|| cwd.clone(), Path::to_path_buf);
    let project_root = state_dir
        .parent()
        .map_or_else(|| state_dir.clone(), Path::to_path_buf);

    let parser = ConfigParser::new().with_base_path(&project_root);
    parser.load_dotenv()?;
    let config = parser.load_file(&config_file)?;

    let branch = match &cli.branch {
        Some(branch) => branch.clone(),
        None => current_git_branch(&project_root)?,
    };
    info!("Using configuration of branch {branch}");

    let mut target =
        ConfigParser::resolve_target(&config, &branch, cli.stack.as_deref(), &state_dir)?;
    ConfigParser::apply_env_overrides(&mut target);
    debug!("Resolved deploy target: {target:?}");
    Ok(target)
}

/// Validate configuration.
fn cmd_validate(
    target: &DeployTarget,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let validator = ConfigValidator::new();
    let result = validator.check(target);
    eprintln!("{}", formatter.format_validation(&result, show_warnings));

    validator.validate(target)?;
    Ok(())
}

/// Show live stack status.
async fn cmd_status(target: &DeployTarget, formatter: &OutputFormatter) -> Result<()> {
    let sdk = load_sdk_config(&target.region, target.profile.as_deref()).await;
    let transport = AwsTransport::new(&sdk);
    let store = LocalSnapshotStore::for_target(target);

    let description = transport.describe_stack(&target.stack_name).await?;
    let state = store.load_state().await?;

    eprintln!(
        "{}",
        formatter.format_status(&target.stack_name, description.as_ref(), state.as_ref())
    );
    Ok(())
}

/// Show the deployment plan without changing anything.
async fn cmd_plan(
    target: &DeployTarget,
    use_local_snapshot: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    ConfigValidator::new().validate(target)?;

    let sdk = load_sdk_config(&target.region, target.profile.as_deref()).await;
    let transport = AwsTransport::new(&sdk);
    let store = LocalSnapshotStore::for_target(target);
    let candidate = package(target, &sdk).await?;

    let orchestrator = Orchestrator::new(
        &transport,
        &store,
        target.stack_context(),
        StatusPoller::new(PollSettings::default(), CancellationToken::new()),
    );
    let current = orchestrator.fetch_current_template(use_local_snapshot).await?;
    let plan = orchestrator
        .plan(current.as_ref(), &candidate.template, &target.parameters, false)
        .await?;

    eprintln!("{}", formatter.format_plan(&plan));
    Ok(())
}

/// Package, analyse and deploy.
async fn cmd_deploy(
    target: &DeployTarget,
    args: &DeployArgs,
    formatter: &OutputFormatter,
) -> Result<()> {
    ConfigValidator::new().validate(target)?;

    let sdk = load_sdk_config(&target.region, target.profile.as_deref()).await;
    let transport = AwsTransport::new(&sdk);
    let store = LocalSnapshotStore::for_target(target);
    let candidate = package(target, &sdk).await?;

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let settings = PollSettings {
        interval: Duration::from_secs(args.poll_interval.max(1)),
        timeout: Duration::from_secs(args.timeout),
    };
    let orchestrator = Orchestrator::new(
        &transport,
        &store,
        target.stack_context(),
        StatusPoller::new(settings, cancel),
    );

    let options = DeployOptions {
        force: args.force,
        prefer_snapshot: args.use_local_snapshot,
    };
    let outcome = orchestrator
        .plan_and_execute(&candidate, &target.parameters, options)
        .await?;

    eprintln!("{}", formatter.format_outcome(&outcome));

    if outcome.success {
        Ok(())
    } else {
        let reason = outcome.report.stack_status.as_ref().map_or_else(
            || String::from("one or more steps failed"),
            ToString::to_string,
        );
        Err(SampicError::DeployFailed {
            stack: target.stack_name.clone(),
            reason,
        })
    }
}

/// Packages the template and loads the packaged result as the candidate.
async fn package(target: &DeployTarget, sdk: &aws_config::SdkConfig) -> Result<Candidate> {
    let mut packager = AwsCliPackager::new(sdk);
    if let Ok(program) = std::env::var(AWS_CLI_ENV) {
        packager = packager.with_program(program);
    }

    let packaged = packager.package(target).await?;
    let template = Template::load(&packaged.path)?;
    let url = packaged.location.https_url(&target.region);
    info!("Candidate template uploaded to {}", packaged.location);

    Ok(Candidate {
        template,
        source: TemplateSource::Url(url),
    })
}

/// Cancels stack observation on the first Ctrl-C and exits on the second.
///
/// Remote operations keep running either way.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if detach_on_interrupt(tokio::signal::ctrl_c, cancel).await {
            error!("Interrupted again, exiting");
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    });
}
