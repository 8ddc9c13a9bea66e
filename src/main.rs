//! Halldyll lifecycle CLI entrypoint.
//!
//! This is the main entrypoint for the halldyll-lifecycle command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use halldyll_lifecycle::cli::{Cli, Commands, OutputFormatter, StateCommands};
use halldyll_lifecycle::config::{
    ConfigParser, ConfigValidator, LifecycleConfig, StateBackend, find_config_file,
};
use halldyll_lifecycle::control_plane::HttpControlPlane;
use halldyll_lifecycle::engine::Deadline;
use halldyll_lifecycle::error::{LifecycleError, Result};
use halldyll_lifecycle::reconciler::{LifecycleRequest, Reconciler};
use halldyll_lifecycle::state::{LocalStateStore, S3StateStore, StateStore};

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
///
/// `RUST_LOG` wins over the verbosity flag when set.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<ExitCode> {
    let formatter = OutputFormatter::new(cli.output);

    match &cli.command {
        Commands::Validate { warnings } => {
            cmd_validate(cli.config.as_ref(), *warnings, &formatter)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::State { command } => {
            cmd_state(cli.config.as_ref(), command, &formatter).await?;
            Ok(ExitCode::SUCCESS)
        }
        other => {
            let request = other.to_request()?.ok_or_else(|| {
                LifecycleError::internal("Command does not map to a lifecycle call")
            })?;
            cmd_lifecycle(cli.config.as_ref(), request, cli.timeout_secs, &formatter).await
        }
    }
}

/// Validate configuration.
fn cmd_validate(
    config_path: Option<&PathBuf>,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config_file = resolve_config_path(config_path)?;
    info!("Validating configuration: {}", config_file.display());

    let parser = ConfigParser::new().with_base_path(parent_dir(&config_file));
    parser.load_dotenv()?;
    let config = parser.load_with_env(&config_file)?;

    let result = ConfigValidator::new().validate(&config)?;
    emit(&formatter.format_validation(&config, &result, show_warnings))
}

/// Run one lifecycle call to completion.
async fn cmd_lifecycle(
    config_path: Option<&PathBuf>,
    request: LifecycleRequest,
    timeout_secs: Option<u64>,
    formatter: &OutputFormatter,
) -> Result<ExitCode> {
    let (config, store) = load_config_and_state(config_path).await?;
    let plane = HttpControlPlane::from_config(&config)?;
    let reconciler = Reconciler::new(&config, &plane, &store);

    let timeout = timeout_secs.map_or_else(|| config.timeout(request.kind()), Duration::from_secs);
    let token = CancellationToken::new();
    let deadline = Deadline::with_token(timeout, token.clone());

    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, canceling");
            token.cancel();
        }
    });

    let result = reconciler.reconcile(request, &deadline).await;
    watcher.abort();

    emit(&formatter.format_reconciliation(&result))?;

    if result.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// State inspection commands.
async fn cmd_state(
    config_path: Option<&PathBuf>,
    command: &StateCommands,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (_config, store) = load_config_and_state(config_path).await?;
    debug!("Using {} state backend", store.backend_type());

    match command {
        StateCommands::List => {
            let states = store.list().await?;
            emit(&formatter.format_state_list(&states))
        }
        StateCommands::Show { key } => match store.load(key).await? {
            Some(state) => emit(&formatter.format_state(&state)),
            None => {
                eprintln!("No state found for {key}.");
                Ok(())
            }
        },
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Writes command output to stdout.
fn emit(output: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{output}")?;
    Ok(())
}

/// Resolves the configuration file path.
fn resolve_config_path(config_path: Option<&PathBuf>) -> Result<PathBuf> {
    config_path.map_or_else(|| find_config_file("."), |path| Ok(path.clone()))
}

fn parent_dir(path: &Path) -> &Path {
    path.parent().unwrap_or_else(|| Path::new("."))
}

/// Loads configuration and creates the configured state store.
async fn load_config_and_state(
    config_path: Option<&PathBuf>,
) -> Result<(LifecycleConfig, Box<dyn StateStore>)> {
    let config_file = resolve_config_path(config_path)?;
    debug!("Loading configuration from: {}", config_file.display());

    let parser = ConfigParser::new().with_base_path(parent_dir(&config_file));
    parser.load_dotenv()?;
    let config = parser.load_with_env(&config_file)?;

    let result = ConfigValidator::new().validate(&config)?;
    for warning in &result.warnings {
        warn!("{warning}");
    }

    let store: Box<dyn StateStore> = match config.state.backend {
        StateBackend::Local => {
            let local = config.state.path.as_deref().map_or_else(
                || LocalStateStore::in_project(parent_dir(&config_file)),
                LocalStateStore::with_base_dir,
            );
            debug!("Local state directory: {}", local.state_dir().display());
            Box::new(local)
        }
        StateBackend::S3 => {
            let bucket = config
                .state
                .bucket
                .as_deref()
                .ok_or_else(|| LifecycleError::internal("S3 bucket not configured"))?;
            let prefix = config.state.prefix.as_deref();
            let region = config.state.region.as_deref();
            Box::new(S3StateStore::new(bucket, prefix, region).await?)
        }
    };

    Ok((config, store))
}
