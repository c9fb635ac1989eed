//! Edgeplane CLI entrypoint.
//!
//! This is the main entrypoint for the edgeplane command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use edgeplane::bundle::Bundler;
use edgeplane::cli::{Cli, Commands, LogFormat, OutputFormatter};
use edgeplane::config::{find_manifest_file, LoadedManifest, ManifestParser, Settings};
use edgeplane::credentials::ProviderKind;
use edgeplane::error::Result;
use edgeplane::lifecycle::WaitOptions;
use edgeplane::logs::LogPage;
use edgeplane::services::Services;

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose, cli.log_format);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
///
/// `RUST_LOG` overrides the default level.
fn init_logging(verbose: bool, format: LogFormat) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);
    let manifest_path = cli.manifest.as_deref();

    match cli.command {
        Commands::Bundle { contents, provider } => {
            cmd_bundle(manifest_path, contents, provider, &formatter)
        }
        command => {
            let services = load_services(manifest_path).await?;
            dispatch(command, manifest_path, &services, &formatter).await
        }
    }
}

async fn dispatch(
    command: Commands,
    manifest_path: Option<&Path>,
    services: &Services,
    formatter: &OutputFormatter,
) -> Result<()> {
    match command {
        Commands::Deploy {
            wait,
            max_attempts,
            interval_ms,
        } => {
            let options = wait.then(|| WaitOptions::new(max_attempts, interval_ms));
            cmd_deploy(manifest_path, services, options, formatter).await
        }
        Commands::Status { deployment_id } => {
            let deployment = services.controller().get_deployment(&deployment_id).await?;
            emit(&formatter.format_deployment(&deployment))
        }
        Commands::Wait {
            deployment_id,
            max_attempts,
            interval_ms,
        } => {
            let outcome = services
                .controller()
                .wait_for_deployment(&deployment_id, WaitOptions::new(max_attempts, interval_ms))
                .await?;
            emit(&formatter.format_outcome(&outcome))
        }
        Commands::Cancel { deployment_id } => {
            services.controller().cancel_deployment(&deployment_id).await;
            eprintln!("Cancellation requested for {deployment_id}.");
            Ok(())
        }
        Commands::Sources => {
            let sources = services.logs().get_log_sources().await?;
            emit(&formatter.format_sources(&sources))
        }
        Commands::Logs {
            source,
            limit,
            cursor,
        } => {
            let page = services
                .logs()
                .get_logs_by_source(&source, limit, cursor.as_deref())
                .await?;
            emit(&formatter.format_logs(&page))
        }
        Commands::Search {
            query,
            source,
            limit,
            offset,
        } => {
            let hits = services
                .logs()
                .search_logs(&query, source.as_deref(), limit, offset)
                .await?;
            emit(&formatter.format_logs(&LogPage::new(hits, None)))
        }
        Commands::Bundle { contents, provider } => {
            cmd_bundle(manifest_path, contents, provider, formatter)
        }
    }
}

/// Deploy the manifest's functions.
async fn cmd_deploy(
    manifest_path: Option<&Path>,
    services: &Services,
    wait: Option<WaitOptions>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let loaded = load_manifest(manifest_path)?;
    let functions = loaded.functions()?;
    let controller = services.controller();

    let deployment = controller
        .deploy_functions(&loaded.manifest.project, &functions, &loaded.manifest.env)
        .await?;
    emit(&formatter.format_deployment(&deployment))?;

    if let Some(options) = wait {
        info!("Waiting for deployment {}", deployment.id);
        let outcome = controller.wait_for_deployment(&deployment.id, options).await?;
        emit(&formatter.format_outcome(&outcome))?;
    }

    Ok(())
}

/// Print the bundle without deploying.
fn cmd_bundle(
    manifest_path: Option<&Path>,
    contents: bool,
    provider: ProviderKind,
    formatter: &OutputFormatter,
) -> Result<()> {
    let loaded = load_manifest(manifest_path)?;
    let functions = loaded.functions()?;
    let bundle = Bundler::for_provider(provider).bundle(&functions)?;
    emit(&formatter.format_bundle(&bundle, contents))
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Writes command output to stdout.
fn emit(output: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    if !output.ends_with('\n') {
        stdout.write_all(b"\n")?;
    }
    stdout.flush()?;
    Ok(())
}

/// Resolves the manifest path.
fn resolve_manifest_path(manifest_path: Option<&Path>) -> Result<PathBuf> {
    manifest_path.map_or_else(|| find_manifest_file("."), |path| Ok(path.to_path_buf()))
}

fn load_manifest(manifest_path: Option<&Path>) -> Result<LoadedManifest> {
    let path = resolve_manifest_path(manifest_path)?;
    debug!("Loading manifest from: {}", path.display());
    ManifestParser::new().load_file(&path)
}

/// Loads `.env` next to the manifest (or in the current directory) and
/// builds the services.
async fn load_services(manifest_path: Option<&Path>) -> Result<Services> {
    let env_dir = manifest_path.and_then(Path::parent).filter(|p| !p.as_os_str().is_empty());
    Settings::load_dotenv(env_dir)?;

    let settings = Settings::from_env()?;
    Services::from_settings(settings).await
}
