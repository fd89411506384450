//! geoprobe server.
//!
//! Loads configuration, builds the run orchestrator and serves the REST API
//! until SIGINT or SIGTERM.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use geoprobe::{ConfigLoader, RunOrchestrator};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Geo-targeted proxy checker with a REST API and live event streams.
#[derive(Parser, Debug)]
#[command(name = "geoprobe", version, about = "Geo-targeted proxy checker server")]
struct Args {
    /// Path to the TOML config file (default: $GEOPROBE_CONFIG, geoprobe.toml, config/geoprobe.toml)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Path to a .env file (default: ./.env)
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Override the bind host
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.with_config_path(path);
    }
    if let Some(path) = &args.env_file {
        loader = loader.with_env_file(path);
    }

    let loaded = match loader.load() {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("geoprobe: {e}");
            return ExitCode::FAILURE;
        }
    };

    // RUST_LOG wins over logging.level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&loaded.config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    for warning in &loaded.warnings {
        warn!("{warning}");
    }

    let mut config = loaded.config;
    if let Some(host) = args.host {
        config.app.host = host;
    }
    if let Some(port) = args.port {
        config.app.port = port;
    }

    info!(
        source = ?loaded.source,
        logs_dir = %config.paths.logs_dir.display(),
        max_concurrency = config.execution.max_concurrency,
        screenshot_workers = config.screenshots.max_workers,
        soax = ?config.soax.redacted(),
        "geoprobe starting"
    );

    let orchestrator = match RunOrchestrator::new(config.clone()).await {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            error!(error = %e, "failed to initialize orchestrator");
            return ExitCode::FAILURE;
        }
    };

    let served = geoprobe::api::start_api_server(
        Arc::new(orchestrator),
        Arc::new(config),
        geoprobe::wait_for_signal(),
    )
    .await;

    match served {
        Ok(()) => {
            info!("geoprobe stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "API server failed");
            ExitCode::FAILURE
        }
    }
}
