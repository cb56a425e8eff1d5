// Edge Ingest - Main Entry Point
//
// Loads configuration, initialises logging and metrics, spawns the rate
// limiter actor and serves the edge router until interrupted.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use edge_ingest::config::{Config, DEFAULT_CONFIG_FILE};
use edge_ingest::logging::LogLevel;
use edge_ingest::metrics;
use edge_ingest::router::{self, AppState};
use std::path::PathBuf;
use tracing::{error, info};

/// Edge log ingestion gateway with admission control
#[derive(Parser, Debug)]
#[command(name = "edge-ingest")]
#[command(version)]
#[command(about = "Edge log ingestion gateway with admission control", long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the ingestion endpoints
    Serve {
        /// Listen address, overrides the configured one
        #[arg(long)]
        bind: Option<String>,
    },
    /// Load and validate the configuration, then print it
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load_from_path(&args.config)
        .with_context(|| format!("Failed to load configuration from {:?}", args.config))?;
    if args.verbose {
        config.logging.level = LogLevel::Debug;
    }
    config.logging.init()?;

    // Loading ran before the subscriber existed
    if args.config.exists() {
        info!("Loaded configuration from {:?}", args.config);
    } else {
        info!("Config file not found at {:?}, using defaults", args.config);
    }

    match args.command {
        Some(Commands::Serve { bind }) => {
            if let Some(bind) = bind {
                config.server.bind = bind;
                config.validate()?;
            }
            serve(config).await?;
        }
        Some(Commands::CheckConfig) => {
            let rendered =
                toml::to_string_pretty(&config).context("Failed to render configuration")?;
            println!("{}", rendered);
        }
        None => {
            info!("No command specified. Use \"edge-ingest --help\" for usage.");
        }
    }

    Ok(())
}

async fn serve(config: Config) -> Result<()> {
    info!("Edge ingest v{} starting...", env!("CARGO_PKG_VERSION"));

    if config.metrics.enabled {
        metrics::init().context("Failed to initialize metrics")?;
    }

    let addr = config.server.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    let state = AppState::from_config(&config);
    info!(
        global_limit = config.limiter.global_limit,
        per_trace_limit = config.limiter.per_trace_limit,
        window_ms = config.limiter.window_ms,
        store = ?config.store.backend,
        "Rate limiter ready"
    );

    router::serve(listener, state, shutdown_signal()).await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }
}
