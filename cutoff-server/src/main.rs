//! cutoff-server binary
//!
//! Resolves configuration, opens the database, starts the job registry
//! sweeper and serves the HTTP API until Ctrl+C / SIGTERM.

use anyhow::{Context, Result};
use clap::Parser;
use cutoff_common::config::{load_toml_config, ConfigOverrides, ServerConfig};
use std::path::PathBuf;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cutoff_server::{build_router, db, AppState};

#[derive(Parser, Debug)]
#[command(name = "cutoff-server")]
#[command(about = "College cutoff predictor service")]
#[command(version)]
struct Args {
    /// Address to listen on (default 127.0.0.1:3000)
    #[arg(short, long, env = "CUTOFF_BIND")]
    bind: Option<String>,

    /// Data directory for uploads, snapshot and database
    #[arg(short, long, env = "CUTOFF_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Config file (default <config_dir>/cutoff-predictor/config.toml)
    #[arg(short, long, env = "CUTOFF_CONFIG")]
    config: Option<PathBuf>,

    /// Log level or full filter directive; RUST_LOG takes precedence
    #[arg(short, long, env = "CUTOFF_LOG_LEVEL")]
    log_level: Option<String>,
}

/// Filter directive for a bare level, or the directive itself
fn filter_directive(level: &str) -> String {
    if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        format!(
            "cutoff_server={lvl},cutoff_common={lvl},tower_http={lvl}",
            lvl = level
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Read before tracing starts so a configured log level applies from the first line
    let toml_config = load_toml_config(args.config.as_deref())?;
    let level = args
        .log_level
        .clone()
        .or_else(|| toml_config.log_level.clone())
        .unwrap_or_else(|| "info".to_string());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter_directive(&level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting cutoff-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let config = ServerConfig::resolve(
        ConfigOverrides {
            bind: args.bind,
            data_dir: args.data_dir,
            log_level: args.log_level,
        },
        toml_config,
    )
    .context("Invalid configuration")?;

    info!("Data directory: {}", config.data_dir.display());
    info!(
        "Extractor: {} {}",
        config.extractor_program,
        config.extractor_args.join(" ")
    );
    config
        .ensure_directories()
        .context("Failed to create data directories")?;

    let pool = db::init_database_pool(&config.database_path())
        .await
        .context("Failed to open database")?;
    info!("Database ready: {}", config.database_path().display());

    let bind_addr = config.bind_addr;
    let sweep_interval = config.sweep_interval;
    let job_retention = config.job_retention;
    let state = AppState::new(pool.clone(), config);

    let shutdown = CancellationToken::new();
    let sweeper = state
        .progress
        .clone()
        .spawn_sweeper(sweep_interval, job_retention, shutdown.clone());

    let app = build_router(state);

    info!("Listening on http://{}", bind_addr);
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    shutdown.cancel();
    let _ = sweeper.await;
    pool.close().await;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
