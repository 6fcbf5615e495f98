//! jobsim backend server
//!
//! Loads configuration, starts the processing engine and serves the job API
//! until Ctrl-C.

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use jobsim_backend::state::AppState;
use jobsim_engine::JobService;

mod cli;
mod config_helpers;
mod tracing_setup;

use cli::CliArgs;
use config_helpers::{notifier_from_config, parse_bind_address, service_config_from_config};
use tracing_setup::install_tracing_from_config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    eprintln!("[STARTUP] jobsim backend starting...");
    let args = CliArgs::parse();

    eprintln!("[STARTUP] Loading config from: {:?}", args.config_path);
    let config = load_config(args.config_path.as_deref())?;
    eprintln!("[STARTUP] Config loaded successfully");

    install_tracing_from_config(&config.logging);

    let jobs = JobService::new(
        service_config_from_config(&config)?,
        notifier_from_config(&config)?,
    );
    tracing::info!(
        delay_secs = config.simulation.delay_secs,
        error_rate = config.simulation.error_rate,
        randomize_delay = config.simulation.randomize_delay,
        max_job_retries = ?config.engine.max_job_retries,
        relay_url = config.notifications.relay_url.as_deref().unwrap_or("-"),
        "job service configured"
    );

    let shutdown = CancellationToken::new();
    let engine = jobs.spawn_engine(shutdown.clone())?;

    let state = Arc::new(AppState::new(
        jobs,
        config.notifications.relay_url.clone(),
    ));
    let app = jobsim_backend::build_router(state);

    let addr = parse_bind_address(&config.server.host, config.server.port);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    eprintln!("[STARTUP] Ready to accept connections on {addr}");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    engine.shutdown().await;
    tracing::info!("server stopped");
    Ok(())
}

/// Load and validate configuration from file (if any) and environment.
fn load_config(path: Option<&str>) -> anyhow::Result<jobsim_config::Config> {
    let config = jobsim_config::load_config(path).map_err(|e| {
        eprintln!("failed to load configuration: {e}");
        anyhow::anyhow!(e.to_string())
    })?;
    jobsim_config::validate_config(&config).map_err(|e| {
        eprintln!("invalid configuration: {e}");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(config)
}

/// Resolves on Ctrl-C or when `shutdown` is cancelled elsewhere.
async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                tracing::warn!(error = %e, "failed to listen for ctrl-c");
                shutdown.cancelled().await;
            }
            tracing::info!("shutdown requested");
        }
        _ = shutdown.cancelled() => {}
    }
    shutdown.cancel();
}
