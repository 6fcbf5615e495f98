//! jobsim callback relay
//!
//! Registers client callback URLs and forwards job updates to them.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::prelude::*;

use jobsim_relay::RelayState;

#[derive(Debug, Parser)]
#[command(name = "jobsim-relay", version, about = "Forwards job updates to registered clients")]
struct CliArgs {
    /// Path to configuration file (TOML, YAML or JSON).
    #[arg(short = 'c', long = "config", env = "JOBSIM_CONFIG_PATH")]
    config_path: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let config = jobsim_config::load_config(args.config_path.as_deref())
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    jobsim_config::validate_config(&config).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    install_tracing(&config.logging);

    let state = Arc::new(RelayState::new(config.relay.forward_timeout())?);
    let app = jobsim_relay::build_router(state);

    let ip = config
        .relay
        .host
        .parse::<IpAddr>()
        .unwrap_or(IpAddr::from([0, 0, 0, 0]));
    let addr = SocketAddr::new(ip, config.relay.port);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "relay listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await?;
    Ok(())
}

fn install_tracing(cfg: &jobsim_config::LoggingConfig) {
    use tracing_subscriber::fmt::time::ChronoUtc;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.level));
    if cfg.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_timer(ChronoUtc::rfc_3339()),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
