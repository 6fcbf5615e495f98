use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Filter directive to install: `RUST_LOG` when set, else the configured level.
fn filter_directive(rust_log: Option<String>, cfg: &jobsim_config::LoggingConfig) -> String {
    rust_log
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| cfg.level.clone())
}

/// Initialize tracing from configuration.
pub fn install_tracing_from_config(cfg: &jobsim_config::LoggingConfig) {
    let directive = filter_directive(std::env::var("RUST_LOG").ok(), cfg);
    let filter = EnvFilter::new(&directive);

    // Each branch builds a differently typed fmt layer.
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
