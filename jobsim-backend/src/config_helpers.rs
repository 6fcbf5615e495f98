use std::net::{IpAddr, Ipv6Addr, SocketAddr};

use jobsim_config::Config;
use jobsim_engine::{EngineConfig, Notifier, RetryPolicy, ServiceConfig, SimulationParams};

/// Parse host:port into a SocketAddr, with fallback to 0.0.0.0.
pub fn parse_bind_address(host: &str, port: u16) -> SocketAddr {
    host.parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, port))
        .or_else(|_| host.parse::<SocketAddr>())
        .or_else(|_| {
            host.parse::<Ipv6Addr>()
                .map(|ip| SocketAddr::new(IpAddr::V6(ip), port))
        })
        .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], port)))
}

/// Build the job service settings from application config.
pub fn service_config_from_config(cfg: &Config) -> anyhow::Result<ServiceConfig> {
    let defaults = SimulationParams::new(cfg.simulation.delay_secs, cfg.simulation.error_rate)?;
    Ok(ServiceConfig {
        defaults,
        randomize_delay: cfg.simulation.randomize_delay,
        engine: EngineConfig {
            dequeue_wait: cfg.engine.dequeue_wait(),
            min_tick: cfg.engine.min_tick(),
            max_job_retries: cfg.engine.max_job_retries,
        },
    })
}

/// Build the HTTP callback notifier from application config.
pub fn notifier_from_config(cfg: &Config) -> anyhow::Result<Notifier> {
    let policy = RetryPolicy {
        max_attempts: cfg.notifications.max_attempts,
        base_delay: cfg.notifications.base_delay(),
    };
    Ok(Notifier::http(cfg.notifications.timeout(), policy)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn bind_address_fallbacks() {
        assert_eq!(
            parse_bind_address("127.0.0.1", 5001),
            SocketAddr::from(([127, 0, 0, 1], 5001))
        );
        assert_eq!(
            parse_bind_address("localhost", 5001),
            SocketAddr::from(([0, 0, 0, 0], 5001))
        );
    }

    #[test]
    fn service_config_follows_file_values() {
        let mut cfg = Config::default();
        cfg.simulation.delay_secs = 3.0;
        cfg.engine.min_tick_ms = 250;
        cfg.engine.max_job_retries = Some(5);

        let svc = service_config_from_config(&cfg).unwrap();
        assert_eq!(svc.defaults.delay_secs, 3.0);
        assert_eq!(svc.engine.min_tick, Duration::from_millis(250));
        assert_eq!(svc.engine.max_job_retries, Some(5));

        let notifier = notifier_from_config(&cfg).unwrap();
        assert_eq!(notifier.policy().max_attempts, 3);
    }
}
