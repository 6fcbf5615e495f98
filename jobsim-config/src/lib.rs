use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Pre-compiled regex for hostname validation (compiled once at first use)
static HOSTNAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9][-a-zA-Z0-9\.]*[a-zA-Z0-9]$").unwrap());

#[derive(Debug, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub server: Option<ServerSection>,
    #[serde(default)]
    pub logging: Option<LoggingSection>,
    #[serde(default)]
    pub simulation: Option<SimulationSection>,
    #[serde(default)]
    pub engine: Option<EngineSection>,
    #[serde(default)]
    pub notifications: Option<NotificationsSection>,
    #[serde(default)]
    pub relay: Option<RelaySection>,
}

#[derive(Debug, Deserialize)]
pub struct ServerSection {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub json: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct SimulationSection {
    #[serde(default)]
    pub delay_secs: Option<f64>,
    #[serde(default)]
    pub error_rate: Option<f64>,
    #[serde(default)]
    pub randomize_delay: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct EngineSection {
    #[serde(default)]
    pub dequeue_wait_ms: Option<u64>,
    #[serde(default)]
    pub min_tick_ms: Option<u64>,
    #[serde(default)]
    pub max_job_retries: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct NotificationsSection {
    /// Base URL of the callback relay. An empty string disables callbacks.
    #[serde(default)]
    pub relay_url: Option<String>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub base_delay_ms: Option<u64>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct RelaySection {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub forward_timeout_ms: Option<u64>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Load a RawConfigFile from a path. The format is inferred from the extension: .toml, .yaml/.yml, .json
pub fn load_raw_from_file<P: AsRef<Path>>(path: P) -> Result<RawConfigFile, ConfigError> {
    let path = path.as_ref();
    let s = fs::read_to_string(path)?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase());
    parse_config_str(&s, ext.as_deref())
}

#[inline]
fn parse_config_str(s: &str, ext: Option<&str>) -> Result<RawConfigFile, ConfigError> {
    match ext {
        #[cfg(feature = "toml")]
        Some("toml") => toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string())),
        #[cfg(feature = "yaml")]
        Some("yaml" | "yml") => {
            serde_yaml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
        }
        #[cfg(feature = "json")]
        Some("json") => serde_json::from_str(s).map_err(|e| ConfigError::Parse(e.to_string())),
        _ => parse_config_auto(s),
    }
}

/// Try each enabled format in turn.
#[inline]
fn parse_config_auto(s: &str) -> Result<RawConfigFile, ConfigError> {
    #[cfg(feature = "toml")]
    if let Ok(cfg) = toml::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(feature = "json")]
    if let Ok(cfg) = serde_json::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(feature = "yaml")]
    if let Ok(cfg) = serde_yaml::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(any(feature = "yaml", feature = "toml", feature = "json"))]
    {
        Err(ConfigError::Parse(
            "failed to parse config as any supported format".into(),
        ))
    }

    #[cfg(not(any(feature = "yaml", feature = "toml", feature = "json")))]
    {
        let _ = s;
        Err(ConfigError::Parse("no config format enabled".into()))
    }
}

/// Concrete application configuration with defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub simulation: SimulationConfig,
    pub engine: EngineConfig,
    pub notifications: NotificationsConfig,
    pub relay: RelayConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationConfig {
    pub delay_secs: f64,
    pub error_rate: f64,
    /// Draw each job's delay from 5..=15 seconds.
    pub randomize_delay: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineConfig {
    pub dequeue_wait_ms: u64,
    pub min_tick_ms: u64,
    /// `None` re-queues failed jobs forever.
    pub max_job_retries: Option<u32>,
}

impl EngineConfig {
    pub fn dequeue_wait(&self) -> Duration {
        Duration::from_millis(self.dequeue_wait_ms)
    }

    pub fn min_tick(&self) -> Duration {
        Duration::from_millis(self.min_tick_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationsConfig {
    pub relay_url: Option<String>,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub timeout_ms: u64,
}

impl NotificationsConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    pub forward_timeout_ms: u64,
}

impl RelayConfig {
    pub fn forward_timeout(&self) -> Duration {
        Duration::from_millis(self.forward_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5001,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json: false,
            },
            simulation: SimulationConfig {
                delay_secs: 10.0,
                error_rate: 0.1,
                randomize_delay: false,
            },
            engine: EngineConfig {
                dequeue_wait_ms: 1000,
                min_tick_ms: 1000,
                max_job_retries: None,
            },
            notifications: NotificationsConfig {
                relay_url: Some("http://127.0.0.1:5002".to_string()),
                max_attempts: 3,
                base_delay_ms: 1000,
                timeout_ms: 5000,
            },
            relay: RelayConfig {
                host: "0.0.0.0".to_string(),
                port: 5002,
                forward_timeout_ms: 5000,
            },
        }
    }
}

#[inline]
fn parse_bool(s: &str) -> Result<bool, ()> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "no" | "n" | "off" => Ok(false),
        _ => Err(()),
    }
}

/// Empty URLs mean "no relay".
#[inline]
fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Helper macro to apply optional value if present
macro_rules! apply_opt {
    ($target:expr, $source:expr) => {
        if let Some(v) = $source {
            $target = v;
        }
    };
    ($target:expr, $source:expr, wrap) => {
        if let Some(v) = $source {
            $target = Some(v);
        }
    };
}

/// Load concrete `Config` from optional file and environment variables.
/// Environment variables take precedence over file values and defaults.
pub fn load_config<P: AsRef<Path>>(path: Option<P>) -> Result<Config, ConfigError> {
    let mut cfg = Config::default();

    if let Some(p) = path {
        let raw = load_raw_from_file(p)?;
        apply_raw(&mut cfg, raw);
    }

    apply_env_overrides(&mut cfg)?;

    Ok(cfg)
}

fn apply_raw(cfg: &mut Config, raw: RawConfigFile) {
    if let Some(server) = raw.server {
        apply_opt!(cfg.server.host, server.host);
        apply_opt!(cfg.server.port, server.port);
    }
    if let Some(logging) = raw.logging {
        apply_opt!(cfg.logging.level, logging.level);
        apply_opt!(cfg.logging.json, logging.json);
    }
    if let Some(sim) = raw.simulation {
        apply_opt!(cfg.simulation.delay_secs, sim.delay_secs);
        apply_opt!(cfg.simulation.error_rate, sim.error_rate);
        apply_opt!(cfg.simulation.randomize_delay, sim.randomize_delay);
    }
    if let Some(engine) = raw.engine {
        apply_opt!(cfg.engine.dequeue_wait_ms, engine.dequeue_wait_ms);
        apply_opt!(cfg.engine.min_tick_ms, engine.min_tick_ms);
        apply_opt!(cfg.engine.max_job_retries, engine.max_job_retries, wrap);
    }
    if let Some(n) = raw.notifications {
        if let Some(url) = n.relay_url {
            cfg.notifications.relay_url = non_empty(url);
        }
        apply_opt!(cfg.notifications.max_attempts, n.max_attempts);
        apply_opt!(cfg.notifications.base_delay_ms, n.base_delay_ms);
        apply_opt!(cfg.notifications.timeout_ms, n.timeout_ms);
    }
    if let Some(relay) = raw.relay {
        apply_opt!(cfg.relay.host, relay.host);
        apply_opt!(cfg.relay.port, relay.port);
        apply_opt!(cfg.relay.forward_timeout_ms, relay.forward_timeout_ms);
    }
}

/// Helper to parse env var as a specific type
#[inline]
fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(v) => v
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Parse(format!("invalid {}: {}", key, e))),
        Err(_) => Ok(None),
    }
}

/// Helper to parse env var as bool
#[inline]
fn env_bool(key: &str) -> Result<Option<bool>, ConfigError> {
    match env::var(key) {
        Ok(v) => parse_bool(&v)
            .map(Some)
            .map_err(|_| ConfigError::Parse(format!("invalid {}", key))),
        Err(_) => Ok(None),
    }
}

#[inline]
fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Apply all environment variable overrides to config
fn apply_env_overrides(cfg: &mut Config) -> Result<(), ConfigError> {
    // Server
    if let Some(v) = env_str("JOBSIM_SERVER_HOST") {
        cfg.server.host = v;
    }
    if let Some(v) = env_parse::<u16>("JOBSIM_SERVER_PORT")? {
        cfg.server.port = v;
    }

    // Logging
    if let Some(v) = env_str("JOBSIM_LOG_LEVEL") {
        cfg.logging.level = v;
    }
    if let Some(v) = env_bool("JOBSIM_LOG_JSON")? {
        cfg.logging.json = v;
    }

    // Simulation
    if let Some(v) = env_parse::<f64>("JOBSIM_SIM_DELAY_SECS")? {
        cfg.simulation.delay_secs = v;
    }
    if let Some(v) = env_parse::<f64>("JOBSIM_SIM_ERROR_RATE")? {
        cfg.simulation.error_rate = v;
    }
    if let Some(v) = env_bool("JOBSIM_SIM_RANDOMIZE_DELAY")? {
        cfg.simulation.randomize_delay = v;
    }

    // Engine
    if let Some(v) = env_parse::<u64>("JOBSIM_ENGINE_DEQUEUE_WAIT_MS")? {
        cfg.engine.dequeue_wait_ms = v;
    }
    if let Some(v) = env_parse::<u64>("JOBSIM_ENGINE_MIN_TICK_MS")? {
        cfg.engine.min_tick_ms = v;
    }
    if let Some(v) = env_parse::<u32>("JOBSIM_ENGINE_MAX_JOB_RETRIES")? {
        cfg.engine.max_job_retries = Some(v);
    }

    // Notifications
    if let Some(v) = env_str("JOBSIM_RELAY_URL") {
        cfg.notifications.relay_url = non_empty(v);
    }
    if let Some(v) = env_parse::<u32>("JOBSIM_NOTIFY_MAX_ATTEMPTS")? {
        cfg.notifications.max_attempts = v;
    }
    if let Some(v) = env_parse::<u64>("JOBSIM_NOTIFY_BASE_DELAY_MS")? {
        cfg.notifications.base_delay_ms = v;
    }
    if let Some(v) = env_parse::<u64>("JOBSIM_NOTIFY_TIMEOUT_MS")? {
        cfg.notifications.timeout_ms = v;
    }

    // Relay
    if let Some(v) = env_str("JOBSIM_RELAY_HOST") {
        cfg.relay.host = v;
    }
    if let Some(v) = env_parse::<u16>("JOBSIM_RELAY_PORT")? {
        cfg.relay.port = v;
    }
    if let Some(v) = env_parse::<u64>("JOBSIM_RELAY_FORWARD_TIMEOUT_MS")? {
        cfg.relay.forward_timeout_ms = v;
    }

    Ok(())
}

fn validate_host(field: &str, host: &str) -> Result<(), ConfigError> {
    let host_ok = host.parse::<std::net::IpAddr>().is_ok() || HOSTNAME_REGEX.is_match(host);
    if !host_ok {
        return Err(ConfigError::Validation(format!(
            "invalid {}: {}",
            field, host
        )));
    }
    Ok(())
}

/// Validate higher-level constraints on the resolved configuration.
pub fn validate_config(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.server.port == 0 {
        return Err(ConfigError::Validation("server.port must be > 0".into()));
    }
    validate_host("server.host", &cfg.server.host)?;

    if cfg.relay.port == 0 {
        return Err(ConfigError::Validation("relay.port must be > 0".into()));
    }
    validate_host("relay.host", &cfg.relay.host)?;

    let sim = &cfg.simulation;
    if !(sim.delay_secs > 0.0 && sim.delay_secs.is_finite()) {
        return Err(ConfigError::Validation(format!(
            "simulation.delay_secs must be > 0, got {}",
            sim.delay_secs
        )));
    }
    if !(0.0..=1.0).contains(&sim.error_rate) {
        return Err(ConfigError::Validation(format!(
            "simulation.error_rate must be within [0, 1], got {}",
            sim.error_rate
        )));
    }

    if cfg.engine.min_tick_ms == 0 {
        return Err(ConfigError::Validation("engine.min_tick_ms must be > 0".into()));
    }
    if cfg.engine.dequeue_wait_ms == 0 {
        return Err(ConfigError::Validation(
            "engine.dequeue_wait_ms must be > 0".into(),
        ));
    }
    if cfg.notifications.max_attempts == 0 {
        return Err(ConfigError::Validation(
            "notifications.max_attempts must be > 0".into(),
        ));
    }

    if let Some(relay_url) = &cfg.notifications.relay_url {
        match url::Url::parse(relay_url) {
            Ok(u) => {
                let scheme = u.scheme();
                if scheme != "http" && scheme != "https" {
                    return Err(ConfigError::Validation(format!(
                        "notifications.relay_url must be http or https: {}",
                        relay_url
                    )));
                }
            }
            Err(_) => {
                return Err(ConfigError::Validation(format!(
                    "invalid notifications.relay_url: {}",
                    relay_url
                )))
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::Builder;

    /// Tests that read the process environment run one at a time.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ENV_KEYS: &[&str] = &[
        "JOBSIM_SERVER_HOST",
        "JOBSIM_SERVER_PORT",
        "JOBSIM_LOG_LEVEL",
        "JOBSIM_LOG_JSON",
        "JOBSIM_SIM_DELAY_SECS",
        "JOBSIM_SIM_ERROR_RATE",
        "JOBSIM_SIM_RANDOMIZE_DELAY",
        "JOBSIM_ENGINE_DEQUEUE_WAIT_MS",
        "JOBSIM_ENGINE_MIN_TICK_MS",
        "JOBSIM_ENGINE_MAX_JOB_RETRIES",
        "JOBSIM_RELAY_URL",
        "JOBSIM_NOTIFY_MAX_ATTEMPTS",
        "JOBSIM_NOTIFY_BASE_DELAY_MS",
        "JOBSIM_NOTIFY_TIMEOUT_MS",
        "JOBSIM_RELAY_HOST",
        "JOBSIM_RELAY_PORT",
        "JOBSIM_RELAY_FORWARD_TIMEOUT_MS",
    ];

    fn clear_env() {
        for k in ENV_KEYS {
            std::env::remove_var(k);
        }
    }

    fn write_config(suffix: &str, body: &str) -> tempfile::NamedTempFile {
        let f = Builder::new().suffix(suffix).tempfile().expect("tmpfile");
        std::fs::write(f.path(), body).unwrap();
        f
    }

    #[test]
    fn defaults_are_valid() {
        let cfg = Config::default();
        validate_config(&cfg).expect("defaults validate");
        assert_eq!(cfg.server.port, 5001);
        assert_eq!(cfg.engine.max_job_retries, None);
        assert_eq!(cfg.notifications.base_delay(), Duration::from_secs(1));
    }

    #[test]
    fn parse_toml() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        let f = write_config(
            ".toml",
            r#"
[server]
host = "127.0.0.1"
port = 7001

[simulation]
delay_secs = 2.5
error_rate = 0.0

[engine]
max_job_retries = 4
"#,
        );
        let cfg = load_config(Some(f.path())).expect("load");
        assert_eq!(cfg.server.host, "127.0.0.1");
        assert_eq!(cfg.server.port, 7001);
        assert_eq!(cfg.simulation.delay_secs, 2.5);
        assert_eq!(cfg.simulation.error_rate, 0.0);
        assert_eq!(cfg.engine.max_job_retries, Some(4));
        // Untouched sections keep their defaults.
        assert_eq!(cfg.relay.port, 5002);
    }

    #[test]
    fn parse_yaml() {
        let f = write_config(
            ".yaml",
            r#"
notifications:
  relay_url: "https://relay.internal:8443"
  max_attempts: 5
relay:
  host: relay.internal
  port: 8443
"#,
        );
        let raw = load_raw_from_file(f.path()).expect("load");
        let n = raw.notifications.expect("notifications section");
        assert_eq!(n.relay_url.as_deref(), Some("https://relay.internal:8443"));
        assert_eq!(n.max_attempts, Some(5));
        let relay = raw.relay.expect("relay section");
        assert_eq!(relay.host.as_deref(), Some("relay.internal"));
        assert_eq!(relay.port, Some(8443));
    }

    #[test]
    fn parse_json_without_extension() {
        let f = write_config("", r#"{"logging": {"level": "debug", "json": true}}"#);
        let raw = load_raw_from_file(f.path()).expect("load");
        let logging = raw.logging.expect("logging section");
        assert_eq!(logging.level.as_deref(), Some("debug"));
        assert_eq!(logging.json, Some(true));
    }

    #[test]
    fn empty_relay_url_disables_callbacks() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        let f = write_config(".toml", "[notifications]\nrelay_url = \"\"\n");
        let cfg = load_config(Some(f.path())).expect("load");
        assert_eq!(cfg.notifications.relay_url, None);
        validate_config(&cfg).expect("no relay is valid");
    }

    #[test]
    fn env_overrides() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let f = write_config(".toml", "[server]\nport = 7001\n");
        std::env::set_var("JOBSIM_SERVER_HOST", "10.1.2.3");
        std::env::set_var("JOBSIM_SERVER_PORT", "1234");
        std::env::set_var("JOBSIM_LOG_JSON", "true");
        std::env::set_var("JOBSIM_SIM_ERROR_RATE", "0.5");
        std::env::set_var("JOBSIM_SIM_RANDOMIZE_DELAY", "yes");
        std::env::set_var("JOBSIM_ENGINE_MAX_JOB_RETRIES", "2");
        std::env::set_var("JOBSIM_RELAY_URL", "http://relay:9000");

        let cfg = load_config(Some(f.path())).expect("load config");
        assert_eq!(cfg.server.host, "10.1.2.3");
        assert_eq!(cfg.server.port, 1234);
        assert!(cfg.logging.json);
        assert_eq!(cfg.simulation.error_rate, 0.5);
        assert!(cfg.simulation.randomize_delay);
        assert_eq!(cfg.engine.max_job_retries, Some(2));
        assert_eq!(cfg.notifications.relay_url.as_deref(), Some("http://relay:9000"));

        clear_env();
    }

    #[test]
    fn malformed_env_value_is_a_parse_error() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        std::env::set_var("JOBSIM_NOTIFY_MAX_ATTEMPTS", "three");

        let err = load_config::<&Path>(None).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(msg) if msg.contains("JOBSIM_NOTIFY_MAX_ATTEMPTS")));

        clear_env();
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut cfg = Config::default();
        cfg.server.port = 0;
        assert!(validate_config(&cfg).is_err());

        let mut cfg = Config::default();
        cfg.server.host = "-bad host-".into();
        assert!(validate_config(&cfg).is_err());

        let mut cfg = Config::default();
        cfg.simulation.delay_secs = 0.0;
        assert!(validate_config(&cfg).is_err());

        let mut cfg = Config::default();
        cfg.simulation.error_rate = 1.5;
        assert!(validate_config(&cfg).is_err());

        let mut cfg = Config::default();
        cfg.engine.dequeue_wait_ms = 0;
        assert!(matches!(
            validate_config(&cfg),
            Err(ConfigError::Validation(msg)) if msg.contains("dequeue_wait_ms")
        ));

        let mut cfg = Config::default();
        cfg.notifications.max_attempts = 0;
        assert!(validate_config(&cfg).is_err());

        let mut cfg = Config::default();
        cfg.notifications.relay_url = Some("ftp://relay".into());
        assert!(matches!(
            validate_config(&cfg),
            Err(ConfigError::Validation(msg)) if msg.contains("http or https")
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_raw_from_file("/nonexistent/jobsim.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
