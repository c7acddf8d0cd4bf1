//! Process configuration, loaded once from the environment (and `.env`).

use std::time::Duration;

use thiserror::Error;

use crate::cache::{DEFAULT_CACHE_TIME, SlotConfig};
use crate::protocol::DEFAULT_MAX_REQUEST_SIZE;

/// Default u-blox AssistNow endpoint.
pub const DEFAULT_UPSTREAM_HOST: &str = "agps.u-blox.com";
pub const DEFAULT_PORT: u16 = 46434;
pub const DEFAULT_LISTEN_HOST: &str = "0.0.0.0";
/// Default per-connection idle timeout (10 seconds).
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}: cannot parse {value:?}")]
    Parse { var: &'static str, value: String },

    #[error("invalid config:\n - {}", .0.join("\n - "))]
    Invalid(Vec<String>),
}

/// Relay configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub upstream_host: String,
    pub upstream_port: u16,
    pub listen_host: String,
    pub listen_port: u16,
    /// How long a session may sit idle before it is closed.
    pub idle_timeout: Duration,
    /// How long a fetched payload stays fresh.
    pub cache_time: Duration,
    /// Cache anchor points, in tie-break order.
    pub cache_list: Vec<SlotConfig>,
    pub max_request_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upstream_host: DEFAULT_UPSTREAM_HOST.to_string(),
            upstream_port: DEFAULT_PORT,
            listen_host: DEFAULT_LISTEN_HOST.to_string(),
            listen_port: DEFAULT_PORT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            cache_time: DEFAULT_CACHE_TIME,
            cache_list: vec![SlotConfig::new(30.45, 114.17, 1_500_000)],
            max_request_size: DEFAULT_MAX_REQUEST_SIZE,
        }
    }
}

impl Config {
    /// Loads configuration from the process environment.
    ///
    /// A `.env` file in the working directory (or a parent) is applied first
    /// if present. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!("No .env file loaded: {}", e);
        }
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(host) = lookup("UBLOX_PROXY_HOST") {
            config.upstream_host = host.trim().to_string();
        }
        if let Some(raw) = lookup("UBLOX_PROXY_PORT") {
            config.upstream_port = parse("UBLOX_PROXY_PORT", &raw)?;
        }
        if let Some(host) = lookup("UBLOX_PROXY_LISTEN_HOST") {
            config.listen_host = host.trim().to_string();
        }
        if let Some(raw) = lookup("UBLOX_PROXY_LISTEN_PORT") {
            config.listen_port = parse("UBLOX_PROXY_LISTEN_PORT", &raw)?;
        }
        if let Some(raw) = lookup("UBLOX_PROXY_CACHE_TIME") {
            config.cache_time = Duration::from_millis(parse("UBLOX_PROXY_CACHE_TIME", &raw)?);
        }
        if let Some(raw) = lookup("UBLOX_PROXY_TIMEOUT") {
            config.idle_timeout = Duration::from_millis(parse("UBLOX_PROXY_TIMEOUT", &raw)?);
        }
        if let Some(raw) = lookup("UBLOX_PROXY_CACHE_LIST") {
            config.cache_list = parse_cache_list(&raw)?;
        }
        if let Some(raw) = lookup("UBLOX_PROXY_MAX_REQUEST") {
            config.max_request_size = parse("UBLOX_PROXY_MAX_REQUEST", &raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges, reporting every problem at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut issues: Vec<String> = Vec::new();

        if self.upstream_host.is_empty() {
            issues.push("UBLOX_PROXY_HOST must not be empty".into());
        }
        if self.listen_host.is_empty() {
            issues.push("UBLOX_PROXY_LISTEN_HOST must not be empty".into());
        }
        if self.cache_time.is_zero() {
            issues.push("UBLOX_PROXY_CACHE_TIME must be > 0".into());
        }
        if self.idle_timeout.is_zero() {
            issues.push("UBLOX_PROXY_TIMEOUT must be > 0".into());
        }
        if self.max_request_size == 0 {
            issues.push("UBLOX_PROXY_MAX_REQUEST must be > 0".into());
        }
        if self.cache_list.is_empty() {
            issues.push("UBLOX_PROXY_CACHE_LIST must contain at least one slot".into());
        }
        for (i, slot) in self.cache_list.iter().enumerate() {
            if !(-90.0..=90.0).contains(&slot.lat) {
                issues.push(format!("cache slot {i}: lat {} out of range", slot.lat));
            }
            if !(-180.0..=180.0).contains(&slot.lon) {
                issues.push(format!("cache slot {i}: lon {} out of range", slot.lon));
            }
            if slot.pacc == 0 {
                issues.push(format!("cache slot {i}: pacc must be > 0"));
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(issues))
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen_host, self.listen_port)
    }
}

fn parse<T: std::str::FromStr>(var: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse::<T>().map_err(|_| ConfigError::Parse {
        var,
        value: raw.to_string(),
    })
}

/// Parses `lat,lon,pacc;lat,lon,pacc;...`.
fn parse_cache_list(raw: &str) -> Result<Vec<SlotConfig>, ConfigError> {
    const VAR: &str = "UBLOX_PROXY_CACHE_LIST";

    raw.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let fields: Vec<&str> = entry.split(',').collect();
            let [lat, lon, pacc] = fields.as_slice() else {
                return Err(ConfigError::Parse {
                    var: VAR,
                    value: entry.to_string(),
                });
            };
            Ok(SlotConfig::new(
                parse(VAR, lat)?,
                parse(VAR, lon)?,
                parse(VAR, pacc)?,
            ))
        })
        .collect()
}
