//! Environment-based Configuration for the Deposit Watcher
//!
//! All settings come from environment variables (optionally loaded from a
//! `.env` file by the binary). Every variable has a default suitable for a
//! local indexer sandbox.
//!
//! # Indexer
//! - `INDEXER_URL` - Indexer REST endpoint (default: "http://localhost:8980")
//! - `INDEXER_TOKEN` - API token sent as `X-Indexer-API-Token` (optional)
//! - `INDEXER_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `INDEXER_PAGE_LIMIT` - Transactions requested per page (default: 1000)
//!
//! # Watcher
//! - `WATCH_ADDRESSES` - Comma-separated deposit addresses to watch
//! - `IGNORE_SENDERS` - Comma-separated sender addresses to ignore (e.g. our hot wallet)
//! - `POLL_INTERVAL_MS` - Gap between poll cycles (default: 1000)
//!
//! # Service
//! - `API_PORT` - HTTP/SSE port (default: 3000)
//! - `LOG_LEVEL` - Logging level (trace, debug, info, warn, error)
//! - `LOG_FORMAT` - "json" or "pretty" (default: "pretty")

use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_INDEXER_URL: &str = "http://localhost:8980";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_API_PORT: u16 = 3000;
pub const DEFAULT_PAGE_LIMIT: u32 = 1000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            _ => Err(ConfigError::InvalidValue(
                "LOG_FORMAT".to_string(),
                format!("unknown format: {} (use 'json' or 'pretty')", s),
            )),
        }
    }
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Indexer REST endpoint
    pub indexer_url: String,

    /// Indexer API token
    pub indexer_token: Option<String>,

    /// Indexer request timeout
    pub indexer_timeout: Duration,

    /// Page size for transaction searches
    pub page_limit: u32,

    /// Initial watched deposit addresses
    pub watch_addresses: Vec<String>,

    /// Senders whose transfers are never reported
    pub ignore_senders: Vec<String>,

    /// Gap between the end of one poll cycle and the start of the next
    pub poll_interval: Duration,

    /// HTTP/SSE server port
    pub api_port: u16,

    /// Log level
    pub log_level: String,

    /// Log output format
    pub log_format: LogFormat,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            indexer_url: DEFAULT_INDEXER_URL.to_string(),
            indexer_token: None,
            indexer_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            page_limit: DEFAULT_PAGE_LIMIT,
            watch_addresses: Vec::new(),
            ignore_senders: Vec::new(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            api_port: DEFAULT_API_PORT,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl WatcherConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let indexer_url = lookup("INDEXER_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.indexer_url);

        let indexer_token = lookup("INDEXER_TOKEN").filter(|t| !t.is_empty());

        let indexer_timeout = match lookup("INDEXER_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(parse_number("INDEXER_TIMEOUT_SECS", &v)?),
            None => defaults.indexer_timeout,
        };

        let page_limit = match lookup("INDEXER_PAGE_LIMIT") {
            Some(v) => parse_number("INDEXER_PAGE_LIMIT", &v)?,
            None => defaults.page_limit,
        };
        if page_limit == 0 {
            return Err(ConfigError::InvalidValue(
                "INDEXER_PAGE_LIMIT".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let watch_addresses = lookup("WATCH_ADDRESSES")
            .map(|v| split_list(&v))
            .unwrap_or_default();

        let ignore_senders = lookup("IGNORE_SENDERS")
            .map(|v| split_list(&v))
            .unwrap_or_default();

        let poll_interval = match lookup("POLL_INTERVAL_MS") {
            Some(v) => {
                let ms: u64 = parse_number("POLL_INTERVAL_MS", &v)?;
                if ms == 0 {
                    return Err(ConfigError::InvalidValue(
                        "POLL_INTERVAL_MS".to_string(),
                        "must be greater than zero".to_string(),
                    ));
                }
                Duration::from_millis(ms)
            }
            None => defaults.poll_interval,
        };

        let api_port = match lookup("API_PORT") {
            Some(v) => parse_number("API_PORT", &v)?,
            None => defaults.api_port,
        };

        let log_level = lookup("LOG_LEVEL").unwrap_or(defaults.log_level);

        let log_format = match lookup("LOG_FORMAT") {
            Some(v) => v.parse()?,
            None => defaults.log_format,
        };

        Ok(Self {
            indexer_url,
            indexer_token,
            indexer_timeout,
            page_limit,
            watch_addresses,
            ignore_senders,
            poll_interval,
            api_port,
            log_level,
            log_format,
        })
    }

    /// Print configuration summary (hiding the indexer token)
    pub fn log_summary(&self) {
        tracing::info!(
            indexer_url = %self.indexer_url,
            indexer_token = if self.indexer_token.is_some() { "<set>" } else { "<none>" },
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            watched = self.watch_addresses.len(),
            ignored = self.ignore_senders.len(),
            api_port = self.api_port,
            "deposit watcher configuration"
        );
    }
}

fn parse_number<T: FromStr>(var_name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| {
        ConfigError::InvalidValue(var_name.to_string(), format!("not a number: {}", value))
    })
}

/// Split a comma-separated list, dropping blanks
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = WatcherConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.indexer_url, DEFAULT_INDEXER_URL);
        assert_eq!(config.poll_interval, Duration::from_millis(1000));
        assert_eq!(config.api_port, 3000);
        assert!(config.watch_addresses.is_empty());
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_address_lists() {
        let config = WatcherConfig::from_lookup(lookup_from(&[
            ("WATCH_ADDRESSES", "AAA, BBB,,CCC "),
            ("IGNORE_SENDERS", "HOT"),
            ("INDEXER_URL", "http://indexer:8980/"),
        ]))
        .unwrap();

        assert_eq!(config.watch_addresses, vec!["AAA", "BBB", "CCC"]);
        assert_eq!(config.ignore_senders, vec!["HOT"]);
        assert_eq!(config.indexer_url, "http://indexer:8980");
    }

    #[test]
    fn test_invalid_values() {
        let result = WatcherConfig::from_lookup(lookup_from(&[("POLL_INTERVAL_MS", "0")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue(_, _))));

        let result = WatcherConfig::from_lookup(lookup_from(&[("API_PORT", "http")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue(_, _))));

        let result = WatcherConfig::from_lookup(lookup_from(&[("LOG_FORMAT", "xml")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_log_format_parsing() {
        assert!(matches!("json".parse::<LogFormat>(), Ok(LogFormat::Json)));
        assert!(matches!("PRETTY".parse::<LogFormat>(), Ok(LogFormat::Pretty)));
    }
}
