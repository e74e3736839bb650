//! Startup configuration
//!
//! Flags keep the names used by the original exporter so existing deployments
//! keep working; every flag can also be set through its environment variable.
//! [`Cli::resolve`] validates everything once, before the collector starts.

use crate::{
    constants::{
        CRYPTOWATCH_API_URL, DEFAULT_EXCHANGES, DEFAULT_LISTEN_ADDRESS, DEFAULT_PAIRS,
        DEFAULT_REFRESH_INTERVAL_SECS, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_TELEMETRY_PATH,
    },
    error::ConfigError,
    types::MarketKey,
};
use clap::Parser;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

/// Command line arguments
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Cli {
    /// Address to listen on for web interface and telemetry
    #[arg(long = "web.listen-address", env = "LISTEN_ADDRESS", default_value = DEFAULT_LISTEN_ADDRESS)]
    pub listen_address: String,

    /// Path under which to expose metrics
    #[arg(long = "web.telemetry-path", env = "TELEMETRY_PATH", default_value = DEFAULT_TELEMETRY_PATH)]
    pub telemetry_path: String,

    /// Comma separated list of exchanges
    #[arg(long = "cryptowat.exchanges", env = "CRYPTOWAT_EXCHANGES", default_value = DEFAULT_EXCHANGES)]
    pub exchanges: String,

    /// Comma separated list of pairs
    #[arg(long = "cryptowat.pairs", env = "CRYPTOWAT_PAIRS", default_value = DEFAULT_PAIRS)]
    pub pairs: String,

    /// Number of seconds to cache values for (refresh interval)
    #[arg(long = "cryptowat.cacheseconds", env = "CRYPTOWAT_CACHESECONDS", default_value_t = DEFAULT_REFRESH_INTERVAL_SECS)]
    pub cache_seconds: u64,

    /// Base URL of the market data REST API
    #[arg(long = "cryptowat.api-url", env = "CRYPTOWAT_API_URL", default_value = CRYPTOWATCH_API_URL)]
    pub api_url: String,

    /// Timeout for one market data request, in seconds
    #[arg(long = "cryptowat.timeout-seconds", env = "CRYPTOWAT_TIMEOUT_SECONDS", default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    pub timeout_seconds: u64,

    /// Also publish crypto_last_update_seconds for every updated market
    #[arg(long = "exporter.last-update-metric", env = "EXPORTER_LAST_UPDATE_METRIC")]
    pub last_update_metric: bool,

    /// Log level (overridden by RUST_LOG)
    #[arg(long = "log.level", env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long = "log.json", env = "LOG_JSON")]
    pub log_json: bool,
}

/// Resolved, validated exporter configuration
///
/// Immutable once built; the collector and server only read it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExporterConfig {
    pub listen_address: SocketAddr,
    pub telemetry_path: String,
    pub exchanges: Vec<String>,
    pub pairs: Vec<String>,
    pub refresh_interval: Duration,
    pub api_url: String,
    pub request_timeout: Duration,
    pub track_last_update: bool,
}

impl Cli {
    /// Validates the arguments into an [`ExporterConfig`]
    pub fn resolve(&self) -> Result<ExporterConfig, ConfigError> {
        let exchanges = parse_list(&self.exchanges, "exchange list")?;
        let pairs = parse_list(&self.pairs, "pair list")?;

        if self.cache_seconds == 0 {
            return Err(ConfigError::InvalidInterval);
        }
        if self.timeout_seconds == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        if !self.telemetry_path.starts_with('/') {
            return Err(ConfigError::InvalidTelemetryPath(
                self.telemetry_path.clone(),
            ));
        }

        Ok(ExporterConfig {
            listen_address: parse_listen_address(&self.listen_address)?,
            telemetry_path: self.telemetry_path.clone(),
            exchanges,
            pairs,
            refresh_interval: Duration::from_secs(self.cache_seconds),
            api_url: self.api_url.clone(),
            request_timeout: Duration::from_secs(self.timeout_seconds),
            track_last_update: self.last_update_metric,
        })
    }
}

impl ExporterConfig {
    /// The desired exchange × pair set
    pub fn markets(&self) -> Vec<MarketKey> {
        MarketKey::cross_product(&self.exchanges, &self.pairs)
    }
}

/// Splits a comma separated list into lowercase tokens
///
/// Blank tokens are dropped and duplicates keep their first position.
pub fn parse_list(raw: &str, name: &'static str) -> Result<Vec<String>, ConfigError> {
    let mut items: Vec<String> = Vec::new();
    for token in raw.split(',') {
        let token = token.trim().to_lowercase();
        if !token.is_empty() && !items.contains(&token) {
            items.push(token);
        }
    }

    if items.is_empty() {
        return Err(ConfigError::empty_list(name));
    }
    Ok(items)
}

/// Parses a `host:port` listen address; `:port` binds every interface
pub fn parse_listen_address(raw: &str) -> Result<SocketAddr, ConfigError> {
    let address = match raw.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{}", port),
        None => raw.to_string(),
    };

    if let Ok(addr) = address.parse::<SocketAddr>() {
        return Ok(addr);
    }

    address
        .to_socket_addrs()
        .map_err(|e| ConfigError::invalid_listen_address(raw, e))?
        .next()
        .ok_or_else(|| ConfigError::invalid_listen_address(raw, "no address resolved"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["market-summary-exporter"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = cli(&[]).resolve().unwrap();

        assert_eq!(config.listen_address, "0.0.0.0:9745".parse().unwrap());
        assert_eq!(config.telemetry_path, "/metrics");
        assert_eq!(config.exchanges, vec!["kraken", "bitstamp"]);
        assert_eq!(config.pairs, vec!["btcusd", "ltcusd"]);
        assert_eq!(config.refresh_interval, Duration::from_secs(60));
        assert!(!config.track_last_update);
        assert_eq!(config.markets().len(), 4);
    }

    #[test]
    fn test_original_flag_names() {
        let config = cli(&[
            "--web.listen-address",
            "127.0.0.1:9100",
            "--cryptowat.exchanges",
            "Kraken, coinbase-pro",
            "--cryptowat.pairs",
            "btcusd",
            "--cryptowat.cacheseconds",
            "15",
            "--exporter.last-update-metric",
        ])
        .resolve()
        .unwrap();

        assert_eq!(config.listen_address.port(), 9100);
        assert_eq!(config.exchanges, vec!["kraken", "coinbase-pro"]);
        assert_eq!(config.refresh_interval, Duration::from_secs(15));
        assert!(config.track_last_update);
    }

    #[test]
    fn test_lists_are_deduplicated() {
        let items = parse_list("kraken,KRAKEN, bitstamp,,kraken,", "exchange list").unwrap();
        assert_eq!(items, vec!["kraken", "bitstamp"]);
    }

    #[test]
    fn test_empty_list_rejected() {
        let err = cli(&["--cryptowat.pairs", " , "]).resolve().unwrap_err();
        assert_eq!(err, ConfigError::empty_list("pair list"));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let err = cli(&["--cryptowat.cacheseconds", "0"]).resolve().unwrap_err();
        assert_eq!(err, ConfigError::InvalidInterval);
    }

    #[test]
    fn test_non_numeric_interval_rejected_by_parser() {
        let result = Cli::try_parse_from([
            "market-summary-exporter",
            "--cryptowat.cacheseconds",
            "soon",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_listen_address() {
        let err = cli(&["--web.listen-address", "not an address"])
            .resolve()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidListenAddress { .. }));
    }

    #[test]
    fn test_telemetry_path_must_be_absolute() {
        let err = cli(&["--web.telemetry-path", "metrics"]).resolve().unwrap_err();
        assert_eq!(err, ConfigError::InvalidTelemetryPath("metrics".to_string()));
    }
}
