//! Constants for the market summary exporter
//!
//! Defaults for every configuration flag live here, together with the
//! provider endpoint and exporter self-telemetry names.

/// Default address for the metrics endpoint (all interfaces)
pub const DEFAULT_LISTEN_ADDRESS: &str = ":9745";

/// Default path serving the Prometheus exposition
pub const DEFAULT_TELEMETRY_PATH: &str = "/metrics";

/// Default exchanges to track
pub const DEFAULT_EXCHANGES: &str = "kraken,bitstamp";

/// Default pairs to track
pub const DEFAULT_PAIRS: &str = "btcusd,ltcusd";

/// How often to fetch summaries from the provider (in seconds)
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60;

/// HTTP request timeout when fetching summaries (in seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Cryptowatch REST API base URL
pub const CRYPTOWATCH_API_URL: &str = "https://api.cryptowat.ch";

/// Cryptowatch endpoint returning summaries for every market
pub const CRYPTOWATCH_SUMMARIES_ENDPOINT: &str = "/markets/summaries";

/// User agent for HTTP requests
pub const USER_AGENT: &str = concat!("market-summary-exporter/", env!("CARGO_PKG_VERSION"));

/// Label names carried by every market series
pub const MARKET_LABELS: [&str; 2] = ["exchange", "pair"];

/// Optional per-market freshness gauge
pub const LAST_UPDATE_METRIC: &str = "crypto_last_update_seconds";

/// Exporter self-telemetry
pub const FETCHES_TOTAL_METRIC: &str = "crypto_exporter_fetches_total";
pub const FETCH_DURATION_METRIC: &str = "crypto_exporter_fetch_duration_seconds";
pub const MARKETS_UPDATED_METRIC: &str = "crypto_exporter_markets_updated";
pub const INVALID_FIELDS_METRIC: &str = "crypto_exporter_invalid_fields_total";

/// Buckets for the fetch latency histogram (seconds)
pub const FETCH_DURATION_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];
