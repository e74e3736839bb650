//! # Market Summary Exporter
//!
//! Polls a market data provider for 24h summaries of configured
//! (exchange, pair) markets and republishes them as Prometheus gauges.
//!
//! ## Published metrics
//!
//! Every series is labeled by `exchange` and `pair`:
//!
//! - `crypto_currency` - last traded value
//! - `crypto_high_24h_currency` / `crypto_low_24h_currency`
//! - `crypto_change_24h_currency` - absolute 24h change
//! - `crypto_change_24h_ratio` - relative 24h change
//! - `crypto_last_update_seconds` - only with `--exporter.last-update-metric`
//!
//! ## Architecture
//!
//! ```text
//! Cli::resolve() -> ExporterConfig
//!     ↓
//! CollectorLoop (fetch every refresh interval)
//!     ↓
//! MarketDataSource (Cryptowatch)
//!     ↓
//! MetricRegistry (prometheus gauges)
//!     ↓
//! MetricsServer (GET /metrics)
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use market_summary_exporter::{
//!     CollectorLoop, CollectorMetrics, CryptowatchProvider, ExporterConfig, MetricRegistry,
//! };
//! use std::sync::Arc;
//!
//! # async fn example(config: ExporterConfig) -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(MetricRegistry::new(config.track_last_update)?);
//! let metrics = Arc::new(CollectorMetrics::new(registry.registry())?);
//! let source = Arc::new(CryptowatchProvider::new(&config.api_url, config.request_timeout)?);
//!
//! let handle = CollectorLoop::new(&config, source, registry.clone(), metrics).spawn();
//! // ... serve registry.encode() to scrapers ...
//! let cycles = handle.shutdown().await?;
//! println!("ran {} cycles", cycles);
//! # Ok(())
//! # }
//! ```

pub mod collector;
pub mod config;
pub mod constants;
pub mod error;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod server;
pub mod types;

// Re-export commonly used types
pub use collector::{CollectorHandle, CollectorLoop};
pub use config::{Cli, ExporterConfig};
pub use error::{ConfigError, ProviderError, RegistryError};
pub use health::CollectorHealth;
pub use metrics::CollectorMetrics;
pub use provider::MarketDataSource;
pub use providers::CryptowatchProvider;
pub use registry::MetricRegistry;
pub use server::MetricsServer;
pub use types::{
    CycleReport, HealthReport, HealthStatus, MarketKey, MarketSummary, ParsedField,
    ParsedSummary, SeriesSample, Snapshot, SummaryField,
};
