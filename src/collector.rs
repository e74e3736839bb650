//! Market summary collection loop
//!
//! Fetches the provider snapshot on a fixed cadence and republishes the
//! configured markets as gauges. Only the configured exchange × pair set is
//! ever published, so series count does not depend on how many markets the
//! provider tracks.

use crate::{
    config::ExporterConfig,
    health::CollectorHealth,
    metrics::CollectorMetrics,
    provider::MarketDataSource,
    registry::MetricRegistry,
    types::{CycleReport, MarketKey, ParsedField, Snapshot},
};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::sleep;

/// Background collector
///
/// The desired market set is computed once from the configuration and never
/// re-read. Cycles run strictly one after another.
pub struct CollectorLoop {
    source: Arc<dyn MarketDataSource>,
    registry: Arc<MetricRegistry>,
    metrics: Arc<CollectorMetrics>,
    health: Arc<CollectorHealth>,
    markets: Vec<MarketKey>,
    refresh_interval: Duration,
}

/// Handle to a spawned [`CollectorLoop`]
pub struct CollectorHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<u64>,
}

impl CollectorHandle {
    /// Signals the loop to stop and waits for it
    ///
    /// # Returns
    /// The number of cycles that ran
    pub async fn shutdown(self) -> Result<u64, JoinError> {
        // The task may already be gone; the join below reports how it ended
        let _ = self.shutdown.send(true);
        self.task.await
    }
}

impl CollectorLoop {
    /// Creates a collector for the markets and cadence in `config`
    pub fn new(
        config: &ExporterConfig,
        source: Arc<dyn MarketDataSource>,
        registry: Arc<MetricRegistry>,
        metrics: Arc<CollectorMetrics>,
    ) -> Self {
        let markets = config.markets();
        let health = Arc::new(CollectorHealth::new(source.source_name(), markets.len()));

        Self {
            source,
            registry,
            metrics,
            health,
            markets,
            refresh_interval: config.refresh_interval,
        }
    }

    /// Shared health record updated after every cycle
    pub fn health(&self) -> Arc<CollectorHealth> {
        self.health.clone()
    }

    /// The configured markets, in configuration order
    pub fn markets(&self) -> &[MarketKey] {
        &self.markets
    }

    /// Starts the loop on a background task
    pub fn spawn(self) -> CollectorHandle {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move { self.run(shutdown_rx).await });

        CollectorHandle { shutdown, task }
    }

    /// Runs cycles until `shutdown` turns true
    ///
    /// If the sender side is dropped the loop keeps running for the life of
    /// the process.
    ///
    /// # Returns
    /// The number of cycles that ran
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> u64 {
        tracing::info!(
            source = self.source.source_name(),
            markets = self.markets.len(),
            refresh_interval_secs = self.refresh_interval.as_secs(),
            "Starting market summary collector"
        );

        let mut cycles = 0;
        let mut listening = true;

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.run_cycle().await;
            cycles += 1;

            tracing::debug!(
                sleep_secs = self.refresh_interval.as_secs(),
                "Sleeping until next cycle"
            );
            if self.wait_next_cycle(&mut shutdown, &mut listening).await {
                break;
            }
        }

        tracing::info!(cycles, "Market summary collector stopped");
        cycles
    }

    /// Waits one refresh interval; returns true when shutdown was requested
    async fn wait_next_cycle(
        &self,
        shutdown: &mut watch::Receiver<bool>,
        listening: &mut bool,
    ) -> bool {
        let pause = sleep(self.refresh_interval);
        tokio::pin!(pause);

        loop {
            tokio::select! {
                _ = &mut pause => return false,
                changed = shutdown.changed(), if *listening => match changed {
                    Ok(()) if *shutdown.borrow() => return true,
                    Ok(()) => {}
                    Err(_) => *listening = false,
                },
            }
        }
    }

    /// Runs a single fetch → filter → parse → update pass
    ///
    /// A failed fetch leaves every published series untouched.
    pub async fn run_cycle(&self) -> CycleReport {
        let start = Instant::now();
        let result = self.source.fetch_summaries().await;
        self.metrics.record_fetch(start.elapsed(), result.is_ok());

        match result {
            Ok(snapshot) => {
                let report = self.apply_snapshot(&snapshot);
                self.health.record_success(Utc::now()).await;
                report
            }
            Err(e) => {
                tracing::warn!(
                    source = self.source.source_name(),
                    error = %e,
                    "Unable to fetch market summaries, keeping previous values"
                );
                self.health.record_failure().await;
                CycleReport::FetchFailed {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Publishes the configured markets found in `snapshot`
    fn apply_snapshot(&self, snapshot: &Snapshot) -> CycleReport {
        let updated_at = Utc::now().timestamp_millis() as f64 / 1000.0;

        let mut markets_updated = 0;
        let mut markets_missing = 0;
        let mut fields_set = 0;
        let mut fields_invalid = 0;

        for key in &self.markets {
            let Some(summary) = snapshot.get(&key.market_id()) else {
                tracing::debug!(
                    exchange = %key.exchange,
                    pair = %key.pair,
                    "Market not present in snapshot"
                );
                markets_missing += 1;
                continue;
            };

            let mut market_fields = 0;
            for (field, parsed) in summary.parse().iter() {
                match parsed {
                    ParsedField::Value(value) => {
                        self.registry.set_value(field, key, *value);
                        market_fields += 1;
                    }
                    ParsedField::Invalid { raw } => {
                        tracing::debug!(
                            exchange = %key.exchange,
                            pair = %key.pair,
                            field = field.as_str(),
                            raw = %raw,
                            "Skipping unparseable field"
                        );
                        fields_invalid += 1;
                    }
                }
            }

            if market_fields > 0 {
                self.registry.set_last_update(key, updated_at);
                markets_updated += 1;
            }
            fields_set += market_fields;
        }

        self.metrics.record_update(markets_updated, fields_invalid);

        tracing::info!(
            markets_seen = snapshot.len(),
            markets_updated,
            markets_missing,
            fields_invalid,
            "Applied market summaries"
        );

        CycleReport::Updated {
            markets_seen: snapshot.len(),
            markets_updated,
            markets_missing,
            fields_set,
            fields_invalid,
        }
    }
}
