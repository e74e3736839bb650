//! Exporter self-telemetry
//!
//! Tracks fetch latency and outcomes for the market data source, registered
//! next to the market gauges so they are scraped together.

use crate::constants::{
    FETCHES_TOTAL_METRIC, FETCH_DURATION_BUCKETS, FETCH_DURATION_METRIC, INVALID_FIELDS_METRIC,
    MARKETS_UPDATED_METRIC,
};
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::time::Duration;

/// Collects exporter metrics for the collection loop
pub struct CollectorMetrics {
    fetches_total: IntCounterVec,
    fetch_duration: Histogram,
    markets_updated: IntGauge,
    invalid_fields: IntCounter,
}

impl CollectorMetrics {
    /// Creates the metrics and registers them in `registry`
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let fetches_total = IntCounterVec::new(
            Opts::new(
                FETCHES_TOTAL_METRIC,
                "Market summary fetches from the data source, by result",
            ),
            &["result"],
        )?;
        registry.register(Box::new(fetches_total.clone()))?;
        for result in ["success", "failure"] {
            fetches_total.with_label_values(&[result]);
        }

        let fetch_duration = Histogram::with_opts(
            HistogramOpts::new(
                FETCH_DURATION_METRIC,
                "Time spent fetching market summaries in seconds",
            )
            .buckets(FETCH_DURATION_BUCKETS.to_vec()),
        )?;
        registry.register(Box::new(fetch_duration.clone()))?;

        let markets_updated = IntGauge::new(
            MARKETS_UPDATED_METRIC,
            "Configured markets updated by the last successful cycle",
        )?;
        registry.register(Box::new(markets_updated.clone()))?;

        let invalid_fields = IntCounter::new(
            INVALID_FIELDS_METRIC,
            "Summary fields skipped because they were not valid decimal numbers",
        )?;
        registry.register(Box::new(invalid_fields.clone()))?;

        Ok(Self {
            fetches_total,
            fetch_duration,
            markets_updated,
            invalid_fields,
        })
    }

    /// Records a fetch with its duration and success status
    pub fn record_fetch(&self, duration: Duration, success: bool) {
        let result = if success { "success" } else { "failure" };
        self.fetches_total.with_label_values(&[result]).inc();
        self.fetch_duration.observe(duration.as_secs_f64());
    }

    /// Records the outcome of applying a snapshot
    pub fn record_update(&self, markets_updated: usize, fields_invalid: usize) {
        self.markets_updated.set(markets_updated as i64);
        self.invalid_fields.inc_by(fields_invalid as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{Encoder, TextEncoder};

    #[test]
    fn test_fetch_outcomes_counted_by_result() {
        let registry = Registry::new();
        let metrics = CollectorMetrics::new(&registry).unwrap();

        metrics.record_fetch(Duration::from_millis(100), true);
        metrics.record_fetch(Duration::from_millis(200), true);
        metrics.record_fetch(Duration::from_millis(150), false);

        assert_eq!(metrics.fetches_total.with_label_values(&["success"]).get(), 2);
        assert_eq!(metrics.fetches_total.with_label_values(&["failure"]).get(), 1);
        assert_eq!(metrics.fetch_duration.get_sample_count(), 3);
    }

    #[test]
    fn test_outcome_series_exist_before_first_fetch() {
        let registry = Registry::new();
        let _metrics = CollectorMetrics::new(&registry).unwrap();

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains(&format!("{}{{result=\"success\"}} 0", FETCHES_TOTAL_METRIC)));
        assert!(text.contains(&format!("{}{{result=\"failure\"}} 0", FETCHES_TOTAL_METRIC)));
    }

    #[test]
    fn test_registered_in_shared_registry() {
        let registry = Registry::new();
        let metrics = CollectorMetrics::new(&registry).unwrap();
        metrics.record_fetch(Duration::from_millis(20), true);
        metrics.record_update(3, 2);

        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&FETCHES_TOTAL_METRIC.to_string()));
        assert!(names.contains(&FETCH_DURATION_METRIC.to_string()));
        assert!(names.contains(&MARKETS_UPDATED_METRIC.to_string()));
        assert!(names.contains(&INVALID_FIELDS_METRIC.to_string()));
    }
}
