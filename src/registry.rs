//! Metric registry holding the published market gauges
//!
//! Every series is a prometheus gauge labeled by `exchange` and `pair`. Gauges
//! store their value in an atomic, so a scrape running alongside a collection
//! cycle reads either the previous or the new value of each series, never a
//! partial one.

use crate::{
    constants::{LAST_UPDATE_METRIC, MARKET_LABELS},
    error::RegistryError,
    types::{MarketKey, SeriesSample, SummaryField},
};
use prometheus::core::Collector;
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};

/// Owned registry of market gauges
///
/// The collector is the only writer; the metrics endpoint reads through
/// [`MetricRegistry::encode`].
pub struct MetricRegistry {
    registry: Registry,
    last: GaugeVec,
    high_24h: GaugeVec,
    low_24h: GaugeVec,
    change_absolute: GaugeVec,
    change_percent: GaugeVec,
    last_update: Option<GaugeVec>,
}

impl MetricRegistry {
    /// Creates the registry and registers one gauge vector per summary field
    ///
    /// # Arguments
    /// * `track_last_update` - also publish `crypto_last_update_seconds`
    pub fn new(track_last_update: bool) -> Result<Self, RegistryError> {
        let registry = Registry::new();

        let last = register_gauge_vec(&registry, SummaryField::Last)?;
        let high_24h = register_gauge_vec(&registry, SummaryField::High24h)?;
        let low_24h = register_gauge_vec(&registry, SummaryField::Low24h)?;
        let change_absolute = register_gauge_vec(&registry, SummaryField::ChangeAbsolute)?;
        let change_percent = register_gauge_vec(&registry, SummaryField::ChangePercent)?;

        let last_update = if track_last_update {
            let vec = GaugeVec::new(
                Opts::new(LAST_UPDATE_METRIC, "Seconds since epoch of last update"),
                &MARKET_LABELS,
            )?;
            registry.register(Box::new(vec.clone()))?;
            Some(vec)
        } else {
            None
        };

        tracing::debug!(track_last_update, "Metric registry initialized");

        Ok(Self {
            registry,
            last,
            high_24h,
            low_24h,
            change_absolute,
            change_percent,
            last_update,
        })
    }

    /// Get the underlying Prometheus registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn gauge_vec(&self, field: SummaryField) -> &GaugeVec {
        match field {
            SummaryField::Last => &self.last,
            SummaryField::High24h => &self.high_24h,
            SummaryField::Low24h => &self.low_24h,
            SummaryField::ChangeAbsolute => &self.change_absolute,
            SummaryField::ChangePercent => &self.change_percent,
        }
    }

    /// Sets the value of one series, creating it on first use
    pub fn set_value(&self, field: SummaryField, key: &MarketKey, value: f64) {
        self.gauge_vec(field)
            .with_label_values(&[key.exchange.as_str(), key.pair.as_str()])
            .set(value);
    }

    /// Records the time of the last successful update for a market
    ///
    /// Does nothing unless the registry was built with `track_last_update`.
    pub fn set_last_update(&self, key: &MarketKey, epoch_seconds: f64) {
        if let Some(vec) = &self.last_update {
            vec.with_label_values(&[key.exchange.as_str(), key.pair.as_str()])
                .set(epoch_seconds);
        }
    }

    /// Whether the last-update gauge is published
    pub fn tracks_last_update(&self) -> bool {
        self.last_update.is_some()
    }

    /// Reads the current value of one series without creating it
    pub fn value(&self, field: SummaryField, key: &MarketKey) -> Option<f64> {
        find_value(self.gauge_vec(field), key)
    }

    /// Reads the last-update timestamp of a market, if tracked and set
    pub fn last_update(&self, key: &MarketKey) -> Option<f64> {
        self.last_update
            .as_ref()
            .and_then(|vec| find_value(vec, key))
    }

    /// Lists every market series with its current value, sorted by metric then labels
    pub fn snapshot(&self) -> Vec<SeriesSample> {
        let mut samples: Vec<SeriesSample> = SummaryField::ALL
            .iter()
            .flat_map(|field| collect_samples(self.gauge_vec(*field), field.metric_name()))
            .collect();

        samples.sort_by(|a, b| {
            (&a.metric, &a.exchange, &a.pair).cmp(&(&b.metric, &b.exchange, &b.pair))
        });
        samples
    }

    /// Number of market series across the five summary metrics
    pub fn series_count(&self) -> usize {
        SummaryField::ALL
            .iter()
            .map(|field| {
                self.gauge_vec(*field)
                    .collect()
                    .iter()
                    .map(|family| family.get_metric().len())
                    .sum::<usize>()
            })
            .sum()
    }

    /// Encodes everything registered in Prometheus text format
    pub fn encode(&self) -> Result<String, RegistryError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;

        Ok(String::from_utf8(buffer)?)
    }
}

fn register_gauge_vec(registry: &Registry, field: SummaryField) -> Result<GaugeVec, RegistryError> {
    let vec = GaugeVec::new(Opts::new(field.metric_name(), field.help()), &MARKET_LABELS)?;
    registry.register(Box::new(vec.clone()))?;
    Ok(vec)
}

fn label<'a>(metric: &'a prometheus::proto::Metric, name: &str) -> &'a str {
    metric
        .get_label()
        .iter()
        .find(|pair| pair.get_name() == name)
        .map(|pair| pair.get_value())
        .unwrap_or_default()
}

fn find_value(vec: &GaugeVec, key: &MarketKey) -> Option<f64> {
    vec.collect().iter().find_map(|family| {
        family
            .get_metric()
            .iter()
            .find(|metric| {
                label(metric, "exchange") == key.exchange && label(metric, "pair") == key.pair
            })
            .map(|metric| metric.get_gauge().get_value())
    })
}

fn collect_samples(vec: &GaugeVec, metric_name: &str) -> Vec<SeriesSample> {
    vec.collect()
        .iter()
        .flat_map(|family| family.get_metric().iter())
        .map(|metric| SeriesSample {
            metric: metric_name.to_string(),
            exchange: label(metric, "exchange").to_string(),
            pair: label(metric, "pair").to_string(),
            value: metric.get_gauge().get_value(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn kraken() -> MarketKey {
        MarketKey::new("kraken", "btcusd")
    }

    #[test]
    fn test_set_value_creates_and_overwrites() {
        let registry = MetricRegistry::new(false).unwrap();
        assert_eq!(registry.value(SummaryField::Last, &kraken()), None);
        assert_eq!(registry.series_count(), 0);

        registry.set_value(SummaryField::Last, &kraken(), 100.0);
        registry.set_value(SummaryField::Last, &kraken(), 101.5);

        assert_eq!(registry.value(SummaryField::Last, &kraken()), Some(101.5));
        assert_eq!(registry.value(SummaryField::High24h, &kraken()), None);
        assert_eq!(registry.series_count(), 1);
    }

    #[test]
    fn test_value_does_not_create_series() {
        let registry = MetricRegistry::new(false).unwrap();
        let _ = registry.value(SummaryField::Low24h, &kraken());
        assert_eq!(registry.series_count(), 0);
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn test_snapshot_is_sorted() {
        let registry = MetricRegistry::new(false).unwrap();
        registry.set_value(SummaryField::Last, &MarketKey::new("kraken", "btcusd"), 2.0);
        registry.set_value(SummaryField::Last, &MarketKey::new("bitstamp", "btcusd"), 1.0);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].exchange, "bitstamp");
        assert_eq!(snapshot[0].metric, "crypto_currency");
        assert_eq!(snapshot[1].value, 2.0);
    }

    #[test]
    fn test_encode_text_format() {
        let registry = MetricRegistry::new(true).unwrap();
        registry.set_value(SummaryField::ChangePercent, &kraken(), 0.0123);
        registry.set_last_update(&kraken(), 1_700_000_000.0);

        let text = registry.encode().unwrap();
        assert!(text.contains("# TYPE crypto_change_24h_ratio gauge"));
        assert!(text.contains(r#"crypto_change_24h_ratio{exchange="kraken",pair="btcusd"} 0.0123"#));
        assert!(text.contains("crypto_last_update_seconds"));
        // Vectors without children are not rendered
        assert!(!text.contains("crypto_high_24h_currency"));
    }

    #[test]
    fn test_last_update_disabled() {
        let registry = MetricRegistry::new(false).unwrap();
        registry.set_last_update(&kraken(), 1.0);

        assert!(!registry.tracks_last_update());
        assert_eq!(registry.last_update(&kraken()), None);
        assert!(!registry.encode().unwrap().contains("crypto_last_update_seconds"));
    }

    #[test]
    fn test_concurrent_reads_see_whole_values() {
        let registry = Arc::new(MetricRegistry::new(false).unwrap());
        let key = kraken();
        let candidates = [1.25_f64, 98765.4321];
        registry.set_value(SummaryField::Last, &key, candidates[0]);

        let writer = {
            let registry = registry.clone();
            let key = key.clone();
            std::thread::spawn(move || {
                for i in 0..10_000 {
                    registry.set_value(SummaryField::Last, &key, candidates[i % 2]);
                }
            })
        };

        let readers: Vec<_> = (0..2)
            .map(|_| {
                let registry = registry.clone();
                let key = key.clone();
                std::thread::spawn(move || {
                    for _ in 0..10_000 {
                        let value = registry.value(SummaryField::Last, &key).unwrap();
                        assert!(candidates.contains(&value), "torn value {value}");
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
