//! Types for the market summary exporter

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// One provider snapshot: `"exchange:pair"` market identifier to summary
pub type Snapshot = HashMap<String, MarketSummary>;

/// Identity of a published market: an (exchange, pair) combination
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MarketKey {
    /// Exchange identifier, lowercase (e.g. `kraken`)
    pub exchange: String,
    /// Trading pair identifier, lowercase (e.g. `btcusd`)
    pub pair: String,
}

impl MarketKey {
    /// Creates a key, lowercasing both tokens
    pub fn new(exchange: &str, pair: &str) -> Self {
        Self {
            exchange: exchange.to_lowercase(),
            pair: pair.to_lowercase(),
        }
    }

    /// Parses a provider market identifier of the form `exchange:pair`
    ///
    /// Returns `None` unless there is exactly one `:` with a non-empty token
    /// on each side.
    pub fn parse(market_id: &str) -> Option<Self> {
        let (exchange, pair) = market_id.split_once(':')?;
        if exchange.is_empty() || pair.is_empty() || pair.contains(':') {
            return None;
        }
        Some(Self::new(exchange, pair))
    }

    /// The provider market identifier for this key
    pub fn market_id(&self) -> String {
        format!("{}:{}", self.exchange, self.pair)
    }

    /// Builds the exchange × pair cross product, in configuration order
    pub fn cross_product(exchanges: &[String], pairs: &[String]) -> Vec<MarketKey> {
        exchanges
            .iter()
            .flat_map(|exchange| pairs.iter().map(move |pair| MarketKey::new(exchange, pair)))
            .collect()
    }
}

impl fmt::Display for MarketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.exchange, self.pair)
    }
}

/// The five published summary fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SummaryField {
    /// Last traded price
    Last,
    /// Highest price over the last 24 hours
    High24h,
    /// Lowest price over the last 24 hours
    Low24h,
    /// Absolute price change over the last 24 hours
    ChangeAbsolute,
    /// Relative price change over the last 24 hours
    ChangePercent,
}

impl SummaryField {
    /// All fields, in publication order
    pub const ALL: [SummaryField; 5] = [
        SummaryField::Last,
        SummaryField::High24h,
        SummaryField::Low24h,
        SummaryField::ChangeAbsolute,
        SummaryField::ChangePercent,
    ];

    /// Metric name published for this field
    ///
    /// These names are consumed by existing dashboards and must not change.
    pub fn metric_name(&self) -> &'static str {
        match self {
            SummaryField::Last => "crypto_currency",
            SummaryField::High24h => "crypto_high_24h_currency",
            SummaryField::Low24h => "crypto_low_24h_currency",
            SummaryField::ChangeAbsolute => "crypto_change_24h_currency",
            SummaryField::ChangePercent => "crypto_change_24h_ratio",
        }
    }

    /// Help text published for this field
    pub fn help(&self) -> &'static str {
        match self {
            SummaryField::Last => {
                "The last known trading value in a given market in the currency of the RHS of the pair"
            }
            SummaryField::High24h => {
                "The 24h highest value in a given market in the currency of the RHS of the pair"
            }
            SummaryField::Low24h => {
                "The 24h lowest value in a given market in the currency of the RHS of the pair"
            }
            SummaryField::ChangeAbsolute => {
                "The 24h absolute change in a given market in the currency of the RHS of the pair"
            }
            SummaryField::ChangePercent => "The 24h change ratio in a given market",
        }
    }

    /// Short name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryField::Last => "last",
            SummaryField::High24h => "high_24h",
            SummaryField::Low24h => "low_24h",
            SummaryField::ChangeAbsolute => "change_absolute",
            SummaryField::ChangePercent => "change_percent",
        }
    }
}

/// Summary of one market as returned by the provider
///
/// Every field keeps the provider's decimal text; conversion happens in
/// [`MarketSummary::parse`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketSummary {
    pub last: String,
    pub high_24h: String,
    pub low_24h: String,
    pub change_absolute: String,
    pub change_percent: String,
}

impl MarketSummary {
    /// Parses every field independently
    pub fn parse(&self) -> ParsedSummary {
        ParsedSummary {
            last: ParsedField::parse(&self.last),
            high_24h: ParsedField::parse(&self.high_24h),
            low_24h: ParsedField::parse(&self.low_24h),
            change_absolute: ParsedField::parse(&self.change_absolute),
            change_percent: ParsedField::parse(&self.change_percent),
        }
    }
}

/// Outcome of converting one decimal string
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedField {
    /// A finite floating-point value
    Value(f64),
    /// Text that is not a finite decimal number; the field is skipped
    Invalid { raw: String },
}

impl ParsedField {
    /// Parses provider decimal text. Non-finite results (`NaN`, `inf`) are invalid.
    pub fn parse(raw: &str) -> Self {
        match raw.parse::<f64>() {
            Ok(value) if value.is_finite() => ParsedField::Value(value),
            _ => ParsedField::Invalid {
                raw: raw.to_string(),
            },
        }
    }

    /// The parsed value, if any
    pub fn value(&self) -> Option<f64> {
        match self {
            ParsedField::Value(value) => Some(*value),
            ParsedField::Invalid { .. } => None,
        }
    }
}

/// A [`MarketSummary`] with every field converted
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSummary {
    pub last: ParsedField,
    pub high_24h: ParsedField,
    pub low_24h: ParsedField,
    pub change_absolute: ParsedField,
    pub change_percent: ParsedField,
}

impl ParsedSummary {
    /// Parsed result of a single field
    pub fn get(&self, field: SummaryField) -> &ParsedField {
        match field {
            SummaryField::Last => &self.last,
            SummaryField::High24h => &self.high_24h,
            SummaryField::Low24h => &self.low_24h,
            SummaryField::ChangeAbsolute => &self.change_absolute,
            SummaryField::ChangePercent => &self.change_percent,
        }
    }

    /// Iterates over `(field, result)` in publication order
    pub fn iter(&self) -> impl Iterator<Item = (SummaryField, &ParsedField)> + '_ {
        SummaryField::ALL
            .into_iter()
            .map(move |field| (field, self.get(field)))
    }
}

/// Current value of one published market series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSample {
    pub metric: String,
    pub exchange: String,
    pub pair: String,
    pub value: f64,
}

/// Result of one collection cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleReport {
    /// The provider could not be reached; nothing was updated
    FetchFailed { error: String },
    /// The snapshot was applied
    Updated {
        /// Markets present in the provider snapshot
        markets_seen: usize,
        /// Configured markets with at least one field set
        markets_updated: usize,
        /// Configured markets absent from the snapshot
        markets_missing: usize,
        /// Gauge values written
        fields_set: usize,
        /// Fields skipped because they did not parse
        fields_invalid: usize,
    },
}

impl CycleReport {
    /// True when the fetch succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, CycleReport::Updated { .. })
    }
}

/// Overall exporter health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// No cycle has completed yet
    Starting,
    /// The last fetch succeeded
    Healthy,
    /// The last fetch failed but earlier data is still published
    Degraded,
    /// No fetch has ever succeeded
    Unhealthy,
}

/// Health report served on `/health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub source: String,
    pub tracked_markets: usize,
    pub cycles: u64,
    pub consecutive_failures: u64,
    pub last_success: Option<DateTime<Utc>>,
}
