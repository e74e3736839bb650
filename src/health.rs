//! Collector health tracking served on `/health`

use crate::types::{HealthReport, HealthStatus};
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct HealthState {
    cycles: u64,
    consecutive_failures: u64,
    last_success: Option<DateTime<Utc>>,
}

/// Shared record of collection outcomes
///
/// Written by the collector once per cycle, read by the HTTP server.
pub struct CollectorHealth {
    source: String,
    tracked_markets: usize,
    state: RwLock<HealthState>,
}

impl CollectorHealth {
    /// Creates an empty record for `source` tracking `tracked_markets` markets
    pub fn new(source: &str, tracked_markets: usize) -> Self {
        Self {
            source: source.to_string(),
            tracked_markets,
            state: RwLock::new(HealthState::default()),
        }
    }

    /// Records a successful fetch
    pub async fn record_success(&self, at: DateTime<Utc>) {
        let mut state = self.state.write().await;
        state.cycles += 1;
        state.consecutive_failures = 0;
        state.last_success = Some(at);
    }

    /// Records a failed fetch
    pub async fn record_failure(&self) {
        let mut state = self.state.write().await;
        state.cycles += 1;
        state.consecutive_failures += 1;
    }

    /// Builds the current report
    pub async fn report(&self) -> HealthReport {
        let state = self.state.read().await;

        let status = if state.cycles == 0 {
            HealthStatus::Starting
        } else if state.consecutive_failures == 0 {
            HealthStatus::Healthy
        } else if state.last_success.is_some() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Unhealthy
        };

        HealthReport {
            status,
            source: self.source.clone(),
            tracked_markets: self.tracked_markets,
            cycles: state.cycles,
            consecutive_failures: state.consecutive_failures,
            last_success: state.last_success,
        }
    }
}
