//! Provider abstraction for fetching market summaries from external APIs

use crate::{error::ProviderError, types::Snapshot};
use async_trait::async_trait;

/// Trait for market data sources
///
/// Implementations return the provider's full snapshot in one call; filtering
/// down to configured markets is the collector's job.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Fetches summaries for every market the provider tracks
    ///
    /// # Returns
    /// Map of `"exchange:pair"` to summary, or an error if the fetch fails.
    /// A failed fetch carries no partial data.
    async fn fetch_summaries(&self) -> Result<Snapshot, ProviderError>;

    /// Returns the name of this source
    fn source_name(&self) -> &'static str;
}
