// =============================================================================
// Candle Source — the exchange-facing collaborator the feed polls
// =============================================================================

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::kraken::Granularity;
use crate::market_data::Bar;

/// What the source knows about a tradable instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentInfo {
    /// Canonical pair name, e.g. `XXBTZUSD`.
    pub name: String,
    /// Alternate name, e.g. `XBTUSD`.
    pub altname: String,
    pub base: String,
    pub quote: String,
}

/// Provider of OHLCV rows and a server clock.
///
/// `fetch_candles` must return rows with strictly increasing timestamps. The
/// last row of any response may still be forming; callers decide what to do
/// with it.
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Look up an instrument. `Ok(None)` means the source does not know it.
    async fn resolve_instrument(&self, instrument: &str) -> Result<Option<InstrumentInfo>>;

    /// Rows for `instrument` at `granularity` starting from `since`.
    async fn fetch_candles(
        &self,
        instrument: &str,
        since: DateTime<Utc>,
        granularity: Granularity,
    ) -> Result<Vec<Bar>>;

    /// Current time according to the source.
    async fn server_time(&self) -> Result<DateTime<Utc>>;
}
