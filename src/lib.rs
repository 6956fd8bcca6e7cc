// =============================================================================
// Kraken Trend Feed
// =============================================================================
//
// Streams completed OHLCV bars for one Kraken pair (history first, then live
// polling) and tracks a SuperTrend trailing stop over them.
// =============================================================================

pub mod feed;
pub mod indicators;
pub mod kraken;
pub mod market_data;
pub mod runtime_config;
pub mod signals;
pub mod types;

#[cfg(test)]
mod testing;

pub use feed::{BarEmitter, CandleFeed, FeedError, FeedEvent, PollerHealth, StopHandle};
pub use indicators::{SuperTrend, SuperTrendParams, SuperTrendPoint};
pub use kraken::{lookup_granularity, Granularity, KrakenClient};
pub use market_data::{Bar, BarSeries, BarSink, CandleSource, InstrumentInfo};
pub use runtime_config::{FeedConfig, RuntimeConfig};
pub use signals::{TrendFlipTracker, TrendSignal};
pub use types::{FeedState, StreamEnd, TimeFrame, Trend};
