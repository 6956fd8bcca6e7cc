// =============================================================================
// Feed Module
// =============================================================================
//
// Turns a candle source into an ordered, gap-free stream of completed bars:
// - `CandleFeed`: backfill / live state machine and the pull side
// - `LivePoller`: background task polling the source on a fixed grid
// - `BarEmitter`: consumer adapter writing pulled bars into a `BarSink`

pub mod candle_feed;
pub mod emitter;
pub mod error;
pub mod live;

pub use candle_feed::{CandleFeed, FeedEvent, StopHandle};
pub use emitter::BarEmitter;
pub use error::FeedError;
pub use live::PollerHealth;

use tokio::sync::watch;

/// Resolves once a stop has been requested or every sender is gone.
pub(crate) async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|stopped| *stopped).await;
}
