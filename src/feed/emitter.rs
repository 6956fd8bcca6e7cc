// =============================================================================
// Bar Emitter — the only place bars leave the feed
// =============================================================================

use crate::feed::{CandleFeed, FeedError, FeedEvent};
use crate::market_data::{BarSink, CandleSource};

/// Pulls bars from a feed and writes each one into the consumer's series.
/// Holds no buffer of its own.
#[derive(Debug)]
pub struct BarEmitter<S: CandleSource + 'static> {
    feed: CandleFeed<S>,
}

impl<S: CandleSource + 'static> BarEmitter<S> {
    pub fn new(feed: CandleFeed<S>) -> Self {
        Self { feed }
    }

    /// Start the wrapped feed.
    pub async fn start(&mut self) -> Result<(), FeedError> {
        self.feed.start().await
    }

    /// Pull one bar into `sink`. On end of stream the sink is left untouched.
    pub async fn pull(&mut self, sink: &mut impl BarSink) -> FeedEvent {
        let event = self.feed.next_bar().await;
        if let FeedEvent::Bar(bar) = &event {
            sink.write_bar(bar);
        }
        event
    }

    pub fn feed(&self) -> &CandleFeed<S> {
        &self.feed
    }

    pub fn feed_mut(&mut self) -> &mut CandleFeed<S> {
        &mut self.feed
    }

    pub fn into_inner(self) -> CandleFeed<S> {
        self.feed
    }
}
