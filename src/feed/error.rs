// =============================================================================
// Feed Errors
// =============================================================================

use thiserror::Error;

use crate::types::TimeFrame;

/// Failures surfaced by [`CandleFeed::start`](crate::feed::CandleFeed::start).
///
/// Transient live-poll failures never show up here; they are logged and
/// recorded in [`PollerHealth`](crate::feed::PollerHealth) instead.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("no source granularity for {compression} x {timeframe}")]
    UnsupportedGranularity {
        timeframe: TimeFrame,
        compression: u32,
    },

    #[error("instrument {0} is not known to the source")]
    UnknownInstrument(String),

    #[error("instrument lookup for {instrument} failed: {source:#}")]
    InstrumentLookup {
        instrument: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("server time query failed: {0:#}")]
    ServerTime(#[source] anyhow::Error),

    #[error("invalid feed config: {0}")]
    InvalidConfig(String),

    #[error("backfill fetch failed: {0:#}")]
    Backfill(#[source] anyhow::Error),

    #[error("feed already started")]
    AlreadyStarted,
}

impl FeedError {
    /// True for errors raised while setting the feed up, before any fetch of
    /// bar data was attempted.
    pub fn is_initialization(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedGranularity { .. }
                | Self::UnknownInstrument(_)
                | Self::InstrumentLookup { .. }
                | Self::ServerTime(_)
                | Self::InvalidConfig(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        let init = FeedError::UnsupportedGranularity {
            timeframe: TimeFrame::Minutes,
            compression: 2,
        };
        assert!(init.is_initialization());
        assert!(FeedError::UnknownInstrument("FOO".into()).is_initialization());
        assert!(!FeedError::Backfill(anyhow::anyhow!("boom")).is_initialization());
        assert!(!FeedError::AlreadyStarted.is_initialization());
    }

    #[test]
    fn messages_carry_context() {
        let e = FeedError::UnsupportedGranularity {
            timeframe: TimeFrame::Minutes,
            compression: 2,
        };
        assert_eq!(e.to_string(), "no source granularity for 2 x Minutes");

        let e = FeedError::Backfill(anyhow::anyhow!("timeout").context("GET ohlc"));
        assert_eq!(e.to_string(), "backfill fetch failed: GET ohlc: timeout");
    }
}
