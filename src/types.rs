// =============================================================================
// Shared types used across the trend feed
// =============================================================================

use serde::{Deserialize, Serialize};

/// Unit of a bar's time bucket. Combined with a multiplier (the
/// "compression") it names a granularity such as 15 minutes or 1 day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeFrame {
    Minutes,
    Days,
    Weeks,
}

impl Default for TimeFrame {
    fn default() -> Self {
        Self::Minutes
    }
}

impl std::fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Minutes => write!(f, "Minutes"),
            Self::Days => write!(f, "Days"),
            Self::Weeks => write!(f, "Weeks"),
        }
    }
}

/// Direction reported by the SuperTrend indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Up,
    Down,
}

impl Trend {
    /// Signed form of the trend: `+1` for up, `-1` for down.
    pub fn as_i8(self) -> i8 {
        match self {
            Self::Up => 1,
            Self::Down => -1,
        }
    }
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Up => write!(f, "Up"),
            Self::Down => write!(f, "Down"),
        }
    }
}

/// Lifecycle of a single feed instance. Only the feed itself moves between
/// states; `Terminated` is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedState {
    Idle,
    Backfilling,
    Live,
    Terminated,
}

impl Default for FeedState {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for FeedState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Backfilling => write!(f, "Backfilling"),
            Self::Live => write!(f, "Live"),
            Self::Terminated => write!(f, "Terminated"),
        }
    }
}

/// Why a feed stopped producing bars. Not an error: a normal terminal signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamEnd {
    /// Historical-only mode delivered the whole backfill.
    HistoricalComplete,
    /// An external stop request was observed.
    Stopped,
    /// The feed was never started, or its start failed.
    Failed,
}

impl std::fmt::Display for StreamEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HistoricalComplete => write!(f, "HistoricalComplete"),
            Self::Stopped => write!(f, "Stopped"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trend_signed_values() {
        assert_eq!(Trend::Up.as_i8(), 1);
        assert_eq!(Trend::Down.as_i8(), -1);
    }

    #[test]
    fn defaults_match_fresh_feed() {
        assert_eq!(FeedState::default(), FeedState::Idle);
        assert_eq!(TimeFrame::default(), TimeFrame::Minutes);
    }

    #[test]
    fn timeframe_deserialises_from_variant_name() {
        let tf: TimeFrame = serde_json::from_str("\"Days\"").unwrap();
        assert_eq!(tf, TimeFrame::Days);
        assert_eq!(tf.to_string(), "Days");
    }
}
