// =============================================================================
// Trend Flip Tracker — turns SuperTrend direction changes into entries
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::types::Trend;

/// Directional entry implied by a trend change. Entering one side implies
/// closing any position on the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendSignal {
    EnterLong,
    EnterShort,
}

impl std::fmt::Display for TrendSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EnterLong => write!(f, "LONG"),
            Self::EnterShort => write!(f, "SHORT"),
        }
    }
}

/// Remembers the last trend seen and reports when it changes.
#[derive(Debug, Clone, Default)]
pub struct TrendFlipTracker {
    last: Option<Trend>,
}

impl TrendFlipTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the latest trend. The first reading always counts as a change.
    pub fn observe(&mut self, trend: Trend) -> Option<TrendSignal> {
        if self.last.replace(trend) == Some(trend) {
            return None;
        }
        Some(match trend {
            Trend::Up => TrendSignal::EnterLong,
            Trend::Down => TrendSignal::EnterShort,
        })
    }

    pub fn last(&self) -> Option<Trend> {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_reading_is_a_signal() {
        let mut t = TrendFlipTracker::new();
        assert_eq!(t.observe(Trend::Up), Some(TrendSignal::EnterLong));
    }

    #[test]
    fn only_changes_signal() {
        let mut t = TrendFlipTracker::new();
        let seq = [Trend::Up, Trend::Up, Trend::Down, Trend::Down, Trend::Up];
        let signals: Vec<_> = seq.iter().map(|&tr| t.observe(tr)).collect();
        assert_eq!(
            signals,
            vec![
                Some(TrendSignal::EnterLong),
                None,
                Some(TrendSignal::EnterShort),
                None,
                Some(TrendSignal::EnterLong),
            ]
        );
        assert_eq!(t.last(), Some(Trend::Up));
    }

    #[test]
    fn display_matches_log_labels() {
        assert_eq!(TrendSignal::EnterLong.to_string(), "LONG");
        assert_eq!(TrendSignal::EnterShort.to_string(), "SHORT");
    }
}
