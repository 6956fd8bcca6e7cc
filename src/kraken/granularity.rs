// =============================================================================
// Granularity Table — (time unit, multiplier) → Kraken OHLC interval code
// =============================================================================
//
// Kraken's OHLC endpoint takes the bucket size as an `interval` in minutes and
// only accepts a fixed set of values. Anything outside this table is rejected
// before a request is ever made.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::types::TimeFrame;

/// Source-native bucket size. For Kraken this is the interval in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Granularity(u32);

impl Granularity {
    pub fn code(self) -> u32 {
        self.0
    }

    /// Length of one bucket.
    pub fn bucket(self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.0))
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}m", self.0)
    }
}

const GRANULARITIES: &[(TimeFrame, u32, u32)] = &[
    (TimeFrame::Minutes, 1, 1),
    (TimeFrame::Minutes, 5, 5),
    (TimeFrame::Minutes, 15, 15),
    (TimeFrame::Minutes, 30, 30),
    (TimeFrame::Minutes, 60, 60),
    (TimeFrame::Minutes, 240, 240),
    (TimeFrame::Days, 1, 1440),
    (TimeFrame::Weeks, 1, 10080),
    (TimeFrame::Days, 15, 21600),
];

/// Look up the interval code for `multiplier` units of `timeframe`.
///
/// Returns `None` for pairs Kraken does not serve, e.g. 2-minute bars.
pub fn lookup_granularity(timeframe: TimeFrame, multiplier: u32) -> Option<Granularity> {
    GRANULARITIES
        .iter()
        .find(|(tf, m, _)| *tf == timeframe && *m == multiplier)
        .map(|(_, _, code)| Granularity(*code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapped_pairs_resolve() {
        assert_eq!(lookup_granularity(TimeFrame::Minutes, 1).map(Granularity::code), Some(1));
        assert_eq!(lookup_granularity(TimeFrame::Minutes, 240).map(Granularity::code), Some(240));
        assert_eq!(lookup_granularity(TimeFrame::Days, 1).map(Granularity::code), Some(1440));
        assert_eq!(lookup_granularity(TimeFrame::Weeks, 1).map(Granularity::code), Some(10080));
        assert_eq!(lookup_granularity(TimeFrame::Days, 15).map(Granularity::code), Some(21600));
    }

    #[test]
    fn unmapped_pairs_are_unsupported() {
        assert!(lookup_granularity(TimeFrame::Minutes, 2).is_none());
        assert!(lookup_granularity(TimeFrame::Days, 7).is_none());
        assert!(lookup_granularity(TimeFrame::Weeks, 2).is_none());
        assert!(lookup_granularity(TimeFrame::Minutes, 0).is_none());
    }

    #[test]
    fn bucket_length() {
        let g = lookup_granularity(TimeFrame::Minutes, 15).unwrap();
        assert_eq!(g.bucket(), chrono::Duration::minutes(15));
        assert_eq!(g.to_string(), "15m");
    }
}
