// =============================================================================
// Signals Module
// =============================================================================
//
// Turns indicator output into directional entries.

pub mod trend_flip;

pub use trend_flip::{TrendFlipTracker, TrendSignal};
