// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Streaming indicators fed one bar at a time. Every update returns `Option<T>`
// so callers handle the warm-up period and numerical edge cases explicitly.

pub mod atr;
pub mod supertrend;
pub mod window;

pub use atr::{AtrSmoothing, AverageTrueRange};
pub use supertrend::{calculate_supertrend, SuperTrend, SuperTrendParams, SuperTrendPoint};
