// =============================================================================
// Market Data Module
// =============================================================================
//
// Bar type, the consumer-side column store and the candle source interface
// the feed polls.

pub mod bar;
pub mod source;

pub use bar::{Bar, BarSeries, BarSink};
pub use source::{CandleSource, InstrumentInfo};
