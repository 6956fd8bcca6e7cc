// =============================================================================
// Kraken Module
// =============================================================================
//
// Public REST client acting as the feed's candle source, plus the table that
// maps (time unit, multiplier) pairs onto Kraken's OHLC interval codes.

pub mod client;
pub mod granularity;

pub use client::{KrakenClient, DEFAULT_BASE_URL};
pub use granularity::{lookup_granularity, Granularity};
