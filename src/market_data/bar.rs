use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single completed OHLCV bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Start of the time bucket. Unique and strictly increasing per feed.
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub trade_count: u64,
}

// ---------------------------------------------------------------------------
// BarSink -- where the emitter writes pulled bars
// ---------------------------------------------------------------------------

/// Consumer-side time-series representation that receives one scalar per
/// field for every pulled bar.
pub trait BarSink {
    fn write_bar(&mut self, bar: &Bar);
}

// ---------------------------------------------------------------------------
// BarSeries -- per-field column store
// ---------------------------------------------------------------------------

/// Column-oriented series of bars, one `VecDeque` per field.
///
/// With a capacity set, the oldest values are trimmed once the series grows
/// past it. Accessors take an `ago` offset: `0` is the latest bar, `1` the one
/// before it, and so on.
#[derive(Debug, Clone, Default)]
pub struct BarSeries {
    timestamps: VecDeque<DateTime<Utc>>,
    open: VecDeque<f64>,
    high: VecDeque<f64>,
    low: VecDeque<f64>,
    close: VecDeque<f64>,
    volume: VecDeque<f64>,
    trade_count: VecDeque<u64>,
    capacity: Option<usize>,
}

impl BarSeries {
    /// Create an unbounded series.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a series that retains at most `capacity` bars.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity.max(1)),
            ..Self::default()
        }
    }

    /// Append one bar, field by field, then trim to capacity.
    pub fn push(&mut self, bar: &Bar) {
        self.timestamps.push_back(bar.timestamp);
        self.open.push_back(bar.open);
        self.high.push_back(bar.high);
        self.low.push_back(bar.low);
        self.close.push_back(bar.close);
        self.volume.push_back(bar.volume);
        self.trade_count.push_back(bar.trade_count);

        if let Some(cap) = self.capacity {
            while self.timestamps.len() > cap {
                self.timestamps.pop_front();
                self.open.pop_front();
                self.high.pop_front();
                self.low.pop_front();
                self.close.pop_front();
                self.volume.pop_front();
                self.trade_count.pop_front();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamp(&self, ago: usize) -> Option<DateTime<Utc>> {
        at(&self.timestamps, ago)
    }

    pub fn open(&self, ago: usize) -> Option<f64> {
        at(&self.open, ago)
    }

    pub fn high(&self, ago: usize) -> Option<f64> {
        at(&self.high, ago)
    }

    pub fn low(&self, ago: usize) -> Option<f64> {
        at(&self.low, ago)
    }

    pub fn close(&self, ago: usize) -> Option<f64> {
        at(&self.close, ago)
    }

    pub fn volume(&self, ago: usize) -> Option<f64> {
        at(&self.volume, ago)
    }

    pub fn trade_count(&self, ago: usize) -> Option<u64> {
        at(&self.trade_count, ago)
    }

    /// Reassemble the bar `ago` positions back from the columns.
    pub fn bar(&self, ago: usize) -> Option<Bar> {
        Some(Bar {
            timestamp: self.timestamp(ago)?,
            open: self.open(ago)?,
            high: self.high(ago)?,
            low: self.low(ago)?,
            close: self.close(ago)?,
            volume: self.volume(ago)?,
            trade_count: self.trade_count(ago)?,
        })
    }

    /// Close prices, oldest first.
    pub fn closes(&self) -> Vec<f64> {
        self.close.iter().copied().collect()
    }
}

impl BarSink for BarSeries {
    fn write_bar(&mut self, bar: &Bar) {
        self.push(bar);
    }
}

fn at<T: Copy>(column: &VecDeque<T>, ago: usize) -> Option<T> {
    let idx = column.len().checked_sub(ago + 1)?;
    column.get(idx).copied()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
