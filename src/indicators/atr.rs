// =============================================================================
// Average True Range (ATR) — streaming
// =============================================================================
//
// ATR measures market volatility by decomposing the entire range of a bar.
//
// True Range (TR) for each bar:
//   TR = max(H - L, |H - prevClose|, |L - prevClose|)
// The first bar has no previous close, so its TR is simply H - L.
//
// Smoothing:
//   Simple:  ATR_t = mean of the last `period` TR values
//   Wilder:  ATR_0 = mean of the first `period` TR values
//            ATR_t = (ATR_{t-1} * (period - 1) + TR_t) / period
//
// Either way the first value appears on the `period`-th bar.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::indicators::window::RollingWindow;

/// How successive true ranges are averaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AtrSmoothing {
    Simple,
    Wilder,
}

impl Default for AtrSmoothing {
    fn default() -> Self {
        Self::Simple
    }
}

/// True range of a bar given the previous bar's close, if any.
pub fn true_range(high: f64, low: f64, prev_close: Option<f64>) -> f64 {
    let hl = high - low;
    match prev_close {
        Some(pc) => hl.max((high - pc).abs()).max((low - pc).abs()),
        None => hl,
    }
}

/// Streaming ATR fed one bar at a time.
#[derive(Debug, Clone)]
pub struct AverageTrueRange {
    period: usize,
    smoothing: AtrSmoothing,
    window: RollingWindow,
    prev_close: Option<f64>,
    value: Option<f64>,
}

impl AverageTrueRange {
    pub fn new(period: usize, smoothing: AtrSmoothing) -> Self {
        Self {
            period,
            smoothing,
            window: RollingWindow::new(period),
            prev_close: None,
            value: None,
        }
    }

    /// Feed one bar and return the ATR, or `None` while warming up or when
    /// the inputs produced a non-finite value.
    pub fn update(&mut self, high: f64, low: f64, close: f64) -> Option<f64> {
        let tr = true_range(high, low, self.prev_close);
        self.prev_close = Some(close);
        self.window.push(tr);

        let period = self.period as f64;
        let next = match (self.smoothing, self.value) {
            (AtrSmoothing::Wilder, Some(prev)) => Some((prev * (period - 1.0) + tr) / period),
            _ => self.window.mean(),
        };

        self.value = next.filter(|v| v.is_finite());
        self.value
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }
}
