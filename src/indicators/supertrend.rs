// =============================================================================
// SuperTrend — streaming trend / trailing-stop indicator
// =============================================================================
//
// Per bar:
//   mid   = (highest high + lowest low) / 2        over the last `period` bars
//   up    = mid - factor * ATR(period)
//   down  = mid + factor * ATR(period)
//
//   trailing_up   = max(up, prev_trailing_up)      if prev close > prev_trailing_up
//                 = up                             otherwise
//   trailing_down = min(down, prev_trailing_down)  if prev close < prev_trailing_down
//                 = down                           otherwise
//
//   trend = Up    if close > prev_trailing_down
//         = Down  if close < prev_trailing_up
//         = prev  otherwise (ties hold)
//   The first evaluable bar seeds the trend as Up.
//
//   stop  = trailing_up when Up, trailing_down when Down.
//
// Nothing is emitted until `period` bars have been seen.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::indicators::atr::{AtrSmoothing, AverageTrueRange};
use crate::indicators::window::RollingWindow;
use crate::market_data::Bar;
use crate::types::Trend;

fn default_period() -> usize {
    7
}

fn default_factor() -> f64 {
    3.0
}

/// SuperTrend configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuperTrendParams {
    /// Look-back for the ATR and the highest-high / lowest-low window.
    #[serde(default = "default_period")]
    pub period: usize,

    /// ATR multiplier applied on both sides of the midpoint.
    #[serde(default = "default_factor")]
    pub factor: f64,

    /// How true ranges are averaged.
    #[serde(default)]
    pub smoothing: AtrSmoothing,
}

impl Default for SuperTrendParams {
    fn default() -> Self {
        Self {
            period: default_period(),
            factor: default_factor(),
            smoothing: AtrSmoothing::default(),
        }
    }
}

impl SuperTrendParams {
    pub fn is_valid(&self) -> bool {
        self.period > 0 && self.factor.is_finite() && self.factor >= 0.0
    }
}

/// Band and trend state carried from one bar to the next.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendState {
    pub trend: Trend,
    pub trailing_up: f64,
    pub trailing_down: f64,
}

impl TrendState {
    /// State for the first evaluable bar: bands equal the candidates and the
    /// trend starts Up.
    pub fn seed(up: f64, down: f64) -> Self {
        Self {
            trend: Trend::Up,
            trailing_up: up,
            trailing_down: down,
        }
    }

    /// Next state from this one, given the bar's candidate bands, its close
    /// and the previous bar's close.
    pub fn advance(&self, up: f64, down: f64, close: f64, prev_close: f64) -> Self {
        let trailing_up = if prev_close > self.trailing_up {
            up.max(self.trailing_up)
        } else {
            up
        };

        let trailing_down = if prev_close < self.trailing_down {
            down.min(self.trailing_down)
        } else {
            down
        };

        let trend = if close > self.trailing_down {
            Trend::Up
        } else if close < self.trailing_up {
            Trend::Down
        } else {
            self.trend
        };

        Self {
            trend,
            trailing_up,
            trailing_down,
        }
    }

    pub fn stop(&self) -> f64 {
        match self.trend {
            Trend::Up => self.trailing_up,
            Trend::Down => self.trailing_down,
        }
    }
}

/// One indicator reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SuperTrendPoint {
    pub trend: Trend,
    pub stop: f64,
    pub trailing_up: f64,
    pub trailing_down: f64,
    pub atr: f64,
}

/// Streaming SuperTrend. Feed bars in delivery order with [`SuperTrend::update`].
#[derive(Debug, Clone)]
pub struct SuperTrend {
    params: SuperTrendParams,
    atr: AverageTrueRange,
    highs: RollingWindow,
    lows: RollingWindow,
    prev_close: Option<f64>,
    state: Option<TrendState>,
}

impl SuperTrend {
    /// Returns `None` when `period` is zero or `factor` is negative or not
    /// finite.
    pub fn new(params: SuperTrendParams) -> Option<Self> {
        if !params.is_valid() {
            return None;
        }
        Some(Self {
            atr: AverageTrueRange::new(params.period, params.smoothing),
            highs: RollingWindow::new(params.period),
            lows: RollingWindow::new(params.period),
            prev_close: None,
            state: None,
            params,
        })
    }

    /// Consume one bar. `None` means "not yet available".
    pub fn update(&mut self, bar: &Bar) -> Option<SuperTrendPoint> {
        let atr = self.atr.update(bar.high, bar.low, bar.close);
        self.highs.push(bar.high);
        self.lows.push(bar.low);
        let prev_close = self.prev_close.replace(bar.close);

        let atr = atr?;
        let mid = (self.highs.max()? + self.lows.min()?) / 2.0;
        let up = mid - self.params.factor * atr;
        let down = mid + self.params.factor * atr;

        let next = match (self.state, prev_close) {
            (Some(state), Some(pc)) => state.advance(up, down, bar.close, pc),
            _ => TrendState::seed(up, down),
        };
        self.state = Some(next);

        Some(SuperTrendPoint {
            trend: next.trend,
            stop: next.stop(),
            trailing_up: next.trailing_up,
            trailing_down: next.trailing_down,
            atr,
        })
    }

    pub fn state(&self) -> Option<&TrendState> {
        self.state.as_ref()
    }

    pub fn params(&self) -> &SuperTrendParams {
        &self.params
    }
}

/// Run SuperTrend over a slice of bars, one output per input bar.
///
/// Invalid params yield `None` for every bar.
pub fn calculate_supertrend(bars: &[Bar], params: SuperTrendParams) -> Vec<Option<SuperTrendPoint>> {
    match SuperTrend::new(params) {
        Some(mut st) => bars.iter().map(|b| st.update(b)).collect(),
        None => vec![None; bars.len()],
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bar(i: i64, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            timestamp: Utc.timestamp_opt(1_700_000_000 + i * 60, 0).unwrap(),
            open: close,
            high,
            low,
            close,
            volume: 1.0,
            trade_count: 1,
        }
    }

    fn linear(count: i64, start: f64, step: f64) -> Vec<Bar> {
        (0..count)
            .map(|i| {
                let c = start + step * i as f64;
                bar(i, c + 1.0, c - 1.0, c)
            })
            .collect()
    }

    #[test]
    fn defaults() {
        let p = SuperTrendParams::default();
        assert_eq!(p.period, 7);
        assert_eq!(p.factor, 3.0);
        assert_eq!(p.smoothing, AtrSmoothing::Simple);
    }

    #[test]
    fn unavailable_before_period_then_seeded_up() {
        let bars = linear(10, 100.0, 0.5);
        let out = calculate_supertrend(&bars, SuperTrendParams::default());

        assert!(out[..6].iter().all(Option::is_none));
        let seed = out[6].expect("defined on the 7th bar");
        assert_eq!(seed.trend, Trend::Up);
        assert_eq!(seed.stop, seed.trailing_up);
        assert!(out[7..].iter().all(Option::is_some));
    }

    #[test]
    fn seed_values_by_hand() {
        let params = SuperTrendParams {
            period: 3,
            factor: 1.0,
            smoothing: AtrSmoothing::Simple,
        };
        let bars = [bar(0, 12.0, 8.0, 10.0), bar(1, 13.0, 9.0, 11.0), bar(2, 14.0, 10.0, 12.0)];
        let out = calculate_supertrend(&bars, params);

        // TRs = 4, 4, 4 -> ATR 4; HH 14, LL 8 -> mid 11.
        let p = out[2].unwrap();
        assert_eq!(p.atr, 4.0);
        assert_eq!(p.trailing_up, 7.0);
        assert_eq!(p.trailing_down, 15.0);
        assert_eq!(p.trend, Trend::Up);
        assert_eq!(p.stop, 7.0);
    }

    #[test]
    fn ties_hold_previous_trend() {
        let down = TrendState {
            trend: Trend::Down,
            trailing_up: 7.0,
            trailing_down: 15.0,
        };
        // close == prev trailing_down: not strictly above, stays Down.
        assert_eq!(down.advance(7.0, 15.0, 15.0, 14.0).trend, Trend::Down);

        let up = TrendState {
            trend: Trend::Up,
            ..down
        };
        // close == prev trailing_up: not strictly below, stays Up.
        assert_eq!(up.advance(7.0, 15.0, 7.0, 8.0).trend, Trend::Up);
    }

    #[test]
    fn crossing_bands_flips_trend() {
        let state = TrendState {
            trend: Trend::Down,
            trailing_up: 7.0,
            trailing_down: 15.0,
        };
        assert_eq!(state.advance(7.0, 15.0, 15.5, 14.0).trend, Trend::Up);

        let state = TrendState {
            trend: Trend::Up,
            ..state
        };
        assert_eq!(state.advance(7.0, 15.0, 6.5, 8.0).trend, Trend::Down);
    }

    #[test]
    fn bands_ratchet_and_reset() {
        let state = TrendState::seed(10.0, 20.0);

        // Previous close inside both bands: up ratchets up only, down ratchets down only.
        let next = state.advance(9.0, 21.0, 15.0, 15.0);
        assert_eq!(next.trailing_up, 10.0);
        assert_eq!(next.trailing_down, 20.0);

        // Previous close below trailing_up: the band resets to the candidate.
        let reset = state.advance(4.0, 21.0, 8.0, 9.0);
        assert_eq!(reset.trailing_up, 4.0);

        // Previous close above trailing_down: the band resets to the candidate.
        let reset = state.advance(9.0, 25.0, 22.0, 21.0);
        assert_eq!(reset.trailing_down, 25.0);
    }

    #[test]
    fn rising_closes_stay_up_with_rising_support() {
        let bars = linear(40, 100.0, 4.0);
        let out: Vec<SuperTrendPoint> = calculate_supertrend(&bars, SuperTrendParams::default())
            .into_iter()
            .flatten()
            .collect();

        assert!(out.iter().all(|p| p.trend == Trend::Up));
        assert!(out.windows(2).all(|w| w[1].trailing_up >= w[0].trailing_up));
        assert!(out.iter().all(|p| p.stop == p.trailing_up));
    }

    #[test]
    fn falling_closes_turn_down_with_falling_resistance() {
        let bars = linear(40, 300.0, -4.0);
        let out: Vec<SuperTrendPoint> = calculate_supertrend(&bars, SuperTrendParams::default())
            .into_iter()
            .flatten()
            .collect();

        // out[0] is the seed (Up); the second reading already crosses below.
        assert_eq!(out[0].trend, Trend::Up);
        assert!(out[1..].iter().all(|p| p.trend == Trend::Down));
        assert!(out.windows(2).all(|w| w[1].trailing_down <= w[0].trailing_down));
        assert!(out[1..].iter().all(|p| p.stop == p.trailing_down));
    }

    #[test]
    fn wilder_smoothing_is_defined_from_the_same_bar() {
        let params = SuperTrendParams {
            smoothing: AtrSmoothing::Wilder,
            ..SuperTrendParams::default()
        };
        let out = calculate_supertrend(&linear(12, 50.0, 1.0), params);
        assert!(out[5].is_none());
        assert!(out[6].is_some());
    }

    #[test]
    fn invalid_params_rejected() {
        let zero = SuperTrendParams {
            period: 0,
            ..SuperTrendParams::default()
        };
        assert!(SuperTrend::new(zero.clone()).is_none());
        assert!(calculate_supertrend(&linear(3, 1.0, 1.0), zero)
            .iter()
            .all(Option::is_none));

        let nan = SuperTrendParams {
            factor: f64::NAN,
            ..SuperTrendParams::default()
        };
        assert!(SuperTrend::new(nan).is_none());
    }

    #[test]
    fn streaming_matches_batch() {
        let bars: Vec<Bar> = (0..30)
            .map(|i| {
                let c = 100.0 + (i as f64 * 0.7).sin() * 8.0;
                bar(i, c + 2.0, c - 2.0, c)
            })
            .collect();

        let batch = calculate_supertrend(&bars, SuperTrendParams::default());
        let mut st = SuperTrend::new(SuperTrendParams::default()).unwrap();
        for (b, expected) in bars.iter().zip(batch) {
            assert_eq!(st.update(b), expected);
        }
        assert!(st.state().is_some());
    }
}
