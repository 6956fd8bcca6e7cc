// =============================================================================
// Runtime Configuration — feed, indicator and client settings
// =============================================================================
//
// All fields carry `#[serde(default)]` so that a partial (or empty) JSON file
// loads cleanly. Environment variables applied by `apply_env_overrides` take
// precedence over the file.
//
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::indicators::SuperTrendParams;
use crate::kraken::DEFAULT_BASE_URL;
use crate::types::TimeFrame;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_true() -> bool {
    true
}

fn default_refresh_period_secs() -> f64 {
    60.0
}

fn default_queue_capacity() -> usize {
    1000
}

fn default_instrument() -> String {
    "XXBTZUSD".to_string()
}

fn default_compression() -> u32 {
    1
}

fn default_api_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_series_capacity() -> usize {
    500
}

// =============================================================================
// FeedConfig
// =============================================================================

/// Options that decide how a feed starts and how often it refreshes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Seconds between live polls.
    #[serde(default = "default_refresh_period_secs")]
    pub refresh_period_secs: f64,

    /// Stop after the backfill has been delivered; never go live.
    #[serde(default)]
    pub historical_only: bool,

    /// Fetch and deliver history before going live.
    #[serde(default = "default_true")]
    pub backfill_on_start: bool,

    /// Capacity of the hand-off channel between the live poller and the pull
    /// side.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            refresh_period_secs: default_refresh_period_secs(),
            historical_only: false,
            backfill_on_start: true,
            queue_capacity: default_queue_capacity(),
        }
    }
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level configuration for the runner binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Kraken pair name, e.g. `XXBTZUSD`.
    #[serde(default = "default_instrument")]
    pub instrument: String,

    /// Bar time unit.
    #[serde(default)]
    pub timeframe: TimeFrame,

    /// Number of `timeframe` units per bar.
    #[serde(default = "default_compression")]
    pub compression: u32,

    /// Kraken REST base URL.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Bars retained by the consumer-side series.
    #[serde(default = "default_series_capacity")]
    pub series_capacity: usize,

    #[serde(default)]
    pub feed: FeedConfig,

    #[serde(default)]
    pub supertrend: SuperTrendParams,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            instrument: default_instrument(),
            timeframe: TimeFrame::default(),
            compression: default_compression(),
            api_base_url: default_api_base_url(),
            series_capacity: default_series_capacity(),
            feed: FeedConfig::default(),
            supertrend: SuperTrendParams::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            instrument = %config.instrument,
            timeframe = %config.timeframe,
            compression = config.compression,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Apply overrides from a variable lookup (normally `std::env::var`).
    ///
    /// Recognised keys: `TREND_FEED_INSTRUMENT`, `TREND_FEED_REFRESH_SECS`,
    /// `TREND_FEED_HISTORICAL_ONLY`. Unparseable values are ignored with a
    /// warning.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(instrument) = lookup("TREND_FEED_INSTRUMENT") {
            let instrument = instrument.trim().to_uppercase();
            if !instrument.is_empty() {
                self.instrument = instrument;
            }
        }

        if let Some(raw) = lookup("TREND_FEED_REFRESH_SECS") {
            match raw.trim().parse::<f64>() {
                Ok(secs) => self.feed.refresh_period_secs = secs,
                Err(e) => warn!(value = %raw, error = %e, "ignoring TREND_FEED_REFRESH_SECS"),
            }
        }

        if let Some(raw) = lookup("TREND_FEED_HISTORICAL_ONLY") {
            match raw.trim().parse::<bool>() {
                Ok(flag) => self.feed.historical_only = flag,
                Err(e) => warn!(value = %raw, error = %e, "ignoring TREND_FEED_HISTORICAL_ONLY"),
            }
        }

        if !self.supertrend.is_valid() {
            warn!(params = ?self.supertrend, "invalid supertrend params, using defaults");
            self.supertrend = SuperTrendParams::default();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.instrument, "XXBTZUSD");
        assert_eq!(cfg.timeframe, TimeFrame::Minutes);
        assert_eq!(cfg.compression, 1);
        assert!((cfg.feed.refresh_period_secs - 60.0).abs() < f64::EPSILON);
        assert!(!cfg.feed.historical_only);
        assert!(cfg.feed.backfill_on_start);
        assert_eq!(cfg.feed.queue_capacity, 1000);
        assert_eq!(cfg.supertrend.period, 7);
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.instrument, "XXBTZUSD");
        assert_eq!(cfg.feed, FeedConfig::default());
        assert_eq!(cfg.supertrend, SuperTrendParams::default());
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{
            "instrument": "XETHZUSD",
            "timeframe": "Days",
            "feed": { "historical_only": true },
            "supertrend": { "factor": 2.5 }
        }"#;
        let cfg: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.instrument, "XETHZUSD");
        assert_eq!(cfg.timeframe, TimeFrame::Days);
        assert!(cfg.feed.historical_only);
        assert!(cfg.feed.backfill_on_start);
        assert_eq!(cfg.supertrend.period, 7);
        assert!((cfg.supertrend.factor - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn env_overrides_take_precedence() {
        let vars: HashMap<&str, &str> = [
            ("TREND_FEED_INSTRUMENT", " xethzusd "),
            ("TREND_FEED_REFRESH_SECS", "15.5"),
            ("TREND_FEED_HISTORICAL_ONLY", "true"),
        ]
        .into_iter()
        .collect();

        let mut cfg = RuntimeConfig::default();
        cfg.apply_env_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.instrument, "XETHZUSD");
        assert!((cfg.feed.refresh_period_secs - 15.5).abs() < f64::EPSILON);
        assert!(cfg.feed.historical_only);
    }

    #[test]
    fn bad_override_values_are_ignored() {
        let mut cfg = RuntimeConfig::default();
        cfg.apply_env_overrides(|k| match k {
            "TREND_FEED_REFRESH_SECS" => Some("soon".to_string()),
            "TREND_FEED_HISTORICAL_ONLY" => Some("maybe".to_string()),
            _ => None,
        });
        assert_eq!(cfg.feed, FeedConfig::default());
    }

    #[test]
    fn invalid_supertrend_params_fall_back() {
        let mut cfg: RuntimeConfig =
            serde_json::from_str(r#"{ "supertrend": { "period": 0 } }"#).unwrap();
        cfg.apply_env_overrides(|_| None);
        assert_eq!(cfg.supertrend, SuperTrendParams::default());
    }
}
