// =============================================================================
// Test support — scripted candle source
// =============================================================================

use std::collections::VecDeque;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use tokio::time::{Duration, Instant};

use crate::kraken::Granularity;
use crate::market_data::{Bar, CandleSource, InstrumentInfo};

/// A bar stamped `minute` minutes after the Unix epoch, with prices derived
/// from the minute so neighbouring bars differ.
pub fn bar_at(minute: i64) -> Bar {
    let base = 100.0 + minute as f64;
    Bar {
        timestamp: Utc.timestamp_opt(minute * 60, 0).unwrap(),
        open: base,
        high: base + 2.0,
        low: base - 2.0,
        close: base + 1.0,
        volume: 10.0,
        trade_count: 5,
    }
}

enum Scripted {
    Rows(Vec<Bar>),
    Error(String),
    Panic,
}

/// Candle source that answers `fetch_candles` from a script, one entry per
/// call. An exhausted script answers with an empty batch.
pub struct MockSource {
    script: Mutex<VecDeque<Scripted>>,
    since_calls: Mutex<Vec<DateTime<Utc>>>,
    fetch_instants: Mutex<Vec<Instant>>,
    fetch_delay: Mutex<Duration>,
    instrument: Mutex<Result<Option<InstrumentInfo>, String>>,
    server_time: Mutex<Result<DateTime<Utc>, String>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            since_calls: Mutex::new(Vec::new()),
            fetch_instants: Mutex::new(Vec::new()),
            fetch_delay: Mutex::new(Duration::ZERO),
            instrument: Mutex::new(Ok(Some(InstrumentInfo {
                name: "XXBTZUSD".to_string(),
                altname: "XBTUSD".to_string(),
                base: "XXBT".to_string(),
                quote: "ZUSD".to_string(),
            }))),
            server_time: Mutex::new(Ok(bar_at(0).timestamp)),
        }
    }

    pub fn push_rows(&self, rows: Vec<Bar>) {
        self.script.lock().push_back(Scripted::Rows(rows));
    }

    pub fn push_error(&self, msg: &str) {
        self.script.lock().push_back(Scripted::Error(msg.to_string()));
    }

    /// The matching `fetch_candles` call panics.
    pub fn push_panic(&self) {
        self.script.lock().push_back(Scripted::Panic);
    }

    /// Every fetch takes `delay` before answering.
    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock() = delay;
    }

    pub fn set_unknown_instrument(&self) {
        *self.instrument.lock() = Ok(None);
    }

    pub fn fail_instrument_lookup(&self, msg: &str) {
        *self.instrument.lock() = Err(msg.to_string());
    }

    pub fn set_server_time(&self, time: DateTime<Utc>) {
        *self.server_time.lock() = Ok(time);
    }

    pub fn fail_server_time(&self, msg: &str) {
        *self.server_time.lock() = Err(msg.to_string());
    }

    /// Every `since` cursor passed to `fetch_candles`, in call order.
    pub fn since_calls(&self) -> Vec<DateTime<Utc>> {
        self.since_calls.lock().clone()
    }

    /// Clock reading at the start of every `fetch_candles` call.
    pub fn fetch_instants(&self) -> Vec<Instant> {
        self.fetch_instants.lock().clone()
    }
}

#[async_trait]
impl CandleSource for MockSource {
    async fn resolve_instrument(&self, _instrument: &str) -> Result<Option<InstrumentInfo>> {
        self.instrument.lock().clone().map_err(anyhow::Error::msg)
    }

    async fn fetch_candles(
        &self,
        _instrument: &str,
        since: DateTime<Utc>,
        _granularity: Granularity,
    ) -> Result<Vec<Bar>> {
        self.since_calls.lock().push(since);
        self.fetch_instants.lock().push(Instant::now());

        let delay = *self.fetch_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let next = self.script.lock().pop_front();
        match next {
            Some(Scripted::Rows(rows)) => Ok(rows),
            Some(Scripted::Error(msg)) => Err(anyhow::Error::msg(msg)),
            Some(Scripted::Panic) => panic!("scripted fetch panic"),
            None => Ok(Vec::new()),
        }
    }

    async fn server_time(&self) -> Result<DateTime<Utc>> {
        self.server_time.lock().clone().map_err(anyhow::Error::msg)
    }
}
