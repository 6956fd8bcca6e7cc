// =============================================================================
// Candle Feed — backfill / live state machine over a candle source
// =============================================================================
//
//   Idle ──start──► Backfilling ──exhausted──► Live ──stop──► Terminated
//     │                  │                                       ▲
//     │                  └──exhausted, historical-only───────────┤
//     ├──start, no backfill──► Live                              │
//     └──start failed, or historical-only without backfill───────┘
//
// The pull side (`next_bar`) runs on the caller's task. The live side is a
// single background task (see `live.rs`) that feeds a bounded channel. Both
// observe the same stop flag; the pull sees it immediately, the task at its
// next wake.
//
// Every delivered bar is strictly later than the one before it. Rows that
// would break that ordering are dropped with a warning.
// =============================================================================

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::feed::error::FeedError;
use crate::feed::live::{LivePoller, PollerHealth};
use crate::feed::stop_requested;
use crate::kraken::{lookup_granularity, Granularity};
use crate::market_data::{Bar, CandleSource, InstrumentInfo};
use crate::runtime_config::FeedConfig;
use crate::types::{FeedState, StreamEnd, TimeFrame};

/// Longest accepted refresh period.
const MAX_REFRESH_PERIOD: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Result of a single pull.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Bar(Bar),
    End(StreamEnd),
}

// =============================================================================
// StopHandle
// =============================================================================

/// Cloneable handle that asks a feed (and its live task) to stop.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        if !self.tx.send_replace(true) {
            info!("feed stop requested");
        }
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }
}

// =============================================================================
// CandleFeed
// =============================================================================

struct LiveTask {
    rx: mpsc::Receiver<Bar>,
    handle: JoinHandle<()>,
}

/// One instrument at one granularity, delivered bar by bar.
pub struct CandleFeed<S: CandleSource + 'static> {
    source: Arc<S>,
    instrument: String,
    timeframe: TimeFrame,
    compression: u32,
    config: FeedConfig,

    state: FeedState,
    end: Option<StreamEnd>,
    granularity: Option<Granularity>,
    instrument_info: Option<InstrumentInfo>,
    refresh_period: Duration,

    backfill: VecDeque<Bar>,
    /// Timestamp of the last delivered bar (or the server time when the feed
    /// went live without a backfill).
    watermark: Option<DateTime<Utc>>,

    stop_tx: Arc<watch::Sender<bool>>,
    stop_rx: watch::Receiver<bool>,
    live: Option<LiveTask>,
    health: Arc<PollerHealth>,
}

impl<S: CandleSource + 'static> CandleFeed<S> {
    pub fn new(
        source: Arc<S>,
        instrument: impl Into<String>,
        timeframe: TimeFrame,
        compression: u32,
        config: FeedConfig,
    ) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            source,
            instrument: instrument.into(),
            timeframe,
            compression,
            config,
            state: FeedState::Idle,
            end: None,
            granularity: None,
            instrument_info: None,
            refresh_period: Duration::ZERO,
            backfill: VecDeque::new(),
            watermark: None,
            stop_tx: Arc::new(stop_tx),
            stop_rx,
            live: None,
            health: Arc::new(PollerHealth::new()),
        }
    }

    // -------------------------------------------------------------------------
    // Start
    // -------------------------------------------------------------------------

    /// Resolve everything the feed needs and leave Idle.
    ///
    /// Any error terminates the feed; subsequent pulls return
    /// `FeedEvent::End(StreamEnd::Failed)`.
    pub async fn start(&mut self) -> Result<(), FeedError> {
        if self.state != FeedState::Idle {
            return Err(FeedError::AlreadyStarted);
        }

        match self.initialize().await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!(instrument = %self.instrument, error = %e, "feed start failed");
                self.terminate(StreamEnd::Failed);
                Err(e)
            }
        }
    }

    async fn initialize(&mut self) -> Result<(), FeedError> {
        self.refresh_period = self.validate_config()?;

        let granularity = lookup_granularity(self.timeframe, self.compression).ok_or(
            FeedError::UnsupportedGranularity {
                timeframe: self.timeframe,
                compression: self.compression,
            },
        )?;
        self.granularity = Some(granularity);

        let info = self
            .source
            .resolve_instrument(&self.instrument)
            .await
            .map_err(|source| FeedError::InstrumentLookup {
                instrument: self.instrument.clone(),
                source,
            })?
            .ok_or_else(|| FeedError::UnknownInstrument(self.instrument.clone()))?;

        info!(
            instrument = %self.instrument,
            altname = %info.altname,
            granularity = %granularity,
            backfill = self.config.backfill_on_start,
            historical_only = self.config.historical_only,
            "feed starting"
        );
        self.instrument_info = Some(info);

        if self.config.backfill_on_start {
            let bars = self
                .source
                .fetch_candles(&self.instrument, DateTime::<Utc>::MIN_UTC, granularity)
                .await
                .map_err(FeedError::Backfill)?;

            info!(instrument = %self.instrument, count = bars.len(), "backfill fetched");
            self.backfill = bars.into();
            self.set_state(FeedState::Backfilling);
        } else if self.config.historical_only {
            info!(instrument = %self.instrument, "historical-only without backfill, nothing to deliver");
            self.terminate(StreamEnd::HistoricalComplete);
        } else {
            let now = self.source.server_time().await.map_err(FeedError::ServerTime)?;
            self.watermark = Some(now);
            self.enter_live();
        }

        Ok(())
    }

    fn validate_config(&self) -> Result<Duration, FeedError> {
        if self.config.queue_capacity == 0 {
            return Err(FeedError::InvalidConfig(
                "queue_capacity must be greater than zero".to_string(),
            ));
        }

        let secs = self.config.refresh_period_secs;
        Duration::try_from_secs_f64(secs)
            .ok()
            .filter(|d| !d.is_zero() && *d <= MAX_REFRESH_PERIOD)
            .filter(|d| Instant::now().checked_add(*d).is_some())
            .ok_or_else(|| {
                FeedError::InvalidConfig(format!(
                    "refresh_period_secs must be in (0, {}], got {secs}",
                    MAX_REFRESH_PERIOD.as_secs()
                ))
            })
    }

    // -------------------------------------------------------------------------
    // Pull
    // -------------------------------------------------------------------------

    /// Next bar, or the reason the stream ended.
    ///
    /// While live this waits until the poller delivers a bar or a stop is
    /// requested, whichever comes first.
    pub async fn next_bar(&mut self) -> FeedEvent {
        loop {
            if self.state != FeedState::Terminated && *self.stop_rx.borrow() {
                self.terminate(StreamEnd::Stopped);
            }

            match self.state {
                FeedState::Idle => {
                    warn!(instrument = %self.instrument, "pull on a feed that was never started");
                    return FeedEvent::End(StreamEnd::Failed);
                }

                FeedState::Backfilling => match self.backfill.pop_front() {
                    Some(bar) => {
                        if let Some(bar) = self.accept(bar) {
                            return FeedEvent::Bar(bar);
                        }
                    }
                    None if self.config.historical_only => {
                        info!(instrument = %self.instrument, "backfill delivered");
                        self.terminate(StreamEnd::HistoricalComplete);
                    }
                    None => self.enter_live(),
                },

                FeedState::Live => {
                    let Some(live) = self.live.as_mut() else {
                        error!(instrument = %self.instrument, "live without a poller task");
                        self.terminate(StreamEnd::Failed);
                        continue;
                    };

                    let received = tokio::select! {
                        biased;
                        _ = stop_requested(&mut self.stop_rx) => None,
                        bar = live.rx.recv() => bar,
                    };

                    let stopping = *self.stop_rx.borrow();
                    match received {
                        Some(bar) => {
                            if let Some(bar) = self.accept(bar) {
                                return FeedEvent::Bar(bar);
                            }
                        }
                        None if stopping => self.terminate(StreamEnd::Stopped),
                        None => {
                            self.reap_live_task().await;
                            self.terminate(StreamEnd::Failed);
                        }
                    }
                }

                FeedState::Terminated => {
                    return FeedEvent::End(self.end.unwrap_or(StreamEnd::Failed));
                }
            }
        }
    }

    /// Join a live task whose queue closed without a stop request.
    async fn reap_live_task(&mut self) {
        let Some(live) = self.live.take() else {
            return;
        };
        match live.handle.await {
            Ok(()) => error!(instrument = %self.instrument, "live poller exited without a stop request"),
            Err(e) if e.is_panic() => error!(instrument = %self.instrument, error = %e, "live poller panicked"),
            Err(e) => error!(instrument = %self.instrument, error = %e, "live poller task failed"),
        }
    }

    /// Drop rows that are not strictly after the last delivered one.
    fn accept(&mut self, bar: Bar) -> Option<Bar> {
        if let Some(last) = self.watermark {
            if bar.timestamp <= last {
                warn!(
                    instrument = %self.instrument,
                    ts = %bar.timestamp,
                    watermark = %last,
                    "dropping out-of-order bar"
                );
                return None;
            }
        }

        self.watermark = Some(bar.timestamp);
        debug!(instrument = %self.instrument, ts = %bar.timestamp, close = bar.close, "bar delivered");
        Some(bar)
    }

    // -------------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------------

    fn enter_live(&mut self) {
        if self.live.is_some() {
            error!(instrument = %self.instrument, "live poller already running, not spawning another");
            self.set_state(FeedState::Live);
            return;
        }

        let Some(granularity) = self.granularity else {
            error!(instrument = %self.instrument, "cannot go live without a granularity");
            self.terminate(StreamEnd::Failed);
            return;
        };

        let (tx, rx) = mpsc::channel(self.config.queue_capacity);
        let poller = LivePoller::new(
            Arc::clone(&self.source),
            self.instrument.clone(),
            granularity,
            self.watermark,
            Arc::clone(&self.health),
        );
        let handle = tokio::spawn(poller.run(self.refresh_period, tx, self.stop_rx.clone()));

        self.live = Some(LiveTask { rx, handle });
        self.set_state(FeedState::Live);
    }

    fn set_state(&mut self, next: FeedState) {
        if self.state != next {
            info!(instrument = %self.instrument, from = %self.state, to = %next, "feed state change");
            self.state = next;
        }
    }

    fn terminate(&mut self, end: StreamEnd) {
        if self.state == FeedState::Terminated {
            return;
        }
        self.set_state(FeedState::Terminated);
        self.end = Some(end);
        info!(instrument = %self.instrument, reason = %end, "feed terminated");
    }

    // -------------------------------------------------------------------------
    // Shutdown & accessors
    // -------------------------------------------------------------------------

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            tx: Arc::clone(&self.stop_tx),
        }
    }

    /// Request stop and wait for the live task, if any, to exit.
    pub async fn shutdown(&mut self) {
        self.stop_tx.send_replace(true);
        self.terminate(StreamEnd::Stopped);

        if let Some(live) = self.live.take() {
            drop(live.rx);
            if let Err(e) = live.handle.await {
                warn!(instrument = %self.instrument, error = %e, "live poller task did not exit cleanly");
            }
        }
    }

    pub fn state(&self) -> FeedState {
        self.state
    }

    pub fn end_reason(&self) -> Option<StreamEnd> {
        self.end
    }

    pub fn watermark(&self) -> Option<DateTime<Utc>> {
        self.watermark
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn instrument_info(&self) -> Option<&InstrumentInfo> {
        self.instrument_info.as_ref()
    }

    pub fn granularity(&self) -> Option<Granularity> {
        self.granularity
    }

    pub fn health(&self) -> &PollerHealth {
        &self.health
    }

    pub fn has_live_task(&self) -> bool {
        self.live.is_some()
    }
}

impl<S: CandleSource + 'static> Drop for CandleFeed<S> {
    fn drop(&mut self) {
        self.stop_tx.send_replace(true);
    }
}

impl<S: CandleSource + 'static> std::fmt::Debug for CandleFeed<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandleFeed")
            .field("instrument", &self.instrument)
            .field("timeframe", &self.timeframe)
            .field("compression", &self.compression)
            .field("state", &self.state)
            .field("watermark", &self.watermark)
            .field("backfill_pending", &self.backfill.len())
            .finish()
    }
}
