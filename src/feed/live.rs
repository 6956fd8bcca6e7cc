// =============================================================================
// Live Poller — background task feeding completed bars into the hand-off queue
// =============================================================================
//
// Spawned once per feed when it enters Live. Wakes on a fixed grid
// (origin + n * refresh period), asks the source for rows since its
// watermark and enqueues every completed row strictly after it.
//
// The last row of every response is still forming and is never enqueued.
// The watermark advances per enqueued row, so a poll that fails part-way
// never re-delivers what already went out.
//
// A failed poll is logged and recorded in `PollerHealth`; the loop carries on
// at the next wake. Only a stop request (or the consumer going away) ends it.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Duration, Instant};
use tracing::{debug, info, warn};

use crate::feed::stop_requested;
use crate::kraken::Granularity;
use crate::market_data::{Bar, CandleSource};

// =============================================================================
// PollerHealth
// =============================================================================

/// Counters shared between the live task and its feed.
#[derive(Debug, Default)]
pub struct PollerHealth {
    polls: AtomicU64,
    failed_polls: AtomicU64,
    bars_enqueued: AtomicU64,
    last_error: RwLock<Option<String>>,
    last_success_at: RwLock<Option<DateTime<Utc>>>,
}

impl PollerHealth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn polls(&self) -> u64 {
        self.polls.load(Ordering::Relaxed)
    }

    pub fn failed_polls(&self) -> u64 {
        self.failed_polls.load(Ordering::Relaxed)
    }

    pub fn bars_enqueued(&self) -> u64 {
        self.bars_enqueued.load(Ordering::Relaxed)
    }

    /// Text of the most recent poll failure, if any.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Wall-clock time of the most recent successful poll.
    pub fn last_success_at(&self) -> Option<DateTime<Utc>> {
        *self.last_success_at.read()
    }

    fn record_poll(&self) {
        self.polls.fetch_add(1, Ordering::Relaxed);
    }

    fn record_enqueued(&self) {
        self.bars_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    fn record_success(&self) {
        *self.last_success_at.write() = Some(Utc::now());
    }

    fn record_error(&self, err: &anyhow::Error) {
        self.failed_polls.fetch_add(1, Ordering::Relaxed);
        *self.last_error.write() = Some(format!("{err:#}"));
    }
}

// =============================================================================
// WakeGrid
// =============================================================================

/// Wake times on the grid `origin + n * period`.
///
/// Each wake is the first grid point at or after `now` that is strictly later
/// than the previous wake. A poll that overruns one or more periods skips the
/// grid points it missed instead of firing them back to back.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WakeGrid {
    origin: Instant,
    period: Duration,
    n: u64,
}

impl WakeGrid {
    pub(crate) fn new(origin: Instant, period: Duration) -> Self {
        Self {
            origin,
            period,
            n: 0,
        }
    }

    pub(crate) fn advance(&mut self, now: Instant) -> Instant {
        let period_ns = self.period.as_nanos().max(1);
        let elapsed_ns = now.saturating_duration_since(self.origin).as_nanos();
        let due = u64::try_from(elapsed_ns.div_ceil(period_ns)).unwrap_or(u64::MAX);
        self.n = due.max(self.n.saturating_add(1));

        u64::try_from(period_ns.saturating_mul(u128::from(self.n)))
            .ok()
            .and_then(|ns| self.origin.checked_add(Duration::from_nanos(ns)))
            .unwrap_or(now)
    }
}

// =============================================================================
// LivePoller
// =============================================================================

/// Result of a single poll that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PollOutcome {
    /// Number of bars handed to the queue.
    Enqueued(usize),
    /// A stop request was observed; nothing more will be enqueued.
    Stopped,
    /// The receiving side of the queue is gone.
    Disconnected,
}

/// State owned by the background task. It is the only writer of its
/// watermark and the only producer into the queue.
pub(crate) struct LivePoller<S: CandleSource> {
    source: Arc<S>,
    instrument: String,
    granularity: Granularity,
    watermark: Option<DateTime<Utc>>,
    health: Arc<PollerHealth>,
}

impl<S: CandleSource> LivePoller<S> {
    pub(crate) fn new(
        source: Arc<S>,
        instrument: String,
        granularity: Granularity,
        watermark: Option<DateTime<Utc>>,
        health: Arc<PollerHealth>,
    ) -> Self {
        Self {
            source,
            instrument,
            granularity,
            watermark,
            health,
        }
    }

    #[cfg(test)]
    pub(crate) fn watermark(&self) -> Option<DateTime<Utc>> {
        self.watermark
    }

    /// Fetch once and enqueue every completed row past the watermark.
    pub(crate) async fn poll_once(
        &mut self,
        tx: &mpsc::Sender<Bar>,
        stop: &mut watch::Receiver<bool>,
    ) -> Result<PollOutcome> {
        if *stop.borrow() {
            return Ok(PollOutcome::Stopped);
        }

        self.health.record_poll();
        let since = self.watermark.unwrap_or(DateTime::<Utc>::MIN_UTC);
        let rows = self
            .source
            .fetch_candles(&self.instrument, since, self.granularity)
            .await?;
        self.health.record_success();

        let Some((_forming, complete)) = rows.split_last() else {
            return Ok(PollOutcome::Enqueued(0));
        };

        let mut enqueued = 0;
        for bar in complete {
            if self.watermark.is_some_and(|w| bar.timestamp <= w) {
                continue;
            }
            if *stop.borrow() {
                return Ok(PollOutcome::Stopped);
            }

            tokio::select! {
                biased;
                _ = stop_requested(stop) => return Ok(PollOutcome::Stopped),
                sent = tx.send(bar.clone()) => {
                    if sent.is_err() {
                        return Ok(PollOutcome::Disconnected);
                    }
                }
            }

            self.watermark = Some(bar.timestamp);
            self.health.record_enqueued();
            enqueued += 1;
            debug!(instrument = %self.instrument, ts = %bar.timestamp, "bar enqueued");
        }

        Ok(PollOutcome::Enqueued(enqueued))
    }

    /// Poll on a fixed grid until stopped or the queue's consumer is gone.
    pub(crate) async fn run(
        mut self,
        period: Duration,
        tx: mpsc::Sender<Bar>,
        mut stop: watch::Receiver<bool>,
    ) {
        info!(
            instrument = %self.instrument,
            granularity = %self.granularity,
            bucket_secs = self.granularity.bucket().num_seconds(),
            period_ms = period.as_millis() as u64,
            watermark = ?self.watermark,
            "live poller started"
        );

        let mut grid = WakeGrid::new(Instant::now(), period);
        let mut wake = grid.advance(Instant::now());

        loop {
            tokio::select! {
                biased;
                _ = stop_requested(&mut stop) => break,
                _ = sleep_until(wake) => {}
            }

            match self.poll_once(&tx, &mut stop).await {
                Ok(PollOutcome::Enqueued(count)) => {
                    debug!(
                        instrument = %self.instrument,
                        count,
                        watermark = ?self.watermark,
                        "poll complete"
                    );
                }
                Ok(PollOutcome::Stopped) => break,
                Ok(PollOutcome::Disconnected) => {
                    info!(instrument = %self.instrument, "bar queue closed, live poller exiting");
                    break;
                }
                Err(e) => {
                    warn!(
                        instrument = %self.instrument,
                        watermark = ?self.watermark,
                        error = %format!("{e:#}"),
                        "live poll failed, retrying at next wake"
                    );
                    self.health.record_error(&e);
                }
            }

            wake = grid.advance(Instant::now());
        }

        info!(instrument = %self.instrument, watermark = ?self.watermark, "live poller stopped");
    }
}
