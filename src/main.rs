// =============================================================================
// Kraken Trend Feed — Main Entry Point
// =============================================================================
//
// Streams bars for one Kraken pair, runs SuperTrend over them and logs every
// trend flip as an entry signal. Ctrl+C stops the feed; historical-only runs
// end on their own once the backfill is delivered.
// =============================================================================

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use trend_feed::{
    BarEmitter, BarSeries, CandleFeed, FeedEvent, KrakenClient, RuntimeConfig, StreamEnd,
    SuperTrend, TrendFlipTracker,
};

const DEFAULT_CONFIG_PATH: &str = "feed_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Kraken Trend Feed starting up");

    let config_path =
        std::env::var("TREND_FEED_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    let mut config = RuntimeConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(path = %config_path, error = %format!("{e:#}"), "Failed to load config, using defaults");
        RuntimeConfig::default()
    });
    config.apply_env_overrides(|key| std::env::var(key).ok());

    info!(
        instrument = %config.instrument,
        timeframe = %config.timeframe,
        compression = config.compression,
        refresh_secs = config.feed.refresh_period_secs,
        historical_only = config.feed.historical_only,
        backfill = config.feed.backfill_on_start,
        "Feed configured"
    );

    // ── 2. Source, feed, emitter ─────────────────────────────────────────
    let client = Arc::new(KrakenClient::new(config.api_base_url.clone())?);
    let feed = CandleFeed::new(
        client,
        config.instrument.clone(),
        config.timeframe,
        config.compression,
        config.feed.clone(),
    );
    let stop = feed.stop_handle();
    let mut emitter = BarEmitter::new(feed);

    if let Err(e) = emitter.start().await {
        error!(error = %e, "Feed failed to start");
        return Err(e.into());
    }

    // ── 3. Graceful shutdown on Ctrl+C ───────────────────────────────────
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Shutdown signal received — stopping feed");
                stop.stop();
            }
            Err(e) => error!(error = %e, "Failed to listen for Ctrl+C"),
        }
    });

    // ── 4. Indicator loop ────────────────────────────────────────────────
    let Some(mut supertrend) = SuperTrend::new(config.supertrend.clone()) else {
        anyhow::bail!("invalid SuperTrend params: {:?}", config.supertrend);
    };
    let mut series = BarSeries::with_capacity(config.series_capacity);
    let mut flips = TrendFlipTracker::new();
    let mut bars_seen: u64 = 0;

    let end = loop {
        let bar = match emitter.pull(&mut series).await {
            FeedEvent::Bar(bar) => bar,
            FeedEvent::End(end) => break end,
        };
        bars_seen += 1;

        let Some(point) = supertrend.update(&bar) else {
            continue;
        };

        if let Some(signal) = flips.observe(point.trend) {
            info!(
                ts = %bar.timestamp,
                signal = %signal,
                trend = point.trend.as_i8(),
                close = bar.close,
                stop = format!("{:.2}", point.stop),
                "TREND FLIP"
            );
        }
    };

    // ── 5. Wrap up ───────────────────────────────────────────────────────
    let mut feed = emitter.into_inner();
    feed.shutdown().await;

    let health = feed.health();
    info!(
        reason = %end,
        bars = bars_seen,
        retained = series.len(),
        polls = health.polls(),
        failed_polls = health.failed_polls(),
        "Feed ended"
    );

    match end {
        StreamEnd::Failed => anyhow::bail!("feed ended without producing a stream"),
        StreamEnd::HistoricalComplete | StreamEnd::Stopped => Ok(()),
    }
}
