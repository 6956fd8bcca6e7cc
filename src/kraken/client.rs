// =============================================================================
// Kraken REST API Client — public market-data endpoints
// =============================================================================
//
// Every Kraken response is an envelope `{ "error": [...], "result": {...} }`.
// A non-empty `error` array is a failure even when the HTTP status is 200.
// Only public endpoints are used, so no request is ever signed.
// =============================================================================

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::kraken::Granularity;
use crate::market_data::{Bar, CandleSource, InstrumentInfo};

/// Default public REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.kraken.com";

/// Error string Kraken returns for a pair it does not list.
const UNKNOWN_PAIR_ERROR: &str = "EQuery:Unknown asset pair";

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    error: Vec<String>,
    #[serde(default)]
    result: Option<serde_json::Value>,
}

/// Kraken public REST client.
#[derive(Clone)]
pub struct KrakenClient {
    base_url: String,
    client: reqwest::Client,
}

impl KrakenClient {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Create a client against `base_url` (normally [`DEFAULT_BASE_URL`]).
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("failed to build reqwest client")?;

        debug!(base_url = %base_url, "KrakenClient initialised");

        Ok(Self { base_url, client })
    }

    // -------------------------------------------------------------------------
    // Transport
    // -------------------------------------------------------------------------

    /// GET a public endpoint and return the decoded envelope.
    async fn get_envelope(&self, path_and_query: &str) -> Result<Envelope> {
        let url = format!("{}{}", self.base_url, path_and_query);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {path_and_query} request failed"))?;

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .with_context(|| format!("failed to parse {path_and_query} response"))?;

        if !status.is_success() {
            anyhow::bail!("Kraken GET {} returned {}: {}", path_and_query, status, body);
        }

        serde_json::from_value(body)
            .with_context(|| format!("unexpected envelope from {path_and_query}"))
    }

    // -------------------------------------------------------------------------
    // Public market data
    // -------------------------------------------------------------------------

    /// GET /0/public/OHLC.
    ///
    /// `since` is only sent when it lies after the Unix epoch; earlier cursors
    /// ask for the full window Kraken keeps (720 rows).
    #[instrument(skip(self), name = "kraken::get_ohlc")]
    pub async fn get_ohlc(
        &self,
        pair: &str,
        interval: Granularity,
        since: DateTime<Utc>,
    ) -> Result<Vec<Bar>> {
        let mut path = format!("/0/public/OHLC?pair={}&interval={}", pair, interval.code());
        if since.timestamp() > 0 {
            path.push_str(&format!("&since={}", since.timestamp()));
        }

        let envelope = self.get_envelope(&path).await?;
        let result = into_result(envelope, "/0/public/OHLC")?;
        let bars = parse_ohlc_result(&result)?;

        debug!(pair, interval = %interval, count = bars.len(), "ohlc fetched");
        Ok(bars)
    }

    /// GET /0/public/Time.
    #[instrument(skip(self), name = "kraken::get_server_time")]
    pub async fn get_server_time(&self) -> Result<DateTime<Utc>> {
        let envelope = self.get_envelope("/0/public/Time").await?;
        let result = into_result(envelope, "/0/public/Time")?;
        parse_server_time(&result)
    }

    /// GET /0/public/AssetPairs filtered by pair. Unknown pairs yield `None`.
    #[instrument(skip(self), name = "kraken::get_asset_pair")]
    pub async fn get_asset_pair(&self, pair: &str) -> Result<Option<InstrumentInfo>> {
        let envelope = self
            .get_envelope(&format!("/0/public/AssetPairs?pair={pair}"))
            .await?;

        let info = asset_pair_from_envelope(envelope)?;
        if info.is_none() {
            warn!(pair, "asset pair not listed");
        }
        Ok(info)
    }
}

#[async_trait]
impl CandleSource for KrakenClient {
    async fn resolve_instrument(&self, instrument: &str) -> Result<Option<InstrumentInfo>> {
        self.get_asset_pair(instrument).await
    }

    async fn fetch_candles(
        &self,
        instrument: &str,
        since: DateTime<Utc>,
        granularity: Granularity,
    ) -> Result<Vec<Bar>> {
        self.get_ohlc(instrument, granularity, since).await
    }

    async fn server_time(&self) -> Result<DateTime<Utc>> {
        self.get_server_time().await
    }
}

impl std::fmt::Debug for KrakenClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KrakenClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Response parsing
// -----------------------------------------------------------------------------

fn into_result(envelope: Envelope, endpoint: &str) -> Result<serde_json::Value> {
    if !envelope.error.is_empty() {
        anyhow::bail!("Kraken {} returned errors: {}", endpoint, envelope.error.join(", "));
    }
    envelope
        .result
        .with_context(|| format!("Kraken {endpoint} response has no result"))
}

/// Parse the `result` object of an OHLC response.
///
/// Shape: `{ "<PAIR>": [[time, open, high, low, close, vwap, volume, count], ...], "last": n }`.
/// Numeric fields other than `time` and `count` arrive as strings. The
/// returned rows are sorted and de-duplicated by timestamp.
fn parse_ohlc_result(result: &serde_json::Value) -> Result<Vec<Bar>> {
    let rows = result
        .as_object()
        .context("OHLC result is not an object")?
        .iter()
        .find(|(key, value)| key.as_str() != "last" && value.is_array())
        .and_then(|(_, value)| value.as_array())
        .context("OHLC result has no row array")?;

    let mut bars = Vec::with_capacity(rows.len());

    for entry in rows {
        let arr = entry.as_array().context("OHLC entry is not an array")?;

        if arr.len() < 8 {
            warn!("skipping malformed OHLC entry with {} elements", arr.len());
            continue;
        }

        let secs = arr[0].as_i64().context("OHLC entry time is not an integer")?;
        let timestamp = Utc
            .timestamp_opt(secs, 0)
            .single()
            .with_context(|| format!("OHLC entry time {secs} out of range"))?;

        bars.push(Bar {
            timestamp,
            open: parse_str_f64(&arr[1])?,
            high: parse_str_f64(&arr[2])?,
            low: parse_str_f64(&arr[3])?,
            close: parse_str_f64(&arr[4])?,
            volume: parse_str_f64(&arr[6])?,
            trade_count: arr[7].as_u64().context("OHLC entry count is not an integer")?,
        });
    }

    bars.sort_by_key(|b| b.timestamp);
    bars.dedup_by_key(|b| b.timestamp);
    Ok(bars)
}

fn parse_server_time(result: &serde_json::Value) -> Result<DateTime<Utc>> {
    let secs = result["unixtime"]
        .as_i64()
        .context("server time response missing 'unixtime'")?;
    Utc.timestamp_opt(secs, 0)
        .single()
        .with_context(|| format!("server time {secs} out of range"))
}

/// An unknown-pair error is a normal "not found", not a failure.
fn asset_pair_from_envelope(envelope: Envelope) -> Result<Option<InstrumentInfo>> {
    if envelope.error.iter().any(|e| e == UNKNOWN_PAIR_ERROR) {
        return Ok(None);
    }
    let result = into_result(envelope, "/0/public/AssetPairs")?;
    Ok(parse_asset_pair(&result))
}

/// Take the first (and usually only) pair entry from an AssetPairs result.
fn parse_asset_pair(result: &serde_json::Value) -> Option<InstrumentInfo> {
    let (name, info) = result.as_object()?.iter().next()?;
    let field = |key: &str| info[key].as_str().unwrap_or_default().to_string();

    Some(InstrumentInfo {
        name: name.clone(),
        altname: field("altname"),
        base: field("base"),
        quote: field("quote"),
    })
}

/// Parse a JSON value that may be either a string or a number into `f64`.
fn parse_str_f64(val: &serde_json::Value) -> Result<f64> {
    if let Some(s) = val.as_str() {
        s.parse::<f64>()
            .with_context(|| format!("failed to parse '{s}' as f64"))
    } else if let Some(n) = val.as_f64() {
        Ok(n)
    } else {
        anyhow::bail!("expected string or number, got: {val}")
    }
}
