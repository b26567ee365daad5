//! Polygon.io data source integration
//!
//! Talks to the documented REST endpoints:
//! - `/v2/aggs/ticker/{symbol}/range/1/day/{from}/{to}` for closes and volume history
//! - `/v2/aggs/ticker/{symbol}/prev` when the daily range has no completed session
//! - `/v2/aggs/ticker/{symbol}/range/1/minute/{from_ms}/{to_ms}` for pre-market bars
//! - `/v3/reference/tickers/{symbol}` for share counts
//!
//! The API key is resolved from provider option `api_key`, then the environment
//! variable named by `api_key_env`, then `POLYGON_API_KEY`.

use super::{assemble_snapshot, get_json, http_client, millis_to_utc, prior_sessions, DEFAULT_HTTP_TIMEOUT};
use crate::config::DataSettings;
use crate::data::DataProvider;
use crate::error::{Result, ScreenerError};
use crate::session::PremarketWindow;
use crate::snapshot::Snapshot;
use crate::types::{Bar, Price, Timestamp, Volume};
use chrono::Duration;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::env;

const POLYGON_BASE_URL: &str = "https://api.polygon.io";
const DEFAULT_KEY_ENV: &str = "POLYGON_API_KEY";
/// Calendar days of daily history requested for the volume baseline
const DAILY_LOOKBACK_DAYS: i64 = 120;

/// Polygon.io provider (API key required)
pub struct PolygonProvider {
    client: Client,
    base_url: String,
    api_key: String,
    window: PremarketWindow,
}

#[derive(Debug, Deserialize)]
struct AggregatesResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    results: Option<Vec<Aggregate>>,
}

#[derive(Debug, Deserialize)]
struct Aggregate {
    #[serde(rename = "t")]
    timestamp: i64,
    #[serde(rename = "o")]
    open: f64,
    #[serde(rename = "h")]
    high: f64,
    #[serde(rename = "l")]
    low: f64,
    #[serde(rename = "c")]
    close: f64,
    #[serde(rename = "v", default)]
    volume: f64,
}

#[derive(Debug, Deserialize)]
struct TickerDetailsResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    results: Option<TickerDetails>,
}

#[derive(Debug, Default, Deserialize)]
struct TickerDetails {
    #[serde(default)]
    share_class_shares_outstanding: Option<f64>,
    #[serde(default)]
    weighted_shares_outstanding: Option<f64>,
    #[serde(default)]
    shares_outstanding: Option<f64>,
}

impl TickerDetails {
    /// First positive share count, most specific first
    fn float_shares(&self) -> Option<Volume> {
        [
            self.share_class_shares_outstanding,
            self.weighted_shares_outstanding,
            self.shares_outstanding,
        ]
        .into_iter()
        .flatten()
        .find(|shares| shares.is_finite() && *shares > 0.0)
    }
}

/// Polygon reports some failures as HTTP 200 with `"status": "ERROR"`
fn check_status(
    symbol: &str,
    path: &str,
    status: Option<&str>,
    error: Option<&str>,
    message: Option<&str>,
) -> Result<()> {
    match status {
        Some(status) if status.eq_ignore_ascii_case("ERROR") => Err(ScreenerError::data_unavailable(
            symbol,
            format!(
                "Polygon error for {}: {}",
                path,
                error.or(message).unwrap_or("Unknown error")
            ),
        )),
        _ => Ok(()),
    }
}

fn to_bars(aggregates: Vec<Aggregate>) -> Vec<Bar> {
    aggregates
        .into_iter()
        .filter_map(|agg| {
            millis_to_utc(agg.timestamp)
                .map(|ts| Bar::new(ts, agg.open, agg.high, agg.low, agg.close, agg.volume))
        })
        .collect()
}

/// Key from `api_key`, else `$<api_key_env>`, else `$POLYGON_API_KEY`
pub fn resolve_api_key(settings: &DataSettings) -> Option<String> {
    if let Some(key) = settings.option("api_key").filter(|k| !k.trim().is_empty()) {
        return Some(key.to_string());
    }
    if let Some(key) = settings
        .option("api_key_env")
        .and_then(|name| env::var(name).ok())
        .filter(|k| !k.trim().is_empty())
    {
        return Some(key);
    }
    env::var(DEFAULT_KEY_ENV).ok().filter(|k| !k.trim().is_empty())
}

impl PolygonProvider {
    /// Provider options: `api_key`, `api_key_env`, `base_url`
    pub fn new(settings: &DataSettings) -> Result<Self> {
        let api_key = resolve_api_key(settings).ok_or_else(|| {
            ScreenerError::ConfigError(format!(
                "Polygon provider requires an API key via provider_options.api_key, \
                 provider_options.api_key_env, or the {} environment variable",
                DEFAULT_KEY_ENV
            ))
        })?;

        Ok(Self {
            client: http_client(settings.fetch_timeout().unwrap_or(DEFAULT_HTTP_TIMEOUT))?,
            base_url: settings
                .option("base_url")
                .unwrap_or(POLYGON_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key,
            window: settings.premarket_window()?,
        })
    }

    fn aggregates(&self, symbol: &str, path: &str, params: &[(&str, String)]) -> Result<Vec<Bar>> {
        let url = format!("{}{}", self.base_url, path);
        let mut query = vec![("apiKey", self.api_key.clone()), ("adjusted", "true".to_string())];
        query.extend(params.iter().cloned());

        let response: AggregatesResponse = get_json(&self.client, &url, &query, symbol)?;
        check_status(
            symbol,
            path,
            response.status.as_deref(),
            response.error.as_deref(),
            response.message.as_deref(),
        )?;
        Ok(to_bars(response.results.unwrap_or_default()))
    }

    fn daily_bars(&self, symbol: &str, as_of: Timestamp) -> Result<Vec<Bar>> {
        let session = self.window.session_date(as_of);
        let from = session - Duration::days(DAILY_LOOKBACK_DAYS);
        let path = format!("/v2/aggs/ticker/{}/range/1/day/{}/{}", symbol, from, session);
        self.aggregates(
            symbol,
            &path,
            &[("sort", "asc".to_string()), ("limit", "180".to_string())],
        )
    }

    fn previous_close(&self, symbol: &str) -> Result<Option<Price>> {
        let path = format!("/v2/aggs/ticker/{}/prev", symbol);
        let bars = self.aggregates(symbol, &path, &[])?;
        Ok(bars.last().map(|bar| bar.close))
    }

    fn premarket_bars(&self, symbol: &str, as_of: Timestamp) -> Result<Vec<Bar>> {
        let (start, end) = self.window.bounds(as_of)?;
        let path = format!(
            "/v2/aggs/ticker/{}/range/1/minute/{}/{}",
            symbol,
            start.timestamp_millis(),
            end.timestamp_millis()
        );
        let bars = self.aggregates(
            symbol,
            &path,
            &[("sort", "asc".to_string()), ("limit", "5000".to_string())],
        )?;
        Ok(bars
            .into_iter()
            .filter(|bar| start <= bar.timestamp && bar.timestamp <= end)
            .collect())
    }

    fn float_shares(&self, symbol: &str) -> Result<Option<Volume>> {
        let path = format!("/v3/reference/tickers/{}", symbol);
        let url = format!("{}{}", self.base_url, path);
        let query = [("apiKey", self.api_key.clone())];

        let response: TickerDetailsResponse = get_json(&self.client, &url, &query, symbol)?;
        check_status(
            symbol,
            &path,
            response.status.as_deref(),
            response.error.as_deref(),
            response.message.as_deref(),
        )?;
        Ok(response.results.unwrap_or_default().float_shares())
    }
}

impl DataProvider for PolygonProvider {
    fn fetch(&self, symbol: &str, as_of: Timestamp) -> Result<Snapshot> {
        let daily = self.daily_bars(symbol, as_of)?;
        let (prior_close, volumes) = prior_sessions(&daily, &self.window, as_of);
        if volumes.is_empty() {
            log::warn!("Polygon returned no completed daily sessions for {}", symbol);
        }

        let prior_close = match prior_close {
            Some(close) => close,
            None => self
                .previous_close(symbol)?
                .ok_or_else(|| ScreenerError::data_unavailable(symbol, "No previous close data returned"))?,
        };

        let premarket = self.premarket_bars(symbol, as_of)?;
        let float_shares = self.float_shares(symbol)?;

        assemble_snapshot(symbol, as_of, prior_close, &volumes, float_shares, premarket)
    }

    fn enforces_timeout(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "polygon"
    }
}
