//! External market data providers
//!
//! - Yahoo Finance: chart and quote summary APIs, no API key required
//! - Polygon.io: aggregates and reference endpoints, API key required
//!
//! Every transport, HTTP status or decoding failure becomes
//! `ScreenerError::DataUnavailable` for the symbol being fetched.

pub mod polygon;
pub mod yahoo;

pub use polygon::PolygonProvider;
pub use yahoo::YahooFinanceProvider;

use crate::analyzer::average_daily_volume;
use crate::error::{Result, ScreenerError};
use crate::session::PremarketWindow;
use crate::snapshot::Snapshot;
use crate::types::{Bar, Price, Timestamp, Volume};
use chrono::{TimeZone, Utc};
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Per-request timeout when the configuration sets none
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Daily sessions averaged for relative volume
pub const AVERAGE_VOLUME_SESSIONS: usize = 30;

pub(crate) fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
        .build()
        .map_err(|e| ScreenerError::ConfigError(format!("Failed to create HTTP client: {}", e)))
}

/// GET `url` and decode a JSON body
pub(crate) fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    query: &[(&str, String)],
    symbol: &str,
) -> Result<T> {
    let response = client
        .get(url)
        .query(query)
        .send()
        .map_err(|e| ScreenerError::data_unavailable(symbol, format!("HTTP request failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        let snippet: String = body.chars().take(200).collect();
        return Err(ScreenerError::data_unavailable(
            symbol,
            format!("{} returned {}: {}", url, status, snippet),
        ));
    }

    response
        .json::<T>()
        .map_err(|e| ScreenerError::data_unavailable(symbol, format!("Malformed response from {}: {}", url, e)))
}

pub(crate) fn millis_to_utc(millis: i64) -> Option<Timestamp> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Prior regular-session close and up to 30 preceding daily volumes.
/// Daily bars on or after the session date of `as_of` are ignored.
pub(crate) fn prior_sessions(
    daily: &[Bar],
    window: &PremarketWindow,
    as_of: Timestamp,
) -> (Option<Price>, Vec<Volume>) {
    let session = window.session_date(as_of);
    let completed: Vec<&Bar> = daily
        .iter()
        .filter(|bar| window.session_date(bar.timestamp) < session)
        .collect();

    let prior_close = completed.last().map(|bar| bar.close);
    let volumes = completed
        .iter()
        .rev()
        .take(AVERAGE_VOLUME_SESSIONS)
        .rev()
        .map(|bar| bar.volume)
        .collect();
    (prior_close, volumes)
}

/// Assemble a raw snapshot from provider data
pub(crate) fn assemble_snapshot(
    symbol: &str,
    as_of: Timestamp,
    prior_close: Price,
    daily_volumes: &[Volume],
    float_shares: Option<Volume>,
    premarket_bars: Vec<Bar>,
) -> Result<Snapshot> {
    let last_price = premarket_bars
        .last()
        .map(|bar| bar.close)
        .ok_or_else(|| ScreenerError::data_unavailable(symbol, "No premarket data returned"))?;

    Ok(Snapshot::builder(symbol, as_of)
        .last_price(last_price)
        .prior_close(prior_close)
        .maybe_average_daily_volume(average_daily_volume(daily_volumes))
        .maybe_float_shares(float_shares)
        .premarket_bars(premarket_bars)
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn daily(day: u32, close: f64, volume: f64) -> Bar {
        // 20:00 UTC == 16:00 EDT close
        let ts = Utc.with_ymd_and_hms(2024, 7, day, 20, 0, 0).unwrap();
        Bar::new(ts, close, close, close, close, volume)
    }

    #[test]
    fn test_prior_sessions_excludes_current_day() {
        let window = PremarketWindow::default();
        let as_of = Utc.with_ymd_and_hms(2024, 7, 10, 12, 0, 0).unwrap();
        let bars = vec![
            daily(8, 10.0, 100.0),
            daily(9, 11.0, 200.0),
            daily(10, 99.0, 5.0),
        ];

        let (close, volumes) = prior_sessions(&bars, &window, as_of);
        assert_eq!(close, Some(11.0));
        assert_eq!(volumes, vec![100.0, 200.0]);
    }

    #[test]
    fn test_prior_sessions_caps_sample() {
        let window = PremarketWindow::default();
        let as_of = Utc.with_ymd_and_hms(2024, 8, 1, 12, 0, 0).unwrap();
        let bars: Vec<Bar> = (1..=31).map(|d| daily(d, d as f64, d as f64)).collect();

        let (close, volumes) = prior_sessions(&bars, &window, as_of);
        assert_eq!(close, Some(31.0));
        assert_eq!(volumes.len(), AVERAGE_VOLUME_SESSIONS);
        assert_eq!(volumes[0], 2.0);
    }

    #[test]
    fn test_assemble_requires_premarket_bars() {
        let as_of = Utc.with_ymd_and_hms(2024, 7, 10, 12, 0, 0).unwrap();
        let err = assemble_snapshot("ABCD", as_of, 10.0, &[100.0], None, Vec::new()).unwrap_err();
        assert!(matches!(err, ScreenerError::DataUnavailable { .. }));

        let bar = Bar::new(as_of, 10.0, 10.5, 9.9, 10.4, 1_000.0);
        let snapshot = assemble_snapshot("ABCD", as_of, 10.0, &[100.0, 300.0], None, vec![bar]).unwrap();
        assert_eq!(snapshot.last_price(), 10.4);
        assert_eq!(snapshot.average_daily_volume(), Some(200.0));
        assert_eq!(snapshot.premarket_volume(), 1_000.0);
    }
}
