//! Yahoo Finance data source integration
//!
//! Uses the public chart API (no API key required). Daily bars supply the
//! prior close and the volume baseline; 5-minute bars with extended hours
//! supply the pre-market session. Float comes from the quote summary's key
//! statistics; when that lookup fails the snapshot carries no float.

use super::{assemble_snapshot, get_json, http_client, millis_to_utc, prior_sessions, DEFAULT_HTTP_TIMEOUT};
use crate::config::DataSettings;
use crate::data::DataProvider;
use crate::error::{Result, ScreenerError};
use crate::session::PremarketWindow;
use crate::snapshot::Snapshot;
use crate::types::{Bar, Timestamp, Volume};
use reqwest::blocking::Client;
use serde::Deserialize;

const YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const YAHOO_SUMMARY_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";

/// Yahoo Finance provider (no API key required)
pub struct YahooFinanceProvider {
    client: Client,
    base_url: String,
    summary_url: String,
    window: PremarketWindow,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryResponse {
    quote_summary: QuoteSummary,
}

#[derive(Debug, Deserialize)]
struct QuoteSummary {
    #[serde(default)]
    result: Option<Vec<SummaryResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryResult {
    #[serde(default)]
    default_key_statistics: Option<KeyStatistics>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyStatistics {
    #[serde(default)]
    float_shares: Option<RawValue>,
    #[serde(default)]
    shares_outstanding: Option<RawValue>,
}

/// Yahoo wraps numbers as `{"raw": 1234, "fmt": "1.23k"}`; empty objects are common
#[derive(Debug, Default, Deserialize)]
struct RawValue {
    #[serde(default)]
    raw: Option<f64>,
}

impl KeyStatistics {
    /// Float, falling back to shares outstanding
    fn float_shares(&self) -> Option<Volume> {
        [&self.float_shares, &self.shares_outstanding]
            .into_iter()
            .flatten()
            .filter_map(|value| value.raw)
            .find(|shares| shares.is_finite() && *shares > 0.0)
    }
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

/// Column-oriented OHLCV; any entry may be null
#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

impl YahooFinanceProvider {
    /// Provider options: `base_url` (chart endpoint), `summary_url` (quote summary endpoint)
    pub fn new(settings: &DataSettings) -> Result<Self> {
        let client = http_client(settings.fetch_timeout().unwrap_or(DEFAULT_HTTP_TIMEOUT))?;
        let endpoint = |key: &str, default: &str| {
            settings
                .option(key)
                .unwrap_or(default)
                .trim_end_matches('/')
                .to_string()
        };
        Ok(Self {
            client,
            base_url: endpoint("base_url", YAHOO_BASE_URL),
            summary_url: endpoint("summary_url", YAHOO_SUMMARY_URL),
            window: settings.premarket_window()?,
        })
    }

    fn fetch_float(&self, symbol: &str) -> Result<Option<Volume>> {
        let url = format!("{}/{}", self.summary_url, symbol);
        let query = [("modules", "defaultKeyStatistics".to_string())];
        let response: SummaryResponse = get_json(&self.client, &url, &query, symbol)?;
        parse_float(symbol, response)
    }

    /// Float is optional; lookup failures leave it absent
    fn float_shares(&self, symbol: &str) -> Option<Volume> {
        match self.fetch_float(symbol) {
            Ok(shares) => shares,
            Err(e) => {
                log::warn!("Yahoo Finance float lookup failed for {}: {}", symbol, e);
                None
            }
        }
    }

    fn fetch_chart(&self, symbol: &str, interval: &str, range: &str, extended: bool) -> Result<Vec<Bar>> {
        let url = format!("{}/{}", self.base_url, symbol);
        let query = [
            ("interval", interval.to_string()),
            ("range", range.to_string()),
            ("includePrePost", extended.to_string()),
        ];
        let response: ChartResponse = get_json(&self.client, &url, &query, symbol)?;
        parse_chart(symbol, response)
    }
}

fn parse_chart(symbol: &str, response: ChartResponse) -> Result<Vec<Bar>> {
    if let Some(error) = response.chart.error {
        return Err(ScreenerError::data_unavailable(
            symbol,
            format!("Yahoo Finance error {}: {}", error.code, error.description),
        ));
    }

    let result = response
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| ScreenerError::data_unavailable(symbol, "Yahoo Finance returned no chart data"))?;
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();

    let mut bars = Vec::with_capacity(result.timestamp.len());
    for (idx, seconds) in result.timestamp.iter().enumerate() {
        let column = |values: &[Option<f64>]| values.get(idx).copied().flatten();
        let fields = (
            millis_to_utc(seconds.saturating_mul(1000)),
            column(&quote.open),
            column(&quote.high),
            column(&quote.low),
            column(&quote.close),
            column(&quote.volume),
        );
        // Yahoo pads halted or empty intervals with nulls
        if let (Some(ts), Some(open), Some(high), Some(low), Some(close), Some(volume)) = fields {
            bars.push(Bar::new(ts, open, high, low, close, volume));
        }
    }

    Ok(bars)
}

fn parse_float(symbol: &str, response: SummaryResponse) -> Result<Option<Volume>> {
    if let Some(error) = response.quote_summary.error {
        return Err(ScreenerError::data_unavailable(
            symbol,
            format!("Yahoo Finance error {}: {}", error.code, error.description),
        ));
    }

    Ok(response
        .quote_summary
        .result
        .and_then(|results| results.into_iter().next())
        .and_then(|result| result.default_key_statistics)
        .and_then(|stats| stats.float_shares()))
}

impl DataProvider for YahooFinanceProvider {
    fn fetch(&self, symbol: &str, as_of: Timestamp) -> Result<Snapshot> {
        let daily = self.fetch_chart(symbol, "1d", "3mo", false)?;
        let (prior_close, volumes) = prior_sessions(&daily, &self.window, as_of);
        let prior_close = prior_close
            .ok_or_else(|| ScreenerError::data_unavailable(symbol, "No prior session close returned"))?;

        let intraday = self.fetch_chart(symbol, "5m", "5d", true)?;
        let mut premarket = Vec::new();
        for bar in intraday {
            if self.window.contains(bar.timestamp, as_of)? {
                premarket.push(bar);
            }
        }
        log::debug!(
            "Yahoo Finance {}: {} daily bars, {} pre-market bars",
            symbol,
            daily.len(),
            premarket.len()
        );

        let float_shares = self.float_shares(symbol);

        assemble_snapshot(symbol, as_of, prior_close, &volumes, float_shares, premarket)
    }

    fn enforces_timeout(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "yahoo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHART: &str = r#"{
        "chart": {
            "result": [{
                "meta": {"symbol": "ABCD"},
                "timestamp": [1720598400, 1720598700, 1720599000],
                "indicators": {"quote": [{
                    "open":   [10.0, null, 10.4],
                    "high":   [10.5, null, 10.6],
                    "low":    [9.9,  null, 10.3],
                    "close":  [10.4, null, 10.5],
                    "volume": [1000, null, 2500]
                }]}
            }],
            "error": null
        }
    }"#;

    #[test]
    fn test_parse_chart_skips_null_rows() {
        let response: ChartResponse = serde_json::from_str(CHART).unwrap();
        let bars = parse_chart("ABCD", response).unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].timestamp.timestamp(), 1_720_598_400);
        assert_eq!(bars[1].close, 10.5);
        assert_eq!(bars[1].volume, 2500.0);
    }

    #[test]
    fn test_parse_chart_error() {
        let response: ChartResponse = serde_json::from_str(
            r#"{"chart": {"result": null, "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}}}"#,
        )
        .unwrap();
        let err = parse_chart("ZZZZ", response).unwrap_err();
        assert!(matches!(err, ScreenerError::DataUnavailable { .. }));
        assert!(err.to_string().contains("delisted"));
    }

    #[test]
    fn test_parse_float_prefers_float_shares() {
        let response: SummaryResponse = serde_json::from_str(
            r#"{"quoteSummary": {"result": [{"defaultKeyStatistics": {
                "floatShares": {"raw": 8250000, "fmt": "8.25M"},
                "sharesOutstanding": {"raw": 12000000, "fmt": "12M"}
            }}], "error": null}}"#,
        )
        .unwrap();
        assert_eq!(parse_float("ABCD", response).unwrap(), Some(8_250_000.0));
    }

    #[test]
    fn test_parse_float_falls_back_to_shares_outstanding() {
        let response: SummaryResponse = serde_json::from_str(
            r#"{"quoteSummary": {"result": [{"defaultKeyStatistics": {
                "floatShares": {},
                "sharesOutstanding": {"raw": 12000000, "fmt": "12M"}
            }}], "error": null}}"#,
        )
        .unwrap();
        assert_eq!(parse_float("ABCD", response).unwrap(), Some(12_000_000.0));

        let empty: SummaryResponse =
            serde_json::from_str(r#"{"quoteSummary": {"result": [{}], "error": null}}"#).unwrap();
        assert_eq!(parse_float("ABCD", empty).unwrap(), None);
    }

    #[test]
    fn test_parse_float_error() {
        let response: SummaryResponse = serde_json::from_str(
            r#"{"quoteSummary": {"result": null, "error": {"code": "Not Found", "description": "Quote not found for ticker symbol: ZZZZ"}}}"#,
        )
        .unwrap();
        assert!(parse_float("ZZZZ", response).is_err());
    }

    #[test]
    fn test_float_lookup_failure_is_absent() {
        let mut settings = DataSettings::default();
        settings
            .provider_options
            .insert("summary_url".to_string(), "http://127.0.0.1:9".to_string());
        let provider = YahooFinanceProvider::new(&settings).unwrap();
        assert_eq!(provider.float_shares("ABCD"), None);
    }

    #[test]
    fn test_provider_creation() {
        let provider = YahooFinanceProvider::new(&DataSettings::default()).unwrap();
        assert_eq!(provider.name(), "yahoo");
        assert_eq!(provider.base_url, YAHOO_BASE_URL);
        assert_eq!(provider.summary_url, YAHOO_SUMMARY_URL);
    }
}
