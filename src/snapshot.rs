//! Point-in-time market state for one symbol
//!
//! A [`Snapshot`] is produced by a data provider with its raw fields only.
//! The analyzer derives VWAP and relative volume into a *new* snapshot; the
//! derived fields stay `None` until then, and `Some(0.0)` is a legitimate
//! computed value that is never used as a placeholder.

use crate::types::{Bar, Percent, Price, Symbol, Timestamp, Volume};
use serde::{Deserialize, Serialize};

/// Market snapshot for a single symbol at the run's evaluation instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    symbol: Symbol,
    as_of: Timestamp,
    last_price: Price,
    prior_close: Price,
    #[serde(default)]
    premarket_high: Option<Price>,
    #[serde(default)]
    premarket_low: Option<Price>,
    #[serde(default)]
    premarket_volume: Volume,
    #[serde(default)]
    average_daily_volume: Option<Volume>,
    #[serde(default)]
    float_shares: Option<Volume>,
    #[serde(default)]
    premarket_bars: Vec<Bar>,
    #[serde(default, skip_deserializing)]
    vwap: Option<Price>,
    #[serde(default, skip_deserializing)]
    relative_volume: Option<f64>,
    #[serde(default, skip_deserializing)]
    enriched: bool,
}

impl Snapshot {
    /// Start building a raw snapshot
    pub fn builder(symbol: impl Into<Symbol>, as_of: Timestamp) -> SnapshotBuilder {
        SnapshotBuilder::new(symbol, as_of)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn as_of(&self) -> Timestamp {
        self.as_of
    }

    pub fn last_price(&self) -> Price {
        self.last_price
    }

    pub fn prior_close(&self) -> Price {
        self.prior_close
    }

    pub fn premarket_high(&self) -> Option<Price> {
        self.premarket_high
    }

    pub fn premarket_low(&self) -> Option<Price> {
        self.premarket_low
    }

    pub fn premarket_volume(&self) -> Volume {
        self.premarket_volume
    }

    pub fn average_daily_volume(&self) -> Option<Volume> {
        self.average_daily_volume
    }

    pub fn float_shares(&self) -> Option<Volume> {
        self.float_shares
    }

    pub fn premarket_bars(&self) -> &[Bar] {
        &self.premarket_bars
    }

    /// Volume-weighted average price, `None` until enriched or when undefined
    pub fn vwap(&self) -> Option<Price> {
        self.vwap
    }

    /// Pre-market volume over average daily volume, `None` until enriched or when undefined
    pub fn relative_volume(&self) -> Option<f64> {
        self.relative_volume
    }

    /// Last price at or above VWAP; an undefined VWAP does not count against the symbol
    pub fn is_above_vwap(&self) -> bool {
        self.vwap.map_or(true, |vwap| self.last_price >= vwap)
    }

    /// Whether the analyzer has run on this snapshot
    pub fn is_enriched(&self) -> bool {
        self.enriched
    }

    /// Signed gap versus the prior close in percent; `None` without a usable prior close
    pub fn gap_percent(&self) -> Option<Percent> {
        if !self.prior_close.is_finite() || self.prior_close <= 0.0 {
            return None;
        }
        Some((self.last_price - self.prior_close) / self.prior_close * 100.0)
    }

    /// Copy of this snapshot stamped with another evaluation instant
    pub fn at(&self, as_of: Timestamp) -> Snapshot {
        Snapshot {
            as_of,
            ..self.clone()
        }
    }

    /// New snapshot carrying the derived metrics; raw fields are untouched
    pub(crate) fn with_derived(&self, vwap: Option<Price>, relative_volume: Option<f64>) -> Snapshot {
        Snapshot {
            vwap,
            relative_volume,
            enriched: true,
            ..self.clone()
        }
    }
}

/// Builder for raw snapshots as assembled by providers
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    symbol: Symbol,
    as_of: Timestamp,
    last_price: Price,
    prior_close: Price,
    premarket_high: Option<Price>,
    premarket_low: Option<Price>,
    premarket_volume: Option<Volume>,
    average_daily_volume: Option<Volume>,
    float_shares: Option<Volume>,
    premarket_bars: Vec<Bar>,
}

impl SnapshotBuilder {
    fn new(symbol: impl Into<Symbol>, as_of: Timestamp) -> Self {
        Self {
            symbol: symbol.into(),
            as_of,
            last_price: 0.0,
            prior_close: 0.0,
            premarket_high: None,
            premarket_low: None,
            premarket_volume: None,
            average_daily_volume: None,
            float_shares: None,
            premarket_bars: Vec::new(),
        }
    }

    pub fn last_price(mut self, price: Price) -> Self {
        self.last_price = price;
        self
    }

    pub fn prior_close(mut self, price: Price) -> Self {
        self.prior_close = price;
        self
    }

    pub fn premarket_range(mut self, low: Price, high: Price) -> Self {
        self.premarket_low = Some(low);
        self.premarket_high = Some(high);
        self
    }

    pub fn premarket_volume(mut self, volume: Volume) -> Self {
        self.premarket_volume = Some(volume);
        self
    }

    pub fn average_daily_volume(mut self, volume: Volume) -> Self {
        self.average_daily_volume = Some(volume);
        self
    }

    pub fn maybe_average_daily_volume(mut self, volume: Option<Volume>) -> Self {
        self.average_daily_volume = volume;
        self
    }

    pub fn float_shares(mut self, shares: Volume) -> Self {
        self.float_shares = Some(shares);
        self
    }

    pub fn maybe_float_shares(mut self, shares: Option<Volume>) -> Self {
        self.float_shares = shares;
        self
    }

    pub fn premarket_bars(mut self, bars: Vec<Bar>) -> Self {
        self.premarket_bars = bars;
        self
    }

    /// Finish the snapshot. Range and volume not set explicitly are derived from the bars.
    pub fn build(self) -> Snapshot {
        let bars = &self.premarket_bars;
        let bar_high = bars.iter().map(|b| b.high).reduce(f64::max);
        let bar_low = bars.iter().map(|b| b.low).reduce(f64::min);
        let bar_volume = bars.iter().map(|b| b.volume).sum::<f64>();

        Snapshot {
            premarket_high: self.premarket_high.or(bar_high),
            premarket_low: self.premarket_low.or(bar_low),
            premarket_volume: self.premarket_volume.unwrap_or(bar_volume),
            symbol: self.symbol,
            as_of: self.as_of,
            last_price: self.last_price,
            prior_close: self.prior_close,
            average_daily_volume: self.average_daily_volume,
            float_shares: self.float_shares,
            premarket_bars: self.premarket_bars,
            vwap: None,
            relative_volume: None,
            enriched: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{TimeZone, Utc};

    fn as_of() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 3, 8, 13, 0, 0).unwrap()
    }

    #[test]
    fn test_builder_derives_range_and_volume_from_bars() {
        let t = as_of();
        let snapshot = Snapshot::builder("ABCD", t)
            .last_price(11.0)
            .prior_close(10.0)
            .premarket_bars(vec![
                Bar::new(t, 10.2, 10.8, 10.1, 10.5, 1_000.0),
                Bar::new(t, 10.5, 11.2, 10.4, 11.0, 3_000.0),
            ])
            .build();

        assert_eq!(snapshot.premarket_high(), Some(11.2));
        assert_eq!(snapshot.premarket_low(), Some(10.1));
        assert_eq!(snapshot.premarket_volume(), 4_000.0);
        assert!(!snapshot.is_enriched());
        assert!(snapshot.vwap().is_none());
        assert!(snapshot.relative_volume().is_none());
    }

    #[test]
    fn test_explicit_volume_wins_over_bars() {
        let t = as_of();
        let snapshot = Snapshot::builder("ABCD", t)
            .premarket_volume(500_000.0)
            .premarket_bars(vec![Bar::new(t, 1.0, 1.0, 1.0, 1.0, 10.0)])
            .build();
        assert_eq!(snapshot.premarket_volume(), 500_000.0);
    }

    #[test]
    fn test_gap_percent() {
        let snapshot = Snapshot::builder("ABCD", as_of())
            .last_price(11.0)
            .prior_close(10.0)
            .build();
        assert_relative_eq!(snapshot.gap_percent().unwrap(), 10.0, epsilon = 1e-9);

        let down = Snapshot::builder("ABCD", as_of())
            .last_price(9.0)
            .prior_close(10.0)
            .build();
        assert_relative_eq!(down.gap_percent().unwrap(), -10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_gap_percent_without_prior_close() {
        let snapshot = Snapshot::builder("ABCD", as_of()).last_price(11.0).build();
        assert!(snapshot.gap_percent().is_none());
    }

    #[test]
    fn test_with_derived_keeps_raw_fields() {
        let raw = Snapshot::builder("ABCD", as_of())
            .last_price(11.0)
            .prior_close(10.0)
            .premarket_volume(500_000.0)
            .build();
        let enriched = raw.with_derived(Some(10.9), Some(0.0));

        assert!(!raw.is_enriched());
        assert!(enriched.is_enriched());
        assert_eq!(enriched.relative_volume(), Some(0.0));
        assert_eq!(enriched.last_price(), raw.last_price());
        assert_eq!(enriched.premarket_volume(), raw.premarket_volume());
    }

    #[test]
    fn test_deserialized_snapshot_is_never_enriched() {
        let json = r#"{
            "symbol": "ABCD",
            "as_of": "2024-03-08T13:00:00Z",
            "last_price": 11.0,
            "prior_close": 10.0,
            "premarket_volume": 500000.0,
            "vwap": 10.5,
            "relative_volume": 2.5,
            "enriched": true
        }"#;
        let snapshot: Snapshot = serde_json::from_str(json).unwrap();
        assert!(!snapshot.is_enriched());
        assert!(snapshot.vwap().is_none());
        assert!(snapshot.relative_volume().is_none());
    }
}
