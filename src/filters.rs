//! Screening filters - pass/fail rules over enriched snapshots
//!
//! Every filter reports through a [`FilterResult`]; a business-rule failure is
//! `passed == false` with a detail message, never an error. Absent inputs
//! (no gap, no relative volume, no float) fail with "insufficient data". An
//! absent VWAP passes the above-VWAP check with a "vwap unavailable" note.

use crate::error::{Result, ScreenerError};
use crate::snapshot::Snapshot;
use crate::types::{Percent, Volume};
use serde::{Deserialize, Serialize};

/// Detail used whenever a filter's input metric is absent
pub const INSUFFICIENT_DATA: &str = "insufficient data";

/// Detail attached to an above-VWAP pass when no VWAP could be computed
pub const VWAP_UNAVAILABLE: &str = "vwap unavailable";

/// Outcome of one filter for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterResult {
    pub name: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl FilterResult {
    pub fn pass(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            detail: None,
        }
    }

    /// Passing result that still carries a note for the report
    pub fn pass_with(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            detail: Some(detail.into()),
        }
    }

    pub fn fail(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            detail: Some(detail.into()),
        }
    }
}

/// Which side of the prior close counts as a gap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapDirection {
    Up,
    Down,
    /// Absolute gap in either direction
    #[default]
    Either,
}

/// Built-in filter kinds, in the spelling used by configuration files and reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterKind {
    #[serde(rename = "float_liquidity")]
    Float,
    #[serde(rename = "relative_volume")]
    RelativeVolume,
    #[serde(rename = "absolute_volume")]
    AbsoluteVolume,
    #[serde(rename = "gap_size")]
    Gap,
    #[serde(rename = "above_vwap")]
    AboveVwap,
}

impl FilterKind {
    pub fn name(&self) -> &'static str {
        match self {
            FilterKind::Float => "float_liquidity",
            FilterKind::RelativeVolume => "relative_volume",
            FilterKind::AbsoluteVolume => "absolute_volume",
            FilterKind::Gap => "gap_size",
            FilterKind::AboveVwap => "above_vwap",
        }
    }

    fn build(&self) -> Box<dyn Filter> {
        match self {
            FilterKind::Float => Box::new(FloatFilter),
            FilterKind::RelativeVolume => Box::new(RelativeVolumeFilter),
            FilterKind::AbsoluteVolume => Box::new(AbsoluteVolumeFilter),
            FilterKind::Gap => Box::new(GapFilter),
            FilterKind::AboveVwap => Box::new(AboveVwapFilter),
        }
    }
}

/// Threshold bundle shared read-only by every filter during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub min_gap_percent: Percent,
    pub max_gap_percent: Option<Percent>,
    pub gap_direction: GapDirection,
    pub min_relative_volume: f64,
    pub min_premarket_volume: Volume,
    pub min_float_shares: Option<Volume>,
    pub max_float_shares: Option<Volume>,
    pub require_above_vwap: bool,
    /// Explicit evaluation order; empty means the default order
    pub filters: Vec<FilterKind>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_gap_percent: 3.0,
            max_gap_percent: None,
            gap_direction: GapDirection::Either,
            min_relative_volume: 1.5,
            min_premarket_volume: 100_000.0,
            min_float_shares: Some(10_000_000.0),
            max_float_shares: None,
            require_above_vwap: true,
            filters: Vec::new(),
        }
    }
}

impl FilterConfig {
    /// Filters to run, in evaluation order
    pub fn filter_order(&self) -> Vec<FilterKind> {
        if !self.filters.is_empty() {
            return self.filters.clone();
        }

        let mut order = vec![
            FilterKind::Float,
            FilterKind::RelativeVolume,
            FilterKind::AbsoluteVolume,
            FilterKind::Gap,
        ];
        if self.require_above_vwap {
            order.push(FilterKind::AboveVwap);
        }
        order
    }

    /// Reject missing, non-finite or contradictory thresholds
    pub fn validate(&self) -> Result<()> {
        let err = |msg: String| -> Result<()> { Err(ScreenerError::ConfigError(msg)) };

        let finite = [
            ("min_gap_percent", Some(self.min_gap_percent)),
            ("max_gap_percent", self.max_gap_percent),
            ("min_relative_volume", Some(self.min_relative_volume)),
            ("min_premarket_volume", Some(self.min_premarket_volume)),
            ("min_float_shares", self.min_float_shares),
            ("max_float_shares", self.max_float_shares),
        ];
        for (field, value) in finite {
            if let Some(v) = value {
                if !v.is_finite() {
                    return err(format!("{} must be a finite number", field));
                }
            }
        }

        if self.min_gap_percent < 0.0 {
            return err("min_gap_percent must be non-negative".to_string());
        }
        if let Some(max) = self.max_gap_percent {
            if max < self.min_gap_percent {
                return err(format!(
                    "max_gap_percent {} is below min_gap_percent {}",
                    max, self.min_gap_percent
                ));
            }
        }
        if self.min_relative_volume <= 0.0 {
            return err("min_relative_volume must be positive".to_string());
        }
        if self.min_premarket_volume <= 0.0 {
            return err("min_premarket_volume must be positive".to_string());
        }
        if self.min_float_shares.map_or(false, |v| v < 0.0)
            || self.max_float_shares.map_or(false, |v| v < 0.0)
        {
            return err("float bounds must be non-negative".to_string());
        }
        if let (Some(min), Some(max)) = (self.min_float_shares, self.max_float_shares) {
            if min > max {
                return err(format!(
                    "min_float_shares {} exceeds max_float_shares {}",
                    min, max
                ));
            }
        }

        let order = self.filter_order();
        if order.is_empty() {
            return err("at least one filter must be configured".to_string());
        }
        for (i, kind) in order.iter().enumerate() {
            if order[..i].contains(kind) {
                return err(format!("filter '{}' listed more than once", kind.name()));
            }
        }
        if order.contains(&FilterKind::AboveVwap) && !self.require_above_vwap {
            return err("'above_vwap' listed in filters but require_above_vwap is false".to_string());
        }

        Ok(())
    }
}

/// Filter trait - a pass/fail predicate over an enriched snapshot
pub trait Filter: Send + Sync {
    /// Evaluate the snapshot against the configured thresholds
    fn evaluate(&self, snapshot: &Snapshot, config: &FilterConfig) -> FilterResult;

    /// Criterion name reported in results
    fn name(&self) -> &str;
}

/// Gap versus prior close, directional per [`GapDirection`]
#[derive(Debug, Clone, Copy, Default)]
pub struct GapFilter;

impl Filter for GapFilter {
    fn evaluate(&self, snapshot: &Snapshot, config: &FilterConfig) -> FilterResult {
        let Some(gap) = snapshot.gap_percent() else {
            return FilterResult::fail(self.name(), INSUFFICIENT_DATA);
        };

        let (label, magnitude) = match config.gap_direction {
            GapDirection::Either => ("gap", gap.abs()),
            GapDirection::Up => ("gap up", gap),
            GapDirection::Down => ("gap down", -gap),
        };

        if magnitude < config.min_gap_percent {
            return FilterResult::fail(
                self.name(),
                format!(
                    "{} {:.1}% < required {:.1}%",
                    label, magnitude, config.min_gap_percent
                ),
            );
        }
        if let Some(max) = config.max_gap_percent {
            if magnitude > max {
                return FilterResult::fail(
                    self.name(),
                    format!("{} {:.1}% > maximum {:.1}%", label, magnitude, max),
                );
            }
        }
        FilterResult::pass(self.name())
    }

    fn name(&self) -> &str {
        FilterKind::Gap.name()
    }
}

/// Relative volume must be present and at or above the threshold
#[derive(Debug, Clone, Copy, Default)]
pub struct RelativeVolumeFilter;

impl Filter for RelativeVolumeFilter {
    fn evaluate(&self, snapshot: &Snapshot, config: &FilterConfig) -> FilterResult {
        match snapshot.relative_volume() {
            None => FilterResult::fail(self.name(), INSUFFICIENT_DATA),
            Some(rv) if rv >= config.min_relative_volume => FilterResult::pass(self.name()),
            Some(rv) => FilterResult::fail(
                self.name(),
                format!(
                    "relative volume {:.2}x < required {:.2}x",
                    rv, config.min_relative_volume
                ),
            ),
        }
    }

    fn name(&self) -> &str {
        FilterKind::RelativeVolume.name()
    }
}

/// Absolute pre-market share volume
#[derive(Debug, Clone, Copy, Default)]
pub struct AbsoluteVolumeFilter;

impl Filter for AbsoluteVolumeFilter {
    fn evaluate(&self, snapshot: &Snapshot, config: &FilterConfig) -> FilterResult {
        let volume = snapshot.premarket_volume();
        if volume >= config.min_premarket_volume {
            FilterResult::pass(self.name())
        } else {
            FilterResult::fail(
                self.name(),
                format!(
                    "premarket volume {:.0} < required {:.0}",
                    volume, config.min_premarket_volume
                ),
            )
        }
    }

    fn name(&self) -> &str {
        FilterKind::AbsoluteVolume.name()
    }
}

/// Float must be known and inside `[min_float_shares, max_float_shares]`
#[derive(Debug, Clone, Copy, Default)]
pub struct FloatFilter;

impl Filter for FloatFilter {
    fn evaluate(&self, snapshot: &Snapshot, config: &FilterConfig) -> FilterResult {
        let Some(float) = snapshot.float_shares() else {
            return FilterResult::fail(self.name(), INSUFFICIENT_DATA);
        };

        if let Some(min) = config.min_float_shares {
            if float < min {
                return FilterResult::fail(
                    self.name(),
                    format!("float {:.0} < minimum {:.0}", float, min),
                );
            }
        }
        if let Some(max) = config.max_float_shares {
            if float > max {
                return FilterResult::fail(
                    self.name(),
                    format!("float {:.0} > maximum {:.0}", float, max),
                );
            }
        }
        FilterResult::pass(self.name())
    }

    fn name(&self) -> &str {
        FilterKind::Float.name()
    }
}

/// Last price at or above pre-market VWAP; passes when VWAP is undefined
#[derive(Debug, Clone, Copy, Default)]
pub struct AboveVwapFilter;

impl Filter for AboveVwapFilter {
    fn evaluate(&self, snapshot: &Snapshot, _config: &FilterConfig) -> FilterResult {
        match snapshot.vwap() {
            None => FilterResult::pass_with(self.name(), VWAP_UNAVAILABLE),
            Some(_) if snapshot.is_above_vwap() => FilterResult::pass(self.name()),
            Some(vwap) => FilterResult::fail(
                self.name(),
                format!("last {:.2} < vwap {:.2}", snapshot.last_price(), vwap),
            ),
        }
    }

    fn name(&self) -> &str {
        FilterKind::AboveVwap.name()
    }
}

/// Ordered collection of filters, evaluated in full for every symbol
pub struct FilterChain {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterChain {
    /// Empty chain; add filters with [`FilterChain::push`]
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    /// Build the built-in filters in configured order
    pub fn from_config(config: &FilterConfig) -> Result<Self> {
        config.validate()?;
        let filters = config.filter_order().iter().map(FilterKind::build).collect();
        Ok(Self { filters })
    }

    pub fn push(&mut self, filter: Box<dyn Filter>) -> &mut Self {
        self.filters.push(filter);
        self
    }

    /// Run every filter in order without short-circuiting
    pub fn evaluate(&self, snapshot: &Snapshot, config: &FilterConfig) -> Vec<FilterResult> {
        self.filters
            .iter()
            .map(|filter| {
                let result = filter.evaluate(snapshot, config);
                if !result.passed {
                    log::debug!(
                        "{}: {} failed ({})",
                        snapshot.symbol(),
                        result.name,
                        result.detail.as_deref().unwrap_or("")
                    );
                }
                result
            })
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl Default for FilterChain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{Analyzer, PremarketAnalyzer};
    use chrono::{TimeZone, Utc};

    fn enriched(last: f64, prior: f64) -> Snapshot {
        let as_of = Utc.with_ymd_and_hms(2024, 3, 8, 13, 0, 0).unwrap();
        let raw = Snapshot::builder("ABCD", as_of)
            .last_price(last)
            .prior_close(prior)
            .premarket_volume(500_000.0)
            .average_daily_volume(200_000.0)
            .float_shares(5_000_000.0)
            .build();
        PremarketAnalyzer::new().enrich(&raw).unwrap()
    }

    fn scenario_config() -> FilterConfig {
        FilterConfig {
            min_gap_percent: 5.0,
            min_relative_volume: 2.0,
            min_premarket_volume: 100_000.0,
            min_float_shares: None,
            max_float_shares: Some(10_000_000.0),
            require_above_vwap: false,
            ..FilterConfig::default()
        }
    }

    #[test]
    fn test_gap_filter_pass_and_fail() {
        let config = scenario_config();
        assert!(GapFilter.evaluate(&enriched(11.0, 10.0), &config).passed);

        let result = GapFilter.evaluate(&enriched(11.0, 10.9), &config);
        assert!(!result.passed);
        let detail = result.detail.unwrap();
        assert!(detail.contains("0.9%"), "{}", detail);
        assert!(detail.contains("5.0%"), "{}", detail);
    }

    #[test]
    fn test_gap_filter_directions() {
        let down = enriched(9.0, 10.0);
        let mut config = scenario_config();

        assert!(GapFilter.evaluate(&down, &config).passed);

        config.gap_direction = GapDirection::Up;
        assert!(!GapFilter.evaluate(&down, &config).passed);

        config.gap_direction = GapDirection::Down;
        assert!(GapFilter.evaluate(&down, &config).passed);
        assert!(!GapFilter.evaluate(&enriched(11.0, 10.0), &config).passed);
    }

    #[test]
    fn test_gap_filter_maximum() {
        let config = FilterConfig {
            max_gap_percent: Some(8.0),
            ..scenario_config()
        };
        let result = GapFilter.evaluate(&enriched(11.0, 10.0), &config);
        assert!(!result.passed);
        assert!(result.detail.unwrap().contains("maximum"));
    }

    #[test]
    fn test_gap_filter_without_prior_close() {
        let result = GapFilter.evaluate(&enriched(11.0, 0.0), &scenario_config());
        assert!(!result.passed);
        assert_eq!(result.detail.as_deref(), Some(INSUFFICIENT_DATA));
    }

    #[test]
    fn test_relative_volume_absent_is_hard_fail() {
        let as_of = Utc.with_ymd_and_hms(2024, 3, 8, 13, 0, 0).unwrap();
        let raw = Snapshot::builder("ABCD", as_of)
            .last_price(11.0)
            .prior_close(10.0)
            .premarket_volume(500_000.0)
            .average_daily_volume(0.0)
            .build();
        let snapshot = PremarketAnalyzer::new().enrich(&raw).unwrap();

        let result = RelativeVolumeFilter.evaluate(&snapshot, &scenario_config());
        assert!(!result.passed);
        assert_eq!(result.detail.as_deref(), Some("insufficient data"));
    }

    #[test]
    fn test_relative_volume_threshold() {
        let config = FilterConfig {
            min_relative_volume: 3.0,
            ..scenario_config()
        };
        let result = RelativeVolumeFilter.evaluate(&enriched(11.0, 10.0), &config);
        assert!(!result.passed);
        assert!(result.detail.unwrap().contains("2.50x"));
    }

    #[test]
    fn test_absolute_volume() {
        let config = FilterConfig {
            min_premarket_volume: 600_000.0,
            ..scenario_config()
        };
        assert!(AbsoluteVolumeFilter.evaluate(&enriched(11.0, 10.0), &scenario_config()).passed);
        let result = AbsoluteVolumeFilter.evaluate(&enriched(11.0, 10.0), &config);
        assert!(!result.passed);
        assert!(result.detail.unwrap().contains("500000 < required 600000"));
    }

    #[test]
    fn test_float_bounds() {
        let snapshot = enriched(11.0, 10.0);
        assert!(FloatFilter.evaluate(&snapshot, &scenario_config()).passed);

        let too_small = FilterConfig {
            min_float_shares: Some(6_000_000.0),
            ..scenario_config()
        };
        assert!(!FloatFilter.evaluate(&snapshot, &too_small).passed);

        let too_big = FilterConfig {
            max_float_shares: Some(1_000_000.0),
            ..scenario_config()
        };
        assert!(!FloatFilter.evaluate(&snapshot, &too_big).passed);
    }

    #[test]
    fn test_float_absent_fails() {
        let as_of = Utc.with_ymd_and_hms(2024, 3, 8, 13, 0, 0).unwrap();
        let snapshot = Snapshot::builder("ABCD", as_of).last_price(1.0).build();
        let result = FloatFilter.evaluate(&snapshot, &scenario_config());
        assert_eq!(result.detail.as_deref(), Some(INSUFFICIENT_DATA));
    }

    #[test]
    fn test_above_vwap_absent_passes_with_note() {
        let snapshot = enriched(11.0, 10.0);
        assert!(snapshot.vwap().is_none());

        let result = AboveVwapFilter.evaluate(&snapshot, &scenario_config());
        assert!(result.passed);
        assert_eq!(result.detail.as_deref(), Some(VWAP_UNAVAILABLE));
    }

    #[test]
    fn test_default_criteria_pass_without_bars() {
        let as_of = Utc.with_ymd_and_hms(2024, 3, 8, 13, 0, 0).unwrap();
        let raw = Snapshot::builder("ABCD", as_of)
            .last_price(11.0)
            .prior_close(10.0)
            .premarket_volume(500_000.0)
            .average_daily_volume(200_000.0)
            .float_shares(50_000_000.0)
            .build();
        let snapshot = PremarketAnalyzer::new().enrich(&raw).unwrap();
        let config = FilterConfig::default();

        let results = FilterChain::from_config(&config).unwrap().evaluate(&snapshot, &config);
        let failed: Vec<&FilterResult> = results.iter().filter(|r| !r.passed).collect();
        assert!(failed.is_empty(), "unexpected failures: {:?}", failed);
    }

    #[test]
    fn test_chain_reports_every_failure_in_order() {
        let config = FilterConfig {
            min_gap_percent: 20.0,
            min_relative_volume: 5.0,
            ..scenario_config()
        };
        let chain = FilterChain::from_config(&config).unwrap();
        let results = chain.evaluate(&enriched(11.0, 10.0), &config);

        assert_eq!(results.len(), 4);
        let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["float_liquidity", "relative_volume", "absolute_volume", "gap_size"]
        );
        let failed: Vec<&str> = results
            .iter()
            .filter(|r| !r.passed)
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(failed, vec!["relative_volume", "gap_size"]);
    }

    #[test]
    fn test_chain_respects_explicit_order() {
        let config = FilterConfig {
            filters: vec![FilterKind::Gap, FilterKind::Float],
            ..scenario_config()
        };
        let chain = FilterChain::from_config(&config).unwrap();
        assert_eq!(chain.names(), vec!["gap_size", "float_liquidity"]);
    }

    #[test]
    fn test_default_order_includes_vwap() {
        let order = FilterConfig::default().filter_order();
        assert_eq!(order.last(), Some(&FilterKind::AboveVwap));
        assert_eq!(order.len(), 5);
    }

    #[test]
    fn test_validate_rejects_contradictions() {
        let bad = [
            FilterConfig {
                min_relative_volume: 0.0,
                ..FilterConfig::default()
            },
            FilterConfig {
                min_gap_percent: -1.0,
                ..FilterConfig::default()
            },
            FilterConfig {
                min_float_shares: Some(10.0),
                max_float_shares: Some(5.0),
                ..FilterConfig::default()
            },
            FilterConfig {
                min_gap_percent: 5.0,
                max_gap_percent: Some(4.0),
                ..FilterConfig::default()
            },
            FilterConfig {
                filters: vec![FilterKind::Gap, FilterKind::Gap],
                ..FilterConfig::default()
            },
            FilterConfig {
                require_above_vwap: false,
                filters: vec![FilterKind::AboveVwap],
                ..FilterConfig::default()
            },
            FilterConfig {
                min_premarket_volume: f64::NAN,
                ..FilterConfig::default()
            },
        ];
        for config in bad {
            let err = config.validate().unwrap_err();
            assert!(matches!(err, ScreenerError::ConfigError(_)), "{:?}", config);
        }
        assert!(FilterConfig::default().validate().is_ok());
    }

    #[test]
    fn test_filter_kind_serde_names() {
        let kinds: Vec<FilterKind> =
            serde_json::from_str(r#"["gap_size", "float_liquidity", "above_vwap"]"#).unwrap();
        assert_eq!(
            kinds,
            vec![FilterKind::Gap, FilterKind::Float, FilterKind::AboveVwap]
        );
    }
}
