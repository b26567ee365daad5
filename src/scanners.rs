//! Scanner catalogue built from reusable baseline queries
//!
//! A scanner is a named bundle of baseline queries (gap, liquidity, breakout,
//! ...). Only the pre-market gap and liquidity baselines can be evaluated from
//! a [`Snapshot`]; every other baseline reports itself as unsupported.

use crate::error::{Result, ScreenerError};
use crate::snapshot::Snapshot;
use num_format::{Locale, ToFormattedString};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Baseline parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

/// Atomic building block for a scanner condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineQuery {
    pub key: String,
    pub description: String,
    pub parameters: BTreeMap<String, ParamValue>,
}

impl BaselineQuery {
    pub fn new(key: &str, description: &str, parameters: &[(&str, ParamValue)]) -> Self {
        Self {
            key: key.to_string(),
            description: description.to_string(),
            parameters: parameters
                .iter()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect(),
        }
    }

    /// Copy with `overrides` merged over the existing parameters
    pub fn with_overrides(&self, overrides: &[(&str, ParamValue)]) -> Self {
        let mut merged = self.clone();
        for (name, value) in overrides {
            merged.parameters.insert(name.to_string(), value.clone());
        }
        merged
    }

    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.parameters.get(name)
    }

    fn float_param(&self, name: &str) -> f64 {
        self.param(name).and_then(ParamValue::as_f64).unwrap_or(0.0)
    }

    fn bool_param(&self, name: &str) -> bool {
        self.param(name).and_then(ParamValue::as_bool).unwrap_or(false)
    }
}

/// Named scanner composed from one or more baseline queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannerDefinition {
    pub name: String,
    pub group: String,
    pub baselines: Vec<BaselineQuery>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Result of evaluating one baseline against a snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BaselineOutcome {
    pub key: String,
    pub passed: bool,
    pub reason: String,
}

/// Built-in baseline queries keyed by name
pub fn baseline_queries() -> BTreeMap<String, BaselineQuery> {
    use ParamValue::{Bool, Float, Int, Text};

    let queries = vec![
        BaselineQuery::new(
            "premarket_gap",
            "Pre-market gap percentage with VWAP confirmation",
            &[("min_gap_percent", Float(3.0)), ("require_above_vwap", Bool(true))],
        ),
        BaselineQuery::new(
            "after_hours_gap",
            "After-hours price displacement relative to prior close",
            &[("min_gap_percent", Float(2.0)), ("session", Text("post".into()))],
        ),
        BaselineQuery::new(
            "premarket_liquidity",
            "Pre-market participation filters",
            &[("min_relative_volume", Float(1.5)), ("min_absolute_volume", Int(100_000))],
        ),
        BaselineQuery::new(
            "after_hours_liquidity",
            "After-hours participation filters",
            &[("min_relative_volume", Float(1.2)), ("min_absolute_volume", Int(50_000))],
        ),
        BaselineQuery::new(
            "earnings_upcoming",
            "Earnings scheduled within the next few sessions",
            &[("days_ahead", Int(1)), ("session", Text("after_close".into()))],
        ),
        BaselineQuery::new(
            "post_earnings_followthrough",
            "Tracking price and volume behaviour after an earnings event",
            &[("days_since_report", Int(1)), ("min_gain_percent", Float(2.5))],
        ),
        BaselineQuery::new(
            "multi_day_momentum",
            "Stacked green candles with higher highs",
            &[("green_days", Int(3)), ("require_higher_highs", Bool(true))],
        ),
        BaselineQuery::new(
            "breakout",
            "Price clearing recent resistance with volume",
            &[
                ("lookback_days", Int(20)),
                ("volume_multiple", Float(1.5)),
                ("buffer_percent", Float(1.5)),
            ],
        ),
        BaselineQuery::new(
            "double_breakout",
            "Breakout validated on two different lookbacks",
            &[
                ("first_lookback", Int(20)),
                ("second_lookback", Int(50)),
                ("min_volume_multiple", Float(2.0)),
            ],
        ),
        BaselineQuery::new(
            "moving_average_cross",
            "Fast MA crossing above a slower MA",
            &[("fast_window", Int(10)), ("slow_window", Int(20))],
        ),
        BaselineQuery::new(
            "sma_cross",
            "Simple moving-average cross",
            &[("fast_window", Int(20)), ("slow_window", Int(50))],
        ),
        BaselineQuery::new(
            "golden_cross",
            "50-day moving average crossing above the 200-day",
            &[("fast_window", Int(50)), ("slow_window", Int(200))],
        ),
        BaselineQuery::new(
            "bullish_reversal",
            "Oversold bounce reclaiming short-term resistance",
            &[
                ("rsi_max", Int(35)),
                ("reclaim_days", Int(3)),
                ("min_wick_percent", Float(1.0)),
            ],
        ),
        BaselineQuery::new(
            "volume_spike",
            "Sudden increase in intraday volume",
            &[("min_multiple", Float(2.0))],
        ),
        BaselineQuery::new(
            "relative_strength",
            "Relative strength versus peers over the last N sessions",
            &[("lookback_days", Int(30)), ("percentile", Int(70))],
        ),
        BaselineQuery::new(
            "intraday_momentum",
            "Intraday gain over a short timeframe",
            &[("timeframe_minutes", Int(15)), ("min_gain_percent", Float(3.0))],
        ),
        BaselineQuery::new(
            "short_squeeze",
            "Elevated short interest with supportive volume",
            &[
                ("min_short_float_percent", Int(10)),
                ("max_days_to_cover", Int(4)),
                ("volume_multiple", Float(2.5)),
            ],
        ),
    ];

    queries.into_iter().map(|q| (q.key.clone(), q)).collect()
}

/// Look up a built-in baseline, applying `overrides`
pub fn baseline(key: &str, overrides: &[(&str, ParamValue)]) -> Result<BaselineQuery> {
    baseline_queries()
        .remove(key)
        .map(|query| query.with_overrides(overrides))
        .ok_or_else(|| ScreenerError::ConfigError(format!("Unknown baseline '{}' referenced by scanner", key)))
}

fn scanner(
    name: &str,
    group: &str,
    baselines: Vec<BaselineQuery>,
    notes: Option<&str>,
) -> ScannerDefinition {
    ScannerDefinition {
        name: name.to_string(),
        group: group.to_string(),
        baselines,
        notes: notes.map(str::to_string),
    }
}

/// The built-in scanner catalogue, in display order
pub fn build_scanner_definitions() -> Result<Vec<ScannerDefinition>> {
    use ParamValue::{Bool, Float, Int, Text};

    const GAINERS: &str = "Pre-Open Gainers";
    const SWING: &str = "Swing";
    const DAY: &str = "Day";

    Ok(vec![
        scanner(
            "Gainers",
            GAINERS,
            vec![
                baseline("premarket_gap", &[("min_gap_percent", Float(1.5))])?,
                baseline("premarket_liquidity", &[])?,
            ],
            None,
        ),
        scanner(
            "After-Hours Gainers",
            GAINERS,
            vec![
                baseline("after_hours_gap", &[("min_gap_percent", Float(1.5))])?,
                baseline("after_hours_liquidity", &[])?,
            ],
            None,
        ),
        scanner(
            "Gap-up",
            GAINERS,
            vec![
                baseline("premarket_gap", &[("min_gap_percent", Float(4.0))])?,
                baseline("premarket_liquidity", &[("min_absolute_volume", Int(150_000))])?,
            ],
            None,
        ),
        scanner(
            "Earnings Tonight",
            GAINERS,
            vec![
                baseline(
                    "earnings_upcoming",
                    &[("days_ahead", Int(0)), ("session", Text("after_close".into()))],
                )?,
                baseline("premarket_liquidity", &[])?,
            ],
            Some("Filters for names reporting after today's close."),
        ),
        scanner(
            "After Earnings",
            GAINERS,
            vec![
                baseline("post_earnings_followthrough", &[("days_since_report", Int(2))])?,
                baseline("premarket_liquidity", &[])?,
            ],
            None,
        ),
        scanner(
            "Green Royal Flush",
            SWING,
            vec![
                baseline("multi_day_momentum", &[("green_days", Int(5))])?,
                baseline("relative_strength", &[("percentile", Int(80))])?,
                baseline("volume_spike", &[("min_multiple", Float(2.5))])?,
            ],
            None,
        ),
        scanner(
            "Pop Bull",
            SWING,
            vec![
                baseline("multi_day_momentum", &[("green_days", Int(2))])?,
                baseline("breakout", &[("buffer_percent", Float(0.5))])?,
            ],
            None,
        ),
        scanner(
            "Pop+Bull",
            SWING,
            vec![
                baseline("multi_day_momentum", &[("green_days", Int(3))])?,
                baseline("breakout", &[])?,
                baseline("relative_strength", &[("percentile", Int(75))])?,
            ],
            None,
        ),
        scanner(
            "Buy Into Eam",
            SWING,
            vec![
                baseline("earnings_upcoming", &[("days_ahead", Int(3))])?,
                baseline("multi_day_momentum", &[("green_days", Int(2))])?,
            ],
            Some("Positions building into the earnings catalyst."),
        ),
        scanner(
            "Strong After Eam",
            SWING,
            vec![
                baseline("post_earnings_followthrough", &[("min_gain_percent", Float(3.0))])?,
                baseline("breakout", &[("volume_multiple", Float(2.0))])?,
            ],
            None,
        ),
        scanner(
            "Breakout Strong",
            SWING,
            vec![
                baseline(
                    "breakout",
                    &[("lookback_days", Int(30)), ("volume_multiple", Float(2.0))],
                )?,
                baseline("relative_strength", &[("percentile", Int(75))])?,
            ],
            None,
        ),
        scanner(
            "Breakout x 2",
            SWING,
            vec![
                baseline("double_breakout", &[])?,
                baseline("volume_spike", &[("min_multiple", Float(2.5))])?,
            ],
            None,
        ),
        scanner(
            "Bullish Reversal",
            SWING,
            vec![
                baseline("bullish_reversal", &[])?,
                baseline("volume_spike", &[("min_multiple", Float(1.5))])?,
            ],
            None,
        ),
        scanner("Golden Cross", SWING, vec![baseline("golden_cross", &[])?], None),
        scanner("Bullish SMA Cross", SWING, vec![baseline("sma_cross", &[])?], None),
        scanner(
            "Heavy Buying",
            DAY,
            vec![
                baseline("volume_spike", &[("min_multiple", Float(3.0))])?,
                baseline("premarket_liquidity", &[])?,
            ],
            None,
        ),
        scanner(
            "Relative Str30",
            DAY,
            vec![baseline(
                "relative_strength",
                &[("lookback_days", Int(30)), ("percentile", Int(80))],
            )?],
            None,
        ),
        scanner(
            "Bullish Explosion",
            DAY,
            vec![
                baseline("intraday_momentum", &[("min_gain_percent", Float(5.0))])?,
                baseline("volume_spike", &[("min_multiple", Float(2.5))])?,
            ],
            None,
        ),
        scanner(
            "Red Hot",
            DAY,
            vec![
                baseline(
                    "multi_day_momentum",
                    &[("green_days", Int(4)), ("require_higher_highs", Bool(true))],
                )?,
                baseline("relative_strength", &[("percentile", Int(85))])?,
            ],
            None,
        ),
        scanner(
            "Breakout",
            DAY,
            vec![baseline("breakout", &[])?, baseline("volume_spike", &[])?],
            None,
        ),
        scanner(
            "Breakout Plus",
            DAY,
            vec![
                baseline(
                    "breakout",
                    &[("lookback_days", Int(40)), ("buffer_percent", Float(0.5))],
                )?,
                baseline("volume_spike", &[("min_multiple", Float(2.0))])?,
                baseline("relative_strength", &[("percentile", Int(75))])?,
            ],
            None,
        ),
        scanner(
            "M15 Gain",
            DAY,
            vec![
                baseline(
                    "intraday_momentum",
                    &[("timeframe_minutes", Int(15)), ("min_gain_percent", Float(2.5))],
                )?,
                baseline("volume_spike", &[("min_multiple", Float(1.8))])?,
            ],
            None,
        ),
        scanner(
            "Bull Run",
            DAY,
            vec![
                baseline("multi_day_momentum", &[("green_days", Int(4))])?,
                baseline(
                    "moving_average_cross",
                    &[("fast_window", Int(8)), ("slow_window", Int(21))],
                )?,
            ],
            None,
        ),
        scanner(
            "Short Squeeze",
            DAY,
            vec![
                baseline("short_squeeze", &[])?,
                baseline("volume_spike", &[("min_multiple", Float(3.0))])?,
            ],
            None,
        ),
    ])
}

/// Every scanner needs at least one baseline, and every baseline key must be known
pub fn validate_scanners(scanners: &[ScannerDefinition]) -> Result<()> {
    if scanners.is_empty() {
        return Err(ScreenerError::ConfigError(
            "At least one scanner definition must be provided".to_string(),
        ));
    }

    let known = baseline_queries();
    for scanner in scanners {
        if scanner.baselines.is_empty() {
            return Err(ScreenerError::ConfigError(format!(
                "Scanner '{}' must include at least one baseline query",
                scanner.name
            )));
        }
        if let Some(unknown) = scanner.baselines.iter().find(|b| !known.contains_key(&b.key)) {
            return Err(ScreenerError::ConfigError(format!(
                "Scanner '{}' references undefined baseline '{}'",
                scanner.name, unknown.key
            )));
        }
    }
    Ok(())
}

fn outcome(key: &str, label: &str, checks: &[(bool, String)]) -> BaselineOutcome {
    let failures: Vec<&str> = checks
        .iter()
        .filter(|(passed, _)| !passed)
        .map(|(_, reason)| reason.as_str())
        .collect();
    let reason = if failures.is_empty() {
        format!("{} satisfied", label)
    } else {
        format!("{} failed: {}", label, failures.join(", "))
    };
    BaselineOutcome {
        key: key.to_string(),
        passed: failures.is_empty(),
        reason,
    }
}

/// Check one baseline against an enriched snapshot
pub fn evaluate_baseline(snapshot: &Snapshot, baseline: &BaselineQuery) -> BaselineOutcome {
    match baseline.key.as_str() {
        "premarket_gap" => {
            let min_gap = baseline.float_param("min_gap_percent");
            let meets_gap = snapshot.gap_percent().map_or(false, |gap| gap >= min_gap);
            let meets_vwap = !baseline.bool_param("require_above_vwap") || snapshot.is_above_vwap();
            outcome(
                &baseline.key,
                "Gap",
                &[
                    (meets_gap, format!("gap<{:.2}%", min_gap)),
                    (meets_vwap, "below VWAP".to_string()),
                ],
            )
        }
        "premarket_liquidity" => {
            let min_rel = baseline.float_param("min_relative_volume");
            let min_abs = baseline.float_param("min_absolute_volume");
            let meets_rel = snapshot.relative_volume().map_or(false, |rv| rv >= min_rel);
            let meets_abs = snapshot.premarket_volume() >= min_abs;
            outcome(
                &baseline.key,
                "Liquidity",
                &[
                    (meets_rel, format!("rel_vol<{:.2}", min_rel)),
                    (meets_abs, format!("volume<{}", (min_abs as u64).to_formatted_string(&Locale::en))),
                ],
            )
        }
        _ => BaselineOutcome {
            key: baseline.key.clone(),
            passed: false,
            reason: "baseline evaluation not supported by available snapshot data".to_string(),
        },
    }
}

/// Evaluate every baseline of `scanner`, in order
pub fn evaluate_scanner(snapshot: &Snapshot, scanner: &ScannerDefinition) -> Vec<BaselineOutcome> {
    scanner
        .baselines
        .iter()
        .map(|baseline| evaluate_baseline(snapshot, baseline))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{Analyzer, PremarketAnalyzer};
    use crate::types::Bar;
    use chrono::{TimeZone, Utc};

    fn enriched(last: f64, premarket_volume: f64) -> Snapshot {
        let as_of = Utc.with_ymd_and_hms(2024, 3, 8, 13, 0, 0).unwrap();
        let bar_time = Utc.with_ymd_and_hms(2024, 3, 8, 12, 0, 0).unwrap();
        let raw = Snapshot::builder("ABCD", as_of)
            .last_price(last)
            .prior_close(10.0)
            .average_daily_volume(100_000.0)
            .premarket_bars(vec![Bar::new(bar_time, 10.5, 10.5, 10.5, 10.5, premarket_volume)])
            .build();
        PremarketAnalyzer::new().enrich(&raw).unwrap()
    }

    #[test]
    fn test_catalogue_is_valid() {
        let scanners = build_scanner_definitions().unwrap();
        assert_eq!(scanners.len(), 24);
        assert!(validate_scanners(&scanners).is_ok());

        let groups: Vec<&str> = scanners.iter().map(|s| s.group.as_str()).collect();
        assert_eq!(groups.iter().filter(|g| **g == "Pre-Open Gainers").count(), 5);
        assert_eq!(groups.iter().filter(|g| **g == "Swing").count(), 10);
        assert_eq!(groups.iter().filter(|g| **g == "Day").count(), 9);
    }

    #[test]
    fn test_overrides_do_not_touch_catalogue() {
        let gap = baseline("premarket_gap", &[("min_gap_percent", 4.0.into())]).unwrap();
        assert_eq!(gap.param("min_gap_percent"), Some(&ParamValue::Float(4.0)));
        assert_eq!(gap.param("require_above_vwap"), Some(&ParamValue::Bool(true)));
        assert_eq!(
            baseline_queries()["premarket_gap"].param("min_gap_percent"),
            Some(&ParamValue::Float(3.0))
        );
        assert!(baseline("nonexistent", &[]).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_catalogues() {
        assert!(validate_scanners(&[]).is_err());

        let empty = scanner("Empty", "Day", Vec::new(), None);
        assert!(validate_scanners(&[empty]).is_err());

        let unknown = scanner(
            "Mystery",
            "Day",
            vec![BaselineQuery::new("moon_phase", "Lunar alignment", &[])],
            None,
        );
        let err = validate_scanners(&[unknown]).unwrap_err();
        assert!(err.to_string().contains("moon_phase"));
    }

    #[test]
    fn test_evaluate_gap_and_liquidity() {
        // gap 10%, vwap 10.5, rel vol 2.0
        let snapshot = enriched(11.0, 200_000.0);
        let gainers = &build_scanner_definitions().unwrap()[0];
        let outcomes = evaluate_scanner(&snapshot, gainers);

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.passed));
        assert_eq!(outcomes[0].reason, "Gap satisfied");
    }

    #[test]
    fn test_evaluate_reports_every_failure() {
        // gap 1%, last below vwap, rel vol 0.5
        let snapshot = enriched(10.1, 50_000.0);
        let gap = evaluate_baseline(&snapshot, &baseline("premarket_gap", &[]).unwrap());
        assert!(!gap.passed);
        assert_eq!(gap.reason, "Gap failed: gap<3.00%, below VWAP");

        let liquidity = evaluate_baseline(&snapshot, &baseline("premarket_liquidity", &[]).unwrap());
        assert_eq!(liquidity.reason, "Liquidity failed: rel_vol<1.50, volume<100,000");
    }

    #[test]
    fn test_unsupported_baseline() {
        let snapshot = enriched(11.0, 200_000.0);
        let outcome = evaluate_baseline(&snapshot, &baseline("golden_cross", &[]).unwrap());
        assert!(!outcome.passed);
        assert_eq!(
            outcome.reason,
            "baseline evaluation not supported by available snapshot data"
        );
    }
}
