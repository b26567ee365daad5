//! Derived analytics over raw provider snapshots
//!
//! - VWAP over the pre-market bar sequence up to `as_of`
//! - Relative volume: pre-market volume over average daily volume
//!
//! Missing inputs produce absent metrics. Only malformed snapshots are errors.

use crate::error::{Result, ScreenerError};
use crate::snapshot::Snapshot;
use crate::types::{Bar, Price, Timestamp, Volume};
use statrs::statistics::Statistics;

/// Produces an enriched copy of a raw snapshot
pub trait Analyzer: Send + Sync {
    /// Validate `snapshot` and return a new value with derived fields populated
    fn enrich(&self, snapshot: &Snapshot) -> Result<Snapshot>;

    fn name(&self) -> &str {
        "Analyzer"
    }
}

/// Default analyzer: VWAP from typical bar prices, relative volume against the daily average
#[derive(Debug, Clone, Copy, Default)]
pub struct PremarketAnalyzer;

impl PremarketAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl Analyzer for PremarketAnalyzer {
    fn enrich(&self, snapshot: &Snapshot) -> Result<Snapshot> {
        validate(snapshot)?;

        let vwap = if snapshot.premarket_volume() > 0.0 {
            compute_vwap(snapshot.premarket_bars(), snapshot.as_of())
        } else {
            None
        };
        let rel_vol = relative_volume(snapshot.premarket_volume(), snapshot.average_daily_volume());

        log::debug!(
            "{}: vwap={:?} relative_volume={:?}",
            snapshot.symbol(),
            vwap,
            rel_vol
        );

        Ok(snapshot.with_derived(vwap, rel_vol))
    }

    fn name(&self) -> &str {
        "PremarketAnalyzer"
    }
}

/// Volume-weighted average of typical price over bars stamped at or before `as_of`
pub fn compute_vwap(bars: &[Bar], as_of: Timestamp) -> Option<Price> {
    let (price_volume, volume) = bars
        .iter()
        .filter(|bar| bar.timestamp <= as_of)
        .fold((0.0, 0.0), |(pv, v), bar| {
            (pv + bar.typical_price() * bar.volume, v + bar.volume)
        });

    if volume > 0.0 {
        Some(price_volume / volume)
    } else {
        None
    }
}

/// Ratio of pre-market volume to average daily volume; `None` when the average is missing or zero
pub fn relative_volume(premarket_volume: Volume, average_daily_volume: Option<Volume>) -> Option<f64> {
    match average_daily_volume {
        Some(avg) if avg > 0.0 && avg.is_finite() => Some(premarket_volume / avg),
        _ => None,
    }
}

/// Mean of daily volume samples; `None` for an empty sample
pub fn average_daily_volume(samples: &[Volume]) -> Option<Volume> {
    if samples.is_empty() {
        return None;
    }
    Some(samples.iter().mean())
}

fn validate(snapshot: &Snapshot) -> Result<()> {
    let symbol = snapshot.symbol();
    let invalid = |reason: String| -> Result<()> {
        Err(ScreenerError::invalid_snapshot(symbol, reason))
    };

    if symbol.trim().is_empty() {
        return Err(ScreenerError::invalid_snapshot("<blank>", "missing symbol"));
    }

    let required = [
        ("last_price", snapshot.last_price()),
        ("prior_close", snapshot.prior_close()),
        ("premarket_volume", snapshot.premarket_volume()),
    ];
    let optional = [
        ("premarket_high", snapshot.premarket_high()),
        ("premarket_low", snapshot.premarket_low()),
        ("average_daily_volume", snapshot.average_daily_volume()),
        ("float_shares", snapshot.float_shares()),
    ];

    for (field, value) in required
        .into_iter()
        .chain(optional.into_iter().filter_map(|(f, v)| v.map(|v| (f, v))))
    {
        if !value.is_finite() {
            return invalid(format!("{} is not a finite number", field));
        }
        if value < 0.0 {
            return invalid(format!("{} is negative ({})", field, value));
        }
    }

    if let (Some(low), Some(high)) = (snapshot.premarket_low(), snapshot.premarket_high()) {
        if low > high {
            return invalid(format!("premarket_low {} above premarket_high {}", low, high));
        }
    }

    if let Some(idx) = snapshot.premarket_bars().iter().position(|b| !b.is_well_formed()) {
        return invalid(format!("premarket bar {} is malformed", idx));
    }

    Ok(())
}
