//! Per-symbol screening outcome and ranking

use crate::error::ScreenerError;
use crate::filters::FilterResult;
use crate::snapshot::Snapshot;
use crate::types::Symbol;
use serde::Serialize;
use std::cmp::Ordering;

/// Criterion recorded when the provider cannot supply a snapshot
pub const DATA_UNAVAILABLE: &str = "data_unavailable";

/// Criterion recorded when the raw snapshot fails validation
pub const INVALID_DATA: &str = "invalid_data";

/// Outcome for a single symbol after fetch, enrichment and filtering
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreenerResult {
    symbol: Symbol,
    snapshot: Option<Snapshot>,
    filter_results: Vec<FilterResult>,
    passed_all: bool,
    rank: usize,
}

impl ScreenerResult {
    /// Result for a symbol whose enriched snapshot went through the filter chain
    pub fn evaluated(snapshot: Snapshot, filter_results: Vec<FilterResult>) -> Self {
        let passed_all = !filter_results.is_empty() && filter_results.iter().all(|r| r.passed);
        Self {
            symbol: snapshot.symbol().to_string(),
            snapshot: Some(snapshot),
            filter_results,
            passed_all,
            rank: 0,
        }
    }

    /// Synthetic failing result for a symbol that never reached the filters
    pub fn failed(symbol: impl Into<Symbol>, criterion: &str, detail: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            snapshot: None,
            filter_results: vec![FilterResult::fail(criterion, detail)],
            passed_all: false,
            rank: 0,
        }
    }

    /// Map a symbol-local error onto its synthetic criterion
    pub fn from_error(symbol: impl Into<Symbol>, error: &ScreenerError) -> Self {
        let criterion = match error {
            ScreenerError::InvalidSnapshot { .. } => INVALID_DATA,
            _ => DATA_UNAVAILABLE,
        };
        let detail = match error {
            ScreenerError::DataUnavailable { reason, .. }
            | ScreenerError::InvalidSnapshot { reason, .. } => reason.clone(),
            other => other.to_string(),
        };
        Self::failed(symbol, criterion, detail)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    pub fn filter_results(&self) -> &[FilterResult] {
        &self.filter_results
    }

    pub fn passed_all(&self) -> bool {
        self.passed_all
    }

    /// 1-based position in the sorted run output, 0 before ranking
    pub fn rank(&self) -> usize {
        self.rank
    }

    pub(crate) fn set_rank(&mut self, rank: usize) {
        self.rank = rank;
    }

    pub fn failed_criteria(&self) -> impl Iterator<Item = &FilterResult> {
        self.filter_results.iter().filter(|r| !r.passed)
    }

    /// True when the symbol never produced a usable snapshot
    pub fn is_data_failure(&self) -> bool {
        self.snapshot.is_none()
    }

    /// True when the provider could not supply a snapshot at all
    pub fn is_unavailable(&self) -> bool {
        self.snapshot.is_none()
            && self
                .filter_results
                .iter()
                .any(|r| r.name == DATA_UNAVAILABLE)
    }

    pub fn relative_volume(&self) -> Option<f64> {
        self.snapshot.as_ref().and_then(|s| s.relative_volume())
    }

    pub fn rank_key(&self) -> RankKey<'_> {
        RankKey {
            passed_all: self.passed_all,
            relative_volume: if self.passed_all {
                self.relative_volume()
            } else {
                None
            },
            symbol: &self.symbol,
        }
    }
}

/// Sort key: passers first, then relative volume descending among passers, then symbol ascending
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankKey<'a> {
    pub passed_all: bool,
    pub relative_volume: Option<f64>,
    pub symbol: &'a str,
}

impl Eq for RankKey<'_> {}

impl Ord for RankKey<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .passed_all
            .cmp(&self.passed_all)
            .then_with(|| compare_volume_desc(self.relative_volume, other.relative_volume))
            .then_with(|| self.symbol.cmp(other.symbol))
    }
}

impl PartialOrd for RankKey<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Present values before absent ones, larger first
fn compare_volume_desc(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Sort results into report order and assign 1-based ranks
pub fn rank_results(results: &mut [ScreenerResult]) {
    results.sort_by(|a, b| a.rank_key().cmp(&b.rank_key()));
    for (idx, result) in results.iter_mut().enumerate() {
        result.set_rank(idx + 1);
    }
}
