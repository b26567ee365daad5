//! Report rendering and export
//!
//! Results arrive already ranked; this module only formats them.

use crate::error::Result;
use crate::result::{ScreenerResult, DATA_UNAVAILABLE, INVALID_DATA};
use crate::types::{Percent, Symbol, Timestamp, Volume};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};
use num_format::{Locale, ToFormattedString};
use serde::{Deserialize, Serialize};
use std::io::Write;
use uuid::Uuid;

/// One printable line per screened symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub rank: usize,
    pub symbol: Symbol,
    pub gap_percent: Option<Percent>,
    pub premarket_volume: Option<Volume>,
    pub relative_volume: Option<f64>,
    pub vwap: Option<f64>,
    pub float_shares: Option<Volume>,
    pub notes: String,
}

impl From<&ScreenerResult> for ReportRow {
    fn from(result: &ScreenerResult) -> Self {
        let snapshot = result.snapshot();
        Self {
            rank: result.rank(),
            symbol: result.symbol().to_string(),
            gap_percent: snapshot.and_then(|s| s.gap_percent()).map(round2),
            premarket_volume: snapshot.map(|s| s.premarket_volume()),
            relative_volume: snapshot.and_then(|s| s.relative_volume()).map(round2),
            vwap: snapshot.and_then(|s| s.vwap()).map(round2),
            float_shares: snapshot.and_then(|s| s.float_shares()),
            notes: notes(result),
        }
    }
}

fn notes(result: &ScreenerResult) -> String {
    if result.passed_all() {
        return "PASS".to_string();
    }

    let failures: Vec<String> = result
        .failed_criteria()
        .map(|f| match f.detail.as_deref() {
            Some(detail) => format!("{} ({})", f.name, detail),
            None => f.name.clone(),
        })
        .collect();

    let synthetic = result
        .failed_criteria()
        .any(|f| f.name == DATA_UNAVAILABLE || f.name == INVALID_DATA);
    if synthetic {
        format!("error: {}", failures.join("; "))
    } else {
        format!("Fail: {}", failures.join("; "))
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn fmt_volume(value: Option<Volume>) -> String {
    value
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| (v.round() as u64).to_formatted_string(&Locale::en))
        .unwrap_or_default()
}

fn fmt_decimal(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_default()
}

pub fn rows(results: &[ScreenerResult]) -> Vec<ReportRow> {
    results.iter().map(ReportRow::from).collect()
}

/// Console table; absent metrics render as empty cells
pub fn render_table(rows: &[ReportRow]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            "#", "Symbol", "Gap %", "Premkt Vol", "Rel Vol", "VWAP", "Float", "Notes",
        ]);

    for row in rows {
        table.add_row(vec![
            Cell::new(row.rank).set_alignment(CellAlignment::Right),
            Cell::new(&row.symbol),
            Cell::new(fmt_decimal(row.gap_percent)).set_alignment(CellAlignment::Right),
            Cell::new(fmt_volume(row.premarket_volume)).set_alignment(CellAlignment::Right),
            Cell::new(fmt_decimal(row.relative_volume)).set_alignment(CellAlignment::Right),
            Cell::new(fmt_decimal(row.vwap)).set_alignment(CellAlignment::Right),
            Cell::new(fmt_volume(row.float_shares)).set_alignment(CellAlignment::Right),
            Cell::new(&row.notes),
        ]);
    }

    table.to_string()
}

/// Machine-readable run report
#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub run_id: Uuid,
    pub as_of: Timestamp,
    pub provider: String,
    pub total: usize,
    pub passed: usize,
    pub rows: Vec<ReportRow>,
    pub results: &'a [ScreenerResult],
}

impl<'a> Report<'a> {
    pub fn new(results: &'a [ScreenerResult], as_of: Timestamp, provider: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            as_of,
            provider: provider.into(),
            total: results.len(),
            passed: results.iter().filter(|r| r.passed_all()).count(),
            rows: rows(results),
            results,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Write rows as CSV with a header line
pub fn write_csv<W: Write>(rows: &[ReportRow], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Process exit code: 0 when at least one symbol passed every filter, else 1
pub fn exit_code(results: &[ScreenerResult]) -> i32 {
    if results.iter().any(|r| r.passed_all()) {
        0
    } else {
        1
    }
}
