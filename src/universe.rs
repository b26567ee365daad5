//! Ticker universe: normalisation and the static CSV catalog
//!
//! The catalog is a CSV file with at least the columns `ticker` and
//! `market_cap_num`. Rows with a blank ticker or an unparsable market cap are
//! skipped when trimming to a market-cap band.

use crate::error::{Result, ScreenerError};
use crate::types::Symbol;
use hashbrown::HashSet;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

/// Ordered set of unique, upper-cased ticker symbols
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Universe {
    symbols: Vec<Symbol>,
}

impl Universe {
    /// Trim and upper-case `symbols`, dropping duplicates (first occurrence wins).
    ///
    /// Fails with `UniverseEmpty` for an empty input and `ConfigError` for a blank entry.
    pub fn new<I, S>(symbols: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut cleaned: Vec<Symbol> = Vec::new();
        let mut seen = HashSet::new();
        for (idx, raw) in symbols.into_iter().enumerate() {
            let symbol = raw.as_ref().trim().to_uppercase();
            if symbol.is_empty() {
                return Err(ScreenerError::ConfigError(format!(
                    "Empty symbol at position {} after stripping whitespace",
                    idx
                )));
            }
            if seen.insert(symbol.clone()) {
                cleaned.push(symbol);
            }
        }

        if cleaned.is_empty() {
            return Err(ScreenerError::UniverseEmpty);
        }
        Ok(Self { symbols: cleaned })
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// One row of the ticker catalog
#[derive(Debug, Clone, PartialEq)]
pub struct TickerRecord {
    pub symbol: Symbol,
    pub market_cap: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct CatalogRow {
    #[serde(default)]
    ticker: String,
    #[serde(default)]
    market_cap_num: Option<String>,
}

/// Parse every catalog row from a CSV reader
pub fn read_catalog<R: Read>(reader: R) -> Result<Vec<TickerRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let mut records = Vec::new();

    for row in csv_reader.deserialize() {
        let row: CatalogRow = row?;
        let symbol = row.ticker.trim().to_uppercase();
        if symbol.is_empty() {
            continue;
        }
        let market_cap = row.market_cap_num.as_deref().and_then(parse_market_cap);
        if market_cap.is_none() {
            log::debug!("Unable to parse market cap for {}: {:?}", symbol, row.market_cap_num);
        }
        records.push(TickerRecord { symbol, market_cap });
    }

    Ok(records)
}

/// Load the catalog from a CSV file
pub fn load_catalog(path: &Path) -> Result<Vec<TickerRecord>> {
    let file = std::fs::File::open(path)?;
    read_catalog(file)
}

/// Symbols whose market cap lies in `[market_cap_from, market_cap_to]`, up to `limit`
pub fn select_symbols(
    records: &[TickerRecord],
    market_cap_from: Option<u64>,
    market_cap_to: Option<u64>,
    limit: Option<usize>,
) -> Vec<Symbol> {
    let selected: Vec<Symbol> = records
        .iter()
        .filter_map(|record| record.market_cap.map(|cap| (record, cap)))
        .filter(|(_, cap)| market_cap_from.map_or(true, |from| *cap >= from))
        .filter(|(_, cap)| market_cap_to.map_or(true, |to| *cap <= to))
        .map(|(record, _)| record.symbol.clone())
        .take(limit.unwrap_or(usize::MAX))
        .collect();

    log::debug!(
        "Selected {} symbols from catalog (market cap {:?}..{:?}, limit {:?})",
        selected.len(),
        market_cap_from,
        market_cap_to,
        limit
    );
    selected
}

/// Lenient market-cap parsing: thousands separators and scientific notation are accepted
fn parse_market_cap(value: &str) -> Option<u64> {
    let normalized = value.trim().replace(',', "");
    if normalized.is_empty() {
        return None;
    }
    if let Ok(cap) = normalized.parse::<u64>() {
        return Some(cap);
    }
    normalized
        .parse::<f64>()
        .ok()
        .filter(|cap| cap.is_finite() && *cap >= 0.0)
        .map(|cap| cap as u64)
}
