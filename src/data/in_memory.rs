//! In-memory snapshot provider
//!
//! Serves pre-seeded snapshots keyed by symbol, giving deterministic,
//! network-free runs. Unknown symbols fail with `DataUnavailable`, the same
//! error a live provider raises for a delisted ticker.
//!
//! # Example
//! ```
//! use premarket_screener::data::{DataProvider, InMemoryProvider};
//! use premarket_screener::snapshot::Snapshot;
//! use chrono::Utc;
//!
//! let now = Utc::now();
//! let mut provider = InMemoryProvider::new();
//! provider.insert(Snapshot::builder("ABCD", now).last_price(11.0).prior_close(10.0).build());
//!
//! assert!(provider.fetch("ABCD", now).is_ok());
//! assert!(provider.fetch("MISSING", now).is_err());
//! ```

use super::DataProvider;
use crate::error::{Result, ScreenerError};
use crate::snapshot::Snapshot;
use crate::types::Timestamp;
use hashbrown::HashMap;
use std::fs;
use std::path::Path;

/// Provider backed by a symbol -> snapshot map
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    snapshots: HashMap<String, Snapshot>,
}

impl InMemoryProvider {
    /// Create an empty provider
    pub fn new() -> Self {
        Self {
            snapshots: HashMap::new(),
        }
    }

    /// Create a provider seeded with `snapshots`; later duplicates replace earlier ones
    pub fn with_snapshots(snapshots: impl IntoIterator<Item = Snapshot>) -> Self {
        let mut provider = Self::new();
        for snapshot in snapshots {
            provider.insert(snapshot);
        }
        provider
    }

    /// Load a JSON array of snapshots
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let provider = Self::from_json_str(&contents)?;
        log::debug!("Loaded {} fixture snapshots from {}", provider.len(), path.display());
        Ok(provider)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let snapshots: Vec<Snapshot> = serde_json::from_str(json)?;
        Ok(Self::with_snapshots(snapshots))
    }

    /// Seed or replace the snapshot for its symbol
    pub fn insert(&mut self, snapshot: Snapshot) {
        self.snapshots
            .insert(snapshot.symbol().to_uppercase(), snapshot);
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl DataProvider for InMemoryProvider {
    fn fetch(&self, symbol: &str, as_of: Timestamp) -> Result<Snapshot> {
        self.snapshots
            .get(&symbol.to_uppercase())
            .map(|snapshot| snapshot.at(as_of))
            .ok_or_else(|| ScreenerError::data_unavailable(symbol, "no snapshot seeded for symbol"))
    }

    fn name(&self) -> &str {
        "in_memory"
    }
}
