//! Market data providers
//!
//! The engine depends only on the [`DataProvider`] trait. Concrete providers
//! are resolved by name through a [`ProviderRegistry`] built once per process.
//!
//! # Components
//!
//! - **in_memory**: Pre-seeded snapshots for tests and offline fixtures
//! - **timeout**: Decorator bounding each fetch by a wall-clock deadline
//! - **registry**: Name to factory mapping
//! - **sources**: Yahoo Finance and Polygon.io (feature `providers`)

pub mod in_memory;
pub mod registry;
#[cfg(feature = "providers")]
pub mod sources;
pub mod timeout;

pub use in_memory::InMemoryProvider;
pub use registry::{ProviderFactory, ProviderRegistry};
pub use timeout::TimeoutProvider;

use crate::error::Result;
use crate::snapshot::Snapshot;
use crate::types::{Symbol, Timestamp};

/// Source of raw per-symbol snapshots
///
/// Implementations must be callable independently per symbol; the engine may
/// invoke `fetch` from several worker threads at once.
pub trait DataProvider: Send + Sync {
    /// Raw snapshot for `symbol` at `as_of`, or `ScreenerError::DataUnavailable`
    fn fetch(&self, symbol: &str, as_of: Timestamp) -> Result<Snapshot>;

    /// Optional pre-fetch hook called once per run before any `fetch`
    fn warm_cache(&self, _symbols: &[Symbol], _as_of: Timestamp) -> Result<()> {
        Ok(())
    }

    /// True when every fetch is already bounded by the provider's own request timeout
    fn enforces_timeout(&self) -> bool {
        false
    }

    /// Provider name for logs
    fn name(&self) -> &str;
}
