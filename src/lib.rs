//! # Premarket Screener
//!
//! Screens a universe of equity tickers before the opening bell and produces
//! a ranked shortlist by pre-market gap, volume, float and VWAP criteria.
//!
//! A run pulls one [`snapshot::Snapshot`] per symbol through a
//! [`data::DataProvider`], derives VWAP and relative volume with an
//! [`analyzer::Analyzer`], evaluates every configured [`filters::Filter`]
//! without short-circuiting, and sorts the results: passers first, then by
//! relative volume, then by symbol. A symbol that cannot be fetched or fails
//! validation is reported, never dropped, and never aborts the run.
//!
//! ## Example
//!
//! ```rust
//! use premarket_screener::prelude::*;
//! use chrono::{TimeZone, Utc};
//! use std::sync::Arc;
//!
//! let as_of = Utc.with_ymd_and_hms(2024, 3, 8, 13, 0, 0).unwrap();
//! let provider = InMemoryProvider::with_snapshots(vec![
//!     Snapshot::builder("ABCD", as_of)
//!         .last_price(11.0)
//!         .prior_close(10.0)
//!         .premarket_volume(500_000.0)
//!         .average_daily_volume(200_000.0)
//!         .float_shares(5_000_000.0)
//!         .build(),
//! ]);
//!
//! let criteria = FilterConfig {
//!     min_gap_percent: 5.0,
//!     min_relative_volume: 2.0,
//!     min_float_shares: None,
//!     max_float_shares: Some(10_000_000.0),
//!     require_above_vwap: false,
//!     ..FilterConfig::default()
//! };
//! let engine = ScreeningEngine::new(
//!     Arc::new(provider),
//!     Arc::new(PremarketAnalyzer::new()),
//!     criteria,
//! )?;
//!
//! let results = engine.run(&["ABCD"], as_of)?;
//! assert!(results[0].passed_all());
//! # Ok::<(), ScreenerError>(())
//! ```

pub mod analyzer;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod filters;
pub mod report;
pub mod result;
pub mod scanners;
pub mod session;
pub mod snapshot;
pub mod types;
pub mod universe;

pub mod prelude {
    //! Commonly used types and traits
    pub use crate::analyzer::{Analyzer, PremarketAnalyzer};
    pub use crate::config::ScreenerConfig;
    pub use crate::data::{DataProvider, InMemoryProvider, ProviderRegistry};
    pub use crate::engine::{ExecutionMode, ScreeningEngine};
    pub use crate::error::{Result, ScreenerError};
    pub use crate::filters::{Filter, FilterChain, FilterConfig, FilterResult, GapDirection};
    pub use crate::result::ScreenerResult;
    pub use crate::snapshot::Snapshot;
    pub use crate::types::*;
}
