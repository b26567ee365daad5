//! Core types and constants

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp type used throughout the library
pub type Timestamp = DateTime<Utc>;

/// Ticker identifier
pub type Symbol = String;

/// Price type
pub type Price = f64;

/// Share volume type
pub type Volume = f64;

/// Percentage expressed in points (5.0 == 5%)
pub type Percent = f64;

/// OHLCV bar data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: Timestamp,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub volume: Volume,
}

impl Bar {
    /// Create a new bar
    pub fn new(
        timestamp: Timestamp,
        open: Price,
        high: Price,
        low: Price,
        close: Price,
        volume: Volume,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Get typical price (HLC/3)
    pub fn typical_price(&self) -> Price {
        (self.high + self.low + self.close) / 3.0
    }

    /// Check that prices and volume are finite and non-negative
    pub fn is_well_formed(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0)
            && self.low <= self.high
    }
}
