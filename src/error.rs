//! Error types for the pre-market screener

use thiserror::Error;

/// Main error type for the screener
#[derive(Error, Debug)]
pub enum ScreenerError {
    /// Provider could not produce a snapshot for the symbol at the requested instant
    #[error("Data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    /// Raw snapshot failed validation before enrichment
    #[error("Invalid snapshot for {symbol}: {reason}")]
    InvalidSnapshot { symbol: String, reason: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Universe is empty: at least one symbol must be provided")]
    UniverseEmpty,

    #[error("Provider unreachable: data unavailable for all {attempted} symbols")]
    AllSymbolsUnavailable { attempted: usize },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

impl ScreenerError {
    pub fn data_unavailable(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DataUnavailable {
            symbol: symbol.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_snapshot(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSnapshot {
            symbol: symbol.into(),
            reason: reason.into(),
        }
    }

    /// True for errors the engine absorbs into a failing per-symbol result
    pub fn is_symbol_local(&self) -> bool {
        matches!(
            self,
            Self::DataUnavailable { .. } | Self::InvalidSnapshot { .. }
        )
    }
}

/// Result type alias for screener operations
pub type Result<T> = std::result::Result<T, ScreenerError>;
