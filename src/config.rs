//! Screener configuration
//!
//! Loaded from JSON, YAML or TOML (chosen by file extension). Every field has a
//! default, so a file only needs the settings it changes:
//!
//! ```toml
//! max_concurrent_requests = 4
//!
//! [universe]
//! symbols = ["ABCD", "WXYZ"]
//!
//! [criteria]
//! min_gap_percent = 5.0
//! min_relative_volume = 2.0
//!
//! [data]
//! provider = "polygon"
//! provider_options = { api_key_env = "POLYGON_API_KEY" }
//! ```

use crate::error::{Result, ScreenerError};
use crate::filters::FilterConfig;
use crate::session::PremarketWindow;
use crate::types::{Symbol, Timestamp};
use crate::universe::{self, Universe};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration consumed by the engine and the CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenerConfig {
    pub universe: UniverseSettings,
    pub criteria: FilterConfig,
    pub data: DataSettings,
    pub max_concurrent_requests: usize,
    /// Fixed evaluation instant; `None` means "now" at run time
    pub as_of: Option<Timestamp>,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            universe: UniverseSettings::default(),
            criteria: FilterConfig::default(),
            data: DataSettings::default(),
            max_concurrent_requests: 8,
            as_of: None,
        }
    }
}

/// Which symbols to screen
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UniverseSettings {
    pub symbols: Vec<Symbol>,
    /// Used when `symbols` is empty
    pub catalog: Option<CatalogSettings>,
}

/// Market-cap trimmed slice of the ticker catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSettings {
    pub path: PathBuf,
    #[serde(default)]
    pub market_cap_from: Option<u64>,
    #[serde(default)]
    pub market_cap_to: Option<u64>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Data acquisition settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub provider: String,
    pub premarket_window_start: String,
    pub premarket_window_end: String,
    pub timezone: String,
    pub fetch_timeout_secs: Option<u64>,
    pub provider_options: BTreeMap<String, String>,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            provider: "yahoo".to_string(),
            premarket_window_start: "04:00".to_string(),
            premarket_window_end: "09:29".to_string(),
            timezone: "US/Eastern".to_string(),
            fetch_timeout_secs: None,
            provider_options: BTreeMap::new(),
        }
    }
}

impl DataSettings {
    pub fn premarket_window(&self) -> Result<PremarketWindow> {
        PremarketWindow::parse(
            &self.premarket_window_start,
            &self.premarket_window_end,
            &self.timezone,
        )
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_secs.map(Duration::from_secs)
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.provider_options.get(key).map(String::as_str)
    }
}

impl ScreenerConfig {
    /// Configuration screening `symbols` with default thresholds
    pub fn from_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Symbol>,
    {
        Self {
            universe: UniverseSettings {
                symbols: symbols.into_iter().map(Into::into).collect(),
                catalog: None,
            },
            ..Self::default()
        }
    }

    /// Load and validate a `.json`, `.yaml`/`.yml` or `.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match extension.as_deref() {
            Some("json") => Self::from_json_str(&contents),
            Some("yaml") | Some("yml") => Self::from_yaml_str(&contents),
            Some("toml") => Self::from_toml_str(&contents),
            other => Err(ScreenerError::ConfigError(format!(
                "Unsupported configuration format {:?} for {} (expected .json, .yaml or .toml)",
                other.unwrap_or(""),
                path.display()
            ))),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ScreenerError::ConfigError(format!("Failed to parse JSON config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)
            .map_err(|e| ScreenerError::ConfigError(format!("Failed to parse YAML config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| ScreenerError::ConfigError(format!("Failed to parse TOML config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check thresholds, data settings and concurrency. The universe is checked when resolved.
    pub fn validate(&self) -> Result<()> {
        self.criteria.validate()?;
        self.data.premarket_window()?;

        if self.data.provider.trim().is_empty() {
            return Err(ScreenerError::ConfigError(
                "data.provider must not be empty".to_string(),
            ));
        }
        if self.data.fetch_timeout_secs == Some(0) {
            return Err(ScreenerError::ConfigError(
                "data.fetch_timeout_secs must be positive".to_string(),
            ));
        }
        if self.max_concurrent_requests == 0 {
            return Err(ScreenerError::ConfigError(
                "max_concurrent_requests must be positive".to_string(),
            ));
        }
        if let Some(catalog) = &self.universe.catalog {
            if let (Some(from), Some(to)) = (catalog.market_cap_from, catalog.market_cap_to) {
                if from > to {
                    return Err(ScreenerError::ConfigError(format!(
                        "catalog market_cap_from {} exceeds market_cap_to {}",
                        from, to
                    )));
                }
            }
        }
        Ok(())
    }

    /// Evaluation instant for this run
    pub fn as_of_or_now(&self) -> Timestamp {
        self.as_of.unwrap_or_else(Utc::now)
    }

    /// Symbols from the config, or the catalog slice when none are listed
    pub fn resolve_universe(&self) -> Result<Universe> {
        if !self.universe.symbols.is_empty() {
            return Universe::new(&self.universe.symbols);
        }

        match &self.universe.catalog {
            Some(catalog) => {
                let records = universe::load_catalog(&catalog.path)?;
                let symbols = universe::select_symbols(
                    &records,
                    catalog.market_cap_from,
                    catalog.market_cap_to,
                    catalog.limit,
                );
                Universe::new(symbols)
            }
            None => Err(ScreenerError::UniverseEmpty),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{FilterKind, GapDirection};
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = ScreenerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.data.provider, "yahoo");
        assert_eq!(config.max_concurrent_requests, 8);
    }

    #[test]
    fn test_from_json_partial() {
        let config = ScreenerConfig::from_json_str(
            r#"{
                "universe": {"symbols": ["abcd", "wxyz"]},
                "criteria": {"min_gap_percent": 5.0, "gap_direction": "up",
                             "filters": ["gap_size", "relative_volume"]},
                "data": {"provider": "in_memory", "provider_options": {"path": "fixtures.json"}},
                "as_of": "2024-03-08T13:00:00Z"
            }"#,
        )
        .unwrap();

        assert_eq!(config.criteria.min_gap_percent, 5.0);
        assert_eq!(config.criteria.gap_direction, GapDirection::Up);
        assert_eq!(config.criteria.min_relative_volume, 1.5);
        assert_eq!(
            config.criteria.filters,
            vec![FilterKind::Gap, FilterKind::RelativeVolume]
        );
        assert_eq!(config.data.option("path"), Some("fixtures.json"));
        assert_eq!(config.data.timezone, "US/Eastern");
        assert_eq!(
            config.as_of_or_now().to_rfc3339(),
            "2024-03-08T13:00:00+00:00"
        );
        assert_eq!(config.resolve_universe().unwrap().symbols(), &["ABCD", "WXYZ"]);
    }

    #[test]
    fn test_from_toml() {
        let config = ScreenerConfig::from_toml_str(
            r#"
            max_concurrent_requests = 2

            [universe]
            symbols = ["ABCD"]

            [criteria]
            min_float_shares = 1000000.0
            max_float_shares = 20000000.0

            [data]
            provider = "polygon"
            fetch_timeout_secs = 5
            provider_options = { api_key_env = "MY_KEY" }
            "#,
        )
        .unwrap();

        assert_eq!(config.max_concurrent_requests, 2);
        assert_eq!(config.criteria.max_float_shares, Some(20_000_000.0));
        assert_eq!(config.data.fetch_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.data.option("api_key_env"), Some("MY_KEY"));
    }

    #[test]
    fn test_contradictory_thresholds_rejected() {
        let err = ScreenerConfig::from_json_str(
            r#"{"criteria": {"min_float_shares": 50.0, "max_float_shares": 10.0}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ScreenerError::ConfigError(_)));
    }

    #[test]
    fn test_bad_window_and_concurrency_rejected() {
        assert!(ScreenerConfig::from_json_str(r#"{"data": {"premarket_window_start": "25:00"}}"#).is_err());
        assert!(ScreenerConfig::from_json_str(r#"{"data": {"timezone": "Nowhere/City"}}"#).is_err());
        assert!(ScreenerConfig::from_json_str(r#"{"max_concurrent_requests": 0}"#).is_err());
        assert!(ScreenerConfig::from_json_str(r#"{"data": {"fetch_timeout_secs": 0}}"#).is_err());
    }

    #[test]
    fn test_load_by_extension() {
        let mut json = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(json, r#"{{"universe": {{"symbols": ["ABCD"]}}}}"#).unwrap();
        assert!(ScreenerConfig::load(json.path()).is_ok());

        let mut ini = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        write!(ini, "[universe]").unwrap();
        assert!(matches!(
            ScreenerConfig::load(ini.path()).unwrap_err(),
            ScreenerError::ConfigError(_)
        ));
    }

    #[test]
    fn test_load_yaml() {
        let mut yaml = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        write!(
            yaml,
            "universe:\n  symbols: [abcd, WXYZ]\ncriteria:\n  min_gap_percent: 4.5\n  gap_direction: up\n  filters: [gap_size, above_vwap]\ndata:\n  provider: in_memory\n  provider_options:\n    path: fixtures.json\nmax_concurrent_requests: 2\n"
        )
        .unwrap();

        let config = ScreenerConfig::load(yaml.path()).unwrap();
        assert_eq!(config.universe.symbols, vec!["abcd", "WXYZ"]);
        assert_eq!(config.criteria.min_gap_percent, 4.5);
        assert_eq!(config.criteria.gap_direction, GapDirection::Up);
        assert_eq!(config.criteria.filters, vec![FilterKind::Gap, FilterKind::AboveVwap]);
        assert_eq!(config.data.option("path"), Some("fixtures.json"));
        assert_eq!(config.max_concurrent_requests, 2);
        assert_eq!(config.resolve_universe().unwrap().symbols(), ["ABCD", "WXYZ"]);

        let err = ScreenerConfig::from_yaml_str("criteria:\n  min_relative_volume: -1\n").unwrap_err();
        assert!(matches!(err, ScreenerError::ConfigError(_)));
    }

    #[test]
    fn test_resolve_universe_from_catalog() {
        let mut csv = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write!(
            csv,
            "ticker,market_cap_num\nAAA,100\nBBB,5000\nCCC,200\nDDD,300\n"
        )
        .unwrap();

        let config = ScreenerConfig {
            universe: UniverseSettings {
                symbols: Vec::new(),
                catalog: Some(CatalogSettings {
                    path: csv.path().to_path_buf(),
                    market_cap_from: Some(150),
                    market_cap_to: Some(1000),
                    limit: None,
                }),
            },
            ..ScreenerConfig::default()
        };
        let universe = config.resolve_universe().unwrap();
        assert_eq!(universe.symbols(), &["CCC", "DDD"]);
    }

    #[test]
    fn test_resolve_universe_empty() {
        let config = ScreenerConfig::default();
        assert!(matches!(
            config.resolve_universe().unwrap_err(),
            ScreenerError::UniverseEmpty
        ));
    }
}
