//! Screening engine: fetch, enrich, filter and rank every symbol in a universe
//!
//! Each symbol is processed independently. Provider and analyzer errors are
//! caught at the per-symbol boundary and recorded as failing results, so one
//! bad symbol never aborts the run. Only run-level preconditions (empty
//! universe, every symbol unavailable, invalid configuration) are returned as
//! errors.

use crate::analyzer::{Analyzer, PremarketAnalyzer};
use crate::config::ScreenerConfig;
use crate::data::{DataProvider, ProviderRegistry};
use crate::error::{Result, ScreenerError};
use crate::filters::{FilterChain, FilterConfig};
use crate::result::{rank_results, ScreenerResult, INVALID_DATA};
use crate::types::{Symbol, Timestamp};
use crate::universe::Universe;
use rayon::prelude::*;
use std::sync::Arc;

/// How symbols are scheduled within one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// One symbol after another on the calling thread
    #[default]
    Sequential,
    /// Dedicated rayon pool with `workers` threads
    Parallel { workers: usize },
}

/// Orchestrates provider, analyzer and filter chain for one or more runs
pub struct ScreeningEngine {
    provider: Arc<dyn DataProvider>,
    analyzer: Arc<dyn Analyzer>,
    filters: FilterChain,
    criteria: FilterConfig,
    mode: ExecutionMode,
}

impl ScreeningEngine {
    /// Engine with the built-in filters for `criteria`
    pub fn new(
        provider: Arc<dyn DataProvider>,
        analyzer: Arc<dyn Analyzer>,
        criteria: FilterConfig,
    ) -> Result<Self> {
        let filters = FilterChain::from_config(&criteria)?;
        Ok(Self {
            provider,
            analyzer,
            filters,
            criteria,
            mode: ExecutionMode::Sequential,
        })
    }

    /// Engine with a caller-assembled filter chain
    pub fn with_filters(
        provider: Arc<dyn DataProvider>,
        analyzer: Arc<dyn Analyzer>,
        filters: FilterChain,
        criteria: FilterConfig,
    ) -> Result<Self> {
        criteria.validate()?;
        if filters.is_empty() {
            return Err(ScreenerError::ConfigError(
                "filter chain must contain at least one filter".to_string(),
            ));
        }
        Ok(Self {
            provider,
            analyzer,
            filters,
            criteria,
            mode: ExecutionMode::Sequential,
        })
    }

    /// Resolve the configured provider and build a parallel engine sized by
    /// `max_concurrent_requests`
    pub fn from_config(config: &ScreenerConfig, registry: &ProviderRegistry) -> Result<Self> {
        config.validate()?;
        let provider = registry.resolve(&config.data)?;
        let engine = Self::new(provider, Arc::new(PremarketAnalyzer::new()), config.criteria.clone())?;
        Ok(engine.with_mode(ExecutionMode::Parallel {
            workers: config.max_concurrent_requests,
        }))
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn criteria(&self) -> &FilterConfig {
        &self.criteria
    }

    pub fn filters(&self) -> &FilterChain {
        &self.filters
    }

    /// Screen `symbols` at `as_of` and return every result in report order
    pub fn run<S: AsRef<str>>(&self, symbols: &[S], as_of: Timestamp) -> Result<Vec<ScreenerResult>> {
        let universe = Universe::new(symbols)?;
        self.run_universe(&universe, as_of)
    }

    /// Screen an already normalised universe
    pub fn run_universe(&self, universe: &Universe, as_of: Timestamp) -> Result<Vec<ScreenerResult>> {
        if universe.is_empty() {
            return Err(ScreenerError::UniverseEmpty);
        }

        log::info!(
            "Screening {} symbols at {} with provider '{}' ({:?})",
            universe.len(),
            as_of.to_rfc3339(),
            self.provider.name(),
            self.mode
        );

        if let Err(e) = self.provider.warm_cache(universe.symbols(), as_of) {
            log::warn!("Cache warm-up failed for '{}': {}", self.provider.name(), e);
        }

        let mut results = match self.mode {
            ExecutionMode::Parallel { workers } if workers > 1 => {
                self.screen_parallel(universe.symbols(), as_of, workers)?
            }
            _ => universe
                .symbols()
                .iter()
                .map(|symbol| self.screen_symbol(symbol, as_of))
                .collect(),
        };

        let unavailable = results.iter().filter(|r| r.is_unavailable()).count();
        if unavailable == results.len() {
            return Err(ScreenerError::AllSymbolsUnavailable {
                attempted: results.len(),
            });
        }

        rank_results(&mut results);

        let passed = results.iter().filter(|r| r.passed_all()).count();
        let without_data = results.iter().filter(|r| r.is_data_failure()).count();
        log::info!(
            "Screening complete: {} passed, {} failed filters, {} without data",
            passed,
            results.len() - passed - without_data,
            without_data
        );

        Ok(results)
    }

    fn screen_parallel(&self, symbols: &[Symbol], as_of: Timestamp, workers: usize) -> Result<Vec<ScreenerResult>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|idx| format!("screener-worker-{}", idx))
            .build()
            .map_err(|e| ScreenerError::ConfigError(format!("Failed to start worker pool: {}", e)))?;

        Ok(pool.install(|| {
            symbols
                .par_iter()
                .map(|symbol| self.screen_symbol(symbol, as_of))
                .collect()
        }))
    }

    /// Fetch, enrich and filter one symbol; never fails
    fn screen_symbol(&self, symbol: &str, as_of: Timestamp) -> ScreenerResult {
        let raw = match self.provider.fetch(symbol, as_of) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::warn!("{}: {}", symbol, e);
                return ScreenerResult::from_error(symbol, &e);
            }
        };

        if !raw.symbol().eq_ignore_ascii_case(symbol) {
            log::warn!("{}: provider returned a snapshot for {}", symbol, raw.symbol());
            return ScreenerResult::failed(
                symbol,
                INVALID_DATA,
                format!("snapshot symbol {} does not match", raw.symbol()),
            );
        }
        if raw.as_of() != as_of {
            log::warn!("{}: snapshot stamped {} instead of {}", symbol, raw.as_of(), as_of);
            return ScreenerResult::failed(
                symbol,
                INVALID_DATA,
                format!("snapshot as_of {} differs from run as_of {}", raw.as_of().to_rfc3339(), as_of.to_rfc3339()),
            );
        }

        let enriched = match self.analyzer.enrich(&raw) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::warn!("{}: {}", symbol, e);
                return ScreenerResult::from_error(symbol, &e);
            }
        };

        let filter_results = self.filters.evaluate(&enriched, &self.criteria);
        ScreenerResult::evaluated(enriched, filter_results)
    }
}
