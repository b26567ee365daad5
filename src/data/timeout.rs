//! Per-fetch deadline for any provider
//!
//! Each fetch runs on a short-lived thread; when the deadline passes first the
//! symbol is reported as `DataUnavailable` and the late answer is discarded.
//! The abandoned thread runs until the inner fetch returns, so this is a
//! backstop for providers without a request timeout of their own. The registry
//! skips it for providers whose `enforces_timeout` is true.

use super::DataProvider;
use crate::error::{Result, ScreenerError};
use crate::snapshot::Snapshot;
use crate::types::{Symbol, Timestamp};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Wraps a provider so that no single fetch exceeds `timeout`
pub struct TimeoutProvider {
    inner: Arc<dyn DataProvider>,
    timeout: Duration,
    name: String,
}

impl TimeoutProvider {
    pub fn new(inner: Arc<dyn DataProvider>, timeout: Duration) -> Self {
        let name = format!("{} (timeout {:?})", inner.name(), timeout);
        Self {
            inner,
            timeout,
            name,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl DataProvider for TimeoutProvider {
    fn fetch(&self, symbol: &str, as_of: Timestamp) -> Result<Snapshot> {
        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let owned_symbol = symbol.to_string();

        thread::Builder::new()
            .name(format!("fetch-{}", symbol))
            .spawn(move || {
                // Receiver may be gone after a timeout
                let _ = tx.send(inner.fetch(&owned_symbol, as_of));
            })
            .map_err(|e| {
                ScreenerError::data_unavailable(symbol, format!("failed to spawn fetch: {}", e))
            })?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(ScreenerError::data_unavailable(
                symbol,
                format!("fetch timed out after {:?}", self.timeout),
            )),
            Err(RecvTimeoutError::Disconnected) => Err(ScreenerError::data_unavailable(
                symbol,
                "provider worker terminated without a response",
            )),
        }
    }

    fn warm_cache(&self, symbols: &[Symbol], as_of: Timestamp) -> Result<()> {
        self.inner.warm_cache(symbols, as_of)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
