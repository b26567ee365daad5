//! Provider registry - resolves a configured provider name to an instance

use super::{DataProvider, InMemoryProvider, TimeoutProvider};
use crate::config::DataSettings;
use crate::error::{Result, ScreenerError};
use hashbrown::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Constructor for a named provider
pub type ProviderFactory = Box<dyn Fn(&DataSettings) -> Result<Arc<dyn DataProvider>> + Send + Sync>;

/// Registry for provider factories, built once per process and passed by reference
pub struct ProviderRegistry {
    factories: HashMap<String, ProviderFactory>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with every provider compiled into this build
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("in_memory", |settings: &DataSettings| {
            let provider = match settings.option("path") {
                Some(path) => InMemoryProvider::from_json_file(Path::new(path))?,
                None => InMemoryProvider::new(),
            };
            Ok(Arc::new(provider) as Arc<dyn DataProvider>)
        });

        #[cfg(feature = "providers")]
        {
            use super::sources::{PolygonProvider, YahooFinanceProvider};

            registry.register("yahoo", |settings: &DataSettings| {
                Ok(Arc::new(YahooFinanceProvider::new(settings)?) as Arc<dyn DataProvider>)
            });
            registry.register("polygon", |settings: &DataSettings| {
                Ok(Arc::new(PolygonProvider::new(settings)?) as Arc<dyn DataProvider>)
            });
        }

        registry
    }

    /// Register (or replace) a provider factory
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&DataSettings) -> Result<Arc<dyn DataProvider>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted
    pub fn list_providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Construct the provider named in `settings`. With a configured fetch timeout,
    /// providers that do not bound their own requests get a `TimeoutProvider`.
    pub fn resolve(&self, settings: &DataSettings) -> Result<Arc<dyn DataProvider>> {
        let factory = self.factories.get(settings.provider.as_str()).ok_or_else(|| {
            ScreenerError::ConfigError(format!(
                "Unknown data provider '{}'. Available: {}",
                settings.provider,
                self.list_providers().join(", ")
            ))
        })?;

        let provider = factory(settings)?;
        log::debug!("Resolved data provider '{}'", provider.name());

        Ok(match settings.fetch_timeout() {
            Some(timeout) if !provider.enforces_timeout() => {
                Arc::new(TimeoutProvider::new(provider, timeout)) as Arc<dyn DataProvider>
            }
            _ => provider,
        })
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Snapshot;
    use crate::types::Timestamp;

    struct FixedProvider;

    impl DataProvider for FixedProvider {
        fn fetch(&self, symbol: &str, as_of: Timestamp) -> Result<Snapshot> {
            Ok(Snapshot::builder(symbol, as_of).last_price(1.0).build())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn settings(provider: &str) -> DataSettings {
        DataSettings {
            provider: provider.to_string(),
            ..DataSettings::default()
        }
    }

    #[test]
    fn test_registry() {
        let registry = ProviderRegistry::new();
        assert_eq!(registry.list_providers().len(), 0);
    }

    #[test]
    fn test_defaults_include_in_memory() {
        let registry = ProviderRegistry::with_defaults();
        assert!(registry.contains("in_memory"));
        let provider = registry.resolve(&settings("in_memory")).unwrap();
        assert_eq!(provider.name(), "in_memory");
    }

    #[test]
    fn test_unknown_provider_lists_available() {
        let mut registry = ProviderRegistry::new();
        registry.register("zeta", |_: &DataSettings| {
            Ok(Arc::new(FixedProvider) as Arc<dyn DataProvider>)
        });
        registry.register("alpha", |_: &DataSettings| {
            Ok(Arc::new(FixedProvider) as Arc<dyn DataProvider>)
        });

        let err = match registry.resolve(&settings("nope")) {
            Err(e) => e,
            Ok(_) => panic!("expected unknown provider error"),
        };
        assert_eq!(
            err.to_string(),
            "Configuration error: Unknown data provider 'nope'. Available: alpha, zeta"
        );
    }

    #[test]
    fn test_timeout_wrapping() {
        let mut registry = ProviderRegistry::new();
        registry.register("fixed", |_: &DataSettings| {
            Ok(Arc::new(FixedProvider) as Arc<dyn DataProvider>)
        });

        let wrapped = registry
            .resolve(&DataSettings {
                fetch_timeout_secs: Some(3),
                ..settings("fixed")
            })
            .unwrap();
        assert!(wrapped.name().contains("timeout"));

        let bare = registry.resolve(&settings("fixed")).unwrap();
        assert_eq!(bare.name(), "fixed");
    }

    struct BoundedProvider;

    impl DataProvider for BoundedProvider {
        fn fetch(&self, symbol: &str, as_of: Timestamp) -> Result<Snapshot> {
            Ok(Snapshot::builder(symbol, as_of).last_price(1.0).build())
        }

        fn enforces_timeout(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "bounded"
        }
    }

    #[test]
    fn test_self_bounded_provider_not_wrapped() {
        let mut registry = ProviderRegistry::new();
        registry.register("bounded", |_: &DataSettings| {
            Ok(Arc::new(BoundedProvider) as Arc<dyn DataProvider>)
        });

        let provider = registry
            .resolve(&DataSettings {
                fetch_timeout_secs: Some(3),
                ..settings("bounded")
            })
            .unwrap();
        assert_eq!(provider.name(), "bounded");
    }

    #[test]
    fn test_missing_fixture_file_fails() {
        let registry = ProviderRegistry::with_defaults();
        let mut data = settings("in_memory");
        data.provider_options
            .insert("path".to_string(), "/definitely/not/here.json".to_string());
        assert!(matches!(
            registry.resolve(&data),
            Err(ScreenerError::IoError(_))
        ));
    }
}
