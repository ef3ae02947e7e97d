//! Plugin-based component registry
//!
//! The registry allows DNS providers and record stores to be registered
//! dynamically at runtime, avoiding hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dnsq_core::registry::ProviderRegistry;
//! use dnsq_core::config::ProviderConfig;
//!
//! // Built-ins: "mock" provider, "memory" and "file" record stores
//! let registry = ProviderRegistry::with_builtins();
//!
//! // Live providers register themselves
//! dnsq_provider_cloudflare::register(&registry);
//!
//! let provider = registry.create_provider(&ProviderConfig::Mock)?;
//! ```

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::{ProviderConfig, RecordStoreConfig};
use crate::error::{Error, Result};
use crate::provider::MockProviderFactory;
use crate::store::{FileRecordStoreFactory, MemoryRecordStoreFactory};
use crate::traits::{DnsProvider, DnsProviderFactory, RecordStore, RecordStoreFactory};

/// Registry of provider and record store factories
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ProviderRegistry {
    /// Registered DNS provider factories
    providers: RwLock<HashMap<String, Box<dyn DnsProviderFactory>>>,

    /// Registered record store factories
    record_stores: RwLock<HashMap<String, Arc<dyn RecordStoreFactory>>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in factories
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register_builtins();
        registry
    }

    /// Register the `mock` provider and the `memory` and `file` record stores
    pub fn register_builtins(&self) {
        self.register_provider("mock", Box::new(MockProviderFactory));
        self.register_record_store("memory", Box::new(MemoryRecordStoreFactory));
        self.register_record_store("file", Box::new(FileRecordStoreFactory));
    }

    /// Register a DNS provider factory
    ///
    /// # Parameters
    ///
    /// - `name`: Provider type name (e.g., "cloudflare"), matched against
    ///   [`ProviderConfig::type_name`]
    /// - `factory`: Factory object for creating provider instances
    ///
    /// Registering a name twice replaces the earlier factory.
    pub fn register_provider(&self, name: impl Into<String>, factory: Box<dyn DnsProviderFactory>) {
        write(&self.providers).insert(name.into(), factory);
    }

    /// Register a record store factory
    ///
    /// # Parameters
    ///
    /// - `name`: Store type name (e.g., "file", "memory")
    /// - `factory`: Factory object for creating store instances
    pub fn register_record_store(
        &self,
        name: impl Into<String>,
        factory: Box<dyn RecordStoreFactory>,
    ) {
        write(&self.record_stores).insert(name.into(), Arc::from(factory));
    }

    /// Create a DNS provider from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn DnsProvider>)`: Created provider instance
    /// - `Err(Error)`: If the provider type is not registered or creation fails
    pub fn create_provider(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
        config.validate()?;
        let provider_type = config.type_name();
        let providers = read(&self.providers);

        let factory = providers
            .get(provider_type)
            .ok_or_else(|| Error::config(format!("Unknown provider type: {}", provider_type)))?;

        factory.create(config)
    }

    /// Create a record store from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn RecordStore>)`: Created store instance
    /// - `Err(Error)`: If the store type is not registered or creation fails
    pub async fn create_record_store(
        &self,
        config: &RecordStoreConfig,
    ) -> Result<Box<dyn RecordStore>> {
        config.validate()?;
        let store_type = config.type_name();

        // Clone the factory out so the lock is not held across the await
        let factory = read(&self.record_stores)
            .get(store_type)
            .cloned()
            .ok_or_else(|| {
                Error::config(format!("Unknown record store type: {}", store_type))
            })?;

        factory.create(config).await
    }

    /// List all registered provider types, sorted
    pub fn list_providers(&self) -> Vec<String> {
        let mut names: Vec<String> = read(&self.providers).keys().cloned().collect();
        names.sort();
        names
    }

    /// List all registered record store types, sorted
    pub fn list_record_stores(&self) -> Vec<String> {
        let mut names: Vec<String> = read(&self.record_stores).keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a provider type is registered
    pub fn has_provider(&self, name: &str) -> bool {
        read(&self.providers).contains_key(name)
    }

    /// Check if a record store type is registered
    pub fn has_record_store(&self, name: &str) -> bool {
        read(&self.record_stores).contains_key(name)
    }
}

// Registration never leaves a map half-written, so a poisoned lock is still usable
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_registration() {
        let registry = ProviderRegistry::new();
        assert!(!registry.has_provider("mock"));

        registry.register_provider("mock", Box::new(MockProviderFactory));

        assert!(registry.has_provider("mock"));
        assert_eq!(registry.list_providers(), vec!["mock".to_string()]);
    }

    #[test]
    fn builtins_are_registered() {
        let registry = ProviderRegistry::with_builtins();
        assert_eq!(registry.list_providers(), vec!["mock".to_string()]);
        assert_eq!(
            registry.list_record_stores(),
            vec!["file".to_string(), "memory".to_string()]
        );
    }

    #[test]
    fn unknown_provider_is_a_config_error() {
        let registry = ProviderRegistry::with_builtins();
        let config = ProviderConfig::Cloudflare {
            api_token: "token".to_string(),
            dry_run: true,
        };
        let err = registry.create_provider(&config).err().expect("not registered");
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn creates_builtin_components() {
        let registry = ProviderRegistry::with_builtins();

        let provider = registry.create_provider(&ProviderConfig::Mock).unwrap();
        assert_eq!(provider.provider_name(), "mock");

        let store = registry
            .create_record_store(&RecordStoreConfig::Memory)
            .await
            .unwrap();
        assert!(store.list().await.unwrap().is_empty());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        let store = registry
            .create_record_store(&RecordStoreConfig::File {
                path: path.to_string_lossy().into_owned(),
            })
            .await
            .unwrap();
        store.flush().await.unwrap();
    }

    /// Provider factory for a third-party backend configured as `custom`
    struct StaticProviderFactory;

    impl DnsProviderFactory for StaticProviderFactory {
        fn create(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
            match config {
                ProviderConfig::Custom { config, .. } if config["endpoint"].is_string() => {
                    Ok(Box::new(crate::provider::MockProvider::new()))
                }
                _ => Err(Error::config("static provider needs an endpoint")),
            }
        }
    }

    struct ScratchStoreFactory;

    #[async_trait::async_trait]
    impl RecordStoreFactory for ScratchStoreFactory {
        async fn create(&self, config: &RecordStoreConfig) -> Result<Box<dyn RecordStore>> {
            match config {
                RecordStoreConfig::Custom { .. } => {
                    Ok(Box::new(crate::store::MemoryRecordStore::new()))
                }
                _ => Err(Error::config("Invalid config for scratch store")),
            }
        }
    }

    #[tokio::test]
    async fn custom_factories_resolve_by_factory_name() {
        let registry = ProviderRegistry::with_builtins();
        registry.register_provider("static", Box::new(StaticProviderFactory));
        registry.register_record_store("scratch", Box::new(ScratchStoreFactory));

        let provider_config = ProviderConfig::Custom {
            factory: "static".to_string(),
            config: serde_json::json!({ "endpoint": "http://127.0.0.1:8053" }),
        };
        assert_eq!(provider_config.type_name(), "static");
        let provider = registry.create_provider(&provider_config).unwrap();
        assert_eq!(provider.provider_name(), "mock");

        // The factory sees the custom config and can refuse it
        let bad = ProviderConfig::Custom {
            factory: "static".to_string(),
            config: serde_json::json!({ "region": "eu" }),
        };
        assert!(matches!(registry.create_provider(&bad), Err(Error::Config(_))));

        let store_config = RecordStoreConfig::Custom {
            factory: "scratch".to_string(),
            config: serde_json::Value::Null,
        };
        assert_eq!(store_config.type_name(), "scratch");
        let store = registry.create_record_store(&store_config).await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }

    #[test]
    fn custom_configs_are_validated_before_lookup() {
        let registry = ProviderRegistry::with_builtins();
        registry.register_provider("static", Box::new(StaticProviderFactory));

        let null_config = ProviderConfig::Custom {
            factory: "static".to_string(),
            config: serde_json::Value::Null,
        };
        assert!(matches!(
            registry.create_provider(&null_config),
            Err(Error::Config(_))
        ));

        let unregistered = ProviderConfig::Custom {
            factory: "nowhere".to_string(),
            config: serde_json::json!({}),
        };
        let err = registry.create_provider(&unregistered).err().expect("not registered");
        assert!(err.to_string().contains("nowhere"));
    }

    #[tokio::test]
    async fn unknown_record_store_is_a_config_error() {
        let registry = ProviderRegistry::new();
        let result = registry.create_record_store(&RecordStoreConfig::Memory).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
