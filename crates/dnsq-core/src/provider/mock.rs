//! Mock DNS provider
//!
//! Performs no external effect: logs what it would upsert and succeeds.
//! Used for development, simulations, and as the daemon's default provider.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::model::RecordSet;
use crate::traits::{DnsProvider, DnsProviderFactory};

/// Provider that only logs
#[derive(Debug, Clone, Default)]
pub struct MockProvider {
    applied: Arc<AtomicUsize>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `apply` calls so far (shared between clones)
    pub fn apply_count(&self) -> usize {
        self.applied.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DnsProvider for MockProvider {
    async fn apply(&self, record_set: &RecordSet) -> Result<(), ProviderError> {
        self.applied.fetch_add(1, Ordering::SeqCst);
        tracing::info!(
            "[MockProvider] Would UPSERT {} {} (TTL={}) values={:?} in zone={}",
            record_set.record_type,
            record_set.name,
            record_set.ttl,
            record_set.values,
            record_set.zone_id
        );
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Factory for mock providers
pub struct MockProviderFactory;

impl DnsProviderFactory for MockProviderFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>, crate::Error> {
        match config {
            ProviderConfig::Mock => Ok(Box::new(MockProvider::new())),
            _ => Err(crate::Error::config("Invalid config for mock provider")),
        }
    }
}
