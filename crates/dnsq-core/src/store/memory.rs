// # Memory Record Store
//
// In-memory implementation of RecordStore.
//
// ## Purpose
//
// Provides a simple, fast record store that doesn't persist across restarts.
// Useful for tests, simulations, and one-shot apply runs where the provider
// is the only durable side effect.
//
// ## Crash Behavior
//
// - All records are lost on restart/crash
// - The next apply treats every desired record as new (version 1)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::config::RecordStoreConfig;
use crate::model::{Record, RecordId, RecordKey, RecordSpec, StatusTransition};
use crate::traits::{RecordStore, RecordStoreFactory};

/// In-memory record store implementation
///
/// Records live in a HashMap protected by a RwLock; every trait method holds
/// the lock for exactly one document operation.
///
/// # Example
///
/// ```rust,no_run
/// use dnsq_core::store::MemoryRecordStore;
/// use dnsq_core::traits::RecordStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryRecordStore::new();
///     assert!(store.list().await?.is_empty());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    inner: Arc<RwLock<HashMap<RecordId, Record>>>,
}

impl MemoryRecordStore {
    /// Create a new empty memory record store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of records in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Clear all records from the store
    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get(&self, id: RecordId) -> Result<Option<Record>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.get(&id).cloned())
    }

    async fn find_by_key(&self, key: &RecordKey) -> Result<Option<Record>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.values().find(|r| r.key() == *key).cloned())
    }

    async fn insert(&self, record: &Record) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        check_insert(guard.values(), record)?;
        guard.insert(record.id, record.clone());
        Ok(())
    }

    async fn replace_spec(
        &self,
        id: RecordId,
        spec: RecordSpec,
        now: DateTime<Utc>,
    ) -> Result<Record, Error> {
        let mut guard = self.inner.write().await;
        let record = guard
            .get_mut(&id)
            .ok_or_else(|| Error::not_found(id.to_string()))?;
        record.replace_spec(spec, now)?;
        Ok(record.clone())
    }

    async fn update_status(&self, id: RecordId, transition: StatusTransition) -> Result<bool, Error> {
        let mut guard = self.inner.write().await;
        match guard.get_mut(&id) {
            Some(record) => {
                record.apply_transition(transition);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list(&self) -> Result<Vec<Record>, Error> {
        let guard = self.inner.read().await;
        Ok(sorted(guard.values().cloned()))
    }

    async fn flush(&self) -> Result<(), Error> {
        // No-op for memory store (everything is already "persisted")
        Ok(())
    }
}

/// Reject an insert that would duplicate an id or an identity key
pub(crate) fn check_insert<'a>(
    existing: impl Iterator<Item = &'a Record>,
    record: &Record,
) -> Result<(), Error> {
    let key = record.key();
    for other in existing {
        if other.id == record.id {
            return Err(Error::record_store(format!(
                "Record {} already exists",
                record.id
            )));
        }
        if other.key() == key {
            return Err(Error::record_store(format!(
                "Record {} already exists as {}",
                key, other.id
            )));
        }
    }
    Ok(())
}

/// Order records by name, then type, for stable listings
pub(crate) fn sorted(records: impl Iterator<Item = Record>) -> Vec<Record> {
    let mut records: Vec<Record> = records.collect();
    records.sort_by(|a, b| {
        a.spec
            .name
            .cmp(&b.spec.name)
            .then(a.spec.record_type.cmp(&b.spec.record_type))
    });
    records
}

/// Factory for in-memory record stores
pub struct MemoryRecordStoreFactory;

#[async_trait]
impl RecordStoreFactory for MemoryRecordStoreFactory {
    async fn create(&self, _config: &RecordStoreConfig) -> Result<Box<dyn RecordStore>, Error> {
        Ok(Box::new(MemoryRecordStore::new()))
    }
}
