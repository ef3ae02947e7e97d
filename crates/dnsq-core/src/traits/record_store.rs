// # Record Store Trait
//
// Defines the interface for the document store that holds one record document
// per `(zone_id, name, type)` identity.
//
// ## Purpose
//
// The record store is the single source of truth. The planner writes `spec`,
// the reconciler writes `status`, and both only ever touch one document per
// call.
//
// ## Implementations
//
// - Memory: `MemoryRecordStore` (tests, simulations)
// - File: `FileRecordStore` (JSON document file with atomic writes)
//
// ## Consistency
//
// Each method is an atomic single-document operation. There is no isolation
// between a `get` and a later `update_status`; callers that need to detect
// concurrent spec changes compare versions themselves.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::{Record, RecordId, RecordKey, RecordSpec, StatusTransition};

/// Trait for record store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
///
/// # Trust Level: Trusted (Core Component)
///
/// ## Allowed Capabilities
/// - ✅ Perform I/O for persistent storage
/// - ✅ Implement locking for single-document atomicity
/// - ✅ Reject writes that would break the version invariant
///
/// ## Forbidden Capabilities
/// - ❌ Call DNS providers (owned by `Reconciler`)
/// - ❌ Enqueue jobs (owned by `Planner`)
/// - ❌ Spawn background tasks
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Load a record by identity
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Record))`: The record
    /// - `Ok(None)`: No such record
    /// - `Err(Error)`: Storage error
    async fn get(&self, id: RecordId) -> Result<Option<Record>, crate::Error>;

    /// Load a record by its `(zone_id, name, type)` identity key
    async fn find_by_key(&self, key: &RecordKey) -> Result<Option<Record>, crate::Error>;

    /// Insert a new record document
    ///
    /// Fails if a record with the same id or identity key already exists.
    async fn insert(&self, record: &Record) -> Result<(), crate::Error>;

    /// Replace the spec of an existing record and reset its status to PENDING
    ///
    /// # Returns
    ///
    /// - `Ok(Record)`: The record as stored after the write
    /// - `Err(Error::NotFound)`: No such record
    /// - `Err(Error::VersionConflict)`: `spec.version` does not exceed the stored version
    async fn replace_spec(
        &self,
        id: RecordId,
        spec: RecordSpec,
        now: DateTime<Utc>,
    ) -> Result<Record, crate::Error>;

    /// Apply one status transition as a single atomic write
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: Transition applied
    /// - `Ok(false)`: The record no longer exists
    /// - `Err(Error)`: Storage error
    async fn update_status(
        &self,
        id: RecordId,
        transition: StatusTransition,
    ) -> Result<bool, crate::Error>;

    /// List all records, ordered by record name
    async fn list(&self) -> Result<Vec<Record>, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}

/// Helper trait for constructing record stores from configuration
#[async_trait]
pub trait RecordStoreFactory: Send + Sync {
    /// Create a RecordStore instance from configuration
    async fn create(
        &self,
        config: &crate::config::RecordStoreConfig,
    ) -> Result<Box<dyn RecordStore>, crate::Error>;
}
