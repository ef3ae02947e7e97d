// # File Record Store
//
// JSON document file implementation of RecordStore with crash recovery.
//
// ## Purpose
//
// Keeps record documents across daemon restarts so that re-applying a desired
// state bumps versions instead of recreating records.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps .backup of last known good file
// - Recovery: Falls back to backup if corruption detected
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "records": [
//     {
//       "_id": "6f1c2a4e-...",
//       "spec": { "zoneId": "Z1", "name": "a.example.com", "type": "A", "ttl": 60,
//                 "values": ["1.2.3.4"], "desiredState": "PRESENT", "version": 1 },
//       "status": { "reconcileStatus": "IN_SYNC", "observedVersion": 1,
//                   "lastError": null, "lastReconciledAt": "2025-01-09T12:00:00Z" },
//       "createdAt": "2025-01-09T12:00:00Z",
//       "updatedAt": "2025-01-09T12:00:00Z"
//     }
//   ]
// }
// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use super::memory::{check_insert, sorted};
use crate::Error;
use crate::config::RecordStoreConfig;
use crate::model::{Record, RecordId, RecordKey, RecordSpec, StatusTransition};
use crate::traits::{RecordStore, RecordStoreFactory};

/// Record file format version
/// Used for future migration if format changes
const RECORD_FILE_VERSION: &str = "1.0";

/// File-based record store with crash recovery
///
/// Every mutation is applied in memory and written to disk while the write
/// lock is held, so each trait call is one atomic document update. If the
/// disk write fails the in-memory change is rolled back.
///
/// # Example
///
/// ```rust,no_run
/// use dnsq_core::store::FileRecordStore;
/// use dnsq_core::traits::RecordStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileRecordStore::new("/var/lib/dnsq/records.json").await?;
///     for record in store.list().await? {
///         println!("{} v{} {}", record.spec.name, record.spec.version, record.status.reconcile_status);
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileRecordStore {
    path: PathBuf,
    state: RwLock<FileState>,
}

/// Internal state for file-based store
#[derive(Debug)]
struct FileState {
    records: HashMap<RecordId, Record>,
    dirty: bool,
}

/// Serializable record file format
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct RecordFileFormat {
    version: String,
    records: Vec<Record>,
}

impl FileRecordStore {
    /// Create or load a file record store
    ///
    /// This will:
    /// 1. Create parent directories if needed
    /// 2. Try to load the existing record file
    /// 3. If corruption detected, try to load from backup
    /// 4. If both fail, start with an empty store
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create record store directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let records = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: RwLock::new(FileState {
                records,
                dirty: false,
            }),
        })
    }

    /// Load records with automatic recovery
    ///
    /// Only parse failures trigger recovery; I/O failures are returned.
    async fn load_with_recovery(path: &Path) -> Result<HashMap<RecordId, Record>, Error> {
        match Self::load(path).await {
            Ok(records) => {
                tracing::debug!("Loaded record file: {} records", records.len());
                Ok(records)
            }
            Err(Error::Json(e)) => {
                tracing::warn!(
                    "Record file {} appears corrupted: {}. Attempting recovery from backup.",
                    path.display(),
                    e
                );

                let backup_path = Self::backup_path(path);
                if !backup_path.exists() {
                    tracing::warn!("No backup file found. Starting with empty record store.");
                    return Ok(HashMap::new());
                }

                match Self::load(&backup_path).await {
                    Ok(records) => {
                        tracing::info!("Recovered record file from backup: {} records", records.len());
                        if let Err(restore_err) = Self::restore_from_backup(path, &backup_path).await {
                            tracing::error!(
                                "Failed to restore record file from backup: {}",
                                restore_err
                            );
                        }
                        Ok(records)
                    }
                    Err(backup_err) => {
                        tracing::error!(
                            "Backup also unreadable: {}. Starting with empty record store.",
                            backup_err
                        );
                        Ok(HashMap::new())
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Load records from file
    async fn load(path: &Path) -> Result<HashMap<RecordId, Record>, Error> {
        if !path.exists() {
            tracing::debug!("Record file does not exist: {}", path.display());
            return Ok(HashMap::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::record_store(format!(
                "Failed to read record file {}: {}",
                path.display(),
                e
            ))
        })?;

        let file: RecordFileFormat = serde_json::from_str(&content)?;

        if file.version != RECORD_FILE_VERSION {
            tracing::warn!(
                "Record file version mismatch: expected {}, got {}. Attempting to load anyway.",
                RECORD_FILE_VERSION,
                file.version
            );
        }

        Ok(file.records.into_iter().map(|r| (r.id, r)).collect())
    }

    /// Write the given state to disk atomically
    ///
    /// Callers hold the write lock, which serializes concurrent writers.
    async fn persist(&self, state: &mut FileState) -> Result<(), Error> {
        let file = RecordFileFormat {
            version: RECORD_FILE_VERSION.to_string(),
            records: sorted(state.records.values().cloned()),
        };

        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| Error::record_store(format!("Failed to serialize records: {}", e)))?;

        let temp_path = self.temp_path();
        {
            let mut f = fs::File::create(&temp_path).await.map_err(|e| {
                Error::record_store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            f.write_all(json.as_bytes()).await.map_err(|e| {
                Error::record_store(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            f.flush().await.map_err(|e| {
                Error::record_store(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::record_store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        state.dirty = false;
        tracing::trace!("Records written to file: {}", self.path.display());
        Ok(())
    }

    /// Restore record file from backup
    async fn restore_from_backup(path: &Path, backup_path: &Path) -> Result<(), Error> {
        fs::copy(backup_path, path).await.map_err(|e| {
            Error::record_store(format!(
                "Failed to restore from backup {} to {}: {}",
                backup_path.display(),
                path.display(),
                e
            ))
        })?;

        tracing::info!("Restored record file from backup");
        Ok(())
    }

    /// Get path to temporary file for atomic writes
    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    /// Get path to backup file
    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }

    /// Path of the record file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mutate one document and persist, rolling back on write failure
    async fn write_document<T>(
        &self,
        id: RecordId,
        mutate: impl FnOnce(&mut HashMap<RecordId, Record>) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let mut guard = self.state.write().await;
        let previous = guard.records.get(&id).cloned();

        let value = mutate(&mut guard.records)?;
        guard.dirty = true;

        if let Err(e) = self.persist(&mut guard).await {
            match previous {
                Some(record) => guard.records.insert(id, record),
                None => guard.records.remove(&id),
            };
            return Err(e);
        }

        Ok(value)
    }
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn get(&self, id: RecordId) -> Result<Option<Record>, Error> {
        let guard = self.state.read().await;
        Ok(guard.records.get(&id).cloned())
    }

    async fn find_by_key(&self, key: &RecordKey) -> Result<Option<Record>, Error> {
        let guard = self.state.read().await;
        Ok(guard.records.values().find(|r| r.key() == *key).cloned())
    }

    async fn insert(&self, record: &Record) -> Result<(), Error> {
        self.write_document(record.id, |records| {
            check_insert(records.values(), record)?;
            records.insert(record.id, record.clone());
            Ok(())
        })
        .await
    }

    async fn replace_spec(
        &self,
        id: RecordId,
        spec: RecordSpec,
        now: DateTime<Utc>,
    ) -> Result<Record, Error> {
        self.write_document(id, |records| {
            let record = records
                .get_mut(&id)
                .ok_or_else(|| Error::not_found(id.to_string()))?;
            record.replace_spec(spec, now)?;
            Ok(record.clone())
        })
        .await
    }

    async fn update_status(&self, id: RecordId, transition: StatusTransition) -> Result<bool, Error> {
        if !self.state.read().await.records.contains_key(&id) {
            return Ok(false);
        }

        self.write_document(id, |records| match records.get_mut(&id) {
            Some(record) => {
                record.apply_transition(transition);
                Ok(true)
            }
            None => Ok(false),
        })
        .await
    }

    async fn list(&self) -> Result<Vec<Record>, Error> {
        let guard = self.state.read().await;
        Ok(sorted(guard.records.values().cloned()))
    }

    async fn flush(&self) -> Result<(), Error> {
        let mut guard = self.state.write().await;
        if guard.dirty {
            self.persist(&mut guard).await
        } else {
            Ok(())
        }
    }
}

/// Factory for file record stores
pub struct FileRecordStoreFactory;

#[async_trait]
impl RecordStoreFactory for FileRecordStoreFactory {
    async fn create(&self, config: &RecordStoreConfig) -> Result<Box<dyn RecordStore>, Error> {
        match config {
            RecordStoreConfig::File { path } => Ok(Box::new(FileRecordStore::new(path).await?)),
            _ => Err(Error::config("Invalid config for file record store")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DesiredState, ReconcileStatus, RecordType};
    use tempfile::tempdir;

    fn spec(values: &[&str]) -> RecordSpec {
        RecordSpec {
            zone_id: "Z1".to_string(),
            name: "a.example.com".to_string(),
            record_type: RecordType::A,
            ttl: 60,
            values: values.iter().map(|v| v.to_string()).collect(),
            desired_state: DesiredState::Present,
            version: 1,
        }
    }

    #[tokio::test]
    async fn test_file_store_persists_documents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("records.json");

        let store = FileRecordStore::new(&path).await.unwrap();
        assert!(store.list().await.unwrap().is_empty());

        let record = Record::new(spec(&["1.2.3.4"]), Utc::now());
        store.insert(&record).await.unwrap();
        store
            .update_status(
                record.id,
                StatusTransition::InSync {
                    observed_version: 1,
                    at: Utc::now(),
                },
            )
            .await
            .unwrap();
        assert!(path.exists());

        let reopened = FileRecordStore::new(&path).await.unwrap();
        let loaded = reopened.get(record.id).await.unwrap().unwrap();
        assert_eq!(loaded.spec, record.spec);
        assert_eq!(loaded.status.reconcile_status, ReconcileStatus::InSync);
        assert_eq!(loaded.status.observed_version, 1);
    }

    #[tokio::test]
    async fn test_file_store_document_shape() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("records.json");

        let store = FileRecordStore::new(&path).await.unwrap();
        store
            .insert(&Record::new(spec(&["1.2.3.4"]), Utc::now()))
            .await
            .unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).await.unwrap()).unwrap();
        assert_eq!(raw["version"], RECORD_FILE_VERSION);
        let doc = &raw["records"][0];
        assert!(doc["_id"].is_string());
        assert_eq!(doc["spec"]["zoneId"], "Z1");
        assert_eq!(doc["spec"]["version"], 1);
        assert_eq!(doc["status"]["reconcileStatus"], "PENDING");
    }

    #[tokio::test]
    async fn test_file_store_corruption_recovery() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("records.json");

        let store = FileRecordStore::new(&path).await.unwrap();
        let record = Record::new(spec(&["1.2.3.4"]), Utc::now());
        store.insert(&record).await.unwrap();

        // Second write creates the backup holding version 1
        let mut next = spec(&["5.6.7.8"]);
        next.version = 2;
        store.replace_spec(record.id, next, Utc::now()).await.unwrap();

        let backup_path = FileRecordStore::backup_path(&path);
        assert!(backup_path.exists(), "Backup file should exist after write");

        fs::write(&path, b"corrupted json data").await.unwrap();

        let recovered = FileRecordStore::new(&path).await.unwrap();
        let loaded = recovered.get(record.id).await.unwrap().unwrap();
        assert_eq!(loaded.spec.version, 1, "Backup should contain previous state");
    }

    #[tokio::test]
    async fn test_file_store_version_conflict_is_not_persisted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("records.json");

        let store = FileRecordStore::new(&path).await.unwrap();
        let record = Record::new(spec(&["1.2.3.4"]), Utc::now());
        store.insert(&record).await.unwrap();

        let result = store
            .replace_spec(record.id, spec(&["9.9.9.9"]), Utc::now())
            .await;
        assert!(matches!(result, Err(Error::VersionConflict { .. })));

        let reopened = FileRecordStore::new(&path).await.unwrap();
        let loaded = reopened.get(record.id).await.unwrap().unwrap();
        assert_eq!(loaded.spec.values, vec!["1.2.3.4".to_string()]);
    }

    #[tokio::test]
    async fn test_file_store_missing_record_status_update() {
        let dir = tempdir().unwrap();
        let store = FileRecordStore::new(dir.path().join("records.json"))
            .await
            .unwrap();

        let applied = store
            .update_status(RecordId::new(), StatusTransition::Applying)
            .await
            .unwrap();
        assert!(!applied);
    }

    #[tokio::test]
    async fn test_file_store_factory_requires_file_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("records.json");

        let store = FileRecordStoreFactory
            .create(&RecordStoreConfig::File {
                path: path.to_string_lossy().into_owned(),
            })
            .await;
        assert!(store.is_ok());
        assert!(path.parent().unwrap().exists());

        assert!(
            FileRecordStoreFactory
                .create(&RecordStoreConfig::Memory)
                .await
                .is_err()
        );
    }
}
