//! Test doubles and common utilities for contract tests
//!
//! These doubles record what the reconciler asked of them so tests can check
//! call counts and ordering without any network or disk.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dnsq_core::config::{DesiredRecord, DesiredStateDocument, DispatcherConfig};
use dnsq_core::error::{Error, ProviderError, Result};
use dnsq_core::model::{
    DesiredState, Record, RecordId, RecordKey, RecordSet, RecordSpec, RecordType,
    StatusTransition,
};
use dnsq_core::traits::{DnsProvider, RecordStore};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A DnsProvider that records every call and replays scripted failures
///
/// Calls consume scripted results front to back; once the script is empty
/// every call succeeds.
#[derive(Clone, Default)]
pub struct RecordingProvider {
    call_count: Arc<AtomicUsize>,
    applied: Arc<Mutex<Vec<RecordSet>>>,
    script: Arc<Mutex<VecDeque<std::result::Result<(), ProviderError>>>>,
    delay: Option<Duration>,
}

impl RecordingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider whose next `n` calls fail with `error`
    pub fn failing(n: usize, error: ProviderError) -> Self {
        let provider = Self::new();
        for _ in 0..n {
            provider.push_result(Err(error.clone()));
        }
        provider
    }

    /// Sleep this long inside every `apply`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue the result of a future call
    pub fn push_result(&self, result: std::result::Result<(), ProviderError>) {
        self.script.lock().unwrap().push_back(result);
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Record sets passed to `apply`, in call order
    pub fn applied(&self) -> Vec<RecordSet> {
        self.applied.lock().unwrap().clone()
    }
}

#[async_trait]
impl DnsProvider for RecordingProvider {
    async fn apply(&self, record_set: &RecordSet) -> std::result::Result<(), ProviderError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.applied.lock().unwrap().push(record_set.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.script.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    fn provider_name(&self) -> &'static str {
        "recording"
    }
}

/// A DnsProvider that reads the record back from the store while applying
///
/// Captures the stored document as the provider sees it, so tests can check
/// which status writes landed before the provider was called.
#[derive(Clone)]
pub struct ObservingProvider {
    store: Arc<dyn RecordStore>,
    seen: Arc<Mutex<Vec<Record>>>,
}

impl ObservingProvider {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Records read inside `apply`, in call order
    pub fn seen(&self) -> Vec<Record> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl DnsProvider for ObservingProvider {
    async fn apply(&self, record_set: &RecordSet) -> std::result::Result<(), ProviderError> {
        let key = RecordKey {
            zone_id: record_set.zone_id.clone(),
            name: record_set.name.clone(),
            record_type: record_set.record_type,
        };
        let record = self
            .store
            .find_by_key(&key)
            .await
            .map_err(|e| ProviderError::http(e.to_string()))?
            .ok_or_else(|| ProviderError::http(format!("{} not in store", key)))?;
        self.seen.lock().unwrap().push(record);
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "observing"
    }
}

/// A RecordStore whose backing database is down
#[derive(Clone, Default)]
pub struct UnavailableStore {
    call_count: Arc<AtomicUsize>,
}

impl UnavailableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> Result<T> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        Err(Error::record_store("connection refused"))
    }
}

#[async_trait]
impl RecordStore for UnavailableStore {
    async fn get(&self, _id: RecordId) -> Result<Option<Record>> {
        self.fail()
    }

    async fn find_by_key(&self, _key: &RecordKey) -> Result<Option<Record>> {
        self.fail()
    }

    async fn insert(&self, _record: &Record) -> Result<()> {
        self.fail()
    }

    async fn replace_spec(
        &self,
        _id: RecordId,
        _spec: RecordSpec,
        _now: DateTime<Utc>,
    ) -> Result<Record> {
        self.fail()
    }

    async fn update_status(&self, _id: RecordId, _transition: StatusTransition) -> Result<bool> {
        self.fail()
    }

    async fn list(&self) -> Result<Vec<Record>> {
        self.fail()
    }

    async fn flush(&self) -> Result<()> {
        self.fail()
    }
}

/// A present A record spec at version 1
pub fn a_record(name: &str, values: &[&str]) -> RecordSpec {
    RecordSpec {
        zone_id: "Z1".to_string(),
        name: name.to_string(),
        record_type: RecordType::A,
        ttl: 60,
        values: values.iter().map(|v| v.to_string()).collect(),
        desired_state: DesiredState::Present,
        version: 1,
    }
}

/// Insert a fresh record built from `spec` into `store`
pub async fn seed(store: &dyn RecordStore, spec: RecordSpec) -> Record {
    let record = Record::new(spec, Utc::now());
    store.insert(&record).await.expect("seed insert succeeds");
    record
}

/// Desired-state document for zone `Z1` with one A record per `(name, value)`
pub fn document(records: &[(&str, &str)]) -> DesiredStateDocument {
    DesiredStateDocument {
        zone_id: "Z1".to_string(),
        records: records
            .iter()
            .map(|(name, value)| DesiredRecord::new(*name, RecordType::A).with_values([*value]))
            .collect(),
    }
}

/// Dispatcher config with a short poll interval so tests shut down quickly
pub fn fast_dispatcher(workers: usize) -> DispatcherConfig {
    DispatcherConfig::default()
        .with_workers(workers)
        .with_poll_interval(Duration::from_millis(20))
}
