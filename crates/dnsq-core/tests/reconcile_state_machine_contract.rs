//! Contract Test: Reconcile State Machine
//!
//! Constraints verified:
//! - APPLYING is written before the provider is called, with
//!   observed_version still at its previous value
//! - A successful PRESENT reconcile ends IN_SYNC with observed = version and no error
//! - A failing reconcile ends ERROR with the error recorded and observed unchanged
//! - Reconciling the same job twice reaches the same terminal status and
//!   calls the provider twice
//! - A missing record is a no-op
//! - A store failure abandons the attempt without calling the provider
//!
//! If this test fails, the reconciler no longer writes status the way
//! dashboards and the planner expect.

mod common;

use common::*;
use dnsq_core::error::ProviderError;
use dnsq_core::model::{Job, RecordId, ReconcileStatus};
use dnsq_core::reconciler::{ReconcileOutcome, Reconciler};
use dnsq_core::store::MemoryRecordStore;
use dnsq_core::traits::RecordStore;
use std::sync::Arc;

#[tokio::test]
async fn successful_reconcile_marks_record_in_sync() {
    let store = Arc::new(MemoryRecordStore::new());
    let record = seed(&*store, a_record("a.example.com", &["1.2.3.4"])).await;
    let provider = RecordingProvider::new();
    let reconciler = Reconciler::new(store.clone(), Arc::new(provider.clone()));

    let outcome = reconciler.reconcile(&Job::new(record.id, 1)).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::InSync { version: 1 });

    let stored = store.get(record.id).await.unwrap().unwrap();
    assert_eq!(stored.status.reconcile_status, ReconcileStatus::InSync);
    assert_eq!(stored.status.observed_version, 1);
    assert!(stored.status.last_error.is_none());
    assert!(stored.status.last_reconciled_at.is_some());

    let applied = provider.applied();
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].name, "a.example.com");
    assert_eq!(applied[0].values, vec!["1.2.3.4".to_string()]);
    assert_eq!(applied[0].version, 1);
}

#[tokio::test]
async fn failed_reconcile_records_error_and_keeps_observed_version() {
    let store = Arc::new(MemoryRecordStore::new());
    let record = seed(&*store, a_record("a.example.com", &["1.2.3.4"])).await;
    let provider = RecordingProvider::failing(1, ProviderError::rate_limited("slow down"));
    let reconciler = Reconciler::new(store.clone(), Arc::new(provider.clone()));

    let outcome = reconciler.reconcile(&Job::new(record.id, 1)).await.unwrap();
    assert!(matches!(outcome, ReconcileOutcome::Failed { version: 1, .. }));

    let stored = store.get(record.id).await.unwrap().unwrap();
    assert_eq!(stored.status.reconcile_status, ReconcileStatus::Error);
    assert_eq!(stored.status.observed_version, 0);
    assert_eq!(
        stored.status.last_error.as_deref(),
        Some("Rate limited: slow down")
    );
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn success_after_failure_clears_last_error() {
    let store = Arc::new(MemoryRecordStore::new());
    let record = seed(&*store, a_record("a.example.com", &["1.2.3.4"])).await;
    let provider = RecordingProvider::failing(1, ProviderError::http("connection reset"));
    let reconciler = Reconciler::new(store.clone(), Arc::new(provider));

    let job = Job::new(record.id, 1);
    reconciler.reconcile(&job).await.unwrap();
    reconciler.reconcile(&job).await.unwrap();

    let stored = store.get(record.id).await.unwrap().unwrap();
    assert_eq!(stored.status.reconcile_status, ReconcileStatus::InSync);
    assert!(stored.status.last_error.is_none());
    assert_eq!(stored.status.observed_version, 1);
}

#[tokio::test]
async fn reconciling_same_job_twice_is_idempotent_in_status() {
    let store = Arc::new(MemoryRecordStore::new());
    let record = seed(&*store, a_record("a.example.com", &["1.2.3.4"])).await;
    let provider = RecordingProvider::new();
    let reconciler = Reconciler::new(store.clone(), Arc::new(provider.clone()));

    let job = Job::new(record.id, 1);
    let first = reconciler.reconcile(&job).await.unwrap();
    let after_first = store.get(record.id).await.unwrap().unwrap();

    let second = reconciler.reconcile(&job).await.unwrap();
    let after_second = store.get(record.id).await.unwrap().unwrap();

    assert_eq!(first, second);
    assert_eq!(
        after_first.status.reconcile_status,
        after_second.status.reconcile_status
    );
    assert_eq!(
        after_first.status.observed_version,
        after_second.status.observed_version
    );
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test]
async fn missing_record_is_a_no_op() {
    let store = Arc::new(MemoryRecordStore::new());
    let provider = RecordingProvider::new();
    let reconciler = Reconciler::new(store.clone(), Arc::new(provider.clone()));

    let outcome = reconciler
        .reconcile(&Job::new(RecordId::new(), 1))
        .await
        .unwrap();

    assert_eq!(outcome, ReconcileOutcome::Missing);
    assert_eq!(provider.call_count(), 0);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn store_failure_abandons_attempt_before_provider() {
    let store = UnavailableStore::new();
    let provider = RecordingProvider::new();
    let reconciler = Reconciler::new(Arc::new(store.clone()), Arc::new(provider.clone()));

    let result = reconciler.reconcile(&Job::new(RecordId::new(), 1)).await;

    assert!(result.is_err());
    assert_eq!(store.call_count(), 1);
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn applying_is_visible_while_provider_runs() {
    let store = Arc::new(MemoryRecordStore::new());
    let record = seed(&*store, a_record("a.example.com", &["1.2.3.4"])).await;
    let provider = ObservingProvider::new(store.clone());
    let reconciler = Reconciler::new(store.clone(), Arc::new(provider.clone()));

    let outcome = reconciler.reconcile(&Job::new(record.id, 1)).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::InSync { version: 1 });

    let seen = provider.seen();
    assert_eq!(seen.len(), 1, "provider called once");
    assert_eq!(seen[0].id, record.id);
    assert_eq!(seen[0].status.reconcile_status, ReconcileStatus::Applying);
    assert_eq!(seen[0].status.observed_version, 0);
    assert!(seen[0].status.last_reconciled_at.is_none());

    let stored = store.get(record.id).await.unwrap().unwrap();
    assert_eq!(stored.status.reconcile_status, ReconcileStatus::InSync);
    assert_eq!(stored.status.observed_version, 1);
}
