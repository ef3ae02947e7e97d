//! Contract Test: Completion Barrier
//!
//! Constraints verified:
//! - After K enqueues, `await_drain` returns only once K jobs are marked done
//! - `await_drain` never returns early while a job is in flight
//! - Every dequeued job is marked done, including failed and missing ones
//! - Several workers share one queue without losing or duplicating jobs
//!
//! If this test fails, callers of `await_drain` can observe half-applied state.

mod common;

use common::*;
use dnsq_core::dispatcher::DispatcherPool;
use dnsq_core::error::ProviderError;
use dnsq_core::model::{Job, RecordId, ReconcileStatus};
use dnsq_core::queue::JobQueue;
use dnsq_core::reconciler::Reconciler;
use dnsq_core::store::MemoryRecordStore;
use dnsq_core::traits::RecordStore;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_pending, assert_ready, task};

#[tokio::test]
async fn drain_waits_for_every_completion() {
    let queue = JobQueue::new();
    for _ in 0..3 {
        queue.enqueue(Job::new(RecordId::new(), 1));
    }

    let mut drain = task::spawn(queue.await_drain());
    assert_pending!(drain.poll());

    for _ in 0..3 {
        assert!(queue.dequeue(Duration::from_millis(10)).await.is_some());
    }
    assert_pending!(drain.poll(), "dequeue alone does not complete a job");

    queue.mark_done().unwrap();
    queue.mark_done().unwrap();
    assert_pending!(drain.poll());

    queue.mark_done().unwrap();
    assert!(drain.is_woken());
    assert_ready!(drain.poll());
}

#[tokio::test]
async fn drain_does_not_return_while_reconcile_is_in_flight() {
    let store = Arc::new(MemoryRecordStore::new());
    let record = seed(&*store, a_record("a.example.com", &["1.2.3.4"])).await;
    let provider = RecordingProvider::new().with_delay(Duration::from_millis(150));
    let reconciler = Arc::new(Reconciler::new(store.clone(), Arc::new(provider.clone())));
    let queue = Arc::new(JobQueue::new());

    let pool = DispatcherPool::start(&fast_dispatcher(1), queue.clone(), reconciler).unwrap();
    queue.enqueue(Job::new(record.id, 1));

    tokio::time::timeout(Duration::from_secs(5), queue.await_drain())
        .await
        .expect("drain completes");

    // The status write happens before mark_done, so it is visible here
    let stored = store.get(record.id).await.unwrap().unwrap();
    assert_eq!(stored.status.reconcile_status, ReconcileStatus::InSync);
    assert_eq!(provider.call_count(), 1);

    pool.shutdown().await.unwrap();
}

#[tokio::test]
async fn k_jobs_across_workers_yield_k_completions() {
    let store = Arc::new(MemoryRecordStore::new());
    let mut ids = Vec::new();
    for i in 0..20 {
        let record = seed(
            &*store,
            a_record(&format!("host{}.example.com", i), &["1.2.3.4"]),
        )
        .await;
        ids.push(record.id);
    }

    // Every third call fails; failures still count as completions
    let provider = RecordingProvider::new().with_delay(Duration::from_millis(5));
    for i in 0..20 {
        if i % 3 == 0 {
            provider.push_result(Err(ProviderError::http("flaky")));
        } else {
            provider.push_result(Ok(()));
        }
    }

    let reconciler = Arc::new(Reconciler::new(store.clone(), Arc::new(provider.clone())));
    let queue = Arc::new(JobQueue::new());
    let pool = DispatcherPool::start(&fast_dispatcher(4), queue.clone(), reconciler).unwrap();

    for id in &ids {
        queue.enqueue(Job::new(*id, 1));
    }
    // A job for a record that does not exist still completes
    queue.enqueue(Job::new(RecordId::new(), 1));

    tokio::time::timeout(Duration::from_secs(10), queue.await_drain())
        .await
        .expect("drain completes");

    assert_eq!(queue.enqueued_count(), 21);
    assert_eq!(queue.completed_count(), 21);
    assert_eq!(queue.pending_count(), 0);
    assert_eq!(provider.call_count(), 20);

    let applied: HashSet<String> = provider.applied().into_iter().map(|rs| rs.name).collect();
    assert_eq!(applied.len(), 20, "each record applied exactly once");

    for record in store.list().await.unwrap() {
        assert!(matches!(
            record.status.reconcile_status,
            ReconcileStatus::InSync | ReconcileStatus::Error
        ));
    }

    pool.shutdown().await.unwrap();
}

#[tokio::test]
async fn store_outage_does_not_stop_workers() {
    let store = UnavailableStore::new();
    let provider = RecordingProvider::new();
    let reconciler = Arc::new(Reconciler::new(
        Arc::new(store.clone()),
        Arc::new(provider.clone()),
    ));
    let queue = Arc::new(JobQueue::new());
    let pool = DispatcherPool::start(&fast_dispatcher(2), queue.clone(), reconciler).unwrap();

    for _ in 0..4 {
        queue.enqueue(Job::new(RecordId::new(), 1));
    }

    tokio::time::timeout(Duration::from_secs(5), queue.await_drain())
        .await
        .expect("drain completes");

    assert_eq!(queue.completed_count(), 4);
    assert_eq!(store.call_count(), 4);
    assert_eq!(provider.call_count(), 0);

    pool.shutdown().await.unwrap();
}

#[tokio::test]
async fn extra_mark_done_is_rejected() {
    let queue = JobQueue::new();
    queue.enqueue(Job::new(RecordId::new(), 1));
    queue.mark_done().unwrap();
    assert!(queue.mark_done().is_err());
    assert_eq!(queue.completed_count(), 1);
}
