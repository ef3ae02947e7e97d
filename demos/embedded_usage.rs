//! Minimal embedding example for dnsq-core
//!
//! This example demonstrates using dnsq-core as a library in a custom
//! application. The application supplies its own provider, builds the desired
//! state in code, and owns the dispatcher lifecycle.

use async_trait::async_trait;
use dnsq_core::error::ProviderError;
use dnsq_core::model::{DesiredState, RecordSet, RecordType};
use dnsq_core::{
    DesiredRecord, DesiredStateDocument, DispatcherConfig, DispatcherPool, DnsProvider, JobQueue,
    MemoryRecordStore, Planner, Reconciler, Result,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Custom DNS provider for embedded usage
///
/// Refuses TXT records so the example shows both terminal statuses.
struct EmbeddedProvider {
    apply_calls: Arc<AtomicUsize>,
}

impl EmbeddedProvider {
    fn new() -> Self {
        Self {
            apply_calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl DnsProvider for EmbeddedProvider {
    async fn apply(&self, record_set: &RecordSet) -> std::result::Result<(), ProviderError> {
        self.apply_calls.fetch_add(1, Ordering::SeqCst);
        if record_set.record_type == RecordType::Txt {
            return Err(ProviderError::rejected("embedded", "TXT records are not served here"));
        }
        println!(
            "[Embedded] {} {} -> {:?} (v{})",
            record_set.record_type, record_set.name, record_set.values, record_set.version
        );
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "embedded"
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== Embedded dnsq-core Example ===\n");

    // Create custom components
    let provider = EmbeddedProvider::new();
    let apply_calls = provider.apply_calls.clone();
    let store = Arc::new(MemoryRecordStore::new());
    let queue = Arc::new(JobQueue::new());

    println!("1. Creating reconciler...");
    let (reconciler, mut event_rx) = Reconciler::with_events(store.clone(), Arc::new(provider), 64);

    let event_listener = tokio::spawn(async move {
        println!("2. Event listener started");
        while let Some(event) = event_rx.recv().await {
            println!("[Event] {:?}", event);
        }
        println!("Event listener stopped");
    });

    println!("3. Starting dispatcher...");
    let dispatcher = DispatcherConfig::default()
        .with_workers(1)
        .with_poll_interval(Duration::from_millis(50));
    let pool = DispatcherPool::start(&dispatcher, queue.clone(), Arc::new(reconciler))?;

    let document = DesiredStateDocument {
        zone_id: "Z-embedded".to_string(),
        records: vec![
            DesiredRecord::new("api.example.net", RecordType::A).with_values(["10.0.0.1"]),
            DesiredRecord::new("docs.example.net", RecordType::Cname)
                .with_ttl(300)
                .with_values(["api.example.net"]),
            DesiredRecord::new("_acme.example.net", RecordType::Txt).with_values(["token"]),
            DesiredRecord::new("old.example.net", RecordType::A)
                .with_desired_state(DesiredState::Absent),
        ],
    };

    println!("4. Applying desired state...");
    let report = Planner::new(store.clone(), queue.clone())
        .apply(&document)
        .await?;
    println!("   {} records written, {} jobs queued", report.writes(), report.jobs.len());

    queue.await_drain().await;
    println!("\n5. Queue drained. Shutting down dispatcher...");
    pool.shutdown().await?;

    // The reconciler, and with it the event sender, is dropped by shutdown
    let _ = tokio::time::timeout(Duration::from_millis(500), event_listener).await;

    println!("\n6. Final record status:");
    for record in dnsq_core::RecordStore::list(&*store).await? {
        println!(
            "   {:<20} {:<5} {:?} observed=v{} error={:?}",
            record.spec.name,
            record.spec.record_type,
            record.status.reconcile_status,
            record.status.observed_version,
            record.status.last_error
        );
    }

    println!("\n=== Embedding Successful ===");
    println!("Provider calls: {}", apply_calls.load(Ordering::SeqCst));
    println!("Key Points:");
    println!("- Dispatcher lifecycle is fully controlled by the application");
    println!("- Desired state can be built in code instead of YAML");
    println!("- ABSENT records converge without a provider call");

    Ok(())
}
