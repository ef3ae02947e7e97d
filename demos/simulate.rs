//! Two-phase planner simulation
//!
//! Applies `config/example-records.yaml`, waits for the dispatcher to drain,
//! then applies `config/example-records-v2.yaml` and prints the record store
//! after each phase. Uses the mock provider and the memory store, so nothing
//! leaves the process.
//!
//! ```bash
//! cargo run -p dnsq-demos --bin simulate
//! ```

use dnsq_core::{
    DispatcherConfig, DispatcherPool, JobQueue, MemoryRecordStore, MockProvider, PlanReport,
    Planner, Reconciler, RecordStore, Result,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

fn config_path(file: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("config").join(file)
}

async fn print_records(store: &dyn RecordStore) -> Result<()> {
    for record in store.list().await? {
        println!("{}", serde_json::to_string_pretty(&record)?);
    }
    Ok(())
}

fn print_report(phase: &str, report: &PlanReport) {
    println!(
        "{}: created={} updated={} unchanged={} jobs={}",
        phase,
        report.created,
        report.updated,
        report.unchanged,
        report.jobs.len()
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let store = Arc::new(MemoryRecordStore::new());
    let provider = MockProvider::new();
    let queue = Arc::new(JobQueue::new());
    let reconciler = Arc::new(Reconciler::new(store.clone(), Arc::new(provider.clone())));

    let dispatcher = DispatcherConfig::default()
        .with_workers(2)
        .with_poll_interval(Duration::from_millis(50));
    let pool = DispatcherPool::start(&dispatcher, queue.clone(), reconciler)?;
    let planner = Planner::new(store.clone(), queue.clone());

    println!("=== Phase 1 ===");
    let report = planner
        .apply_file(config_path("example-records.yaml"))
        .await?;
    print_report("phase 1", &report);
    queue.await_drain().await;
    print_records(&*store).await?;

    println!("\n=== Phase 2 ===");
    let report = planner
        .apply_file(config_path("example-records-v2.yaml"))
        .await?;
    print_report("phase 2", &report);
    queue.await_drain().await;
    print_records(&*store).await?;

    pool.shutdown().await?;

    println!(
        "\nProvider calls: {} (jobs completed: {})",
        provider.apply_count(),
        queue.completed_count()
    );
    Ok(())
}
