//! Dispatcher pool
//!
//! Runs N concurrent workers. Each worker loops:
//!
//! ```text
//! dequeue(poll_interval) ──► None ──► loop (idle poll)
//!        │
//!        └─► Some(job) ──► reconcile(job) ──► mark_done() ──► loop
//! ```
//!
//! `mark_done` is called whatever the reconcile outcome: provider failures are
//! captured in the record status, store failures are logged. One failing record
//! never stops a worker.
//!
//! Any idle worker may claim the next job, so two jobs for the same record may
//! run out of enqueue order. The reconciler's staleness check turns the older
//! one into a no-op.
//!
//! Workers run until [`DispatcherPool::shutdown`] is called or the process
//! exits. Shutdown is observed between jobs, never in the middle of one.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span};

use crate::config::DispatcherConfig;
use crate::error::{Error, Result};
use crate::queue::JobQueue;
use crate::reconciler::Reconciler;

/// Pool of dispatcher workers sharing one queue and one reconciler
pub struct DispatcherPool {
    workers: Vec<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
}

impl DispatcherPool {
    /// Spawn `config.workers` workers on the current tokio runtime
    ///
    /// Workers are named `dispatcher-1`, `dispatcher-2`, ... and each runs in a
    /// `dispatcher` tracing span carrying its name.
    pub fn start(
        config: &DispatcherConfig,
        queue: Arc<JobQueue>,
        reconciler: Arc<Reconciler>,
    ) -> Result<Self> {
        config.validate()?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let poll_interval = config.poll_interval();

        let workers = (1..=config.workers)
            .map(|i| {
                let name = format!("dispatcher-{}", i);
                let span = info_span!("dispatcher", worker = %name);
                tokio::spawn(
                    dispatcher_loop(
                        name,
                        Arc::clone(&queue),
                        Arc::clone(&reconciler),
                        poll_interval,
                        shutdown_rx.clone(),
                    )
                    .instrument(span),
                )
            })
            .collect();

        Ok(Self {
            workers,
            shutdown_tx,
        })
    }

    /// Number of workers in the pool
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Stop all workers and wait for them to exit
    ///
    /// A worker in the middle of a reconcile finishes that job (including
    /// `mark_done`) first. Jobs still queued stay queued.
    pub async fn shutdown(self) -> Result<()> {
        self.shutdown_tx.send_replace(true);

        let mut failed = 0;
        for handle in self.workers {
            if let Err(e) = handle.await {
                error!("Dispatcher worker ended abnormally: {}", e);
                failed += 1;
            }
        }

        if failed > 0 {
            return Err(Error::Other(format!(
                "{} dispatcher worker(s) ended abnormally",
                failed
            )));
        }

        info!("Dispatcher pool stopped");
        Ok(())
    }
}

/// Body of one dispatcher worker
async fn dispatcher_loop(
    name: String,
    queue: Arc<JobQueue>,
    reconciler: Arc<Reconciler>,
    poll_interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    info!("Dispatcher {} starting", name);

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let job = tokio::select! {
            job = queue.dequeue(poll_interval) => job,
            // A dropped pool closes the channel; that is not a shutdown request
            Ok(()) = shutdown_rx.changed() => continue,
        };

        let Some(job) = job else {
            debug!("Dispatcher {} idle", name);
            continue;
        };

        info!(
            "Dispatcher {} picked up job for record {} (target_version={})",
            name, job.record_id, job.target_version
        );

        match reconciler.reconcile(&job).await {
            Ok(outcome) => debug!(?outcome, "Job for record {} finished", job.record_id),
            Err(e) => error!(
                "Reconcile attempt for record {} abandoned: {}",
                job.record_id, e
            ),
        }

        if let Err(e) = queue.mark_done() {
            error!("Failed to mark job done: {}", e);
        }
    }

    info!("Dispatcher {} stopped", name);
}
