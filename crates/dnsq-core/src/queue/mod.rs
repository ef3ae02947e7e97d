//! In-memory job queue
//!
//! An unbounded FIFO of [`Job`]s shared between the planner (producer) and the
//! dispatcher workers (consumers).
//!
//! ## Protocol
//!
//! ```text
//! planner ── enqueue ──► [ mpsc channel ] ── dequeue(timeout) ──► worker
//!                                                                   │
//! caller ◄── await_drain ── [ completed == enqueued ] ◄── mark_done ┘
//! ```
//!
//! ## Completion Barrier
//!
//! `await_drain` waits on two shared counters, not on job identities. With
//! several workers it proves that *some* N jobs were marked done, not which
//! ones. If a worker dies between `dequeue` and `mark_done`, the barrier never
//! releases. Workers therefore mark every dequeued job done, whatever the
//! reconcile outcome.

use std::time::Duration;
use tokio::sync::{Mutex, mpsc, watch};

use crate::error::{Error, Result};
use crate::model::Job;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Counters {
    enqueued: u64,
    completed: u64,
}

impl Counters {
    fn drained(&self) -> bool {
        self.completed >= self.enqueued
    }
}

/// Unbounded, thread-safe FIFO job queue with a completion barrier
///
/// # Example
///
/// ```rust,no_run
/// use dnsq_core::queue::JobQueue;
/// use dnsq_core::model::{Job, RecordId};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> dnsq_core::Result<()> {
///     let queue = JobQueue::new();
///     queue.enqueue(Job::new(RecordId::new(), 1));
///
///     if let Some(job) = queue.dequeue(Duration::from_secs(2)).await {
///         // ... reconcile job ...
///         queue.mark_done()?;
///     }
///
///     queue.await_drain().await;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<Job>,
    rx: Mutex<mpsc::UnboundedReceiver<Job>>,
    counters: watch::Sender<Counters>,
}

impl JobQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (counters, _) = watch::channel(Counters::default());

        Self {
            tx,
            rx: Mutex::new(rx),
            counters,
        }
    }

    /// Append a job
    ///
    /// Never blocks. Jobs from one producer become dequeue-eligible in the
    /// order they were enqueued.
    pub fn enqueue(&self, job: Job) {
        // Count before sending so a fast worker can never mark_done ahead of us
        self.counters.send_modify(|c| c.enqueued += 1);

        tracing::debug!(
            "Enqueued job for record {} (target_version={})",
            job.record_id,
            job.target_version
        );

        // The receiver lives as long as the queue, so this cannot fail
        let _ = self.tx.send(job);
    }

    /// Take the next job, waiting at most `timeout`
    ///
    /// # Returns
    ///
    /// - `Some(Job)`: The oldest job not yet claimed by any worker
    /// - `None`: Nothing arrived within `timeout` (not an error)
    pub async fn dequeue(&self, timeout: Duration) -> Option<Job> {
        // recv() is cancel-safe: a timeout never loses a job
        tokio::time::timeout(timeout, async {
            let mut rx = self.rx.lock().await;
            rx.recv().await
        })
        .await
        .ok()
        .flatten()
    }

    /// Record that one previously dequeued job finished processing
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Completion counted
    /// - `Err(Error::Queue)`: More completions than enqueued jobs
    pub fn mark_done(&self) -> Result<()> {
        let mut result = Ok(());
        self.counters.send_if_modified(|c| {
            if c.drained() {
                result = Err(Error::queue("mark_done called more times than jobs were enqueued"));
                false
            } else {
                c.completed += 1;
                true
            }
        });
        result
    }

    /// Wait until every job enqueued so far has been marked done
    ///
    /// Has no timeout. Jobs enqueued while waiting extend the wait.
    pub async fn await_drain(&self) {
        let mut rx = self.counters.subscribe();
        // The sender is owned by self, so the channel stays open while we wait
        let _ = rx.wait_for(Counters::drained).await;
    }

    /// Total number of jobs ever enqueued
    pub fn enqueued_count(&self) -> u64 {
        self.counters.borrow().enqueued
    }

    /// Total number of `mark_done` calls
    pub fn completed_count(&self) -> u64 {
        self.counters.borrow().completed
    }

    /// Jobs enqueued but not yet marked done (queued or in flight)
    pub fn pending_count(&self) -> u64 {
        let c = *self.counters.borrow();
        c.enqueued - c.completed
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}
