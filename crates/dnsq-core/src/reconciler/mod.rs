//! Record reconciler
//!
//! The Reconciler is responsible for:
//! - Loading the record a job refers to
//! - Dropping missing and stale jobs without side effects
//! - Driving the reconcile state machine and writing status back
//! - Calling the DnsProvider for PRESENT records
//!
//! ## Architecture
//!
//! ```text
//!        Job{record_id, target_version}
//!                     │
//!                     ▼
//!            ┌──────────────┐
//!            │  Reconciler  │
//!            └──────────────┘
//!                     │
//!      ┌──────────────┼──────────────┐
//!      │              │              │
//!      ▼              ▼              ▼
//! ┌──────────┐  ┌─────────────┐  ┌──────────┐
//! │  Record  │  │ DnsProvider │  │  Events  │
//! │  Store   │  │  (apply)    │  │ (notify) │
//! └──────────┘  └─────────────┘  └──────────┘
//! ```
//!
//! ## State Machine
//!
//! 1. Load record; missing → no-op
//! 2. `spec.version != target_version` → stale, no-op (status untouched)
//! 3. Write APPLYING
//! 4. PRESENT → `provider.apply`; ABSENT → no-op success
//! 5. Success → IN_SYNC, `observed_version = version` (one write)
//! 6. Failure → ERROR, `last_error` set, `observed_version` unchanged (one write)
//!
//! A stale job leaves the record exactly as the newer planner write left it.
//! If the newer job is itself lost, the record stays below IN_SYNC until the
//! next planner write.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::{ProviderError, Result};
use crate::model::{DesiredState, Job, RecordId, StatusTransition};
use crate::traits::{DnsProvider, RecordStore};

/// What a single reconcile attempt did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The record no longer exists; job dropped
    Missing,
    /// The record moved past the job's target version; job dropped
    Stale { current_version: u64 },
    /// The record converged at `version`
    InSync { version: u64 },
    /// The provider failed while converging `version`
    Failed { version: u64, error: String },
}

/// Events emitted by the Reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileEvent {
    /// Job referenced a record that no longer exists
    RecordMissing { record_id: RecordId },

    /// Job was superseded by a later planner write
    JobStale {
        record_id: RecordId,
        target_version: u64,
        current_version: u64,
    },

    /// Record marked APPLYING
    ApplyStarted { record_id: RecordId, version: u64 },

    /// Record marked IN_SYNC
    ApplySucceeded { record_id: RecordId, version: u64 },

    /// Record marked ERROR
    ApplyFailed {
        record_id: RecordId,
        version: u64,
        error: String,
    },
}

/// Core reconciler
///
/// Depends only on the [`RecordStore`] and [`DnsProvider`] traits. One
/// instance is shared by every dispatcher worker.
pub struct Reconciler {
    /// Source of truth for record documents
    store: Arc<dyn RecordStore>,

    /// Provider that converges record sets
    provider: Arc<dyn DnsProvider>,

    /// Event sender for external monitoring
    event_tx: Option<mpsc::Sender<ReconcileEvent>>,
}

impl Reconciler {
    /// Create a reconciler without an event channel
    pub fn new(store: Arc<dyn RecordStore>, provider: Arc<dyn DnsProvider>) -> Self {
        Self {
            store,
            provider,
            event_tx: None,
        }
    }

    /// Create a reconciler that reports [`ReconcileEvent`]s
    ///
    /// # Parameters
    ///
    /// - `capacity`: Bound of the event channel; events are dropped when it is full
    ///
    /// # Returns
    ///
    /// A tuple of (reconciler, event_receiver)
    pub fn with_events(
        store: Arc<dyn RecordStore>,
        provider: Arc<dyn DnsProvider>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<ReconcileEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        let reconciler = Self {
            store,
            provider,
            event_tx: Some(tx),
        };
        (reconciler, rx)
    }

    /// Reconcile the record referenced by `job`
    ///
    /// # Returns
    ///
    /// - `Ok(ReconcileOutcome)`: The attempt ran to completion; provider
    ///   failures are reported as [`ReconcileOutcome::Failed`], not as errors
    /// - `Err(Error)`: The record store failed; the attempt was abandoned
    pub async fn reconcile(&self, job: &Job) -> Result<ReconcileOutcome> {
        let Some(record) = self.store.get(job.record_id).await? else {
            info!(
                "Record {} no longer exists; treating job as no-op",
                job.record_id
            );
            self.emit_event(ReconcileEvent::RecordMissing {
                record_id: job.record_id,
            });
            return Ok(ReconcileOutcome::Missing);
        };

        let current_version = record.spec.version;

        if current_version != job.target_version {
            info!(
                "Stale job for record {} (job version={}, current version={}); no-op",
                job.record_id, job.target_version, current_version
            );
            self.emit_event(ReconcileEvent::JobStale {
                record_id: job.record_id,
                target_version: job.target_version,
                current_version,
            });
            return Ok(ReconcileOutcome::Stale { current_version });
        }

        if !self
            .store
            .update_status(record.id, StatusTransition::Applying)
            .await?
        {
            info!(
                "Record {} disappeared before apply; treating job as no-op",
                record.id
            );
            self.emit_event(ReconcileEvent::RecordMissing {
                record_id: record.id,
            });
            return Ok(ReconcileOutcome::Missing);
        }

        self.emit_event(ReconcileEvent::ApplyStarted {
            record_id: record.id,
            version: current_version,
        });

        let now = Utc::now();

        let applied: std::result::Result<(), ProviderError> = match record.spec.desired_state {
            DesiredState::Present => {
                debug!(
                    "Applying {} {} v{} via {}",
                    record.spec.record_type,
                    record.spec.name,
                    current_version,
                    self.provider.provider_name()
                );
                self.provider.apply(&record.spec.to_record_set()).await
            }
            DesiredState::Absent => {
                info!(
                    "Desired state ABSENT for {}; delete not implemented, no-op",
                    record.id
                );
                Ok(())
            }
        };

        let (transition, outcome, event) = match applied {
            Ok(()) => (
                StatusTransition::InSync {
                    observed_version: current_version,
                    at: now,
                },
                ReconcileOutcome::InSync {
                    version: current_version,
                },
                ReconcileEvent::ApplySucceeded {
                    record_id: record.id,
                    version: current_version,
                },
            ),
            Err(e) => {
                let message = e.to_string();
                error!("Failed to reconcile record {}: {}", record.id, message);
                (
                    StatusTransition::Failed {
                        error: message.clone(),
                        at: now,
                    },
                    ReconcileOutcome::Failed {
                        version: current_version,
                        error: message.clone(),
                    },
                    ReconcileEvent::ApplyFailed {
                        record_id: record.id,
                        version: current_version,
                        error: message,
                    },
                )
            }
        };

        if !self.store.update_status(record.id, transition).await? {
            warn!(
                "Record {} disappeared before its status could be written",
                record.id
            );
        }

        if let ReconcileOutcome::InSync { version } = &outcome {
            info!(
                "Successfully reconciled record {} to version {}",
                record.id, version
            );
        }

        self.emit_event(event);
        Ok(outcome)
    }

    /// Emit a reconcile event
    fn emit_event(&self, event: ReconcileEvent) {
        let Some(tx) = &self.event_tx else {
            return;
        };

        // Send event, logging warning if channel is full (backpressure)
        if tx.try_send(event).is_err() {
            warn!("Reconcile event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}
