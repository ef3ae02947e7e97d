use super::record::RecordId;

/// Transient reconcile request
///
/// A snapshot of the version the planner wants a dispatcher to converge to.
/// Jobs are never persisted, never retried, and never re-enqueued by the
/// reconciler. If the record has moved past `target_version` by the time the
/// job runs, the job is stale and has no effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Record to reconcile
    pub record_id: RecordId,
    /// Spec version this job was issued for
    pub target_version: u64,
}

impl Job {
    /// Create a new job
    pub fn new(record_id: RecordId, target_version: u64) -> Self {
        Self {
            record_id,
            target_version,
        }
    }
}
