//! Planner
//!
//! Turns a [`DesiredStateDocument`] into record writes and jobs.
//!
//! For every desired record:
//!
//! | Stored record                         | Write                      | Job |
//! |---------------------------------------|----------------------------|-----|
//! | none                                  | insert at `version = 1`    | yes |
//! | different spec                        | replace at `version + 1`   | yes |
//! | same spec, IN_SYNC at current version | none                       | no  |
//! | same spec, anything else              | replace at `version + 1`   | yes |
//!
//! The write always lands before the job is enqueued, so a dispatcher never
//! sees a job whose target version is not yet stored.

use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{DesiredRecord, DesiredStateDocument};
use crate::error::Result;
use crate::model::{Job, Record, RecordSpec};
use crate::queue::JobQueue;
use crate::traits::RecordStore;

/// Summary of one planner pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanReport {
    /// Records inserted at version 1
    pub created: usize,
    /// Records rewritten at a higher version
    pub updated: usize,
    /// Records left untouched because they are already converged
    pub unchanged: usize,
    /// Jobs enqueued, in enqueue order
    pub jobs: Vec<Job>,
}

impl PlanReport {
    /// Number of store writes performed
    pub fn writes(&self) -> usize {
        self.created + self.updated
    }
}

/// Writes desired state into the record store and feeds the queue
pub struct Planner {
    store: Arc<dyn RecordStore>,
    queue: Arc<JobQueue>,
}

impl Planner {
    pub fn new(store: Arc<dyn RecordStore>, queue: Arc<JobQueue>) -> Self {
        Self { store, queue }
    }

    /// Load a YAML document from disk and apply it
    pub async fn apply_file(&self, path: impl AsRef<Path>) -> Result<PlanReport> {
        let document = DesiredStateDocument::load(path).await?;
        self.apply(&document).await
    }

    /// Apply a desired-state document
    ///
    /// Stops at the first store error. Writes and jobs made before the error
    /// stay in place.
    pub async fn apply(&self, document: &DesiredStateDocument) -> Result<PlanReport> {
        document.validate()?;

        let mut report = PlanReport::default();
        for desired in &document.records {
            let spec = desired_spec(&document.zone_id, desired);
            self.plan_record(spec, &mut report).await?;
        }

        info!(
            "Planned zone {}: {} created, {} updated, {} unchanged",
            document.zone_id, report.created, report.updated, report.unchanged
        );
        Ok(report)
    }

    async fn plan_record(&self, mut spec: RecordSpec, report: &mut PlanReport) -> Result<()> {
        let now = Utc::now();

        let job = match self.store.find_by_key(&spec.key()).await? {
            None => {
                let record = Record::new(spec, now);
                self.store.insert(&record).await?;
                info!("Created record {} ({})", record.id, record.key());
                report.created += 1;
                Job::new(record.id, record.spec.version)
            }
            Some(existing)
                if existing.spec.same_desired_state(&spec) && existing.is_converged() =>
            {
                debug!(
                    "Record {} unchanged and in sync at version {}",
                    existing.id, existing.spec.version
                );
                report.unchanged += 1;
                return Ok(());
            }
            Some(existing) => {
                spec.version = existing.spec.version + 1;
                let record = self.store.replace_spec(existing.id, spec, now).await?;
                info!(
                    "Updated record {} ({}) to version {}",
                    record.id,
                    record.key(),
                    record.spec.version
                );
                report.updated += 1;
                Job::new(record.id, record.spec.version)
            }
        };

        self.queue.enqueue(job.clone());
        report.jobs.push(job);
        Ok(())
    }
}

/// Spec for a desired record; the version is assigned by the planner
fn desired_spec(zone_id: &str, desired: &DesiredRecord) -> RecordSpec {
    RecordSpec {
        zone_id: zone_id.to_string(),
        name: desired.name.clone(),
        record_type: desired.record_type,
        ttl: desired.ttl,
        values: desired.values.clone(),
        desired_state: desired.desired_state,
        version: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RecordType, ReconcileStatus, StatusTransition};
    use crate::store::MemoryRecordStore;

    fn document(values: &[&str]) -> DesiredStateDocument {
        DesiredStateDocument {
            zone_id: "Z1".to_string(),
            records: vec![
                DesiredRecord::new("a.example.com", RecordType::A).with_values(values.to_vec()),
            ],
        }
    }

    fn planner() -> (Arc<MemoryRecordStore>, Arc<JobQueue>, Planner) {
        let store = Arc::new(MemoryRecordStore::new());
        let queue = Arc::new(JobQueue::new());
        let planner = Planner::new(store.clone(), queue.clone());
        (store, queue, planner)
    }

    #[tokio::test]
    async fn new_record_is_inserted_at_version_one() {
        let (store, queue, planner) = planner();

        let report = planner.apply(&document(&["1.2.3.4"])).await.unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.jobs.len(), 1);
        assert_eq!(report.jobs[0].target_version, 1);
        assert_eq!(queue.enqueued_count(), 1);

        let record = store.get(report.jobs[0].record_id).await.unwrap().unwrap();
        assert_eq!(record.spec.version, 1);
        assert_eq!(record.status.reconcile_status, ReconcileStatus::Pending);
    }

    #[tokio::test]
    async fn converged_unchanged_record_is_skipped() {
        let (store, queue, planner) = planner();
        let first = planner.apply(&document(&["1.2.3.4"])).await.unwrap();
        let id = first.jobs[0].record_id;
        store
            .update_status(
                id,
                StatusTransition::InSync {
                    observed_version: 1,
                    at: Utc::now(),
                },
            )
            .await
            .unwrap();

        let second = planner.apply(&document(&["1.2.3.4"])).await.unwrap();
        assert_eq!(second.unchanged, 1);
        assert!(second.jobs.is_empty());
        assert_eq!(queue.enqueued_count(), 1);
        assert_eq!(store.get(id).await.unwrap().unwrap().spec.version, 1);
    }

    #[tokio::test]
    async fn unconverged_unchanged_record_is_bumped() {
        let (store, _queue, planner) = planner();
        let first = planner.apply(&document(&["1.2.3.4"])).await.unwrap();
        let id = first.jobs[0].record_id;
        store
            .update_status(
                id,
                StatusTransition::Failed {
                    error: "boom".to_string(),
                    at: Utc::now(),
                },
            )
            .await
            .unwrap();

        let second = planner.apply(&document(&["1.2.3.4"])).await.unwrap();
        assert_eq!(second.updated, 1);
        assert_eq!(second.jobs, vec![Job::new(id, 2)]);

        let record = store.get(id).await.unwrap().unwrap();
        assert_eq!(record.status.reconcile_status, ReconcileStatus::Pending);
        assert_eq!(record.status.last_error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn changed_values_bump_version() {
        let (store, _queue, planner) = planner();
        let first = planner.apply(&document(&["1.2.3.4"])).await.unwrap();
        let id = first.jobs[0].record_id;

        let second = planner.apply(&document(&["5.6.7.8"])).await.unwrap();
        assert_eq!(second.writes(), 1);

        let record = store.get(id).await.unwrap().unwrap();
        assert_eq!(record.spec.version, 2);
        assert_eq!(record.spec.values, vec!["5.6.7.8".to_string()]);
    }

    #[tokio::test]
    async fn invalid_document_writes_nothing() {
        let (store, queue, planner) = planner();
        let mut doc = document(&["1.2.3.4"]);
        doc.zone_id = String::new();

        assert!(planner.apply(&doc).await.is_err());
        assert!(store.is_empty().await);
        assert_eq!(queue.enqueued_count(), 0);
    }
}
