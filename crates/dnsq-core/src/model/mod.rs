// # Data Model
//
// Versioned desired/observed state for DNS records, plus the transient job
// message that flows through the queue.
//
// - [`Record`]: aggregate root, one per `(zone_id, name, type)` identity
// - [`RecordSpec`]: desired state, carries the monotonically increasing `version`
// - [`RecordStatus`]: observed state, driven only by [`StatusTransition`]s
// - [`Job`]: `{record_id, target_version}` snapshot handed to dispatchers

pub mod job;
pub mod record;

pub use job::Job;
pub use record::{
    DesiredState, ReconcileStatus, Record, RecordId, RecordKey, RecordSet, RecordSpec,
    RecordStatus, RecordType, StatusTransition,
};
