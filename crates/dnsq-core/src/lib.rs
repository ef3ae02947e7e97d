// # dnsq-core
//
// Core library for the dnsq DNS record control plane.
//
// ## Architecture Overview
//
// - **Planner**: Turns a desired-state document into versioned record writes and jobs
// - **JobQueue**: Unbounded FIFO of jobs plus a completion barrier
// - **DispatcherPool**: N workers that pull jobs and hand them to the reconciler
// - **Reconciler**: Per-job state machine PENDING → APPLYING → IN_SYNC | ERROR
// - **RecordStore**: Trait for the document store holding desired and observed state
// - **DnsProvider**: Trait for converging one record set at a DNS service
// - **ProviderRegistry**: Plugin-based registry for providers and record stores
//
// ## Flow
//
// Planner → write record (version bump) → enqueue Job{record_id, version}
//   → dispatcher dequeues → reconciler loads record → stale? drop
//   → APPLYING → provider.apply → IN_SYNC | ERROR → mark_done

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod model;
pub mod planner;
pub mod provider;
pub mod queue;
pub mod reconciler;
pub mod registry;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use config::{
    DesiredRecord, DesiredStateDocument, DispatcherConfig, DnsqConfig, ProviderConfig,
    RecordStoreConfig,
};
pub use dispatcher::DispatcherPool;
pub use error::{Error, ProviderError, Result};
pub use model::{
    DesiredState, Job, ReconcileStatus, Record, RecordId, RecordKey, RecordSet, RecordSpec,
    RecordStatus, RecordType, StatusTransition,
};
pub use planner::{PlanReport, Planner};
pub use provider::MockProvider;
pub use queue::JobQueue;
pub use reconciler::{ReconcileEvent, ReconcileOutcome, Reconciler};
pub use registry::ProviderRegistry;
pub use store::{FileRecordStore, MemoryRecordStore};
pub use traits::{DnsProvider, RecordStore};
