// # Record Aggregate
//
// One record document per `(zone_id, name, type)` identity. The `spec` section
// is written by the planner, the `status` section by the reconciler.
//
// ## Document Shape
//
// ```json
// {
//   "_id": "6f1c...",
//   "spec": { "zoneId": "Z1", "name": "a.example.com", "type": "A", "ttl": 60,
//             "values": ["1.2.3.4"], "desiredState": "PRESENT", "version": 1 },
//   "status": { "reconcileStatus": "PENDING", "observedVersion": 0,
//               "lastError": null, "lastReconciledAt": null },
//   "createdAt": "...", "updatedAt": "..."
// }
// ```
//
// ## Invariants
//
// - `spec.version` strictly increases on every spec write ([`Record::replace_spec`])
// - `status.observed_version` only moves on a successful reconciliation and
//   always equals the version reconciled at that time
// - `status` only changes through [`StatusTransition`]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Opaque record identity, stable for the lifetime of the record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Generate a fresh identity
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RecordId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| Error::invalid_input(format!("Invalid record id '{}': {}", s, e)))
    }
}

/// DNS record type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    /// IPv4 address
    A,
    /// IPv6 address
    Aaaa,
    /// Canonical name
    Cname,
    /// Free-form text
    Txt,
    /// Mail exchanger
    Mx,
    /// Name server
    Ns,
    /// Service locator
    Srv,
    /// Certification authority authorization
    Caa,
}

impl RecordType {
    /// The DNS mnemonic for this type
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Cname => "CNAME",
            RecordType::Txt => "TXT",
            RecordType::Mx => "MX",
            RecordType::Ns => "NS",
            RecordType::Srv => "SRV",
            RecordType::Caa => "CAA",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the record should exist at the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DesiredState {
    /// Record should exist with the spec'd values
    #[default]
    Present,
    /// Record should not exist (deletion is not performed; reconciles as a no-op)
    Absent,
}

/// Where a record is in the reconcile state machine
///
/// ```text
/// PENDING ──► APPLYING ──┬──► IN_SYNC
///    ▲                   └──► ERROR
///    └──────── planner version bump ◄──┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReconcileStatus {
    /// Written by the planner, waiting for a dispatcher
    #[default]
    Pending,
    /// A dispatcher is converging this version
    Applying,
    /// Last attempt converged `observed_version`
    InSync,
    /// Last attempt failed, see `last_error`
    Error,
}

impl fmt::Display for ReconcileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReconcileStatus::Pending => "PENDING",
            ReconcileStatus::Applying => "APPLYING",
            ReconcileStatus::InSync => "IN_SYNC",
            ReconcileStatus::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Identity key of a record: at most one record exists per key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub zone_id: String,
    pub name: String,
    pub record_type: RecordType,
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zone_id, self.name, self.record_type)
    }
}

/// Desired state of a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSpec {
    /// Zone the record lives in (provider zone identifier)
    pub zone_id: String,
    /// Fully qualified record name
    pub name: String,
    /// Record type
    #[serde(rename = "type")]
    pub record_type: RecordType,
    /// Time-to-live in seconds
    pub ttl: u32,
    /// Record values, in order
    pub values: Vec<String>,
    /// Present or absent
    pub desired_state: DesiredState,
    /// Monotonically increasing spec version, starts at 1
    pub version: u64,
}

impl RecordSpec {
    /// Identity key of this spec
    pub fn key(&self) -> RecordKey {
        RecordKey {
            zone_id: self.zone_id.clone(),
            name: self.name.clone(),
            record_type: self.record_type,
        }
    }

    /// Whether two specs describe the same desired state, ignoring `version`
    pub fn same_desired_state(&self, other: &RecordSpec) -> bool {
        self.zone_id == other.zone_id
            && self.name == other.name
            && self.record_type == other.record_type
            && self.ttl == other.ttl
            && self.values == other.values
            && self.desired_state == other.desired_state
    }

    /// Provider-facing projection of this spec
    pub fn to_record_set(&self) -> RecordSet {
        RecordSet {
            zone_id: self.zone_id.clone(),
            name: self.name.clone(),
            record_type: self.record_type,
            ttl: self.ttl,
            values: self.values.clone(),
            version: self.version,
        }
    }
}

/// What a provider is asked to converge to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordSet {
    pub zone_id: String,
    pub name: String,
    pub record_type: RecordType,
    pub ttl: u32,
    pub values: Vec<String>,
    /// Spec version this record set was built from (for logging)
    pub version: u64,
}

/// Observed state of a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordStatus {
    pub reconcile_status: ReconcileStatus,
    /// Last spec version successfully reconciled (0 = never)
    pub observed_version: u64,
    pub last_error: Option<String>,
    pub last_reconciled_at: Option<DateTime<Utc>>,
}

impl RecordStatus {
    /// Status of a freshly created record
    pub fn pending() -> Self {
        Self {
            reconcile_status: ReconcileStatus::Pending,
            observed_version: 0,
            last_error: None,
            last_reconciled_at: None,
        }
    }
}

impl Default for RecordStatus {
    fn default() -> Self {
        Self::pending()
    }
}

/// A single atomic status write issued by the reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusTransition {
    /// Work in progress; touches `reconcile_status` only
    Applying,
    /// Provider converged `observed_version`
    InSync {
        observed_version: u64,
        at: DateTime<Utc>,
    },
    /// Provider (or the attempt) failed; `observed_version` is left alone
    Failed { error: String, at: DateTime<Utc> },
}

/// Aggregate root for a DNS record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    #[serde(rename = "_id")]
    pub id: RecordId,
    pub spec: RecordSpec,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record {
    /// Create a new record
    ///
    /// New records always start at `version = 1`, `observed_version = 0`,
    /// `reconcile_status = PENDING`, whatever version the caller put in `spec`.
    pub fn new(mut spec: RecordSpec, now: DateTime<Utc>) -> Self {
        spec.version = 1;
        Self {
            id: RecordId::new(),
            spec,
            status: RecordStatus::pending(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Identity key of this record
    pub fn key(&self) -> RecordKey {
        self.spec.key()
    }

    /// Planner write: replace the spec and reset status to PENDING
    ///
    /// The new spec must carry a version strictly greater than the stored one.
    /// The identity key may not change.
    pub fn replace_spec(&mut self, spec: RecordSpec, now: DateTime<Utc>) -> Result<()> {
        if spec.version <= self.spec.version {
            return Err(Error::version_conflict(
                self.id,
                self.spec.version,
                spec.version,
            ));
        }
        if spec.key() != self.key() {
            return Err(Error::invalid_input(format!(
                "Spec write for record {} changes identity {} -> {}",
                self.id,
                self.key(),
                spec.key()
            )));
        }

        self.spec = spec;
        self.status.reconcile_status = ReconcileStatus::Pending;
        self.updated_at = now;
        Ok(())
    }

    /// Reconciler write: apply one status transition
    pub fn apply_transition(&mut self, transition: StatusTransition) {
        match transition {
            StatusTransition::Applying => {
                self.status.reconcile_status = ReconcileStatus::Applying;
            }
            StatusTransition::InSync {
                observed_version,
                at,
            } => {
                self.status.reconcile_status = ReconcileStatus::InSync;
                self.status.observed_version = observed_version;
                self.status.last_error = None;
                self.status.last_reconciled_at = Some(at);
                self.updated_at = at;
            }
            StatusTransition::Failed { error, at } => {
                self.status.reconcile_status = ReconcileStatus::Error;
                self.status.last_error = Some(error);
                self.status.last_reconciled_at = Some(at);
                self.updated_at = at;
            }
        }
    }

    /// Whether the last reconciliation converged the current spec version
    pub fn is_converged(&self) -> bool {
        self.status.reconcile_status == ReconcileStatus::InSync
            && self.status.observed_version == self.spec.version
    }
}
