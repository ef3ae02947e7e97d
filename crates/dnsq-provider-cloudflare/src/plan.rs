//! Change planning for one record set
//!
//! Pure functions: given what Cloudflare currently holds for a name/type and
//! what the record set wants, decide which API calls make them equal.

use dnsq_core::error::ProviderError;
use dnsq_core::model::{RecordSet, RecordType};
use serde::Deserialize;
use serde_json::{Value, json};

/// A DNS record as listed by the Cloudflare API
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExistingRecord {
    pub id: String,
    pub content: String,
    pub ttl: u32,
    #[serde(default)]
    pub priority: Option<u16>,
}

impl ExistingRecord {
    /// The record's value in record-set form (`"10 mail.example.com"` for MX)
    pub fn value(&self) -> String {
        match self.priority {
            Some(priority) => format!("{} {}", priority, self.content),
            None => self.content.clone(),
        }
    }
}

/// One API call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// POST a new record holding `value`
    Create { value: String },
    /// PUT record `id` so it holds `value` with the desired TTL
    Update { id: String, value: String },
    /// DELETE record `id`
    Delete { id: String },
}

/// Ordered API calls for one record set
///
/// Updates come first, then creates, then deletes, so the name never resolves
/// to an empty set while the plan runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangePlan {
    /// Existing records that already match and are left alone
    pub unchanged: usize,
    pub changes: Vec<Change>,
}

impl ChangePlan {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Compute the calls that make `existing` hold exactly `values` at `ttl`
///
/// Records that already match are kept. Records holding a wanted value at the
/// wrong TTL are updated in place. Remaining records are reused for the
/// remaining values, and whatever is left over is created or deleted.
pub fn plan_changes(existing: &[ExistingRecord], ttl: u32, values: &[String]) -> ChangePlan {
    let mut wanted: Vec<&String> = Vec::with_capacity(values.len());
    for value in values {
        if !wanted.contains(&value) {
            wanted.push(value);
        }
    }

    let mut plan = ChangePlan::default();

    let mut leftover = Vec::new();
    for record in existing {
        let value = record.value();
        if record.ttl == ttl
            && let Some(pos) = wanted.iter().position(|v| **v == value)
        {
            wanted.remove(pos);
            plan.unchanged += 1;
        } else {
            leftover.push(record);
        }
    }

    let mut reusable = Vec::new();
    for record in leftover {
        let value = record.value();
        if let Some(pos) = wanted.iter().position(|v| **v == value) {
            wanted.remove(pos);
            plan.changes.push(Change::Update {
                id: record.id.clone(),
                value,
            });
        } else {
            reusable.push(record);
        }
    }

    let mut wanted = wanted.into_iter();
    let mut deletes = Vec::new();
    for record in reusable {
        match wanted.next() {
            Some(value) => plan.changes.push(Change::Update {
                id: record.id.clone(),
                value: value.clone(),
            }),
            None => deletes.push(Change::Delete {
                id: record.id.clone(),
            }),
        }
    }

    plan.changes.extend(wanted.map(|value| Change::Create {
        value: value.clone(),
    }));
    plan.changes.extend(deletes);
    plan
}

/// Record name as Cloudflare stores it (no trailing dot)
pub fn api_name(name: &str) -> &str {
    name.strip_suffix('.').unwrap_or(name)
}

/// Request body for creating or replacing one record holding `value`
pub fn record_body(record_set: &RecordSet, value: &str) -> Result<Value, ProviderError> {
    let name = api_name(&record_set.name);
    let record_type = record_set.record_type.as_str();

    match record_set.record_type {
        RecordType::Mx => {
            let (priority, host) = value.split_once(' ').ok_or_else(|| {
                ProviderError::invalid_record(format!(
                    "MX value '{}' for {} must be '<priority> <host>'",
                    value, record_set.name
                ))
            })?;
            let priority: u16 = priority.parse().map_err(|_| {
                ProviderError::invalid_record(format!(
                    "MX priority '{}' for {} is not a number",
                    priority, record_set.name
                ))
            })?;
            Ok(json!({
                "type": record_type,
                "name": name,
                "content": host.trim(),
                "ttl": record_set.ttl,
                "priority": priority,
            }))
        }
        RecordType::Srv | RecordType::Caa => Err(ProviderError::invalid_record(format!(
            "{} records are not supported by the Cloudflare provider ({})",
            record_type, record_set.name
        ))),
        _ => Ok(json!({
            "type": record_type,
            "name": name,
            "content": value,
            "ttl": record_set.ttl,
        })),
    }
}
