//! Configuration types for the dnsq control plane
//!
//! Two kinds of configuration live here:
//! - [`DnsqConfig`]: how the runtime is wired (provider, record store, dispatcher)
//! - [`DesiredStateDocument`]: the YAML document the planner turns into record writes

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::model::{DesiredState, RecordType};

/// Main runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DnsqConfig {
    /// DNS provider configuration
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Record store configuration
    #[serde(default)]
    pub store: RecordStoreConfig,

    /// Dispatcher pool settings
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
}

impl DnsqConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.provider.validate()?;
        self.store.validate()?;
        self.dispatcher.validate()?;
        Ok(())
    }
}

/// DNS provider configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Logging provider with no external effect
    #[default]
    Mock,

    /// Cloudflare provider
    Cloudflare {
        /// Cloudflare API token
        api_token: String,
        /// Log the change plan without mutating anything
        #[serde(default)]
        dry_run: bool,
    },

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Mock => Ok(()),
            ProviderConfig::Cloudflare { api_token, .. } => {
                if api_token.is_empty() {
                    return Err(crate::Error::config("Cloudflare API token cannot be empty"));
                }
                Ok(())
            }
            ProviderConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom provider factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom provider config cannot be null",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Mock => "mock",
            ProviderConfig::Cloudflare { .. } => "cloudflare",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Record store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecordStoreConfig {
    /// JSON document file
    File {
        /// Path to the record file
        path: String,
    },

    /// In-memory store (not persistent)
    #[default]
    Memory,

    /// Custom record store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl RecordStoreConfig {
    /// Validate the record store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            RecordStoreConfig::File { path } if path.is_empty() => {
                Err(crate::Error::config("Record store file path cannot be empty"))
            }
            RecordStoreConfig::Custom { factory, .. } if factory.is_empty() => Err(
                crate::Error::config("Custom record store factory cannot be empty"),
            ),
            _ => Ok(()),
        }
    }

    /// Get the record store type name
    pub fn type_name(&self) -> &str {
        match self {
            RecordStoreConfig::File { .. } => "file",
            RecordStoreConfig::Memory => "memory",
            RecordStoreConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Dispatcher pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Number of concurrent workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Bounded wait for a single dequeue, in milliseconds
    ///
    /// An empty dequeue is not an error; the worker simply polls again.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Capacity of the reconcile event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl DispatcherConfig {
    /// Validate the dispatcher configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.workers == 0 {
            return Err(crate::Error::config("Dispatcher needs at least one worker"));
        }
        if self.poll_interval_ms == 0 {
            return Err(crate::Error::config("Dispatcher poll interval must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }

    /// Dequeue wait as a [`Duration`]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Set the worker count
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the dequeue wait
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval_ms = poll_interval.as_millis() as u64;
        self
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            poll_interval_ms: default_poll_interval_ms(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_workers() -> usize {
    1
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_event_channel_capacity() -> usize {
    1000
}

/// Desired-state document consumed by the planner
///
/// ```yaml
/// zone_id: Z1
/// records:
///   - name: a.example.com
///     type: A
///     ttl: 60
///     values: ["1.2.3.4"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredStateDocument {
    /// Zone every record in this document belongs to
    pub zone_id: String,

    /// Desired records
    #[serde(default)]
    pub records: Vec<DesiredRecord>,
}

impl DesiredStateDocument {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self, crate::Error> {
        let document: DesiredStateDocument = serde_yaml::from_str(yaml)?;
        document.validate()?;
        Ok(document)
    }

    /// Read, parse and validate a YAML document from disk
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, crate::Error> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            crate::Error::config(format!(
                "Failed to read desired state {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Validate the document
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.zone_id.trim().is_empty() {
            return Err(crate::Error::config("zone_id cannot be empty"));
        }

        let mut seen = HashSet::new();
        for record in &self.records {
            record.validate()?;
            if !seen.insert((record.name.as_str(), record.record_type)) {
                return Err(crate::Error::config(format!(
                    "Duplicate record {} {} in zone {}",
                    record.record_type, record.name, self.zone_id
                )));
            }
        }

        Ok(())
    }
}

/// One desired record inside a [`DesiredStateDocument`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredRecord {
    /// Fully qualified record name
    pub name: String,

    /// Record type
    #[serde(rename = "type")]
    pub record_type: RecordType,

    /// Time-to-live in seconds
    #[serde(default = "default_ttl")]
    pub ttl: u32,

    /// Record values
    #[serde(default)]
    pub values: Vec<String>,

    /// Present (default) or absent
    #[serde(default)]
    pub desired_state: DesiredState,
}

impl DesiredRecord {
    /// Create a present record with the default TTL and no values
    pub fn new(name: impl Into<String>, record_type: RecordType) -> Self {
        Self {
            name: name.into(),
            record_type,
            ttl: default_ttl(),
            values: Vec::new(),
            desired_state: DesiredState::Present,
        }
    }

    /// Set the TTL
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the values
    pub fn with_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Set the desired state
    pub fn with_desired_state(mut self, desired_state: DesiredState) -> Self {
        self.desired_state = desired_state;
        self
    }

    /// Validate the record
    pub fn validate(&self) -> Result<(), crate::Error> {
        validate_domain_name(&self.name)?;
        if self.ttl == 0 {
            return Err(crate::Error::config(format!(
                "TTL for {} must be > 0",
                self.name
            )));
        }
        Ok(())
    }
}

fn default_ttl() -> u32 {
    60
}

/// Validate that a string is a plausible DNS record name
///
/// Basic RFC 1035 checks: total length, label length, label characters.
/// A single trailing dot is accepted, and so are a leading `*` wildcard label
/// and underscore-prefixed service labels.
pub fn validate_domain_name(domain: &str) -> Result<(), crate::Error> {
    let domain = domain.strip_suffix('.').unwrap_or(domain);

    if domain.is_empty() {
        return Err(crate::Error::config("Domain name cannot be empty"));
    }

    if domain.len() > 253 {
        return Err(crate::Error::config(format!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        )));
    }

    for (i, label) in domain.split('.').enumerate() {
        if label.is_empty() {
            return Err(crate::Error::config(format!(
                "Domain name has empty label: '{}'",
                domain
            )));
        }

        if i == 0 && label == "*" {
            continue;
        }

        if label.len() > 63 {
            return Err(crate::Error::config(format!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            )));
        }

        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(crate::Error::config(format!(
                "Domain label contains invalid characters. Label: '{}'",
                label
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(crate::Error::config(format!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            )));
        }
    }

    Ok(())
}
