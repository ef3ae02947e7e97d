//! Error types for the dnsq control plane
//!
//! This module defines all error types used throughout the crate.
//!
//! Two layers exist:
//! - [`ProviderError`]: what a [`DnsProvider`](crate::DnsProvider) returns from `apply`.
//!   The reconciler pattern-matches on it and records it into the record status.
//! - [`Error`]: everything else (store, configuration, queue misuse, I/O).

use thiserror::Error;

/// Result type alias for dnsq operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failure surfaced by a DNS provider while converging a record set
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Transport-level failure (connection, timeout, unreadable body)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Credentials rejected or insufficient permissions
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Provider asked us to slow down
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// The zone referenced by the record set does not exist
    #[error("Zone not found: {0}")]
    ZoneNotFound(String),

    /// The record set cannot be expressed at this provider
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Any other rejection reported by the provider
    #[error("Provider error ({provider}): {message}")]
    Rejected {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },
}

impl ProviderError {
    /// Create a transport error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "zone not found" error
    pub fn zone_not_found(msg: impl Into<String>) -> Self {
        Self::ZoneNotFound(msg.into())
    }

    /// Create an invalid record error
    pub fn invalid_record(msg: impl Into<String>) -> Self {
        Self::InvalidRecord(msg.into())
    }

    /// Create a provider-specific rejection
    pub fn rejected(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

/// Core error type for the dnsq control plane
#[derive(Error, Debug)]
pub enum Error {
    /// Record store-related errors
    #[error("Record store error: {0}")]
    RecordStore(String),

    /// A spec write did not advance the stored version
    #[error("Version conflict for record {record_id}: stored version {current}, attempted {attempted}")]
    VersionConflict {
        /// Record identity
        record_id: String,
        /// Version currently stored
        current: u64,
        /// Version the writer tried to store
        attempted: u64,
    },

    /// Job queue misuse
    #[error("Queue error: {0}")]
    Queue(String),

    /// DNS provider errors
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem / network I/O
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML desired-state parse errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a record store error
    pub fn record_store(msg: impl Into<String>) -> Self {
        Self::RecordStore(msg.into())
    }

    /// Create a queue error
    pub fn queue(msg: impl Into<String>) -> Self {
        Self::Queue(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a version conflict error
    pub fn version_conflict(record_id: impl ToString, current: u64, attempted: u64) -> Self {
        Self::VersionConflict {
            record_id: record_id.to_string(),
            current,
            attempted,
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_is_transparent_in_core_error() {
        let err: Error = ProviderError::rejected("cloudflare", "bad content").into();
        assert_eq!(err.to_string(), "Provider error (cloudflare): bad content");
    }

    #[test]
    fn version_conflict_message_names_both_versions() {
        let err = Error::version_conflict("abc", 3, 3);
        let msg = err.to_string();
        assert!(msg.contains("stored version 3"));
        assert!(msg.contains("attempted 3"));
    }
}
