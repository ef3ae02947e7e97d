//! Core traits for the dnsq control plane
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`DnsProvider`]: Converge a record set at an external DNS service
//! - [`RecordStore`]: Document store holding desired and observed record state

pub mod dns_provider;
pub mod record_store;

pub use dns_provider::{DnsProvider, DnsProviderFactory};
pub use record_store::{RecordStore, RecordStoreFactory};
