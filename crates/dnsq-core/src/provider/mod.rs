//! Built-in DNS providers
//!
//! Live providers ship as their own crates (see `dnsq-provider-cloudflare`).

pub mod mock;

pub use mock::{MockProvider, MockProviderFactory};
