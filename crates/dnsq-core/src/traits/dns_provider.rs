// # DNS Provider Trait
//
// Defines the interface for converging a record set at a DNS service.
//
// ## Implementations
//
// - Mock: `dnsq_core::provider::MockProvider` (logs, always succeeds)
// - Cloudflare: `dnsq-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use dnsq_core::DnsProvider;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let provider = /* DnsProvider implementation */;
//
//     // Converge one record set
//     provider.apply(&record.spec.to_record_set()).await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::model::RecordSet;

/// Trait for DNS provider implementations
///
/// A provider exposes exactly one capability: "make the zone hold this record
/// set". It does not expose read-back or verification; the reconciler treats a
/// successful `apply` as convergence.
///
/// # Thread Safety
///
/// Implementations must be thread-safe. A single provider instance is shared
/// by every dispatcher worker.
///
/// # Trust Level: Untrusted
///
/// Providers are external integrations with strict limitations:
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS API calls to their endpoints only
/// - ✅ Parse provider-specific responses
/// - ✅ Return success or a [`ProviderError`]
///
/// ## Forbidden Capabilities
/// - ❌ Spawn tasks or threads
/// - ❌ Retry or back off (failures are recorded, a new planner version re-attempts)
/// - ❌ Access the record store (owned by `Reconciler`)
/// - ❌ Decide whether a job is stale (owned by `Reconciler`)
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Converge the zone to `record_set`
    ///
    /// Upsert semantics: create the record set if missing, replace its TTL and
    /// values if present. Must be safe to call repeatedly with the same input.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The provider accepted the change
    /// - `Err(ProviderError)`: The change was not (fully) applied
    async fn apply(&self, record_set: &RecordSet) -> Result<(), ProviderError>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing DNS providers from configuration
pub trait DnsProviderFactory: Send + Sync {
    /// Create a DnsProvider instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Configuration specific to this provider
    ///
    /// # Returns
    ///
    /// A boxed DnsProvider trait object
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
    ) -> Result<Box<dyn DnsProvider>, crate::Error>;
}
