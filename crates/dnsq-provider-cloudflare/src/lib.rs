// # Cloudflare DNS Provider
//
// This crate provides a Cloudflare DNS provider implementation for the dnsq
// control plane.
//
// ## Behavior
//
// - ✅ Converges one record set per `apply` call (list, plan, execute)
// - ✅ Specific error mapping for HTTP status codes (401/403, 404, 429, others)
// - ✅ HTTP timeout configured (30 seconds)
// - ✅ Dry-run mode for safe testing
// - ✅ No calls beyond the listing when the zone already matches
// - ❌ NO retry logic (a failed apply is recorded as ERROR on the record)
// - ❌ NO caching (every apply lists the current state)
// - ❌ NO background tasks
//
// ## Trust Level: Untrusted (DNS Provider)
//
// **Allowed Capabilities**:
// - ✅ Perform HTTP/HTTPS API calls to the Cloudflare API only
// - ✅ Parse provider-specific responses
//
// **Forbidden Capabilities**:
// - ❌ Spawn tasks or threads
// - ❌ Implement retry logic
// - ❌ Access the record store
//
// ## Security Requirements
//
// - API token NEVER appears in logs or `Debug` output
// - Provider MUST fail fast if token is empty
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List DNS Records: GET `/zones/:zone_id/dns_records?name=...&type=...`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Update DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`
// - Delete DNS Record: DELETE `/zones/:zone_id/dns_records/:record_id`

mod plan;

pub use plan::{Change, ChangePlan, ExistingRecord, plan_changes};

use async_trait::async_trait;
use dnsq_core::config::ProviderConfig;
use dnsq_core::error::ProviderError;
use dnsq_core::model::RecordSet;
use dnsq_core::traits::{DnsProvider, DnsProviderFactory};
use dnsq_core::{Error, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Cloudflare API base URL
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Records requested per listing page
const LIST_PAGE_SIZE: u32 = 100;

const PROVIDER_NAME: &str = "cloudflare";

/// Cloudflare DNS provider
///
/// The record set's `zone_id` is the Cloudflare zone ID.
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the provider will:
/// - List the existing records (GET)
/// - Log the change plan
/// - **NOT** create, update or delete anything
pub struct CloudflareProvider {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// API root, overridable for testing against a local endpoint
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: list and plan, skip mutations
    dry_run: bool,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

/// Envelope around every Cloudflare API v4 response
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    code: i64,
    message: String,
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with Zone:DNS:Edit permissions
    /// - `dry_run`: If true, list and plan but skip mutations
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the token is empty or the HTTP client
    /// cannot be built.
    pub fn new(api_token: impl Into<String>, dry_run: bool) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token,
            base_url: CLOUDFLARE_API_BASE.to_string(),
            client,
            dry_run,
        })
    }

    /// Create a provider in live mode
    pub fn new_live(api_token: impl Into<String>) -> Result<Self> {
        Self::new(api_token, false)
    }

    /// Create a provider in dry-run mode
    pub fn new_dry_run(api_token: impl Into<String>) -> Result<Self> {
        Self::new(api_token, true)
    }

    /// Point the provider at another API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn records_url(&self, zone_id: &str) -> String {
        format!("{}/zones/{}/dns_records", self.base_url, zone_id)
    }

    /// List the records currently held for the record set's name and type
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /zones/:zone_id/dns_records?name=a.example.com&type=A&per_page=100
    /// Authorization: Bearer <token>
    /// ```
    async fn list_records(
        &self,
        record_set: &RecordSet,
    ) -> std::result::Result<Vec<ExistingRecord>, ProviderError> {
        let page_size = LIST_PAGE_SIZE.to_string();
        let request = self.client.get(self.records_url(&record_set.zone_id)).query(&[
            ("name", plan::api_name(&record_set.name)),
            ("type", record_set.record_type.as_str()),
            ("per_page", page_size.as_str()),
        ]);

        let records: Vec<ExistingRecord> = self
            .send(request, "Record lookup")
            .await?
            .unwrap_or_default();

        tracing::debug!(
            "Cloudflare holds {} {} record(s) for {}",
            records.len(),
            record_set.record_type,
            record_set.name
        );
        Ok(records)
    }

    /// Execute one planned change
    async fn execute(
        &self,
        record_set: &RecordSet,
        change: &Change,
    ) -> std::result::Result<(), ProviderError> {
        let url = self.records_url(&record_set.zone_id);
        match change {
            Change::Create { value } => {
                let body = plan::record_body(record_set, value)?;
                self.send::<serde_json::Value>(self.client.post(&url).json(&body), "Record create")
                    .await?;
                tracing::info!(
                    "Created {} {} -> {}",
                    record_set.record_type,
                    record_set.name,
                    value
                );
            }
            Change::Update { id, value } => {
                let body = plan::record_body(record_set, value)?;
                let request = self.client.put(format!("{}/{}", url, id)).json(&body);
                self.send::<serde_json::Value>(request, "Record update").await?;
                tracing::info!(
                    "Updated {} {} (record {}) -> {}",
                    record_set.record_type,
                    record_set.name,
                    id,
                    value
                );
            }
            Change::Delete { id } => {
                let request = self.client.delete(format!("{}/{}", url, id));
                self.send::<serde_json::Value>(request, "Record delete").await?;
                tracing::info!(
                    "Deleted surplus {} {} (record {})",
                    record_set.record_type,
                    record_set.name,
                    id
                );
            }
        }
        Ok(())
    }

    /// Send an authenticated request and unwrap the API envelope
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        context: &str,
    ) -> std::result::Result<Option<T>, ProviderError> {
        let response = request
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| ProviderError::http(format!("{} request failed: {}", context, e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(map_status(status.as_u16(), context, &error_text));
        }

        let body: ApiResponse<T> = response.json().await.map_err(|e| {
            ProviderError::http(format!("Failed to parse {} response: {}", context, e))
        })?;

        if !body.success {
            let messages: Vec<String> = body
                .errors
                .iter()
                .map(|e| format!("{} (code {})", e.message, e.code))
                .collect();
            return Err(ProviderError::rejected(
                PROVIDER_NAME,
                format!("{} failed: {}", context, messages.join("; ")),
            ));
        }

        Ok(body.result)
    }
}

/// Map a non-success HTTP status to a provider error
fn map_status(status: u16, context: &str, error_text: &str) -> ProviderError {
    match status {
        401 | 403 => ProviderError::auth(format!(
            "{}: invalid API token or insufficient permissions (status {})",
            context, status
        )),
        404 => ProviderError::zone_not_found(format!("{} returned 404", context)),
        429 => ProviderError::rate_limited(format!(
            "{}: rate limit exceeded (status {})",
            context, status
        )),
        500..=599 => ProviderError::rejected(
            PROVIDER_NAME,
            format!(
                "{}: Cloudflare server error (transient): {} - {}",
                context, status, error_text
            ),
        ),
        _ => ProviderError::rejected(
            PROVIDER_NAME,
            format!("{} failed: {} - {}", context, status, error_text),
        ),
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    /// Make the zone hold exactly the record set's values at its TTL
    ///
    /// Every value is checked before any call is made, so a record set
    /// Cloudflare cannot express fails without touching the zone. A failure
    /// part-way through the plan leaves the calls already made in place.
    async fn apply(&self, record_set: &RecordSet) -> std::result::Result<(), ProviderError> {
        if record_set.values.is_empty() {
            return Err(ProviderError::invalid_record(format!(
                "{} {} has no values",
                record_set.record_type, record_set.name
            )));
        }
        for value in &record_set.values {
            plan::record_body(record_set, value)?;
        }

        tracing::info!(
            "Converging Cloudflare record set {} {} v{} [mode: {}]",
            record_set.record_type,
            record_set.name,
            record_set.version,
            if self.dry_run { "DRY-RUN" } else { "LIVE" }
        );

        let existing = self.list_records(record_set).await?;
        let plan = plan_changes(&existing, record_set.ttl, &record_set.values);

        if plan.is_empty() {
            tracing::info!(
                "Cloudflare already holds {} {} as desired",
                record_set.record_type,
                record_set.name
            );
            return Ok(());
        }

        if self.dry_run {
            for change in &plan.changes {
                tracing::info!(
                    "[DRY-RUN] Would {:?} for {} {}",
                    change,
                    record_set.record_type,
                    record_set.name
                );
            }
            return Ok(());
        }

        for change in &plan.changes {
            self.execute(record_set, change).await?;
        }
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

/// Factory for creating Cloudflare providers
pub struct CloudflareFactory;

impl DnsProviderFactory for CloudflareFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
        match config {
            ProviderConfig::Cloudflare { api_token, dry_run } => {
                if *dry_run {
                    tracing::warn!(
                        "Cloudflare provider running in DRY-RUN mode - no changes will be made"
                    );
                }
                Ok(Box::new(CloudflareProvider::new(api_token.clone(), *dry_run)?))
            }
            _ => Err(Error::config("Invalid config for Cloudflare provider")),
        }
    }
}

/// Register the Cloudflare provider with a registry
///
/// # Example
///
/// ```rust
/// use dnsq_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::with_builtins();
/// dnsq_provider_cloudflare::register(&registry);
/// assert!(registry.has_provider("cloudflare"));
/// ```
pub fn register(registry: &dnsq_core::ProviderRegistry) {
    registry.register_provider(PROVIDER_NAME, Box::new(CloudflareFactory));
}
