// # dnsqd - dnsq Daemon
//
// CRITICAL RULES:
// - This is a THIN integration layer ONLY
// - DO NOT add reconcile, planning, or provider logic here
// - All control-plane logic MUST be in dnsq-core
// - Configuration is via environment variables ONLY
//
// The dnsqd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Registering providers and record stores
// 4. Applying the desired-state document and waiting for every job to finish
//
// ## Configuration
//
// ### Desired State
// - `DNSQ_DESIRED_STATE`: Path to the YAML desired-state document (required)
//
// ### DNS Provider
// - `DNSQ_PROVIDER_TYPE`: Provider type (mock, cloudflare). Default: mock
// - `DNSQ_PROVIDER_API_TOKEN`: API token (required for cloudflare)
// - `DNSQ_PROVIDER_DRY_RUN`: List and plan only, no mutations (true/false)
//
// ### Record Store
// - `DNSQ_STORE_TYPE`: Type of record store (file, memory). Default: file
// - `DNSQ_STORE_PATH`: Path to the record file. Default: ./dnsq-records.json
//
// ### Dispatcher
// - `DNSQ_WORKERS`: Number of dispatcher workers. Default: 1
// - `DNSQ_POLL_INTERVAL_MS`: Dequeue wait in milliseconds. Default: 2000
//
// ### Logging
// - `DNSQ_LOG_LEVEL`: trace, debug, info, warn, error. Default: info
//
// ## Example
//
// ```bash
// export DNSQ_DESIRED_STATE=/etc/dnsq/records.yaml
// export DNSQ_PROVIDER_TYPE=cloudflare
// export DNSQ_PROVIDER_API_TOKEN=your_token
// export DNSQ_STORE_PATH=/var/lib/dnsq/records.json
// export DNSQ_WORKERS=4
//
// dnsqd
// ```

use anyhow::{Context, Result};
use dnsq_core::config::{
    DesiredStateDocument, DispatcherConfig, DnsqConfig, ProviderConfig, RecordStoreConfig,
};
use dnsq_core::{
    DispatcherPool, DnsProvider, JobQueue, Planner, ProviderRegistry, ReconcileEvent,
    ReconcileStatus, Reconciler, RecordStore,
};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DnsqExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DnsqExitCode> for ExitCode {
    fn from(code: DnsqExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

const DEFAULT_STORE_PATH: &str = "./dnsq-records.json";

/// Application configuration
#[derive(Debug)]
struct Config {
    desired_state: PathBuf,
    provider_type: String,
    provider_api_token: Option<String>,
    provider_dry_run: bool,
    store_type: String,
    store_path: String,
    workers: usize,
    poll_interval_ms: u64,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        let defaults = DispatcherConfig::default();

        Ok(Self {
            desired_state: env::var("DNSQ_DESIRED_STATE")
                .map(PathBuf::from)
                .context("DNSQ_DESIRED_STATE is required")?,
            provider_type: env::var("DNSQ_PROVIDER_TYPE").unwrap_or_else(|_| "mock".to_string()),
            provider_api_token: env::var("DNSQ_PROVIDER_API_TOKEN").ok(),
            provider_dry_run: parse_bool("DNSQ_PROVIDER_DRY_RUN")?,
            store_type: env::var("DNSQ_STORE_TYPE").unwrap_or_else(|_| "file".to_string()),
            store_path: env::var("DNSQ_STORE_PATH")
                .unwrap_or_else(|_| DEFAULT_STORE_PATH.to_string()),
            workers: parse_env("DNSQ_WORKERS", defaults.workers)?,
            poll_interval_ms: parse_env("DNSQ_POLL_INTERVAL_MS", defaults.poll_interval_ms)?,
            log_level: env::var("DNSQ_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// Checks the settings the core types cannot check themselves:
    /// - Supported type names for this build
    /// - Token sanity for live providers
    /// - Paths that must exist before startup
    fn validate(&self) -> Result<()> {
        match self.provider_type.as_str() {
            "mock" => {}
            "cloudflare" if cfg!(feature = "cloudflare") => {
                let token = self.provider_api_token.as_deref().unwrap_or_default();
                if token.is_empty() {
                    anyhow::bail!(
                        "DNSQ_PROVIDER_API_TOKEN is required when DNSQ_PROVIDER_TYPE=cloudflare. \
                        Set it via: export DNSQ_PROVIDER_API_TOKEN=your_token"
                    );
                }

                // Check for obvious placeholder tokens (common mistake)
                let token_lower = token.to_lowercase();
                if token_lower.contains("your_token")
                    || token_lower.contains("replace_me")
                    || token_lower == "token"
                {
                    anyhow::bail!(
                        "DNSQ_PROVIDER_API_TOKEN appears to be a placeholder. \
                        Use an actual API token from your DNS provider."
                    );
                }
            }
            other => anyhow::bail!(
                "DNSQ_PROVIDER_TYPE '{}' is not supported by this build. \
                Supported providers: {}",
                other,
                supported_providers().join(", ")
            ),
        }

        match self.store_type.as_str() {
            "memory" => {}
            "file" => {
                if self.store_path.is_empty() {
                    anyhow::bail!("DNSQ_STORE_PATH cannot be empty when DNSQ_STORE_TYPE=file");
                }
            }
            other => anyhow::bail!(
                "DNSQ_STORE_TYPE '{}' is not supported. Supported types: file, memory",
                other
            ),
        }

        if !self.desired_state.is_file() {
            anyhow::bail!(
                "DNSQ_DESIRED_STATE does not point to a file: {}",
                self.desired_state.display()
            );
        }

        parse_log_level(&self.log_level)?;
        Ok(())
    }

    /// Translate into the core runtime configuration
    fn to_dnsq_config(&self) -> DnsqConfig {
        let provider = match self.provider_type.as_str() {
            "cloudflare" => ProviderConfig::Cloudflare {
                api_token: self.provider_api_token.clone().unwrap_or_default(),
                dry_run: self.provider_dry_run,
            },
            _ => ProviderConfig::Mock,
        };

        let store = match self.store_type.as_str() {
            "memory" => RecordStoreConfig::Memory,
            _ => RecordStoreConfig::File {
                path: self.store_path.clone(),
            },
        };

        DnsqConfig {
            provider,
            store,
            dispatcher: DispatcherConfig {
                workers: self.workers,
                poll_interval_ms: self.poll_interval_ms,
                ..DispatcherConfig::default()
            },
        }
    }
}

fn supported_providers() -> Vec<&'static str> {
    let mut providers = vec!["mock"];
    if cfg!(feature = "cloudflare") {
        providers.push("cloudflare");
    }
    providers
}

/// Parse an optional numeric variable, falling back to `default` when unset
fn parse_env<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", name, raw, e)),
        Err(_) => Ok(default),
    }
}

/// Parse an optional boolean variable; unset means false
fn parse_bool(name: &str) -> Result<bool> {
    let raw = env::var(name).unwrap_or_default();
    parse_bool_value(&raw).ok_or_else(|| {
        anyhow::anyhow!(
            "{} must be one of true/false/1/0/yes/no. Got: {}",
            name,
            raw
        )
    })
}

fn parse_bool_value(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "DNSQ_LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            level
        ),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DnsqExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return DnsqExitCode::ConfigError.into();
    }

    let dnsq_config = config.to_dnsq_config();
    if let Err(e) = dnsq_config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return DnsqExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = parse_log_level(&config.log_level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DnsqExitCode::ConfigError.into();
    }

    info!("Starting dnsqd");
    info!(
        "Provider: {}, record store: {}, workers: {}",
        dnsq_config.provider.type_name(),
        dnsq_config.store.type_name(),
        dnsq_config.dispatcher.workers
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DnsqExitCode::RuntimeError.into();
        }
    };

    // A bad document is a configuration problem, not a runtime one
    let document = match rt.block_on(DesiredStateDocument::load(&config.desired_state)) {
        Ok(document) => document,
        Err(e) => {
            error!("Invalid desired state document: {}", e);
            return DnsqExitCode::ConfigError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(dnsq_config, document).await {
            error!("Daemon error: {:#}", e);
            DnsqExitCode::RuntimeError
        } else {
            DnsqExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run one apply-and-wait pass
async fn run_daemon(config: DnsqConfig, document: DesiredStateDocument) -> Result<()> {
    let registry = ProviderRegistry::with_builtins();

    #[cfg(feature = "cloudflare")]
    {
        info!("Registering Cloudflare provider");
        dnsq_provider_cloudflare::register(&registry);
    }

    let store: Arc<dyn RecordStore> = Arc::from(
        registry
            .create_record_store(&config.store)
            .await
            .context("Failed to open record store")?,
    );
    let provider: Arc<dyn DnsProvider> = Arc::from(
        registry
            .create_provider(&config.provider)
            .context("Failed to create DNS provider")?,
    );

    let (reconciler, events) = Reconciler::with_events(
        Arc::clone(&store),
        provider,
        config.dispatcher.event_channel_capacity,
    );
    let event_logger = tokio::spawn(log_events(events));

    let queue = Arc::new(JobQueue::new());
    let pool = DispatcherPool::start(&config.dispatcher, Arc::clone(&queue), Arc::new(reconciler))?;

    let planner = Planner::new(Arc::clone(&store), Arc::clone(&queue));
    let outcome = apply_and_wait(&planner, &queue, &document).await;

    // Always stop workers and persist, even when the apply failed
    stop_and_flush(pool, store.as_ref()).await?;
    if let Err(e) = event_logger.await {
        warn!("Event logger ended abnormally: {}", e);
    }

    outcome?;
    log_summary(store.as_ref()).await?;

    info!("dnsqd finished");
    Ok(())
}

/// Stop the dispatcher pool, then flush the store
///
/// The flush runs even when a worker ended abnormally; the shutdown error is
/// returned after it.
async fn stop_and_flush(pool: DispatcherPool, store: &dyn RecordStore) -> Result<()> {
    let stopped = pool.shutdown().await;
    if let Err(e) = &stopped {
        error!("Dispatcher shutdown failed: {}", e);
    }

    store.flush().await.context("Failed to flush record store")?;
    stopped.context("Dispatcher shutdown failed")
}

/// Apply the document, then wait for the queue to drain or a shutdown signal
async fn apply_and_wait(
    planner: &Planner,
    queue: &JobQueue,
    document: &DesiredStateDocument,
) -> Result<()> {
    let report = planner
        .apply(document)
        .await
        .context("Failed to apply desired state")?;

    info!(
        "Enqueued {} job(s) for zone {} ({} created, {} updated, {} unchanged)",
        report.jobs.len(),
        document.zone_id,
        report.created,
        report.updated,
        report.unchanged
    );

    tokio::select! {
        _ = queue.await_drain() => {
            info!("All {} job(s) completed", queue.completed_count());
        }
        signal = wait_for_shutdown_signal() => {
            warn!(
                "Received {} with {} job(s) unfinished; stopping",
                signal?,
                queue.pending_count()
            );
        }
    }

    Ok(())
}

/// Log reconcile events until the reconciler is dropped
async fn log_events(mut events: mpsc::Receiver<ReconcileEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            ReconcileEvent::ApplyFailed {
                record_id,
                version,
                error,
            } => warn!("Record {} v{} failed: {}", record_id, version, error),
            ReconcileEvent::ApplySucceeded { record_id, version } => {
                info!("Record {} in sync at v{}", record_id, version)
            }
            other => debug!("Reconcile event: {:?}", other),
        }
    }
}

/// Log the final status of every record
async fn log_summary(store: &dyn RecordStore) -> Result<()> {
    let records = store.list().await.context("Failed to list records")?;

    let mut in_sync = 0;
    for record in &records {
        match record.status.reconcile_status {
            ReconcileStatus::InSync => in_sync += 1,
            ReconcileStatus::Error => warn!(
                "{} is in ERROR at v{}: {}",
                record.key(),
                record.spec.version,
                record.status.last_error.as_deref().unwrap_or("unknown error")
            ),
            status => info!("{} is {} at v{}", record.key(), status, record.spec.version),
        }
    }

    info!("{}/{} record(s) in sync", in_sync, records.len());
    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let signal = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(signal)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
