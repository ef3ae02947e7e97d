// # Cloudflare Provider Real Environment Validation Tool
//
// Applies one record set through the Cloudflare provider against the real
// API, then applies it a second time to check that the provider converges
// without further changes.
//
// ## Usage
//
// ```bash
// # Dry-run mode (default, safe: lists and logs the plan only)
// DNSQ_MODE=dry-run \
// DNSQ_PROVIDER_API_TOKEN=your_token \
// DNSQ_ZONE_ID=your_zone_id \
// DNSQ_RECORD_NAME=dnsq-test.example.com \
// DNSQ_RECORD_TYPE=A \
// DNSQ_RECORD_VALUES=1.2.3.4,5.6.7.8 \
// cargo run -p dnsq-demos --bin cloudflare_validation
//
// # Live mode (makes actual changes!)
// DNSQ_MODE=live ... cargo run -p dnsq-demos --bin cloudflare_validation
// ```
//
// ## Environment Variables
//
// Required:
// - `DNSQ_PROVIDER_API_TOKEN`: Cloudflare API token
// - `DNSQ_ZONE_ID`: Cloudflare zone identifier
// - `DNSQ_RECORD_NAME`: Full record name (e.g., "dnsq-test.example.com")
// - `DNSQ_RECORD_VALUES`: Comma-separated record values
//
// Optional:
// - `DNSQ_RECORD_TYPE`: A, AAAA, CNAME, TXT, MX or NS (default: A)
// - `DNSQ_RECORD_TTL`: TTL in seconds (default: 60)
// - `DNSQ_MODE`: "dry-run" or "live" (default: dry-run)

use dnsq_core::config::validate_domain_name;
use dnsq_core::model::{RecordSet, RecordType};
use dnsq_core::traits::DnsProvider;
use dnsq_provider_cloudflare::CloudflareProvider;
use std::env;

fn required(name: &str) -> String {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => {
            tracing::error!("{} environment variable is required", name);
            std::process::exit(1);
        }
    }
}

fn parse_record_type(raw: &str) -> Result<RecordType, serde_json::Error> {
    serde_json::from_value(serde_json::Value::String(raw.to_uppercase()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    tracing::info!("=== Cloudflare Provider Real Environment Validation ===");

    let api_token = required("DNSQ_PROVIDER_API_TOKEN");
    let zone_id = required("DNSQ_ZONE_ID");
    let record_name = required("DNSQ_RECORD_NAME");
    let values: Vec<String> = required("DNSQ_RECORD_VALUES")
        .split(',')
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();

    let record_type = env::var("DNSQ_RECORD_TYPE").unwrap_or_else(|_| "A".to_string());
    let record_type = parse_record_type(&record_type).map_err(|_| {
        format!("Unknown record type '{}'", record_type)
    })?;
    let ttl: u32 = match env::var("DNSQ_RECORD_TTL") {
        Ok(raw) => raw.parse()?,
        Err(_) => 60,
    };

    let mode = env::var("DNSQ_MODE").unwrap_or_else(|_| "dry-run".to_string());
    let dry_run = mode.to_lowercase() != "live";

    if dry_run {
        tracing::warn!("Running in DRY-RUN mode - no changes will be made");
    } else {
        tracing::warn!("Running in LIVE mode - will make actual DNS changes!");
    }

    validate_domain_name(&record_name)?;

    tracing::info!("Configuration:");
    tracing::info!("  Zone ID: {}", zone_id);
    tracing::info!("  Record: {} {}", record_type, record_name);
    tracing::info!("  TTL: {}", ttl);
    tracing::info!("  Values: {:?}", values);

    tracing::info!("--- Step 1: Creating Cloudflare Provider ---");
    let provider = CloudflareProvider::new(api_token, dry_run)?;
    tracing::info!("Provider created: {:?}", provider);

    let record_set = RecordSet {
        zone_id,
        name: record_name.clone(),
        record_type,
        ttl,
        values,
        version: 1,
    };

    tracing::info!("--- Step 2: Applying record set ---");
    if let Err(e) = provider.apply(&record_set).await {
        tracing::error!("✗ Apply failed: {}", e);
        std::process::exit(1);
    }
    tracing::info!("✓ Apply succeeded");

    tracing::info!("--- Step 3: Re-applying the same record set ---");
    if let Err(e) = provider.apply(&record_set).await {
        tracing::error!("✗ Second apply failed: {}", e);
        std::process::exit(1);
    }
    tracing::info!("✓ Second apply succeeded (check the log above: no changes expected)");

    if dry_run {
        tracing::info!("=== DRY-RUN COMPLETE ===");
        tracing::info!("No changes were made to DNS records.");
        tracing::info!("To make actual changes, set DNSQ_MODE=live");
    } else {
        tracing::info!("=== LIVE MODE COMPLETE ===");
        tracing::info!(
            "Verify at: https://dnschecker.org/#{}/{}",
            record_type,
            record_name
        );
    }

    Ok(())
}
