//! Command handlers. Results go to stdout as JSON; logs go to stderr.

use anyhow::Context;
use dealerstock_core::{AppConfig, DealerConfig, Vehicle};
use dealerstock_inventory::InventoryService;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SourceRun {
    source_id: String,
    partial: bool,
    tier: Option<String>,
    error: Option<String>,
    count: usize,
    vehicles: Vec<Vehicle>,
}

fn load_dealer(config: &AppConfig) -> anyhow::Result<DealerConfig> {
    let file = dealerstock_core::load_dealer(&config.dealer_path).with_context(|| {
        format!(
            "failed to load dealer config from {}",
            config.dealer_path.display()
        )
    })?;
    Ok(file.dealer)
}

fn build_service(config: &AppConfig) -> anyhow::Result<InventoryService> {
    let dealer = load_dealer(config)?;
    InventoryService::from_config(config, &dealer).context("failed to build inventory service")
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn source_table(dealer: &DealerConfig) -> Vec<String> {
    let mut lines = vec![format!(
        "{:<4}{:<26}{:<24}{:<15}{}",
        "PRI", "ID", "KIND", "CATEGORY", "URL"
    )];
    for source in dealer.sources_by_priority() {
        let category = source
            .category
            .map_or_else(|| "auto".to_string(), |c| c.to_string());
        lines.push(format!(
            "{:<4}{:<26}{:<24}{:<15}{}",
            source.priority, source.id, source.kind, category, source.url
        ));
    }
    lines
}

/// Loads and validates the dealer file, then lists enabled sources.
///
/// # Errors
///
/// Returns an error if the dealer file cannot be read or fails validation.
pub(crate) fn run_sources(config: &AppConfig) -> anyhow::Result<()> {
    let dealer = load_dealer(config)?;
    println!("dealer: {} ({:?})", dealer.name, dealer.data_source);
    for line in source_table(&dealer) {
        println!("{line}");
    }
    Ok(())
}

/// Runs a full aggregation pass, or a single source when `source` is given.
///
/// # Errors
///
/// Returns an error if configuration fails, the source id is unknown, or
/// every source failed.
pub(crate) async fn run_vehicles(config: &AppConfig, source: Option<&str>) -> anyhow::Result<()> {
    let service = build_service(config)?;

    if let Some(source_id) = source {
        let result = service
            .fetch_source(source_id)
            .await
            .ok_or_else(|| anyhow::anyhow!("source '{source_id}' is not configured or disabled"))?;
        let run = SourceRun {
            source_id: result.source_id,
            partial: result.partial,
            tier: result.tier.map(|t| t.to_string()),
            error: result.error,
            count: result.vehicles.len(),
            vehicles: result.vehicles,
        };
        return print_json(&run);
    }

    let response = service.get_vehicles().await;
    print_json(&response)?;
    if let Some(error) = response.error {
        anyhow::bail!("no vehicles available: {error}");
    }
    Ok(())
}

/// Fetches one detail record.
///
/// # Errors
///
/// Returns an error if configuration fails or the lookup is rejected.
pub(crate) async fn run_detail(config: &AppConfig, vid: &str) -> anyhow::Result<()> {
    let service = build_service(config)?;
    let detail = service
        .get_vehicle_detail(vid)
        .await
        .with_context(|| format!("detail lookup for '{vid}' failed"))?;
    print_json(&detail)
}
