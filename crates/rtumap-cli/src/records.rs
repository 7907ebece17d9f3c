//! Record subcommands: `history [--locate]`, `delete`, `approve`, `stats`.

use std::sync::Arc;

use rtumap_backend::BackendClient;
use rtumap_core::{AppConfig, LocationRecord, RecordId};
use rtumap_engine::{HeadlessSurface, MarkerRegistry, RecordStoreSync, Viewport};

use crate::geocode;

/// Prints every saved record as a table.
///
/// # Errors
///
/// Returns an error if the backend request fails.
pub(crate) async fn run_history(backend: &BackendClient) -> anyhow::Result<()> {
    let records = backend.history().await?;
    if records.is_empty() {
        println!("no records found; run `detect --save` first");
        return Ok(());
    }

    print_header();
    for record in &records {
        println!("{}", history_row(record));
    }
    Ok(())
}

/// Lists records after forward-geocoding those saved without coordinates.
///
/// # Errors
///
/// Returns an error if no geocoding key is configured or the backend
/// listing fails. Individual geocoding failures only leave a record
/// unlocated.
pub(crate) async fn run_located_history(config: &AppConfig) -> anyhow::Result<()> {
    let surface = Arc::new(HeadlessSurface::new(Viewport {
        center: config.default_center,
        zoom: config.default_zoom,
    }));
    let store = RecordStoreSync::new(
        Arc::new(crate::backend(config)?),
        Arc::new(geocode::client(config)?),
        Arc::new(MarkerRegistry::new(surface)),
    )
    .with_repair_concurrency(config.geocode_max_concurrent);

    let located = store.refresh().await?;
    let unlocated = store.unlocated();
    if located.is_empty() && unlocated.is_empty() {
        println!("no records found; run `detect --save` first");
        return Ok(());
    }

    print_header();
    for record in located.iter().chain(&unlocated) {
        println!("{}", history_row(record));
    }
    if !unlocated.is_empty() {
        println!("\n{} record(s) could not be located", unlocated.len());
    }
    Ok(())
}

fn print_header() {
    println!(
        "{:<6}{:<26}{:<36}{:<6}{:<10}{:<10}LOCATION",
        "ID", "BUILDING", "ADDRESS", "RTUS", "SCORE", "STATUS"
    );
}

pub(crate) fn history_row(record: &LocationRecord) -> String {
    let id = record.id.map_or_else(|| "-".to_string(), |id| id.to_string());
    let location = record
        .coordinates
        .map_or_else(|| "unlocated".to_string(), |c| c.to_string());
    format!(
        "{:<6}{:<26}{:<36}{:<6}{:<10}{:<10}{}",
        id,
        truncate(record.display_name(), 24),
        truncate(record.display_address(), 34),
        record.rtu_count,
        record.lead_score.label(),
        record.status,
        location
    )
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() > max_chars {
        format!(
            "{}...",
            value
                .chars()
                .take(max_chars.saturating_sub(3))
                .collect::<String>()
        )
    } else {
        value.to_string()
    }
}

/// # Errors
///
/// Returns an error if the record does not exist or the backend fails.
pub(crate) async fn run_delete(backend: &BackendClient, id: RecordId) -> anyhow::Result<()> {
    backend.delete(id).await?;
    println!("deleted record {id}");
    Ok(())
}

/// # Errors
///
/// Returns an error if the record does not exist or the backend fails.
pub(crate) async fn run_approve(backend: &BackendClient, id: RecordId) -> anyhow::Result<()> {
    let response = backend.approve(id).await?;
    println!("record {}: {}", response.id, response.message);
    Ok(())
}

/// # Errors
///
/// Returns an error if the backend request fails.
pub(crate) async fn run_stats(backend: &BackendClient) -> anyhow::Result<()> {
    let stats = backend.analytics().await?;
    println!("images analyzed:   {}", stats.total_images);
    println!("buildings:         {}", stats.total_buildings);
    println!("rooftop units:     {}", stats.total_rtu_count);
    println!("success rate:      {:.1}%", stats.success_rate);
    println!("avg lead score:    {:.1}", stats.avg_lead_score);
    println!("failed detections: {}", stats.failed_detections);
    Ok(())
}
