//! `loomctl status`: an offline diagnostic. It reads the on-disk ingestion
//! spool and the declared sources from the `serve` config directly,
//! rather than calling a running process over the network — this binary
//! has no IPC/HTTP client wired for talking to a sibling `serve`
//! instance, so "status" here means "what does the persisted state say",
//! not "what is the live process doing right now". Sink connectivity is
//! reported as disconnected/unknown since no live flusher exists to ask.

use std::path::Path;

use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use loom_ingest::{BufferLimits, IngestionBuffer, SinkConnectivity};
use loom_sources::{aggregate_status, HealthLevel};

use crate::config::ServeConfig;

pub async fn run(config_path: Option<&Path>) -> Result<()> {
    let config = ServeConfig::load(config_path)?;
    let spool_path = config.data_dir.join("ingestion.spool");
    let limits = BufferLimits { max_entries: config.buffer.max_entries, max_bytes: config.buffer.max_bytes };
    let buffer = IngestionBuffer::open(&spool_path, limits).await?;

    // No live flusher to ask; a disconnected sink with zero errors reads
    // as "unknown" rather than implying an active outage.
    let sink = SinkConnectivity { connected: false, last_success_at: None, last_error_at: None, error_count: 0 };
    let snapshot = aggregate_status(sink, buffer.snapshot(), config.sources.clone());

    println!("data dir:   {}", config.data_dir.display());
    println!("level:      {}", level_label(snapshot.level));
    println!(
        "buffer:     {}/{} entries, {}/{} bytes ({:.1}% used)",
        snapshot.buffer.entry_count,
        snapshot.buffer.max_entries,
        snapshot.buffer.bytes_used,
        snapshot.buffer.max_bytes,
        snapshot.buffer.fraction_used() * 100.0,
    );
    println!("note:       sink connectivity unknown (status read from disk, not a live process)");
    println!();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(
        ["Source", "Variant", "Enabled", "Errors", "Last Error"]
            .iter()
            .map(|header| Cell::new(header).fg(Color::Cyan)),
    );
    for source in &snapshot.sources {
        table.add_row(vec![
            source.name.clone(),
            source.variant.as_str().to_string(),
            source.enabled.to_string(),
            source.status.error_count.to_string(),
            source.status.last_error_message.clone().unwrap_or_else(|| "-".to_string()),
        ]);
    }
    println!("{table}");

    Ok(())
}

fn level_label(level: HealthLevel) -> &'static str {
    match level {
        HealthLevel::Healthy => "healthy",
        HealthLevel::Degraded => "degraded",
        HealthLevel::Unhealthy => "unhealthy",
    }
}
