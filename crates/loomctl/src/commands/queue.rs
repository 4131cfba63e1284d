//! `loomctl queue`: like `status`, an offline diagnostic over the
//! on-disk ingestion spool. It cannot report the agent loop's live
//! priority queue depth (that only exists inside a running `serve`
//! process's memory, and this binary has no IPC path to it) — instead it
//! reports how many buffered entries are waiting to be sent versus
//! already scheduled for retry, which is the queue a stopped process
//! actually leaves behind on disk.

use std::path::Path;

use anyhow::Result;
use chrono::Utc;
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use loom_ingest::{BufferLimits, EntryState, IngestionBuffer};

use crate::config::ServeConfig;

pub async fn run(config_path: Option<&Path>) -> Result<()> {
    let config = ServeConfig::load(config_path)?;
    let spool_path = config.data_dir.join("ingestion.spool");
    let limits = BufferLimits { max_entries: config.buffer.max_entries, max_bytes: config.buffer.max_bytes };
    let buffer = IngestionBuffer::open(&spool_path, limits).await?;

    let entries = buffer.peek(usize::MAX);
    let now = Utc::now();
    let due_now = entries.iter().filter(|entry| entry.metadata.is_due(now)).count();
    let waiting = entries.len() - due_now;

    println!("data dir: {}", config.data_dir.display());
    println!("total buffered: {}", entries.len());
    println!("due now:        {due_now}");
    println!("waiting/backoff: {waiting}");
    println!();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(
        ["Id", "Source", "Type", "State", "Attempts", "Due"]
            .iter()
            .map(|header| Cell::new(header).fg(Color::Cyan)),
    );
    for entry in entries.iter().take(50) {
        table.add_row(vec![
            entry.id.clone(),
            entry.source_id.clone(),
            entry.event_type.clone(),
            state_label(&entry.metadata.state).to_string(),
            entry.metadata.attempts.to_string(),
            entry.metadata.is_due(now).to_string(),
        ]);
    }
    println!("{table}");
    if entries.len() > 50 {
        println!("... {} more not shown", entries.len() - 50);
    }

    Ok(())
}

fn state_label(state: &EntryState) -> &'static str {
    match state {
        EntryState::Queued => "QUEUED",
        EntryState::Sending => "SENDING",
        EntryState::Sent => "SENT",
        EntryState::Buffered => "BUFFERED",
        EntryState::Failed => "FAILED",
    }
}
