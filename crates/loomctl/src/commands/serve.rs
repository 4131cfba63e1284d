//! `loomctl serve` (§4.14, §4.15): boots storage, the agent loop, the
//! durable ingestion buffer/flusher, the source manager, and the reporter
//! HTTP surface, then waits for a shutdown signal to drain them all
//! cooperatively.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use loom_core::{event_types, Event, LoomError, LoomResult};
use loom_ingest::{
    BufferLimits, DeadLetterStore, EventSink, FlushOptions, Flusher, IngestionBuffer, IngestionEntry,
    IngestionSink,
};
use loom_runtime::{AgentLoop, NoDriverFactory, StateManager};
use loom_sources::{router, ReporterState, SourceManager};
use loom_storage::FileStorage;
use tracing::{info, warn};

use crate::config::ServeConfig;

/// Materializes buffered entries as `DATA_ARRIVED` events on the agent
/// loop, and reports the loop's liveness as this sink's connectivity.
struct AgentIngestionSink {
    agent_loop: Arc<AgentLoop>,
}

#[async_trait]
impl IngestionSink for AgentIngestionSink {
    async fn send(&self, entry: &IngestionEntry) -> LoomResult<()> {
        if !self.agent_loop.is_accepting() {
            return Err(LoomError::unavailable("agent loop is not accepting events"));
        }

        let event = Event::with_data(
            event_types::DATA_ARRIVED,
            serde_json::json!({
                "entryId": entry.id,
                "type": entry.event_type,
                "sourceId": entry.source_id,
                "collectedAt": entry.collected_at,
                "payload": entry.payload,
            }),
        );
        self.agent_loop.submit(event);
        Ok(())
    }

    async fn probe(&self) -> bool {
        self.agent_loop.is_accepting()
    }
}

/// Forwards dead-letter notifications (and anything else the flusher
/// emits) onto the agent loop as ordinary events.
struct AgentEventSink {
    agent_loop: Arc<AgentLoop>,
}

#[async_trait]
impl EventSink for AgentEventSink {
    async fn submit(&self, event: Event) {
        self.agent_loop.submit(event);
    }
}

pub async fn run(config_path: Option<&Path>) -> Result<()> {
    let config = ServeConfig::load(config_path)?;
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("failed to create data directory {}", config.data_dir.display()))?;

    let storage = Arc::new(
        FileStorage::new(config.data_dir.clone())
            .await
            .context("failed to open file storage")?,
    );
    let state = Arc::new(
        StateManager::load(storage.clone())
            .await
            .context("failed to load state document")?,
    );
    let agent_loop = AgentLoop::new(storage.clone(), Arc::new(NoDriverFactory), state);
    agent_loop.spawn(config.workers);

    let buffer = Arc::new(
        IngestionBuffer::open(
            config.data_dir.join("ingestion.spool"),
            BufferLimits { max_entries: config.buffer.max_entries, max_bytes: config.buffer.max_bytes },
        )
        .await
        .context("failed to open ingestion buffer")?,
    );
    let dlq = Arc::new(
        DeadLetterStore::open(config.data_dir.join("dead-letter.ndjson"))
            .await
            .context("failed to open dead-letter store")?,
    );

    let ingestion_sink: Arc<dyn IngestionSink> = Arc::new(AgentIngestionSink { agent_loop: agent_loop.clone() });
    let event_sink: Arc<dyn EventSink> = Arc::new(AgentEventSink { agent_loop: agent_loop.clone() });
    let flusher = Flusher::new(
        buffer.clone(),
        dlq.clone(),
        ingestion_sink,
        event_sink,
        FlushOptions { batch_size: config.flush_batch_size, max_attempts: config.max_attempts },
    );
    flusher.spawn();

    let sources = Arc::new(SourceManager::new(buffer.clone()));
    for descriptor in config.sources.clone() {
        let id = descriptor.id.clone();
        if let Err(error) = sources.create(descriptor) {
            warn!(source_id = %id, %error, "failed to start declared source, skipping");
        }
    }

    let app = router(ReporterState { buffer, flusher: flusher.clone(), sources });
    let bind_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid host/port combination")?;
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    info!(%bind_addr, "loomctl serve listening");

    let serve_handle = tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, app).await {
            warn!(%error, "reporter HTTP server exited with an error");
        }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal, draining");
        }
        result = serve_handle => {
            if let Err(error) = result {
                warn!(%error, "reporter HTTP server task panicked");
            }
        }
    }

    flusher.stop().await;
    agent_loop.stop(Some(std::time::Duration::from_secs(30))).await;

    Ok(())
}
