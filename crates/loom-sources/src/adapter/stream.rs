//! Streaming adapter (§4.11): holds a persistent connection open and
//! treats the response body as newline-delimited JSON observations,
//! reconnecting with backoff whenever the connection drops.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::StreamExt;
use loom_core::{event_types, LoomError, LoomResult};
use loom_ingest::{IngestionBuffer, IngestionEntry};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::backoff;
use crate::source::SourceDescriptor;

const BASE_RECONNECT_DELAY: Duration = Duration::from_secs(1);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);

async fn drain_connection(
    client: &reqwest::Client,
    endpoint: &str,
    buffer: &IngestionBuffer,
    source_id: &str,
) -> LoomResult<()> {
    let response = client
        .get(endpoint)
        .send()
        .await
        .map_err(|error| LoomError::source(format!("stream connect failed: {error}")))?;

    let mut body = response.bytes_stream();
    let mut pending = Vec::new();

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|error| LoomError::source(format!("stream read failed: {error}")))?;
        pending.extend_from_slice(&chunk);

        while let Some(newline_at) = pending.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = pending.drain(..=newline_at).collect();
            let line = &line[..line.len() - 1];
            if line.is_empty() {
                continue;
            }
            match serde_json::from_slice(line) {
                Ok(value) => {
                    let entry = IngestionEntry::new(event_types::DATA_ARRIVED, source_id.to_string(), value);
                    if let Err(error) = buffer.enqueue(entry).await {
                        warn!(source = %source_id, %error, "failed to enqueue streamed observation");
                    }
                }
                Err(error) => {
                    warn!(source = %source_id, %error, "dropped unparseable stream line");
                }
            }
        }
    }

    // The connection closed cleanly; the caller treats this as a
    // disconnect to reconnect from, same as a transport error.
    Ok(())
}

/// Spawns the reconnecting stream loop for one source (§4.11).
pub fn spawn(
    id: String,
    endpoint: String,
    client: reqwest::Client,
    buffer: Arc<IngestionBuffer>,
    sources: Arc<DashMap<String, SourceDescriptor>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut delay = BASE_RECONNECT_DELAY;

        loop {
            match sources.get(&id) {
                None => break,
                Some(descriptor) if !descriptor.enabled => {
                    tokio::time::sleep(BASE_RECONNECT_DELAY).await;
                    continue;
                }
                Some(_) => {}
            }

            match drain_connection(&client, &endpoint, &buffer, &id).await {
                Ok(()) => {
                    if let Some(mut descriptor) = sources.get_mut(&id) {
                        descriptor.status.record_success();
                    }
                    delay = BASE_RECONNECT_DELAY;
                }
                Err(error) => {
                    warn!(source = %id, %error, "stream disconnected; reconnecting");
                    if let Some(mut descriptor) = sources.get_mut(&id) {
                        descriptor.status.record_error(error.to_string());
                    }
                    tokio::time::sleep(delay).await;
                    delay = backoff::step(delay, MAX_RECONNECT_DELAY);
                }
            }
        }
    })
}
