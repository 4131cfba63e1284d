//! Polling adapter (§4.11): ticks at a configured interval, calling the
//! source's fetch hook (a plain HTTP GET) and pushing whatever it returns
//! into the ingestion buffer. Failures back off the poll interval up to a
//! cap; a success resets it.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use loom_core::{event_types, LoomError, LoomResult};
use loom_ingest::{IngestionBuffer, IngestionEntry};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::backoff;
use crate::source::SourceDescriptor;

const BACKOFF_CAP_MULTIPLIER: u32 = 10;

async fn fetch_once(client: &reqwest::Client, endpoint: &str) -> LoomResult<Vec<Value>> {
    let response = client
        .get(endpoint)
        .send()
        .await
        .map_err(|error| LoomError::source(format!("poll request failed: {error}")))?;

    let body: Value = response
        .json()
        .await
        .map_err(|error| LoomError::source(format!("poll response was not JSON: {error}")))?;

    Ok(match body {
        Value::Array(items) => items,
        other => vec![other],
    })
}

/// Spawns the polling loop for one source. The task exits once `id` is
/// removed from `sources`; while present but disabled, it keeps ticking
/// at the base interval without fetching (so re-enabling takes effect
/// within one tick rather than requiring a restart).
pub fn spawn(
    id: String,
    endpoint: String,
    interval_secs: u64,
    client: reqwest::Client,
    buffer: Arc<IngestionBuffer>,
    sources: Arc<DashMap<String, SourceDescriptor>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let base = Duration::from_secs(interval_secs.max(1));
        let cap = base.saturating_mul(BACKOFF_CAP_MULTIPLIER);
        let mut delay = base;

        loop {
            tokio::time::sleep(delay).await;

            match sources.get(&id) {
                None => break,
                Some(descriptor) if !descriptor.enabled => continue,
                Some(_) => {}
            }

            match fetch_once(&client, &endpoint).await {
                Ok(values) => {
                    let count = values.len();
                    for value in values {
                        let entry = IngestionEntry::new(event_types::DATA_ARRIVED, id.clone(), value);
                        if let Err(error) = buffer.enqueue(entry).await {
                            warn!(source = %id, %error, "failed to enqueue polled observation");
                        }
                    }
                    debug!(source = %id, count, "poll tick produced observations");
                    if let Some(mut descriptor) = sources.get_mut(&id) {
                        descriptor.status.record_success();
                    }
                    delay = base;
                }
                Err(error) => {
                    warn!(source = %id, %error, "poll tick failed");
                    if let Some(mut descriptor) = sources.get_mut(&id) {
                        descriptor.status.record_error(error.to_string());
                    }
                    delay = backoff::step(delay, cap);
                }
            }
        }
    })
}
