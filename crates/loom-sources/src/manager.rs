//! The source manager (C11, §4.11): CRUD over declared sources plus
//! lifecycle management of their adapters. Each enabled POLLING/STREAM
//! source runs in its own task; one source's failures never reach
//! another's, since each adapter owns nothing but its own loop and a
//! shared, internally-synchronized handle to the registry and buffer.

use std::sync::Arc;

use dashmap::DashMap;
use loom_core::{event_types, LoomError, LoomResult};
use loom_ingest::{IngestionBuffer, IngestionEntry};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::info;

use crate::adapter::{polling, stream, webhook};
use crate::source::{SourceDescriptor, SourceVariant};

struct AdapterHandle(JoinHandle<()>);

impl Drop for AdapterHandle {
    fn drop(&mut self) {
        self.0.abort();
    }
}

pub struct SourceManager {
    sources: Arc<DashMap<String, SourceDescriptor>>,
    tasks: DashMap<String, AdapterHandle>,
    buffer: Arc<IngestionBuffer>,
    client: reqwest::Client,
}

impl SourceManager {
    pub fn new(buffer: Arc<IngestionBuffer>) -> Self {
        Self {
            sources: Arc::new(DashMap::new()),
            tasks: DashMap::new(),
            buffer,
            client: reqwest::Client::new(),
        }
    }

    pub fn list(&self) -> Vec<SourceDescriptor> {
        self.sources.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn get(&self, id: &str) -> Option<SourceDescriptor> {
        self.sources.get(id).map(|entry| entry.value().clone())
    }

    /// Registers a new source and starts its adapter if enabled.
    pub fn create(&self, descriptor: SourceDescriptor) -> LoomResult<()> {
        descriptor.variant.validate().map_err(LoomError::source)?;
        if self.sources.contains_key(&descriptor.id) {
            return Err(LoomError::conflict(format!("source '{}' already exists", descriptor.id)));
        }

        let id = descriptor.id.clone();
        let enabled = descriptor.enabled;
        let variant = descriptor.variant.clone();
        self.sources.insert(id.clone(), descriptor);

        if enabled {
            self.start_adapter(&id, &variant);
        }
        Ok(())
    }

    /// Hot-reloads a source (§4.11): stops its adapter, applies the new
    /// descriptor (preserving `id`), and restarts if still enabled.
    pub fn replace(&self, id: &str, mut descriptor: SourceDescriptor) -> LoomResult<()> {
        descriptor.variant.validate().map_err(LoomError::source)?;
        if !self.sources.contains_key(id) {
            return Err(LoomError::not_found(format!("source '{id}' not found")));
        }
        descriptor.id = id.to_string();

        self.tasks.remove(id);
        let enabled = descriptor.enabled;
        let variant = descriptor.variant.clone();
        self.sources.insert(id.to_string(), descriptor);

        if enabled {
            self.start_adapter(id, &variant);
        }
        info!(source = %id, "source hot-reloaded");
        Ok(())
    }

    pub fn delete(&self, id: &str) -> LoomResult<()> {
        self.tasks.remove(id);
        self.sources
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| LoomError::not_found(format!("source '{id}' not found")))
    }

    pub fn enable(&self, id: &str) -> LoomResult<()> {
        let variant = {
            let mut entry = self
                .sources
                .get_mut(id)
                .ok_or_else(|| LoomError::not_found(format!("source '{id}' not found")))?;
            entry.enabled = true;
            entry.variant.clone()
        };
        self.start_adapter(id, &variant);
        Ok(())
    }

    pub fn disable(&self, id: &str) -> LoomResult<()> {
        let mut entry = self
            .sources
            .get_mut(id)
            .ok_or_else(|| LoomError::not_found(format!("source '{id}' not found")))?;
        entry.enabled = false;
        self.tasks.remove(id);
        Ok(())
    }

    fn start_adapter(&self, id: &str, variant: &SourceVariant) {
        let handle = match variant {
            SourceVariant::Webhook { .. } => return,
            SourceVariant::Polling { endpoint, interval_secs } => polling::spawn(
                id.to_string(),
                endpoint.clone(),
                *interval_secs,
                self.client.clone(),
                self.buffer.clone(),
                self.sources.clone(),
            ),
            SourceVariant::Stream { endpoint } => stream::spawn(
                id.to_string(),
                endpoint.clone(),
                self.client.clone(),
                self.buffer.clone(),
                self.sources.clone(),
            ),
        };
        self.tasks.insert(id.to_string(), AdapterHandle(handle));
    }

    /// Accepts one inbound webhook delivery for `id` (§4.11, §6.2). Verifies
    /// the HMAC signature when the source declares a shared secret, then
    /// turns the JSON body into one or more ingestion entries.
    pub async fn handle_webhook(
        &self,
        id: &str,
        signature: Option<&str>,
        body: &[u8],
    ) -> LoomResult<usize> {
        let descriptor = self
            .sources
            .get(id)
            .ok_or_else(|| LoomError::not_found(format!("source '{id}' not found")))?
            .clone();

        if !descriptor.enabled {
            return Err(LoomError::source(format!("source '{id}' is disabled")));
        }

        let secret = match &descriptor.variant {
            SourceVariant::Webhook { shared_secret } => shared_secret.clone(),
            _ => return Err(LoomError::source(format!("source '{id}' is not a webhook source"))),
        };

        if let Some(secret) = secret {
            let signature = signature.unwrap_or_default();
            if !webhook::verify_signature(&secret, body, signature) {
                if let Some(mut entry) = self.sources.get_mut(id) {
                    entry.status.record_error("signature verification failed");
                }
                return Err(LoomError::source("webhook signature verification failed"));
            }
        }

        let payload: Value = serde_json::from_slice(body)?;
        let items = match payload {
            Value::Array(items) => items,
            other => vec![other],
        };

        let count = items.len();
        for item in items {
            let entry = IngestionEntry::new(event_types::DATA_ARRIVED, id.to_string(), item);
            self.buffer.enqueue(entry).await?;
        }

        if let Some(mut entry) = self.sources.get_mut(id) {
            entry.status.record_success();
        }

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceVariant;
    use tempfile::tempdir;

    async fn new_manager() -> SourceManager {
        let dir = tempdir().unwrap();
        let buffer = Arc::new(
            IngestionBuffer::open(dir.path().join("buf.ndjson"), Default::default())
                .await
                .unwrap(),
        );
        SourceManager::new(buffer)
    }

    #[tokio::test]
    async fn create_rejects_duplicate_ids() {
        let manager = new_manager().await;
        let descriptor = SourceDescriptor::new("s1", "Source 1", SourceVariant::Webhook { shared_secret: None });
        manager.create(descriptor.clone()).unwrap();
        assert!(manager.create(descriptor).is_err());
    }

    #[tokio::test]
    async fn webhook_without_secret_accepts_unsigned_requests() {
        let manager = new_manager().await;
        manager
            .create(SourceDescriptor::new("s1", "Source 1", SourceVariant::Webhook { shared_secret: None }))
            .unwrap();

        let count = manager.handle_webhook("s1", None, br#"{"a":1}"#).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn webhook_with_secret_rejects_bad_signature() {
        let manager = new_manager().await;
        manager
            .create(SourceDescriptor::new(
                "s1",
                "Source 1",
                SourceVariant::Webhook { shared_secret: Some("secret".to_string()) },
            ))
            .unwrap();

        let result = manager.handle_webhook("s1", Some("sha256=bad"), br#"{"a":1}"#).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn webhook_array_body_produces_one_entry_per_item() {
        let manager = new_manager().await;
        manager
            .create(SourceDescriptor::new("s1", "Source 1", SourceVariant::Webhook { shared_secret: None }))
            .unwrap();

        let count = manager.handle_webhook("s1", None, br#"[{"a":1},{"a":2},{"a":3}]"#).await.unwrap();
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn disable_then_enable_round_trips_status() {
        let manager = new_manager().await;
        manager
            .create(SourceDescriptor::new("s1", "Source 1", SourceVariant::Polling {
                endpoint: "http://localhost:1/nope".to_string(),
                interval_secs: 3600,
            }))
            .unwrap();

        manager.disable("s1").unwrap();
        assert!(!manager.get("s1").unwrap().enabled);
        manager.enable("s1").unwrap();
        assert!(manager.get("s1").unwrap().enabled);
    }

    #[tokio::test]
    async fn delete_removes_descriptor() {
        let manager = new_manager().await;
        manager
            .create(SourceDescriptor::new("s1", "Source 1", SourceVariant::Webhook { shared_secret: None }))
            .unwrap();
        manager.delete("s1").unwrap();
        assert!(manager.get("s1").is_none());
        assert!(manager.delete("s1").is_err());
    }
}
