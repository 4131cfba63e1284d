//! The state document manager (§4.8): serializes reads and writes of the
//! single cumulative state string and persists it through the storage
//! handle.

use std::sync::Arc;

use loom_core::{LoomResult, Storage};
use tokio::sync::RwLock;

/// Owns the one cumulative state string. The agent loop is the sole
/// committer: because it applies writes sequentially in the order
/// workflows complete, there is never interleaving between two commits
/// (§4.8, §5 ordering guarantee (c)).
pub struct StateManager {
    storage: Arc<dyn Storage>,
    cached: RwLock<String>,
}

impl StateManager {
    /// Loads the current value from storage (or the empty string if none
    /// exists yet) and caches it for fast snapshots.
    pub async fn load(storage: Arc<dyn Storage>) -> LoomResult<Self> {
        let initial = storage.load_state().await?;
        Ok(Self {
            storage,
            cached: RwLock::new(initial),
        })
    }

    /// A consistent snapshot of the current state document.
    pub async fn snapshot(&self) -> String {
        self.cached.read().await.clone()
    }

    /// Commits a new value: the write lock is held across both the
    /// in-memory update and the durable persist, so a concurrent snapshot
    /// reader never observes a value that didn't make it to storage.
    pub async fn commit(&self, value: String) -> LoomResult<()> {
        let mut cached = self.cached.write().await;
        self.storage.save_state(&value).await?;
        *cached = value;
        Ok(())
    }
}
