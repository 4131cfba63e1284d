//! Dead-letter store (§4.10, §6.3): a parallel append-only file holding
//! entries that exhausted delivery retries.

use std::path::{Path, PathBuf};

use loom_core::LoomResult;
use parking_lot::RwLock;

use crate::entry::IngestionEntry;
use crate::spool;

pub struct DeadLetterStore {
    path: PathBuf,
    entries: RwLock<Vec<IngestionEntry>>,
}

impl DeadLetterStore {
    pub async fn open(path: impl Into<PathBuf>) -> LoomResult<Self> {
        let path = path.into();
        let (entries, _truncated) = spool::load_lines::<IngestionEntry>(&path).await?;
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub async fn append(&self, entry: IngestionEntry) -> LoomResult<()> {
        spool::append_line(&self.path, &entry).await?;
        self.entries.write().push(entry);
        Ok(())
    }

    pub fn list(&self) -> Vec<IngestionEntry> {
        self.entries.read().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn append_persists_and_lists() {
        let dir = tempdir().unwrap();
        let store = DeadLetterStore::open(dir.path().join("dlq.ndjson")).await.unwrap();

        let entry = IngestionEntry::new("metric", "src", serde_json::json!({}));
        store.append(entry.clone()).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.list()[0].id, entry.id);
    }

    #[tokio::test]
    async fn reopen_loads_prior_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dlq.ndjson");
        let id = {
            let store = DeadLetterStore::open(&path).await.unwrap();
            let entry = IngestionEntry::new("metric", "src", serde_json::json!({}));
            let id = entry.id.clone();
            store.append(entry).await.unwrap();
            id
        };

        let reopened = DeadLetterStore::open(&path).await.unwrap();
        assert_eq!(reopened.list()[0].id, id);
    }
}
