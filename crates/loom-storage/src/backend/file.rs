//! File-backed storage for the workflow context's §6.1 handle.
//!
//! One JSON document per collection plus a single state-document value,
//! rooted under a configurable data directory. Every write takes the
//! in-process lock, mutates the in-memory cache, then persists the affected
//! document before releasing it — this satisfies the "no half-written
//! state" invariant for a single-process deployment, which is the explicit
//! scope of this backend (multi-process fan-out is a non-goal).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use loom_core::error::{LoomError, LoomResult, StorageErrorKind};
use loom_core::storage::{Collection, Query, Record, Storage};

/// In-memory state guarded by a single lock so that a write to one
/// collection can never be observed half-applied alongside another.
#[derive(Default)]
struct Store {
    issues: HashMap<String, Record>,
    knowledge: HashMap<String, Record>,
    flows: HashMap<String, Record>,
    pond: HashMap<String, Record>,
    state: String,
}

impl Store {
    fn collection_mut(&mut self, collection: Collection) -> &mut HashMap<String, Record> {
        match collection {
            Collection::Issues => &mut self.issues,
            Collection::Knowledge => &mut self.knowledge,
            Collection::Flows => &mut self.flows,
            Collection::Pond => &mut self.pond,
        }
    }

    fn collection(&self, collection: Collection) -> &HashMap<String, Record> {
        match collection {
            Collection::Issues => &self.issues,
            Collection::Knowledge => &self.knowledge,
            Collection::Flows => &self.flows,
            Collection::Pond => &self.pond,
        }
    }
}

/// File-based implementation of [`Storage`].
///
/// Layout under `data_dir`: `issues.json`, `knowledge.json`, `flows.json`,
/// `pond.json` (each a map of id -> record), and `state.json` (the raw
/// state document string, JSON-encoded).
pub struct FileStorage {
    data_dir: PathBuf,
    store: RwLock<Store>,
}

fn io_err(path: &Path, action: &str, err: std::io::Error) -> LoomError {
    LoomError::unavailable(format!(
        "failed to {action} {}: {err}",
        path.display()
    ))
}

impl FileStorage {
    /// Opens (or initializes) a file-backed store rooted at `data_dir`.
    /// Missing collection files are treated as empty; a missing state file
    /// yields the empty string (§4.8).
    pub async fn new(data_dir: impl Into<PathBuf>) -> LoomResult<Self> {
        let data_dir = data_dir.into();
        tokio::fs::create_dir_all(&data_dir)
            .await
            .map_err(|e| io_err(&data_dir, "create directory", e))?;

        let issues = Self::load_collection(&data_dir, Collection::Issues).await?;
        let knowledge = Self::load_collection(&data_dir, Collection::Knowledge).await?;
        let flows = Self::load_collection(&data_dir, Collection::Flows).await?;
        let pond = Self::load_collection(&data_dir, Collection::Pond).await?;
        let state = Self::load_state_file(&data_dir).await?;

        Ok(Self {
            data_dir,
            store: RwLock::new(Store {
                issues,
                knowledge,
                flows,
                pond,
                state,
            }),
        })
    }

    fn collection_path(data_dir: &Path, collection: Collection) -> PathBuf {
        data_dir.join(format!("{}.json", collection.as_str()))
    }

    fn state_path(data_dir: &Path) -> PathBuf {
        data_dir.join("state.json")
    }

    async fn load_collection(
        data_dir: &Path,
        collection: Collection,
    ) -> LoomResult<HashMap<String, Record>> {
        let path = Self::collection_path(data_dir, collection);
        if !path.exists() {
            return Ok(HashMap::new());
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| io_err(&path, "read", e))?;

        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }

        serde_json::from_str(&content)
            .map_err(|e| LoomError::invalid(format!("corrupt {}: {e}", path.display())))
    }

    async fn load_state_file(data_dir: &Path) -> LoomResult<String> {
        let path = Self::state_path(data_dir);
        if !path.exists() {
            return Ok(String::new());
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| io_err(&path, "read", e))?;

        if content.trim().is_empty() {
            return Ok(String::new());
        }

        let value: Value = serde_json::from_str(&content)
            .map_err(|e| LoomError::invalid(format!("corrupt {}: {e}", path.display())))?;

        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn persist_collection(
        &self,
        collection: Collection,
        records: &HashMap<String, Record>,
    ) -> LoomResult<()> {
        let path = Self::collection_path(&self.data_dir, collection);
        let content = serde_json::to_string_pretty(records)
            .map_err(|e| LoomError::invalid(format!("failed to serialize {}: {e}", collection.as_str())))?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| io_err(&path, "write", e))
    }

    async fn persist_state(&self, value: &str) -> LoomResult<()> {
        let path = Self::state_path(&self.data_dir);
        let content = serde_json::to_string_pretty(&Value::String(value.to_string()))
            .map_err(|e| LoomError::invalid(format!("failed to serialize state: {e}")))?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| io_err(&path, "write", e))
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn create(&self, collection: Collection, record: Record) -> LoomResult<Record> {
        let record = if record.id.is_empty() {
            Record::new(uuid::Uuid::new_v4().to_string(), record.fields)
        } else {
            record
        };

        let snapshot = {
            let mut store = self.store.write().await;
            let bucket = store.collection_mut(collection);
            if bucket.contains_key(&record.id) {
                return Err(LoomError::conflict(format!(
                    "{} already exists in {}",
                    record.id,
                    collection.as_str()
                )));
            }
            bucket.insert(record.id.clone(), record.clone());
            bucket.clone()
        };

        self.persist_collection(collection, &snapshot).await?;
        Ok(record)
    }

    async fn get(&self, collection: Collection, id: &str) -> LoomResult<Record> {
        let store = self.store.read().await;
        store
            .collection(collection)
            .get(id)
            .cloned()
            .ok_or_else(|| LoomError::not_found(format!("{id} not found in {}", collection.as_str())))
    }

    async fn update(&self, collection: Collection, id: &str, fields: Value) -> LoomResult<Record> {
        let (updated, snapshot) = {
            let mut store = self.store.write().await;
            let bucket = store.collection_mut(collection);
            let existing = bucket
                .get_mut(id)
                .ok_or_else(|| LoomError::not_found(format!("{id} not found in {}", collection.as_str())))?;

            merge_fields(&mut existing.fields, fields);
            let updated = existing.clone();
            (updated, bucket.clone())
        };

        self.persist_collection(collection, &snapshot).await?;
        Ok(updated)
    }

    async fn search(&self, collection: Collection, query: &Query) -> LoomResult<Vec<Record>> {
        let store = self.store.read().await;
        let mut results: Vec<Record> = store
            .collection(collection)
            .values()
            .filter(|record| query.matches(record))
            .cloned()
            .collect();

        if let Some(limit) = query.limit {
            results.truncate(limit);
        }

        Ok(results)
    }

    async fn load_state(&self) -> LoomResult<String> {
        Ok(self.store.read().await.state.clone())
    }

    async fn save_state(&self, value: &str) -> LoomResult<()> {
        {
            let mut store = self.store.write().await;
            store.state = value.to_string();
        }
        self.persist_state(value).await
    }
}

/// Shallow-merges an update object into the stored fields. If either side
/// isn't a JSON object, the update simply replaces the stored value — the
/// storage handle imposes no schema (§6.1).
fn merge_fields(existing: &mut Value, update: Value) {
    match (existing, update) {
        (Value::Object(existing_map), Value::Object(update_map)) => {
            for (key, value) in update_map {
                existing_map.insert(key, value);
            }
        }
        (existing, update) => *existing = update,
    }
}
