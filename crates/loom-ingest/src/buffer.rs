//! The ingestion buffer (§4.9): a durable, ordered queue of outbound
//! observations with an in-memory head and a disk-backed tail.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use loom_core::LoomResult;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::warn;

use crate::entry::{EntryState, IngestionEntry};
use crate::spool;

/// Size caps for the buffer (§4.9): exceeding either evicts from the
/// front, oldest-first.
#[derive(Debug, Clone, Copy)]
pub struct BufferLimits {
    pub max_entries: usize,
    pub max_bytes: usize,
}

impl Default for BufferLimits {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            max_bytes: 64 * 1024 * 1024,
        }
    }
}

/// A point-in-time view of buffer occupancy, surfaced through `/status`
/// (§4.12, §6.2).
#[derive(Debug, Clone, Serialize)]
pub struct BufferSnapshot {
    pub entry_count: usize,
    pub max_entries: usize,
    pub bytes_used: usize,
    pub max_bytes: usize,
    pub evicted_total: u64,
}

impl BufferSnapshot {
    /// Fraction of the binding cap currently in use, used by the health
    /// aggregation's "buffer >= 90%" degraded threshold (§4.12).
    pub fn fraction_used(&self) -> f64 {
        let by_entries = if self.max_entries == 0 {
            0.0
        } else {
            self.entry_count as f64 / self.max_entries as f64
        };
        let by_bytes = if self.max_bytes == 0 {
            0.0
        } else {
            self.bytes_used as f64 / self.max_bytes as f64
        };
        by_entries.max(by_bytes)
    }
}

struct State {
    entries: VecDeque<IngestionEntry>,
    bytes_used: usize,
}

/// Durable, size-bounded queue of [`IngestionEntry`] values (§4.9).
///
/// Every accepted enqueue is written to the on-disk spool before the call
/// returns (write-before-ack). The spool is compacted (rewritten in full)
/// after acks, nacks, evictions, and DLQ promotions, trading a little
/// extra I/O on the uncommon paths for a simple, always-consistent file.
pub struct IngestionBuffer {
    spool_path: PathBuf,
    limits: BufferLimits,
    state: Mutex<State>,
    evicted_total: AtomicU64,
}

impl IngestionBuffer {
    /// Reconstructs ordering from disk (§4.9 `load_on_startup`), treating a
    /// corrupt tail as recoverable by truncating to the last valid record.
    pub async fn open(spool_path: impl Into<PathBuf>, limits: BufferLimits) -> LoomResult<Self> {
        let spool_path = spool_path.into();
        let (entries, truncated) = spool::load_lines::<IngestionEntry>(&spool_path).await?;
        if truncated {
            warn!(path = %spool_path.display(), "ingestion spool tail was corrupt; recovered by truncation");
        }

        let bytes_used = entries.iter().map(IngestionEntry::approx_size).sum();

        let buffer = Self {
            spool_path,
            limits,
            state: Mutex::new(State {
                entries: entries.into(),
                bytes_used,
            }),
            evicted_total: AtomicU64::new(0),
        };

        // A truncated tail means the in-memory view no longer matches the
        // file; compact immediately so the two stay in sync.
        if truncated {
            buffer.compact().await?;
        }

        Ok(buffer)
    }

    async fn compact(&self) -> LoomResult<()> {
        let snapshot: Vec<IngestionEntry> = {
            let state = self.state.lock();
            state.entries.iter().cloned().collect()
        };
        spool::rewrite(&self.spool_path, &snapshot).await
    }

    /// Appends `entry`, persisting it before returning. If the count or
    /// byte budget is exceeded afterward, the oldest entries are evicted
    /// until both budgets are satisfied again (§4.9).
    pub async fn enqueue(&self, entry: IngestionEntry) -> LoomResult<()> {
        spool::append_line(&self.spool_path, &entry).await?;

        let evicted = {
            let mut state = self.state.lock();
            state.bytes_used += entry.approx_size();
            state.entries.push_back(entry);

            let mut evicted = Vec::new();
            while state.entries.len() > self.limits.max_entries
                || state.bytes_used > self.limits.max_bytes
            {
                match state.entries.pop_front() {
                    Some(old) => {
                        state.bytes_used = state.bytes_used.saturating_sub(old.approx_size());
                        evicted.push(old);
                    }
                    None => break,
                }
            }
            evicted
        };

        if !evicted.is_empty() {
            self.evicted_total
                .fetch_add(evicted.len() as u64, Ordering::SeqCst);
            for entry in &evicted {
                warn!(id = %entry.id, source = %entry.source_id, "buffer cap exceeded; evicted oldest entry");
            }
            self.compact().await?;
        }

        Ok(())
    }

    /// Up to `n` entries, in order, without removing them.
    pub fn peek(&self, n: usize) -> Vec<IngestionEntry> {
        self.state.lock().entries.iter().take(n).cloned().collect()
    }

    /// Up to `n` entries eligible for another delivery attempt right now,
    /// preserving buffer order but skipping entries still in backoff.
    pub fn peek_due(&self, n: usize) -> Vec<IngestionEntry> {
        let now = Utc::now();
        self.state
            .lock()
            .entries
            .iter()
            .filter(|entry| entry.metadata.is_due(now))
            .take(n)
            .cloned()
            .collect()
    }

    /// Removes delivered entries.
    pub async fn ack(&self, ids: &[String]) -> LoomResult<()> {
        {
            let mut state = self.state.lock();
            state.entries.retain(|entry| {
                if ids.contains(&entry.id) {
                    state.bytes_used = state.bytes_used.saturating_sub(entry.approx_size());
                    false
                } else {
                    true
                }
            });
        }
        self.compact().await
    }

    /// Marks entries for retry: increments their attempt counter and
    /// schedules the next attempt via exponential backoff with jitter
    /// (§4.10).
    pub async fn nack(&self, ids: &[String], next_attempt_at: chrono::DateTime<Utc>) -> LoomResult<()> {
        {
            let mut state = self.state.lock();
            let now = Utc::now();
            for entry in state.entries.iter_mut() {
                if ids.contains(&entry.id) {
                    entry.metadata.attempts += 1;
                    entry.metadata.last_attempt_at = Some(now);
                    entry.metadata.next_attempt_at = Some(next_attempt_at);
                    entry.metadata.state = EntryState::Failed;
                }
            }
        }
        self.compact().await
    }

    /// Removes an entry from the buffer and returns it, for promotion to
    /// the dead-letter store by the caller.
    pub async fn take(&self, id: &str) -> LoomResult<Option<IngestionEntry>> {
        let taken = {
            let mut state = self.state.lock();
            let position = state.entries.iter().position(|entry| entry.id == id);
            position.and_then(|index| {
                let entry = state.entries.remove(index);
                if let Some(ref entry) = entry {
                    state.bytes_used = state.bytes_used.saturating_sub(entry.approx_size());
                }
                entry
            })
        };
        if taken.is_some() {
            self.compact().await?;
        }
        Ok(taken)
    }

    pub fn snapshot(&self) -> BufferSnapshot {
        let state = self.state.lock();
        BufferSnapshot {
            entry_count: state.entries.len(),
            max_entries: self.limits.max_entries,
            bytes_used: state.bytes_used,
            max_bytes: self.limits.max_bytes,
            evicted_total: self.evicted_total.load(Ordering::SeqCst),
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Exports the buffer's current contents to `dest` without network
    /// delivery, then clears the buffer (§4.10 force-flush).
    pub async fn force_flush(&self, dest: &Path) -> LoomResult<()> {
        let snapshot: Vec<IngestionEntry> = {
            let mut state = self.state.lock();
            let drained: Vec<IngestionEntry> = state.entries.drain(..).collect();
            state.bytes_used = 0;
            drained
        };

        spool::rewrite(dest, &snapshot).await?;
        self.compact().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry(id: &str) -> IngestionEntry {
        let mut entry = IngestionEntry::new("metric", "src", serde_json::json!({}));
        entry.id = id.to_string();
        entry
    }

    #[tokio::test]
    async fn enqueue_persists_before_returning() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("buf.ndjson");
        let buffer = IngestionBuffer::open(&path, BufferLimits::default()).await.unwrap();

        buffer.enqueue(entry("e1")).await.unwrap();
        buffer.enqueue(entry("e2")).await.unwrap();
        buffer.enqueue(entry("e3")).await.unwrap();

        assert_eq!(buffer.len(), 3);
        let reopened = IngestionBuffer::open(&path, BufferLimits::default()).await.unwrap();
        assert_eq!(reopened.len(), 3);
    }

    #[tokio::test]
    async fn peek_preserves_insertion_order_without_removing() {
        let dir = tempdir().unwrap();
        let buffer = IngestionBuffer::open(dir.path().join("buf.ndjson"), BufferLimits::default())
            .await
            .unwrap();

        buffer.enqueue(entry("e1")).await.unwrap();
        buffer.enqueue(entry("e2")).await.unwrap();

        let peeked = buffer.peek(10);
        assert_eq!(peeked.iter().map(|e| e.id.clone()).collect::<Vec<_>>(), vec!["e1", "e2"]);
        assert_eq!(buffer.len(), 2);
    }

    #[tokio::test]
    async fn ack_removes_in_order() {
        let dir = tempdir().unwrap();
        let buffer = IngestionBuffer::open(dir.path().join("buf.ndjson"), BufferLimits::default())
            .await
            .unwrap();

        for id in ["e1", "e2", "e3"] {
            buffer.enqueue(entry(id)).await.unwrap();
        }

        buffer.ack(&["e1".to_string()]).await.unwrap();
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.peek(1)[0].id, "e2");
    }

    #[tokio::test]
    async fn exceeding_count_cap_evicts_oldest() {
        let dir = tempdir().unwrap();
        let limits = BufferLimits { max_entries: 2, max_bytes: usize::MAX };
        let buffer = IngestionBuffer::open(dir.path().join("buf.ndjson"), limits).await.unwrap();

        buffer.enqueue(entry("e1")).await.unwrap();
        buffer.enqueue(entry("e2")).await.unwrap();
        buffer.enqueue(entry("e3")).await.unwrap();

        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.snapshot().evicted_total, 1);
        assert_eq!(buffer.peek(2)[0].id, "e2");
    }

    #[tokio::test]
    async fn nack_schedules_backoff_and_is_not_due_yet() {
        let dir = tempdir().unwrap();
        let buffer = IngestionBuffer::open(dir.path().join("buf.ndjson"), BufferLimits::default())
            .await
            .unwrap();
        buffer.enqueue(entry("e1")).await.unwrap();

        let future = Utc::now() + chrono::Duration::seconds(60);
        buffer.nack(&["e1".to_string()], future).await.unwrap();

        assert!(buffer.peek_due(10).is_empty());
        assert_eq!(buffer.peek(10)[0].metadata.attempts, 1);
    }

    #[tokio::test]
    async fn take_removes_entry_for_dlq_promotion() {
        let dir = tempdir().unwrap();
        let buffer = IngestionBuffer::open(dir.path().join("buf.ndjson"), BufferLimits::default())
            .await
            .unwrap();
        buffer.enqueue(entry("e1")).await.unwrap();
        buffer.enqueue(entry("e2")).await.unwrap();

        let taken = buffer.take("e1").await.unwrap().unwrap();
        assert_eq!(taken.id, "e1");
        assert_eq!(buffer.len(), 1);
    }

    #[tokio::test]
    async fn force_flush_exports_and_clears() {
        let dir = tempdir().unwrap();
        let buffer = IngestionBuffer::open(dir.path().join("buf.ndjson"), BufferLimits::default())
            .await
            .unwrap();
        buffer.enqueue(entry("e1")).await.unwrap();

        let dest = dir.path().join("export.ndjson");
        buffer.force_flush(&dest).await.unwrap();

        assert!(buffer.is_empty());
        let (exported, _) = spool::load_lines::<IngestionEntry>(&dest).await.unwrap();
        assert_eq!(exported.len(), 1);
    }
}
