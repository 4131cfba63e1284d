//! The ingestion entry model (§3): an outbound observation plus the mutable
//! delivery metadata the buffer and flusher track against it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where an entry sits in its delivery lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryState {
    Queued,
    Sending,
    Sent,
    Buffered,
    Failed,
}

/// Mutable delivery bookkeeping for one entry.
///
/// `next_attempt_at` is an implementation detail not named by the spec's
/// `{attempts, lastAttemptAt, state}` triple: storing the jittered backoff
/// deadline directly on the entry (computed once, at `nack` time) keeps the
/// flusher's due-check a cheap comparison instead of recomputing backoff +
/// jitter on every poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub attempts: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub state: EntryState,
}

impl Default for EntryMetadata {
    fn default() -> Self {
        Self {
            attempts: 0,
            last_attempt_at: None,
            next_attempt_at: None,
            state: EntryState::Queued,
        }
    }
}

impl EntryMetadata {
    /// Whether this entry is eligible for another delivery attempt right
    /// now. An entry that has never been attempted is always due.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_attempt_at.map_or(true, |scheduled| now >= scheduled)
    }
}

/// An outbound observation awaiting delivery to the agent's ingestion
/// boundary (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub source_id: String,
    pub collected_at: DateTime<Utc>,
    pub payload: Value,
    pub metadata: EntryMetadata,
}

impl IngestionEntry {
    pub fn new(event_type: impl Into<String>, source_id: impl Into<String>, payload: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event_type: event_type.into(),
            source_id: source_id.into(),
            collected_at: Utc::now(),
            payload,
            metadata: EntryMetadata::default(),
        }
    }

    /// Approximate serialized size in bytes, used for the buffer's byte
    /// budget (§4.9). A full round-trip through `serde_json` on every
    /// insert would be wasteful at scale; this is an estimate, not an
    /// exact wire size.
    pub fn approx_size(&self) -> usize {
        serde_json::to_vec(self).map(|bytes| bytes.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_entry_starts_queued_and_due() {
        let entry = IngestionEntry::new("metric", "src-1", serde_json::json!({"v": 1}));
        assert_eq!(entry.metadata.state, EntryState::Queued);
        assert_eq!(entry.metadata.attempts, 0);
        assert!(entry.metadata.is_due(Utc::now()));
    }

    #[test]
    fn scheduled_entry_is_not_due_until_deadline() {
        let mut metadata = EntryMetadata {
            attempts: 1,
            last_attempt_at: Some(Utc::now()),
            next_attempt_at: Some(Utc::now() + chrono::Duration::seconds(60)),
            state: EntryState::Failed,
        };
        assert!(!metadata.is_due(Utc::now()));
        metadata.next_attempt_at = Some(Utc::now() - chrono::Duration::seconds(1));
        assert!(metadata.is_due(Utc::now()));
    }
}
