//! Loom Ingest - the durable ingestion buffer, dead-letter store, and
//! retry/flush pipeline sitting in front of the agent loop (§3, §4.9-§4.10).
//!
//! This crate is deliberately independent of `loom-runtime`: the flusher
//! reports dead-letter events through the [`EventSink`] trait rather than
//! calling into `AgentLoop` directly, so the wiring between "an entry was
//! dead-lettered" and "the agent loop sees a `DLQ_ENTRY` event" happens at
//! the binary that owns both (`loomctl`), not in this crate.

pub mod buffer;
pub mod dlq;
pub mod entry;
pub mod retry;
pub mod spool;

pub use buffer::{BufferLimits, BufferSnapshot, IngestionBuffer};
pub use dlq::DeadLetterStore;
pub use entry::{EntryMetadata, EntryState, IngestionEntry};
pub use retry::{
    backoff_delay, EventSink, FlushOptions, FlushRoundReport, Flusher, IngestionSink, SinkConnectivity,
};
