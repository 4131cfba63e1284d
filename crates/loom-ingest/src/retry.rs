//! Ingestion retry/flush (§4.10): a single task that drains the buffer
//! into the sink whenever it's reachable, with exponential backoff and
//! dead-letter promotion for entries that never make it through.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use loom_core::{event_types, Event, LoomResult};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::buffer::IngestionBuffer;
use crate::dlq::DeadLetterStore;
use crate::entry::IngestionEntry;

/// Cadence of the reachability probe while the sink is unreachable.
const UNREACHABLE_PROBE_INTERVAL: Duration = Duration::from_secs(1);
/// Cadence of the reachability probe while the sink is healthy.
const HEALTHY_PROBE_INTERVAL: Duration = Duration::from_secs(30);
/// Backoff base (§4.10): attempt 1 waits ~1s, attempt 2 ~2s, doubling up
/// to a cap of 2^6 * base before jitter.
const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_MAX_DOUBLINGS: u32 = 6;

/// The delivery boundary the flusher drains into. Implementations report
/// reachability separately from delivery outcome so the flusher can back
/// off its probe cadence without treating every failed send as an outage.
#[async_trait]
pub trait IngestionSink: Send + Sync {
    /// Attempts delivery of a single entry. `Ok(())` means accepted.
    async fn send(&self, entry: &IngestionEntry) -> LoomResult<()>;

    /// Cheap reachability check, independent of `send`.
    async fn probe(&self) -> bool;
}

/// Where the flusher forwards operator-visible events (currently just
/// `DLQ_ENTRY`). Kept as a trait rather than a direct dependency on
/// `loom_runtime::AgentLoop` so this crate never depends on the runtime
/// crate; the caller wires this to `AgentLoop::submit` at startup.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn submit(&self, event: Event);
}

/// Computes the jittered backoff delay before retry number `attempt`
/// (1-indexed): `base * 2^min(attempt-1, cap)`, with up to ±10% jitter.
pub fn backoff_delay(attempt: u32) -> Duration {
    let doublings = attempt.saturating_sub(1).min(BACKOFF_MAX_DOUBLINGS);
    let raw = BACKOFF_BASE.as_secs_f64() * 2f64.powi(doublings as i32);
    let jitter = 1.0 + (rand::random::<f64>() * 0.2 - 0.1);
    Duration::from_secs_f64((raw * jitter).max(0.0))
}

/// Sink connectivity as surfaced through the status/health aggregation
/// (§4.12): whether the sink currently appears reachable, plus a running
/// tally of successes and failures observed by the flusher.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SinkConnectivity {
    pub connected: bool,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub error_count: u64,
}

#[derive(Default)]
struct ConnectivityCounters {
    last_success_at: Mutex<Option<DateTime<Utc>>>,
    last_error_at: Mutex<Option<DateTime<Utc>>>,
    error_count: AtomicU64,
}

#[derive(Debug, Default, Clone)]
pub struct FlushRoundReport {
    pub acked: Vec<String>,
    pub retried: Vec<String>,
    pub dead_lettered: Vec<String>,
}

impl FlushRoundReport {
    pub fn is_empty(&self) -> bool {
        self.acked.is_empty() && self.retried.is_empty() && self.dead_lettered.is_empty()
    }
}

pub struct FlushOptions {
    pub batch_size: usize,
    pub max_attempts: u32,
}

impl Default for FlushOptions {
    fn default() -> Self {
        Self {
            batch_size: 50,
            max_attempts: loom_core::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Drains `buffer` into `sink`, promoting exhausted entries to `dlq` and
/// notifying `events` (§4.10, §6.3 scenario 4).
pub struct Flusher {
    buffer: Arc<IngestionBuffer>,
    dlq: Arc<DeadLetterStore>,
    sink: Arc<dyn IngestionSink>,
    events: Arc<dyn EventSink>,
    options: FlushOptions,
    healthy: AtomicBool,
    stopped: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
    counters: ConnectivityCounters,
}

impl Flusher {
    pub fn new(
        buffer: Arc<IngestionBuffer>,
        dlq: Arc<DeadLetterStore>,
        sink: Arc<dyn IngestionSink>,
        events: Arc<dyn EventSink>,
        options: FlushOptions,
    ) -> Arc<Self> {
        Arc::new(Self {
            buffer,
            dlq,
            sink,
            events,
            options,
            healthy: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            task: Mutex::new(None),
            counters: ConnectivityCounters::default(),
        })
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    /// Snapshot of sink connectivity for the status/health surface (§4.12).
    pub fn connectivity(&self) -> SinkConnectivity {
        SinkConnectivity {
            connected: self.is_healthy(),
            last_success_at: *self.counters.last_success_at.lock(),
            last_error_at: *self.counters.last_error_at.lock(),
            error_count: self.counters.error_count.load(Ordering::SeqCst),
        }
    }

    /// Runs one delivery round against every entry currently due, without
    /// blocking on entries still in backoff (scenario 4: a dead-lettered
    /// entry never blocks the ones behind it).
    pub async fn run_once(&self) -> LoomResult<FlushRoundReport> {
        let due = self.buffer.peek_due(self.options.batch_size);
        let mut report = FlushRoundReport::default();

        for entry in due {
            match self.sink.send(&entry).await {
                Ok(()) => {
                    *self.counters.last_success_at.lock() = Some(Utc::now());
                    report.acked.push(entry.id.clone());
                }
                Err(error) => {
                    *self.counters.last_error_at.lock() = Some(Utc::now());
                    self.counters.error_count.fetch_add(1, Ordering::SeqCst);
                    let attempts = entry.metadata.attempts + 1;
                    if attempts >= self.options.max_attempts {
                        warn!(id = %entry.id, source = %entry.source_id, attempts, %error, "entry exhausted retries; moving to dead-letter store");
                        self.buffer.take(&entry.id).await?;
                        self.dlq.append(entry.clone()).await?;
                        self.events
                            .submit(Event::with_data(
                                event_types::DLQ_ENTRY,
                                serde_json::json!({
                                    "id": entry.id,
                                    "sourceId": entry.source_id,
                                    "type": entry.event_type,
                                    "attempts": attempts,
                                }),
                            ))
                            .await;
                        report.dead_lettered.push(entry.id.clone());
                    } else {
                        let delay = backoff_delay(attempts);
                        let next_attempt_at = chrono::Utc::now()
                            + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::seconds(1));
                        self.buffer.nack(&[entry.id.clone()], next_attempt_at).await?;
                        report.retried.push(entry.id.clone());
                    }
                }
            }
        }

        if !report.acked.is_empty() {
            self.buffer.ack(&report.acked).await?;
        }

        Ok(report)
    }

    /// Spawns the background probe/flush task (§4.10). While the sink is
    /// reachable, rounds run back to back until a round is empty or a
    /// round errors; then the probe cadence backs off.
    pub fn spawn(self: &Arc<Self>) {
        let this = self.clone();
        let handle = tokio::spawn(async move { this.run_forever().await });
        *self.task.lock() = Some(handle);
    }

    async fn run_forever(self: Arc<Self>) {
        while !self.stopped.load(Ordering::SeqCst) {
            let healthy = self.sink.probe().await;
            self.healthy.store(healthy, Ordering::SeqCst);

            if healthy {
                loop {
                    match self.run_once().await {
                        Ok(report) if report.is_empty() => break,
                        Ok(_) => continue,
                        Err(error) => {
                            error!(%error, "ingestion flush round failed");
                            break;
                        }
                    }
                }
                tokio::time::sleep(HEALTHY_PROBE_INTERVAL).await;
            } else {
                tokio::time::sleep(UNREACHABLE_PROBE_INTERVAL).await;
            }
        }
        info!("ingestion flusher stopped");
    }

    pub async fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
    }

    /// Exports the buffer without attempting delivery (§4.10 force-flush).
    pub async fn force_flush(&self, dest: &std::path::Path) -> LoomResult<()> {
        self.buffer.force_flush(dest).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tempfile::tempdir;
    use tokio::sync::Mutex as AsyncMutex;

    struct FlakySink {
        fail_first_n: usize,
        attempts: AtomicUsize,
        reachable: AtomicBool,
    }

    #[async_trait]
    impl IngestionSink for FlakySink {
        async fn send(&self, _entry: &IngestionEntry) -> LoomResult<()> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.fail_first_n {
                Err(loom_core::LoomError::unavailable("sink down"))
            } else {
                Ok(())
            }
        }

        async fn probe(&self) -> bool {
            self.reachable.load(Ordering::SeqCst)
        }
    }

    #[derive(Default)]
    struct RecordingEventSink {
        events: AsyncMutex<Vec<Event>>,
    }

    #[async_trait]
    impl EventSink for RecordingEventSink {
        async fn submit(&self, event: Event) {
            self.events.lock().await.push(event);
        }
    }

    fn entry(id: &str) -> IngestionEntry {
        let mut entry = IngestionEntry::new("metric", "src", serde_json::json!({}));
        entry.id = id.to_string();
        entry
    }

    #[tokio::test]
    async fn successful_round_acks_in_order() {
        let dir = tempdir().unwrap();
        let buffer = Arc::new(
            IngestionBuffer::open(dir.path().join("buf.ndjson"), Default::default())
                .await
                .unwrap(),
        );
        let dlq = Arc::new(DeadLetterStore::open(dir.path().join("dlq.ndjson")).await.unwrap());
        buffer.enqueue(entry("e1")).await.unwrap();
        buffer.enqueue(entry("e2")).await.unwrap();

        let sink = Arc::new(FlakySink {
            fail_first_n: 0,
            attempts: AtomicUsize::new(0),
            reachable: AtomicBool::new(true),
        });
        let events = Arc::new(RecordingEventSink::default());
        let flusher = Flusher::new(buffer.clone(), dlq, sink, events, FlushOptions::default());

        let report = flusher.run_once().await.unwrap();
        assert_eq!(report.acked, vec!["e1".to_string(), "e2".to_string()]);
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn exhausted_retries_promote_to_dlq_and_emit_event() {
        let dir = tempdir().unwrap();
        let buffer = Arc::new(
            IngestionBuffer::open(dir.path().join("buf.ndjson"), Default::default())
                .await
                .unwrap(),
        );
        let dlq = Arc::new(DeadLetterStore::open(dir.path().join("dlq.ndjson")).await.unwrap());
        buffer.enqueue(entry("e1")).await.unwrap();

        let sink = Arc::new(FlakySink {
            fail_first_n: usize::MAX,
            attempts: AtomicUsize::new(0),
            reachable: AtomicBool::new(true),
        });
        let events = Arc::new(RecordingEventSink::default());
        let options = FlushOptions { batch_size: 10, max_attempts: 1 };
        let flusher = Flusher::new(buffer.clone(), dlq.clone(), sink, events.clone(), options);

        let report = flusher.run_once().await.unwrap();
        assert_eq!(report.dead_lettered, vec!["e1".to_string()]);
        assert!(buffer.is_empty());
        assert_eq!(dlq.len(), 1);
        assert_eq!(events.events.lock().await.len(), 1);
        assert_eq!(events.events.lock().await[0].event_type, event_types::DLQ_ENTRY);
    }

    #[tokio::test]
    async fn unexhausted_failure_reschedules_without_blocking_others() {
        let dir = tempdir().unwrap();
        let buffer = Arc::new(
            IngestionBuffer::open(dir.path().join("buf.ndjson"), Default::default())
                .await
                .unwrap(),
        );
        let dlq = Arc::new(DeadLetterStore::open(dir.path().join("dlq.ndjson")).await.unwrap());
        buffer.enqueue(entry("e1")).await.unwrap();
        buffer.enqueue(entry("e2")).await.unwrap();

        // e1 always fails (simulated via fail_first_n covering only one
        // call per entry isn't quite right with a shared counter, so
        // instead verify via max_attempts=5: first round nacks e1 into
        // backoff, but e2 still gets a delivery attempt in the same round.
        let sink = Arc::new(FlakySink {
            fail_first_n: 1,
            attempts: AtomicUsize::new(0),
            reachable: AtomicBool::new(true),
        });
        let events = Arc::new(RecordingEventSink::default());
        let flusher = Flusher::new(buffer.clone(), dlq, sink, events, FlushOptions::default());

        let report = flusher.run_once().await.unwrap();
        assert_eq!(report.retried, vec!["e1".to_string()]);
        assert_eq!(report.acked, vec!["e2".to_string()]);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn backoff_delay_grows_with_attempt_and_stays_within_jitter_bounds() {
        for attempt in 1..=5u32 {
            let expected_raw = 2f64.powi((attempt - 1) as i32);
            let delay = backoff_delay(attempt).as_secs_f64();
            assert!(delay >= expected_raw * 0.9 - 0.001);
            assert!(delay <= expected_raw * 1.1 + 0.001);
        }
    }
}
