//! Status & health aggregation (C12, §4.12): a read-only snapshot derived
//! from sink connectivity, buffer occupancy, and per-source status. No
//! locking beyond the snapshot read — the caller assembles the three
//! inputs and this module only derives the overall level.

use loom_ingest::{BufferSnapshot, SinkConnectivity};
use serde::Serialize;

use crate::source::SourceDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthLevel {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Per-check booleans backing the reporter's `/health*` endpoints (§6.2):
/// server is always true once this snapshot exists, buffer/sources mirror
/// whether that subsystem is itself unhealthy.
#[derive(Debug, Clone, Serialize)]
pub struct HealthChecks {
    pub server: bool,
    pub buffer: bool,
    pub sources: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub level: HealthLevel,
    pub sink: SinkConnectivity,
    pub buffer: BufferSnapshot,
    pub sources: Vec<SourceDescriptor>,
    pub checks: HealthChecks,
}

const BUFFER_DEGRADED_THRESHOLD: f64 = 0.9;

/// Derives the §4.12 snapshot from its three inputs.
pub fn aggregate(sink: SinkConnectivity, buffer: BufferSnapshot, sources: Vec<SourceDescriptor>) -> StatusSnapshot {
    let total_sources = sources.len();
    let failing_sources = sources.iter().filter(|source| source.status.is_failing()).count();
    let all_sources_failing = total_sources > 0 && failing_sources == total_sources;
    let minority_sources_failing = failing_sources > 0 && !all_sources_failing;

    let buffer_hot = buffer.fraction_used() >= BUFFER_DEGRADED_THRESHOLD;
    // A sink that is currently connected but has logged at least one
    // delivery error is "flaky" rather than cleanly healthy or fully down.
    let sink_flaky = sink.connected && sink.error_count > 0;

    let level = if !sink.connected || all_sources_failing {
        HealthLevel::Unhealthy
    } else if sink_flaky || buffer_hot || minority_sources_failing {
        HealthLevel::Degraded
    } else {
        HealthLevel::Healthy
    };

    let checks = HealthChecks {
        server: true,
        buffer: !buffer_hot,
        sources: !all_sources_failing,
    };

    StatusSnapshot { level, sink, buffer, sources, checks }
}

impl StatusSnapshot {
    /// HTTP status code for `/health`, `/health/live`, `/health/ready`
    /// (§6.2): `/health` always reports 200, while liveness/readiness can
    /// return 503 when unhealthy.
    pub fn is_ready(&self) -> bool {
        self.level != HealthLevel::Unhealthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ConnectionStatus, SourceVariant};

    fn source(id: &str, failing: bool) -> SourceDescriptor {
        let mut descriptor =
            SourceDescriptor::new(id, id, SourceVariant::Webhook { shared_secret: None });
        if failing {
            let mut status = ConnectionStatus::default();
            status.record_error("boom");
            descriptor.status = status;
        }
        descriptor
    }

    fn healthy_sink() -> SinkConnectivity {
        SinkConnectivity { connected: true, last_success_at: None, last_error_at: None, error_count: 0 }
    }

    fn empty_buffer() -> BufferSnapshot {
        BufferSnapshot { entry_count: 0, max_entries: 100, bytes_used: 0, max_bytes: 1_000_000, evicted_total: 0 }
    }

    #[test]
    fn all_green_is_healthy() {
        let snapshot = aggregate(healthy_sink(), empty_buffer(), vec![source("s1", false)]);
        assert_eq!(snapshot.level, HealthLevel::Healthy);
        assert!(snapshot.is_ready());
    }

    #[test]
    fn unreachable_sink_is_unhealthy() {
        let mut sink = healthy_sink();
        sink.connected = false;
        let snapshot = aggregate(sink, empty_buffer(), vec![]);
        assert_eq!(snapshot.level, HealthLevel::Unhealthy);
        assert!(!snapshot.is_ready());
    }

    #[test]
    fn all_sources_failing_is_unhealthy() {
        let snapshot = aggregate(healthy_sink(), empty_buffer(), vec![source("s1", true), source("s2", true)]);
        assert_eq!(snapshot.level, HealthLevel::Unhealthy);
    }

    #[test]
    fn minority_sources_failing_is_degraded() {
        let snapshot =
            aggregate(healthy_sink(), empty_buffer(), vec![source("s1", true), source("s2", false), source("s3", false)]);
        assert_eq!(snapshot.level, HealthLevel::Degraded);
    }

    #[test]
    fn hot_buffer_is_degraded() {
        let buffer = BufferSnapshot { entry_count: 95, max_entries: 100, bytes_used: 0, max_bytes: 1_000_000, evicted_total: 0 };
        let snapshot = aggregate(healthy_sink(), buffer, vec![]);
        assert_eq!(snapshot.level, HealthLevel::Degraded);
    }
}
