//! The workflow recorder: an append-only, per-run trace of structured events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Closed set of record tags a workflow run may emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    Info,
    DbQuery,
    AiCall,
    Error,
    Debug,
    Warn,
    Input,
    Output,
}

/// One entry in a workflow run's trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRecord {
    pub record_type: RecordType,
    pub timestamp: DateTime<Utc>,
    pub workflow: String,
    pub payload: Value,
}

/// Single-run-scoped recorder. A fresh instance is built by the agent loop
/// for every workflow execution; sharing one across concurrent runs would
/// interleave two runs' traces and is a caller error.
#[derive(Debug, Clone)]
pub struct Recorder {
    workflow: String,
    entries: Vec<WorkflowRecord>,
}

impl Recorder {
    pub fn new(workflow: impl Into<String>) -> Self {
        Self {
            workflow: workflow.into(),
            entries: Vec::new(),
        }
    }

    pub fn record(&mut self, record_type: RecordType, payload: Value) {
        self.entries.push(WorkflowRecord {
            record_type,
            timestamp: Utc::now(),
            workflow: self.workflow.clone(),
            payload,
        });
    }

    pub fn info(&mut self, payload: Value) {
        self.record(RecordType::Info, payload);
    }

    pub fn error(&mut self, payload: Value) {
        self.record(RecordType::Error, payload);
    }

    pub fn buffer(&self) -> &[WorkflowRecord] {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn into_entries(self) -> Vec<WorkflowRecord> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_are_appended_in_order() {
        let mut recorder = Recorder::new("demo");
        recorder.info(serde_json::json!({"step": 1}));
        recorder.error(serde_json::json!({"step": 2}));

        let buf = recorder.buffer();
        assert_eq!(buf.len(), 2);
        assert_eq!(buf[0].record_type, RecordType::Info);
        assert_eq!(buf[1].record_type, RecordType::Error);
        assert!(buf[0].timestamp <= buf[1].timestamp);
    }

    #[test]
    fn clear_empties_the_buffer() {
        let mut recorder = Recorder::new("demo");
        recorder.info(serde_json::json!({}));
        recorder.clear();
        assert!(recorder.buffer().is_empty());
    }
}
