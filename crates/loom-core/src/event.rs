//! The event model (payload envelope + closed catalogue of core event types).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Recognized core event types. Workflows may still emit and subscribe to
/// arbitrary custom strings; this catalogue only names the ones the runtime
/// itself knows to be meaningful (e.g. for documentation and the CLI's
/// `workflow describe` output). The resolver never special-cases these.
pub mod event_types {
    pub const DATA_ARRIVED: &str = "DATA_ARRIVED";
    pub const PROCESS_USER_REQUEST: &str = "PROCESS_USER_REQUEST";
    pub const ISSUE_CREATED: &str = "ISSUE_CREATED";
    pub const ISSUE_UPDATED: &str = "ISSUE_UPDATED";
    pub const ISSUE_STATUS_CHANGED: &str = "ISSUE_STATUS_CHANGED";
    pub const ERROR_DETECTED: &str = "ERROR_DETECTED";
    pub const PATTERN_FOUND: &str = "PATTERN_FOUND";
    pub const KNOWLEDGE_EXTRACTABLE: &str = "KNOWLEDGE_EXTRACTABLE";
    pub const HIGH_PRIORITY_DETECTED: &str = "HIGH_PRIORITY_DETECTED";
    pub const SCHEDULED_TIME_REACHED: &str = "SCHEDULED_TIME_REACHED";
    pub const FLOW_CREATED: &str = "FLOW_CREATED";
    pub const FLOW_UPDATED: &str = "FLOW_UPDATED";
    pub const FLOW_STATUS_CHANGED: &str = "FLOW_STATUS_CHANGED";
    pub const PERSPECTIVE_TRIGGERED: &str = "PERSPECTIVE_TRIGGERED";
    pub const FLOW_COMPLETED: &str = "FLOW_COMPLETED";
    pub const CONTEXT_SWITCHED: &str = "CONTEXT_SWITCHED";
    pub const USER_REQUEST_RECEIVED: &str = "USER_REQUEST_RECEIVED";
    pub const ISSUE_STALLED: &str = "ISSUE_STALLED";
    pub const UNCLUSTERED_ISSUES_EXCEEDED: &str = "UNCLUSTERED_ISSUES_EXCEEDED";
    pub const POND_CAPACITY_WARNING: &str = "POND_CAPACITY_WARNING";
    pub const SCHEDULE_TRIGGERED: &str = "SCHEDULE_TRIGGERED";
    pub const SYSTEM_MAINTENANCE_DUE: &str = "SYSTEM_MAINTENANCE_DUE";
    pub const IDLE_TIME_DETECTED: &str = "IDLE_TIME_DETECTED";
    pub const DLQ_ENTRY: &str = "DLQ_ENTRY";
}

/// An immutable event record routed through the agent loop.
///
/// Events carry no identity of their own; the priority queue assigns a
/// per-process enqueue sequence used only for FIFO tie-break (see
/// `loom_runtime::queue`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub payload: HashMap<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(event_type: impl Into<String>, payload: HashMap<String, Value>) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Construct an event with a single JSON value as payload under `data`.
    pub fn with_data(event_type: impl Into<String>, data: Value) -> Self {
        let mut payload = HashMap::new();
        payload.insert("data".to_string(), data);
        Self::new(event_type, payload)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_data_wraps_value_under_data_key() {
        let event = Event::with_data("T1", serde_json::json!({"a": 1}));
        assert_eq!(event.event_type, "T1");
        assert_eq!(event.get("data").unwrap()["a"], 1);
    }
}
