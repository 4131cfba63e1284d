//! Workflow definitions and the executor contract (§4.3, §4.4).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::WorkflowContext;
use crate::event::Event;

/// A pure filter evaluated against a candidate event. Predicate panics are
/// caught at the resolver boundary and treated as "no match" (§4.5).
pub type Predicate = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

/// Declares which events a workflow listens on and at what priority.
#[derive(Clone)]
pub struct Trigger {
    pub event_types: Vec<String>,
    /// Lower priority value runs first; ties broken by enqueue sequence.
    pub priority: i32,
    pub predicate: Option<Predicate>,
}

impl Trigger {
    pub fn new(event_types: Vec<String>, priority: i32) -> Self {
        Self {
            event_types,
            priority,
            predicate: None,
        }
    }

    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Evaluates the predicate, if any. A panic inside the predicate is
    /// caught and treated as a non-match.
    pub fn matches(&self, event: &Event) -> bool {
        self.matches_checked(event).unwrap_or(false)
    }

    /// Like [`matches`](Self::matches), but surfaces whether the predicate
    /// panicked (`Err`) rather than silently folding it into `false`. The
    /// resolver uses this to record a warning (§4.5) instead of swallowing
    /// the panic outright.
    pub fn matches_checked(&self, event: &Event) -> Result<bool, ()> {
        match &self.predicate {
            None => Ok(true),
            Some(predicate) => {
                let predicate = predicate.clone();
                let event = event.clone();
                std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| predicate(&event)))
                    .map_err(|_| ())
            }
        }
    }
}

impl fmt::Debug for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trigger")
            .field("event_types", &self.event_types)
            .field("priority", &self.priority)
            .field("has_predicate", &self.predicate.is_some())
            .finish()
    }
}

/// Why a workflow run did not succeed.
#[derive(Debug, Clone)]
pub struct WorkflowFailure {
    pub kind: String,
    pub message: String,
    pub cause: Option<String>,
}

impl WorkflowFailure {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }
}

/// Returned by every execution (§3).
pub struct WorkflowResult {
    pub success: bool,
    pub context: WorkflowContext,
    pub output: Option<Value>,
    pub failure: Option<WorkflowFailure>,
}

impl WorkflowResult {
    pub fn ok(context: WorkflowContext, output: Option<Value>) -> Self {
        Self {
            success: true,
            context,
            output,
            failure: None,
        }
    }

    pub fn failed(context: WorkflowContext, failure: WorkflowFailure) -> Self {
        Self {
            success: false,
            context,
            output: None,
            failure: Some(failure),
        }
    }
}

/// The executor contract (§4.3). Implementations are logically
/// single-threaded: the runtime never interleaves two invocations of the
/// same executor against the same context, but an executor may suspend
/// freely on its own I/O.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, event: &Event, context: WorkflowContext) -> WorkflowResult;
}

/// An immutable, named unit of logic triggered by one or more event types.
#[derive(Clone)]
pub struct WorkflowDefinition {
    pub name: String,
    pub description: String,
    pub trigger: Trigger,
    pub executor: Arc<dyn Executor>,
    /// When true, events emitted before a failing run are dropped instead
    /// of still being enqueued (§4.7).
    pub drop_events_on_failure: bool,
    /// Optional per-workflow bound on a single invocation (§5 cancellation
    /// & timeouts). `None` means the executor may suspend indefinitely.
    pub timeout: Option<Duration>,
}

impl WorkflowDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        trigger: Trigger,
        executor: Arc<dyn Executor>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            trigger,
            executor,
            drop_events_on_failure: false,
            timeout: None,
        }
    }

    pub fn drop_events_on_failure(mut self, drop: bool) -> Self {
        self.drop_events_on_failure = drop;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl fmt::Debug for WorkflowDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowDefinition")
            .field("name", &self.name)
            .field("trigger", &self.trigger)
            .finish()
    }
}
