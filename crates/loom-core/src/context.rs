//! The workflow context (§4.3): everything an executor is handed for one run.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::capability::{CapabilitySpec, Driver, DriverFactory};
use crate::error::LoomResult;
use crate::event::Event;
use crate::record::Recorder;
use crate::storage::Storage;

/// Restricted to a single run: captures every event a workflow emits, in
/// emission order. The agent loop drains this after the executor returns
/// and forwards each event to the resolver.
#[derive(Clone, Default)]
pub struct EventEmitter {
    emitted: Arc<Mutex<Vec<Event>>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire-and-forget: delivery to the resolver is guaranteed by the loop,
    /// not by this call.
    pub fn emit(&self, event: Event) {
        self.emitted.lock().push(event);
    }

    pub fn drain(&self) -> Vec<Event> {
        std::mem::take(&mut *self.emitted.lock())
    }

    /// True if both emitters share the same underlying buffer. Used by the
    /// agent loop to detect whether a returned context still carries the
    /// emitter it was handed (§4.3 contract check).
    pub fn is_same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.emitted, &other.emitted)
    }
}

/// Lets a workflow schedule itself to be re-triggered at a later time,
/// without the workflow needing to know how the queue or clock works.
#[async_trait]
pub trait SchedulerHandle: Send + Sync {
    async fn schedule_after(&self, delay: Duration, event: Event) -> LoomResult<()>;
}

/// Everything passed to an executor for one invocation.
///
/// On success an executor must return the same context unchanged, or a
/// context whose only modification is `state` (§4.3). The runtime treats
/// any other observed mutation as a contract violation.
#[derive(Clone)]
pub struct WorkflowContext {
    pub state: String,
    pub storage: Arc<dyn Storage>,
    pub recorder: Arc<Mutex<Recorder>>,
    pub driver_factory: Arc<dyn DriverFactory>,
    pub emitter: EventEmitter,
    pub scheduler: Option<Arc<dyn SchedulerHandle>>,
}

impl WorkflowContext {
    pub fn new(
        state: String,
        storage: Arc<dyn Storage>,
        recorder: Recorder,
        driver_factory: Arc<dyn DriverFactory>,
    ) -> Self {
        Self {
            state,
            storage,
            recorder: Arc::new(Mutex::new(recorder)),
            driver_factory,
            emitter: EventEmitter::new(),
            scheduler: None,
        }
    }

    pub fn with_scheduler(mut self, scheduler: Arc<dyn SchedulerHandle>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Convenience passthrough for `driver_factory.create_driver`.
    pub async fn create_driver(&self, spec: &CapabilitySpec) -> LoomResult<Box<dyn Driver>> {
        self.driver_factory.create_driver(spec).await
    }

    /// Return a context identical to this one except for `state`. Used by
    /// executors to signal a state update without touching anything else.
    pub fn with_state(&self, state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            ..self.clone()
        }
    }

    /// True if `other` shares every handle this context was constructed
    /// with (storage, recorder, driver factory, emitter, scheduler) — i.e.
    /// the only field an executor is allowed to have changed is `state`.
    /// Used by the agent loop to enforce the §4.3 executor contract.
    pub fn same_identity(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
            && Arc::ptr_eq(&self.recorder, &other.recorder)
            && Arc::ptr_eq(&self.driver_factory, &other.driver_factory)
            && self.emitter.is_same(&other.emitter)
            && match (&self.scheduler, &other.scheduler) {
                (None, None) => true,
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                _ => false,
            }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;

    #[test]
    fn emitter_preserves_emission_order() {
        let emitter = EventEmitter::new();
        emitter.emit(Event::new("A", Default::default()));
        emitter.emit(Event::new("B", Default::default()));

        let drained = emitter.drain();
        assert_eq!(drained[0].event_type, "A");
        assert_eq!(drained[1].event_type, "B");
        assert!(emitter.drain().is_empty());
    }
}
