//! The core agent loop (§4.7): dequeues (workflow, event) pairs, builds a
//! fresh context, executes, and recursively enqueues whatever the run
//! emits.

use std::sync::Arc;
use std::time::Duration;

use loom_core::{
    resolve, CapabilitySpec, Driver, DriverFactory, Event, LoomResult, Recorder, SchedulerHandle,
    Storage, WorkflowContext, WorkflowDefinition, WorkflowFailure, WorkflowRegistry, WorkflowResult,
};
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::queue::{PriorityWorkflowQueue, QueueItem};
use crate::scheduler::LoopScheduler;
use crate::state::StateManager;

/// What to do with events a failed run emitted before failing, at the
/// loop level. Per-workflow `drop_events_on_failure` always takes
/// precedence; this is the loop-wide default applied when a workflow
/// doesn't override it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureEventPolicy {
    /// Still enqueue events emitted before the failure (§4.7 step 5,
    /// default).
    EnqueueEmitted,
    /// Drop everything the run emitted.
    DropEmitted,
}

impl Default for FailureEventPolicy {
    fn default() -> Self {
        Self::EnqueueEmitted
    }
}

/// The event-driven scheduler described in §2-§7. Owns the registry, the
/// priority queue, and the state document manager, and runs a
/// configurable number of worker tasks against them.
pub struct AgentLoop {
    registry: RwLock<WorkflowRegistry>,
    queue: Arc<PriorityWorkflowQueue>,
    state: Arc<StateManager>,
    storage: Arc<dyn Storage>,
    driver_factory: Arc<dyn DriverFactory>,
    failure_event_policy: FailureEventPolicy,
    scheduler: Mutex<Option<Arc<dyn SchedulerHandle>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl AgentLoop {
    pub fn new(
        storage: Arc<dyn Storage>,
        driver_factory: Arc<dyn DriverFactory>,
        state: Arc<StateManager>,
    ) -> Arc<Self> {
        Self::with_failure_policy(storage, driver_factory, state, FailureEventPolicy::default())
    }

    pub fn with_failure_policy(
        storage: Arc<dyn Storage>,
        driver_factory: Arc<dyn DriverFactory>,
        state: Arc<StateManager>,
        failure_event_policy: FailureEventPolicy,
    ) -> Arc<Self> {
        let this = Arc::new(Self {
            registry: RwLock::new(WorkflowRegistry::new()),
            queue: Arc::new(PriorityWorkflowQueue::new()),
            state,
            storage,
            driver_factory,
            failure_event_policy,
            scheduler: Mutex::new(None),
            workers: Mutex::new(Vec::new()),
        });

        let scheduler = Arc::new(LoopScheduler {
            agent_loop: Arc::downgrade(&this),
        }) as Arc<dyn SchedulerHandle>;
        *this.scheduler.lock() = Some(scheduler);

        this
    }

    pub fn register(&self, definition: WorkflowDefinition) {
        self.registry.write().register(definition);
    }

    /// Unregisters a workflow and drains any entries already queued for it
    /// (§3 invariant: the queue never outlives a workflow's registration).
    pub fn unregister(&self, name: &str) {
        self.registry.write().unregister(name);
        self.queue.cancel_by_workflow(name);
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    pub fn queue_depth_by_priority(&self) -> std::collections::BTreeMap<i32, usize> {
        self.queue.depth_by_priority()
    }

    pub fn registered_workflow_count(&self) -> usize {
        self.registry.read().count()
    }

    /// Whether this loop is still accepting submissions, i.e. `stop()`
    /// hasn't closed the queue yet. Used by the ingestion boundary's sink
    /// probe to report its own liveness.
    pub fn is_accepting(&self) -> bool {
        !self.queue.is_closed()
    }

    /// Resolves `event` against the current registry snapshot and enqueues
    /// every match. This is the single rendezvous point both the ingestion
    /// boundary (materializing `DATA_ARRIVED`) and a workflow's own
    /// emitter funnel through.
    pub fn submit(&self, event: Event) -> usize {
        let registry = self.registry.read();
        let (resolutions, warnings) = resolve(&event, &registry);

        for warning in &warnings {
            warn!(workflow = %warning.workflow, message = %warning.message, "resolver warning");
        }

        let count = resolutions.len();
        for resolution in resolutions {
            self.queue.enqueue(resolution.workflow.clone(), event.clone());
        }
        count
    }

    /// Spawns `worker_count` tasks pulling from the queue. Default 1 gives
    /// strict FIFO-within-priority execution (§5).
    pub fn spawn(self: &Arc<Self>, worker_count: usize) {
        let mut workers = self.workers.lock();
        for _ in 0..worker_count.max(1) {
            let this = self.clone();
            workers.push(tokio::spawn(async move { this.worker_loop().await }));
        }
    }

    async fn worker_loop(self: Arc<Self>) {
        while let Some(item) = self.queue.dequeue().await {
            self.run_item(item).await;
        }
    }

    async fn run_item(&self, item: QueueItem) {
        let QueueItem { workflow, event, .. } = item;

        let state_snapshot = self.state.snapshot().await;
        let recorder = Recorder::new(workflow.name.clone());
        let scheduler = self.scheduler.lock().clone();

        let mut context = WorkflowContext::new(
            state_snapshot,
            self.storage.clone(),
            recorder,
            self.driver_factory.clone(),
        );
        if let Some(scheduler) = scheduler {
            context = context.with_scheduler(scheduler);
        }

        let original = context.clone();

        let result = match workflow.timeout {
            Some(duration) => self.run_with_timeout(&workflow, &event, context, duration).await,
            None => workflow.executor.execute(&event, context).await,
        };

        let result = self.enforce_contract(&original, result);

        let emitted = original.emitter.drain();

        match &result.failure {
            None => {
                if let Err(error) = self.state.commit(result.context.state.clone()).await {
                    error!(workflow = %workflow.name, %error, "fatal: failed to commit state document");
                    self.queue.close();
                    return;
                }
            }
            Some(failure) => {
                original.recorder.lock().record(
                    loom_core::RecordType::Error,
                    serde_json::json!({"kind": failure.kind, "message": failure.message}),
                );
                error!(
                    workflow = %workflow.name,
                    kind = %failure.kind,
                    message = %failure.message,
                    "workflow run failed"
                );
            }
        }

        debug!(
            workflow = %workflow.name,
            records = original.recorder.lock().buffer().len(),
            "run complete"
        );

        let drop_events = workflow.drop_events_on_failure
            || (result.failure.is_some() && self.failure_event_policy == FailureEventPolicy::DropEmitted);

        if result.failure.is_none() || !drop_events {
            for emitted_event in emitted {
                self.submit(emitted_event);
            }
        }
    }

    async fn run_with_timeout(
        &self,
        workflow: &WorkflowDefinition,
        event: &Event,
        context: WorkflowContext,
        duration: Duration,
    ) -> WorkflowResult {
        let fallback = context.clone();
        match tokio::time::timeout(duration, workflow.executor.execute(event, context)).await {
            Ok(result) => result,
            Err(_) => WorkflowResult::failed(
                fallback,
                WorkflowFailure::new("TIMEOUT", format!("exceeded {duration:?}")),
            ),
        }
    }

    /// Enforces §4.3: on success, a returned context may only differ from
    /// the original in `state`. Any other observed mutation is treated as
    /// a failed run instead.
    fn enforce_contract(&self, original: &WorkflowContext, result: WorkflowResult) -> WorkflowResult {
        if result.failure.is_some() {
            return result;
        }

        if original.same_identity(&result.context) {
            result
        } else {
            WorkflowResult::failed(
                original.clone(),
                WorkflowFailure::new(
                    "CONTRACT",
                    "executor returned a context that mutated more than `state`",
                ),
            )
        }
    }

    /// Cooperative shutdown (§4.7): closes the queue so blocked workers
    /// observe `None`, then waits for in-flight executors to finish,
    /// bounded by an optional timeout.
    pub async fn stop(&self, timeout: Option<Duration>) {
        self.queue.close();

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock());
        let join_all = futures::future::join_all(handles);

        match timeout {
            Some(duration) => {
                if tokio::time::timeout(duration, join_all).await.is_err() {
                    warn!("agent loop shutdown timed out waiting for workers");
                }
            }
            None => {
                join_all.await;
            }
        }
    }
}

/// A driver factory with no registered drivers, usable as a placeholder
/// wherever a workflow never calls `create_driver` (e.g. in tests).
pub struct NoDriverFactory;

#[async_trait::async_trait]
impl DriverFactory for NoDriverFactory {
    async fn create_driver(&self, _spec: &CapabilitySpec) -> LoomResult<Box<dyn Driver>> {
        Err(loom_core::LoomError::unavailable(
            "no driver factory configured",
        ))
    }
}
