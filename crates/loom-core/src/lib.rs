//! Loom Core - Shared types and traits for the Loom event-driven workflow runtime.
//!
//! This crate defines the data model (events, workflow definitions, results,
//! recorder entries), the executor contract, the workflow registry and
//! resolver, and the storage handle contract consumed by workflow executors.
//! It has no opinion about concurrency or I/O beyond the async traits it
//! declares — those are implemented by `loom-runtime`, `loom-storage`,
//! `loom-ingest`, and `loom-sources`.

pub mod capability;
pub mod context;
pub mod error;
pub mod event;
pub mod record;
pub mod registry;
pub mod resolver;
pub mod storage;
pub mod workflow;

pub use capability::{Capability, CapabilitySpec, Driver, DriverFactory};
pub use context::{EventEmitter, SchedulerHandle, WorkflowContext};
pub use error::{LoomError, LoomResult, StorageErrorKind};
pub use event::{event_types, Event};
pub use record::{Recorder, RecordType, WorkflowRecord};
pub use registry::WorkflowRegistry;
pub use resolver::{resolve, Resolution, ResolverWarning};
pub use storage::{Collection, Query, Record, Storage};
pub use workflow::{
    Executor, Predicate, Trigger, WorkflowDefinition, WorkflowFailure, WorkflowResult,
};

/// Version information, exposed for the CLI's `--version` output.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default number of agent loop workers (§4.7): 1 gives deterministic,
/// strictly FIFO-within-priority execution.
pub const DEFAULT_WORKER_COUNT: usize = 1;

/// Default ingestion flush batch size (§4.10).
pub const DEFAULT_FLUSH_BATCH_SIZE: usize = 50;

/// Default max delivery attempts before an ingestion entry is dead-lettered.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
