//! Loom Runtime - the priority workflow queue, state document manager, and
//! core agent execution loop (§4.6-§4.8, §5).

pub mod agent_loop;
pub mod queue;
pub mod scheduler;
pub mod state;

pub use agent_loop::{AgentLoop, FailureEventPolicy, NoDriverFactory};
pub use queue::{PriorityWorkflowQueue, QueueItem};
pub use scheduler::LoopScheduler;
pub use state::StateManager;
