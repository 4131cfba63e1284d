//! The `SchedulerHandle` a workflow context carries so an executor can
//! self-trigger at a later time without knowing how the queue or clock
//! work (§4.3).

use std::sync::Weak;
use std::time::Duration;

use async_trait::async_trait;
use loom_core::{Event, LoomResult, SchedulerHandle};

use crate::agent_loop::AgentLoop;

pub struct LoopScheduler {
    pub(crate) agent_loop: Weak<AgentLoop>,
}

#[async_trait]
impl SchedulerHandle for LoopScheduler {
    async fn schedule_after(&self, delay: Duration, event: Event) -> LoomResult<()> {
        let agent_loop = self.agent_loop.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(agent_loop) = agent_loop.upgrade() {
                agent_loop.submit(event);
            }
        });
        Ok(())
    }
}
