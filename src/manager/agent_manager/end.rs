//! Ending (archiving) an agent

use crate::backend::Backend;
use crate::error::Result;
use crate::types::identifiers::AgentId;

use super::core::AgentManager;

/// Compare-and-swap attempts before archiving unconditionally
const ARCHIVE_ATTEMPTS: usize = 3;

impl<B: Backend> AgentManager<B> {
    /// End an agent session
    ///
    /// Idempotent: an archived agent is left untouched. Otherwise any
    /// tracked worker is terminated (bounded by the grace period) and the
    /// record is archived.
    ///
    /// # Errors
    /// Returns `NotFound` if the agent does not exist
    pub async fn end(&self, agent_id: &AgentId) -> Result<()> {
        let _guard = self.locks.lock(agent_id).await;

        let agent = self.store.get(agent_id).await?;
        if agent.archived {
            log::debug!("Agent {agent_id} already archived");
            return Ok(());
        }

        if self.supervisor.terminate(agent_id).await {
            log::info!("Terminated worker for {agent_id}");
        }

        // An untracked worker (previous server instance) can still land its
        // write between our read and our write; retry against the new state
        let mut current = agent;
        for _ in 0..ARCHIVE_ATTEMPTS {
            if current.archived {
                return Ok(());
            }
            let expected = current.state;
            current.archive();
            if self.store.update_if_state(&current, expected).await? {
                log::info!("Agent {agent_id} archived");
                return Ok(());
            }
            current = self.store.get(agent_id).await?;
        }

        current.archive();
        self.store.update(&current).await?;
        log::info!("Agent {agent_id} archived");
        Ok(())
    }
}
