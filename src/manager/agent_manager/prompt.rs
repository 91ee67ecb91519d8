//! Prompt acceptance and worker dispatch

use crate::backend::Backend;
use crate::error::{Result, SessionError};
use crate::supervisor::{WorkerJob, WorkerStatus};
use crate::types::agent::{Agent, AgentState, Speaker};
use crate::types::identifiers::AgentId;

use super::core::AgentManager;

impl<B: Backend> AgentManager<B> {
    /// Accept a prompt for an idle agent and dispatch its worker
    ///
    /// Returns the stored snapshot (state `working`, user message appended)
    /// as soon as the worker is launched; the reply arrives via `poll`.
    ///
    /// # Errors
    /// - `NotFound` if the agent does not exist
    /// - `Conflict` if the agent is not idle; nothing is written
    /// - `EmptyPrompt` for blank text; nothing is written
    /// - `ProcessLaunch` if the worker could not be started; the agent has
    ///   been moved to `errored` with the reason appended
    pub async fn prompt(&self, agent_id: &AgentId, text: &str) -> Result<Agent> {
        let _guard = self.locks.lock(agent_id).await;

        let agent = self.store.get(agent_id).await?;
        if agent.state != AgentState::Idle {
            log::debug!("Rejecting prompt for {agent_id}: agent is {}", agent.state);
            return Err(SessionError::Conflict {
                agent: Box::new(agent),
            });
        }
        if text.trim().is_empty() {
            return Err(SessionError::EmptyPrompt);
        }

        // The previous turn's handle must not outlive it: a later reap would
        // report its exit against the turn dispatched here
        self.release_previous_worker(agent_id).await;

        let mut working = agent;
        working.append(Speaker::User, text);
        working.transition(AgentState::Working);

        // Another writer (a worker from a previous instance, an operator)
        // may have moved the record since the read above
        if !self.store.update_if_state(&working, AgentState::Idle).await? {
            let current = self.store.get(agent_id).await?;
            return Err(SessionError::Conflict {
                agent: Box::new(current),
            });
        }

        let job = WorkerJob {
            agent_id: agent_id.clone(),
            prompt: text.to_string(),
            resume_token: working.resume_token.clone(),
        };
        if let Err(e) = self.supervisor.spawn(job, working.conversation.len()) {
            log::error!("Failed to launch worker for {agent_id}: {e}");
            return Err(self.record_launch_failure(agent_id, e).await?);
        }

        Ok(working)
    }

    /// Reap or drop whatever worker is still tracked for an idle agent
    async fn release_previous_worker(&self, agent_id: &AgentId) {
        match self.supervisor.reap_agent(agent_id).await {
            WorkerStatus::Exited(report) => log::debug!(
                "Reaped turn {} worker for {agent_id}: {}",
                report.turn,
                report.description
            ),
            WorkerStatus::Running => {
                // Already wrote its result; only its exit is outstanding
                self.supervisor.forget(agent_id);
                log::debug!("Released a finishing worker for {agent_id}");
            }
            WorkerStatus::Untracked => {}
        }
    }

    /// Move an agent whose worker never started to `errored`
    async fn record_launch_failure(
        &self,
        agent_id: &AgentId,
        error: SessionError,
    ) -> Result<SessionError> {
        let message = error.to_string();

        let mut agent = self.store.get(agent_id).await?;
        agent.append_error(format!("failed to launch worker: {message}"));
        agent.transition(AgentState::Errored);
        if !self.store.update_if_state(&agent, AgentState::Working).await? {
            agent = self.store.get(agent_id).await?;
        }

        Ok(SessionError::ProcessLaunch {
            agent: Box::new(agent),
            message,
        })
    }
}
