//! Polling and stuck-session reconciliation

use chrono::Utc;

use crate::backend::Backend;
use crate::error::Result;
use crate::supervisor::WorkerStatus;
use crate::types::agent::{Agent, AgentState};
use crate::types::identifiers::AgentId;

use super::core::AgentManager;

impl<B: Backend> AgentManager<B> {
    /// Current stored snapshot of an agent
    ///
    /// A `working` agent whose tracked worker has exited, or which no worker
    /// tracks and has not changed for `orphan_after`, is first moved to
    /// `errored` with a diagnostic message.
    ///
    /// # Errors
    /// Returns `NotFound` if the agent does not exist
    pub async fn poll(&self, agent_id: &AgentId) -> Result<Agent> {
        let agent = self.store.get(agent_id).await?;

        if agent.state != AgentState::Working {
            if self.supervisor.is_tracked(agent_id) {
                // Finished normally; just drop the handle
                let _ = self.supervisor.reap_agent(agent_id).await;
            }
            return Ok(agent);
        }

        let (detail, turn) = match self.supervisor.reap_agent(agent_id).await {
            WorkerStatus::Running => return Ok(agent),
            WorkerStatus::Exited(report) => (
                format!(
                    "worker exited without recording a result ({})",
                    report.description
                ),
                Some(report.turn),
            ),
            WorkerStatus::Untracked if self.is_orphaned(&agent) => (
                "no worker is tracking this agent and it has not reported back".to_string(),
                None,
            ),
            WorkerStatus::Untracked => return Ok(agent),
        };

        match self.reconcile_stuck(agent_id, &detail, turn).await? {
            Some(reconciled) => Ok(reconciled),
            None => self.store.get(agent_id).await,
        }
    }

    /// One reconciliation pass over the whole worker table and every
    /// `working` record
    ///
    /// Returns the agents moved to `errored`.
    ///
    /// # Errors
    /// Returns error if the store cannot be read or written
    pub async fn reconcile(&self) -> Result<Vec<AgentId>> {
        let mut reconciled = Vec::new();

        for (agent_id, report) in self.supervisor.reap().await {
            let detail = format!(
                "worker exited without recording a result ({})",
                report.description
            );
            if self
                .reconcile_stuck(&agent_id, &detail, Some(report.turn))
                .await?
                .is_some()
            {
                reconciled.push(agent_id);
            }
        }

        for agent in self.store.list_in_state(AgentState::Working).await? {
            if reconciled.contains(&agent.agent_id)
                || self.supervisor.is_tracked(&agent.agent_id)
                || !self.is_orphaned(&agent)
            {
                continue;
            }
            let detail = "no worker is tracking this agent and it has not reported back";
            if self
                .reconcile_stuck(&agent.agent_id, detail, None)
                .await?
                .is_some()
            {
                reconciled.push(agent.agent_id);
            }
        }

        Ok(reconciled)
    }

    fn is_orphaned(&self, agent: &Agent) -> bool {
        Utc::now()
            .signed_duration_since(agent.updated_at)
            .to_std()
            .is_ok_and(|age| age >= self.config.orphan_after)
    }

    /// Append `Error: <detail>` and move to `errored`, if still `working`
    ///
    /// `turn` is the turn of the worker that exited; the record is only
    /// touched while it is still waiting on that turn. Nothing happens while
    /// a worker is tracked for the agent.
    async fn reconcile_stuck(
        &self,
        agent_id: &AgentId,
        detail: &str,
        turn: Option<usize>,
    ) -> Result<Option<Agent>> {
        let _guard = self.locks.lock(agent_id).await;

        let mut agent = self.store.get(agent_id).await?;
        if agent.state != AgentState::Working {
            return Ok(None);
        }
        if turn.is_some_and(|turn| turn != agent.conversation.len()) {
            log::debug!(
                "Ignoring exit of an earlier worker for {agent_id} (turn {turn:?}, now {})",
                agent.conversation.len()
            );
            return Ok(None);
        }
        if self.supervisor.is_tracked(agent_id) {
            return Ok(None);
        }

        agent.append_error(detail);
        agent.transition(AgentState::Errored);
        if !self.store.update_if_state(&agent, AgentState::Working).await? {
            return Ok(None);
        }

        log::warn!("Reconciled stuck agent {agent_id}: {detail}");
        Ok(Some(agent))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::backend::{Invocation, InvocationRequest};
    use crate::config::ManagerConfig;
    use crate::store::Database;
    use crate::types::agent::{CreateAgentRequest, Speaker};

    /// Answers "first" at once and anything else after a short delay
    struct TwoTurns;

    impl Backend for TwoTurns {
        async fn invoke(&self, request: InvocationRequest) -> Result<Invocation> {
            let response = if request.prompt == "first" {
                "one"
            } else {
                tokio::time::sleep(Duration::from_millis(300)).await;
                "two"
            };
            Ok(Invocation {
                response: response.to_string(),
                raw_transcript: "[]".to_string(),
                resume_token: None,
            })
        }
    }

    async fn manager() -> Arc<AgentManager<TwoTurns>> {
        let _ = env_logger::builder().is_test(true).try_init();
        let db = Database::in_memory().await.unwrap();
        let config = ManagerConfig::builder()
            .reconcile_interval(None)
            .generate_names(false)
            .build();
        AgentManager::start(db.agents(), TwoTurns, config).unwrap()
    }

    async fn wait_for_state(
        manager: &AgentManager<TwoTurns>,
        agent_id: &AgentId,
        state: AgentState,
    ) {
        for _ in 0..500 {
            if manager.store.get(agent_id).await.unwrap().state == state {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("agent {agent_id} never reached {state}");
    }

    #[tokio::test]
    async fn exit_of_previous_turn_does_not_error_next_turn() {
        let manager = manager().await;
        let agent = manager.create(CreateAgentRequest::default()).await.unwrap();
        let agent_id = agent.agent_id.clone();

        // Turn one finishes; nobody polls, so its handle stays tracked
        manager.prompt(&agent_id, "first").await.unwrap();
        wait_for_state(&manager, &agent_id, AgentState::Idle).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Queue the next prompt, then a sweep that reaps turn one's handle
        // before it can take the agent's lock
        let guard = manager.locks.lock(&agent_id).await;
        let prompt = tokio::spawn({
            let manager = Arc::clone(&manager);
            let agent_id = agent_id.clone();
            async move { manager.prompt(&agent_id, "second").await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        let sweep = tokio::spawn({
            let manager = Arc::clone(&manager);
            async move { manager.reconcile().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(guard);

        let accepted = prompt.await.unwrap().unwrap();
        assert_eq!(accepted.state, AgentState::Working);
        assert!(sweep.await.unwrap().unwrap().is_empty());

        let during = manager.poll(&agent_id).await.unwrap();
        assert_eq!(during.state, AgentState::Working);

        wait_for_state(&manager, &agent_id, AgentState::Idle).await;
        let done = manager.poll(&agent_id).await.unwrap();
        let texts: Vec<&str> = done.conversation.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["first", "one", "second", "two"]);
    }

    #[tokio::test]
    async fn exit_report_for_current_turn_still_reconciles() {
        let manager = manager().await;
        let agent = manager.create(CreateAgentRequest::default()).await.unwrap();
        let agent_id = agent.agent_id.clone();

        // A working record whose worker is gone, reported for its own turn
        let mut working = manager.store.get(&agent_id).await.unwrap();
        working.append(Speaker::User, "lost");
        working.transition(AgentState::Working);
        manager.store.update(&working).await.unwrap();

        let stale = manager
            .reconcile_stuck(&agent_id, "worker exited", Some(0))
            .await
            .unwrap();
        assert!(stale.is_none());

        let current = manager
            .reconcile_stuck(&agent_id, "worker exited", Some(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(current.state, AgentState::Errored);
        assert_eq!(current.conversation.len(), 2);
    }
}
