//! Agent creation

use std::sync::Arc;

use crate::backend::Backend;
use crate::error::Result;
use crate::types::agent::{Agent, CreateAgentRequest};
use crate::types::identifiers::WorkflowId;

use super::super::background::{NamingJob, spawn_name_generator};
use super::core::AgentManager;

impl<B: Backend> AgentManager<B> {
    /// Create a new idle agent
    ///
    /// Returns as soon as the record is stored; the display name is filled
    /// in later by a background task, if at all.
    pub async fn create(&self, request: CreateAgentRequest) -> Result<Agent> {
        let workflow_id = request.workflow_id.unwrap_or_else(WorkflowId::generate);
        let agent = self.store.create(&Agent::new(workflow_id)).await?;

        log::info!(
            "Created agent {} (workflow {})",
            agent.agent_id,
            agent.workflow_id
        );

        if self.config.generate_names {
            spawn_name_generator(NamingJob {
                store: self.store.clone(),
                backend: Arc::clone(&self.backend),
                agent_id: agent.agent_id.clone(),
                model: self.config.naming_model.clone(),
                timeout: self.config.naming_timeout,
            });
        }

        Ok(agent)
    }
}
