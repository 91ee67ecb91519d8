//! Agent listing

use crate::backend::Backend;
use crate::error::Result;
use crate::types::identifiers::AgentId;

use super::core::AgentManager;

impl<B: Backend> AgentManager<B> {
    /// Ids of all non-archived agents, oldest first
    ///
    /// Lets a client rebuild its view after a refresh or restart.
    pub async fn list_active(&self) -> Result<Vec<AgentId>> {
        self.store.list_active().await
    }
}
