//! Agent record repository

use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::{Result, SessionError};
use crate::types::agent::{Agent, AgentState};
use crate::types::identifiers::AgentId;

use super::models::{AGENT_COLUMNS, AgentColumns, AgentRow, format_timestamp};

/// Repository for agent persistence
///
/// Writes are whole-record replacements. `resume_token` and `display_name`
/// are written with `COALESCE(new, old)`, so no write through this type can
/// reset either to null.
#[derive(Debug, Clone)]
pub struct AgentStore {
    pool: SqlitePool,
}

impl AgentStore {
    /// Create a new repository
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new agent
    ///
    /// # Errors
    /// Returns `Storage` if the insert fails (including a duplicate id)
    pub async fn create(&self, agent: &Agent) -> Result<Agent> {
        let cols = AgentColumns::from_agent(agent)?;

        sqlx::query(
            r#"
            INSERT INTO agents (
                agent_id, display_name, workflow_id, resume_token, conversation,
                last_raw_transcript, state, archived, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(agent.agent_id.as_str())
        .bind(&agent.display_name)
        .bind(agent.workflow_id.as_str())
        .bind(agent.resume_token.as_ref().map(|t| t.as_str()))
        .bind(&cols.conversation)
        .bind(&agent.last_raw_transcript)
        .bind(agent.state.as_str())
        .bind(agent.archived)
        .bind(&cols.created_at)
        .bind(&cols.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(agent.clone())
    }

    /// Get an agent, `None` if it does not exist
    ///
    /// # Errors
    /// Returns `Storage` on query failure or `CorruptRecord` if the row
    /// cannot be decoded
    pub async fn find(&self, agent_id: &AgentId) -> Result<Option<Agent>> {
        let row = sqlx::query_as::<_, AgentRow>(&format!(
            "SELECT {AGENT_COLUMNS} FROM agents WHERE agent_id = ?"
        ))
        .bind(agent_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Agent::try_from).transpose()
    }

    /// Get an agent
    ///
    /// # Errors
    /// Returns `NotFound` if no such agent exists
    pub async fn get(&self, agent_id: &AgentId) -> Result<Agent> {
        self.find(agent_id)
            .await?
            .ok_or_else(|| SessionError::NotFound(agent_id.clone()))
    }

    /// Replace the stored record
    ///
    /// # Errors
    /// Returns `NotFound` if no such agent exists
    pub async fn update(&self, agent: &Agent) -> Result<()> {
        if self.write(agent, None).await? {
            Ok(())
        } else {
            Err(SessionError::NotFound(agent.agent_id.clone()))
        }
    }

    /// Replace the stored record only if its state is still `expected`
    ///
    /// Returns false when the record exists in another state (or is gone);
    /// nothing is written in that case.
    ///
    /// # Errors
    /// Returns `Storage` on query failure
    pub async fn update_if_state(&self, agent: &Agent, expected: AgentState) -> Result<bool> {
        self.write(agent, Some(expected)).await
    }

    async fn write(&self, agent: &Agent, expected: Option<AgentState>) -> Result<bool> {
        let cols = AgentColumns::from_agent(agent)?;
        let guard = if expected.is_some() { " AND state = ?" } else { "" };
        let sql = format!(
            r#"
            UPDATE agents SET
                display_name = COALESCE(?, display_name),
                resume_token = COALESCE(?, resume_token),
                conversation = ?,
                last_raw_transcript = ?,
                state = ?,
                archived = ?,
                updated_at = ?
            WHERE agent_id = ?{guard}
            "#
        );

        let mut tx = self.pool.begin().await?;

        let mut query = sqlx::query(&sql)
            .bind(&agent.display_name)
            .bind(agent.resume_token.as_ref().map(|t| t.as_str()))
            .bind(&cols.conversation)
            .bind(&agent.last_raw_transcript)
            .bind(agent.state.as_str())
            .bind(agent.archived)
            .bind(&cols.updated_at)
            .bind(agent.agent_id.as_str());
        if let Some(expected) = expected {
            query = query.bind(expected.as_str());
        }
        let result = query.execute(&mut *tx).await?;

        tx.commit().await?;

        Ok(result.rows_affected() == 1)
    }

    /// Set the display name if it has never been set, bumping `updated_at`
    ///
    /// Returns false if the agent already has a name or does not exist.
    ///
    /// # Errors
    /// Returns `Storage` on query failure
    pub async fn set_display_name(&self, agent_id: &AgentId, name: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE agents SET display_name = ?, updated_at = ? \
             WHERE agent_id = ? AND display_name IS NULL",
        )
        .bind(name)
        .bind(format_timestamp(Utc::now()))
        .bind(agent_id.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Ids of all non-archived agents, oldest first
    ///
    /// # Errors
    /// Returns `Storage` on query failure
    pub async fn list_active(&self) -> Result<Vec<AgentId>> {
        let ids: Vec<(String,)> =
            sqlx::query_as("SELECT agent_id FROM agents WHERE archived = 0 ORDER BY id")
                .fetch_all(&self.pool)
                .await?;

        Ok(ids.into_iter().map(|(id,)| AgentId::from(id)).collect())
    }

    /// All agents currently in `state`, oldest first
    ///
    /// # Errors
    /// Returns `Storage` on query failure or `CorruptRecord` for an
    /// undecodable row
    pub async fn list_in_state(&self, state: AgentState) -> Result<Vec<Agent>> {
        let rows = sqlx::query_as::<_, AgentRow>(&format!(
            "SELECT {AGENT_COLUMNS} FROM agents WHERE state = ? ORDER BY id"
        ))
        .bind(state.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Agent::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Database;
    use crate::types::agent::Speaker;
    use crate::types::identifiers::{ResumeToken, WorkflowId};

    async fn store() -> AgentStore {
        Database::in_memory().await.unwrap().agents()
    }

    #[tokio::test]
    async fn create_then_get_is_identical() {
        let store = store().await;
        let mut agent = Agent::new(WorkflowId::generate());
        agent.append(Speaker::User, "hello");
        store.create(&agent).await.unwrap();

        let loaded = store.get(&agent.agent_id).await.unwrap();
        assert_eq!(loaded, agent);
    }

    #[tokio::test]
    async fn update_if_state_is_a_compare_and_swap() {
        let store = store().await;
        let agent = store.create(&Agent::new(WorkflowId::generate())).await.unwrap();

        let mut working = agent.clone();
        working.transition(AgentState::Working);
        assert!(store.update_if_state(&working, AgentState::Idle).await.unwrap());

        // A second writer holding the stale idle snapshot loses
        let mut racing = agent.clone();
        racing.transition(AgentState::Working);
        racing.append(Speaker::User, "duplicate");
        assert!(!store.update_if_state(&racing, AgentState::Idle).await.unwrap());

        let stored = store.get(&agent.agent_id).await.unwrap();
        assert_eq!(stored, working);
    }

    #[tokio::test]
    async fn stale_copy_cannot_clear_token_or_name() {
        let store = store().await;
        let agent = store.create(&Agent::new(WorkflowId::generate())).await.unwrap();

        let mut named = agent.clone();
        named.adopt_resume_token(Some(ResumeToken::new("sess-1")));
        store.update(&named).await.unwrap();
        assert!(store.set_display_name(&agent.agent_id, "Falcon").await.unwrap());
        assert!(!store.set_display_name(&agent.agent_id, "Other").await.unwrap());

        store.update(&agent).await.unwrap();
        let stored = store.get(&agent.agent_id).await.unwrap();
        assert_eq!(stored.resume_token, Some(ResumeToken::new("sess-1")));
        assert_eq!(stored.display_name.as_deref(), Some("Falcon"));
    }

    #[tokio::test]
    async fn set_display_name_bumps_updated_at() {
        let store = store().await;
        let agent = store.create(&Agent::new(WorkflowId::generate())).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        assert!(store.set_display_name(&agent.agent_id, "Vega").await.unwrap());

        let stored = store.get(&agent.agent_id).await.unwrap();
        assert!(stored.updated_at > agent.updated_at);
        assert_eq!(stored.created_at, agent.created_at);
    }

    #[tokio::test]
    async fn update_of_missing_agent_is_not_found() {
        let store = store().await;
        let agent = Agent::new(WorkflowId::generate());
        let err = store.update(&agent).await.unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_active_skips_archived_in_creation_order() {
        let store = store().await;
        let first = store.create(&Agent::new(WorkflowId::generate())).await.unwrap();
        let mut second = store.create(&Agent::new(WorkflowId::generate())).await.unwrap();
        let third = store.create(&Agent::new(WorkflowId::generate())).await.unwrap();

        second.archive();
        store.update(&second).await.unwrap();

        let active = store.list_active().await.unwrap();
        assert_eq!(active, vec![first.agent_id, third.agent_id]);
        assert_eq!(
            store.list_in_state(AgentState::Archived).await.unwrap().len(),
            1
        );
    }
}
