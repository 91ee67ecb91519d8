//! Row mapping for the `agents` table

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::FromRow;

use crate::error::{Result, SessionError};
use crate::types::agent::{Agent, AgentState, ConversationMessage};
use crate::types::identifiers::{AgentId, ResumeToken, WorkflowId};

/// Columns selected for every agent read
pub(super) const AGENT_COLUMNS: &str = "agent_id, display_name, workflow_id, resume_token, \
     conversation, last_raw_transcript, state, archived, created_at, updated_at";

/// Raw `agents` row
#[derive(Debug, Clone, FromRow)]
pub(super) struct AgentRow {
    pub agent_id: String,
    pub display_name: Option<String>,
    pub workflow_id: String,
    pub resume_token: Option<String>,
    pub conversation: String,
    pub last_raw_transcript: Option<String>,
    pub state: String,
    pub archived: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Column values for an insert or update
pub(super) struct AgentColumns {
    pub conversation: String,
    pub created_at: String,
    pub updated_at: String,
}

impl AgentColumns {
    pub fn from_agent(agent: &Agent) -> Result<Self> {
        Ok(Self {
            conversation: serde_json::to_string(&agent.conversation)?,
            created_at: format_timestamp(agent.created_at),
            updated_at: format_timestamp(agent.updated_at),
        })
    }
}

pub(super) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_timestamp(agent_id: &str, column: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| SessionError::corrupt(agent_id, format!("bad {column} '{value}': {e}")))
}

impl TryFrom<AgentRow> for Agent {
    type Error = SessionError;

    fn try_from(row: AgentRow) -> Result<Self> {
        let conversation: Vec<ConversationMessage> = serde_json::from_str(&row.conversation)
            .map_err(|e| SessionError::corrupt(&row.agent_id, format!("bad conversation: {e}")))?;
        let state: AgentState = row
            .state
            .parse()
            .map_err(|e: String| SessionError::corrupt(&row.agent_id, e))?;
        let created_at = parse_timestamp(&row.agent_id, "created_at", &row.created_at)?;
        let updated_at = parse_timestamp(&row.agent_id, "updated_at", &row.updated_at)?;

        Ok(Self {
            agent_id: AgentId::from(row.agent_id),
            display_name: row.display_name,
            workflow_id: WorkflowId::from(row.workflow_id),
            resume_token: row.resume_token.map(ResumeToken::from),
            conversation,
            state,
            last_raw_transcript: row.last_raw_transcript,
            archived: row.archived,
            created_at,
            updated_at,
        })
    }
}
