//! Agent record and session API types
//!
//! `Agent` is the single durable record per session. Everything a client
//! sees through `poll` is a snapshot of this struct as stored.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identifiers::{AgentId, ResumeToken, WorkflowId};

// ============================================================================
// Agent State
// ============================================================================

/// Lifecycle state of an agent session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    /// Accepts prompts
    Idle,
    /// A prompt was accepted and its worker has not reported back
    Working,
    /// The last prompt failed
    Errored,
    /// Ended by the client; terminal
    Archived,
}

impl AgentState {
    /// Database / wire representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Working => "working",
            Self::Errored => "errored",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(Self::Idle),
            "working" => Ok(Self::Working),
            "errored" => Ok(Self::Errored),
            "archived" => Ok(Self::Archived),
            other => Err(format!("unknown agent state '{other}'")),
        }
    }
}

// ============================================================================
// Conversation
// ============================================================================

/// Who authored a conversation entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// The client
    User,
    /// The backend, or an error recorded on its behalf
    Agent,
}

/// One entry of an agent's append-only conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// Author of the entry
    pub speaker: Speaker,
    /// Message text
    pub text: String,
    /// When the entry was appended
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Agent Record
// ============================================================================

/// Durable record of one agent session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// Primary key
    pub agent_id: AgentId,
    /// Generated display name, set at most once
    pub display_name: Option<String>,
    /// External workflow correlation id
    pub workflow_id: WorkflowId,
    /// Backend resume token, set after the first successful prompt
    pub resume_token: Option<ResumeToken>,
    /// Append-only conversation
    pub conversation: Vec<ConversationMessage>,
    /// Current lifecycle state
    pub state: AgentState,
    /// Full backend transcript of the most recent invocation
    pub last_raw_transcript: Option<String>,
    /// True once the session has been ended
    pub archived: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Bumped on every mutation
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    /// A fresh idle agent with an empty conversation
    #[must_use]
    pub fn new(workflow_id: WorkflowId) -> Self {
        let now = Utc::now();
        Self {
            agent_id: AgentId::generate(),
            display_name: None,
            workflow_id,
            resume_token: None,
            conversation: Vec::new(),
            state: AgentState::Idle,
            last_raw_transcript: None,
            archived: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a conversation entry and bump `updated_at`
    pub fn append(&mut self, speaker: Speaker, text: impl Into<String>) {
        let now = Utc::now();
        self.conversation.push(ConversationMessage {
            speaker,
            text: text.into(),
            timestamp: now,
        });
        self.updated_at = now;
    }

    /// Append an `Error: ...` entry on the agent's behalf
    pub fn append_error(&mut self, detail: impl fmt::Display) {
        self.append(Speaker::Agent, format!("Error: {detail}"));
    }

    /// Move to a new state and bump `updated_at`
    pub fn transition(&mut self, state: AgentState) {
        self.state = state;
        self.updated_at = Utc::now();
    }

    /// Mark the session ended
    pub fn archive(&mut self) {
        self.archived = true;
        self.transition(AgentState::Archived);
    }

    /// Adopt the backend's token if it is new or different.
    ///
    /// Returns true when the stored token changed.
    pub fn adopt_resume_token(&mut self, token: Option<ResumeToken>) -> bool {
        match token {
            Some(token) if self.resume_token.as_ref() != Some(&token) => {
                self.resume_token = Some(token);
                self.updated_at = Utc::now();
                true
            }
            _ => false,
        }
    }

    /// Last conversation entry, if any
    #[must_use]
    pub fn last_message(&self) -> Option<&ConversationMessage> {
        self.conversation.last()
    }
}

// ============================================================================
// API request/response types
// ============================================================================

/// Body of `create_agent`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateAgentRequest {
    /// Correlate the agent with an existing workflow run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<WorkflowId>,
}

/// Body of `prompt`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptRequest {
    /// Prompt text
    pub text: String,
}

/// Response from `prompt`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptResponse {
    /// False when the prompt was rejected
    pub accepted: bool,
    /// Agent snapshot after acceptance, or unchanged on conflict
    pub agent: Agent,
    /// Why the prompt was rejected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response from `end_agent`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndResponse {
    /// Always true when the agent exists
    pub success: bool,
}

/// Response from the health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerStatus {
    /// Server is up
    pub running: bool,
    /// Crate version
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_agent_starts_idle_and_empty() {
        let agent = Agent::new(WorkflowId::new("wf_test"));
        assert_eq!(agent.state, AgentState::Idle);
        assert!(!agent.archived);
        assert!(agent.resume_token.is_none());
        assert!(agent.conversation.is_empty());
        assert!(agent.display_name.is_none());
    }

    #[test]
    fn adopt_resume_token_only_reports_changes() {
        let mut agent = Agent::new(WorkflowId::generate());
        assert!(!agent.adopt_resume_token(None));
        assert!(agent.adopt_resume_token(Some("s1".into())));
        assert!(!agent.adopt_resume_token(Some("s1".into())));
        assert!(agent.adopt_resume_token(Some("s2".into())));
        assert!(!agent.adopt_resume_token(None));
        assert_eq!(agent.resume_token, Some(ResumeToken::new("s2")));
    }

    #[test]
    fn state_round_trips_through_strings() {
        for state in [
            AgentState::Idle,
            AgentState::Working,
            AgentState::Errored,
            AgentState::Archived,
        ] {
            assert_eq!(state.as_str().parse::<AgentState>(), Ok(state));
        }
        assert!("busy".parse::<AgentState>().is_err());
    }

    #[test]
    fn archive_sets_flag_and_state() {
        let mut agent = Agent::new(WorkflowId::generate());
        agent.archive();
        assert!(agent.archived);
        assert_eq!(agent.state, AgentState::Archived);
    }
}
