//! Error types for the agent session manager

use thiserror::Error;

use crate::types::agent::Agent;
use crate::types::identifiers::AgentId;

/// Main error type for the agent session manager
#[derive(Error, Debug)]
pub enum SessionError {
    /// No agent with this id exists in the record store
    #[error("Agent not found: {0}")]
    NotFound(AgentId),

    /// The agent is not idle; the request was rejected without mutating it
    #[error("Agent {} is currently {}, cannot accept new prompts", .agent.agent_id, .agent.state)]
    Conflict {
        /// Unchanged snapshot of the agent at rejection time
        agent: Box<Agent>,
    },

    /// The worker for an accepted prompt could not be launched
    #[error("Failed to launch agent worker: {message}")]
    ProcessLaunch {
        /// Snapshot after the agent was moved to `errored`
        agent: Box<Agent>,
        /// Launch failure detail
        message: String,
    },

    /// Claude Code CLI not found or not installed
    #[error("Claude Code CLI not found: {0}")]
    CliNotFound(String),

    /// Backend call failed (non-zero exit, spawn failure, error result)
    #[error("Backend invocation failed: {message}")]
    BackendInvocation {
        /// Error message
        message: String,
        /// Process exit code, when the process ran to completion
        exit_code: Option<i32>,
        /// Excerpt of standard error output
        stderr: Option<String>,
        /// Transcript produced before the failure was detected
        raw_transcript: Option<String>,
    },

    /// Backend ran but its transcript had no usable result
    #[error("Output parse failure: {message}")]
    OutputParse {
        /// Error message
        message: String,
        /// Whatever transcript could be recovered, kept for diagnostics
        raw_transcript: Option<String>,
    },

    /// Backend call exceeded its time bound
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Prompt text was empty
    #[error("Prompt text must not be empty")]
    EmptyPrompt,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A stored row could not be turned back into an agent
    #[error("Corrupt agent record {agent_id}: {message}")]
    CorruptRecord {
        /// Row key
        agent_id: String,
        /// What was wrong with it
        message: String,
    },

    /// Database error
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Schema migration error
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for session manager operations
pub type Result<T> = std::result::Result<T, SessionError>;

impl SessionError {
    /// Create a CLI not found error
    #[must_use]
    pub fn cli_not_found() -> Self {
        Self::CliNotFound(
            "Claude Code not found. Install with:\n\
             npm install -g @anthropic-ai/claude-code\n\
             \n\
             Or point CLAUDE_CODE_PATH at the binary"
                .to_string(),
        )
    }

    /// Create a backend invocation error
    pub fn backend(
        msg: impl Into<String>,
        exit_code: Option<i32>,
        stderr: Option<String>,
    ) -> Self {
        Self::BackendInvocation {
            message: msg.into(),
            exit_code,
            stderr,
            raw_transcript: None,
        }
    }

    /// Attach a recovered transcript to a backend or parse error
    #[must_use]
    pub fn with_transcript(mut self, transcript: String) -> Self {
        match &mut self {
            Self::BackendInvocation { raw_transcript, .. }
            | Self::OutputParse { raw_transcript, .. } => *raw_transcript = Some(transcript),
            _ => {}
        }
        self
    }

    /// Create an output parse error
    pub fn output_parse(msg: impl Into<String>, raw_transcript: Option<String>) -> Self {
        Self::OutputParse {
            message: msg.into(),
            raw_transcript,
        }
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a corrupt record error
    pub fn corrupt(agent_id: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::CorruptRecord {
            agent_id: agent_id.into(),
            message: msg.into(),
        }
    }

    /// Raw transcript carried by the error, if any
    #[must_use]
    pub fn raw_transcript(&self) -> Option<&str> {
        match self {
            Self::BackendInvocation { raw_transcript, .. }
            | Self::OutputParse { raw_transcript, .. } => raw_transcript.as_deref(),
            _ => None,
        }
    }
}
