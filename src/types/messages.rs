//! Transcript entry type definitions
//!
//! Claude Code's `stream-json` output is one JSON object per line. These
//! types cover the entries the session manager reads; anything else is kept
//! only in the raw transcript.

use serde::{Deserialize, Serialize};

use super::identifiers::ResumeToken;

// ============================================================================
// Content Blocks
// ============================================================================

/// Content block types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Text content block
    Text {
        /// Text content
        text: String,
    },
    /// Thinking content block (extended thinking)
    Thinking {
        /// Thinking content
        thinking: String,
    },
    /// Tool use request
    ToolUse {
        /// Tool use ID
        id: String,
        /// Tool name
        name: String,
        /// Tool input parameters
        #[serde(default)]
        input: serde_json::Value,
    },
    /// Tool execution result
    ToolResult {
        /// ID of the tool use this is a result for
        tool_use_id: String,
    },
    /// Block types this crate does not read
    #[serde(other)]
    Unknown,
}

/// Assistant message content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantMessageContent {
    /// Model that generated the message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Message content blocks
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

impl AssistantMessageContent {
    /// First text block, if the message has one
    #[must_use]
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
    }
}

// ============================================================================
// Transcript Entries
// ============================================================================

/// One line of a `stream-json` transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TranscriptEntry {
    /// System entry; `init` carries the session id
    System {
        /// System message subtype
        subtype: String,
        /// Session ID
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<ResumeToken>,
    },
    /// Assistant message
    Assistant {
        /// Message content
        message: AssistantMessageContent,
        /// Session ID
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<ResumeToken>,
    },
    /// User message (tool results fed back to the model)
    User {
        /// Session ID
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<ResumeToken>,
    },
    /// Final result with metrics
    Result {
        /// Result subtype (`success`, `error_during_execution`, `error_max_turns`, ...)
        subtype: String,
        /// Whether this is an error result
        #[serde(default)]
        is_error: bool,
        /// Number of conversation turns
        #[serde(default)]
        num_turns: u32,
        /// Total duration in milliseconds
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
        /// Total cost in USD
        #[serde(default, skip_serializing_if = "Option::is_none")]
        total_cost_usd: Option<f64>,
        /// Final response text
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<String>,
        /// Session ID
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<ResumeToken>,
    },
}

impl TranscriptEntry {
    /// Session id carried by this entry, if any
    #[must_use]
    pub fn session_id(&self) -> Option<&ResumeToken> {
        match self {
            Self::System { session_id, .. }
            | Self::Assistant { session_id, .. }
            | Self::User { session_id }
            | Self::Result { session_id, .. } => session_id.as_ref(),
        }
    }

    /// True for the `system/init` entry
    #[must_use]
    pub fn is_init(&self) -> bool {
        matches!(self, Self::System { subtype, .. } if subtype == "init")
    }
}
