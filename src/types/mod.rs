//! Type definitions for the agent session manager
//!
//! - [`identifiers`] - Type-safe ID wrappers (`AgentId`, `WorkflowId`, `ResumeToken`)
//! - [`agent`] - The durable agent record and the session API request/response types
//! - [`messages`] - Claude Code `stream-json` transcript entries

pub mod agent;
pub mod identifiers;
pub mod messages;

pub use agent::{
    Agent, AgentState, ConversationMessage, CreateAgentRequest, EndResponse, PromptRequest,
    PromptResponse, ServerStatus, Speaker,
};
pub use identifiers::{AgentId, ResumeToken, WorkflowId};
pub use messages::{AssistantMessageContent, ContentBlock, TranscriptEntry};
