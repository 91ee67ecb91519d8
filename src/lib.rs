//! # Agent Session Manager
//!
//! Durable, poll-based sessions over one-shot Claude Code invocations.
//!
//! Each agent is a row in a SQLite record store. A prompt moves an idle
//! agent to `working` and dispatches a worker; the worker runs the backend,
//! appends the reply (or an `Error: ...` message) and writes the terminal
//! state itself. Clients observe progress by polling.
//!
//! ## Quick Start
//!
//! ```no_run
//! use agent_sessions::{
//!     AgentManager, ClaudeCli, CliOptions, CreateAgentRequest, Database, ManagerConfig,
//! };
//!
//! # async fn example() -> agent_sessions::Result<()> {
//! let db = Database::open(std::path::Path::new("agents.db")).await?;
//! let backend = ClaudeCli::new(CliOptions::default())?;
//! let manager = AgentManager::start(db.agents(), backend, ManagerConfig::default())?;
//!
//! let agent = manager.create(CreateAgentRequest::default()).await?;
//! manager.prompt(&agent.agent_id, "Summarise the README").await?;
//!
//! // Later...
//! let snapshot = manager.poll(&agent.agent_id).await?;
//! log::info!("{} is {}", snapshot.agent_id, snapshot.state);
//! # Ok(())
//! # }
//! ```
//!
//! ## Components
//!
//! - [`store`] - SQLite record store, the source of truth
//! - [`backend`] - The [`Backend`] trait and the Claude Code CLI invoker
//! - [`supervisor`] - Worker table, worker launch/terminate/reap, the job body
//! - [`manager`] - [`AgentManager`]: the state machine and reconciliation
//! - [`api`] - axum router exposing the manager over HTTP

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod manager;
pub mod message;
pub mod store;
pub mod supervisor;
pub mod types;

// Re-export commonly used types for external API
pub use backend::{Backend, ClaudeCli, Invocation, InvocationRequest};
pub use config::{CliOptions, DetachedWorker, ManagerConfig, WorkerMode};
pub use error::{Result, SessionError};
pub use manager::AgentManager;
pub use message::{ParsedTranscript, parse_transcript};
pub use store::{AgentStore, Database};
pub use supervisor::{JobOutcome, WorkerJob, run_job};

// Re-export type submodules for flat public API
pub use types::agent::{
    Agent, AgentState, ConversationMessage, CreateAgentRequest, EndResponse, PromptRequest,
    PromptResponse, ServerStatus, Speaker,
};
pub use types::identifiers::{AgentId, ResumeToken, WorkflowId};

/// Version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
