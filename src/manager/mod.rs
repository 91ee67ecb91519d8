//! Agent session management
//!
//! Provides `AgentManager` for creating, prompting, polling and ending
//! agent sessions on top of the record store and the worker supervisor.
//!
//! # Module Structure
//!
//! - `agent_manager` - Core `AgentManager` with public API
//! - `background` - Reconciliation sweep and name generator tasks
//! - `locks` - Per-agent mutual exclusion
//! - `naming` - Naming prompt and reply sanitising

mod agent_manager;
mod background;
mod locks;
mod naming;

pub use agent_manager::AgentManager;
