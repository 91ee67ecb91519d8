//! Agent session manager implementation
//!
//! This module is organized into logical submodules:
//! - `core`: Core struct, startup, and shutdown
//! - `create`: Agent creation and name generation dispatch
//! - `prompt`: The idle -> working guard and worker dispatch
//! - `poll`: Snapshot reads and stuck-session reconciliation
//! - `list`: Active agent listing
//! - `end`: Termination and archiving

// Module declarations
mod core;
mod create;
mod end;
mod list;
mod poll;
mod prompt;

// Re-export public API
pub use self::core::AgentManager;
