//! Backend implementation using the Claude Code CLI
//!
//! Each invocation spawns `claude --print --output-format stream-json` as a
//! one-shot subprocess and parses its transcript once the process exits.

mod command;
mod config;
mod invoker;

pub use config::{ALLOWED_EXTRA_FLAGS, DANGEROUS_ENV_VARS};
pub use invoker::ClaudeCli;
