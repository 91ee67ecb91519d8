//! Transcript handling
//!
//! Claude Code emits one JSON object per line in `stream-json` mode; the
//! parser turns a full transcript into the response text, resume token and
//! raw diagnostic copy that end up on the agent record.

pub mod parser;

pub use parser::{ParsedTranscript, parse_entry, parse_transcript};
