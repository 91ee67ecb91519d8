//! Backend layer for invoking the external reasoning tool
//!
//! A backend turns one prompt (plus an optional resume token) into one
//! response. The session manager and the worker job are generic over this
//! trait; the Claude Code CLI implementation lives in [`subprocess`].

pub mod subprocess;

use crate::error::Result;
use crate::types::identifiers::ResumeToken;

/// One backend call
#[derive(Debug, Clone)]
pub struct InvocationRequest {
    /// Prompt text
    pub prompt: String,
    /// Token of the conversation to resume
    pub resume_token: Option<ResumeToken>,
    /// Model override for this call
    pub model: Option<String>,
}

impl InvocationRequest {
    /// A conversation turn, resuming `resume_token` if present
    pub fn turn(prompt: impl Into<String>, resume_token: Option<ResumeToken>) -> Self {
        Self {
            prompt: prompt.into(),
            resume_token,
            model: None,
        }
    }

    /// Set the model override
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Outcome of a successful backend call
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Final response text
    pub response: String,
    /// Full transcript, kept for diagnostics
    pub raw_transcript: String,
    /// Token reported by the backend; authoritative when present
    pub resume_token: Option<ResumeToken>,
}

/// Backend trait for invoking the external reasoning tool
///
/// Implementations must be cheap to share: the manager holds one instance
/// behind an `Arc` and calls it from many tasks.
pub trait Backend: Send + Sync + 'static {
    /// Run one invocation to completion
    ///
    /// # Errors
    /// - `BackendInvocation` when the call fails or reports an error result
    /// - `OutputParse` when the transcript has no usable response
    fn invoke(
        &self,
        request: InvocationRequest,
    ) -> impl std::future::Future<Output = Result<Invocation>> + Send;
}

pub use subprocess::ClaudeCli;
