//! The job a worker runs for one accepted prompt
//!
//! Shared by in-process tasks and the detached `worker` subcommand. The job
//! owns the terminal write: it appends exactly one agent message and moves
//! the record out of `working`, guarded by a compare-and-swap on that state.

use std::time::Duration;

use crate::backend::{Backend, InvocationRequest};
use crate::error::{Result, SessionError};
use crate::store::AgentStore;
use crate::types::agent::{AgentState, Speaker};
use crate::types::identifiers::{AgentId, ResumeToken};

/// Longest stderr excerpt copied into the conversation
const STDERR_IN_CONVERSATION: usize = 500;

/// Work order for one prompt
#[derive(Debug, Clone)]
pub struct WorkerJob {
    /// Agent the prompt belongs to
    pub agent_id: AgentId,
    /// Prompt text
    pub prompt: String,
    /// Token known at dispatch; the stored one wins if present
    pub resume_token: Option<ResumeToken>,
}

/// What a job did with the record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Result written; the agent is now in this state
    Finished(AgentState),
    /// The record left `working` before the job could write (ended, or
    /// reconciled); nothing was written
    Skipped(AgentState),
}

impl JobOutcome {
    /// True when the turn completed successfully
    #[must_use]
    pub fn succeeded(self) -> bool {
        self == Self::Finished(AgentState::Idle)
    }
}

/// Run one prompt against the backend and record the result
///
/// # Errors
/// Returns error only when the record cannot be read or written; backend
/// failures are recorded on the agent instead
pub async fn run_job<B: Backend>(
    store: &AgentStore,
    backend: &B,
    job: WorkerJob,
    timeout: Duration,
) -> Result<JobOutcome> {
    let agent = store.get(&job.agent_id).await?;
    if agent.state != AgentState::Working {
        log::info!(
            "Worker for {} skipped: agent is {}",
            job.agent_id,
            agent.state
        );
        return Ok(JobOutcome::Skipped(agent.state));
    }

    let resume_token = agent.resume_token.clone().or(job.resume_token);
    let request = InvocationRequest::turn(job.prompt, resume_token);

    let result = match tokio::time::timeout(timeout, backend.invoke(request)).await {
        Ok(result) => result,
        Err(_) => Err(SessionError::timeout(format!(
            "backend call exceeded {timeout:?}"
        ))),
    };

    // Re-read: the record may have been ended while the backend ran
    let mut agent = store.get(&job.agent_id).await?;
    if agent.state != AgentState::Working {
        log::info!(
            "Discarding result for {}: agent is now {}",
            job.agent_id,
            agent.state
        );
        return Ok(JobOutcome::Skipped(agent.state));
    }

    match result {
        Ok(invocation) => {
            agent.append(Speaker::Agent, invocation.response);
            agent.last_raw_transcript = Some(invocation.raw_transcript);
            if agent.adopt_resume_token(invocation.resume_token) {
                log::debug!("Agent {} resume token updated", agent.agent_id);
            }
            agent.transition(AgentState::Idle);
        }
        Err(e) => {
            log::warn!("Prompt for {} failed: {e}", agent.agent_id);
            if let Some(raw) = e.raw_transcript() {
                agent.last_raw_transcript = Some(raw.to_string());
            }
            agent.append_error(describe_failure(&e));
            agent.transition(AgentState::Errored);
        }
    }

    if !store.update_if_state(&agent, AgentState::Working).await? {
        let current = store.get(&job.agent_id).await?;
        log::info!(
            "Discarding result for {}: agent moved to {} during write",
            job.agent_id,
            current.state
        );
        return Ok(JobOutcome::Skipped(current.state));
    }

    log::info!("Agent {} finished turn: {}", agent.agent_id, agent.state);
    Ok(JobOutcome::Finished(agent.state))
}

/// Error text for the conversation, with a stderr excerpt when there is one
fn describe_failure(error: &SessionError) -> String {
    match error {
        SessionError::BackendInvocation {
            stderr: Some(stderr),
            ..
        } => {
            let excerpt: String = stderr.trim().chars().take(STDERR_IN_CONVERSATION).collect();
            format!("{error} ({excerpt})")
        }
        _ => error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_text_includes_stderr_excerpt() {
        let err = SessionError::backend("exit 1", Some(1), Some("  rate limited\n".into()));
        assert_eq!(
            describe_failure(&err),
            "Backend invocation failed: exit 1 (rate limited)"
        );
    }

    #[test]
    fn only_idle_finish_counts_as_success() {
        assert!(JobOutcome::Finished(AgentState::Idle).succeeded());
        assert!(!JobOutcome::Finished(AgentState::Errored).succeeded());
        assert!(!JobOutcome::Skipped(AgentState::Idle).succeeded());
    }
}
