//! HTTP request handlers

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
};

use crate::VERSION;
use crate::backend::Backend;
use crate::error::SessionError;
use crate::manager::AgentManager;
use crate::types::agent::{
    Agent, CreateAgentRequest, EndResponse, PromptRequest, PromptResponse, ServerStatus,
};
use crate::types::identifiers::AgentId;

use super::error::{ApiError, ApiResult};

/// Health check
pub async fn check_server() -> Json<ServerStatus> {
    Json(ServerStatus {
        running: true,
        version: VERSION.to_string(),
    })
}

/// Create an agent; the body is optional
pub async fn create_agent<B: Backend>(
    State(manager): State<Arc<AgentManager<B>>>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<Agent>)> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        CreateAgentRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::bad_request(format!("invalid create request: {e}")))?
    };

    let agent = manager.create(request).await?;
    Ok((StatusCode::CREATED, Json(agent)))
}

/// Ids of all non-archived agents
pub async fn list_agents<B: Backend>(
    State(manager): State<Arc<AgentManager<B>>>,
) -> ApiResult<Json<Vec<AgentId>>> {
    Ok(Json(manager.list_active().await?))
}

/// Current snapshot of one agent
pub async fn poll_agent<B: Backend>(
    State(manager): State<Arc<AgentManager<B>>>,
    Path(agent_id): Path<String>,
) -> ApiResult<Json<Agent>> {
    let agent = manager.poll(&AgentId::from(agent_id)).await?;
    Ok(Json(agent))
}

/// Submit a prompt
///
/// A busy agent or a failed launch is not an HTTP error: the response says
/// `accepted: false` and carries the agent as stored.
pub async fn prompt_agent<B: Backend>(
    State(manager): State<Arc<AgentManager<B>>>,
    Path(agent_id): Path<String>,
    Json(request): Json<PromptRequest>,
) -> ApiResult<Json<PromptResponse>> {
    let agent_id = AgentId::from(agent_id);

    let response = match manager.prompt(&agent_id, &request.text).await {
        Ok(agent) => PromptResponse {
            accepted: true,
            agent,
            error: None,
        },
        Err(SessionError::Conflict { agent }) => PromptResponse {
            error: Some(format!(
                "Agent {} is currently {}, cannot accept new prompts",
                agent.agent_id, agent.state
            )),
            accepted: false,
            agent: *agent,
        },
        Err(SessionError::ProcessLaunch { agent, message }) => PromptResponse {
            accepted: false,
            agent: *agent,
            error: Some(format!("Failed to launch agent worker: {message}")),
        },
        Err(other) => return Err(other.into()),
    };

    Ok(Json(response))
}

/// End an agent; succeeds again for an already-ended agent
pub async fn end_agent<B: Backend>(
    State(manager): State<Arc<AgentManager<B>>>,
    Path(agent_id): Path<String>,
) -> ApiResult<Json<EndResponse>> {
    manager.end(&AgentId::from(agent_id)).await?;
    Ok(Json(EndResponse { success: true }))
}
