//! HTTP surface for the session manager
//!
//! | Method | Path                        | Operation        |
//! |--------|-----------------------------|------------------|
//! | GET    | `/health`                   | health check     |
//! | POST   | `/agents`                   | create agent     |
//! | GET    | `/agents`                   | list active ids  |
//! | GET    | `/agents/{agent_id}`        | poll             |
//! | POST   | `/agents/{agent_id}/prompt` | prompt           |
//! | POST   | `/agents/{agent_id}/end`    | end (idempotent) |

mod error;
mod handlers;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::backend::Backend;
use crate::manager::AgentManager;

pub use error::{ApiError, ApiResult, ErrorResponse};

/// Create the application router
pub fn router<B: Backend>(manager: Arc<AgentManager<B>>) -> Router {
    Router::new()
        .route("/health", get(handlers::check_server))
        .route(
            "/agents",
            post(handlers::create_agent::<B>).get(handlers::list_agents::<B>),
        )
        .route("/agents/{agent_id}", get(handlers::poll_agent::<B>))
        .route("/agents/{agent_id}/prompt", post(handlers::prompt_agent::<B>))
        .route("/agents/{agent_id}/end", post(handlers::end_agent::<B>))
        .with_state(manager)
}
