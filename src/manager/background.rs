//! Background task spawning for the session manager
//!
//! Contains the periodic reconciliation sweep and the fire-and-forget
//! display-name generator. Neither is ever awaited by a client request.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::agent_manager::AgentManager;
use super::naming::{NAMING_PROMPT, sanitize_name};
use crate::backend::{Backend, InvocationRequest};
use crate::store::AgentStore;
use crate::types::identifiers::AgentId;

/// Spawn the periodic reconciliation sweep
///
/// Holds only a weak reference, so the sweep ends once the manager is
/// dropped.
pub(super) fn spawn_reconciler<B: Backend>(
    manager: Weak<AgentManager<B>>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let Some(manager) = manager.upgrade() else {
                break;
            };
            match manager.reconcile().await {
                Ok(reconciled) if !reconciled.is_empty() => {
                    log::info!("Reconciliation sweep errored {} stuck agent(s)", reconciled.len());
                }
                Ok(_) => {}
                Err(e) => log::warn!("Reconciliation sweep failed: {e}"),
            }
        }
    })
}

/// Everything the name generator needs, owned
pub(super) struct NamingJob<B: Backend> {
    pub store: AgentStore,
    pub backend: Arc<B>,
    pub agent_id: AgentId,
    pub model: String,
    pub timeout: Duration,
}

/// Spawn a detached task that asks the backend for a display name
///
/// Every failure is logged and swallowed; the name stays null and is not
/// retried.
pub(super) fn spawn_name_generator<B: Backend>(job: NamingJob<B>) {
    tokio::spawn(async move {
        let NamingJob {
            store,
            backend,
            agent_id,
            model,
            timeout,
        } = job;

        let request = InvocationRequest::turn(NAMING_PROMPT, None).with_model(model);
        let reply = match tokio::time::timeout(timeout, backend.invoke(request)).await {
            Ok(Ok(invocation)) => invocation.response,
            Ok(Err(e)) => {
                log::debug!("Name generation for {agent_id} failed: {e}");
                return;
            }
            Err(_) => {
                log::debug!("Name generation for {agent_id} timed out");
                return;
            }
        };

        let Some(name) = sanitize_name(&reply) else {
            log::debug!("Name generation for {agent_id} returned nothing usable");
            return;
        };

        match store.set_display_name(&agent_id, &name).await {
            Ok(true) => log::info!("Agent {agent_id} named {name}"),
            Ok(false) => log::debug!("Agent {agent_id} already named or gone"),
            Err(e) => log::warn!("Failed to store display name for {agent_id}: {e}"),
        }
    });
}
