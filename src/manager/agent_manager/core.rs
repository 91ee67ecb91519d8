//! Core agent manager structure and lifecycle management
//!
//! Provides the main `AgentManager` struct with startup, reconciliation
//! sweep ownership, and shutdown.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::backend::{Backend, ClaudeCli};
use crate::config::{ManagerConfig, WorkerMode};
use crate::error::Result;
use crate::store::AgentStore;
use crate::supervisor::Supervisor;
use crate::types::identifiers::AgentId;

use super::super::background::spawn_reconciler;
use super::super::locks::KeyedLocks;

// ============================================================================
// AGENT MANAGER CORE
// ============================================================================

/// Orchestrates agent sessions over the record store and the supervisor
///
/// The `AgentManager` coordinates:
/// - The `idle -> working` guard, serialised per agent
/// - Worker dispatch through the [`Supervisor`]
/// - Stuck-session reconciliation on poll and on a periodic sweep
/// - Fire-and-forget display-name generation
pub struct AgentManager<B: Backend = ClaudeCli> {
    pub(crate) store: AgentStore,
    pub(crate) backend: Arc<B>,
    pub(crate) supervisor: Supervisor<B>,
    pub(crate) locks: KeyedLocks<AgentId>,
    pub(crate) config: ManagerConfig,
    reconciler: Mutex<Option<JoinHandle<()>>>,
}

impl<B: Backend> AgentManager<B> {
    /// Create a manager and start its reconciliation sweep
    ///
    /// Must be called from within a Tokio runtime when
    /// `config.reconcile_interval` is set.
    ///
    /// # Errors
    /// Returns `InvalidConfig` if the configuration is inconsistent
    pub fn start(store: AgentStore, backend: B, config: ManagerConfig) -> Result<Arc<Self>> {
        config.validate()?;

        let backend = Arc::new(backend);
        let supervisor = Supervisor::new(
            store.clone(),
            Arc::clone(&backend),
            config.worker_mode.clone(),
            config.invocation_timeout,
            config.termination_grace,
        );
        let interval = config.reconcile_interval;

        let manager = Arc::new(Self {
            store,
            backend,
            supervisor,
            locks: KeyedLocks::new(),
            config,
            reconciler: Mutex::new(None),
        });

        if let Some(interval) = interval {
            let handle = spawn_reconciler(Arc::downgrade(&manager), interval);
            *manager.reconciler.lock() = Some(handle);
        }

        log::info!(
            "AgentManager started ({} workers)",
            match manager.config.worker_mode {
                WorkerMode::InProcess => "in-process",
                WorkerMode::Detached(_) => "detached",
            }
        );
        Ok(manager)
    }

    /// Record store this manager writes to
    #[must_use]
    pub fn store(&self) -> &AgentStore {
        &self.store
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Gracefully shutdown the AgentManager
    ///
    /// Stops the reconciliation sweep and aborts in-process workers.
    /// Detached workers keep running and record their own results.
    pub fn shutdown(&self) {
        log::info!("Shutting down AgentManager...");

        if let Some(handle) = self.reconciler.lock().take() {
            handle.abort();
        }
        let workers = self.supervisor.shutdown();

        log::info!("AgentManager shutdown complete ({workers} worker(s) released)");
    }
}

impl<B: Backend> Drop for AgentManager<B> {
    fn drop(&mut self) {
        if let Some(handle) = self.reconciler.get_mut().take() {
            handle.abort();
        }
    }
}
