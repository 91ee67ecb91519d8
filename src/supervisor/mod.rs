//! Worker supervisor
//!
//! Owns the `agent_id -> worker` table for workers launched by this
//! instance. A fresh instance starts with an empty table; anything launched
//! before a restart is only visible through the record store.

pub mod worker;

use std::collections::HashMap;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::process::Child;
use tokio::task::JoinHandle;

use crate::backend::Backend;
use crate::config::{DetachedWorker, WorkerMode};
use crate::error::Result;
use crate::store::AgentStore;
use crate::types::identifiers::AgentId;

pub use worker::{JobOutcome, WorkerJob, run_job};

/// How a finished worker ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitReport {
    /// Turn the worker was launched for
    pub turn: usize,
    /// Human-readable exit description
    pub description: String,
}

/// What the supervisor knows about an agent's worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerStatus {
    /// Tracked and still running
    Running,
    /// Tracked, has exited, and has now been removed from the table
    Exited(ExitReport),
    /// Not launched by this instance, or already reaped
    Untracked,
}

enum WorkerHandle {
    Process(Child),
    Task(JoinHandle<Result<JobOutcome>>),
}

/// A worker and the turn it serves
///
/// The turn is the conversation length once the prompt was appended; a
/// record still `working` at that length is waiting on this worker.
struct Tracked {
    turn: usize,
    handle: WorkerHandle,
}

impl WorkerHandle {
    fn kind(&self) -> &'static str {
        match self {
            Self::Process(_) => "process",
            Self::Task(_) => "task",
        }
    }
}

/// Launches, tracks, terminates and reaps prompt workers
pub struct Supervisor<B: Backend> {
    store: AgentStore,
    backend: Arc<B>,
    mode: WorkerMode,
    invocation_timeout: Duration,
    termination_grace: Duration,
    workers: Mutex<HashMap<AgentId, Tracked>>,
}

impl<B: Backend> Supervisor<B> {
    /// Create a supervisor with an empty worker table
    pub fn new(
        store: AgentStore,
        backend: Arc<B>,
        mode: WorkerMode,
        invocation_timeout: Duration,
        termination_grace: Duration,
    ) -> Self {
        Self {
            store,
            backend,
            mode,
            invocation_timeout,
            termination_grace,
            workers: Mutex::new(HashMap::new()),
        }
    }

    /// Launch a worker for `job`, serving `turn`
    ///
    /// Returns as soon as the worker is running.
    ///
    /// # Errors
    /// Returns `Io` if the worker process cannot be spawned
    pub fn spawn(&self, job: WorkerJob, turn: usize) -> Result<()> {
        let agent_id = job.agent_id.clone();
        let handle = match &self.mode {
            WorkerMode::InProcess => WorkerHandle::Task(self.spawn_task(job)),
            WorkerMode::Detached(detached) => {
                WorkerHandle::Process(self.spawn_process(detached, job)?)
            }
        };

        log::info!(
            "Dispatched {} worker for {agent_id} (turn {turn})",
            handle.kind()
        );
        let tracked = Tracked { turn, handle };
        if let Some(previous) = self.workers.lock().insert(agent_id.clone(), tracked) {
            log::warn!(
                "Replaced a still-tracked {} worker for {agent_id} (turn {})",
                previous.handle.kind(),
                previous.turn
            );
        }
        Ok(())
    }

    fn spawn_task(&self, job: WorkerJob) -> JoinHandle<Result<JobOutcome>> {
        let store = self.store.clone();
        let backend = Arc::clone(&self.backend);
        let timeout = self.invocation_timeout;
        tokio::spawn(async move { run_job(&store, backend.as_ref(), job, timeout).await })
    }

    fn spawn_process(&self, detached: &DetachedWorker, job: WorkerJob) -> Result<Child> {
        let mut cmd = std::process::Command::new(&detached.program);
        cmd.args(&detached.base_args)
            .arg("--timeout-secs")
            .arg(self.invocation_timeout.as_secs().max(1).to_string());
        if let Some(token) = &job.resume_token {
            cmd.arg("--resume-token").arg(token.as_str());
        }
        cmd.arg("--")
            .arg(job.agent_id.as_str())
            .arg(&job.prompt)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(worker_log(detached, &job.agent_id));

        // Own process group: survives the parent and can be signalled as a unit
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let child = tokio::process::Command::from(cmd).spawn()?;
        Ok(child)
    }

    /// Terminate the tracked worker for `agent_id`, if any
    ///
    /// Sends a graceful signal, waits up to the grace period, then kills.
    /// The handle is removed from the table regardless of outcome. Returns
    /// true if a worker was tracked.
    pub async fn terminate(&self, agent_id: &AgentId) -> bool {
        let Some(Tracked { handle, .. }) = self.workers.lock().remove(agent_id) else {
            return false;
        };

        match handle {
            WorkerHandle::Process(mut child) => {
                signal_terminate(&child);
                match tokio::time::timeout(self.termination_grace, child.wait()).await {
                    Ok(Ok(status)) => {
                        log::info!("Worker for {agent_id} exited: {}", describe_status(status));
                    }
                    Ok(Err(e)) => log::warn!("Waiting on worker for {agent_id} failed: {e}"),
                    Err(_) => {
                        log::warn!("Worker for {agent_id} ignored SIGTERM, killing");
                        signal_kill(&mut child);
                        if let Err(e) = child.wait().await {
                            log::warn!("Waiting on killed worker for {agent_id} failed: {e}");
                        }
                    }
                }
            }
            WorkerHandle::Task(task) => {
                task.abort();
                if tokio::time::timeout(self.termination_grace, task)
                    .await
                    .is_err()
                {
                    log::warn!("Worker task for {agent_id} did not stop within grace period");
                }
            }
        }
        true
    }

    /// Status of the worker for `agent_id`, removing it if it has exited
    pub async fn reap_agent(&self, agent_id: &AgentId) -> WorkerStatus {
        let finished = {
            let mut workers = self.workers.lock();
            let exited = match workers.get_mut(agent_id) {
                None => return WorkerStatus::Untracked,
                Some(tracked) => has_exited(&mut tracked.handle),
            };
            match exited {
                Exited::No => return WorkerStatus::Running,
                Exited::Yes => workers.remove(agent_id),
                Exited::Status(status) => {
                    return match workers.remove(agent_id) {
                        Some(tracked) => WorkerStatus::Exited(ExitReport {
                            turn: tracked.turn,
                            description: describe_status(status),
                        }),
                        None => WorkerStatus::Untracked,
                    };
                }
            }
        };

        match finished {
            Some(tracked) => WorkerStatus::Exited(collect(tracked).await),
            None => WorkerStatus::Untracked,
        }
    }

    /// Stop tracking the worker for `agent_id` without signalling it
    ///
    /// Returns true if a worker was tracked.
    pub fn forget(&self, agent_id: &AgentId) -> bool {
        self.workers.lock().remove(agent_id).is_some()
    }

    /// Remove every exited worker from the table
    pub async fn reap(&self) -> Vec<(AgentId, ExitReport)> {
        let finished: Vec<(AgentId, Tracked)> = {
            let mut workers = self.workers.lock();
            let mut done = Vec::new();
            for (agent_id, tracked) in workers.iter_mut() {
                if !matches!(has_exited(&mut tracked.handle), Exited::No) {
                    done.push(agent_id.clone());
                }
            }
            done.into_iter()
                .filter_map(|id| workers.remove(&id).map(|tracked| (id, tracked)))
                .collect()
        };

        let mut reports = Vec::with_capacity(finished.len());
        for (agent_id, tracked) in finished {
            let report = collect(tracked).await;
            log::debug!("Reaped worker for {agent_id}: {}", report.description);
            reports.push((agent_id, report));
        }
        reports
    }

    /// Whether a worker for `agent_id` is in the table
    #[must_use]
    pub fn is_tracked(&self, agent_id: &AgentId) -> bool {
        self.workers.lock().contains_key(agent_id)
    }

    /// Abort in-process workers and forget detached ones
    ///
    /// Detached workers keep running and write their own results.
    pub fn shutdown(&self) -> usize {
        let workers: Vec<(AgentId, Tracked)> = self.workers.lock().drain().collect();
        let count = workers.len();
        for (agent_id, Tracked { handle, .. }) in workers {
            match handle {
                WorkerHandle::Task(task) => {
                    log::debug!("Aborting worker task for {agent_id}");
                    task.abort();
                }
                WorkerHandle::Process(child) => {
                    log::debug!(
                        "Leaving detached worker for {agent_id} running (pid {:?})",
                        child.id()
                    );
                }
            }
        }
        count
    }
}

enum Exited {
    No,
    Yes,
    Status(ExitStatus),
}

fn has_exited(handle: &mut WorkerHandle) -> Exited {
    match handle {
        WorkerHandle::Task(task) if task.is_finished() => Exited::Yes,
        WorkerHandle::Task(_) => Exited::No,
        WorkerHandle::Process(child) => match child.try_wait() {
            Ok(Some(status)) => Exited::Status(status),
            Ok(None) => Exited::No,
            Err(e) => {
                log::warn!("Polling worker process failed: {e}");
                Exited::Yes
            }
        },
    }
}

async fn collect(Tracked { turn, handle }: Tracked) -> ExitReport {
    let description = match handle {
        WorkerHandle::Task(task) => match task.await {
            Ok(Ok(JobOutcome::Finished(state))) => format!("worker finished ({state})"),
            Ok(Ok(JobOutcome::Skipped(state))) => format!("worker skipped ({state})"),
            Ok(Err(e)) => format!("worker failed: {e}"),
            Err(e) if e.is_panic() => "worker task panicked".to_string(),
            Err(_) => "worker task was cancelled".to_string(),
        },
        WorkerHandle::Process(mut child) => match child.wait().await {
            Ok(status) => describe_status(status),
            Err(e) => format!("worker process could not be waited on: {e}"),
        },
    };
    ExitReport { turn, description }
}

/// Stderr for a detached worker: its agent's log file, else discarded
fn worker_log(detached: &DetachedWorker, agent_id: &AgentId) -> Stdio {
    let Some(dir) = &detached.log_dir else {
        return Stdio::null();
    };
    let path = dir.join(format!("{agent_id}.log"));
    let opened = std::fs::create_dir_all(dir).and_then(|()| {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
    });
    match opened {
        Ok(file) => Stdio::from(file),
        Err(e) => {
            log::warn!("Cannot open worker log {}: {e}", path.display());
            Stdio::null()
        }
    }
}

fn describe_status(status: ExitStatus) -> String {
    format!("worker process {status}")
}

#[cfg(unix)]
fn signal_terminate(child: &Child) {
    if let Some(pid) = child.id().and_then(|pid| i32::try_from(pid).ok()) {
        // Negative pid: the whole process group, so the CLI goes down with the worker
        let rc = unsafe { libc::kill(-pid, libc::SIGTERM) };
        if rc != 0 {
            log::debug!(
                "SIGTERM to worker group {pid} failed: {}",
                std::io::Error::last_os_error()
            );
        }
    }
}

#[cfg(not(unix))]
fn signal_terminate(_child: &Child) {}

#[cfg(unix)]
fn signal_kill(child: &mut Child) {
    if let Some(pid) = child.id().and_then(|pid| i32::try_from(pid).ok()) {
        let _ = unsafe { libc::kill(-pid, libc::SIGKILL) };
    }
    let _ = child.start_kill();
}

#[cfg(not(unix))]
fn signal_kill(child: &mut Child) {
    let _ = child.start_kill();
}
