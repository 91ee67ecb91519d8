//! Shared fixtures for integration tests
//!
//! `ScriptedBackend` stands in for Claude Code: conversation turns follow a
//! script (reply, fail, hang, panic), can be held on a gate, and every
//! request is recorded. Naming calls (the ones that carry a model) are
//! answered separately.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Semaphore;

use agent_sessions::{
    Agent, AgentId, AgentManager, AgentState, Backend, Database, Invocation, InvocationRequest,
    ManagerConfig, ResumeToken, Result, SessionError,
};

/// What the backend does for one conversation turn
#[derive(Debug, Clone)]
pub enum Script {
    /// Reply with `text`, reporting `token` as the session id
    Reply { text: String, token: Option<String> },
    /// Fail with a backend error
    Fail(String),
    /// Never return
    Hang,
    /// Panic inside the worker
    Panic,
}

impl Script {
    pub fn reply(text: &str, token: &str) -> Self {
        Self::Reply {
            text: text.to_string(),
            token: Some(token.to_string()),
        }
    }
}

struct Inner {
    turns: Mutex<VecDeque<Script>>,
    calls: Mutex<Vec<InvocationRequest>>,
    naming_calls: Mutex<Vec<InvocationRequest>>,
    name_reply: Mutex<Option<String>>,
    gate: Option<Arc<Semaphore>>,
}

/// Scripted in-memory backend; clones share state
#[derive(Clone)]
pub struct ScriptedBackend {
    inner: Arc<Inner>,
}

impl ScriptedBackend {
    /// Turns play `script` in order, then reply "ok" with token "sess-default"
    pub fn new(script: Vec<Script>) -> Self {
        Self::build(script, None)
    }

    /// Like `new`, but every turn waits for a `release`
    pub fn gated(script: Vec<Script>) -> Self {
        Self::build(script, Some(Arc::new(Semaphore::new(0))))
    }

    fn build(script: Vec<Script>, gate: Option<Arc<Semaphore>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                turns: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
                naming_calls: Mutex::new(Vec::new()),
                name_reply: Mutex::new(None),
                gate,
            }),
        }
    }

    /// Answer naming calls with `reply`
    pub fn with_name_reply(self, reply: &str) -> Self {
        *self.inner.name_reply.lock() = Some(reply.to_string());
        self
    }

    /// Let `n` gated turns proceed
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.inner.gate {
            gate.add_permits(n);
        }
    }

    /// Conversation-turn requests received so far
    pub fn calls(&self) -> Vec<InvocationRequest> {
        self.inner.calls.lock().clone()
    }

    /// Naming requests received so far
    pub fn naming_calls(&self) -> Vec<InvocationRequest> {
        self.inner.naming_calls.lock().clone()
    }
}

impl Backend for ScriptedBackend {
    async fn invoke(&self, request: InvocationRequest) -> Result<Invocation> {
        if request.model.is_some() {
            self.inner.naming_calls.lock().push(request);
            let reply = self.inner.name_reply.lock().clone();
            return match reply {
                Some(response) => Ok(Invocation {
                    response,
                    raw_transcript: "[]".to_string(),
                    resume_token: None,
                }),
                None => Err(SessionError::backend("naming disabled", Some(1), None)),
            };
        }

        self.inner.calls.lock().push(request);

        if let Some(gate) = &self.inner.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| SessionError::backend("gate closed", None, None))?;
            permit.forget();
        }

        let script = self.inner.turns.lock().pop_front();
        match script.unwrap_or_else(|| Script::reply("ok", "sess-default")) {
            Script::Reply { text, token } => Ok(Invocation {
                raw_transcript: format!(r#"[{{"type":"result","result":"{text}"}}]"#),
                response: text,
                resume_token: token.map(ResumeToken::from),
            }),
            Script::Fail(message) => Err(SessionError::backend(message, Some(1), None)),
            Script::Hang => std::future::pending().await,
            Script::Panic => panic!("scripted backend panic"),
        }
    }
}

/// Fast, quiet configuration: no sweep, no names, short grace
pub fn test_config() -> ManagerConfig {
    ManagerConfig::builder()
        .invocation_timeout(Duration::from_secs(5))
        .termination_grace(Duration::from_millis(100))
        .reconcile_interval(None)
        .generate_names(false)
        .build()
}

/// Manager over a fresh in-memory database
pub async fn manager_with(
    backend: ScriptedBackend,
    config: ManagerConfig,
) -> Arc<AgentManager<ScriptedBackend>> {
    let _ = env_logger::builder().is_test(true).try_init();
    let db = Database::in_memory().await.unwrap();
    AgentManager::start(db.agents(), backend, config).unwrap()
}

/// Poll until the agent leaves `working`
pub async fn wait_until_settled<B: Backend>(manager: &AgentManager<B>, agent_id: &AgentId) -> Agent {
    wait_for(manager, agent_id, |agent| agent.state != AgentState::Working).await
}

/// Poll until `done` holds, panicking after five seconds
pub async fn wait_for<B: Backend>(
    manager: &AgentManager<B>,
    agent_id: &AgentId,
    done: impl Fn(&Agent) -> bool,
) -> Agent {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let agent = manager.poll(agent_id).await.unwrap();
        if done(&agent) {
            return agent;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "agent {agent_id} never reached the expected state: {agent:?}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
