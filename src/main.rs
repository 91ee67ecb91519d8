// agent-sessions: HTTP server for the agent session manager, and the
// detached worker it re-launches for each accepted prompt.
//
// The server listens on 127.0.0.1:8743 unless AGENT_SESSIONS_BIND says otherwise.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use agent_sessions::{
    AgentId, AgentManager, ClaudeCli, CliOptions, Database, DetachedWorker, ManagerConfig,
    ResumeToken, WorkerJob, WorkerMode, api, run_job,
};

#[derive(Debug, Parser)]
#[command(name = "agent-sessions", version, about = "Poll-based Claude Code agent sessions")]
struct Cli {
    /// SQLite database holding the agent records
    #[arg(long, env = "AGENT_SESSIONS_DB", default_value = "agents.db")]
    database: PathBuf,

    #[command(flatten)]
    backend: BackendArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Args)]
struct BackendArgs {
    /// Path to the `claude` binary
    #[arg(long, env = "CLAUDE_CODE_PATH")]
    cli_path: Option<PathBuf>,

    /// Model for conversation turns
    #[arg(long)]
    model: Option<String>,

    /// Working directory for Claude Code
    #[arg(long)]
    cwd: Option<PathBuf>,

    /// Do not pass --dangerously-skip-permissions
    #[arg(long)]
    no_skip_permissions: bool,
}

impl BackendArgs {
    fn cli_options(&self) -> CliOptions {
        let mut builder = CliOptions::builder().skip_permissions(!self.no_skip_permissions);
        if let Some(path) = &self.cli_path {
            builder = builder.cli_path(path);
        }
        if let Some(model) = &self.model {
            builder = builder.model(model);
        }
        if let Some(cwd) = &self.cwd {
            builder = builder.cwd(cwd);
        }
        builder.build()
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve(ServeArgs),
    /// Run one prompt for an agent and record the result (launched by the server)
    Worker(WorkerArgs),
}

#[derive(Debug, Args)]
struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "AGENT_SESSIONS_BIND", default_value = "127.0.0.1:8743")]
    bind: SocketAddr,

    /// Bound on one backend call, in seconds
    #[arg(long, default_value_t = 600)]
    timeout_secs: u64,

    /// Reconciliation sweep period in seconds; 0 leaves it to polling
    #[arg(long, default_value_t = 30)]
    reconcile_secs: u64,

    /// Run workers as tasks inside the server instead of detached processes
    #[arg(long)]
    in_process: bool,

    /// Do not generate display names
    #[arg(long)]
    no_names: bool,
}

#[derive(Debug, Args)]
struct WorkerArgs {
    /// Bound on the backend call, in seconds
    #[arg(long, default_value_t = 600)]
    timeout_secs: u64,

    /// Resume token known when the prompt was accepted
    #[arg(long)]
    resume_token: Option<String>,

    /// Agent the prompt belongs to
    agent_id: String,

    /// Prompt text
    prompt: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve(ref args) => serve(&cli, args).await,
        Command::Worker(ref args) => {
            let succeeded = worker(&cli, args).await?;
            std::process::exit(if succeeded { 0 } else { 1 });
        }
    }
}

async fn serve(cli: &Cli, args: &ServeArgs) -> Result<()> {
    let db = Database::open(&cli.database)
        .await
        .with_context(|| format!("opening database {}", cli.database.display()))?;
    let backend = ClaudeCli::new(cli.backend.cli_options())?;

    let worker_mode = if args.in_process {
        WorkerMode::InProcess
    } else {
        let program = std::env::current_exe().context("locating worker executable")?;
        let database = std::fs::canonicalize(&cli.database).unwrap_or_else(|_| cli.database.clone());
        let log_dir = database
            .parent()
            .map_or_else(|| PathBuf::from("worker-logs"), |dir| dir.join("worker-logs"));
        log::info!("Worker logs go to {}", log_dir.display());
        WorkerMode::Detached(
            DetachedWorker::new(
                program,
                worker_base_args(&database, &cli.backend, backend.cli_path()),
            )
            .with_log_dir(log_dir),
        )
    };

    let config = ManagerConfig::builder()
        .invocation_timeout(Duration::from_secs(args.timeout_secs))
        .reconcile_interval((args.reconcile_secs > 0).then(|| Duration::from_secs(args.reconcile_secs)))
        .generate_names(!args.no_names)
        .worker_mode(worker_mode)
        .build();

    let manager = AgentManager::start(db.agents(), backend, config)?;
    let app = api::router(Arc::clone(&manager));

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("binding {}", args.bind))?;
    log::info!("Agent session server listening on http://{}", args.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    manager.shutdown();
    Ok(())
}

/// Arguments that make a detached worker see the same database and backend
fn worker_base_args(database: &Path, backend: &BackendArgs, cli_path: &Path) -> Vec<String> {
    let mut args = vec![
        "--database".to_string(),
        database.display().to_string(),
        "--cli-path".to_string(),
        cli_path.display().to_string(),
    ];
    if let Some(model) = &backend.model {
        args.push("--model".to_string());
        args.push(model.clone());
    }
    if let Some(cwd) = &backend.cwd {
        args.push("--cwd".to_string());
        args.push(cwd.display().to_string());
    }
    if backend.no_skip_permissions {
        args.push("--no-skip-permissions".to_string());
    }
    args.push("worker".to_string());
    args
}

async fn worker(cli: &Cli, args: &WorkerArgs) -> Result<bool> {
    let db = Database::open(&cli.database)
        .await
        .with_context(|| format!("opening database {}", cli.database.display()))?;
    let backend = ClaudeCli::new(cli.backend.cli_options())?;

    let job = WorkerJob {
        agent_id: AgentId::from(args.agent_id.as_str()),
        prompt: args.prompt.clone(),
        resume_token: args.resume_token.as_deref().map(ResumeToken::from),
    };

    let outcome = run_job(
        &db.agents(),
        &backend,
        job,
        Duration::from_secs(args.timeout_secs),
    )
    .await?;
    log::info!("Worker for {} done: {outcome:?}", args.agent_id);

    Ok(outcome.succeeded())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    log::info!("Shutdown signal received");
}
