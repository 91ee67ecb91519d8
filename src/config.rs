//! Session manager and Claude CLI configuration
//!
//! Both option sets follow the same builder shape: `Default` carries the
//! production values, `builder()` overrides individual fields.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, SessionError};

/// Default bound on one backend call
pub const DEFAULT_INVOCATION_TIMEOUT: Duration = Duration::from_secs(600);

/// Wait between the graceful signal and the forced kill
pub const DEFAULT_TERMINATION_GRACE: Duration = Duration::from_millis(500);

/// Default period of the background reconciliation sweep
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(30);

/// Slack added to the invocation timeout before an untracked `working`
/// record is considered orphaned
pub const ORPHAN_SLACK: Duration = Duration::from_secs(60);

/// Model used for display-name generation
pub const DEFAULT_NAMING_MODEL: &str = "haiku";

/// Bound on one display-name generation call
pub const DEFAULT_NAMING_TIMEOUT: Duration = Duration::from_secs(10);

/// Default maximum size of one transcript line (1MB)
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

// ============================================================================
// Worker Mode
// ============================================================================

/// How the supervisor runs a prompt's worker
#[derive(Debug, Clone, Default)]
pub enum WorkerMode {
    /// Run the job as a tokio task owned by the supervisor
    #[default]
    InProcess,
    /// Re-launch a worker binary in its own process group
    Detached(DetachedWorker),
}

/// Command line used to launch a detached worker
///
/// The supervisor appends the job arguments (`--timeout-secs`,
/// `--resume-token`, `-- <agent_id> <prompt>`) to `program base_args...`.
#[derive(Debug, Clone)]
pub struct DetachedWorker {
    /// Worker executable, usually the running binary
    pub program: PathBuf,
    /// Arguments up to and including the worker subcommand
    pub base_args: Vec<String>,
    /// Directory for per-agent worker logs (`<agent_id>.log`, stderr
    /// appended); output is discarded when unset
    pub log_dir: Option<PathBuf>,
}

impl DetachedWorker {
    /// Create a detached worker launcher
    pub fn new(program: impl Into<PathBuf>, base_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            base_args,
            log_dir: None,
        }
    }

    /// Keep each worker's stderr in `dir`
    #[must_use]
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }
}

// ============================================================================
// Manager Config
// ============================================================================

/// Options for [`AgentManager`](crate::AgentManager)
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Bound on one backend call; exceeding it errors the agent
    pub invocation_timeout: Duration,
    /// Grace period between graceful and forced worker termination
    pub termination_grace: Duration,
    /// Background sweep period; `None` leaves reconciliation to `poll`
    pub reconcile_interval: Option<Duration>,
    /// Age after which an untracked `working` record is reconciled
    pub orphan_after: Duration,
    /// Spawn the name generator on create
    pub generate_names: bool,
    /// Model passed to the backend for naming calls
    pub naming_model: String,
    /// Bound on one naming call
    pub naming_timeout: Duration,
    /// How workers run
    pub worker_mode: WorkerMode,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            invocation_timeout: DEFAULT_INVOCATION_TIMEOUT,
            termination_grace: DEFAULT_TERMINATION_GRACE,
            reconcile_interval: Some(DEFAULT_RECONCILE_INTERVAL),
            orphan_after: DEFAULT_INVOCATION_TIMEOUT + ORPHAN_SLACK,
            generate_names: true,
            naming_model: DEFAULT_NAMING_MODEL.to_string(),
            naming_timeout: DEFAULT_NAMING_TIMEOUT,
            worker_mode: WorkerMode::InProcess,
        }
    }
}

impl ManagerConfig {
    /// Create a new builder for `ManagerConfig`
    #[must_use]
    pub fn builder() -> ManagerConfigBuilder {
        ManagerConfigBuilder::default()
    }

    /// Check invariants between fields
    ///
    /// # Errors
    /// Returns `InvalidConfig` for zero timeouts or an orphan threshold that
    /// could fire while a tracked worker is still inside its timeout
    pub fn validate(&self) -> Result<()> {
        if self.invocation_timeout.is_zero() {
            return Err(SessionError::invalid_config(
                "invocation_timeout must be greater than zero",
            ));
        }
        if self.orphan_after < self.invocation_timeout {
            return Err(SessionError::invalid_config(format!(
                "orphan_after ({:?}) must not be shorter than invocation_timeout ({:?})",
                self.orphan_after, self.invocation_timeout
            )));
        }
        if matches!(self.reconcile_interval, Some(interval) if interval.is_zero()) {
            return Err(SessionError::invalid_config(
                "reconcile_interval must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Builder for `ManagerConfig`
#[derive(Debug, Default)]
pub struct ManagerConfigBuilder {
    config: ManagerConfig,
    orphan_after_set: bool,
}

impl ManagerConfigBuilder {
    /// Set the invocation timeout
    ///
    /// Unless `orphan_after` is set explicitly it follows this value plus
    /// [`ORPHAN_SLACK`].
    #[must_use]
    pub fn invocation_timeout(mut self, timeout: Duration) -> Self {
        self.config.invocation_timeout = timeout;
        self
    }

    /// Set the termination grace period
    #[must_use]
    pub const fn termination_grace(mut self, grace: Duration) -> Self {
        self.config.termination_grace = grace;
        self
    }

    /// Set or disable the background reconciliation sweep
    #[must_use]
    pub const fn reconcile_interval(mut self, interval: Option<Duration>) -> Self {
        self.config.reconcile_interval = interval;
        self
    }

    /// Set the orphan threshold
    #[must_use]
    pub const fn orphan_after(mut self, after: Duration) -> Self {
        self.config.orphan_after = after;
        self.orphan_after_set = true;
        self
    }

    /// Enable or disable display-name generation
    #[must_use]
    pub const fn generate_names(mut self, enabled: bool) -> Self {
        self.config.generate_names = enabled;
        self
    }

    /// Set the naming model
    #[must_use]
    pub fn naming_model(mut self, model: impl Into<String>) -> Self {
        self.config.naming_model = model.into();
        self
    }

    /// Set the naming timeout
    #[must_use]
    pub const fn naming_timeout(mut self, timeout: Duration) -> Self {
        self.config.naming_timeout = timeout;
        self
    }

    /// Set the worker mode
    #[must_use]
    pub fn worker_mode(mut self, mode: WorkerMode) -> Self {
        self.config.worker_mode = mode;
        self
    }

    /// Build the config
    #[must_use]
    pub fn build(mut self) -> ManagerConfig {
        if !self.orphan_after_set {
            self.config.orphan_after = self.config.invocation_timeout + ORPHAN_SLACK;
        }
        self.config
    }
}

// ============================================================================
// Claude CLI Options
// ============================================================================

/// Options for the Claude Code CLI backend
#[derive(Debug, Clone)]
pub struct CliOptions {
    /// Path to the `claude` binary; discovered when unset
    pub cli_path: Option<PathBuf>,
    /// Model for conversation turns; CLI default when unset
    pub model: Option<String>,
    /// Working directory for the CLI process
    pub cwd: Option<PathBuf>,
    /// Extra environment variables for the CLI process
    pub env: HashMap<String, String>,
    /// Pass `--dangerously-skip-permissions`
    pub skip_permissions: bool,
    /// Extra CLI flags, filtered against an allowlist
    pub extra_args: HashMap<String, Option<String>>,
    /// Maximum size of one transcript line
    pub max_line_bytes: usize,
}

impl Default for CliOptions {
    fn default() -> Self {
        Self {
            cli_path: None,
            model: None,
            cwd: None,
            env: HashMap::new(),
            skip_permissions: true,
            extra_args: HashMap::new(),
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

impl CliOptions {
    /// Create a new builder for `CliOptions`
    #[must_use]
    pub fn builder() -> CliOptionsBuilder {
        CliOptionsBuilder::default()
    }
}

/// Builder for `CliOptions`
#[derive(Debug, Default)]
pub struct CliOptionsBuilder {
    options: CliOptions,
}

impl CliOptionsBuilder {
    /// Set the CLI path
    #[must_use]
    pub fn cli_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.cli_path = Some(path.into());
        self
    }

    /// Set the model
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.options.model = Some(model.into());
        self
    }

    /// Set the working directory
    #[must_use]
    pub fn cwd(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.cwd = Some(path.into());
        self
    }

    /// Add an environment variable
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.env.insert(key.into(), value.into());
        self
    }

    /// Enable or disable `--dangerously-skip-permissions`
    #[must_use]
    pub const fn skip_permissions(mut self, skip: bool) -> Self {
        self.options.skip_permissions = skip;
        self
    }

    /// Add an extra CLI flag
    #[must_use]
    pub fn extra_arg(mut self, flag: impl Into<String>, value: Option<String>) -> Self {
        self.options.extra_args.insert(flag.into(), value);
        self
    }

    /// Set the maximum transcript line size
    ///
    /// # Panics
    /// Panics if `bytes` is zero
    #[must_use]
    pub fn max_line_bytes(mut self, bytes: usize) -> Self {
        assert!(bytes > 0, "max_line_bytes must be greater than zero");
        self.options.max_line_bytes = bytes;
        self
    }

    /// Build the options
    #[must_use]
    pub fn build(self) -> CliOptions {
        self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orphan_threshold_follows_timeout() {
        let config = ManagerConfig::builder()
            .invocation_timeout(Duration::from_secs(5))
            .build();
        assert_eq!(config.orphan_after, Duration::from_secs(65));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn explicit_orphan_threshold_is_kept() {
        let config = ManagerConfig::builder()
            .orphan_after(Duration::from_secs(1))
            .invocation_timeout(Duration::from_secs(5))
            .build();
        assert_eq!(config.orphan_after, Duration::from_secs(1));
        assert!(config.validate().is_err());
    }

    #[test]
    fn defaults_match_production_values() {
        let config = ManagerConfig::default();
        assert_eq!(config.invocation_timeout, Duration::from_secs(600));
        assert_eq!(config.termination_grace, Duration::from_millis(500));
        assert_eq!(config.naming_model, "haiku");
        assert!(matches!(config.worker_mode, WorkerMode::InProcess));

        let cli = CliOptions::default();
        assert!(cli.skip_permissions);
        assert_eq!(cli.max_line_bytes, DEFAULT_MAX_LINE_BYTES);
    }
}
