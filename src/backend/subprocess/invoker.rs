//! One-shot Claude Code CLI invoker

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use futures::StreamExt;
use tokio::io::AsyncReadExt;
use tokio::process::ChildStderr;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};

use crate::VERSION;
use crate::backend::{Backend, Invocation, InvocationRequest};
use crate::config::CliOptions;
use crate::error::{Result, SessionError};
use crate::message::parse_transcript;

use super::command::CommandBuilder;
use super::config::{DANGEROUS_ENV_VARS, HOME_RELATIVE_LOCATIONS, STDERR_EXCERPT_BYTES};

/// Claude Code CLI backend
#[derive(Debug, Clone)]
pub struct ClaudeCli {
    cli_path: PathBuf,
    options: CliOptions,
}

impl ClaudeCli {
    /// Create a CLI backend
    ///
    /// Uses `options.cli_path` when set, otherwise searches for the binary.
    ///
    /// # Errors
    /// Returns `CliNotFound` if no binary can be located
    pub fn new(options: CliOptions) -> Result<Self> {
        let cli_path = match options.cli_path.clone() {
            Some(path) => path,
            None => Self::find_cli()?,
        };
        log::debug!("Using Claude Code CLI at {}", cli_path.display());
        Ok(Self { cli_path, options })
    }

    /// Find Claude Code CLI binary
    ///
    /// # Errors
    /// Returns error if CLI cannot be found in PATH or common locations
    pub fn find_cli() -> Result<PathBuf> {
        if let Ok(path) = which::which("claude") {
            return Ok(path);
        }

        let home = env::var("HOME").unwrap_or_else(|_| String::from("/root"));
        let locations = HOME_RELATIVE_LOCATIONS
            .iter()
            .map(|rel| Path::new(&home).join(rel))
            .chain(std::iter::once(PathBuf::from("/usr/local/bin/claude")));

        for path in locations {
            if path.is_file() {
                return Ok(path);
            }
        }

        Err(SessionError::cli_not_found())
    }

    /// Path of the binary this backend runs
    #[must_use]
    pub fn cli_path(&self) -> &Path {
        &self.cli_path
    }

    /// Options this backend was built with
    #[must_use]
    pub fn options(&self) -> &CliOptions {
        &self.options
    }

    async fn run(&self, request: InvocationRequest) -> Result<Invocation> {
        let mut cmd = CommandBuilder::new(&self.cli_path, &request, &self.options).build();

        let mut process_env = env::vars().collect::<HashMap<_, _>>();
        for (key, value) in &self.options.env {
            if !DANGEROUS_ENV_VARS.contains(&key.as_str()) {
                process_env.insert(key.clone(), value.clone());
            }
        }
        process_env.insert("CLAUDE_CODE_ENTRYPOINT".to_string(), "agent-sessions".to_string());
        process_env.insert("AGENT_SESSIONS_VERSION".to_string(), VERSION.to_string());

        if let Some(ref cwd) = self.options.cwd {
            process_env.insert("PWD".to_string(), cwd.to_string_lossy().to_string());
            cmd.current_dir(cwd);
        }

        cmd.envs(process_env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            if let Some(ref cwd) = self.options.cwd
                && !cwd.exists()
            {
                return SessionError::backend(
                    format!("Working directory does not exist: {}", cwd.display()),
                    None,
                    None,
                );
            }
            SessionError::backend(format!("Failed to start Claude Code: {e}"), None, None)
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SessionError::backend("Failed to get stdout handle", None, None))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| SessionError::backend("Failed to get stderr handle", None, None))?;
        let stderr_task = spawn_stderr_collector(stderr);

        let mut frames = FramedRead::new(
            stdout,
            LinesCodec::new_with_max_length(self.options.max_line_bytes),
        );
        let mut lines = Vec::new();
        while let Some(frame) = frames.next().await {
            match frame {
                Ok(line) => lines.push(line),
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    let raw = parse_transcript(&lines)
                        .map(|parsed| parsed.raw_transcript)
                        .ok();
                    return Err(SessionError::output_parse(
                        format!(
                            "transcript line exceeded {} bytes",
                            self.options.max_line_bytes
                        ),
                        raw,
                    ));
                }
                Err(LinesCodecError::Io(e)) => return Err(SessionError::Io(e)),
            }
        }

        let status = child.wait().await?;
        let stderr = stderr_task.await.unwrap_or_default();

        if !status.success() {
            let raw = match parse_transcript(&lines) {
                Ok(parsed) => Some(parsed.raw_transcript),
                Err(e) => e.raw_transcript().map(str::to_string),
            };
            let message = match status.code() {
                Some(code) => format!("Claude Code exited with status {code}"),
                None => "Claude Code was terminated by a signal".to_string(),
            };
            let stderr = (!stderr.trim().is_empty()).then_some(stderr);
            let err = SessionError::backend(message, status.code(), stderr);
            return Err(match raw {
                Some(raw) => err.with_transcript(raw),
                None => err,
            });
        }

        let parsed = parse_transcript(&lines)?;
        log::debug!(
            "Claude Code finished: {} turn(s), cost {:?} USD",
            parsed.num_turns.unwrap_or_default(),
            parsed.total_cost_usd
        );

        Ok(Invocation {
            response: parsed.response,
            raw_transcript: parsed.raw_transcript,
            resume_token: parsed.resume_token,
        })
    }
}

impl Backend for ClaudeCli {
    async fn invoke(&self, request: InvocationRequest) -> Result<Invocation> {
        self.run(request).await
    }
}

/// Drain stderr so the child never blocks on a full pipe, keeping the head
fn spawn_stderr_collector(mut stderr: ChildStderr) -> JoinHandle<String> {
    tokio::spawn(async move {
        let mut kept = Vec::new();
        let mut buffer = vec![0u8; 4096];

        loop {
            match stderr.read(&mut buffer).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let room = STDERR_EXCERPT_BYTES.saturating_sub(kept.len());
                    kept.extend_from_slice(&buffer[..n.min(room)]);
                }
            }
        }

        String::from_utf8_lossy(&kept).into_owned()
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    use crate::types::identifiers::ResumeToken;

    fn fake_cli(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("claude");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn parses_successful_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = fake_cli(
            dir.path(),
            r#"echo '{"type":"system","subtype":"init","session_id":"sess-1"}'
echo '{"type":"result","subtype":"success","result":"pong","session_id":"sess-1"}'"#,
        );
        let cli = ClaudeCli::new(CliOptions::builder().cli_path(path).build()).unwrap();

        let out = cli
            .invoke(InvocationRequest::turn("ping", None))
            .await
            .unwrap();
        assert_eq!(out.response, "pong");
        assert_eq!(out.resume_token, Some(ResumeToken::new("sess-1")));
    }

    #[tokio::test]
    async fn non_zero_exit_carries_code_and_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let path = fake_cli(dir.path(), "echo 'quota exceeded' >&2\nexit 3");
        let cli = ClaudeCli::new(CliOptions::builder().cli_path(path).build()).unwrap();

        let err = cli
            .invoke(InvocationRequest::turn("ping", None))
            .await
            .unwrap_err();
        match err {
            SessionError::BackendInvocation {
                exit_code, stderr, ..
            } => {
                assert_eq!(exit_code, Some(3));
                assert!(stderr.unwrap().contains("quota exceeded"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_binary_is_a_backend_failure() {
        let dir = tempfile::tempdir().unwrap();
        let cli = ClaudeCli::new(
            CliOptions::builder()
                .cli_path(dir.path().join("nope"))
                .build(),
        )
        .unwrap();

        let err = cli
            .invoke(InvocationRequest::turn("ping", None))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::BackendInvocation { .. }));
    }
}
