//! CLI command building logic for one Claude Code invocation

use std::path::Path;
use tokio::process::Command;

use crate::backend::InvocationRequest;
use crate::config::CliOptions;

use super::config::ALLOWED_EXTRA_FLAGS;

/// Command builder for Claude CLI
pub struct CommandBuilder<'a> {
    cli_path: &'a Path,
    request: &'a InvocationRequest,
    options: &'a CliOptions,
}

impl<'a> CommandBuilder<'a> {
    /// Create a new command builder
    pub fn new(cli_path: &'a Path, request: &'a InvocationRequest, options: &'a CliOptions) -> Self {
        Self {
            cli_path,
            request,
            options,
        }
    }

    /// Build the complete CLI command with all arguments
    pub fn build(&self) -> Command {
        let mut cmd = Command::new(self.cli_path);
        for arg in self.args() {
            cmd.arg(arg);
        }
        cmd
    }

    /// Argument list, prompt last after `--`
    pub fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "--print".into(),
            "--output-format".into(),
            "stream-json".into(),
            "--verbose".into(),
        ];

        // Per-call model (name generation) wins over the configured one
        if let Some(model) = self.request.model.as_ref().or(self.options.model.as_ref()) {
            args.push("--model".into());
            args.push(model.clone());
        }

        if let Some(ref token) = self.request.resume_token {
            args.push("--resume".into());
            args.push(token.as_str().to_string());
        }

        if self.options.skip_permissions {
            args.push("--dangerously-skip-permissions".into());
        }

        self.add_extra_args(&mut args);

        args.push("--".into());
        args.push(self.request.prompt.clone());
        args
    }

    /// Add allowlisted extra arguments in a stable order
    fn add_extra_args(&self, args: &mut Vec<String>) {
        let mut flags: Vec<_> = self.options.extra_args.iter().collect();
        flags.sort_by(|a, b| a.0.cmp(b.0));

        for (flag, value) in flags {
            if !ALLOWED_EXTRA_FLAGS.contains(&flag.as_str()) {
                log::warn!("Ignoring extra CLI flag not on the allowlist: --{flag}");
                continue;
            }
            args.push(format!("--{flag}"));
            if let Some(v) = value {
                args.push(v.clone());
            }
        }
    }
}
