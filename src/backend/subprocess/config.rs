//! Configuration constants for the Claude CLI subprocess

/// Most standard error output kept for a failed invocation
pub const STDERR_EXCERPT_BYTES: usize = 4096;

/// Dangerous environment variables that should not be passed to subprocess
///
/// These variables can affect how the subprocess loads and executes code,
/// potentially creating security vulnerabilities.
pub const DANGEROUS_ENV_VARS: &[&str] = &[
    "LD_PRELOAD",
    "LD_LIBRARY_PATH",
    "DYLD_INSERT_LIBRARIES",
    "DYLD_LIBRARY_PATH",
    "PATH",
    "NODE_OPTIONS",
    "PYTHONPATH",
    "PERL5LIB",
    "RUBYLIB",
];

/// Allowed extra CLI flags (allowlist approach)
///
/// Only these flags can be passed through `CliOptions::extra_args`.
pub const ALLOWED_EXTRA_FLAGS: &[&str] = &[
    "max-turns",
    "append-system-prompt",
    "permission-mode",
    "settings",
    "add-dir",
    "fallback-model",
];

/// Search locations for the `claude` binary, relative to `$HOME`
pub const HOME_RELATIVE_LOCATIONS: &[&str] = &[
    ".claude/local/claude",
    ".npm-global/bin/claude",
    ".local/bin/claude",
    "node_modules/.bin/claude",
    ".yarn/bin/claude",
];
