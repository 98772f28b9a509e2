// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `shellexec`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "shellexec",
    version,
    about = "Run shell commands locally or over ssh with timeouts and retries.",
    long_about = None
)]
pub struct CliArgs {
    /// Command to run. Joined with spaces and handed to the shell.
    #[arg(value_name = "CMD", trailing_var_arg = true)]
    pub cmd: Vec<String>,

    /// Path to the config file (TOML).
    ///
    /// Default: `$SHELLEXEC_CONFIG`, else `Shellexec.toml` in the current
    /// working directory. A missing default file means built-in defaults.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SHELLEXEC_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Resolve config and arguments, print what would run, run nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Run every `[command.<name>]` from the config concurrently.
    #[arg(long, conflicts_with = "cmd")]
    pub batch: bool,

    /// Run on this host: a `[host.<name>]` entry or a bare address.
    #[arg(long, value_name = "NAME|ADDRESS")]
    pub host: Option<String>,

    /// Remote user, overriding the host entry.
    #[arg(long, requires = "host")]
    pub user: Option<String>,

    /// Seconds before the command is killed.
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Working directory for local commands.
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Run the command once, even if it fails.
    #[arg(long)]
    pub no_retries: bool,

    /// Maximum number of attempts.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub retry_limit: Option<u32>,

    /// Treat a non-zero rc as an error.
    #[arg(long)]
    pub check_pass: bool,

    /// Start the command and return without waiting for it.
    #[arg(long)]
    pub detach: bool,

    /// Source the virtualenv activation script first.
    #[arg(long)]
    pub activate_virtualenv: bool,

    /// Request a pseudo-terminal on the remote side.
    #[arg(long, requires = "host")]
    pub get_pty: bool,

    /// Wrap the remote command in coreutils `timeout`.
    #[arg(long, requires = "host")]
    pub add_linux_timeout: bool,

    /// Ping the host before connecting.
    #[arg(long, requires = "host")]
    pub ping_host: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_command_keeps_its_flags() {
        let args = CliArgs::try_parse_from([
            "shellexec",
            "--timeout",
            "5",
            "--host",
            "ms1",
            "ls",
            "-la",
            "/tmp",
        ])
        .unwrap();
        assert_eq!(args.cmd, ["ls", "-la", "/tmp"]);
        assert_eq!(args.timeout, Some(5));
        assert_eq!(args.host.as_deref(), Some("ms1"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert!(CliArgs::try_parse_from(["shellexec", "--timeout", "0", "true"]).is_err());
    }

    #[test]
    fn remote_flags_need_a_host() {
        assert!(CliArgs::try_parse_from(["shellexec", "--get-pty", "true"]).is_err());
    }
}
