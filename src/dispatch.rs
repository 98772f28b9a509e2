// src/dispatch.rs

//! Picks an executor for a command and runs it.
//!
//! This is the layer callers normally use: it knows about hosts, the ping
//! pre-check and running several commands side by side.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::{CommandConfig, ConfigFile, DefaultsSection, HostConfig};
use crate::errors::{Result, ShellError};
use crate::exec::local::{DEFAULT_SHELL, LocalExecutor, shell_quote};
use crate::exec::{Executor, RemoteExecutor, RemoteOptions};
use crate::remote::{RemoteConnection, SshConnection};
use crate::shell::{Command, Response};
use crate::types::HOST_UNREACHABLE_RC;

const PING_TIMEOUT: Duration = Duration::from_secs(10);

/// Shell settings for local commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalShell {
    pub shell: PathBuf,
    pub activate_script: Option<PathBuf>,
}

impl Default for LocalShell {
    fn default() -> Self {
        Self {
            shell: PathBuf::from(DEFAULT_SHELL),
            activate_script: None,
        }
    }
}

impl From<&DefaultsSection> for LocalShell {
    fn from(defaults: &DefaultsSection) -> Self {
        Self {
            shell: defaults.shell.clone(),
            activate_script: defaults.activate_script.clone(),
        }
    }
}

/// Where a command runs.
#[derive(Debug, Clone)]
pub enum Target {
    Local(LocalShell),
    Remote {
        host: HostConfig,
        options: RemoteOptions,
        ping_host: bool,
    },
}

impl Target {
    pub fn local() -> Self {
        Target::Local(LocalShell::default())
    }

    pub fn remote(host: HostConfig) -> Self {
        let options = host.remote_options();
        Target::Remote {
            host,
            options,
            ping_host: false,
        }
    }

    /// Where a configured command runs.
    pub fn for_command(cfg: &ConfigFile, command: &CommandConfig) -> Result<Self> {
        let target = match &command.host {
            Some(name) => {
                let host = cfg.host(name)?.clone();
                Target::Remote {
                    options: command.remote_options(&host),
                    host,
                    ping_host: command.ping_host,
                }
            }
            None => Target::Local(LocalShell::from(cfg.defaults())),
        };
        Ok(target)
    }
}

/// A named command ready to run.
#[derive(Debug, Clone)]
pub struct Job {
    pub name: String,
    pub command: Command,
    pub target: Target,
}

impl Job {
    pub fn new(name: impl Into<String>, command: impl Into<Command>, target: Target) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            target,
        }
    }
}

/// Every `[command.<name>]` entry, in name order.
pub fn jobs_from_config(cfg: &ConfigFile) -> Result<Vec<Job>> {
    cfg.commands()
        .iter()
        .map(|(name, command)| {
            Ok(Job {
                name: name.clone(),
                command: command.to_command(cfg.defaults()),
                target: Target::for_command(cfg, command)?,
            })
        })
        .collect()
}

/// Run `command` on `target` and return its final response.
pub async fn execute_cmd(command: Command, target: &Target) -> Result<Response> {
    match target {
        Target::Local(shell) => run_local_cmd(command, shell).await,
        Target::Remote {
            host,
            options,
            ping_host,
        } => {
            if *ping_host && !is_host_pingable(&host.address).await {
                warn!(host = %host.address, "host did not answer ping");
                return Ok(unreachable_response(&command, &host.address));
            }
            run_remote_cmd(command, host, *options).await
        }
    }
}

pub async fn run_local_cmd(command: Command, shell: &LocalShell) -> Result<Response> {
    let mut executor = LocalExecutor::new(command).with_shell(&shell.shell);
    if let Some(script) = &shell.activate_script {
        executor = executor.with_activate_script(script);
    }
    executor.execute().await
}

/// Run `command` over a fresh ssh connection to `host`.
pub async fn run_remote_cmd(
    command: Command,
    host: &HostConfig,
    options: RemoteOptions,
) -> Result<Response> {
    let connection = Arc::new(SshConnection::new(host.clone()));
    run_over_connection(command, connection, options).await
}

/// Run `command` over an existing connection, closing it afterwards.
pub async fn run_over_connection<C: RemoteConnection>(
    command: Command,
    connection: Arc<C>,
    options: RemoteOptions,
) -> Result<Response> {
    let host = connection.host().to_string();
    let mut executor = RemoteExecutor::new(command, Arc::clone(&connection), options);
    let result = executor.execute().await;
    connection.close();

    result.map_err(|err| match err {
        failed @ ShellError::CommandFailed { .. } => failed,
        other => ShellError::Remote(format!("command on '{host}' failed: {other}")),
    })
}

/// True if one ping to `host` gets an answer.
pub async fn is_host_pingable(host: &str) -> bool {
    match LocalExecutor::new(ping_command(host)).execute().await {
        Ok(response) => {
            debug!(host = %host, rc = ?response.rc(), "ping finished");
            response.rc() == Some(0)
        }
        Err(err) => {
            debug!(host = %host, error = %err, "ping could not run");
            false
        }
    }
}

fn ping_command(host: &str) -> Command {
    Command::new(format!("ping -c 1 -w 4 {}", shell_quote(host)))
        .with_timeout(PING_TIMEOUT)
        .with_retries(false)
        .with_log_cmd(false)
}

fn unreachable_response(command: &Command, host: &str) -> Response {
    let mut response = Response::new(command.cmd.clone());
    response.complete(
        HOST_UNREACHABLE_RC,
        format!("Error: Unable to reach host, please ensure the host: {host} is available."),
    );
    response
}

/// Run independent jobs concurrently; results come back in submission
/// order.
pub async fn run_batch(jobs: Vec<Job>) -> Vec<(String, Result<Response>)> {
    let names: Vec<String> = jobs.iter().map(|job| job.name.clone()).collect();
    let mut results: Vec<Option<Result<Response>>> = names.iter().map(|_| None).collect();

    let mut set = JoinSet::new();
    for (index, job) in jobs.into_iter().enumerate() {
        set.spawn(async move {
            let result = execute_cmd(job.command, &job.target).await;
            (index, result)
        });
    }
    info!(jobs = names.len(), "batch started");

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, result)) => results[index] = Some(result),
            Err(err) => warn!(error = %err, "batch job panicked or was cancelled"),
        }
    }

    names
        .into_iter()
        .zip(results)
        .map(|(name, result)| {
            let result = result.unwrap_or_else(|| {
                Err(ShellError::Other(anyhow::anyhow!(
                    "job '{name}' did not complete"
                )))
            });
            (name, result)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RawConfigFile;

    #[test]
    fn unreachable_response_uses_host_rc() {
        let response = unreachable_response(&Command::new("uptime"), "10.9.9.9");
        assert_eq!(response.rc(), Some(HOST_UNREACHABLE_RC));
        assert_eq!(
            response.stdout(),
            "Error: Unable to reach host, please ensure the host: 10.9.9.9 is available."
        );
    }

    #[test]
    fn ping_host_is_a_single_quoted_word() {
        assert_eq!(ping_command("10.0.0.1").cmd, "ping -c 1 -w 4 '10.0.0.1'");
        assert_eq!(
            ping_command("h; touch x").cmd,
            "ping -c 1 -w 4 'h; touch x'"
        );
        assert_eq!(ping_command("it's").cmd, r"ping -c 1 -w 4 'it'\''s'");
    }

    #[test]
    fn configured_commands_map_to_targets() {
        let mut raw = RawConfigFile::default();
        raw.host.insert(
            "ms1".to_string(),
            HostConfig {
                add_linux_timeout: true,
                ..HostConfig::new("10.0.0.1")
            },
        );
        raw.command.insert(
            "remote".to_string(),
            CommandConfig {
                cmd: "uptime".to_string(),
                host: Some("ms1".to_string()),
                ping_host: true,
                ..CommandConfig::default()
            },
        );
        raw.command.insert(
            "local".to_string(),
            CommandConfig {
                cmd: "true".to_string(),
                ..CommandConfig::default()
            },
        );
        let cfg = ConfigFile::try_from(raw).unwrap();

        let jobs = jobs_from_config(&cfg).unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].name, "local");
        assert!(matches!(jobs[0].target, Target::Local(_)));
        match &jobs[1].target {
            Target::Remote {
                host,
                options,
                ping_host,
            } => {
                assert_eq!(host.address, "10.0.0.1");
                assert!(options.add_linux_timeout);
                assert!(*ping_host);
            }
            other => panic!("expected remote target, got {other:?}"),
        }
    }

    #[test]
    fn undefined_host_name_is_unknown_host() {
        let cfg = ConfigFile::default();
        let command = CommandConfig {
            cmd: "uptime".to_string(),
            host: Some("ghost".to_string()),
            ..CommandConfig::default()
        };
        assert!(matches!(
            Target::for_command(&cfg, &command),
            Err(ShellError::UnknownHost(name)) if name == "ghost"
        ));
    }
}
