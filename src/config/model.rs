// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::errors::{Result, ShellError};
use crate::exec::RemoteOptions;
use crate::exec::local::DEFAULT_SHELL;
use crate::shell::{Command, DEFAULT_RETRY_JITTER};

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [defaults]
/// timeout = 60
/// retry_jitter = 4.0
///
/// [host.netsim]
/// address = "10.0.0.1"
/// user = "netsim"
///
/// [command.uptime]
/// cmd = "uptime"
/// host = "netsim"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub defaults: DefaultsSection,

    /// Named remote hosts from `[host.<name>]`.
    #[serde(default)]
    pub host: BTreeMap<String, HostConfig>,

    /// Named commands from `[command.<name>]`, run by `--batch`.
    #[serde(default)]
    pub command: BTreeMap<String, CommandConfig>,
}

/// Validated configuration. Build it with `ConfigFile::try_from(raw)`.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    defaults: DefaultsSection,
    hosts: BTreeMap<String, HostConfig>,
    commands: BTreeMap<String, CommandConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        defaults: DefaultsSection,
        hosts: BTreeMap<String, HostConfig>,
        commands: BTreeMap<String, CommandConfig>,
    ) -> Self {
        Self {
            defaults,
            hosts,
            commands,
        }
    }

    pub fn defaults(&self) -> &DefaultsSection {
        &self.defaults
    }

    pub fn hosts(&self) -> &BTreeMap<String, HostConfig> {
        &self.hosts
    }

    pub fn commands(&self) -> &BTreeMap<String, CommandConfig> {
        &self.commands
    }

    /// A host defined in `[host.<name>]`.
    pub fn host(&self, name: &str) -> Result<&HostConfig> {
        self.hosts
            .get(name)
            .ok_or_else(|| ShellError::UnknownHost(name.to_string()))
    }

    /// A named host, or an ad-hoc host for a bare address.
    pub fn resolve_host(&self, name_or_address: &str) -> HostConfig {
        self.hosts
            .get(name_or_address)
            .cloned()
            .unwrap_or_else(|| HostConfig::new(name_or_address))
    }
}

/// `[defaults]` section, applied to every command that does not override it.
#[derive(Debug, Clone, Deserialize)]
pub struct DefaultsSection {
    /// Seconds before the watchdog kills a command.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_true")]
    pub allow_retries: bool,

    /// Attempt limit; if `None` it follows `allow_retries` (2 or 1).
    #[serde(default)]
    pub retry_limit: Option<u32>,

    /// Upper bound, in seconds, of the random pause between attempts.
    #[serde(default = "default_retry_jitter")]
    pub retry_jitter: f64,

    #[serde(default = "default_true")]
    pub log_cmd: bool,

    /// Shell used for local commands.
    #[serde(default = "default_shell")]
    pub shell: PathBuf,

    /// Activation script for `activate_virtualenv`; if `None` it is derived
    /// from `$VIRTUAL_ENV` or the binary's directory.
    #[serde(default)]
    pub activate_script: Option<PathBuf>,
}

fn default_timeout() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_retry_jitter() -> f64 {
    4.0
}

fn default_shell() -> PathBuf {
    PathBuf::from(DEFAULT_SHELL)
}

impl Default for DefaultsSection {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            allow_retries: true,
            retry_limit: None,
            retry_jitter: default_retry_jitter(),
            log_cmd: true,
            shell: default_shell(),
            activate_script: None,
        }
    }
}

impl DefaultsSection {
    /// A command carrying these defaults.
    pub fn command(&self, cmd: impl Into<String>) -> Command {
        let mut command = Command::new(cmd)
            .with_timeout(Duration::from_secs(self.timeout))
            .with_retries(self.allow_retries)
            .with_retry_jitter(
                Duration::try_from_secs_f64(self.retry_jitter).unwrap_or(DEFAULT_RETRY_JITTER),
            )
            .with_log_cmd(self.log_cmd);
        command.retry_limit = self.retry_limit;
        command
    }
}

/// `[host.<name>]` section.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct HostConfig {
    pub address: String,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub identity_file: Option<PathBuf>,

    /// Passed through as ssh's `ProxyCommand`.
    #[serde(default)]
    pub proxy_command: Option<String>,

    /// Extra `-o` options, e.g. `"ServerAliveInterval=10"`.
    #[serde(default)]
    pub options: Vec<String>,

    #[serde(default)]
    pub get_pty: bool,

    #[serde(default)]
    pub add_linux_timeout: bool,
}

impl HostConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            user: None,
            port: None,
            identity_file: None,
            proxy_command: None,
            options: Vec::new(),
            get_pty: false,
            add_linux_timeout: false,
        }
    }

    /// `user@address`, or just the address.
    pub fn destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{user}@{}", self.address),
            None => self.address.clone(),
        }
    }

    pub fn remote_options(&self) -> RemoteOptions {
        RemoteOptions {
            get_pty: self.get_pty,
            add_linux_timeout: self.add_linux_timeout,
        }
    }
}

/// `[command.<name>]` section.
///
/// `None` fields fall back to `[defaults]` (or, for the remote switches, to
/// the host's settings).
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CommandConfig {
    pub cmd: String,

    /// Name of a `[host.<name>]` entry; omitted means run locally.
    #[serde(default)]
    pub host: Option<String>,

    #[serde(default)]
    pub timeout: Option<u64>,

    #[serde(default)]
    pub cwd: Option<PathBuf>,

    #[serde(default)]
    pub allow_retries: Option<bool>,

    #[serde(default)]
    pub retry_limit: Option<u32>,

    #[serde(default)]
    pub check_pass: bool,

    #[serde(default)]
    pub fire_and_forget: bool,

    #[serde(default)]
    pub activate_virtualenv: bool,

    #[serde(default)]
    pub log_cmd: Option<bool>,

    #[serde(default)]
    pub get_pty: Option<bool>,

    #[serde(default)]
    pub add_linux_timeout: Option<bool>,

    /// Ping the host before connecting.
    #[serde(default)]
    pub ping_host: bool,
}

impl CommandConfig {
    /// Build the `Command`, filling gaps from `defaults`.
    pub fn to_command(&self, defaults: &DefaultsSection) -> Command {
        let mut command = defaults.command(self.cmd.clone());

        if let Some(timeout) = self.timeout {
            command.timeout = Some(Duration::from_secs(timeout));
        }
        if let Some(allow) = self.allow_retries {
            command.allow_retries = allow;
        }
        if self.retry_limit.is_some() {
            command.retry_limit = self.retry_limit;
        }
        if let Some(log) = self.log_cmd {
            command.log_cmd = log;
        }
        command.cwd = self.cwd.clone();
        command.check_pass = self.check_pass;
        command.fire_and_forget = self.fire_and_forget;
        command.activate_virtualenv = self.activate_virtualenv;
        command
    }

    /// Remote switches: command-level values override the host's.
    pub fn remote_options(&self, host: &HostConfig) -> RemoteOptions {
        let base = host.remote_options();
        RemoteOptions {
            get_pty: self.get_pty.unwrap_or(base.get_pty),
            add_linux_timeout: self.add_linux_timeout.unwrap_or(base.add_linux_timeout),
        }
    }
}
