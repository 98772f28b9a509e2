#![allow(dead_code)]

use shellexec::config::{CommandConfig, ConfigFile, HostConfig, RawConfigFile};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_host(mut self, name: &str, host: HostConfig) -> Self {
        self.config.host.insert(name.to_string(), host);
        self
    }

    pub fn with_command(mut self, name: &str, command: CommandConfig) -> Self {
        self.config.command.insert(name.to_string(), command);
        self
    }

    pub fn with_default_timeout(mut self, secs: u64) -> Self {
        self.config.defaults.timeout = secs;
        self
    }

    /// Tests rarely want the random pause between attempts.
    pub fn without_jitter(mut self) -> Self {
        self.config.defaults.retry_jitter = 0.0;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `CommandConfig`.
pub struct CommandConfigBuilder {
    command: CommandConfig,
}

impl CommandConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            command: CommandConfig {
                cmd: cmd.to_string(),
                ..CommandConfig::default()
            },
        }
    }

    pub fn on_host(mut self, host: &str) -> Self {
        self.command.host = Some(host.to_string());
        self
    }

    pub fn timeout(mut self, secs: u64) -> Self {
        self.command.timeout = Some(secs);
        self
    }

    pub fn retries(mut self, allow: bool) -> Self {
        self.command.allow_retries = Some(allow);
        self
    }

    pub fn retry_limit(mut self, limit: u32) -> Self {
        self.command.retry_limit = Some(limit);
        self
    }

    pub fn check_pass(mut self, val: bool) -> Self {
        self.command.check_pass = val;
        self
    }

    pub fn fire_and_forget(mut self, val: bool) -> Self {
        self.command.fire_and_forget = val;
        self
    }

    pub fn ping_host(mut self, val: bool) -> Self {
        self.command.ping_host = val;
        self
    }

    pub fn build(self) -> CommandConfig {
        self.command
    }
}
