// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, ShellError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::ShellError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.defaults, raw.host, raw.command))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_defaults(cfg)?;
    validate_hosts(cfg)?;
    validate_commands(cfg)?;
    Ok(())
}

fn validate_defaults(cfg: &RawConfigFile) -> Result<()> {
    let defaults = &cfg.defaults;

    if defaults.timeout == 0 {
        return Err(ShellError::ConfigError(
            "[defaults].timeout must be >= 1 (got 0)".to_string(),
        ));
    }
    if defaults.retry_limit == Some(0) {
        return Err(ShellError::ConfigError(
            "[defaults].retry_limit must be >= 1 (got 0)".to_string(),
        ));
    }
    if Duration::try_from_secs_f64(defaults.retry_jitter).is_err() {
        return Err(ShellError::ConfigError(format!(
            "[defaults].retry_jitter must be a non-negative number of seconds (got {})",
            defaults.retry_jitter
        )));
    }

    Ok(())
}

fn validate_hosts(cfg: &RawConfigFile) -> Result<()> {
    for (name, host) in cfg.host.iter() {
        if host.address.trim().is_empty() {
            return Err(ShellError::ConfigError(format!(
                "host '{}' has an empty `address`",
                name
            )));
        }
    }
    Ok(())
}

fn validate_commands(cfg: &RawConfigFile) -> Result<()> {
    for (name, command) in cfg.command.iter() {
        if command.cmd.trim().is_empty() {
            return Err(ShellError::ConfigError(format!(
                "command '{}' has an empty `cmd`",
                name
            )));
        }
        if command.timeout == Some(0) {
            return Err(ShellError::ConfigError(format!(
                "command '{}' has `timeout = 0`; it must be >= 1",
                name
            )));
        }
        if command.retry_limit == Some(0) {
            return Err(ShellError::ConfigError(format!(
                "command '{}' has `retry_limit = 0`; it must be >= 1",
                name
            )));
        }
        if let Some(host) = &command.host {
            if !cfg.host.contains_key(host) {
                return Err(ShellError::ConfigError(format!(
                    "command '{}' has unknown host '{}' in `host`",
                    name, host
                )));
            }
        }
    }
    Ok(())
}
