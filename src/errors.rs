// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ShellError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Unknown host: {0}")]
    UnknownHost(String),

    #[error(
        "Command was expected to pass, but produced a non-zero return code [{}]; CMD: {cmd}",
        rc.map_or_else(|| "none".to_string(), |rc| rc.to_string())
    )]
    CommandFailed { rc: Option<i32>, cmd: String },

    #[error("Exception occurred while executing command: {0}")]
    Remote(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ShellError>;

/// Report an error that was absorbed rather than propagated.
///
/// Every caught failure path in the executors goes through here so the full
/// source chain ends up in the log even though the caller only sees a return
/// code.
pub fn report_exception(context: &str, err: &(dyn std::error::Error + 'static)) {
    let mut chain = Vec::new();
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push(cause.to_string());
        source = cause.source();
    }

    error!(error = %err, causes = ?chain, "{context}");
}
