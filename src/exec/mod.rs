// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running commands, locally with
//! `tokio::process::Command` or over a remote connection, and turning every
//! expected failure into a return code on the command's response.
//!
//! - [`executor`] owns the attempt loop shared by both executors.
//! - [`local`] runs commands as local subprocesses.
//! - [`remote`] runs commands over a `RemoteConnection`.
//! - [`watchdog`] is the one-shot timeout timer armed for every attempt.
//! - [`killers`] holds the callbacks the watchdog runs when it fires.

pub mod executor;
pub mod killers;
pub mod local;
pub mod remote;
pub mod watchdog;

pub use executor::Executor;
pub use killers::{local_timeout_killer, remote_timeout_killer};
pub use local::{LocalExecutor, LocalProcess};
pub use remote::{RemoteExecutor, RemoteOptions};
pub use watchdog::Watchdog;
