// src/shell/mod.rs

//! Command descriptor and captured result.
//!
//! - [`command`] holds the command text, its retry/timeout policy, and the
//!   per-attempt hooks the executors call around every attempt.
//! - [`response`] holds what one attempt produced.

pub mod command;
pub mod response;

pub use command::{Command, DEFAULT_RETRY_JITTER, DEFAULT_TIMEOUT};
pub use response::Response;
