// src/shell/command.rs

//! Command descriptor: the text to run, its retry/timeout policy, and the
//! mutable state of the attempt currently in flight.

use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::errors::{Result, ShellError};
use crate::shell::response::Response;
use crate::types::Outcome;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_RETRY_JITTER: Duration = Duration::from_secs(4);

/// A single shell invocation plus its retry policy.
///
/// One `Command` is built per logical invocation and can be executed more
/// than once; [`Command::initialize_attributes`] resets it at the start of
/// every `execute()` and [`Command::pre_execute`] at the start of every
/// physical attempt.
#[derive(Debug, Clone)]
pub struct Command {
    /// The literal command line.
    pub cmd: String,
    /// Log the command and its result at debug level.
    pub log_cmd: bool,
    /// Time allowed before the watchdog fires; defaults to 60s.
    pub timeout: Option<Duration>,
    /// Retry after a timeout, closed connection or exception.
    pub allow_retries: bool,
    /// Fail `execute()` with [`ShellError::CommandFailed`] on a non-zero rc.
    pub check_pass: bool,
    /// Working directory for local execution.
    pub cwd: Option<PathBuf>,
    /// Source a virtualenv activation script before the command (local only).
    pub activate_virtualenv: bool,
    /// Maximum number of attempts; defaults to 2 with retries, 1 without.
    pub retry_limit: Option<u32>,
    /// Start the command and return without waiting for a result.
    pub fire_and_forget: bool,
    /// Upper bound of the random pause between attempts.
    pub retry_jitter: Duration,

    pub retry_count: u32,
    pub execution_host: Option<String>,
    pub finished: bool,
    pub current_timeout: Duration,
    response: Response,
}

impl Command {
    pub fn new(cmd: impl Into<String>) -> Self {
        let cmd = cmd.into();
        Self {
            response: Response::new(cmd.clone()),
            cmd,
            log_cmd: true,
            timeout: None,
            allow_retries: true,
            check_pass: false,
            cwd: None,
            activate_virtualenv: false,
            retry_limit: None,
            fire_and_forget: false,
            retry_jitter: DEFAULT_RETRY_JITTER,
            retry_count: 1,
            execution_host: None,
            finished: false,
            current_timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_retries(mut self, allow: bool) -> Self {
        self.allow_retries = allow;
        self
    }

    pub fn with_retry_limit(mut self, limit: u32) -> Self {
        self.retry_limit = Some(limit);
        self
    }

    pub fn with_retry_jitter(mut self, jitter: Duration) -> Self {
        self.retry_jitter = jitter;
        self
    }

    pub fn with_check_pass(mut self, check: bool) -> Self {
        self.check_pass = check;
        self
    }

    pub fn with_log_cmd(mut self, log: bool) -> Self {
        self.log_cmd = log;
        self
    }

    pub fn with_activate_virtualenv(mut self, activate: bool) -> Self {
        self.activate_virtualenv = activate;
        self
    }

    pub fn fire_and_forget(mut self, detach: bool) -> Self {
        self.fire_and_forget = detach;
        self
    }

    /// Effective timeout (configured or default).
    pub fn timeout(&self) -> Duration {
        self.timeout.unwrap_or(DEFAULT_TIMEOUT)
    }

    /// Effective attempt limit.
    pub fn retry_limit(&self) -> u32 {
        self.retry_limit
            .unwrap_or(if self.allow_retries { 2 } else { 1 })
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    /// Reset to the initial state before (re-)executing the command.
    pub fn initialize_attributes(&mut self) {
        self.retry_count = 1;
        self.execution_host = None;

        if self.retry_limit.is_none() {
            self.retry_limit = Some(self.retry_limit());
        }
        if self.timeout.is_none() {
            self.timeout = Some(DEFAULT_TIMEOUT);
        }

        self.reset_attempt();
    }

    fn reset_attempt(&mut self) {
        self.current_timeout = self.timeout();
        self.finished = false;
        self.response = Response::new(self.cmd.clone());
    }

    /// Setup before each physical attempt, including retries.
    pub fn pre_execute(&mut self) {
        self.reset_attempt();

        if self.retry_count > 1 {
            self.current_timeout = self.current_timeout.saturating_mul(2);
            debug!(
                timeout_secs = self.current_timeout.as_secs_f64(),
                "increasing command execution timeout for next execution attempt"
            );
        }

        if self.log_cmd {
            debug!(
                host = self.execution_host.as_deref().unwrap_or("unknown"),
                cmd = %self.cmd,
                timeout_secs = self.current_timeout.as_secs_f64(),
                "executing command"
            );
        }

        self.response.mark_started();
    }

    /// Bookkeeping after each physical attempt.
    ///
    /// Decides whether the command is finished or gets another attempt. The
    /// only error it returns is the `check_pass` failure.
    pub async fn post_execute(&mut self) -> Result<()> {
        self.response.mark_ended();

        if self.response.outcome().is_failure() {
            self.log_error_result();
            if self.can_retry() {
                self.sleep_between_attempts().await;
            }
        } else {
            if self.log_cmd {
                debug!(
                    cmd = %self.cmd,
                    host = self.execution_host.as_deref().unwrap_or("unknown"),
                    elapsed_secs = self.elapsed_secs(),
                    rc = ?self.response.rc(),
                    stdout = %self.response.stdout(),
                    "executed command"
                );
            }
            self.finished = true;
        }

        if self.finished && self.check_pass {
            self.check_command_passed()?;
        }

        Ok(())
    }

    fn check_command_passed(&self) -> Result<()> {
        let rc = self.response.rc();
        if rc != Some(0) {
            return Err(ShellError::CommandFailed {
                rc,
                cmd: self.cmd.clone(),
            });
        }
        Ok(())
    }

    /// Consume one retry if the policy allows it; otherwise mark finished.
    fn can_retry(&mut self) -> bool {
        if !self.allow_retries || self.retry_count >= self.retry_limit() {
            self.finished = true;
            false
        } else {
            self.retry_count += 1;
            true
        }
    }

    async fn sleep_between_attempts(&self) {
        if self.retry_jitter.is_zero() {
            return;
        }
        let pause = Duration::try_from_secs_f64(
            self.retry_jitter.as_secs_f64() * rand::random::<f64>(),
        )
        .unwrap_or(self.retry_jitter);
        debug!(
            sleep_secs = pause.as_secs_f64(),
            "sleeping before re-attempting"
        );
        tokio::time::sleep(pause).await;
    }

    fn log_error_result(&self) {
        match self.response.outcome() {
            Outcome::TimedOut => debug!(
                attempt = self.retry_count,
                retry_limit = self.retry_limit(),
                timeout_secs = self.current_timeout.as_secs_f64(),
                "process exceeded timeout and was forcibly terminated"
            ),
            Outcome::ConnectionClosed => debug!(
                attempt = self.retry_count,
                retry_limit = self.retry_limit(),
                "process terminated unexpectedly"
            ),
            Outcome::ExecutionError(message) => debug!(
                attempt = self.retry_count,
                retry_limit = self.retry_limit(),
                error = %message,
                "process raised an exception"
            ),
            _ => {}
        }

        debug!(
            cmd = %self.cmd,
            stdout = %self.response.stdout(),
            rc = ?self.response.rc(),
            elapsed_secs = self.elapsed_secs(),
            "command attempt failed"
        );
    }

    fn elapsed_secs(&self) -> f64 {
        self.response
            .elapsed_time()
            .map(|d| d.as_secs_f64())
            .unwrap_or_default()
    }
}

impl From<&str> for Command {
    fn from(cmd: &str) -> Self {
        Command::new(cmd)
    }
}

impl From<String> for Command {
    fn from(cmd: String) -> Self {
        Command::new(cmd)
    }
}
