// src/exec/executor.rs

//! The attempt loop shared by local and remote execution.

use std::future::Future;

use tokio::process::Child;
use tracing::error;

use crate::errors::{Result, report_exception};
use crate::exec::watchdog::Watchdog;
use crate::shell::{Command, Response};
use crate::types::BoxFuture;

/// Drives a [`Command`] until it reports itself finished.
///
/// Implementors provide [`Executor::execute_command`], which runs one
/// physical attempt. It must absorb the expected failure classes (timeout,
/// closed connection, spawn/wait errors) into the command's response;
/// anything it returns as `Err` escapes `execute()` without a retry.
pub trait Executor: Send {
    /// Label recorded on the command as the place it ran.
    fn execution_host(&self) -> &str;

    fn command(&self) -> &Command;

    fn command_mut(&mut self) -> &mut Command;

    fn watchdog_mut(&mut self) -> &mut Watchdog;

    /// Run one attempt of the command.
    fn execute_command(&mut self) -> BoxFuture<'_, Result<()>>;

    /// Run the command, retrying as its policy allows, and return the
    /// response of the last attempt.
    fn execute(&mut self) -> BoxFuture<'_, Result<Response>> {
        Box::pin(async move {
            let host = self.execution_host().to_string();
            let command = self.command_mut();
            command.initialize_attributes();
            command.execution_host = Some(host);
            command.finished = false;

            while !self.command().finished {
                self.command_mut().pre_execute();
                self.execute_command().await?;
                self.command_mut().post_execute().await?;
            }

            Ok(self.command().response().clone())
        })
    }

    /// Arm the watchdog for the current attempt.
    fn start_timer<T, F, Fut>(&mut self, target: T, timeout_killer: F)
    where
        Self: Sized,
        T: Send + 'static,
        F: FnOnce(T) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let timeout = self.command().current_timeout;
        self.watchdog_mut().start(timeout, target, timeout_killer);
    }

    /// Kill `proc` if it is still running and settle the watchdog.
    ///
    /// Never fails; a kill error is logged and reported. Calling it again on
    /// an already reaped process or settled watchdog is a no-op.
    fn command_cleanup<'a>(&'a mut self, proc: Option<&'a mut Child>) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if let Some(child) = proc {
                if let Ok(None) = child.try_wait() {
                    if let Err(err) = child.kill().await {
                        error!(error = %err, "failed to kill process during cleanup");
                        report_exception("Exception raised while trying to kill process", &err);
                    }
                }
            }

            self.watchdog_mut().settle().await;
        })
    }
}
