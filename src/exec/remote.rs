// src/exec/remote.rs

//! Execution over an established remote connection.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};

use crate::errors::{Result, report_exception};
use crate::exec::executor::Executor;
use crate::exec::killers::remote_timeout_killer;
use crate::exec::watchdog::Watchdog;
use crate::remote::{ChannelOutput, RemoteConnection, TransportError};
use crate::shell::Command;
use crate::types::{AttemptCell, AttemptState, BoxFuture};

/// Per-executor switches for remote commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoteOptions {
    /// Request a pseudo-terminal. Forced on for `sudo` commands.
    pub get_pty: bool,
    /// Wrap the command in coreutils `timeout` on the remote side, for
    /// commands whose children survive the connection being closed.
    pub add_linux_timeout: bool,
}

/// Runs a [`Command`] over a [`RemoteConnection`].
///
/// The connection is always closed after the attempt, and retries are off
/// by default: a closed connection cannot be reused for another attempt.
pub struct RemoteExecutor<C: RemoteConnection> {
    command: Command,
    connection: Arc<C>,
    execution_host: String,
    options: RemoteOptions,
    watchdog: Watchdog,
}

impl<C: RemoteConnection> RemoteExecutor<C> {
    pub fn new(command: impl Into<Command>, connection: Arc<C>, options: RemoteOptions) -> Self {
        let mut command = command.into();
        command.allow_retries = false;
        let execution_host = connection.host().to_string();

        Self {
            command,
            connection,
            execution_host,
            options,
            watchdog: Watchdog::new(),
        }
    }

    pub fn options(&self) -> RemoteOptions {
        self.options
    }

    pub fn into_command(self) -> Command {
        self.command
    }

    /// The command text actually sent to the remote host.
    pub fn wire_command(&self) -> String {
        if self.options.add_linux_timeout {
            format!(
                "timeout --kill-after={t} {t} {cmd}",
                t = self.command.timeout().as_secs_f64(),
                cmd = self.command.cmd
            )
        } else {
            self.command.cmd.clone()
        }
    }

    fn needs_pty(&self) -> bool {
        let cmd = self.command.cmd.as_str();
        cmd.starts_with("sudo") || cmd.starts_with("/usr/bin/sudo")
    }

    async fn run(&mut self) {
        let attempt = Arc::new(AttemptCell::running());
        self.start_timer(
            (Arc::clone(&self.connection), Arc::clone(&attempt)),
            |(connection, attempt)| remote_timeout_killer(connection, attempt),
        );

        // sudo over ssh refuses to prompt without a tty.
        if !self.options.get_pty && self.needs_pty() {
            self.options.get_pty = true;
        }

        let wire = self.wire_command();
        let result = self.exec_over_connection(&wire, self.command.timeout()).await;

        match result {
            Ok(Some(output)) => {
                if attempt.try_finish(AttemptState::Completed) {
                    self.command
                        .response_mut()
                        .complete(output.exit_status, output.combined());
                }
            }
            Ok(None) => {
                if attempt.try_finish(AttemptState::Completed) {
                    self.command.response_mut().mark_detached();
                }
            }
            Err(TransportError::ProxyCommandFailure(detail)) => {
                error!(
                    connection_id = self.connection.id(),
                    detail = %detail,
                    "proxy tunnel failed; closing connection"
                );
                attempt.try_finish(AttemptState::ConnectionClosed);
            }
            Err(err) => {
                error!(error = %err, cmd = %wire, "remote command failed");
                report_exception(
                    &format!("Exception raised while running remote command: '{wire}'"),
                    &err,
                );
                attempt.try_finish(AttemptState::ConnectionClosed);
            }
        }

        debug!(
            connection_id = self.connection.id(),
            host = %self.connection.host(),
            "attempting to close connection"
        );
        self.connection.close();
        debug!(
            connection_id = self.connection.id(),
            host = %self.connection.host(),
            "connection closed"
        );
        self.command_cleanup(None).await;

        // The watchdog may have claimed the attempt while the main flow was
        // still blocked on the channel.
        match attempt.state() {
            AttemptState::TimedOut => self.command.response_mut().mark_timed_out(),
            AttemptState::ConnectionClosed => {
                self.command.response_mut().mark_connection_closed()
            }
            _ => {}
        }
    }

    async fn exec_over_connection(
        &self,
        wire: &str,
        timeout: Duration,
    ) -> std::result::Result<Option<ChannelOutput>, TransportError> {
        let mut channel = self
            .connection
            .exec_command(wire, timeout, self.options.get_pty)
            .await?;
        channel.close_stdin();

        if self.command.fire_and_forget {
            channel.detach();
            return Ok(None);
        }

        channel.wait().await.map(Some)
    }
}

impl<C: RemoteConnection> Executor for RemoteExecutor<C> {
    fn execution_host(&self) -> &str {
        &self.execution_host
    }

    fn command(&self) -> &Command {
        &self.command
    }

    fn command_mut(&mut self) -> &mut Command {
        &mut self.command
    }

    fn watchdog_mut(&mut self) -> &mut Watchdog {
        &mut self.watchdog
    }

    fn execute_command(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.run().await;
            Ok(())
        })
    }
}
