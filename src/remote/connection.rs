// src/remote/connection.rs

//! Remote session boundary.
//!
//! The executor never opens sessions itself; it is handed a connection that
//! something else established and only runs one command over it, closing it
//! afterwards. Tests substitute a scripted fake for [`SshConnection`].
//!
//! [`SshConnection`]: crate::remote::ssh::SshConnection

use std::time::Duration;

use thiserror::Error;

use crate::types::BoxFuture;

/// Failures raised by the transport while running a remote command.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The proxy tunnel broke; it can leave the socket spinning if not torn
    /// down, so it is reported separately.
    #[error("proxy command failed: {0}")]
    ProxyCommandFailure(String),

    #[error("connection is closed")]
    Closed,

    #[error("ssh exited with status {status}: {stderr}")]
    Ssh { status: i32, stderr: String },

    #[error("failed to start remote command: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("I/O error on remote channel: {0}")]
    Io(#[from] std::io::Error),
}

/// What a remote command produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelOutput {
    pub exit_status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ChannelOutput {
    /// stdout followed by stderr.
    pub fn combined(&self) -> String {
        let mut out = String::with_capacity(self.stdout.len() + self.stderr.len());
        out.push_str(&self.stdout);
        out.push_str(&self.stderr);
        out
    }
}

/// A command started over a connection.
pub trait RemoteChannel: Send {
    /// No input is ever sent to remote commands.
    fn close_stdin(&mut self);

    /// Wait for the exit status and drain stdout/stderr.
    fn wait(self: Box<Self>) -> BoxFuture<'static, Result<ChannelOutput, TransportError>>;

    /// Let the command run to completion on its own. Closing the connection
    /// afterwards must not abort it.
    fn detach(self: Box<Self>);
}

/// An established remote session.
pub trait RemoteConnection: Send + Sync + 'static {
    fn host(&self) -> &str;

    fn id(&self) -> u64;

    fn exec_command<'a>(
        &'a self,
        cmd: &'a str,
        timeout: Duration,
        get_pty: bool,
    ) -> BoxFuture<'a, Result<Box<dyn RemoteChannel>, TransportError>>;

    /// Close the session, aborting any command running over it.
    ///
    /// Must tolerate being called on an already-closed connection.
    fn close(&self);

    /// True while the underlying transport is still up.
    fn is_transport_active(&self) -> bool;

    fn mark_timed_out(&self);

    fn timed_out(&self) -> bool;
}
