// src/exec/killers.rs

//! Watchdog callbacks.
//!
//! Each killer first claims the attempt by moving its [`AttemptCell`] to
//! `TimedOut`. If the main flow already recorded a result the claim fails
//! and the killer does nothing, so a late watchdog can never overwrite a
//! natural completion.

use std::sync::Arc;

use tracing::debug;

use crate::exec::local::LocalProcess;
use crate::remote::RemoteConnection;
use crate::types::{AttemptCell, AttemptState};

/// Abort a remote command by closing the connection it runs over.
pub async fn remote_timeout_killer<C: RemoteConnection>(
    connection: Arc<C>,
    attempt: Arc<AttemptCell>,
) {
    if !attempt.try_finish(AttemptState::TimedOut) {
        return;
    }

    connection.mark_timed_out();
    debug!(
        connection_id = connection.id(),
        host = %connection.host(),
        "remote command execution has timed out; connection will be closed"
    );
    connection.close();

    if connection.is_transport_active() {
        debug!(
            connection_id = connection.id(),
            "connection has not closed correctly, re-attempting close operation"
        );
        connection.close();
    }
}

/// Ask the main flow to kill a local process that outlived its timeout.
pub async fn local_timeout_killer(process: Arc<LocalProcess>) {
    debug!(
        pid = ?process.pid(),
        "local command execution has timed out; process will be terminated"
    );

    if process.attempt().try_finish(AttemptState::TimedOut) {
        process.request_kill();
    }
}
