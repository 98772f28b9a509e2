// src/remote/ssh.rs

//! [`RemoteConnection`] over the OpenSSH client.
//!
//! Each command runs as its own `ssh` process. The connection object carries
//! the host settings plus a close signal; closing it kills every channel
//! that is still running.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tokio::sync::watch;
use tracing::debug;

use crate::config::HostConfig;
use crate::remote::connection::{ChannelOutput, RemoteChannel, RemoteConnection, TransportError};
use crate::types::BoxFuture;

/// ssh reserves this exit status for its own errors.
const SSH_ERROR_STATUS: i32 = 255;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
pub struct SshConnection {
    id: u64,
    host: HostConfig,
    program: PathBuf,
    leading_args: Vec<String>,
    closed: watch::Sender<bool>,
    timed_out: AtomicBool,
}

impl SshConnection {
    pub fn new(host: HostConfig) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            host,
            program: PathBuf::from("ssh"),
            leading_args: Vec::new(),
            closed,
            timed_out: AtomicBool::new(false),
        }
    }

    /// Use a different client binary, with arguments placed before the
    /// generated ssh arguments.
    pub fn with_program(mut self, program: impl Into<PathBuf>, leading_args: Vec<String>) -> Self {
        self.program = program.into();
        self.leading_args = leading_args;
        self
    }

    pub fn host_config(&self) -> &HostConfig {
        &self.host
    }

    /// Arguments passed to the client for `cmd`.
    pub fn ssh_args(&self, cmd: &str, timeout: Duration, get_pty: bool) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", timeout.as_secs().max(1)),
        ];

        if let Some(port) = self.host.port {
            args.push("-p".to_string());
            args.push(port.to_string());
        }
        if let Some(identity) = &self.host.identity_file {
            args.push("-i".to_string());
            args.push(identity.to_string_lossy().into_owned());
        }
        if let Some(proxy) = &self.host.proxy_command {
            args.push("-o".to_string());
            args.push(format!("ProxyCommand={proxy}"));
        }
        for option in &self.host.options {
            args.push("-o".to_string());
            args.push(option.clone());
        }

        args.push(if get_pty { "-tt" } else { "-T" }.to_string());
        args.push(self.host.destination());
        args.push(cmd.to_string());
        args
    }
}

impl RemoteConnection for SshConnection {
    fn host(&self) -> &str {
        &self.host.address
    }

    fn id(&self) -> u64 {
        self.id
    }

    fn exec_command<'a>(
        &'a self,
        cmd: &'a str,
        timeout: Duration,
        get_pty: bool,
    ) -> BoxFuture<'a, Result<Box<dyn RemoteChannel>, TransportError>> {
        Box::pin(async move {
            if !self.is_transport_active() {
                return Err(TransportError::Closed);
            }

            debug!(connection_id = self.id, host = %self.host.address, cmd = %cmd, "starting ssh channel");

            let child = tokio::process::Command::new(&self.program)
                .args(&self.leading_args)
                .args(self.ssh_args(cmd, timeout, get_pty))
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(TransportError::Spawn)?;

            Ok(Box::new(SshChannel {
                child,
                closed: self.closed.subscribe(),
                proxied: self.host.proxy_command.is_some(),
            }) as Box<dyn RemoteChannel>)
        })
    }

    fn close(&self) {
        self.closed.send_replace(true);
    }

    fn is_transport_active(&self) -> bool {
        !*self.closed.borrow()
    }

    fn mark_timed_out(&self) {
        self.timed_out.store(true, Ordering::Release);
    }

    fn timed_out(&self) -> bool {
        self.timed_out.load(Ordering::Acquire)
    }
}

struct SshChannel {
    child: Child,
    closed: watch::Receiver<bool>,
    proxied: bool,
}

impl RemoteChannel for SshChannel {
    fn close_stdin(&mut self) {
        drop(self.child.stdin.take());
    }

    fn wait(self: Box<Self>) -> BoxFuture<'static, Result<ChannelOutput, TransportError>> {
        Box::pin(async move {
            let SshChannel {
                mut child,
                mut closed,
                proxied,
            } = *self;

            let mut stdout = child.stdout.take();
            let mut stderr = child.stderr.take();

            let run = async {
                tokio::try_join!(
                    child.wait(),
                    read_all(stdout.as_mut()),
                    read_all(stderr.as_mut())
                )
            };

            // Dropping `child` on the close branch kills it (kill_on_drop).
            let (status, stdout, stderr) = tokio::select! {
                res = run => res?,
                _ = close_signal(&mut closed) => return Err(TransportError::Closed),
            };

            match status.code() {
                None => Err(TransportError::Closed),
                Some(SSH_ERROR_STATUS) if proxied && looks_like_proxy_failure(&stderr) => {
                    Err(TransportError::ProxyCommandFailure(stderr.trim().to_string()))
                }
                Some(SSH_ERROR_STATUS) => Err(TransportError::Ssh {
                    status: SSH_ERROR_STATUS,
                    stderr: stderr.trim().to_string(),
                }),
                Some(exit_status) => Ok(ChannelOutput {
                    exit_status,
                    stdout,
                    stderr,
                }),
            }
        })
    }

    fn detach(self: Box<Self>) {
        // The task owns the child, so kill_on_drop never fires for it while
        // the runtime is alive.
        tokio::spawn((*self).run_detached());
    }
}

impl SshChannel {
    /// Reap the client in the background once it exits.
    async fn run_detached(mut self) {
        let pid = self.child.id();
        let mut stdout = self.child.stdout.take();
        let mut stderr = self.child.stderr.take();

        let result = tokio::try_join!(
            self.child.wait(),
            read_all(stdout.as_mut()),
            read_all(stderr.as_mut())
        );
        match result {
            Ok((status, _, _)) => debug!(?pid, ?status, "detached ssh channel exited"),
            Err(err) => debug!(?pid, error = %err, "detached ssh channel failed"),
        }
    }
}

/// Resolves once the connection is closed (or dropped).
async fn close_signal(closed: &mut watch::Receiver<bool>) {
    loop {
        if *closed.borrow_and_update() {
            return;
        }
        if closed.changed().await.is_err() {
            return;
        }
    }
}

async fn read_all<R: AsyncRead + Unpin>(reader: Option<&mut R>) -> std::io::Result<String> {
    let mut buf = Vec::new();
    if let Some(reader) = reader {
        reader.read_to_end(&mut buf).await?;
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn looks_like_proxy_failure(stderr: &str) -> bool {
    ["ProxyCommand", "kex_exchange_identification", "Connection closed by UNKNOWN"]
        .iter()
        .any(|needle| stderr.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scripted(script: &str, host: HostConfig) -> SshConnection {
        SshConnection::new(host).with_program(
            "sh",
            vec!["-c".to_string(), script.to_string(), "ssh".to_string()],
        )
    }

    #[test]
    fn args_carry_host_settings() {
        let host = HostConfig {
            user: Some("root".to_string()),
            port: Some(2222),
            identity_file: Some(PathBuf::from("/keys/id")),
            proxy_command: Some("ssh -W %h:%p jump".to_string()),
            options: vec!["ServerAliveInterval=10".to_string()],
            ..HostConfig::new("10.0.0.7")
        };
        let connection = SshConnection::new(host);
        let args = connection.ssh_args("uptime", Duration::from_secs(30), true);

        assert!(args.windows(2).any(|w| w == ["-p", "2222"]));
        assert!(args.windows(2).any(|w| w == ["-i", "/keys/id"]));
        assert!(args.contains(&"ProxyCommand=ssh -W %h:%p jump".to_string()));
        assert!(args.contains(&"ConnectTimeout=30".to_string()));
        assert!(args.contains(&"ServerAliveInterval=10".to_string()));
        assert!(args.contains(&"-tt".to_string()));
        assert_eq!(&args[args.len() - 2..], ["root@10.0.0.7", "uptime"]);
    }

    #[test]
    fn close_is_idempotent() {
        let connection = SshConnection::new(HostConfig::new("h"));
        assert!(connection.is_transport_active());
        connection.close();
        connection.close();
        assert!(!connection.is_transport_active());
    }

    #[tokio::test]
    async fn channel_collects_status_and_output() {
        let connection = scripted("echo out; echo err >&2; exit 3", HostConfig::new("h"));
        let mut channel = connection
            .exec_command("ignored", Duration::from_secs(5), false)
            .await
            .unwrap();
        channel.close_stdin();
        let output = channel.wait().await.unwrap();

        assert_eq!(output.exit_status, 3);
        assert_eq!(output.combined(), "out\nerr\n");
    }

    #[tokio::test]
    async fn close_aborts_running_channel() {
        let connection = std::sync::Arc::new(scripted("exec sleep 10", HostConfig::new("h")));
        let channel = connection
            .exec_command("ignored", Duration::from_secs(5), false)
            .await
            .unwrap();

        let closer = std::sync::Arc::clone(&connection);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            closer.close();
        });

        let result = tokio::time::timeout(Duration::from_secs(3), channel.wait())
            .await
            .expect("close should abort the channel");
        assert!(matches!(result, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn exit_255_through_proxy_is_proxy_failure() {
        let host = HostConfig {
            proxy_command: Some("nc jump 22".to_string()),
            ..HostConfig::new("h")
        };
        let connection = scripted(
            "echo 'kex_exchange_identification: Connection closed by remote host' >&2; exit 255",
            host,
        );
        let channel = connection
            .exec_command("ignored", Duration::from_secs(5), false)
            .await
            .unwrap();

        assert!(matches!(
            channel.wait().await,
            Err(TransportError::ProxyCommandFailure(_))
        ));
    }

    #[tokio::test]
    async fn closed_connection_refuses_new_commands() {
        let connection = scripted("true", HostConfig::new("h"));
        connection.close();
        let result = connection
            .exec_command("ignored", Duration::from_secs(5), false)
            .await;
        assert!(matches!(result, Err(TransportError::Closed)));
    }
}
