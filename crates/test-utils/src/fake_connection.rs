use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use shellexec::remote::{ChannelOutput, RemoteChannel, RemoteConnection, TransportError};
use shellexec::types::BoxFuture;

static NEXT_ID: AtomicU64 = AtomicU64::new(1000);

/// What the fake does when a command is run over it.
#[derive(Debug, Clone)]
pub enum FakeReply {
    /// Finish immediately with this status and output.
    Output(ChannelOutput),
    /// Never finish on its own; only closing the connection ends it.
    Hang,
    /// `exec_command` itself fails with a broken proxy tunnel.
    ProxyFailure(String),
    /// The channel fails while waiting, as ssh does on a dropped session.
    Dropped,
}

impl FakeReply {
    pub fn ok(stdout: &str) -> Self {
        FakeReply::exit(0, stdout)
    }

    pub fn exit(status: i32, stdout: &str) -> Self {
        FakeReply::Output(ChannelOutput {
            exit_status: status,
            stdout: stdout.to_string(),
            stderr: String::new(),
        })
    }
}

/// One command seen by the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRecord {
    pub cmd: String,
    pub timeout: Duration,
    pub get_pty: bool,
}

/// A scriptable `RemoteConnection`:
/// - records every command run over it,
/// - counts `close()` calls,
/// - can be made to ignore the first close, like a transport whose close is
///   not idempotent.
pub struct FakeConnection {
    id: u64,
    host: String,
    reply: FakeReply,
    sticky_first_close: bool,
    closed: watch::Sender<bool>,
    close_calls: AtomicUsize,
    timed_out: AtomicBool,
    executed: Mutex<Vec<ExecRecord>>,
    detached: Arc<AtomicUsize>,
}

impl FakeConnection {
    pub fn new(host: &str, reply: FakeReply) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            host: host.to_string(),
            reply,
            sticky_first_close: false,
            closed,
            close_calls: AtomicUsize::new(0),
            timed_out: AtomicBool::new(false),
            executed: Mutex::new(Vec::new()),
            detached: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// The first `close()` leaves the transport up.
    pub fn with_sticky_first_close(mut self) -> Self {
        self.sticky_first_close = true;
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> Vec<ExecRecord> {
        self.executed.lock().unwrap().clone()
    }

    /// Channels handed off with `detach()`.
    pub fn detached(&self) -> usize {
        self.detached.load(Ordering::SeqCst)
    }
}

impl RemoteConnection for FakeConnection {
    fn host(&self) -> &str {
        &self.host
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
            self.executed.lock().unwrap().push(ExecRecord {
                cmd: cmd.to_string(),
                timeout,
                get_pty,
            });

            if !self.is_transport_active() {
                return Err(TransportError::Closed);
            }
            if let FakeReply::ProxyFailure(detail) = &self.reply {
                return Err(TransportError::ProxyCommandFailure(detail.clone()));
            }

            Ok(Box::new(FakeChannel {
                reply: self.reply.clone(),
                closed: self.closed.subscribe(),
                detached: Arc::clone(&self.detached),
            }) as Box<dyn RemoteChannel>)
        })
    }

    fn close(&self) {
        let calls = self.close_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.sticky_first_close && calls == 1 {
            return;
        }
        self.closed.send_replace(true);
    }

    fn is_transport_active(&self) -> bool {
        !*self.closed.borrow()
    }

    fn mark_timed_out(&self) {
        self.timed_out.store(true, Ordering::SeqCst);
    }

    fn timed_out(&self) -> bool {
        self.timed_out.load(Ordering::SeqCst)
    }
}

struct FakeChannel {
    reply: FakeReply,
    closed: watch::Receiver<bool>,
    detached: Arc<AtomicUsize>,
}

impl RemoteChannel for FakeChannel {
    fn close_stdin(&mut self) {}

    fn detach(self: Box<Self>) {
        self.detached.fetch_add(1, Ordering::SeqCst);
    }

    fn wait(self: Box<Self>) -> BoxFuture<'static, Result<ChannelOutput, TransportError>> {
        Box::pin(async move {
            let FakeChannel {
                reply, mut closed, ..
            } = *self;
            match reply {
                FakeReply::Output(output) => Ok(output),
                FakeReply::Dropped => Err(TransportError::Ssh {
                    status: 255,
                    stderr: "Connection reset by peer".to_string(),
                }),
                FakeReply::Hang | FakeReply::ProxyFailure(_) => {
                    while !*closed.borrow_and_update() {
                        if closed.changed().await.is_err() {
                            break;
                        }
                    }
                    Err(TransportError::Closed)
                }
            }
        })
    }
}
