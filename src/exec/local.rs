// src/exec/local.rs

//! Local subprocess execution.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::process::Child;
use tokio::sync::Notify;
use tracing::{debug, error};

use crate::errors::{Result, report_exception};
use crate::exec::executor::Executor;
use crate::exec::killers::local_timeout_killer;
use crate::exec::watchdog::Watchdog;
use crate::shell::Command;
use crate::types::{AttemptCell, AttemptState, BoxFuture};

pub const DEFAULT_SHELL: &str = "/bin/sh";
const LOCALHOST: &str = "localhost";

/// Handle on a running local process shared with the watchdog.
///
/// The watchdog never touches the child directly: it claims the attempt and
/// then asks the main flow, which owns the `Child`, to kill it.
#[derive(Debug)]
pub struct LocalProcess {
    pid: Option<u32>,
    attempt: AttemptCell,
    kill: Notify,
}

impl LocalProcess {
    pub fn new(pid: Option<u32>) -> Self {
        Self {
            pid,
            attempt: AttemptCell::running(),
            kill: Notify::new(),
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn attempt(&self) -> &AttemptCell {
        &self.attempt
    }

    pub fn request_kill(&self) {
        self.kill.notify_one();
    }

    async fn kill_requested(&self) {
        self.kill.notified().await;
    }
}

/// Runs a [`Command`] as `sh -c` on this machine.
///
/// stdout and stderr are merged into one stream, as if the command had been
/// run with `2>&1`.
pub struct LocalExecutor {
    command: Command,
    shell: PathBuf,
    activate_script: Option<PathBuf>,
    watchdog: Watchdog,
}

impl LocalExecutor {
    pub fn new(command: impl Into<Command>) -> Self {
        Self {
            command: command.into(),
            shell: PathBuf::from(DEFAULT_SHELL),
            activate_script: None,
            watchdog: Watchdog::new(),
        }
    }

    pub fn with_shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Script sourced when the command asks for `activate_virtualenv`.
    pub fn with_activate_script(mut self, script: impl Into<PathBuf>) -> Self {
        self.activate_script = Some(script.into());
        self
    }

    pub fn into_command(self) -> Command {
        self.command
    }

    /// The script handed to `sh -c`.
    pub fn script(&self) -> String {
        let mut script = String::from("exec 2>&1\n");
        if self.command.activate_virtualenv {
            let activate = self
                .activate_script
                .clone()
                .unwrap_or_else(default_activate_script);
            script.push_str(&format!(". {}\n", shell_quote(&activate.to_string_lossy())));
        }
        script.push_str(&self.command.cmd);
        script
    }

    async fn run(&mut self) {
        let mut cmd = tokio::process::Command::new(&self.shell);
        cmd.arg("-c")
            .arg(self.script())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(!self.command.fire_and_forget);

        if let Some(cwd) = &self.command.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                self.record_exception(&err);
                self.command_cleanup(None).await;
                return;
            }
        };

        let pid = child.id();
        self.command.response_mut().set_pid(pid);

        if self.command.fire_and_forget {
            debug!(?pid, cmd = %self.command.cmd, "started detached local command");
            self.command.response_mut().mark_detached();
            self.command_cleanup(None).await;
            return;
        }

        let process = Arc::new(LocalProcess::new(pid));
        self.start_timer(Arc::clone(&process), local_timeout_killer);

        match wait_for_exit(&mut child, &process).await {
            Ok(Some((rc, output))) => {
                if process.attempt().try_finish(AttemptState::Completed) {
                    self.command.response_mut().complete(rc, output);
                } else {
                    self.command.response_mut().mark_timed_out();
                }
            }
            Ok(None) => self.command.response_mut().mark_timed_out(),
            Err(err) => {
                if process.attempt().try_finish(AttemptState::Exception) {
                    self.record_exception(&err);
                } else {
                    self.command.response_mut().mark_timed_out();
                }
            }
        }

        self.command_cleanup(Some(&mut child)).await;
    }

    fn record_exception(&mut self, err: &std::io::Error) {
        error!(error = %err, cmd = %self.command.cmd, "local command failed");
        report_exception(
            &format!(
                "Exception raised while running local command: '{}'",
                self.command.cmd
            ),
            err,
        );
        self.command.response_mut().mark_execution_error(err.to_string());
    }
}

impl Executor for LocalExecutor {
    fn execution_host(&self) -> &str {
        LOCALHOST
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

/// Wait for natural exit, or for the watchdog to ask for a kill.
///
/// Returns `None` when the kill was requested; the child has been signalled
/// but not yet reaped.
async fn wait_for_exit(
    child: &mut Child,
    process: &LocalProcess,
) -> std::io::Result<Option<(i32, String)>> {
    let mut stdout = child.stdout.take();

    let natural = async {
        let mut buf = Vec::new();
        let read = async {
            if let Some(out) = stdout.as_mut() {
                out.read_to_end(&mut buf).await?;
            }
            Ok::<_, std::io::Error>(())
        };
        let (status, ()) = tokio::try_join!(child.wait(), read)?;
        Ok::<_, std::io::Error>((
            status.code().unwrap_or(-1),
            String::from_utf8_lossy(&buf).into_owned(),
        ))
    };

    tokio::select! {
        res = natural => return res.map(Some),
        _ = process.kill_requested() => {}
    }

    child.start_kill()?;
    Ok(None)
}

/// `$VIRTUAL_ENV/bin/activate`, else `activate` next to the running binary.
fn default_activate_script() -> PathBuf {
    if let Some(venv) = std::env::var_os("VIRTUAL_ENV") {
        return PathBuf::from(venv).join("bin").join("activate");
    }
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("activate")))
        .unwrap_or_else(|| PathBuf::from("activate"))
}

pub(crate) fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}
