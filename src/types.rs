// src/types.rs

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};

/// Boxed future used at the trait seams (executors, remote connections).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The command ran past its timeout and was killed.
pub const COMMAND_TIMEOUT_RC: i32 = 177;
/// The remote connection was closed or the remote host went away.
pub const COMMAND_CONNECTION_CLOSED_RC: i32 = 255;
/// Spawning or waiting on a local command raised an error.
pub const COMMAND_EXCEPTION_RC: i32 = 211;
/// Synthetic return code for a remote host that failed the ping check.
pub const HOST_UNREACHABLE_RC: i32 = 5;

/// Result of a single execution attempt, as seen by callers.
///
/// `Response::rc` maps this onto the numeric return-code contract, so code
/// that only cares about integers keeps working; code that wants to know
/// *what* happened matches on this instead.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Outcome {
    /// No attempt has produced a result yet.
    #[default]
    Pending,
    /// The command ran to completion with this exit code.
    Completed { rc: i32 },
    /// Fire-and-forget command; no result was collected.
    Detached,
    TimedOut,
    ConnectionClosed,
    /// Local spawn/wait failure, with the error message.
    ExecutionError(String),
}

impl Outcome {
    pub fn rc(&self) -> Option<i32> {
        match self {
            Outcome::Pending | Outcome::Detached => None,
            Outcome::Completed { rc } => Some(*rc),
            Outcome::TimedOut => Some(COMMAND_TIMEOUT_RC),
            Outcome::ConnectionClosed => Some(COMMAND_CONNECTION_CLOSED_RC),
            Outcome::ExecutionError(_) => Some(COMMAND_EXCEPTION_RC),
        }
    }

    /// Failure classes that are eligible for a retry.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Outcome::TimedOut | Outcome::ConnectionClosed | Outcome::ExecutionError(_)
        )
    }
}

/// Lifecycle of one physical attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AttemptState {
    NotStarted = 0,
    Running = 1,
    Completed = 2,
    TimedOut = 3,
    ConnectionClosed = 4,
    Exception = 5,
}

impl AttemptState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => AttemptState::Running,
            2 => AttemptState::Completed,
            3 => AttemptState::TimedOut,
            4 => AttemptState::ConnectionClosed,
            5 => AttemptState::Exception,
            _ => AttemptState::NotStarted,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, AttemptState::NotStarted | AttemptState::Running)
    }
}

/// Write-once terminal state shared between the main flow and the watchdog.
///
/// Both sides race to move the attempt out of `Running`; the compare-and-set
/// in [`AttemptCell::try_finish`] lets exactly one of them win, and the loser
/// reads back the winner's state.
#[derive(Debug)]
pub struct AttemptCell {
    state: AtomicU8,
}

impl AttemptCell {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(AttemptState::NotStarted as u8),
        }
    }

    /// A cell that is already `Running`.
    pub fn running() -> Self {
        Self {
            state: AtomicU8::new(AttemptState::Running as u8),
        }
    }

    /// `NotStarted -> Running`. Returns false if the attempt already moved on.
    pub fn start(&self) -> bool {
        self.state
            .compare_exchange(
                AttemptState::NotStarted as u8,
                AttemptState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// `Running -> terminal`. Returns true if this call decided the outcome.
    pub fn try_finish(&self, terminal: AttemptState) -> bool {
        debug_assert!(terminal.is_terminal());
        self.state
            .compare_exchange(
                AttemptState::Running as u8,
                terminal as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub fn state(&self) -> AttemptState {
        AttemptState::from_u8(self.state.load(Ordering::Acquire))
    }
}

impl Default for AttemptCell {
    fn default() -> Self {
        Self::new()
    }
}
