// src/exec/watchdog.rs

//! One-shot timeout timer.
//!
//! The watchdog is a spawned Tokio task that sleeps for the attempt's
//! timeout and then runs a kill callback. Being a Tokio task it never keeps
//! the process alive on its own.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

/// At most one live timer per executor.
///
/// Once [`Watchdog::settle`] returns, the timer has either been cancelled
/// before firing or has fired and its callback has run to completion.
#[derive(Debug, Default)]
pub struct Watchdog {
    handle: Option<JoinHandle<()>>,
    fired: Arc<AtomicBool>,
}

impl Watchdog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer. `killer(target)` runs if `timeout` elapses first.
    ///
    /// Any previous timer is aborted first.
    pub fn start<T, F, Fut>(&mut self, timeout: Duration, target: T, killer: F)
    where
        T: Send + 'static,
        F: FnOnce(T) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if let Some(previous) = self.handle.take() {
            previous.abort();
        }

        let fired = Arc::new(AtomicBool::new(false));
        self.fired = Arc::clone(&fired);

        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            fired.store(true, Ordering::Release);
            debug!(timeout_secs = timeout.as_secs_f64(), "watchdog fired");
            killer(target).await;
        }));
    }

    pub fn is_alive(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Cancel the timer if it has not fired, or wait for a running kill
    /// callback to finish. Safe to call any number of times.
    pub async fn settle(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        if handle.is_finished() {
            return;
        }

        // A fired callback is mid-flight; let it finish its kill/close.
        if !self.has_fired() {
            handle.abort();
        }
        let _ = handle.await;
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if !self.fired.load(Ordering::Acquire) {
                handle.abort();
            }
        }
    }
}
