// src/shell/response.rs

//! Captured result of one execution attempt.

use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;

use crate::types::Outcome;

/// Return code, output and process id of a single attempt.
///
/// A fresh `Response` is created at the start of every attempt. Executors
/// record into it while the attempt runs; once `execute()` returns it is
/// read-only to the caller.
#[derive(Debug, Clone, Default)]
pub struct Response {
    outcome: Outcome,
    stdout: String,
    pid: Option<u32>,
    command: Option<String>,
    start: Option<Instant>,
    end: Option<Instant>,
    elapsed: Option<Duration>,
}

impl Response {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: Some(command.into()),
            ..Self::default()
        }
    }

    /// A response for a command that completed with `rc`, built without
    /// running anything (e.g. an unreachable host).
    pub fn completed(rc: i32, stdout: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Completed { rc },
            stdout: stdout.into(),
            ..Self::default()
        }
    }

    pub fn rc(&self) -> Option<i32> {
        self.outcome.rc()
    }

    /// Combined stdout/stderr; empty on every failure path.
    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    pub fn start_timestamp(&self) -> Option<Instant> {
        self.start
    }

    pub fn end_timestamp(&self) -> Option<Instant> {
        self.end
    }

    pub fn elapsed_time(&self) -> Option<Duration> {
        self.elapsed
    }

    pub fn ok(&self) -> bool {
        self.rc() == Some(0)
    }

    /// Parse stdout as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.stdout)
    }

    pub fn set_pid(&mut self, pid: Option<u32>) {
        self.pid = pid;
    }

    pub fn complete(&mut self, rc: i32, stdout: String) {
        self.outcome = Outcome::Completed { rc };
        self.stdout = stdout;
    }

    pub fn mark_detached(&mut self) {
        self.outcome = Outcome::Detached;
    }

    pub fn mark_timed_out(&mut self) {
        self.outcome = Outcome::TimedOut;
        self.stdout.clear();
    }

    pub fn mark_connection_closed(&mut self) {
        self.outcome = Outcome::ConnectionClosed;
        self.stdout.clear();
    }

    pub fn mark_execution_error(&mut self, message: impl Into<String>) {
        self.outcome = Outcome::ExecutionError(message.into());
        self.stdout.clear();
    }

    pub(crate) fn mark_started(&mut self) {
        self.start = Some(Instant::now());
    }

    pub(crate) fn mark_ended(&mut self) {
        let now = Instant::now();
        self.end = Some(now);
        self.elapsed = self.start.map(|start| now.duration_since(start));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_marks_clear_output() {
        let mut response = Response::new("echo hi");
        response.complete(0, "hi\n".to_string());
        assert!(response.ok());

        response.mark_timed_out();
        assert_eq!(response.rc(), Some(177));
        assert_eq!(response.stdout(), "");
        assert!(!response.ok());
    }

    #[test]
    fn elapsed_is_measured_from_start() {
        let mut response = Response::new("true");
        assert!(response.elapsed_time().is_none());
        response.mark_started();
        response.mark_ended();
        assert!(response.elapsed_time().is_some());
        assert!(response.end_timestamp() >= response.start_timestamp());
    }

    #[test]
    fn json_parses_stdout() {
        let response = Response::completed(0, r#"{"nodes": 3}"#);
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["nodes"], 3);
    }
}
