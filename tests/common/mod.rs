#![allow(dead_code)]

use std::time::Duration;

use shellexec::shell::Command;

pub use shellexec_test_utils::builders::{CommandConfigBuilder, ConfigFileBuilder};
pub use shellexec_test_utils::fake_connection::{FakeConnection, FakeReply};
pub use shellexec_test_utils::{init_tracing, with_timeout};

/// A command with no pause between attempts.
pub fn quick_command(cmd: &str, timeout_secs: u64) -> Command {
    Command::new(cmd)
        .with_timeout(Duration::from_secs(timeout_secs))
        .with_retry_jitter(Duration::ZERO)
}
