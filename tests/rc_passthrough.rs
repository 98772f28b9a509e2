// tests/rc_passthrough.rs

mod common;

use common::{FakeConnection, FakeReply, quick_command};
use proptest::prelude::*;
use shellexec::exec::{Executor, LocalExecutor, RemoteExecutor, RemoteOptions};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    // Real exit codes come back unchanged, sentinel values included: only
    // the outcome, never the number, says whether the command timed out.
    #[test]
    fn test_remote_exit_status_is_returned_verbatim(
        status in 0i32..=255,
        stdout in "[a-z0-9 ]{0,24}",
    ) {
        let rt = runtime();
        let response = rt.block_on(async {
            let connection = FakeConnection::new("ms1", FakeReply::exit(status, &stdout)).shared();
            let mut executor =
                RemoteExecutor::new(quick_command("probe", 5), connection, RemoteOptions::default());
            executor.execute().await.unwrap()
        });

        prop_assert_eq!(response.rc(), Some(status));
        prop_assert_eq!(response.stdout(), stdout.as_str());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn test_local_exit_code_is_returned_verbatim(code in 0i32..=125) {
        let rt = runtime();
        let response = rt.block_on(async {
            let mut executor = LocalExecutor::new(quick_command(&format!("exit {code}"), 5));
            executor.execute().await.unwrap()
        });

        prop_assert_eq!(response.rc(), Some(code));
        prop_assert_eq!(response.stdout(), "");
    }
}
