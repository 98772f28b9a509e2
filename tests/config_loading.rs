// tests/config_loading.rs

mod common;

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use common::{CommandConfigBuilder, ConfigFileBuilder};
use shellexec::config::{ConfigFile, load_and_validate, load_or_default};
use shellexec::errors::ShellError;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn test_full_config_loads() {
    let file = write_config(
        r#"
[defaults]
timeout = 30
retry_limit = 3
retry_jitter = 0.5
shell = "/bin/bash"

[host.ms1]
address = "10.0.0.1"
user = "root"
port = 2222
proxy_command = "ssh -W %h:%p jump"
options = ["ServerAliveInterval=10"]
add_linux_timeout = true

[command.uptime]
cmd = "uptime"
host = "ms1"
timeout = 10
check_pass = true

[command.local_ls]
cmd = "ls"
cwd = "/tmp"
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.defaults().timeout, 30);
    assert_eq!(cfg.defaults().shell, PathBuf::from("/bin/bash"));

    let host = &cfg.hosts()["ms1"];
    assert_eq!(host.destination(), "root@10.0.0.1");
    assert_eq!(host.port, Some(2222));
    assert!(host.add_linux_timeout);

    let uptime = cfg.commands()["uptime"].to_command(cfg.defaults());
    assert_eq!(uptime.timeout, Some(Duration::from_secs(10)));
    assert_eq!(uptime.retry_limit, Some(3));
    assert_eq!(uptime.retry_jitter, Duration::from_millis(500));
    assert!(uptime.check_pass);

    let ls = cfg.commands()["local_ls"].to_command(cfg.defaults());
    assert_eq!(ls.timeout, Some(Duration::from_secs(30)));
    assert_eq!(ls.cwd, Some(PathBuf::from("/tmp")));
}

#[test]
fn test_empty_file_uses_defaults() {
    let file = write_config("");
    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.defaults().timeout, 60);
    assert!(cfg.defaults().allow_retries);
    assert_eq!(cfg.defaults().retry_jitter, 4.0);
    assert!(cfg.commands().is_empty());
}

#[test]
fn test_unknown_host_reference_returns_config_error() {
    let file = write_config(
        r#"
[command.A]
cmd = "uptime"
host = "ghost"
"#,
    );

    match load_and_validate(file.path()) {
        Err(ShellError::ConfigError(msg)) => {
            assert!(msg.contains("unknown host"));
            assert!(msg.contains("ghost"));
        }
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_zero_timeout_is_rejected() {
    let file = write_config(
        r#"
[defaults]
timeout = 0
"#,
    );
    assert!(matches!(
        load_and_validate(file.path()),
        Err(ShellError::ConfigError(_))
    ));
}

#[test]
fn test_negative_jitter_is_rejected() {
    let file = write_config(
        r#"
[defaults]
retry_jitter = -1.0
"#,
    );
    assert!(matches!(
        load_and_validate(file.path()),
        Err(ShellError::ConfigError(_))
    ));
}

#[test]
fn test_jitter_too_large_for_a_duration_is_rejected() {
    let file = write_config(
        r#"
[defaults]
retry_jitter = 1e30
"#,
    );
    assert!(matches!(
        load_and_validate(file.path()),
        Err(ShellError::ConfigError(_))
    ));
}

#[test]
fn test_empty_cmd_and_address_are_rejected() {
    let raw = ConfigFileBuilder::new()
        .with_command("blank", CommandConfigBuilder::new("   ").build())
        .raw();
    assert!(matches!(
        ConfigFile::try_from(raw),
        Err(ShellError::ConfigError(msg)) if msg.contains("blank")
    ));

    let file = write_config(
        r#"
[host.nowhere]
address = ""
"#,
    );
    assert!(matches!(
        load_and_validate(file.path()),
        Err(ShellError::ConfigError(msg)) if msg.contains("nowhere")
    ));
}

#[test]
fn test_zero_retry_limit_on_command_is_rejected() {
    let raw = ConfigFileBuilder::new()
        .with_command("once", CommandConfigBuilder::new("true").retry_limit(0).build())
        .raw();
    assert!(matches!(
        ConfigFile::try_from(raw),
        Err(ShellError::ConfigError(_))
    ));
}

#[test]
fn test_malformed_toml_is_toml_error() {
    let file = write_config("[defaults\ntimeout = ");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(ShellError::TomlError(_))
    ));
}

#[test]
fn test_missing_default_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("Shellexec.toml");

    let cfg = load_or_default(&missing, false).unwrap();
    assert_eq!(cfg.defaults().timeout, 60);

    assert!(matches!(
        load_or_default(&missing, true),
        Err(ShellError::IoError(_))
    ));
}
