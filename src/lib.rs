// src/lib.rs

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod remote;
pub mod shell;
pub mod types;

use std::io::Write;
use std::time::Duration;

use anyhow::{Result, bail};
use tracing::{debug, error, info};

use crate::cli::CliArgs;
use crate::config::loader::{default_config_path, load_or_default};
use crate::config::model::ConfigFile;
use crate::dispatch::{Job, LocalShell, Target, execute_cmd, jobs_from_config, run_batch};
use crate::errors::ShellError;
use crate::shell::{Command, Response};

/// High-level entry point used by `main.rs`.
///
/// Loads the config, then either runs every configured command (`--batch`)
/// or the command given on the command line. Returns the exit code for the
/// process.
pub async fn run(args: CliArgs) -> Result<i32> {
    let (config_path, explicit) = match &args.config {
        Some(path) => (path.clone(), true),
        None => (default_config_path(), false),
    };
    let cfg = load_or_default(&config_path, explicit)?;

    if args.batch {
        let jobs = jobs_from_config(&cfg)?;
        if args.dry_run {
            print_dry_run(&jobs);
            return Ok(0);
        }
        return Ok(run_jobs(jobs).await);
    }

    let command = build_command(&cfg, &args)?;
    let target = build_target(&cfg, &args);

    if args.dry_run {
        print_dry_run(&[Job::new("cli", command, target)]);
        return Ok(0);
    }

    match execute_cmd(command, &target).await {
        Ok(response) => {
            print_output(&response);
            Ok(exit_code(&response))
        }
        Err(ShellError::CommandFailed { rc, cmd }) => {
            error!(?rc, cmd = %cmd, "command did not pass");
            Ok(rc.unwrap_or(1))
        }
        Err(err) => Err(err.into()),
    }
}

/// The command described by the CLI flags, on top of `[defaults]`.
pub fn build_command(cfg: &ConfigFile, args: &CliArgs) -> Result<Command> {
    let cmd = args.cmd.join(" ");
    if cmd.trim().is_empty() {
        bail!("no command given; pass a command or use --batch");
    }

    let mut command = cfg.defaults().command(cmd);
    if let Some(timeout) = args.timeout {
        command.timeout = Some(Duration::from_secs(timeout));
    }
    if args.no_retries {
        command.allow_retries = false;
    }
    if let Some(limit) = args.retry_limit {
        command.retry_limit = Some(limit);
    }
    if let Some(cwd) = &args.cwd {
        command.cwd = Some(cwd.clone());
    }
    command.check_pass = args.check_pass;
    command.fire_and_forget = args.detach;
    command.activate_virtualenv = args.activate_virtualenv;
    Ok(command)
}

/// Where the CLI command runs: `--host` picks a configured host or a bare
/// address, otherwise the local shell.
pub fn build_target(cfg: &ConfigFile, args: &CliArgs) -> Target {
    let Some(name) = &args.host else {
        return Target::Local(LocalShell::from(cfg.defaults()));
    };

    let mut host = cfg.resolve_host(name);
    if let Some(user) = &args.user {
        host.user = Some(user.clone());
    }
    let mut options = host.remote_options();
    options.get_pty |= args.get_pty;
    options.add_linux_timeout |= args.add_linux_timeout;

    Target::Remote {
        host,
        options,
        ping_host: args.ping_host,
    }
}

async fn run_jobs(jobs: Vec<Job>) -> i32 {
    info!(jobs = jobs.len(), "running configured commands");
    let mut rc = 0;

    for (name, result) in run_batch(jobs).await {
        match result {
            Ok(response) => {
                println!("== {name} (rc={}) ==", display_rc(&response));
                print_output(&response);
                if rc == 0 {
                    rc = exit_code(&response);
                }
            }
            Err(err) => {
                error!(job = %name, error = %err, "command failed");
                if rc == 0 {
                    rc = match err {
                        ShellError::CommandFailed { rc: Some(code), .. } => code,
                        _ => 1,
                    };
                }
            }
        }
    }

    rc
}

fn print_output(response: &Response) {
    let stdout = response.stdout();
    if stdout.is_empty() {
        return;
    }
    let mut out = std::io::stdout().lock();
    let _ = out.write_all(stdout.as_bytes());
    if !stdout.ends_with('\n') {
        let _ = out.write_all(b"\n");
    }
}

/// Detached commands have no rc and count as success.
fn exit_code(response: &Response) -> i32 {
    response.rc().unwrap_or(0)
}

fn display_rc(response: &Response) -> String {
    response
        .rc()
        .map_or_else(|| "detached".to_string(), |rc| rc.to_string())
}

/// Dry-run output: every resolved command and where it would run.
fn print_dry_run(jobs: &[Job]) {
    println!("shellexec dry-run");
    println!("commands ({}):", jobs.len());

    for job in jobs {
        let command = &job.command;
        println!("  - {}", job.name);
        println!("      cmd: {}", command.cmd);
        match &job.target {
            Target::Local(shell) => {
                println!("      target: local ({})", shell.shell.display());
                if let Some(cwd) = &command.cwd {
                    println!("      cwd: {}", cwd.display());
                }
            }
            Target::Remote {
                host,
                options,
                ping_host,
            } => {
                println!("      target: ssh {}", host.destination());
                if options.get_pty {
                    println!("      get_pty: true");
                }
                if options.add_linux_timeout {
                    println!("      add_linux_timeout: true");
                }
                if *ping_host {
                    println!("      ping_host: true");
                }
            }
        }
        println!("      timeout: {}s", command.timeout().as_secs());
        println!(
            "      attempts: up to {}",
            if matches!(job.target, Target::Remote { .. }) {
                1
            } else {
                command.retry_limit()
            }
        );
        if command.check_pass {
            println!("      check_pass: true");
        }
        if command.fire_and_forget {
            println!("      fire_and_forget: true");
        }
    }

    debug!("dry-run complete (no execution)");
}
