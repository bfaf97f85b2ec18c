//! Helpers for running the `startwaittree` binary under a deadline.
//!
//! A watcher that misses the end of its tree hangs forever, so every run goes
//! through [`run_with_deadline`] and is killed (and the test failed) if it
//! outlives the deadline.

use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use insta_cmd::get_cargo_bin;
use wait_timeout::ChildExt;

/// Generous upper bound for runs that should finish almost immediately.
pub const PROMPT: Duration = Duration::from_secs(30);

/// The binary, invoked under its bare name so output naming `argv[0]` is
/// the same on every machine.
pub fn swt_command() -> Command {
    #[allow(unused_mut)]
    let mut cmd = Command::new(get_cargo_bin("startwaittree"));
    #[cfg(unix)]
    std::os::unix::process::CommandExt::arg0(&mut cmd, "startwaittree");
    cmd
}

#[derive(Debug)]
pub struct Finished {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

pub fn run_with_deadline(mut cmd: Command, deadline: Duration) -> Finished {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    // Keep RUST_LOG from the developer's shell out of the stderr assertions.
    cmd.env_remove("RUST_LOG");

    let started = Instant::now();
    let mut child = cmd.spawn().expect("failed to spawn startwaittree");
    let status = match child.wait_timeout(deadline).expect("failed to wait") {
        Some(status) => status,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            panic!("startwaittree still running after {deadline:?}");
        }
    };
    let elapsed = started.elapsed();

    let mut stdout = String::new();
    let mut stderr = String::new();
    child
        .stdout
        .take()
        .unwrap()
        .read_to_string(&mut stdout)
        .unwrap();
    child
        .stderr
        .take()
        .unwrap()
        .read_to_string(&mut stderr)
        .unwrap();

    Finished {
        status,
        stdout,
        stderr,
        elapsed,
    }
}
