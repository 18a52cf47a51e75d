// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-group control for adapter subprocesses.
//!
//! The subprocess is placed in a fresh process group before it starts
//! executing, so a timeout kill reaches the whole tree, not just the
//! direct child.

use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

/// Default timeout for hook commands.
pub const HOOK_TIMEOUT: Duration = Duration::from_secs(60);

/// Place the command in a new process group (pgid = child pid).
#[cfg(unix)]
pub fn set_process_group(cmd: &mut Command) {
    cmd.process_group(0);
}

#[cfg(not(unix))]
pub fn set_process_group(_cmd: &mut Command) {}

/// Kill an entire process group.
#[cfg(unix)]
pub fn kill_process_group(pid: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        tracing::warn!(pid, error = %e, "failed to kill process group");
    }
}

#[cfg(not(unix))]
pub fn kill_process_group(pid: u32) {
    tracing::warn!(pid, "process-group kill unsupported on this platform");
}

/// Run a subprocess command with a timeout.
///
/// Wraps `Command::output()` with `tokio::time::timeout`, converting
/// timeout expiration into a descriptive error message. The child process
/// is killed automatically if the timeout elapses (via the tokio `Child`
/// drop implementation).
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    description: &str,
) -> Result<Output, String> {
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(io_err)) => Err(format!("{} failed: {}", description, io_err)),
        Err(_elapsed) => Err(format!(
            "{} timed out after {}s",
            description,
            timeout.as_secs()
        )),
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
