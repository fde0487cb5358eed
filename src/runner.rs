//! Process runner
//!
//! Spawns one command as a child process in its own process group and
//! awaits it under a deadline. On deadline the entire process group is
//! SIGKILLed and the child reaped, so a runaway snippet (including any
//! processes it spawned) cannot outlive its request.
//!
//! The runner does NOT:
//! - Interpret exit codes or build results (the classifier does)
//! - Impose memory/syscall/filesystem isolation

use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::process::Command;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::capture::{drain_capped, CapturedStream};

/// Command specification for execution
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Program path or name
    pub program: String,
    /// Arguments to the program
    pub args: Vec<String>,
    /// Extra environment variables
    pub env: Vec<(String, String)>,
    /// Working directory
    pub work_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            work_dir: None,
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(|a| a.into()).collect();
        self
    }

    pub fn with_env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_work_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.work_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Create from a command vector (first element is program, rest are args)
    pub fn from_vec(cmd: &[String]) -> Self {
        let mut iter = cmd.iter();
        let program = iter.next().cloned().unwrap_or_default();
        let args: Vec<String> = iter.cloned().collect();
        Self {
            program,
            args,
            env: Vec::new(),
            work_dir: None,
        }
    }
}

/// Raw completion status of one command (no result interpretation)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Program exited normally with given exit code
    Exited(i32),
    /// Killed by signal
    Signaled(i32),
    /// Deadline expired; the process group was killed
    TimedOut,
}

impl RunStatus {
    /// Check if execution was successful (exited with code 0)
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Exited(0))
    }
}

/// Outcome of running one command
#[derive(Debug)]
pub struct RunOutcome {
    /// Completion status
    pub status: RunStatus,
    /// Captured stdout (byte-capped)
    pub stdout: CapturedStream,
    /// Captured stderr (byte-capped)
    pub stderr: CapturedStream,
    /// Wall-clock time from spawn to completion or kill
    pub duration: Duration,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Run one command to completion or deadline, capturing its output.
pub async fn run_command(
    spec: &CommandSpec,
    deadline: Duration,
    max_output_bytes: usize,
) -> Result<RunOutcome> {
    debug!(
        "Running {} {:?} (deadline {:?})",
        spec.program, spec.args, deadline
    );

    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .process_group(0);
    for (key, value) in &spec.env {
        cmd.env(key, value);
    }
    if let Some(dir) = &spec.work_dir {
        cmd.current_dir(dir);
    }

    let start = Instant::now();
    let mut child = cmd
        .spawn()
        .with_context(|| format!("Failed to spawn {}", spec.program))?;
    let pid = child.id();

    let stdout = child.stdout.take().context("Child stdout was not piped")?;
    let stderr = child.stderr.take().context("Child stderr was not piped")?;
    let stdout_task = tokio::spawn(drain_capped(stdout, max_output_bytes));
    let stderr_task = tokio::spawn(drain_capped(stderr, max_output_bytes));

    let status = match tokio::time::timeout(deadline, child.wait()).await {
        Ok(wait_result) => {
            let exit = wait_result.context("Failed to wait for child")?;
            match exit.code() {
                Some(code) => RunStatus::Exited(code),
                None => RunStatus::Signaled(exit.signal().unwrap_or(0)),
            }
        }
        Err(_) => {
            // The group kill also takes down anything the snippet spawned,
            // which closes every writer of our pipes.
            kill_process_group(pid);
            if let Err(e) = child.kill().await {
                warn!("Failed to reap timed-out child: {}", e);
            }
            RunStatus::TimedOut
        }
    };

    let duration = start.elapsed();
    let stdout = stdout_task.await.unwrap_or_default();
    let stderr = stderr_task.await.unwrap_or_default();

    debug!(
        "Command {} finished: {:?} in {:?}",
        spec.program, status, duration
    );

    Ok(RunOutcome {
        status,
        stdout,
        stderr,
        duration,
    })
}

/// SIGKILL the child's process group. The child was spawned with
/// `process_group(0)`, so its pid doubles as the group id.
fn kill_process_group(pid: Option<u32>) {
    let Some(pid) = pid else { return };
    match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        Ok(()) => debug!("Killed process group {}", pid),
        // Already gone
        Err(nix::errno::Errno::ESRCH) => {}
        Err(e) => warn!("Failed to kill process group {}: {}", pid, e),
    }
}
