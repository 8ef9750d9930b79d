use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;

use super::error::BashError;
use crate::dispatcher::{ProcessOutput, ProcessRunner};

/// Runs commands through the system shell. On unix the shell leads its own
/// process group, and the whole group is killed on timeout or when the
/// returned future is dropped, so background jobs and subshells die with it.
#[derive(Default)]
pub struct BashExecutor;

impl BashExecutor {
    pub fn new() -> Self {
        Self
    }

    #[cfg(unix)]
    fn get_shell(&self) -> (&'static str, &'static str) {
        ("/bin/bash", "-c")
    }

    #[cfg(windows)]
    fn get_shell(&self) -> (&'static str, &'static str) {
        ("cmd", "/C")
    }
}

#[async_trait]
impl ProcessRunner for BashExecutor {
    async fn run(
        &self,
        command: &str,
        cwd: &Path,
        timeout: Duration,
    ) -> Result<ProcessOutput, BashError> {
        if !cwd.is_dir() {
            return Err(BashError::MissingWorkingDir(cwd.display().to_string()));
        }

        let start = Instant::now();
        let (shell, flag) = self.get_shell();
        let mut cmd = Command::new(shell);
        cmd.arg(flag)
            .arg(command)
            .current_dir(cwd)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd
            .spawn()
            .map_err(|e| BashError::SpawnFailed(e.to_string()))?;
        let group = ProcessGroup::new(child.id());

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| BashError::Timeout(timeout))?
            .map_err(|e| BashError::SpawnFailed(e.to_string()))?;
        group.release();

        Ok(ProcessOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            // Killed by a signal: report the shell convention 128 + n where possible.
            exit_code: output.status.code().unwrap_or_else(|| signal_exit_code(&output.status)),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// Kills the shell's process group when dropped, unless released first.
struct ProcessGroup {
    pgid: Option<u32>,
}

impl ProcessGroup {
    fn new(pid: Option<u32>) -> Self {
        Self { pgid: pid }
    }

    /// The shell exited on its own; leave anything it detached alone.
    fn release(mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            kill_group(pgid);
        }
    }
}

#[cfg(unix)]
fn kill_group(pgid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return;
    };
    // SAFETY: killpg takes no pointers. The group was created for this child
    // and is still led by it or its descendants.
    unsafe {
        libc::killpg(pgid, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) {}

#[cfg(unix)]
fn signal_exit_code(status: &std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status.signal().map(|s| 128 + s).unwrap_or(-1)
}

#[cfg(not(unix))]
fn signal_exit_code(_status: &std::process::ExitStatus) -> i32 {
    -1
}
