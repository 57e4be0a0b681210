//! Bounded external process execution.
//!
//! Every external step of a run (clone, sandboxed tests, git) goes through
//! [`run_with_timeout`], so none of them can block a run indefinitely. On
//! timeout the child is killed and whatever output had been read so far is
//! still returned.

use crate::error::{RemedyError, Result};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

/// How long to keep draining pipes after the child has exited or been killed.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Captured result of a bounded process run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` when killed by a signal or on timeout.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// The deadline elapsed and the child was killed.
    pub timed_out: bool,
}

impl ProcessOutput {
    /// Exited normally with status 0.
    #[must_use]
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// Stdout followed by stderr, trimmed.
    #[must_use]
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr).trim().to_string()
    }

    /// The most useful single error text: stderr, else stdout, else `fallback`.
    #[must_use]
    pub fn error_text(&self, fallback: &str) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        fallback.to_string()
    }
}

/// Run `command` to completion or until `timeout` elapses.
///
/// # Errors
///
/// Returns [`RemedyError::ProcessSpawn`] if the program cannot be started and
/// [`RemedyError::Io`] if waiting on it fails. A timeout is not an error; it
/// is reported through [`ProcessOutput::timed_out`].
pub async fn run_with_timeout(mut command: Command, timeout: Duration) -> Result<ProcessOutput> {
    let program = command
        .as_std()
        .get_program()
        .to_string_lossy()
        .into_owned();

    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(|e| RemedyError::ProcessSpawn {
        program: program.clone(),
        message: e.to_string(),
    })?;

    let stdout_buf = Arc::new(Mutex::new(Vec::new()));
    let stderr_buf = Arc::new(Mutex::new(Vec::new()));
    let stdout_task = tokio::spawn(pump(child.stdout.take(), Arc::clone(&stdout_buf)));
    let stderr_task = tokio::spawn(pump(child.stderr.take(), Arc::clone(&stderr_buf)));

    let waited = tokio::time::timeout(timeout, child.wait()).await;
    let (exit_code, timed_out) = match waited {
        Ok(status) => (status?.code(), false),
        Err(_elapsed) => {
            warn!(
                "'{}' exceeded its {}s deadline, killing it",
                program,
                timeout.as_secs()
            );
            if let Err(e) = child.start_kill() {
                debug!("kill after timeout failed: {}", e);
            }
            if let Err(e) = child.wait().await {
                debug!("wait after kill failed: {}", e);
            }
            (None, true)
        }
    };

    // Grandchildren may keep the pipes open; don't wait on them forever.
    let stdout_abort = stdout_task.abort_handle();
    let stderr_abort = stderr_task.abort_handle();
    let drained = tokio::time::timeout(
        DRAIN_GRACE,
        futures::future::join(stdout_task, stderr_task),
    )
    .await;
    if drained.is_err() {
        debug!("'{}' output pipes still open after exit", program);
        stdout_abort.abort();
        stderr_abort.abort();
    }

    Ok(ProcessOutput {
        exit_code,
        stdout: take_lossy(&stdout_buf),
        stderr: take_lossy(&stderr_buf),
        timed_out,
    })
}

async fn pump<R>(reader: Option<R>, sink: Arc<Mutex<Vec<u8>>>)
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return;
    };
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => sink
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .extend_from_slice(&chunk[..n]),
        }
    }
}

fn take_lossy(buf: &Mutex<Vec<u8>>) -> String {
    let bytes = std::mem::take(&mut *buf.lock().unwrap_or_else(|poisoned| poisoned.into_inner()));
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", script]);
        cmd
    }

    #[tokio::test]
    async fn test_captures_exit_code_and_both_streams() {
        let out = run_with_timeout(sh("echo hello; echo oops 1>&2; exit 3"), Duration::from_secs(10))
            .await
            .unwrap();

        assert_eq!(out.exit_code, Some(3));
        assert!(!out.timed_out);
        assert!(!out.success());
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.stderr.trim(), "oops");
        assert_eq!(out.combined(), "hello\n\noops");
        assert_eq!(out.error_text("fallback"), "oops");
    }

    #[tokio::test]
    async fn test_success() {
        let out = run_with_timeout(sh("true"), Duration::from_secs(10))
            .await
            .unwrap();
        assert!(out.success());
        assert_eq!(out.error_text("fallback"), "fallback");
    }

    #[tokio::test]
    async fn test_timeout_keeps_partial_output() {
        let out = run_with_timeout(sh("echo partial; sleep 30"), Duration::from_millis(500))
            .await
            .unwrap();

        assert!(out.timed_out);
        assert_eq!(out.exit_code, None);
        assert!(out.stdout.contains("partial"));
    }

    #[tokio::test]
    async fn test_lingering_grandchild_does_not_block_return() {
        let started = std::time::Instant::now();
        let out = run_with_timeout(sh("(sleep 30) & echo spawned"), Duration::from_secs(10))
            .await
            .unwrap();

        assert_eq!(out.exit_code, Some(0));
        assert!(out.stdout.contains("spawned"));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let cmd = Command::new("definitely-not-a-real-binary-xyz");
        let err = run_with_timeout(cmd, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, RemedyError::ProcessSpawn { .. }));
    }
}
