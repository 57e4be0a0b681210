//! Sandboxed test execution.
//!
//! The target repository's tests only ever run inside a disposable container.
//! When the container runtime is unavailable the run is reported as failed
//! instead of falling back to the host.

use crate::config::SandboxConfig;
use crate::process::run_with_timeout;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Exit code reported when the sandbox deadline elapsed.
pub const EXIT_TIMED_OUT: i32 = 124;

/// Exit code reported when the container runtime cannot be used.
pub const EXIT_ENVIRONMENT_UNAVAILABLE: i32 = 127;

/// Deadline for force-removing a container left behind by a timeout.
const CLEANUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of one test run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRunOutcome {
    pub passed: bool,
    /// Stdout and stderr joined, trimmed.
    pub output: String,
    pub exit_code: i32,
}

impl TestRunOutcome {
    #[must_use]
    pub fn passed(output: impl Into<String>) -> Self {
        Self {
            passed: true,
            output: output.into(),
            exit_code: 0,
        }
    }

    #[must_use]
    pub fn failed(exit_code: i32, output: impl Into<String>) -> Self {
        Self {
            passed: false,
            output: output.into(),
            exit_code,
        }
    }
}

/// Runs a repository's tests.
#[async_trait]
pub trait TestExecutor: Send + Sync {
    /// Run `tests` (repo-relative paths; empty means let the runner discover
    /// them) inside `repo_path`. Infrastructure problems are reported as a
    /// failed outcome, never as an error.
    async fn run(&self, repo_path: &Path, tests: &[String]) -> TestRunOutcome;
}

/// Runs pytest inside a throwaway container.
#[derive(Debug, Clone)]
pub struct DockerSandbox {
    config: SandboxConfig,
}

impl DockerSandbox {
    #[must_use]
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    fn runtime_path(&self) -> Option<PathBuf> {
        which::which(&self.config.runtime).ok()
    }

    /// The shell script executed inside the container.
    #[must_use]
    pub fn build_script(&self, repo_path: &Path, tests: &[String]) -> String {
        let mut steps = vec!["python -m pip install -q --upgrade pip pytest".to_string()];

        for requirements in &self.config.requirement_files {
            if repo_path.join(requirements).is_file() {
                steps.push(format!(
                    "(python -m pip install -q -r {} || true)",
                    shell_quote(requirements)
                ));
            }
        }

        let mut pytest = String::from("python -m pytest -q");
        for test in tests {
            pytest.push(' ');
            pytest.push_str(&shell_quote(test));
        }
        steps.push(pytest);

        steps.join(" && ")
    }

    /// Full argument list passed to the container runtime.
    #[must_use]
    pub fn build_args(&self, container_name: &str, mount_source: &Path, script: &str) -> Vec<String> {
        vec![
            "run".to_string(),
            "--rm".to_string(),
            "--name".to_string(),
            container_name.to_string(),
            "-v".to_string(),
            format!("{}:{}", mount_source.display(), self.config.workdir),
            "-v".to_string(),
            format!("{}:/root/.cache/pip", self.config.pip_cache_volume),
            "-w".to_string(),
            self.config.workdir.clone(),
            self.config.image.clone(),
            "sh".to_string(),
            "-lc".to_string(),
            script.to_string(),
        ]
    }

    async fn remove_container(&self, runtime: &Path, name: &str) {
        let mut cmd = Command::new(runtime);
        cmd.args(["rm", "-f", name]);
        match run_with_timeout(cmd, CLEANUP_TIMEOUT).await {
            Ok(out) if out.success() => debug!("Removed timed-out container {}", name),
            Ok(out) => debug!("Container {} cleanup: {}", name, out.error_text("no output")),
            Err(e) => debug!("Container {} cleanup failed: {}", name, e),
        }
    }
}

#[async_trait]
impl TestExecutor for DockerSandbox {
    async fn run(&self, repo_path: &Path, tests: &[String]) -> TestRunOutcome {
        let Some(runtime) = self.runtime_path() else {
            warn!("Container runtime '{}' not found on PATH", self.config.runtime);
            return TestRunOutcome::failed(
                EXIT_ENVIRONMENT_UNAVAILABLE,
                format!(
                    "Sandbox enforcement active: {} is required but not available on PATH.",
                    self.config.runtime
                ),
            );
        };

        let mount_source = repo_path
            .canonicalize()
            .unwrap_or_else(|_| repo_path.to_path_buf());
        let container_name = format!("remedy-{}", uuid::Uuid::new_v4().simple());
        let script = self.build_script(repo_path, tests);
        let args = self.build_args(&container_name, &mount_source, &script);

        info!(
            "Running {} test file(s) in {} ({})",
            tests.len(),
            self.config.image,
            container_name
        );

        let mut cmd = Command::new(&runtime);
        cmd.args(&args);

        let output = match run_with_timeout(cmd, self.config.timeout()).await {
            Ok(output) => output,
            Err(e) => {
                warn!("Sandbox failed to start: {}", e);
                return TestRunOutcome::failed(EXIT_ENVIRONMENT_UNAVAILABLE, e.to_string());
            }
        };

        if output.timed_out {
            self.remove_container(&runtime, &container_name).await;
            let notice = format!(
                "Sandboxed pytest timed out after {} seconds.",
                self.config.timeout_secs
            );
            let partial = output.combined();
            let text = if partial.is_empty() {
                notice
            } else {
                format!("{partial}\n{notice}")
            };
            return TestRunOutcome::failed(EXIT_TIMED_OUT, text);
        }

        let exit_code = output.exit_code.unwrap_or(1);
        debug!("Sandbox exited with {}", exit_code);
        if exit_code == 0 {
            TestRunOutcome::passed(output.combined())
        } else {
            TestRunOutcome::failed(exit_code, output.combined())
        }
    }
}

/// Quote `value` for a POSIX shell.
#[must_use]
pub fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-' | '=' | ':'));
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}
