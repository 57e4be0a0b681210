//! Repository materialization: clone into a fresh workspace and discover
//! the test files to run.

use crate::config::{GitConfig, PathsConfig};
use crate::error::{RemedyError, Result};
use crate::process::run_with_timeout;
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Directories never searched for tests.
const SKIPPED_DIRS: &[&str] = &[
    ".git",
    ".venv",
    "venv",
    "node_modules",
    "__pycache__",
    ".tox",
    "site-packages",
];

/// A cloned working copy and the tests found in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoAnalysis {
    pub repo_path: PathBuf,
    /// Repo-relative, `/`-separated, sorted and unique.
    pub discovered_tests: Vec<String>,
}

/// Produces a local working copy of a remote repository.
#[async_trait]
pub trait RepoSource: Send + Sync {
    async fn materialize(&self, repo_url: &str, workspace_name: &str) -> Result<RepoAnalysis>;
}

/// [`RepoSource`] that shells out to `git clone`.
#[derive(Debug, Clone)]
pub struct GitCloner {
    workspaces_dir: PathBuf,
    clone_timeout: Duration,
    git_program: PathBuf,
}

impl GitCloner {
    #[must_use]
    pub fn new(workspaces_dir: impl Into<PathBuf>, clone_timeout: Duration) -> Self {
        Self {
            workspaces_dir: workspaces_dir.into(),
            clone_timeout,
            git_program: PathBuf::from("git"),
        }
    }

    /// Use `program` instead of the `git` found on PATH.
    #[must_use]
    pub fn with_git_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.git_program = program.into();
        self
    }

    #[must_use]
    pub fn from_config(paths: &PathsConfig, git: &GitConfig) -> Self {
        Self::new(
            paths.workspaces_dir.clone(),
            Duration::from_secs(git.clone_timeout_secs),
        )
    }

    async fn clone_into(&self, repo_url: &str, target: &Path) -> Result<()> {
        let mut cmd = Command::new(&self.git_program);
        cmd.arg("clone")
            .arg(repo_url)
            .arg(target)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_CONFIG_GLOBAL", "/dev/null")
            .env("GIT_CONFIG_NOSYSTEM", "1");

        let out = run_with_timeout(cmd, self.clone_timeout).await?;
        if out.timed_out {
            return Err(RemedyError::CloneTimeout {
                seconds: self.clone_timeout.as_secs(),
            });
        }
        if !out.success() {
            return Err(RemedyError::clone_failed(out.error_text("git clone failed")));
        }
        Ok(())
    }
}

#[async_trait]
impl RepoSource for GitCloner {
    async fn materialize(&self, repo_url: &str, workspace_name: &str) -> Result<RepoAnalysis> {
        fs::create_dir_all(&self.workspaces_dir)
            .map_err(|e| RemedyError::workspace(&self.workspaces_dir, e.to_string()))?;
        let target = self.workspaces_dir.join(workspace_name);

        if target.exists() {
            debug!("Removing stale workspace {}", target.display());
            fs::remove_dir_all(&target)
                .map_err(|e| RemedyError::workspace(&target, e.to_string()))?;
        }

        info!("Cloning {} into {}", repo_url, target.display());
        if let Err(e) = self.clone_into(repo_url, &target).await {
            if target.exists() {
                if let Err(cleanup) = fs::remove_dir_all(&target) {
                    warn!("Could not remove partial clone {}: {}", target.display(), cleanup);
                }
            }
            return Err(e);
        }

        let discovered_tests = discover_tests(&target);
        info!("Discovered {} test file(s)", discovered_tests.len());
        Ok(RepoAnalysis {
            repo_path: target,
            discovered_tests,
        })
    }
}

fn is_skipped(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

/// `test*.py` or `*_test.py`.
#[must_use]
pub fn is_test_file(file_name: &str) -> bool {
    let Some(stem) = file_name.strip_suffix(".py") else {
        return false;
    };
    stem.starts_with("test") || stem.ends_with("_test")
}

/// Find test files under `root`, skipping VCS, virtual-env and dependency
/// directories.
#[must_use]
pub fn discover_tests(root: &Path) -> Vec<String> {
    let mut tests: Vec<String> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !is_skipped(e))
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.file_name().to_str().is_some_and(is_test_file))
        .filter_map(|e| {
            let rel = e.path().strip_prefix(root).ok()?;
            let parts: Vec<_> = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            Some(parts.join("/"))
        })
        .collect();
    tests.sort();
    tests.dedup();
    tests
}
