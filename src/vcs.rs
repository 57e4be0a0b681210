//! Version control for the materialized repository.
//!
//! Expected outcomes of a commit attempt are values ([`CommitOutcome`]);
//! only branch creation and push report errors.

use crate::config::{GitConfig, AUTOMATION_MARKER};
use crate::error::{RemedyError, Result};
use crate::process::{run_with_timeout, ProcessOutput};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Result of committing a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// The staged diff was empty; nothing was committed.
    NoChanges,
    Failed { reason: String },
}

impl CommitOutcome {
    #[must_use]
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed)
    }
}

/// Branch/commit/push operations on one working copy.
#[async_trait]
pub trait VersionControl: Send + Sync {
    async fn create_branch(&self, name: &str) -> Result<()>;

    /// Stage and commit one repo-relative file.
    async fn commit_file(&self, path: &str, message: &str) -> CommitOutcome;

    async fn push_branch(&self, name: &str) -> Result<()>;
}

/// Opens a [`VersionControl`] for a working copy.
pub trait VcsProvider: Send + Sync {
    fn open(&self, repo_path: &Path) -> Arc<dyn VersionControl>;
}

/// Prefix `message` with the automation marker unless it already has it.
#[must_use]
pub fn with_automation_prefix(message: &str) -> String {
    if message.starts_with(AUTOMATION_MARKER) {
        message.to_string()
    } else {
        format!("{AUTOMATION_MARKER} {message}")
    }
}

/// [`VersionControl`] backed by the `git` binary.
#[derive(Debug, Clone)]
pub struct GitCli {
    repo_path: PathBuf,
    config: GitConfig,
}

impl GitCli {
    #[must_use]
    pub fn new(repo_path: impl Into<PathBuf>, config: GitConfig) -> Self {
        Self {
            repo_path: repo_path.into(),
            config,
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new("git");
        cmd.current_dir(&self.repo_path)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_SSH_COMMAND", "ssh -o BatchMode=yes");
        cmd
    }

    async fn git(&self, args: &[&str], timeout: Duration) -> Result<ProcessOutput> {
        let mut cmd = self.command();
        cmd.args(args);
        debug!("git {}", args.join(" "));
        run_with_timeout(cmd, timeout).await
    }

    fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.config.command_timeout_secs)
    }

    /// Run a git command that must succeed.
    async fn git_checked(&self, operation: &str, args: &[&str], timeout: Duration) -> Result<()> {
        let out = self.git(args, timeout).await?;
        if out.timed_out {
            return Err(RemedyError::git(
                operation,
                format!("timed out after {} seconds", timeout.as_secs()),
            ));
        }
        if !out.success() {
            return Err(RemedyError::git(
                operation,
                out.error_text(&format!("git {operation} failed")),
            ));
        }
        Ok(())
    }

    async fn try_commit(&self, path: &str, message: &str) -> Result<CommitOutcome> {
        let timeout = self.command_timeout();
        self.git_checked("add", &["add", "--", path], timeout).await?;

        let diff = self.git(&["diff", "--cached", "--quiet"], timeout).await?;
        if diff.timed_out {
            return Err(RemedyError::git("diff", "timed out"));
        }
        match diff.exit_code {
            Some(0) => return Ok(CommitOutcome::NoChanges),
            Some(1) => {}
            _ => {
                return Err(RemedyError::git(
                    "diff",
                    diff.error_text("could not inspect staged changes"),
                ))
            }
        }

        let name = format!("user.name={}", self.config.author_name);
        let email = format!("user.email={}", self.config.author_email);
        let message = with_automation_prefix(message);
        self.git_checked(
            "commit",
            &["-c", &name, "-c", &email, "commit", "-m", &message],
            timeout,
        )
        .await?;
        Ok(CommitOutcome::Committed)
    }
}

#[async_trait]
impl VersionControl for GitCli {
    async fn create_branch(&self, name: &str) -> Result<()> {
        info!("Creating branch {}", name);
        self.git_checked("checkout", &["checkout", "-b", name], self.command_timeout())
            .await
    }

    async fn commit_file(&self, path: &str, message: &str) -> CommitOutcome {
        match self.try_commit(path, message).await {
            Ok(outcome) => {
                debug!("Commit of {}: {:?}", path, outcome);
                outcome
            }
            Err(e) => {
                warn!("Commit of {} failed: {}", path, e);
                CommitOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn push_branch(&self, name: &str) -> Result<()> {
        info!("Pushing {} to {}", name, self.config.remote);
        self.git_checked(
            "push",
            &["push", "-u", &self.config.remote, name],
            Duration::from_secs(self.config.push_timeout_secs),
        )
        .await
    }
}

/// Opens [`GitCli`] instances sharing one [`GitConfig`].
#[derive(Debug, Clone, Default)]
pub struct GitCliProvider {
    config: GitConfig,
}

impl GitCliProvider {
    #[must_use]
    pub fn new(config: GitConfig) -> Self {
        Self { config }
    }
}

impl VcsProvider for GitCliProvider {
    fn open(&self, repo_path: &Path) -> Arc<dyn VersionControl> {
        Arc::new(GitCli::new(repo_path, self.config.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_automation_prefix_added_once() {
        assert_eq!(
            with_automation_prefix("Fix SYNTAX in a.py:1"),
            "[AI-AGENT] Fix SYNTAX in a.py:1"
        );
        assert_eq!(
            with_automation_prefix("[AI-AGENT] Fix SYNTAX in a.py:1"),
            "[AI-AGENT] Fix SYNTAX in a.py:1"
        );
    }

    #[test]
    fn test_commit_outcome_is_committed() {
        assert!(CommitOutcome::Committed.is_committed());
        assert!(!CommitOutcome::NoChanges.is_committed());
        assert!(!CommitOutcome::Failed {
            reason: "x".to_string()
        }
        .is_committed());
    }

    /// Initializes a throwaway repository with one committed file.
    async fn init_repo() -> Option<TempDir> {
        which::which("git").ok()?;
        let temp = TempDir::new().ok()?;
        fs::write(temp.path().join("app.py"), "def main()\n    pass\n").ok()?;

        let git = GitCli::new(temp.path(), GitConfig::default());
        git.git_checked("init", &["init", "-q"], Duration::from_secs(30))
            .await
            .ok()?;
        git.commit_file("app.py", "initial").await.is_committed().then_some(temp)
    }

    #[tokio::test]
    async fn test_git_cli_commit_cycle() {
        let Some(temp) = init_repo().await else {
            return;
        };
        let git = GitCli::new(temp.path(), GitConfig::default());

        git.create_branch("TEAM_LEAD_AI_Fix").await.unwrap();

        // Unchanged file: nothing to commit.
        assert_eq!(
            git.commit_file("app.py", "Fix SYNTAX in app.py:1").await,
            CommitOutcome::NoChanges
        );

        fs::write(temp.path().join("app.py"), "def main():\n    pass\n").unwrap();
        assert_eq!(
            git.commit_file("app.py", "Fix SYNTAX in app.py:1").await,
            CommitOutcome::Committed
        );

        let log = git
            .git(&["log", "-1", "--format=%s"], Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(log.stdout.trim(), "[AI-AGENT] Fix SYNTAX in app.py:1");
    }

    #[tokio::test]
    async fn test_git_cli_duplicate_branch_is_error() {
        let Some(temp) = init_repo().await else {
            return;
        };
        let git = GitCli::new(temp.path(), GitConfig::default());
        git.create_branch("dup").await.unwrap();
        let err = git.create_branch("dup").await.unwrap_err();
        assert!(matches!(err, RemedyError::Git { .. }));
    }

    #[tokio::test]
    async fn test_git_cli_push_without_remote_is_error() {
        let Some(temp) = init_repo().await else {
            return;
        };
        let git = GitCli::new(temp.path(), GitConfig::default());
        git.create_branch("orphan").await.unwrap();
        assert!(git.push_branch("orphan").await.is_err());
    }
}
