//! In-memory implementations of the loop's collaborators.
//!
//! These mocks provide controllable test doubles for git, the sandbox and
//! repository cloning, enabling deterministic coordinator tests.

use crate::error::{RemedyError, Result};
use crate::repo::{RepoAnalysis, RepoSource};
use crate::sandbox::{TestExecutor, TestRunOutcome};
use crate::vcs::{with_automation_prefix, CommitOutcome, VcsProvider, VersionControl};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

// ============================================================================
// Version control
// ============================================================================

#[derive(Debug, Default)]
struct VcsLog {
    branches: Vec<String>,
    commits: Vec<(String, String)>,
    pushes: Vec<String>,
}

/// Mock version control recording every call.
///
/// Clones share the same log, so a clone handed to the coordinator can be
/// inspected afterwards.
///
/// # Example
///
/// ```rust,ignore
/// let vcs = MockVersionControl::new()
///     .with_unchanged_files(&["app.py"])
///     .with_push_error("permission denied");
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockVersionControl {
    unchanged_files: HashSet<String>,
    commit_failure: Option<String>,
    create_branch_error: Option<String>,
    push_error: Option<String>,
    log: Arc<Mutex<VcsLog>>,
}

impl MockVersionControl {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Commits of these files report [`CommitOutcome::NoChanges`].
    #[must_use]
    pub fn with_unchanged_files(mut self, files: &[&str]) -> Self {
        self.unchanged_files
            .extend(files.iter().map(|f| (*f).to_string()));
        self
    }

    /// Every commit reports [`CommitOutcome::Failed`].
    #[must_use]
    pub fn with_commit_failure(mut self, reason: &str) -> Self {
        self.commit_failure = Some(reason.to_string());
        self
    }

    #[must_use]
    pub fn with_create_branch_error(mut self, error: &str) -> Self {
        self.create_branch_error = Some(error.to_string());
        self
    }

    #[must_use]
    pub fn with_push_error(mut self, error: &str) -> Self {
        self.push_error = Some(error.to_string());
        self
    }

    fn log(&self) -> MutexGuard<'_, VcsLog> {
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Branches created, in order.
    #[must_use]
    pub fn branches(&self) -> Vec<String> {
        self.log().branches.clone()
    }

    /// `(file, message)` pairs committed, in order.
    #[must_use]
    pub fn commits(&self) -> Vec<(String, String)> {
        self.log().commits.clone()
    }

    /// Branches pushed, in order.
    #[must_use]
    pub fn pushes(&self) -> Vec<String> {
        self.log().pushes.clone()
    }
}

#[async_trait]
impl VersionControl for MockVersionControl {
    async fn create_branch(&self, name: &str) -> Result<()> {
        if let Some(error) = &self.create_branch_error {
            return Err(RemedyError::git("checkout", error.clone()));
        }
        self.log().branches.push(name.to_string());
        Ok(())
    }

    async fn commit_file(&self, path: &str, message: &str) -> CommitOutcome {
        if let Some(reason) = &self.commit_failure {
            return CommitOutcome::Failed {
                reason: reason.clone(),
            };
        }
        if self.unchanged_files.contains(path) {
            return CommitOutcome::NoChanges;
        }
        self.log()
            .commits
            .push((path.to_string(), with_automation_prefix(message)));
        CommitOutcome::Committed
    }

    async fn push_branch(&self, name: &str) -> Result<()> {
        if let Some(error) = &self.push_error {
            return Err(RemedyError::git("push", error.clone()));
        }
        self.log().pushes.push(name.to_string());
        Ok(())
    }
}

impl VcsProvider for MockVersionControl {
    fn open(&self, _repo_path: &Path) -> Arc<dyn VersionControl> {
        Arc::new(self.clone())
    }
}

// ============================================================================
// Test execution
// ============================================================================

/// Executor that replays a script of outcomes. Once the script runs out the
/// last outcome repeats.
#[derive(Debug)]
pub struct ScriptedExecutor {
    outcomes: Vec<TestRunOutcome>,
    call_count: AtomicUsize,
}

impl ScriptedExecutor {
    #[must_use]
    pub fn new(outcomes: Vec<TestRunOutcome>) -> Self {
        Self {
            outcomes,
            call_count: AtomicUsize::new(0),
        }
    }

    /// Executor whose every run passes.
    #[must_use]
    pub fn always_passing() -> Self {
        Self::new(vec![TestRunOutcome::passed("")])
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TestExecutor for ScriptedExecutor {
    async fn run(&self, _repo_path: &Path, _tests: &[String]) -> TestRunOutcome {
        let call = self.call_count.fetch_add(1, Ordering::SeqCst);
        match self.outcomes.get(call).or_else(|| self.outcomes.last()) {
            Some(outcome) => outcome.clone(),
            None => TestRunOutcome::failed(1, "no scripted outcome"),
        }
    }
}

// ============================================================================
// Repository source
// ============================================================================

/// Repository source that hands out an existing directory.
#[derive(Debug, Clone)]
pub struct StaticRepoSource {
    repo_path: PathBuf,
    tests: Vec<String>,
    error: Option<String>,
}

impl StaticRepoSource {
    #[must_use]
    pub fn new(repo_path: impl Into<PathBuf>, tests: Vec<String>) -> Self {
        Self {
            repo_path: repo_path.into(),
            tests,
            error: None,
        }
    }

    /// Source whose every materialization fails like a failed clone.
    #[must_use]
    pub fn with_error(message: &str) -> Self {
        Self {
            repo_path: PathBuf::new(),
            tests: Vec::new(),
            error: Some(message.to_string()),
        }
    }
}

#[async_trait]
impl RepoSource for StaticRepoSource {
    async fn materialize(&self, _repo_url: &str, _workspace_name: &str) -> Result<RepoAnalysis> {
        if let Some(message) = &self.error {
            return Err(RemedyError::clone_failed(message.clone()));
        }
        Ok(RepoAnalysis {
            repo_path: self.repo_path.clone(),
            discovered_tests: self.tests.clone(),
        })
    }
}
