//! Testing infrastructure for remedy.
//!
//! In-memory doubles for the loop's external collaborators (git, the test
//! sandbox and repository cloning), so the coordinator can be exercised
//! without network, containers or real repositories.
//!
//! # Example
//!
//! ```rust,ignore
//! use remedy::testing::{MockVersionControl, ScriptedExecutor, StaticRepoSource};
//!
//! let vcs = MockVersionControl::new().with_push_error("denied");
//! let executor = ScriptedExecutor::always_passing();
//! let source = StaticRepoSource::new("/tmp/repo", vec![]);
//! ```

pub mod mocks;

pub use mocks::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::RepoSource;
    use crate::sandbox::{TestExecutor, TestRunOutcome};
    use crate::vcs::{CommitOutcome, VcsProvider, VersionControl};
    use std::path::Path;

    // =========================================================================
    // Mock Version Control Tests
    // =========================================================================

    #[tokio::test]
    async fn test_mock_vcs_records_calls_across_clones() {
        let vcs = MockVersionControl::new();
        let handle = vcs.open(Path::new("/repo"));

        handle.create_branch("B").await.unwrap();
        assert_eq!(
            handle.commit_file("a.py", "Fix SYNTAX in a.py:1").await,
            CommitOutcome::Committed
        );
        handle.push_branch("B").await.unwrap();

        assert_eq!(vcs.branches(), vec!["B".to_string()]);
        assert_eq!(
            vcs.commits(),
            vec![("a.py".to_string(), "[AI-AGENT] Fix SYNTAX in a.py:1".to_string())]
        );
        assert_eq!(vcs.pushes(), vec!["B".to_string()]);
    }

    #[tokio::test]
    async fn test_mock_vcs_unchanged_and_failing() {
        let vcs = MockVersionControl::new().with_unchanged_files(&["a.py"]);
        assert_eq!(vcs.commit_file("a.py", "m").await, CommitOutcome::NoChanges);
        assert_eq!(vcs.commit_file("b.py", "m").await, CommitOutcome::Committed);

        let failing = MockVersionControl::new().with_commit_failure("locked");
        assert_eq!(
            failing.commit_file("a.py", "m").await,
            CommitOutcome::Failed {
                reason: "locked".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_mock_vcs_errors() {
        let vcs = MockVersionControl::new()
            .with_create_branch_error("exists")
            .with_push_error("denied");
        assert!(vcs.create_branch("B").await.is_err());
        assert!(vcs.push_branch("B").await.is_err());
        assert!(vcs.pushes().is_empty());
    }

    // =========================================================================
    // Scripted Executor Tests
    // =========================================================================

    #[tokio::test]
    async fn test_scripted_executor_repeats_last_outcome() {
        let executor = ScriptedExecutor::new(vec![
            TestRunOutcome::failed(1, "first"),
            TestRunOutcome::passed("second"),
        ]);
        let repo = Path::new("/repo");

        assert_eq!(executor.run(repo, &[]).await.output, "first");
        assert_eq!(executor.run(repo, &[]).await.output, "second");
        assert_eq!(executor.run(repo, &[]).await.output, "second");
        assert_eq!(executor.call_count(), 3);
    }

    #[tokio::test]
    async fn test_empty_script_fails() {
        let executor = ScriptedExecutor::new(Vec::new());
        assert!(!executor.run(Path::new("/repo"), &[]).await.passed);
    }

    // =========================================================================
    // Static Repo Source Tests
    // =========================================================================

    #[tokio::test]
    async fn test_static_repo_source() {
        let source = StaticRepoSource::new("/repo", vec!["tests/test_a.py".to_string()]);
        let analysis = source.materialize("url", "ws").await.unwrap();
        assert_eq!(analysis.repo_path, Path::new("/repo"));
        assert_eq!(analysis.discovered_tests, vec!["tests/test_a.py".to_string()]);

        let failing = StaticRepoSource::with_error("not found");
        assert!(failing.materialize("url", "ws").await.is_err());
    }
}
