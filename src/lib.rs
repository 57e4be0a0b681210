//! remedy - bounded CI remediation
//!
//! Clones an external repository, runs its test suite in a container
//! sandbox, classifies the failures and applies narrow deterministic fixes,
//! committing each one and pushing the result on a dedicated branch.
//!
//! # Architecture
//!
//! - [`r#loop`] - The coordinator and its stop conditions
//! - [`repo`] - Clone into a workspace and discover tests
//! - [`sandbox`] - Containerized test execution
//! - [`classify`] - Turn test output into categorized failure records
//! - [`fix`] - Per-category source edits
//! - [`vcs`] - Branch, commit and push
//! - [`timeline`], [`scoring`], [`report`] - Run outcome and persistence
//! - [`server`] - HTTP endpoints
//! - [`config`] - Configuration loading and validation
//! - [`error`] - Custom error types and handling
//! - [`testing`] - In-memory test doubles
//!
//! # Example
//!
//! ```rust,ignore
//! use remedy::config::Settings;
//! use remedy::r#loop::{Coordinator, RunRequest};
//!
//! let coordinator = Coordinator::from_settings(Settings::default())?;
//! let result = coordinator
//!     .run(RunRequest::new("https://github.com/org/repo.git", "Rift", "Ana"))
//!     .await;
//! println!("{} after {} commit(s)", result.final_status, result.commit_count);
//! ```

pub mod classify;
pub mod config;
pub mod error;
pub mod fix;
pub mod r#loop;
pub mod process;
pub mod repo;
pub mod report;
pub mod sandbox;
pub mod scoring;
pub mod server;
pub mod testing;
pub mod timeline;
pub mod vcs;

// Re-export commonly used types
pub use classify::{BugCategory, FailureClassifier, FailureRecord, RuleSet};
pub use config::Settings;
pub use error::{RemedyError, Result};
pub use fix::{CategoryFixer, FixOutcome, FixStatus};
pub use r#loop::{Coordinator, RunRequest};
pub use report::{FinalStatus, ReportStore, RunResult, StopReason};
