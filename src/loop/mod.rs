//! The remediation loop.
//!
//! - [`coordinator`] - Drives clone, test, classify, fix and commit for one run
//! - [`state`] - Counters that decide when the loop stops
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Coordinator │────>│ RepoSource   │────>│ TestExecutor │
//! │             │     │ (clone)      │     │ (sandbox)    │
//! └─────────────┘     └──────────────┘     └──────────────┘
//!       │                                        │
//!       v                                        v
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ LoopState   │<────│ CategoryFixer│<────│ Classifier   │
//! │ + Timeline  │     │ + VCS commit │     │              │
//! └─────────────┘     └──────────────┘     └──────────────┘
//! ```

pub mod coordinator;
pub mod state;

pub use coordinator::{
    branch_name, is_usable_name, workspace_name, Coordinator, LoopDependencies, RunRequest,
};
pub use state::LoopState;
