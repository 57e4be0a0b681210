//! Per-run loop state.

use serde::{Deserialize, Serialize};

/// Counters tracked across the iterations of one run.
///
/// # Example
///
/// ```
/// use remedy::r#loop::state::LoopState;
///
/// let mut state = LoopState::new();
/// state.next_iteration();
/// state.record_unparseable();
/// state.record_unparseable();
/// assert!(state.is_unparseable_limit(2));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopState {
    /// Current iteration number (1-indexed after the first run)
    pub iteration: u32,
    /// Consecutive failed iterations that yielded no parsed failure
    pub consecutive_unparseable: u32,
    /// Parsed failures summed over all iterations
    pub total_failures: usize,
    /// Commits created so far
    pub commit_count: u32,
}

impl LoopState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment iteration counter.
    pub fn next_iteration(&mut self) {
        self.iteration += 1;
    }

    /// A failed iteration produced no failure records.
    pub fn record_unparseable(&mut self) {
        self.consecutive_unparseable += 1;
    }

    /// A failed iteration produced `count` failure records.
    pub fn record_classified(&mut self, count: usize) {
        self.consecutive_unparseable = 0;
        self.total_failures += count;
    }

    pub fn record_commit(&mut self) {
        self.commit_count += 1;
    }

    #[must_use]
    pub fn is_unparseable_limit(&self, threshold: u32) -> bool {
        self.consecutive_unparseable >= threshold
    }
}
