//! Run report and its durable store.

use crate::error::{RemedyError, Result};
use crate::fix::FixOutcome;
use crate::scoring::ScoreBreakdown;
use crate::timeline::IterationEvent;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Branch name reported before any run has completed.
pub const PLACEHOLDER_BRANCH: &str = "TEAM_NAME_LEADER_NAME_AI_Fix";

const TMP_SUFFIX: &str = ".tmp";
const LOCK_SUFFIX: &str = ".lock";

/// Test outcome of the run as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FinalStatus {
    Passed,
    Failed,
}

impl fmt::Display for FinalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => f.write_str("PASSED"),
            Self::Failed => f.write_str("FAILED"),
        }
    }
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    TestsPassed,
    UnparseableFailures,
    MaxRetryExhausted,
    RuntimeError,
    PushFailed,
}

impl StopReason {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TestsPassed => "tests_passed",
            Self::UnparseableFailures => "unparseable_failures",
            Self::MaxRetryExhausted => "max_retry_exhausted",
            Self::RuntimeError => "runtime_error",
            Self::PushFailed => "push_failed",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything known about one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub repo_url: String,
    pub team_name: String,
    pub leader_name: String,
    pub branch_name: String,
    pub total_failures: usize,
    pub fixes_applied: usize,
    #[serde(default)]
    pub commit_count: u32,
    pub final_status: FinalStatus,
    #[serde(default)]
    pub stop_reason: Option<StopReason>,
    #[serde(default)]
    pub error_message: Option<String>,
    pub time_taken_seconds: f64,
    pub score: ScoreBreakdown,
    #[serde(default)]
    pub fixes: Vec<FixOutcome>,
    #[serde(default)]
    pub ci_cd_timeline: Vec<IterationEvent>,
}

impl RunResult {
    /// Report shown when no run has been persisted yet.
    #[must_use]
    pub fn placeholder() -> Self {
        Self {
            repo_url: String::new(),
            team_name: String::new(),
            leader_name: String::new(),
            branch_name: PLACEHOLDER_BRANCH.to_string(),
            total_failures: 0,
            fixes_applied: 0,
            commit_count: 0,
            final_status: FinalStatus::Failed,
            stop_reason: None,
            error_message: None,
            time_taken_seconds: 0.0,
            score: ScoreBreakdown {
                base: 100,
                speed_bonus: 0,
                penalty: 0,
                final_score: 0,
            },
            fixes: Vec::new(),
            ci_cd_timeline: Vec::new(),
        }
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.final_status == FinalStatus::Passed
    }
}

/// Round seconds to millisecond precision.
#[must_use]
pub fn round_millis(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}

/// Persists the most recent [`RunResult`] as pretty JSON.
///
/// Writes go to a temporary file under an exclusive lock and are renamed into
/// place, so readers never see a partial report.
#[derive(Debug, Clone)]
pub struct ReportStore {
    path: PathBuf,
}

impl ReportStore {
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(suffix);
        self.path.with_file_name(name)
    }

    fn lock(&self, exclusive: bool) -> Result<File> {
        let lock_file = File::create(self.sibling(LOCK_SUFFIX))?;
        let locked = if exclusive {
            FileExt::lock_exclusive(&lock_file)
        } else {
            FileExt::lock_shared(&lock_file)
        };
        locked.map_err(|e| RemedyError::report(format!("Failed to acquire report lock: {e}")))?;
        Ok(lock_file)
    }

    /// Save `result`, replacing any previous report.
    pub fn save(&self, result: &RunResult) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let _lock = self.lock(true)?;

        let tmp_path = self.sibling(TMP_SUFFIX);
        let json = serde_json::to_string_pretty(result)?;
        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(json.as_bytes())?;
        tmp_file.sync_all()?;
        fs::rename(&tmp_path, &self.path)?;

        debug!("Report written to {}", self.path.display());
        Ok(())
    }

    /// Load the stored report, if any.
    pub fn load(&self) -> Result<Option<RunResult>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let _lock = self.lock(false)?;

        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&contents).map(Some).map_err(|e| {
            RemedyError::report(format!("Corrupted report at {}: {e}", self.path.display()))
        })
    }

    /// The stored report, or [`RunResult::placeholder`] when there is none or
    /// it cannot be read.
    #[must_use]
    pub fn load_last(&self) -> RunResult {
        match self.load() {
            Ok(Some(result)) => result,
            Ok(None) => RunResult::placeholder(),
            Err(e) => {
                warn!("{}", e);
                RunResult::placeholder()
            }
        }
    }
}
