//! Configuration management for remedy.
//!
//! Settings are read from a TOML file (`remedy.toml` by default). Every
//! section is optional; a missing file yields [`Settings::default`].
//!
//! # Example remedy.toml
//!
//! ```toml
//! [loop]
//! max_retry = 3
//!
//! [sandbox]
//! image = "python:3.12-slim"
//! timeout_secs = 300
//!
//! [scoring]
//! speed_bonus_threshold_secs = 600
//! ```

use crate::error::{RemedyError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "remedy.toml";

/// Default number of test iterations per run.
pub const DEFAULT_MAX_RETRY: u32 = 5;

/// Consecutive iterations without a classifiable failure before the loop
/// gives up.
pub const UNPARSEABLE_STOP_THRESHOLD: u32 = 2;

/// Marker prepended to every automated commit message.
pub const AUTOMATION_MARKER: &str = "[AI-AGENT]";

// ============================================================================
// Sections
// ============================================================================

/// Iteration bounds for the remediation loop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoopConfig {
    /// Maximum number of test executions per run.
    pub max_retry: u32,
    /// Consecutive unparseable iterations that stop the run.
    pub unparseable_stop_threshold: u32,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_retry: DEFAULT_MAX_RETRY,
            unparseable_stop_threshold: UNPARSEABLE_STOP_THRESHOLD,
        }
    }
}

/// Container sandbox used to run the target test suite.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SandboxConfig {
    /// Container runtime binary looked up on PATH.
    pub runtime: String,
    /// Image the tests run in.
    pub image: String,
    /// Mount point of the repository inside the container.
    pub workdir: String,
    /// Hard wall-clock limit for one sandboxed test run.
    pub timeout_secs: u64,
    /// Named volume shared across runs for the pip download cache.
    pub pip_cache_volume: String,
    /// Dependency manifests installed when present, in order.
    pub requirement_files: Vec<String>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            runtime: "docker".to_string(),
            image: "python:3.11-slim".to_string(),
            workdir: "/workspace".to_string(),
            timeout_secs: 180,
            pip_cache_volume: "remedy_pip_cache".to_string(),
            requirement_files: vec![
                "requirements.txt".to_string(),
                "requirements-dev.txt".to_string(),
                "dev-requirements.txt".to_string(),
            ],
        }
    }
}

impl SandboxConfig {
    /// Test run deadline as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Git invocation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GitConfig {
    /// Deadline for local git commands (checkout, add, diff, commit).
    pub command_timeout_secs: u64,
    /// Deadline for `git push`.
    pub push_timeout_secs: u64,
    /// Deadline for `git clone`.
    pub clone_timeout_secs: u64,
    /// Remote pushed to.
    pub remote: String,
    /// Author name used for automated commits.
    pub author_name: String,
    /// Author email used for automated commits.
    pub author_email: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: 30,
            push_timeout_secs: 120,
            clone_timeout_secs: 120,
            remote: "origin".to_string(),
            author_name: "remedy-bot".to_string(),
            author_email: "remedy-bot@users.noreply.github.com".to_string(),
        }
    }
}

/// Score calculation constants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScoringConfig {
    pub base_score: u32,
    pub speed_bonus_threshold_secs: u64,
    pub speed_bonus_points: u32,
    pub commit_penalty_threshold: u32,
    pub commit_penalty_per_extra_commit: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base_score: 100,
            speed_bonus_threshold_secs: 300,
            speed_bonus_points: 10,
            commit_penalty_threshold: 20,
            commit_penalty_per_extra_commit: 2,
        }
    }
}

/// Failure classification and fixing knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Source extensions recognised in `file:line: message` output.
    pub file_extensions: Vec<String>,
    /// Spaces a tab expands to when normalizing indentation.
    pub indent_width: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            file_extensions: vec!["py".to_string()],
            indent_width: 4,
        }
    }
}

/// Filesystem locations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    /// Parent directory of per-run workspaces.
    pub workspaces_dir: PathBuf,
    /// Location of the last persisted run report.
    pub results_path: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            workspaces_dir: PathBuf::from("workspaces"),
            results_path: PathBuf::from("results/results.json"),
        }
    }
}

/// HTTP API bind address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

// ============================================================================
// Settings
// ============================================================================

/// Complete remedy configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    #[serde(rename = "loop")]
    pub loop_config: LoopConfig,
    pub sandbox: SandboxConfig,
    pub git: GitConfig,
    pub scoring: ScoringConfig,
    pub classifier: ClassifierConfig,
    pub paths: PathsConfig,
    pub server: ServerConfig,
}

impl Settings {
    /// Load settings from `path`, falling back to defaults when the file is
    /// absent.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            RemedyError::config_with_path(format!("cannot read: {e}"), path.to_path_buf())
        })?;
        let settings: Settings = toml::from_str(&content).map_err(|e| {
            RemedyError::config_with_path(format!("cannot parse: {e}"), path.to_path_buf())
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`RemedyError::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.loop_config.max_retry == 0 {
            return Err(RemedyError::invalid_config(
                "loop.max_retry",
                "must be a positive integer",
            ));
        }
        if self.loop_config.unparseable_stop_threshold == 0 {
            return Err(RemedyError::invalid_config(
                "loop.unparseable_stop_threshold",
                "must be at least 1",
            ));
        }

        let timeouts = [
            ("sandbox.timeout_secs", self.sandbox.timeout_secs),
            ("git.command_timeout_secs", self.git.command_timeout_secs),
            ("git.push_timeout_secs", self.git.push_timeout_secs),
            ("git.clone_timeout_secs", self.git.clone_timeout_secs),
        ];
        for (field, value) in timeouts {
            if value == 0 {
                return Err(RemedyError::invalid_config(field, "timeout must be non-zero"));
            }
        }

        if self.sandbox.runtime.trim().is_empty() {
            return Err(RemedyError::invalid_config("sandbox.runtime", "must not be empty"));
        }
        if self.sandbox.image.trim().is_empty() {
            return Err(RemedyError::invalid_config("sandbox.image", "must not be empty"));
        }
        if self.classifier.file_extensions.is_empty() {
            return Err(RemedyError::invalid_config(
                "classifier.file_extensions",
                "at least one extension is required",
            ));
        }
        if self.classifier.indent_width == 0 {
            return Err(RemedyError::invalid_config(
                "classifier.indent_width",
                "must be at least 1",
            ));
        }

        Ok(())
    }
}
