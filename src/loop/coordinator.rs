//! Coordinator for one remediation run.
//!
//! A run moves through: branch/workspace naming, clone and test discovery,
//! branch creation, then up to `max_retry` iterations of
//! test → classify → fix → commit. Whatever happens, exactly one
//! [`RunResult`] is produced and persisted.

use super::state::LoopState;
use crate::classify::{FailureClassifier, RuleSet};
use crate::config::Settings;
use crate::error::Result;
use crate::fix::{CategoryFixer, FixOutcome};
use crate::report::{round_millis, FinalStatus, ReportStore, RunResult, StopReason};
use crate::repo::{GitCloner, RepoSource};
use crate::sandbox::{DockerSandbox, TestExecutor};
use crate::scoring::calculate_score;
use crate::timeline::Timeline;
use crate::vcs::{CommitOutcome, GitCliProvider, VcsProvider, VersionControl};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info, warn};

static NON_ALNUM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9]+").expect("pattern is valid"));

fn sanitize(name: &str) -> String {
    NON_ALNUM_RE
        .replace_all(name.trim(), "_")
        .trim_matches('_')
        .to_string()
}

/// Whether `name` keeps at least one character once sanitized for a branch.
#[must_use]
pub fn is_usable_name(name: &str) -> bool {
    !sanitize(name).is_empty()
}

/// `{TEAM}_{LEADER}_AI_Fix`, with non-alphanumeric runs collapsed to `_`.
///
/// ```
/// use remedy::r#loop::branch_name;
///
/// assert_eq!(branch_name("Rift Raiders", "Ana-María"), "RIFT_RAIDERS_ANA_MAR_A_AI_Fix");
/// ```
#[must_use]
pub fn branch_name(team_name: &str, leader_name: &str) -> String {
    format!(
        "{}_{}_AI_Fix",
        sanitize(team_name).to_uppercase(),
        sanitize(leader_name).to_uppercase()
    )
}

/// Unique workspace directory name: `{Team}_{Leader}_{unix_secs}_{suffix}`.
#[must_use]
pub fn workspace_name(team_name: &str, leader_name: &str) -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}_{}_{}_{}",
        sanitize(team_name),
        sanitize(leader_name),
        secs,
        &suffix[..8]
    )
}

/// Input of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub repo_url: String,
    pub team_name: String,
    pub leader_name: String,
    /// Overrides `loop.max_retry`; values below 1 are raised to 1.
    pub max_retry: Option<u32>,
}

impl RunRequest {
    #[must_use]
    pub fn new(
        repo_url: impl Into<String>,
        team_name: impl Into<String>,
        leader_name: impl Into<String>,
    ) -> Self {
        Self {
            repo_url: repo_url.into(),
            team_name: team_name.into(),
            leader_name: leader_name.into(),
            max_retry: None,
        }
    }

    #[must_use]
    pub fn with_max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = Some(max_retry);
        self
    }
}

/// External collaborators of the coordinator.
#[derive(Clone)]
pub struct LoopDependencies {
    pub repo_source: Arc<dyn RepoSource>,
    pub executor: Arc<dyn TestExecutor>,
    pub vcs: Arc<dyn VcsProvider>,
}

impl LoopDependencies {
    /// Git clone, Docker sandbox and git CLI, configured from `settings`.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            repo_source: Arc::new(GitCloner::from_config(&settings.paths, &settings.git)),
            executor: Arc::new(DockerSandbox::new(settings.sandbox.clone())),
            vcs: Arc::new(GitCliProvider::new(settings.git.clone())),
        }
    }
}

/// Mutable record of a run in progress.
struct RunProgress {
    state: LoopState,
    timeline: Timeline,
    fixes: Vec<FixOutcome>,
    final_status: FinalStatus,
    stop_reason: Option<StopReason>,
    error_message: Option<String>,
}

impl RunProgress {
    fn new() -> Self {
        Self {
            state: LoopState::new(),
            timeline: Timeline::new(),
            fixes: Vec::new(),
            final_status: FinalStatus::Failed,
            stop_reason: None,
            error_message: None,
        }
    }
}

/// Runs the remediation loop. Holds no per-run state, so one instance can
/// serve concurrent runs.
pub struct Coordinator {
    deps: LoopDependencies,
    classifier: FailureClassifier,
    fixer: CategoryFixer,
    settings: Settings,
    store: ReportStore,
}

impl Coordinator {
    /// # Errors
    ///
    /// Fails when the classifier cannot be built from the configured
    /// extensions.
    pub fn new(settings: Settings, deps: LoopDependencies) -> Result<Self> {
        let classifier = FailureClassifier::new(
            RuleSet::default(),
            &settings.classifier.file_extensions,
        )?
        .with_alias_root(settings.sandbox.workdir.clone());
        let fixer = CategoryFixer::new(settings.classifier.indent_width);
        let store = ReportStore::new(&settings.paths.results_path);

        Ok(Self {
            deps,
            classifier,
            fixer,
            settings,
            store,
        })
    }

    /// Coordinator with the production collaborators.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let deps = LoopDependencies::from_settings(&settings);
        Self::new(settings, deps)
    }

    #[must_use]
    pub fn store(&self) -> &ReportStore {
        &self.store
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Execute one run. Never fails: errors end up in the report.
    pub async fn run(&self, request: RunRequest) -> RunResult {
        let started = Instant::now();
        let branch = branch_name(&request.team_name, &request.leader_name);
        let workspace = workspace_name(&request.team_name, &request.leader_name);
        let max_retry = request
            .max_retry
            .unwrap_or(self.settings.loop_config.max_retry)
            .max(1);

        info!(
            "Starting run for {} on branch {} (max {} iterations)",
            request.repo_url, branch, max_retry
        );

        let mut progress = RunProgress::new();
        let iterated = self
            .iterate(&request, &branch, &workspace, max_retry, &mut progress)
            .await;
        match iterated {
            Ok(Some(vcs)) if progress.state.commit_count > 0 => {
                if let Err(e) = vcs.push_branch(&branch).await {
                    warn!("Push of {} failed: {}", branch, e);
                    progress.stop_reason = Some(StopReason::PushFailed);
                    progress.error_message = Some(e.to_string());
                }
            }
            Ok(_) => {}
            Err(e) => {
                error!("Run failed: {}", e);
                progress.final_status = FinalStatus::Failed;
                progress.stop_reason = Some(StopReason::RuntimeError);
                progress.error_message = Some(e.to_string());
            }
        }

        let elapsed = started.elapsed().as_secs_f64();
        let score = calculate_score(elapsed, progress.state.commit_count, &self.settings.scoring);
        let fixes_applied = progress.fixes.iter().filter(|f| f.is_fixed()).count();

        let result = RunResult {
            repo_url: request.repo_url,
            team_name: request.team_name,
            leader_name: request.leader_name,
            branch_name: branch,
            total_failures: progress.state.total_failures,
            fixes_applied,
            commit_count: progress.state.commit_count,
            final_status: progress.final_status,
            stop_reason: progress.stop_reason,
            error_message: progress.error_message,
            time_taken_seconds: round_millis(elapsed),
            score,
            fixes: progress.fixes,
            ci_cd_timeline: progress.timeline.events().to_vec(),
        };

        info!(
            "Run finished: {} ({}), {} commit(s), score {}",
            result.final_status,
            result.stop_reason.map_or("none", |r| r.as_str()),
            result.commit_count,
            result.score.final_score
        );

        self.persist(&result).await;
        result
    }

    /// Save `result` off the async workers; the store takes a blocking lock.
    async fn persist(&self, result: &RunResult) {
        let store = self.store.clone();
        let snapshot = result.clone();
        let saved = tokio::task::spawn_blocking(move || store.save(&snapshot)).await;
        match saved {
            Ok(Ok(())) => debug!("Report saved to {}", self.store.path().display()),
            Ok(Err(e)) => error!("Failed to persist report: {}", e),
            Err(e) => error!("Report persistence task failed: {}", e),
        }
    }

    /// Clone, branch and iterate. Returns the working copy's VCS handle once
    /// the loop has ended normally.
    async fn iterate(
        &self,
        request: &RunRequest,
        branch: &str,
        workspace: &str,
        max_retry: u32,
        progress: &mut RunProgress,
    ) -> Result<Option<Arc<dyn VersionControl>>> {
        let analysis = self
            .deps
            .repo_source
            .materialize(&request.repo_url, workspace)
            .await?;
        let vcs = self.deps.vcs.open(&analysis.repo_path);
        vcs.create_branch(branch).await?;

        let threshold = self.settings.loop_config.unparseable_stop_threshold;

        while progress.state.iteration < max_retry {
            progress.state.next_iteration();
            let iteration = progress.state.iteration;
            info!("Iteration {}/{}", iteration, max_retry);

            let outcome = self
                .deps
                .executor
                .run(&analysis.repo_path, &analysis.discovered_tests)
                .await;

            if outcome.passed {
                progress.timeline.record_passed(iteration);
                progress.final_status = FinalStatus::Passed;
                progress.stop_reason = Some(StopReason::TestsPassed);
                return Ok(Some(vcs));
            }

            let failures = self.classifier.parse(&outcome.output, &analysis.repo_path);
            progress.timeline.record_failed(iteration, failures.len());

            if failures.is_empty() {
                progress.state.record_unparseable();
                warn!(
                    "Iteration {} failed (exit {}) without parseable failures ({} in a row)",
                    iteration, outcome.exit_code, progress.state.consecutive_unparseable
                );
                if progress.state.is_unparseable_limit(threshold) {
                    progress.stop_reason = Some(StopReason::UnparseableFailures);
                    return Ok(Some(vcs));
                }
                continue;
            }

            progress.state.record_classified(failures.len());
            info!("Iteration {}: {} failure(s)", iteration, failures.len());

            for failure in &failures {
                let fix = self.fixer.apply_fix(&analysis.repo_path, failure);
                let fix = if fix.is_fixed() {
                    match vcs.commit_file(&fix.file, &fix.commit_message).await {
                        CommitOutcome::Committed => {
                            progress.state.record_commit();
                            fix
                        }
                        CommitOutcome::NoChanges => {
                            debug!("No changes for {}:{}", fix.file, fix.line);
                            fix.demoted()
                        }
                        CommitOutcome::Failed { reason } => {
                            warn!("Commit for {}:{} failed: {}", fix.file, fix.line, reason);
                            fix.demoted()
                        }
                    }
                } else {
                    fix
                };
                progress.fixes.push(fix);
            }
        }

        progress.stop_reason = Some(StopReason::MaxRetryExhausted);
        Ok(Some(vcs))
    }
}
