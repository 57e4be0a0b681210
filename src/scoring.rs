//! Run scoring.

use crate::config::ScoringConfig;
use serde::{Deserialize, Serialize};

/// Score components of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub base: u32,
    pub speed_bonus: u32,
    pub penalty: u32,
    pub final_score: u32,
}

/// `max(0, base + speed bonus - commit penalty)`.
///
/// The speed bonus applies when the run took strictly less than the
/// configured threshold. Every commit above the penalty threshold costs a
/// fixed amount.
#[must_use]
pub fn calculate_score(elapsed_secs: f64, commit_count: u32, config: &ScoringConfig) -> ScoreBreakdown {
    let speed_bonus = if elapsed_secs < config.speed_bonus_threshold_secs as f64 {
        config.speed_bonus_points
    } else {
        0
    };
    let extra_commits = commit_count.saturating_sub(config.commit_penalty_threshold);
    let penalty = extra_commits.saturating_mul(config.commit_penalty_per_extra_commit);
    let final_score = config
        .base_score
        .saturating_add(speed_bonus)
        .saturating_sub(penalty);

    ScoreBreakdown {
        base: config.base_score,
        speed_bonus,
        penalty,
        final_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(elapsed: f64, commits: u32) -> ScoreBreakdown {
        calculate_score(elapsed, commits, &ScoringConfig::default())
    }

    #[test]
    fn test_fast_run_with_few_commits() {
        assert_eq!(
            score(120.0, 3),
            ScoreBreakdown {
                base: 100,
                speed_bonus: 10,
                penalty: 0,
                final_score: 110,
            }
        );
    }

    #[test]
    fn test_bonus_threshold_is_exclusive() {
        assert_eq!(score(299.999, 0).speed_bonus, 10);
        assert_eq!(score(300.0, 0).speed_bonus, 0);
    }

    #[test]
    fn test_penalty_above_twenty_commits() {
        assert_eq!(score(400.0, 20).penalty, 0);
        let s = score(400.0, 25);
        assert_eq!(s.penalty, 10);
        assert_eq!(s.final_score, 90);
    }

    #[test]
    fn test_final_score_floors_at_zero() {
        let s = score(400.0, 200);
        assert_eq!(s.penalty, 360);
        assert_eq!(s.final_score, 0);
    }

    #[test]
    fn test_custom_weights() {
        let config = ScoringConfig {
            base_score: 50,
            speed_bonus_threshold_secs: 60,
            speed_bonus_points: 5,
            commit_penalty_threshold: 1,
            commit_penalty_per_extra_commit: 3,
        };
        let s = calculate_score(30.0, 3, &config);
        assert_eq!(s.final_score, 50 + 5 - 6);
    }
}
