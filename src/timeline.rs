//! Per-iteration CI timeline.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Test outcome of one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IterationStatus {
    Passed,
    Failed,
}

/// One entry of the timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationEvent {
    /// 1-based.
    pub iteration: u32,
    pub status: IterationStatus,
    /// Parsed failure count; only present for failed iterations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failures_remaining: Option<usize>,
    /// RFC 3339, UTC.
    pub timestamp: String,
}

/// Append-only list of iteration events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timeline {
    events: Vec<IterationEvent>,
}

impl Timeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_passed(&mut self, iteration: u32) {
        self.push(iteration, IterationStatus::Passed, None);
    }

    pub fn record_failed(&mut self, iteration: u32, failures_remaining: usize) {
        self.push(iteration, IterationStatus::Failed, Some(failures_remaining));
    }

    fn push(&mut self, iteration: u32, status: IterationStatus, failures_remaining: Option<usize>) {
        self.events.push(IterationEvent {
            iteration,
            status,
            failures_remaining,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        });
    }

    #[must_use]
    pub fn events(&self) -> &[IterationEvent] {
        &self.events
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_are_appended_in_order() {
        let mut timeline = Timeline::new();
        timeline.record_failed(1, 3);
        timeline.record_failed(2, 1);
        timeline.record_passed(3);

        let iterations: Vec<u32> = timeline.events().iter().map(|e| e.iteration).collect();
        assert_eq!(iterations, vec![1, 2, 3]);
        assert_eq!(timeline.events()[0].failures_remaining, Some(3));
        assert_eq!(timeline.events()[2].failures_remaining, None);
    }

    #[test]
    fn test_timestamp_is_rfc3339_utc() {
        let mut timeline = Timeline::new();
        timeline.record_passed(1);
        let ts = &timeline.events()[0].timestamp;
        assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
        assert!(ts.ends_with('Z'));
    }

    #[test]
    fn test_serializes_as_plain_list() {
        let mut timeline = Timeline::new();
        timeline.record_failed(1, 2);
        timeline.record_passed(2);

        let json = serde_json::to_value(&timeline).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["status"], "FAILED");
        assert_eq!(json[0]["failures_remaining"], 2);
        assert_eq!(json[1]["status"], "PASSED");
        assert!(json[1].get("failures_remaining").is_none());
    }
}
