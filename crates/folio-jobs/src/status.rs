//! Job status state machine and priority levels.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a processing job.
///
/// Legal transitions: `Queued → Processing → {Completed | Failed | Timeout}`
/// and `Queued → Cancelled`. Terminal states are immutable. Cancellation is
/// never legal once processing has started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Timeout,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Timeout => "timeout",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(JobStatus::Queued),
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            "timeout" => Some(JobStatus::Timeout),
            "cancelled" => Some(JobStatus::Cancelled),
            _ => None,
        }
    }

    /// Whether this state admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Timeout | JobStatus::Cancelled
        )
    }

    /// Whether the transition `self → to` is legal.
    pub fn can_transition(&self, to: JobStatus) -> bool {
        match (self, to) {
            (JobStatus::Queued, JobStatus::Processing) => true,
            (JobStatus::Queued, JobStatus::Cancelled) => true,
            (JobStatus::Processing, JobStatus::Completed) => true,
            (JobStatus::Processing, JobStatus::Failed) => true,
            (JobStatus::Processing, JobStatus::Timeout) => true,
            _ => false,
        }
    }
}

/// Queue priority of a processing job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobPriority {
    High,
    #[default]
    Normal,
    Low,
}

impl JobPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobPriority::High => "high",
            JobPriority::Normal => "normal",
            JobPriority::Low => "low",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "high" => Some(JobPriority::High),
            "normal" => Some(JobPriority::Normal),
            "low" => Some(JobPriority::Low),
            _ => None,
        }
    }

    /// Expected queue wait in seconds, used for completion estimates.
    pub fn queue_wait_secs(&self) -> i64 {
        match self {
            JobPriority::High => 5,
            JobPriority::Normal => 30,
            JobPriority::Low => 120,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_transitions() {
        assert!(JobStatus::Queued.can_transition(JobStatus::Processing));
        assert!(JobStatus::Queued.can_transition(JobStatus::Cancelled));
        assert!(JobStatus::Processing.can_transition(JobStatus::Completed));
        assert!(JobStatus::Processing.can_transition(JobStatus::Failed));
        assert!(JobStatus::Processing.can_transition(JobStatus::Timeout));
    }

    #[test]
    fn test_cancel_only_from_queued() {
        assert!(!JobStatus::Processing.can_transition(JobStatus::Cancelled));
        assert!(!JobStatus::Completed.can_transition(JobStatus::Cancelled));
        assert!(!JobStatus::Failed.can_transition(JobStatus::Cancelled));
    }

    #[test]
    fn test_terminal_states_immutable() {
        for terminal in [
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::Timeout,
            JobStatus::Cancelled,
        ] {
            assert!(terminal.is_terminal());
            for target in [
                JobStatus::Queued,
                JobStatus::Processing,
                JobStatus::Completed,
                JobStatus::Failed,
                JobStatus::Timeout,
                JobStatus::Cancelled,
            ] {
                assert!(!terminal.can_transition(target));
            }
        }
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            JobStatus::Queued,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::Timeout,
            JobStatus::Cancelled,
        ] {
            assert_eq!(JobStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(JobStatus::parse("unknown"), None);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(
            JobPriority::High.queue_wait_secs() < JobPriority::Normal.queue_wait_secs()
        );
        assert!(
            JobPriority::Normal.queue_wait_secs() < JobPriority::Low.queue_wait_secs()
        );
    }
}
