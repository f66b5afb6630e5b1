//! Job model shared between the orchestrator, the store and the reporting
//! layer. One `Job` tracks a bulk refresh run; one `JobItem` tracks a single
//! ad-group target within it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a bulk refresh job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Paused,
    Failed,
}

impl JobStatus {
    /// Returns `true` if the given lifecycle transition is allowed.
    ///
    /// `pending → running → {completed, paused, failed}`, with `paused` and
    /// `failed` re-enterable into `running`. `completed` is terminal and no
    /// transition skips `running`.
    pub fn can_transition(self, to: JobStatus) -> bool {
        matches!(
            (self, to),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Paused)
                | (JobStatus::Running, JobStatus::Failed)
                | (JobStatus::Paused, JobStatus::Running)
                | (JobStatus::Failed, JobStatus::Running)
        )
    }
}

/// Per-attempt status of a single target within a job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Success,
    Failed,
    Skipped,
}

impl ItemStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ItemStatus::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Success => "success",
            ItemStatus::Failed => "failed",
            ItemStatus::Skipped => "skipped",
        }
    }
}

/// Why a target was skipped instead of refreshed. Not an error: the
/// precondition for publishing simply did not hold.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoExistingAd,
    NoFinalUrl,
    AlreadyProcessed,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::NoExistingAd => "no_existing_ad",
            SkipReason::NoFinalUrl => "no_final_url",
            SkipReason::AlreadyProcessed => "already_processed",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ad-group target as supplied by the input source (upload or
/// discovery). Immutable once a job has been created from it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdGroupTarget {
    pub account_id: String,
    pub ad_group_id: String,
    #[serde(default)]
    pub campaign_id: Option<String>,
    #[serde(default)]
    pub campaign_name: Option<String>,
}

/// One bulk refresh run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    pub total: u64,
    pub processed: u64,
    pub successful: u64,
    pub failed: u64,
    pub skipped: u64,
    pub input_source: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(total: u64, input_source: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Pending,
            total,
            processed: 0,
            successful: 0,
            failed: 0,
            skipped: 0,
            input_source,
            error_message: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }
}

/// One target within a job. `error_message` carries the failure error or the
/// skip reason, depending on `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobItem {
    pub id: Uuid,
    pub job_id: Uuid,
    pub account_id: String,
    pub campaign_id: Option<String>,
    pub campaign_name: Option<String>,
    pub ad_group_id: String,
    pub status: ItemStatus,
    pub new_ad_resource: Option<String>,
    pub error_message: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl JobItem {
    pub fn new(job_id: Uuid, target: &AdGroupTarget) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id,
            account_id: target.account_id.clone(),
            campaign_id: target.campaign_id.clone(),
            campaign_name: target.campaign_name.clone(),
            ad_group_id: target.ad_group_id.clone(),
            status: ItemStatus::Pending,
            new_ad_resource: None,
            error_message: None,
            processed_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn target(&self) -> AdGroupTarget {
        AdGroupTarget {
            account_id: self.account_id.clone(),
            ad_group_id: self.ad_group_id.clone(),
            campaign_id: self.campaign_id.clone(),
            campaign_name: self.campaign_name.clone(),
        }
    }
}

/// Outcome of processing one target, produced by the account dispatcher and
/// consumed by the orchestrator to update `JobItem`/`Job`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub account_id: String,
    pub ad_group_id: String,
    /// Backfilled from the prefetched campaign map when the input carried a
    /// campaign name without an id.
    pub campaign_id: Option<String>,
    pub outcome: TargetOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TargetOutcome {
    /// `new_ad_resource` is `None` for synthetic dry-run successes.
    Success { new_ad_resource: Option<String> },
    Skipped { reason: SkipReason },
    Failed { error: String },
}

impl ProcessingResult {
    pub fn success(account_id: &str, ad_group_id: &str, new_ad_resource: Option<String>) -> Self {
        Self {
            account_id: account_id.to_string(),
            ad_group_id: ad_group_id.to_string(),
            campaign_id: None,
            outcome: TargetOutcome::Success { new_ad_resource },
        }
    }

    pub fn skipped(account_id: &str, ad_group_id: &str, reason: SkipReason) -> Self {
        Self {
            account_id: account_id.to_string(),
            ad_group_id: ad_group_id.to_string(),
            campaign_id: None,
            outcome: TargetOutcome::Skipped { reason },
        }
    }

    pub fn failed(account_id: &str, ad_group_id: &str, error: impl Into<String>) -> Self {
        Self {
            account_id: account_id.to_string(),
            ad_group_id: ad_group_id.to_string(),
            campaign_id: None,
            outcome: TargetOutcome::Failed {
                error: error.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, TargetOutcome::Success { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_transitions() {
        assert!(JobStatus::Pending.can_transition(JobStatus::Running));
        assert!(JobStatus::Running.can_transition(JobStatus::Completed));
        assert!(JobStatus::Running.can_transition(JobStatus::Paused));
        assert!(JobStatus::Paused.can_transition(JobStatus::Running));
        assert!(JobStatus::Failed.can_transition(JobStatus::Running));

        // completed is terminal, and nothing skips running
        assert!(!JobStatus::Completed.can_transition(JobStatus::Running));
        assert!(!JobStatus::Pending.can_transition(JobStatus::Completed));
        assert!(!JobStatus::Paused.can_transition(JobStatus::Completed));
    }

    #[test]
    fn test_skip_reason_strings() {
        assert_eq!(SkipReason::NoExistingAd.to_string(), "no_existing_ad");
        assert_eq!(SkipReason::AlreadyProcessed.as_str(), "already_processed");
    }
}
