//! Run report
//!
//! Machine-readable record of one enforcement run: which instances were
//! processed or skipped, which jobs changed owner, and what failed. Rendered
//! as JSON by the CLI when `--json` is given.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::enforcer::ApplyMode;

/// What happened to one selected job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Owner rewritten and persisted.
    Applied,
    /// Preview mode: change recorded, nothing written.
    Planned,
    /// Confirmation gate refused this job.
    Declined,
    /// Persisting the change failed; the run continued.
    Failed,
}

/// One selected job and its outcome.
#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    pub job: String,
    pub previous_owner: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-instance verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InstanceOutcome {
    /// The instance was processed; see the job list for details.
    Completed,
    /// The instance was skipped entirely (connect failure, invalid login).
    Skipped { reason: String },
}

/// Everything that happened on one instance.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceReport {
    pub instance: String,
    #[serde(flatten)]
    pub outcome: InstanceOutcome,
    pub jobs: Vec<JobOutcome>,
}

impl InstanceReport {
    pub fn completed(instance: String, jobs: Vec<JobOutcome>) -> Self {
        Self {
            instance,
            outcome: InstanceOutcome::Completed,
            jobs,
        }
    }

    pub fn skipped(instance: String, reason: String) -> Self {
        Self {
            instance,
            outcome: InstanceOutcome::Skipped { reason },
            jobs: Vec::new(),
        }
    }
}

/// Full record of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub mode: ApplyMode,
    /// The owner every selected job was driven toward. `None` only when no
    /// instance could be reached to resolve a default.
    pub target_login: Option<String>,
    pub instances: Vec<InstanceReport>,
}

impl RunReport {
    pub fn begin(mode: ApplyMode) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            mode,
            target_login: None,
            instances: Vec::new(),
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    fn job_count(&self, status: JobStatus) -> usize {
        self.instances
            .iter()
            .flat_map(|i| &i.jobs)
            .filter(|j| j.status == status)
            .count()
    }

    /// Jobs whose owner was rewritten.
    pub fn applied_count(&self) -> usize {
        self.job_count(JobStatus::Applied)
    }

    /// Jobs a preview run would have rewritten.
    pub fn planned_count(&self) -> usize {
        self.job_count(JobStatus::Planned)
    }

    /// Jobs whose mutation failed.
    pub fn failed_count(&self) -> usize {
        self.job_count(JobStatus::Failed)
    }

    /// Instances that were skipped entirely.
    pub fn skipped_instances(&self) -> usize {
        self.instances
            .iter()
            .filter(|i| matches!(i.outcome, InstanceOutcome::Skipped { .. }))
            .count()
    }

    /// Jobs found divergent from the target owner, whatever became of them.
    pub fn divergent_count(&self) -> usize {
        self.instances.iter().map(|i| i.jobs.len()).sum()
    }

    /// True when any instance was skipped or any job mutation failed.
    pub fn has_failures(&self) -> bool {
        self.skipped_instances() > 0 || self.failed_count() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(job: &str, status: JobStatus) -> JobOutcome {
        JobOutcome {
            job: job.to_string(),
            previous_owner: "old".to_string(),
            status,
            error: None,
        }
    }

    #[test]
    fn counters_span_instances() {
        let mut report = RunReport::begin(ApplyMode::Apply);
        report.instances.push(InstanceReport::completed(
            "alpha:1433".to_string(),
            vec![
                outcome("a", JobStatus::Applied),
                outcome("b", JobStatus::Failed),
            ],
        ));
        report.instances.push(InstanceReport::completed(
            "beta:1433".to_string(),
            vec![outcome("c", JobStatus::Applied)],
        ));
        report
            .instances
            .push(InstanceReport::skipped("gamma:1433".to_string(), "login missing".to_string()));
        report.finish();

        assert_eq!(report.applied_count(), 2);
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.skipped_instances(), 1);
        assert_eq!(report.divergent_count(), 3);
        assert!(report.has_failures());
        assert!(report.finished_at.is_some());
    }

    #[test]
    fn clean_run_has_no_failures() {
        let mut report = RunReport::begin(ApplyMode::Preview);
        report.instances.push(InstanceReport::completed(
            "alpha:1433".to_string(),
            vec![outcome("a", JobStatus::Planned)],
        ));
        assert!(!report.has_failures());
        assert_eq!(report.planned_count(), 1);
    }

    #[test]
    fn json_shape_is_stable() {
        let mut report = RunReport::begin(ApplyMode::Apply);
        report.target_login = Some("sa".to_string());
        report.instances.push(InstanceReport::skipped(
            "alpha:1433".to_string(),
            "unreachable".to_string(),
        ));
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["mode"], "apply");
        assert_eq!(value["target_login"], "sa");
        assert_eq!(value["instances"][0]["outcome"], "skipped");
        assert_eq!(value["instances"][0]["reason"], "unreachable");
    }
}
