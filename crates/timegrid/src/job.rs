//! Solver job model and status state machine.
//!
//! A `SolverJob` tracks one request to generate candidate timetables for
//! a department/semester scope. All status mutations flow through the
//! transition rules here; the repository enforces them with conditional
//! updates so racing writers cannot resurrect a terminal job.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::optimizer::payload::SOFT_CONSTRAINT_NAMES;

/// Errors for job lookups and state transitions.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("Unknown constraint weight '{0}'")]
    UnknownWeight(String),
}

/// Job lifecycle status.
///
/// `pending → queued → running → {completed | failed | cancelled}`, with
/// `pending → failed` for enqueue failures and `running → running` for
/// redelivered attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "queued" => Some(JobStatus::Queued),
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            "cancelled" => Some(JobStatus::Cancelled),
            _ => None,
        }
    }

    /// Terminal states admit no outgoing transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Queued | Failed | Cancelled)
                | (Queued, Running | Failed | Cancelled)
                | (Running, Running | Completed | Failed | Cancelled)
        )
    }

    /// The states a transition to `next` may legally start from.
    pub fn allowed_sources(next: JobStatus) -> Vec<JobStatus> {
        use JobStatus::*;
        [Pending, Queued, Running, Completed, Failed, Cancelled]
            .into_iter()
            .filter(|from| from.can_transition_to(next))
            .collect()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-job solver configuration supplied at submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    pub timeout_seconds: u32,
    pub max_solutions: u32,
    /// Soft-constraint weight overrides, keyed by constraint name.
    #[serde(default)]
    pub weights: BTreeMap<String, u32>,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 300,
            max_solutions: 5,
            weights: BTreeMap::new(),
        }
    }
}

impl JobConfig {
    /// Validates weight keys against the closed constraint-name set and
    /// clamps all numeric fields into their solver-accepted ranges.
    /// Unknown keys are rejected, not dropped.
    pub fn normalize(mut self) -> Result<Self, JobError> {
        for key in self.weights.keys() {
            if !SOFT_CONSTRAINT_NAMES.contains(&key.as_str()) {
                return Err(JobError::UnknownWeight(key.clone()));
            }
        }
        for weight in self.weights.values_mut() {
            *weight = (*weight).clamp(1, 10);
        }
        self.timeout_seconds = self.timeout_seconds.clamp(30, 3600);
        self.max_solutions = self.max_solutions.clamp(1, 10);
        Ok(self)
    }
}

/// The exact set of entity ids and configuration references a payload was
/// built from. Stored with the job for auditability.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputSnapshot {
    pub batch_ids: Vec<String>,
    pub faculty_ids: Vec<String>,
    pub room_ids: Vec<String>,
    pub subject_ids: Vec<String>,
    pub time_slot_config_id: Option<String>,
    pub constraint_config_id: Option<String>,
    pub fixed_slot_count: usize,
}

/// One result entry per ingested candidate timetable, in solver order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResultEntry {
    pub score: f64,
    pub timetable_id: String,
    pub hard_violations: u32,
    pub soft_violations: u32,
    #[serde(default)]
    pub violation_details: Vec<String>,
}

/// A tracked timetable-generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverJob {
    pub id: String,
    pub name: String,
    pub requested_by: String,
    pub department_id: String,
    pub semester: u8,
    pub academic_year: String,
    pub status: JobStatus,
    pub progress: u8,
    pub config: JobConfig,
    pub input: InputSnapshot,
    pub results: Vec<JobResultEntry>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SolverJob {
    /// Creates a new job in `pending` status.
    pub fn new(
        requested_by: &str,
        department_id: &str,
        semester: u8,
        academic_year: &str,
        name: String,
        config: JobConfig,
        input: InputSnapshot,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            requested_by: requested_by.to_string(),
            department_id: department_id.to_string(),
            semester,
            academic_year: academic_year.to_string(),
            status: JobStatus::Pending,
            progress: 0,
            config,
            input,
            results: vec![],
            error: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }
}
