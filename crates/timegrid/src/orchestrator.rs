//! Job orchestration facade.
//!
//! The single entry point the API layer calls: create, inspect, list and
//! cancel solver jobs, run validate-only checks, and sweep interrupted
//! jobs back into the queue at startup. Create/cancel only fail for
//! request-shape problems; solve-time failures are observed by polling.

use std::sync::Arc;

use chrono::Utc;
use log::{error, info, warn};

use crate::aggregator::{self, AggregateOutput};
use crate::config::Settings;
use crate::db::job_repo::{self, JobFilter, TransitionOutcome, TransitionUpdate};
use crate::db::{timetable_repo, Database};
use crate::domain::DomainStore;
use crate::error::{Result, TimegridError};
use crate::job::{JobConfig, JobError, JobStatus, SolverJob};
use crate::optimizer::client::OptimizerApi;
use crate::optimizer::response::{HealthResponse, ValidationSummary};
use crate::queue::{JobMessage, JobQueue};
use crate::timetable::Timetable;

/// The requesting principal, as supplied by the identity layer. The role
/// string is opaque except that `"admin"` is privileged.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: String,
    pub role: String,
    pub department_id: Option<String>,
}

impl Principal {
    pub fn is_privileged(&self) -> bool {
        self.role == "admin"
    }
}

/// A job submission.
#[derive(Debug, Clone)]
pub struct CreateJobRequest {
    pub department_id: String,
    pub semester: u8,
    pub academic_year: String,
    /// Display name; generated from the scope when absent.
    pub name: Option<String>,
    pub config: JobConfig,
}

/// What the submitter gets back, immediately.
#[derive(Debug, Clone)]
pub struct CreatedJob {
    pub job_id: String,
    pub status: JobStatus,
}

/// Outcome of a validate-only run.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub valid: bool,
    pub issues: Vec<String>,
    pub summary: ValidationSummary,
}

/// Per-status job counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobStats {
    pub pending: u64,
    pub queued: u64,
    pub running: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
}

pub struct Orchestrator {
    db: Database,
    queue: Arc<JobQueue>,
    domain: Arc<dyn DomainStore>,
    optimizer: Arc<dyn OptimizerApi>,
    settings: Settings,
}

impl Orchestrator {
    pub fn new(
        db: Database,
        queue: Arc<JobQueue>,
        domain: Arc<dyn DomainStore>,
        optimizer: Arc<dyn OptimizerApi>,
        settings: Settings,
    ) -> Self {
        Self {
            db,
            queue,
            domain,
            optimizer,
            settings,
        }
    }

    async fn aggregate(
        &self,
        department_id: &str,
        semester: u8,
        config: &JobConfig,
    ) -> Result<AggregateOutput> {
        Ok(aggregator::aggregate(
            self.domain.as_ref(),
            &self.settings,
            department_id,
            semester,
            config,
        )
        .await?)
    }

    /// Creates and enqueues a solver job. Returns the job id immediately;
    /// the solve itself runs out-of-band in the worker pool.
    pub async fn create_job(
        &self,
        principal: &Principal,
        request: CreateJobRequest,
    ) -> Result<CreatedJob> {
        if !(1..=8).contains(&request.semester) {
            return Err(TimegridError::Validation(format!(
                "Semester must be between 1 and 8, got {}",
                request.semester
            )));
        }
        let config = request
            .config
            .normalize()
            .map_err(|e| TimegridError::Validation(e.to_string()))?;

        let out = self
            .aggregate(&request.department_id, request.semester, &config)
            .await?;
        if out.payload.batches.is_empty() {
            return Err(TimegridError::Validation(format!(
                "No active batches for department {} semester {}",
                request.department_id, request.semester
            )));
        }

        let name = request.name.unwrap_or_else(|| {
            format!(
                "{} sem {} ({})",
                request.department_id, request.semester, request.academic_year
            )
        });
        let job = SolverJob::new(
            &principal.user_id,
            &request.department_id,
            request.semester,
            &request.academic_year,
            name,
            config,
            out.snapshot,
        );
        job_repo::insert(&self.db, &job, &out.payload)?;

        // Flip to queued before the enqueue attempt. A crash in between
        // leaves a queued row the startup recovery sweep re-enqueues, so
        // nothing is ever lost in pending.
        match job_repo::transition(&self.db, &job.id, JobStatus::Queued, TransitionUpdate::default())?
        {
            TransitionOutcome::Applied(_) => {}
            TransitionOutcome::Conflict(status) => {
                // Cancelled between insert and enqueue: nothing to run.
                return Ok(CreatedJob {
                    job_id: job.id,
                    status,
                });
            }
            TransitionOutcome::Missing => {
                return Err(JobError::NotFound(job.id).into());
            }
        }

        if let Err(e) = self.queue.enqueue(&job.id, out.payload) {
            let reason = format!("Failed to enqueue job: {}", e);
            error!("{}", reason);
            let _ = job_repo::transition(
                &self.db,
                &job.id,
                JobStatus::Failed,
                TransitionUpdate {
                    progress: Some(100),
                    error: Some(reason),
                    completed_at: Some(Utc::now()),
                    ..Default::default()
                },
            );
            return Err(TimegridError::Queue(e));
        }

        info!(
            "Created solver job {} for {}/{}",
            job.id, request.department_id, request.semester
        );
        Ok(CreatedJob {
            job_id: job.id,
            status: JobStatus::Queued,
        })
    }

    /// Fetches a job by id.
    pub fn get_job(&self, job_id: &str) -> Result<SolverJob> {
        job_repo::find_by_id(&self.db, job_id)?
            .ok_or_else(|| JobError::NotFound(job_id.to_string()).into())
    }

    /// Lists jobs. Non-privileged principals are narrowed to their
    /// department when they have one, otherwise to their own submissions.
    pub fn list_jobs(
        &self,
        principal: &Principal,
        mut filter: JobFilter,
    ) -> Result<(Vec<SolverJob>, u64)> {
        if !principal.is_privileged() {
            match &principal.department_id {
                Some(department_id) => filter.department_id = Some(department_id.clone()),
                None => filter.requested_by = Some(principal.user_id.clone()),
            }
        }
        Ok(job_repo::list(&self.db, &filter)?)
    }

    /// Cancels a job that has not reached a terminal state. The
    /// cancellation is status-only: an in-flight solve is not aborted,
    /// its late completion will simply lose the conditional update.
    pub fn cancel_job(&self, job_id: &str) -> Result<SolverJob> {
        let update = TransitionUpdate {
            completed_at: Some(Utc::now()),
            ..Default::default()
        };
        match job_repo::transition(&self.db, job_id, JobStatus::Cancelled, update)? {
            TransitionOutcome::Applied(job) => {
                info!("Cancelled job {}", job_id);
                Ok(job)
            }
            TransitionOutcome::Conflict(status) => Err(JobError::InvalidTransition {
                from: status,
                to: JobStatus::Cancelled,
            }
            .into()),
            TransitionOutcome::Missing => Err(JobError::NotFound(job_id.to_string()).into()),
        }
    }

    /// Runs aggregation and the optimizer's validate call without
    /// creating a job. An empty scope short-circuits to a local issue.
    pub async fn validate_only(&self, department_id: &str, semester: u8) -> Result<ValidationReport> {
        let out = self
            .aggregate(department_id, semester, &JobConfig::default())
            .await?;

        if out.payload.batches.is_empty() {
            return Ok(ValidationReport {
                valid: false,
                issues: vec![format!(
                    "No active batches for department {} semester {}",
                    department_id, semester
                )],
                summary: out.summary,
            });
        }

        let remote = self.optimizer.validate(&out.payload).await?;
        Ok(ValidationReport {
            valid: remote.valid,
            issues: remote.issues,
            summary: out.summary,
        })
    }

    /// Checks the optimizer service is reachable.
    pub async fn optimizer_health(&self) -> Result<HealthResponse> {
        Ok(self.optimizer.health().await?)
    }

    /// Fetches one timetable artifact.
    pub fn get_timetable(&self, timetable_id: &str) -> Result<Option<Timetable>> {
        Ok(timetable_repo::find_by_id(&self.db, timetable_id)?)
    }

    /// Lists the artifacts of a job in solution order.
    pub fn job_timetables(&self, job_id: &str) -> Result<Vec<Timetable>> {
        Ok(timetable_repo::list_by_job(&self.db, job_id)?)
    }

    /// Per-status job counts.
    pub fn job_stats(&self) -> Result<JobStats> {
        Ok(JobStats {
            pending: job_repo::count_by_status(&self.db, JobStatus::Pending)?,
            queued: job_repo::count_by_status(&self.db, JobStatus::Queued)?,
            running: job_repo::count_by_status(&self.db, JobStatus::Running)?,
            completed: job_repo::count_by_status(&self.db, JobStatus::Completed)?,
            failed: job_repo::count_by_status(&self.db, JobStatus::Failed)?,
            cancelled: job_repo::count_by_status(&self.db, JobStatus::Cancelled)?,
        })
    }

    /// Messages that exhausted their delivery budget.
    pub fn dead_letters(&self) -> Vec<JobMessage> {
        self.queue.dead_letters()
    }

    /// Re-enqueues jobs stranded in `queued` status, e.g. after a crash
    /// between the status flip and the enqueue, or a restart that lost
    /// the in-process channel. Call once at startup, before the worker
    /// pool starts consuming. Returns the number of jobs re-enqueued.
    pub fn recover_queued_jobs(&self) -> Result<usize> {
        let filter = JobFilter {
            status: Some(JobStatus::Queued),
            limit: Some(100_000),
            ..Default::default()
        };
        let (jobs, _) = job_repo::list(&self.db, &filter)?;

        let mut recovered = 0;
        for job in jobs {
            match job_repo::load_payload(&self.db, &job.id)? {
                Some(payload) => match self.queue.enqueue(&job.id, payload) {
                    Ok(()) => recovered += 1,
                    Err(e) => warn!("Failed to re-enqueue job {}: {}", job.id, e),
                },
                None => warn!("Job {} has no stored payload, skipping recovery", job.id),
            }
        }

        if recovered > 0 {
            info!("Re-enqueued {} interrupted jobs", recovered);
        }
        Ok(recovered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::domain::{Batch, BatchRequirement, InMemoryDomainStore};
    use crate::optimizer::error::OptimizerError;
    use crate::optimizer::payload::{Shift, SolverPayload};
    use crate::optimizer::response::{SolveResponse, ValidateResponse};

    struct StubOptimizer {
        validate_calls: AtomicU32,
        valid: bool,
        issues: Vec<String>,
    }

    impl StubOptimizer {
        fn accepting() -> Self {
            Self {
                validate_calls: AtomicU32::new(0),
                valid: true,
                issues: vec![],
            }
        }

        fn rejecting(issues: Vec<String>) -> Self {
            Self {
                validate_calls: AtomicU32::new(0),
                valid: false,
                issues,
            }
        }
    }

    #[async_trait]
    impl OptimizerApi for StubOptimizer {
        async fn health(&self) -> std::result::Result<HealthResponse, OptimizerError> {
            Ok(HealthResponse {
                status: "healthy".to_string(),
                service: "stub".to_string(),
            })
        }

        async fn validate(
            &self,
            _payload: &SolverPayload,
        ) -> std::result::Result<ValidateResponse, OptimizerError> {
            self.validate_calls.fetch_add(1, Ordering::SeqCst);
            Ok(ValidateResponse {
                valid: self.valid,
                issues: self.issues.clone(),
                summary: Default::default(),
            })
        }

        async fn solve(
            &self,
            _payload: &SolverPayload,
        ) -> std::result::Result<SolveResponse, OptimizerError> {
            Err(OptimizerError::Unreachable("stub".to_string()))
        }
    }

    fn batch(id: &str, dept: &str, semester: u8) -> Batch {
        Batch {
            id: id.to_string(),
            code: format!("{}-{}", dept, semester),
            department_id: dept.to_string(),
            semester,
            size: 60,
            shift: Shift::Morning,
            active: true,
            subjects: vec![BatchRequirement {
                subject_id: "s1".to_string(),
                classes_per_week: 4,
                assigned_faculty_id: None,
            }],
        }
    }

    fn admin() -> Principal {
        Principal {
            user_id: "root".to_string(),
            role: "admin".to_string(),
            department_id: None,
        }
    }

    fn requester(user_id: &str, department_id: Option<&str>) -> Principal {
        Principal {
            user_id: user_id.to_string(),
            role: "coordinator".to_string(),
            department_id: department_id.map(str::to_string),
        }
    }

    fn orchestrator_with(
        store: InMemoryDomainStore,
        optimizer: StubOptimizer,
    ) -> (Orchestrator, Arc<JobQueue>) {
        let db = Database::open_in_memory().unwrap();
        let queue = Arc::new(JobQueue::new(8, 3, Duration::from_millis(10)));
        let orchestrator = Orchestrator::new(
            db,
            Arc::clone(&queue),
            Arc::new(store),
            Arc::new(optimizer),
            Settings::default(),
        );
        (orchestrator, queue)
    }

    fn request(dept: &str, semester: u8) -> CreateJobRequest {
        CreateJobRequest {
            department_id: dept.to_string(),
            semester,
            academic_year: "2026-27".to_string(),
            name: None,
            config: JobConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_create_job_enqueues_and_returns_queued() {
        let store = InMemoryDomainStore::new().with_batches(vec![batch("b1", "d1", 3)]);
        let (orchestrator, queue) = orchestrator_with(store, StubOptimizer::accepting());

        let created = orchestrator
            .create_job(&admin(), request("d1", 3))
            .await
            .unwrap();
        assert_eq!(created.status, JobStatus::Queued);

        let job = orchestrator.get_job(&created.job_id).unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.requested_by, "root");
        assert_eq!(job.input.batch_ids, vec!["b1"]);
        assert!(!job.name.is_empty());

        let message = queue.consume().await.unwrap();
        assert_eq!(message.job_id, created.job_id);
        assert_eq!(message.payload.batches.len(), 1);
    }

    #[tokio::test]
    async fn test_create_job_rejects_empty_scope_without_row() {
        let store = InMemoryDomainStore::new();
        let (orchestrator, _queue) = orchestrator_with(store, StubOptimizer::accepting());

        let err = orchestrator
            .create_job(&admin(), request("d1", 3))
            .await
            .unwrap_err();
        assert!(matches!(err, TimegridError::Validation(_)));

        // Nothing was persisted.
        assert_eq!(orchestrator.job_stats().unwrap(), JobStats::default());
    }

    #[tokio::test]
    async fn test_create_job_rejects_bad_semester() {
        let store = InMemoryDomainStore::new().with_batches(vec![batch("b1", "d1", 3)]);
        let (orchestrator, _queue) = orchestrator_with(store, StubOptimizer::accepting());

        let err = orchestrator
            .create_job(&admin(), request("d1", 9))
            .await
            .unwrap_err();
        assert!(matches!(err, TimegridError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_job_rejects_unknown_weight() {
        let store = InMemoryDomainStore::new().with_batches(vec![batch("b1", "d1", 3)]);
        let (orchestrator, _queue) = orchestrator_with(store, StubOptimizer::accepting());

        let mut req = request("d1", 3);
        req.config.weights.insert("sparkle".to_string(), 5);

        let err = orchestrator.create_job(&admin(), req).await.unwrap_err();
        assert!(matches!(err, TimegridError::Validation(_)));
        assert_eq!(orchestrator.job_stats().unwrap(), JobStats::default());
    }

    #[tokio::test]
    async fn test_enqueue_failure_marks_job_failed() {
        let store = InMemoryDomainStore::new().with_batches(vec![batch("b1", "d1", 3)]);
        let (orchestrator, queue) = orchestrator_with(store, StubOptimizer::accepting());
        queue.close().await;

        let err = orchestrator
            .create_job(&admin(), request("d1", 3))
            .await
            .unwrap_err();
        assert!(matches!(err, TimegridError::Queue(_)));

        // The job exists and records why it never ran.
        let stats = orchestrator.job_stats().unwrap();
        assert_eq!(stats.failed, 1);
        let (jobs, _) = orchestrator
            .list_jobs(&admin(), JobFilter::default())
            .unwrap();
        assert_eq!(jobs[0].status, JobStatus::Failed);
        assert!(jobs[0].error.as_deref().unwrap().contains("enqueue"));
    }

    #[tokio::test]
    async fn test_get_job_not_found() {
        let (orchestrator, _queue) =
            orchestrator_with(InMemoryDomainStore::new(), StubOptimizer::accepting());

        let err = orchestrator.get_job("ghost").unwrap_err();
        assert!(matches!(err, TimegridError::Job(JobError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_cancel_queued_job() {
        let store = InMemoryDomainStore::new().with_batches(vec![batch("b1", "d1", 3)]);
        let (orchestrator, _queue) = orchestrator_with(store, StubOptimizer::accepting());

        let created = orchestrator
            .create_job(&admin(), request("d1", 3))
            .await
            .unwrap();
        let cancelled = orchestrator.cancel_job(&created.job_id).unwrap();
        assert_eq!(cancelled.status, JobStatus::Cancelled);
        assert!(cancelled.error.is_none());
    }

    #[tokio::test]
    async fn test_cancel_terminal_job_is_rejected() {
        let store = InMemoryDomainStore::new().with_batches(vec![batch("b1", "d1", 3)]);
        let (orchestrator, _queue) = orchestrator_with(store, StubOptimizer::accepting());

        let created = orchestrator
            .create_job(&admin(), request("d1", 3))
            .await
            .unwrap();
        orchestrator.cancel_job(&created.job_id).unwrap();

        let err = orchestrator.cancel_job(&created.job_id).unwrap_err();
        assert!(matches!(
            err,
            TimegridError::Job(JobError::InvalidTransition {
                from: JobStatus::Cancelled,
                to: JobStatus::Cancelled,
            })
        ));

        // State unchanged.
        let job = orchestrator.get_job(&created.job_id).unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_missing_job() {
        let (orchestrator, _queue) =
            orchestrator_with(InMemoryDomainStore::new(), StubOptimizer::accepting());

        let err = orchestrator.cancel_job("ghost").unwrap_err();
        assert!(matches!(err, TimegridError::Job(JobError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_jobs_narrowing() {
        let store = InMemoryDomainStore::new()
            .with_batches(vec![batch("b1", "d1", 3), batch("b2", "d2", 3)]);
        let (orchestrator, _queue) = orchestrator_with(store, StubOptimizer::accepting());

        orchestrator
            .create_job(&requester("alice", Some("d1")), request("d1", 3))
            .await
            .unwrap();
        orchestrator
            .create_job(&requester("bob", Some("d2")), request("d2", 3))
            .await
            .unwrap();

        // Admin sees everything.
        let (jobs, total) = orchestrator
            .list_jobs(&admin(), JobFilter::default())
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(jobs.len(), 2);

        // Department members are narrowed to their department.
        let (jobs, total) = orchestrator
            .list_jobs(&requester("carol", Some("d1")), JobFilter::default())
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(jobs[0].department_id, "d1");

        // A principal without a department only sees their submissions.
        let (_, total) = orchestrator
            .list_jobs(&requester("alice", None), JobFilter::default())
            .unwrap();
        assert_eq!(total, 1);
        let (_, total) = orchestrator
            .list_jobs(&requester("mallory", None), JobFilter::default())
            .unwrap();
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_validate_only_with_batches_calls_remote() {
        let store = InMemoryDomainStore::new().with_batches(vec![batch("b1", "d1", 3)]);
        let optimizer = StubOptimizer::rejecting(vec!["Faculty f1: no valid subjects".to_string()]);
        let (orchestrator, _queue) = orchestrator_with(store, optimizer);

        let report = orchestrator.validate_only("d1", 3).await.unwrap();
        assert!(!report.valid);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.summary.batches, 1);
        assert_eq!(report.summary.total_classes_per_week, 4);

        // No job was created.
        assert_eq!(orchestrator.job_stats().unwrap(), JobStats::default());
    }

    #[tokio::test]
    async fn test_validate_only_empty_scope_skips_remote() {
        let optimizer = StubOptimizer::accepting();
        let (orchestrator, _queue) = orchestrator_with(InMemoryDomainStore::new(), optimizer);

        let report = orchestrator.validate_only("d1", 3).await.unwrap();
        assert!(!report.valid);
        assert!(report.issues[0].contains("No active batches"));
    }

    #[tokio::test]
    async fn test_recover_queued_jobs_reenqueues_stranded_rows() {
        let store = InMemoryDomainStore::new().with_batches(vec![batch("b1", "d1", 3)]);
        let (orchestrator, queue) = orchestrator_with(store, StubOptimizer::accepting());

        let created = orchestrator
            .create_job(&admin(), request("d1", 3))
            .await
            .unwrap();
        // Drain the live delivery to simulate a restart that lost the
        // in-process channel while the row stayed queued.
        let _ = queue.consume().await.unwrap();

        let recovered = orchestrator.recover_queued_jobs().unwrap();
        assert_eq!(recovered, 1);

        let message = queue.consume().await.unwrap();
        assert_eq!(message.job_id, created.job_id);
        assert_eq!(message.attempt, 0);
    }

    #[tokio::test]
    async fn test_recover_ignores_terminal_jobs() {
        let store = InMemoryDomainStore::new().with_batches(vec![batch("b1", "d1", 3)]);
        let (orchestrator, queue) = orchestrator_with(store, StubOptimizer::accepting());

        let created = orchestrator
            .create_job(&admin(), request("d1", 3))
            .await
            .unwrap();
        let _ = queue.consume().await.unwrap();
        orchestrator.cancel_job(&created.job_id).unwrap();

        assert_eq!(orchestrator.recover_queued_jobs().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_optimizer_health_passthrough() {
        let (orchestrator, _queue) =
            orchestrator_with(InMemoryDomainStore::new(), StubOptimizer::accepting());

        let health = orchestrator.optimizer_health().await.unwrap();
        assert_eq!(health.status, "healthy");
    }
}
