use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, error, info, warn};
use tokio::task::JoinHandle;
use tracing::{info_span, Instrument};

use crate::db::job_repo::{self, TransitionOutcome, TransitionUpdate};
use crate::db::{timetable_repo, Database, DatabaseError};
use crate::job::{JobResultEntry, JobStatus, SolverJob};
use crate::optimizer::client::OptimizerApi;
use crate::optimizer::payload::SolverPayload;
use crate::optimizer::response::SolveResponse;
use crate::queue::{JobMessage, JobQueue};
use crate::timetable::Timetable;

/// A pool of concurrent queue consumers. Each worker pulls one message at
/// a time and drives it to completion before taking the next.
pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Starts `worker_count` consumers against the shared queue.
    ///
    /// # Panics
    /// Panics if `worker_count` is 0.
    pub fn new(
        db: Database,
        queue: Arc<JobQueue>,
        optimizer: Arc<dyn OptimizerApi>,
        worker_count: usize,
    ) -> Self {
        assert!(worker_count > 0, "worker_count must be > 0");
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let db = db.clone();
            let queue = Arc::clone(&queue);
            let optimizer = Arc::clone(&optimizer);
            let shutdown_flag = Arc::clone(&shutdown);

            workers.push(tokio::spawn(run_worker(
                worker_id,
                db,
                queue,
                optimizer,
                shutdown_flag,
            )));
        }

        info!("Started {} workers", worker_count);

        Self { workers, shutdown }
    }

    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Waits for all workers to exit. Call [`WorkerPool::shutdown`] first.
    pub async fn wait(self) {
        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.await {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }
}

async fn run_worker(
    worker_id: usize,
    db: Database,
    queue: Arc<JobQueue>,
    optimizer: Arc<dyn OptimizerApi>,
    shutdown: Arc<AtomicBool>,
) {
    debug!("Worker {} started", worker_id);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match tokio::time::timeout(Duration::from_millis(100), queue.consume()).await {
            Ok(Some(message)) => {
                debug!("Worker {} processing job {}", worker_id, message.job_id);
                let span = info_span!(
                    "solver_job",
                    worker_id,
                    job_id = %message.job_id,
                    attempt = message.attempt,
                );
                process_message(&db, &queue, optimizer.as_ref(), message)
                    .instrument(span)
                    .await;
            }
            Ok(None) => {
                debug!("Worker {} job channel disconnected", worker_id);
                break;
            }
            Err(_) => {
                // Poll tick, check the shutdown flag again.
                continue;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}

/// Processes one dequeued job end to end: mark running, solve, then
/// either ingest the solutions or record the failure. Decides ack/nack
/// based on the failure class and the message's remaining attempt budget.
async fn process_message(
    db: &Database,
    queue: &JobQueue,
    optimizer: &dyn OptimizerApi,
    message: JobMessage,
) {
    let job_id = message.job_id.clone();

    // Redelivery guard: a job that already reached a terminal state must
    // not be touched again, however many times its message arrives.
    match job_repo::find_by_id(db, &job_id) {
        Ok(Some(job)) if job.status.is_terminal() => {
            debug!("Job {} already {}, dropping redelivery", job_id, job.status);
            queue.ack(&message);
            return;
        }
        Ok(Some(_)) => {}
        Ok(None) => {
            warn!("Dropping message for unknown job {}", job_id);
            queue.ack(&message);
            return;
        }
        Err(e) => {
            error!("Failed to load job {}: {}", job_id, e);
            queue.nack(message, true).await;
            return;
        }
    }

    // Step 1: mark running before calling out.
    let running = TransitionUpdate {
        progress: Some(10),
        started_at: Some(Utc::now()),
        ..Default::default()
    };
    let job = match job_repo::transition(db, &job_id, JobStatus::Running, running) {
        Ok(TransitionOutcome::Applied(job)) => job,
        Ok(TransitionOutcome::Conflict(status)) => {
            info!("Job {} is {} and no longer runnable, dropping", job_id, status);
            queue.ack(&message);
            return;
        }
        Ok(TransitionOutcome::Missing) => {
            queue.ack(&message);
            return;
        }
        Err(e) => {
            error!("Failed to mark job {} running: {}", job_id, e);
            queue.nack(message, true).await;
            return;
        }
    };

    // Step 2: the long-running remote solve.
    let outcome = optimizer.solve(&message.payload).await;

    // Step 3: persist what came back.
    match outcome {
        Ok(response) if response.status.is_usable() && !response.solutions.is_empty() => {
            match ingest_solutions(db, &job, &message.payload, &response) {
                Ok(()) => queue.ack(&message),
                Err(e) => {
                    error!("Failed to ingest results for job {}: {}", job_id, e);
                    record_failure(db, &job_id, &format!("Result ingestion failed: {}", e));
                    queue.nack(message, false).await;
                }
            }
        }
        Ok(response) => {
            // Infeasible, solver timeout or solver-side error: terminal,
            // a retry would only repeat the same answer.
            let reason = if response.message.is_empty() {
                format!("Solver returned status '{}'", response.status.as_str())
            } else {
                format!(
                    "Solver returned status '{}': {}",
                    response.status.as_str(),
                    response.message
                )
            };
            record_failure(db, &job_id, &reason);
            queue.ack(&message);
        }
        Err(e) if e.is_transient() && message.attempt + 1 < queue.max_attempts() => {
            warn!(
                "Transient optimizer failure for job {} (attempt {}): {}",
                job_id, message.attempt, e
            );
            queue.nack(message, true).await;
        }
        Err(e) => {
            // Terminal client error, or the attempt budget is spent.
            // Record the failure first so dead-lettering stays a safety
            // net, not the primary bookkeeping.
            let transient = e.is_transient();
            record_failure(db, &job_id, &e.to_string());
            if transient {
                queue.nack(message, false).await;
            } else {
                queue.ack(&message);
            }
        }
    }
}

/// Creates one draft timetable per returned solution and completes the
/// job with matching result entries, in solver order. If the completion
/// loses against a concurrent cancellation the artifacts are rolled back.
fn ingest_solutions(
    db: &Database,
    job: &SolverJob,
    payload: &SolverPayload,
    response: &SolveResponse,
) -> Result<(), DatabaseError> {
    let mut entries = Vec::with_capacity(response.solutions.len());
    for (ordinal, solution) in response.solutions.iter().enumerate() {
        let timetable = Timetable::from_solution(job, &payload.time_slots, solution, ordinal);
        timetable_repo::insert(db, &timetable, ordinal as u32)?;
        entries.push(JobResultEntry {
            score: solution.score.clamp(0.0, 1.0),
            timetable_id: timetable.id,
            hard_violations: solution.violations.hard,
            soft_violations: solution.violations.soft,
            violation_details: solution
                .violation_details
                .iter()
                .map(|d| d.description.clone())
                .collect(),
        });
    }

    let completed = TransitionUpdate {
        progress: Some(100),
        results: Some(entries),
        completed_at: Some(Utc::now()),
        ..Default::default()
    };
    match job_repo::transition(db, &job.id, JobStatus::Completed, completed)? {
        TransitionOutcome::Applied(_) => {
            info!(
                "Job {} completed with {} timetables",
                job.id,
                response.solutions.len()
            );
            Ok(())
        }
        TransitionOutcome::Conflict(status) => {
            info!(
                "Job {} became {} during ingestion, discarding {} artifacts",
                job.id,
                status,
                response.solutions.len()
            );
            timetable_repo::delete_for_job(db, &job.id)?;
            Ok(())
        }
        TransitionOutcome::Missing => Ok(()),
    }
}

/// Flips the job to `failed` with a human-readable reason. A no-op when
/// the job already reached a terminal state.
fn record_failure(db: &Database, job_id: &str, reason: &str) {
    let update = TransitionUpdate {
        progress: Some(100),
        error: Some(reason.to_string()),
        completed_at: Some(Utc::now()),
        ..Default::default()
    };
    match job_repo::transition(db, job_id, JobStatus::Failed, update) {
        Ok(TransitionOutcome::Applied(_)) => info!("Job {} failed: {}", job_id, reason),
        Ok(TransitionOutcome::Conflict(status)) => {
            info!("Job {} already {}, not recording failure", job_id, status)
        }
        Ok(TransitionOutcome::Missing) => {
            warn!("Job {} vanished while recording failure", job_id)
        }
        Err(e) => error!("Failed to record failure for job {}: {}", job_id, e),
    }
}
