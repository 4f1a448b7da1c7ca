//! At-least-once job queue.
//!
//! Carries job-execution messages from submission to the worker pool over
//! a bounded channel with an explicit ack/nack contract. A nacked message
//! is redelivered with exponential backoff until its attempt budget runs
//! out, then parked on the dead-letter list for inspection. Durability
//! comes from the job store, not the channel: rows still in `queued`
//! status at startup are swept back in by the orchestrator.

use std::sync::Mutex as StdMutex;
use std::time::Duration;

use log::{debug, error, info, warn};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::Mutex;

use crate::optimizer::payload::SolverPayload;

/// Errors from queue operations.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Job queue is closed")]
    Closed,

    #[error("Job queue is full")]
    Full,
}

/// One job-execution message. `attempt` counts deliveries, starting at 0.
#[derive(Debug, Clone)]
pub struct JobMessage {
    pub job_id: String,
    pub payload: SolverPayload,
    pub attempt: u32,
}

pub struct JobQueue {
    tx: mpsc::Sender<JobMessage>,
    rx: Mutex<mpsc::Receiver<JobMessage>>,
    max_attempts: u32,
    backoff_base: Duration,
    dead_letters: StdMutex<Vec<JobMessage>>,
}

impl JobQueue {
    /// Creates a queue holding at most `capacity` in-flight messages.
    /// `max_attempts` bounds deliveries per message; `backoff_base` is
    /// the first redelivery delay and doubles per attempt.
    pub fn new(capacity: usize, max_attempts: u32, backoff_base: Duration) -> Self {
        assert!(max_attempts > 0, "max_attempts must be > 0");
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Mutex::new(rx),
            max_attempts,
            backoff_base,
            dead_letters: StdMutex::new(Vec::new()),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Enqueues a first delivery for a job. Never blocks; a full or
    /// closed queue is reported to the submitter instead.
    pub fn enqueue(&self, job_id: &str, payload: SolverPayload) -> Result<(), QueueError> {
        let message = JobMessage {
            job_id: job_id.to_string(),
            payload,
            attempt: 0,
        };
        self.send_now(message)
    }

    fn send_now(&self, message: JobMessage) -> Result<(), QueueError> {
        self.tx.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => QueueError::Full,
            mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
        })
    }

    /// Receives the next message, waiting until one is available or the
    /// queue is closed. Safe to call from multiple consumers.
    pub async fn consume(&self) -> Option<JobMessage> {
        self.rx.lock().await.recv().await
    }

    /// Acknowledges successful processing. The message is done for good.
    pub fn ack(&self, message: &JobMessage) {
        debug!(
            "Acked job {} (attempt {})",
            message.job_id, message.attempt
        );
    }

    /// Negatively acknowledges a message. With `requeue`, it is
    /// redelivered after an exponential backoff while the attempt budget
    /// lasts; otherwise (or once the budget is spent) it is dead-lettered.
    pub async fn nack(&self, message: JobMessage, requeue: bool) {
        let next_attempt = message.attempt + 1;
        if !requeue || next_attempt >= self.max_attempts {
            warn!(
                "Dead-lettering job {} after {} deliveries",
                message.job_id, next_attempt
            );
            match self.dead_letters.lock() {
                Ok(mut parked) => parked.push(message),
                Err(_) => error!("Dead-letter list lock poisoned, dropping message"),
            }
            return;
        }

        let delay = self.backoff_base * 2u32.pow(message.attempt);
        info!(
            "Requeueing job {} (attempt {}) in {:?}",
            message.job_id, next_attempt, delay
        );

        let tx = self.tx.clone();
        let next = JobMessage {
            attempt: next_attempt,
            ..message
        };
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(next).await.is_err() {
                warn!("Queue closed, dropping redelivery");
            }
        });
    }

    /// Messages that exhausted their attempt budget.
    pub fn dead_letters(&self) -> Vec<JobMessage> {
        self.dead_letters
            .lock()
            .map(|parked| parked.clone())
            .unwrap_or_default()
    }

    /// Closes the queue. Pending messages are still delivered; new sends
    /// fail with [`QueueError::Closed`].
    pub async fn close(&self) {
        self.rx.lock().await.close();
    }
}
