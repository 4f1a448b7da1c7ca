//! Runtime settings for the orchestration pipeline.
//!
//! Every field has a serde default so partial configuration files work;
//! `Settings::default()` is the documented baseline.

use serde::Deserialize;

fn default_optimizer_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_solve_margin_secs() -> u64 {
    60
}

fn default_worker_concurrency() -> usize {
    2
}

fn default_queue_capacity() -> usize {
    256
}

fn default_max_delivery_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_slots_per_day() -> u8 {
    6
}

fn default_solver_workers() -> u32 {
    4
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Base URL of the optimizer service.
    #[serde(default = "default_optimizer_url")]
    pub optimizer_url: String,

    /// Timeout for health and validate calls, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Margin added to each job's solver budget to bound the solve call.
    #[serde(default = "default_solve_margin_secs")]
    pub solve_margin_secs: u64,

    /// Number of concurrent worker consumers.
    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,

    /// Maximum in-flight messages in the job queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Delivery attempts per message before dead-lettering.
    #[serde(default = "default_max_delivery_attempts")]
    pub max_delivery_attempts: u32,

    /// First redelivery backoff in milliseconds; doubles per attempt.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Non-break slots per day used when no calendar configuration exists.
    #[serde(default = "default_slots_per_day")]
    pub default_slots_per_day: u8,

    /// Parallelism hint forwarded to the solver service.
    #[serde(default = "default_solver_workers")]
    pub solver_workers: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            optimizer_url: default_optimizer_url(),
            request_timeout_secs: default_request_timeout_secs(),
            solve_margin_secs: default_solve_margin_secs(),
            worker_concurrency: default_worker_concurrency(),
            queue_capacity: default_queue_capacity(),
            max_delivery_attempts: default_max_delivery_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            default_slots_per_day: default_slots_per_day(),
            solver_workers: default_solver_workers(),
        }
    }
}
