pub mod aggregator;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod job;
pub mod optimizer;
pub mod orchestrator;
pub mod queue;
pub mod telemetry;
pub mod timetable;
pub mod worker;

pub use config::Settings;
pub use db::Database;
pub use domain::{DomainStore, InMemoryDomainStore};
pub use error::{Result, TimegridError};
pub use job::{JobConfig, JobStatus, SolverJob};
pub use optimizer::{OptimizerApi, OptimizerClient, SolverPayload};
pub use orchestrator::{
    CreateJobRequest, CreatedJob, JobStats, Orchestrator, Principal, ValidationReport,
};
pub use queue::JobQueue;
pub use timetable::Timetable;
pub use worker::WorkerPool;
