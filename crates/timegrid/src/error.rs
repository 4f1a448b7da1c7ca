use thiserror::Error;

#[derive(Error, Debug)]
pub enum TimegridError {
    /// Bad request shape: invalid scope, unknown weight key, empty scope.
    /// Rejected synchronously, no job row is created.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Aggregation error: {0}")]
    Aggregate(#[from] crate::aggregator::AggregateError),

    #[error("Job error: {0}")]
    Job(#[from] crate::job::JobError),

    #[error("Queue error: {0}")]
    Queue(#[from] crate::queue::QueueError),

    #[error("Optimizer error: {0}")]
    Optimizer(#[from] crate::optimizer::OptimizerError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

pub type Result<T> = std::result::Result<T, TimegridError>;
