//! Optimizer client error types.

use thiserror::Error;

/// Errors from talking to the optimizer service.
///
/// The three failure classes matter downstream: connectivity failures are
/// retried by the queue, remote rejections are terminal, and an
/// infeasible solve is not an error at all (it arrives as a parsed
/// response with a non-usable status).
#[derive(Error, Debug)]
pub enum OptimizerError {
    /// The service could not be reached at all.
    #[error("Optimizer unreachable: {0}")]
    Unreachable(String),

    /// The request did not complete within the configured timeout.
    #[error("Optimizer request timed out after {0}s")]
    Timeout(u64),

    /// The service answered with a non-success HTTP status.
    #[error("Optimizer rejected request (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// The service answered 2xx but the body did not parse.
    #[error("Malformed optimizer response: {0}")]
    Decode(String),
}

impl OptimizerError {
    /// True for failures worth redelivering: the request may succeed on a
    /// later attempt. Rejections and malformed bodies will not improve
    /// with retries.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            OptimizerError::Unreachable(_) | OptimizerError::Timeout(_)
        )
    }
}
