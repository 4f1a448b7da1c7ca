//! Optimizer service integration: wire types and the HTTP client.

pub mod client;
pub mod error;
pub mod payload;
pub mod response;

pub use client::{OptimizerApi, OptimizerClient};
pub use error::OptimizerError;
pub use payload::SolverPayload;
pub use response::{HealthResponse, SolveResponse, SolveStatus, ValidateResponse};
