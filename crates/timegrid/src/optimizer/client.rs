//! HTTP client for the external optimizer service.
//!
//! The service exposes `GET /health`, `POST /api/v1/validate` and
//! `POST /api/v1/solve`, JSON in and out. Solves are long-running, so the
//! solve call gets a per-request timeout derived from the payload's own
//! solver budget plus a margin; health and validate use the short request
//! timeout.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;

use super::error::OptimizerError;
use super::payload::SolverPayload;
use super::response::{HealthResponse, SolveResponse, ValidateResponse};

/// Maximum length for error bodies captured into error messages, to keep
/// logs and job error strings bounded.
const MAX_ERROR_BODY_LENGTH: usize = 200;

fn truncate_error_body(body: &str) -> String {
    if body.len() > MAX_ERROR_BODY_LENGTH {
        format!("{}... (truncated)", &body[..MAX_ERROR_BODY_LENGTH])
    } else {
        body.to_string()
    }
}

/// The optimizer surface the worker pool and orchestrator depend on.
/// Implemented over HTTP in production and by scripted stubs in tests.
#[async_trait]
pub trait OptimizerApi: Send + Sync {
    async fn health(&self) -> Result<HealthResponse, OptimizerError>;
    async fn validate(&self, payload: &SolverPayload) -> Result<ValidateResponse, OptimizerError>;
    async fn solve(&self, payload: &SolverPayload) -> Result<SolveResponse, OptimizerError>;
}

/// HTTP implementation of [`OptimizerApi`].
pub struct OptimizerClient {
    http: Client,
    base_url: String,
    request_timeout: Duration,
    solve_margin: Duration,
}

impl OptimizerClient {
    /// Creates a client for the service at `base_url` (no trailing slash
    /// required). `request_timeout_secs` bounds health/validate calls;
    /// `solve_margin_secs` is added on top of each payload's solver
    /// budget to bound solve calls.
    pub fn new(base_url: &str, request_timeout_secs: u64, solve_margin_secs: u64) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(request_timeout_secs),
            solve_margin: Duration::from_secs(solve_margin_secs),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn transport_error(e: reqwest::Error, timeout_secs: u64) -> OptimizerError {
        if e.is_timeout() {
            OptimizerError::Timeout(timeout_secs)
        } else {
            OptimizerError::Unreachable(e.to_string())
        }
    }

    /// Translates a completed HTTP response into the parsed body or the
    /// appropriate error class.
    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, OptimizerError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OptimizerError::Rejected {
                status: status.as_u16(),
                message: truncate_error_body(&body),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| OptimizerError::Decode(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| OptimizerError::Decode(e.to_string()))
    }
}

#[async_trait]
impl OptimizerApi for OptimizerClient {
    async fn health(&self) -> Result<HealthResponse, OptimizerError> {
        let timeout_secs = self.request_timeout.as_secs();
        let response = self
            .http
            .get(self.url("/health"))
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| Self::transport_error(e, timeout_secs))?;

        Self::read_json(response).await
    }

    async fn validate(&self, payload: &SolverPayload) -> Result<ValidateResponse, OptimizerError> {
        debug!(
            "Validating payload: {} batches, {} faculties",
            payload.batches.len(),
            payload.faculties.len()
        );

        let timeout_secs = self.request_timeout.as_secs();
        let response = self
            .http
            .post(self.url("/api/v1/validate"))
            .timeout(self.request_timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| Self::transport_error(e, timeout_secs))?;

        Self::read_json(response).await
    }

    async fn solve(&self, payload: &SolverPayload) -> Result<SolveResponse, OptimizerError> {
        let solve_timeout =
            Duration::from_secs(payload.config.timeout_seconds as u64) + self.solve_margin;

        info!(
            "Submitting solve: {} batches, {} faculties, budget {}s",
            payload.batches.len(),
            payload.faculties.len(),
            payload.config.timeout_seconds
        );

        let response = self
            .http
            .post(self.url("/api/v1/solve"))
            .timeout(solve_timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| Self::transport_error(e, solve_timeout.as_secs()))?;

        let parsed: SolveResponse = Self::read_json(response).await?;
        info!(
            "Solve returned status={} with {} solutions in {:.1}s",
            parsed.status.as_str(),
            parsed.solutions.len(),
            parsed.solve_time_seconds
        );
        Ok(parsed)
    }
}
