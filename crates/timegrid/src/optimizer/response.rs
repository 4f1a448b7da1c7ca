//! Solver response wire types.
//!
//! Mirrors the optimizer service's output schema. Fields this pipeline
//! does not consume (per-solution metrics, solver statistics) are ignored
//! during deserialization.

use serde::{Deserialize, Serialize};

/// Terminal status reported by the solve endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolveStatus {
    Optimal,
    Feasible,
    Infeasible,
    Timeout,
    Error,
    #[serde(other)]
    Unknown,
}

impl SolveStatus {
    /// True when the response carries usable solutions.
    pub fn is_usable(&self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::Feasible)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SolveStatus::Optimal => "optimal",
            SolveStatus::Feasible => "feasible",
            SolveStatus::Infeasible => "infeasible",
            SolveStatus::Timeout => "timeout",
            SolveStatus::Error => "error",
            SolveStatus::Unknown => "unknown",
        }
    }
}

fn default_duration() -> u8 {
    1
}

/// One scheduled class in a returned solution, in the solver's neutral
/// event representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverEvent {
    pub day: String,
    pub slot: u8,
    pub batch_id: String,
    pub subject_id: String,
    pub faculty_id: String,
    pub room_id: String,
    #[serde(default = "default_duration")]
    pub duration: u8,
    #[serde(default)]
    pub is_fixed: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationCounts {
    #[serde(default)]
    pub hard: u32,
    #[serde(default)]
    pub soft: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationDetail {
    #[serde(rename = "type")]
    pub kind: String,
    pub constraint: String,
    pub description: String,
    #[serde(default)]
    pub severity: String,
}

/// One scored candidate schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub score: f64,
    pub events: Vec<SolverEvent>,
    #[serde(default)]
    pub violations: ViolationCounts,
    #[serde(default)]
    pub violation_details: Vec<ViolationDetail>,
}

/// The full solve response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveResponse {
    pub status: SolveStatus,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub solve_time_seconds: f64,
    #[serde(default)]
    pub solutions: Vec<Solution>,
    #[serde(default)]
    pub best_solution_index: usize,
}

/// Summary counts echoed by the validate endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSummary {
    #[serde(default)]
    pub faculties: usize,
    #[serde(default)]
    pub rooms: usize,
    #[serde(default)]
    pub subjects: usize,
    #[serde(default)]
    pub batches: usize,
    #[serde(default)]
    pub total_classes_per_week: u32,
}

/// Response from the validate endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub valid: bool,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub summary: ValidationSummary,
}

/// Response from the health endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub service: String,
}
