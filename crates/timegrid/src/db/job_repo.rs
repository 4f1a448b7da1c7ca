//! Solver job repository.
//!
//! CRUD for the `solver_jobs` table plus the single state-transition
//! primitive the rest of the pipeline uses. A transition is one
//! conditional `UPDATE ... WHERE status IN (...)`; the affected-row count
//! tells apart applied, conflicting and missing, so callers never
//! read-modify-write status.

use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use super::{Database, DatabaseError};
use crate::job::{InputSnapshot, JobConfig, JobResultEntry, JobStatus, SolverJob};
use crate::optimizer::payload::SolverPayload;

fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            log::warn!("parse_timestamp: failed to parse '{}': {}", s, e);
            Utc::now()
        })
}

fn decode_column<T: serde::de::DeserializeOwned>(
    raw: &str,
    id: &str,
) -> Result<T, DatabaseError> {
    serde_json::from_str(raw).map_err(|source| DatabaseError::Corrupt {
        table: "solver_jobs",
        id: id.to_string(),
        source,
    })
}

fn parse_status(raw: &str, id: &str) -> Result<JobStatus, DatabaseError> {
    // Route through serde so an unknown status surfaces as a corrupt-row
    // error with the offending value in the message.
    serde_json::from_value(serde_json::Value::String(raw.to_string())).map_err(|source| {
        DatabaseError::Corrupt {
            table: "solver_jobs",
            id: id.to_string(),
            source,
        }
    })
}

/// A raw job row from the database. JSON columns stay encoded until
/// [`JobRow::into_job`].
#[derive(Debug, Clone)]
struct JobRow {
    id: String,
    name: String,
    requested_by: String,
    department_id: String,
    semester: u8,
    academic_year: String,
    status: String,
    progress: u8,
    config: String,
    input_snapshot: String,
    results: String,
    error: Option<String>,
    created_at: String,
    updated_at: String,
    started_at: Option<String>,
    completed_at: Option<String>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            requested_by: row.get("requested_by")?,
            department_id: row.get("department_id")?,
            semester: row.get("semester")?,
            academic_year: row.get("academic_year")?,
            status: row.get("status")?,
            progress: row.get("progress")?,
            config: row.get("config")?,
            input_snapshot: row.get("input_snapshot")?,
            results: row.get("results")?,
            error: row.get("error")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            started_at: row.get("started_at")?,
            completed_at: row.get("completed_at")?,
        })
    }

    fn into_job(self) -> Result<SolverJob, DatabaseError> {
        let status = parse_status(&self.status, &self.id)?;
        let config: JobConfig = decode_column(&self.config, &self.id)?;
        let input: InputSnapshot = decode_column(&self.input_snapshot, &self.id)?;
        let results: Vec<JobResultEntry> = decode_column(&self.results, &self.id)?;

        Ok(SolverJob {
            id: self.id,
            name: self.name,
            requested_by: self.requested_by,
            department_id: self.department_id,
            semester: self.semester,
            academic_year: self.academic_year,
            status,
            progress: self.progress,
            config,
            input,
            results,
            error: self.error,
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
            started_at: self.started_at.as_deref().map(parse_timestamp),
            completed_at: self.completed_at.as_deref().map(parse_timestamp),
        })
    }
}

/// Query filter parameters for job listing.
#[derive(Debug, Default, Clone)]
pub struct JobFilter {
    pub department_id: Option<String>,
    pub status: Option<JobStatus>,
    pub requested_by: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Mutation applied together with a status change. Fields left `None`
/// keep their stored value.
#[derive(Debug, Clone, Default)]
pub struct TransitionUpdate {
    pub progress: Option<u8>,
    pub error: Option<String>,
    pub results: Option<Vec<JobResultEntry>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Result of a conditional transition attempt.
#[derive(Debug)]
pub enum TransitionOutcome {
    /// The transition applied; the refreshed job is returned.
    Applied(SolverJob),
    /// The row exists but its current status does not permit the
    /// transition. Carries the observed status.
    Conflict(JobStatus),
    /// No row with that id.
    Missing,
}

/// Inserts a new job row together with its serialized solver payload.
/// The row is written in whatever status the job carries (`pending` for
/// fresh submissions) before any queue interaction happens.
pub fn insert(db: &Database, job: &SolverJob, payload: &SolverPayload) -> Result<(), DatabaseError> {
    let config = serde_json::to_string(&job.config)?;
    let input = serde_json::to_string(&job.input)?;
    let results = serde_json::to_string(&job.results)?;
    let payload = serde_json::to_string(payload)?;

    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO solver_jobs (id, name, requested_by, department_id, semester,
             academic_year, status, progress, config, input_snapshot, payload, results,
             error, created_at, updated_at, started_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                job.id,
                job.name,
                job.requested_by,
                job.department_id,
                job.semester,
                job.academic_year,
                job.status.as_str(),
                job.progress,
                config,
                input,
                payload,
                results,
                job.error,
                format_timestamp(job.created_at),
                format_timestamp(job.updated_at),
                job.started_at.map(format_timestamp),
                job.completed_at.map(format_timestamp),
            ],
        )?;
        Ok(())
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<SolverJob>, DatabaseError> {
    let row = db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM solver_jobs WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], JobRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })?;

    row.map(JobRow::into_job).transpose()
}

/// Loads the stored solver payload of a job.
pub fn load_payload(db: &Database, id: &str) -> Result<Option<SolverPayload>, DatabaseError> {
    let raw: Option<String> = db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT payload FROM solver_jobs WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], |r| r.get::<_, String>(0))?;
        match rows.next() {
            Some(Ok(raw)) => Ok(Some(raw)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })?;

    raw.as_deref().map(|r| decode_column(r, id)).transpose()
}

/// Queries jobs with filters, returning (rows, total_count). Results are
/// ordered newest first.
pub fn list(db: &Database, filter: &JobFilter) -> Result<(Vec<SolverJob>, u64), DatabaseError> {
    let (rows, total) = db.with_conn(|conn| {
        let mut conditions = Vec::new();
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(ref department_id) = filter.department_id {
            conditions.push(format!("department_id = ?{}", param_values.len() + 1));
            param_values.push(Box::new(department_id.clone()));
        }
        if let Some(status) = filter.status {
            conditions.push(format!("status = ?{}", param_values.len() + 1));
            param_values.push(Box::new(status.as_str().to_string()));
        }
        if let Some(ref requested_by) = filter.requested_by {
            conditions.push(format!("requested_by = ?{}", param_values.len() + 1));
            param_values.push(Box::new(requested_by.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        // Count total matching rows.
        let count_sql = format!("SELECT COUNT(*) FROM solver_jobs {}", where_clause);
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let total: u64 = conn.query_row(&count_sql, params_ref.as_slice(), |r| r.get(0))?;

        // Fetch paginated results.
        let limit = filter.limit.unwrap_or(100) as i64;
        let offset = filter.offset.unwrap_or(0) as i64;
        param_values.push(Box::new(limit));
        param_values.push(Box::new(offset));
        let query_sql = format!(
            "SELECT * FROM solver_jobs {} ORDER BY created_at DESC LIMIT ?{} OFFSET ?{}",
            where_clause,
            param_values.len() - 1,
            param_values.len()
        );

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&query_sql)?;
        let rows: Vec<JobRow> = stmt
            .query_map(params_ref.as_slice(), JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((rows, total))
    })?;

    let jobs = rows
        .into_iter()
        .map(JobRow::into_job)
        .collect::<Result<Vec<_>, _>>()?;
    Ok((jobs, total))
}

/// Counts jobs with the given status.
pub fn count_by_status(db: &Database, status: JobStatus) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM solver_jobs WHERE status = ?1",
            params![status.as_str()],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

/// Attempts the transition to `to`, guarded by the state machine: the
/// conditional update only matches rows whose current status is a legal
/// source for `to`. The whole mutation (status, progress, error, results,
/// timestamps) is one statement.
pub fn transition(
    db: &Database,
    id: &str,
    to: JobStatus,
    update: TransitionUpdate,
) -> Result<TransitionOutcome, DatabaseError> {
    let sources = JobStatus::allowed_sources(to);
    if sources.is_empty() {
        // No state may legally enter `to` (e.g. pending).
        return match find_by_id(db, id)? {
            Some(job) => Ok(TransitionOutcome::Conflict(job.status)),
            None => Ok(TransitionOutcome::Missing),
        };
    }
    let results = update
        .results
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    let affected = db.with_conn(|conn| {
        let placeholders: Vec<String> = (0..sources.len())
            .map(|i| format!("?{}", i + 8))
            .collect();
        let sql = format!(
            "UPDATE solver_jobs SET
                status = ?1,
                updated_at = ?2,
                progress = COALESCE(?3, progress),
                error = COALESCE(?4, error),
                results = COALESCE(?5, results),
                started_at = COALESCE(?6, started_at),
                completed_at = COALESCE(?7, completed_at)
             WHERE id = ?{} AND status IN ({})",
            sources.len() + 8,
            placeholders.join(", ")
        );

        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = vec![
            Box::new(to.as_str().to_string()),
            Box::new(format_timestamp(Utc::now())),
            Box::new(update.progress),
            Box::new(update.error.clone()),
            Box::new(results.clone()),
            Box::new(update.started_at.map(format_timestamp)),
            Box::new(update.completed_at.map(format_timestamp)),
        ];
        for source in &sources {
            param_values.push(Box::new(source.as_str().to_string()));
        }
        param_values.push(Box::new(id.to_string()));

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let affected = conn.execute(&sql, params_ref.as_slice())?;
        Ok(affected)
    })?;

    if affected == 1 {
        match find_by_id(db, id)? {
            Some(job) => Ok(TransitionOutcome::Applied(job)),
            None => Ok(TransitionOutcome::Missing),
        }
    } else {
        match find_by_id(db, id)? {
            Some(job) => Ok(TransitionOutcome::Conflict(job.status)),
            None => Ok(TransitionOutcome::Missing),
        }
    }
}
