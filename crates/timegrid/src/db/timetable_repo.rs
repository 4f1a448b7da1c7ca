//! Timetable artifact repository.
//!
//! Artifacts are written once by the worker during result ingestion and
//! read back by id or by originating job. The only delete is
//! [`delete_for_job`], used to roll back artifacts of an ingestion that
//! lost the race against a cancellation.

use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use super::{Database, DatabaseError};
use crate::optimizer::payload::TimeSlot;
use crate::timetable::{ScheduledEvent, Timetable, ViolationSummary};

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
        table: "timetables",
        id: id.to_string(),
        source,
    })
}

#[derive(Debug, Clone)]
struct TimetableRow {
    id: String,
    name: String,
    department_id: String,
    semester: u8,
    academic_year: String,
    score: f64,
    status: String,
    time_slots: String,
    events: String,
    hard_violations: u32,
    soft_violations: u32,
    violation_details: String,
    source_job_id: String,
    created_at: String,
}

impl TimetableRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            department_id: row.get("department_id")?,
            semester: row.get("semester")?,
            academic_year: row.get("academic_year")?,
            score: row.get("score")?,
            status: row.get("status")?,
            time_slots: row.get("time_slots")?,
            events: row.get("events")?,
            hard_violations: row.get("hard_violations")?,
            soft_violations: row.get("soft_violations")?,
            violation_details: row.get("violation_details")?,
            source_job_id: row.get("source_job_id")?,
            created_at: row.get("created_at")?,
        })
    }

    fn into_timetable(self) -> Result<Timetable, DatabaseError> {
        let time_slots: Vec<TimeSlot> = decode_column(&self.time_slots, &self.id)?;
        let events: Vec<ScheduledEvent> = decode_column(&self.events, &self.id)?;
        let details: Vec<String> = decode_column(&self.violation_details, &self.id)?;

        Ok(Timetable {
            id: self.id,
            name: self.name,
            department_id: self.department_id,
            semester: self.semester,
            academic_year: self.academic_year,
            score: self.score,
            status: self.status,
            time_slots,
            events,
            violations: ViolationSummary {
                hard: self.hard_violations,
                soft: self.soft_violations,
                details,
            },
            source_job_id: self.source_job_id,
            created_at: parse_timestamp(&self.created_at),
        })
    }
}

/// Inserts a new artifact. `ordinal` is the solution index within the
/// originating job, used for stable listing order.
pub fn insert(db: &Database, timetable: &Timetable, ordinal: u32) -> Result<(), DatabaseError> {
    let time_slots = serde_json::to_string(&timetable.time_slots)?;
    let events = serde_json::to_string(&timetable.events)?;
    let details = serde_json::to_string(&timetable.violations.details)?;

    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO timetables (id, name, department_id, semester, academic_year,
             score, status, time_slots, events, hard_violations, soft_violations,
             violation_details, source_job_id, ordinal, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                timetable.id,
                timetable.name,
                timetable.department_id,
                timetable.semester,
                timetable.academic_year,
                timetable.score,
                timetable.status,
                time_slots,
                events,
                timetable.violations.hard,
                timetable.violations.soft,
                details,
                timetable.source_job_id,
                ordinal,
                format_timestamp(timetable.created_at),
            ],
        )?;
        Ok(())
    })
}

/// Finds an artifact by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<Timetable>, DatabaseError> {
    let row = db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM timetables WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], TimetableRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })?;

    row.map(TimetableRow::into_timetable).transpose()
}

/// Lists the artifacts of one job in solution order.
pub fn list_by_job(db: &Database, job_id: &str) -> Result<Vec<Timetable>, DatabaseError> {
    let rows = db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM timetables WHERE source_job_id = ?1 ORDER BY ordinal")?;
        let rows: Vec<TimetableRow> = stmt
            .query_map(params![job_id], TimetableRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })?;

    rows.into_iter()
        .map(TimetableRow::into_timetable)
        .collect()
}

/// Deletes all artifacts of one job. Only used to undo an ingestion whose
/// completion update conflicted with a cancellation.
pub fn delete_for_job(db: &Database, job_id: &str) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let deleted = conn.execute(
            "DELETE FROM timetables WHERE source_job_id = ?1",
            params![job_id],
        )?;
        Ok(deleted)
    })
}
