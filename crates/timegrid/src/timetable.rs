//! Timetable artifact model.
//!
//! A timetable is the persisted output of one solver solution. This
//! pipeline only ever creates them in `draft` status; review, approval
//! and publication belong to the workflow subsystem that takes ownership
//! afterwards, so nothing here mutates an artifact once written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::job::SolverJob;
use crate::optimizer::payload::TimeSlot;
use crate::optimizer::response::Solution;

/// Status value artifacts are created with.
pub const DRAFT_STATUS: &str = "draft";

/// One scheduled class in the weekly grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    pub day: String,
    pub slot: u8,
    pub batch_id: String,
    pub subject_id: String,
    pub faculty_id: String,
    pub room_id: String,
    pub duration: u8,
    pub is_fixed: bool,
}

/// Constraint violation summary carried over from the solver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViolationSummary {
    pub hard: u32,
    pub soft: u32,
    pub details: Vec<String>,
}

/// A persisted candidate schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timetable {
    pub id: String,
    pub name: String,
    pub department_id: String,
    pub semester: u8,
    pub academic_year: String,
    pub score: f64,
    pub status: String,
    /// The daily period grid the schedule was solved against.
    pub time_slots: Vec<TimeSlot>,
    pub events: Vec<ScheduledEvent>,
    pub violations: ViolationSummary,
    /// The solver job this artifact was ingested from.
    pub source_job_id: String,
    pub created_at: DateTime<Utc>,
}

impl Timetable {
    /// Builds a draft artifact from one solver solution. `ordinal` is the
    /// zero-based index of the solution within the response and is kept
    /// for stable listing order.
    pub fn from_solution(
        job: &SolverJob,
        time_slots: &[TimeSlot],
        solution: &Solution,
        ordinal: usize,
    ) -> Self {
        let events = solution
            .events
            .iter()
            .map(|e| ScheduledEvent {
                day: e.day.clone(),
                slot: e.slot,
                batch_id: e.batch_id.clone(),
                subject_id: e.subject_id.clone(),
                faculty_id: e.faculty_id.clone(),
                room_id: e.room_id.clone(),
                duration: e.duration,
                is_fixed: e.is_fixed,
            })
            .collect();

        let details = solution
            .violation_details
            .iter()
            .map(|d| d.description.clone())
            .collect();

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: format!("{} (option {})", job.name, ordinal + 1),
            department_id: job.department_id.clone(),
            semester: job.semester,
            academic_year: job.academic_year.clone(),
            score: solution.score,
            status: DRAFT_STATUS.to_string(),
            time_slots: time_slots.to_vec(),
            events,
            violations: ViolationSummary {
                hard: solution.violations.hard,
                soft: solution.violations.soft,
                details,
            },
            source_job_id: job.id.clone(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{InputSnapshot, JobConfig};
    use crate::optimizer::response::{SolverEvent, ViolationCounts, ViolationDetail};

    fn sample_job() -> SolverJob {
        SolverJob::new(
            "u1",
            "d1",
            3,
            "2026-27",
            "CS sem 3".to_string(),
            JobConfig::default(),
            InputSnapshot::default(),
        )
    }

    fn sample_solution() -> Solution {
        Solution {
            score: 0.87,
            events: vec![SolverEvent {
                day: "Mon".to_string(),
                slot: 2,
                batch_id: "b1".to_string(),
                subject_id: "s1".to_string(),
                faculty_id: "f1".to_string(),
                room_id: "r1".to_string(),
                duration: 1,
                is_fixed: false,
            }],
            violations: ViolationCounts { hard: 0, soft: 3 },
            violation_details: vec![ViolationDetail {
                kind: "soft".to_string(),
                constraint: "minimize_idle_gaps".to_string(),
                description: "faculty f1 has a 2-slot gap on Mon".to_string(),
                severity: "low".to_string(),
            }],
        }
    }

    #[test]
    fn test_from_solution_builds_draft() {
        let job = sample_job();
        let grid = vec![TimeSlot {
            slot_number: 1,
            start_time: "09:00".to_string(),
            end_time: "10:00".to_string(),
            is_break: false,
        }];

        let timetable = Timetable::from_solution(&job, &grid, &sample_solution(), 0);

        assert_eq!(timetable.status, DRAFT_STATUS);
        assert_eq!(timetable.source_job_id, job.id);
        assert_eq!(timetable.department_id, "d1");
        assert_eq!(timetable.semester, 3);
        assert_eq!(timetable.score, 0.87);
        assert_eq!(timetable.time_slots, grid);
        assert_eq!(timetable.events.len(), 1);
        assert_eq!(timetable.events[0].day, "Mon");
        assert_eq!(timetable.violations.soft, 3);
        assert_eq!(timetable.violations.details.len(), 1);
        assert!(timetable.name.ends_with("(option 1)"));
    }

    #[test]
    fn test_ordinal_numbers_options_from_one() {
        let job = sample_job();
        let second = Timetable::from_solution(&job, &[], &sample_solution(), 1);
        assert!(second.name.ends_with("(option 2)"));
    }
}
