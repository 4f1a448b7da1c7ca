//! Input aggregation.
//!
//! Joins the domain collections for a (department, semester) scope into
//! one solver payload plus the snapshot of entity ids it was built from.
//! Pure reads, no side effects; the validate-only path calls it too.

use log::{debug, warn};
use thiserror::Error;

use crate::config::Settings;
use crate::domain::{DomainError, DomainStore, ScopedConfig};
use crate::job::{InputSnapshot, JobConfig};
use crate::optimizer::payload::{
    BatchInput, BatchSubjectInput, Constraints, FacultyInput, RoomInput, SolverOptions,
    SolverPayload, SubjectInput, TimeSlot, WEEK_DAYS,
};
use crate::optimizer::response::ValidationSummary;

/// Errors from input aggregation.
#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("Domain store error: {0}")]
    Domain(#[from] DomainError),
}

/// The aggregated submission input.
#[derive(Debug, Clone)]
pub struct AggregateOutput {
    pub payload: SolverPayload,
    pub snapshot: InputSnapshot,
    pub summary: ValidationSummary,
}

/// Resolves the effective configuration for a department with the
/// documented precedence: a department-specific entry wins, then the
/// entry flagged default, then nothing (callers fall back to built-ins).
pub fn resolve_scoped<'a, T: ScopedConfig>(configs: &'a [T], department_id: &str) -> Option<&'a T> {
    configs
        .iter()
        .find(|c| c.department_id() == Some(department_id))
        .or_else(|| configs.iter().find(|c| c.is_default()))
}

/// The built-in daily grid used when no calendar configuration exists:
/// hourly periods starting at 09:00, no breaks.
pub fn fallback_time_slots(slots_per_day: u8) -> Vec<TimeSlot> {
    (1..=slots_per_day)
        .map(|slot_number| {
            let start = 8 + slot_number as u32;
            TimeSlot {
                slot_number,
                start_time: format!("{:02}:00", start),
                end_time: format!("{:02}:00", start + 1),
                is_break: false,
            }
        })
        .collect()
}

/// Builds the solver payload for the scope. Never fails on missing
/// configuration; an empty batch list is returned as-is and rejected by
/// the caller, not here.
pub async fn aggregate(
    store: &dyn DomainStore,
    settings: &Settings,
    department_id: &str,
    semester: u8,
    config: &JobConfig,
) -> Result<AggregateOutput, AggregateError> {
    let (batches, faculties, rooms, subjects, slot_configs, constraint_configs) = tokio::join!(
        store.active_batches(department_id, semester),
        store.active_faculties(department_id),
        store.available_rooms(department_id),
        store.active_subjects(department_id),
        store.time_slot_configs(),
        store.constraint_configs(),
    );
    let batches = batches?;
    let faculties = faculties?;
    let rooms = rooms?;
    let subjects = subjects?;
    let slot_configs = slot_configs?;
    let constraint_configs = constraint_configs?;

    let slot_config = resolve_scoped(&slot_configs, department_id);
    let constraint_config = resolve_scoped(&constraint_configs, department_id);

    if slot_config.is_none() {
        warn!(
            "No time-slot configuration for department {}, using fallback grid",
            department_id
        );
    }

    let (days, time_slots) = match slot_config {
        Some(config) => (config.days.clone(), config.slots.clone()),
        None => (
            WEEK_DAYS.to_vec(),
            fallback_time_slots(settings.default_slots_per_day),
        ),
    };
    let slots_per_day = time_slots.iter().filter(|s| !s.is_break).count() as u8;

    let (mut constraints, fixed_slots) = match constraint_config {
        Some(config) => (config.constraints.clone(), config.fixed_slots.clone()),
        None => (Constraints::default(), vec![]),
    };
    for (name, weight) in &config.weights {
        // Keys were validated at submission; a miss here is a bug.
        if !constraints.soft.set_weight(name, *weight) {
            warn!("Ignoring unknown weight override '{}'", name);
        }
    }

    let snapshot = InputSnapshot {
        batch_ids: batches.iter().map(|b| b.id.clone()).collect(),
        faculty_ids: faculties.iter().map(|f| f.id.clone()).collect(),
        room_ids: rooms.iter().map(|r| r.id.clone()).collect(),
        subject_ids: subjects.iter().map(|s| s.id.clone()).collect(),
        time_slot_config_id: slot_config.map(|c| c.id.clone()),
        constraint_config_id: constraint_config.map(|c| c.id.clone()),
        fixed_slot_count: fixed_slots.len(),
    };

    let summary = ValidationSummary {
        faculties: faculties.len(),
        rooms: rooms.len(),
        subjects: subjects.len(),
        batches: batches.len(),
        total_classes_per_week: batches
            .iter()
            .flat_map(|b| b.subjects.iter())
            .map(|r| r.classes_per_week as u32)
            .sum(),
    };

    let payload = SolverPayload {
        faculties: faculties
            .into_iter()
            .map(|f| FacultyInput {
                id: f.id,
                name: f.name,
                department_id: f.department_id,
                subject_ids: f.subject_ids,
                max_daily_classes: f.max_daily_classes,
                max_weekly_classes: f.max_weekly_classes,
                unavailable_slots: f.unavailable_slots,
                preferences: f.preferences,
            })
            .collect(),
        rooms: rooms
            .into_iter()
            .map(|r| RoomInput {
                id: r.id,
                code: r.code,
                capacity: r.capacity,
                kind: r.kind,
                department_id: r.department_id,
                unavailable_slots: r.unavailable_slots,
            })
            .collect(),
        subjects: subjects
            .into_iter()
            .map(|s| SubjectInput {
                id: s.id,
                code: s.code,
                name: s.name,
                department_id: s.department_id,
                is_lab: s.is_lab,
                credits: s.credits,
            })
            .collect(),
        batches: batches
            .into_iter()
            .map(|b| BatchInput {
                id: b.id,
                code: b.code,
                department_id: b.department_id,
                semester: b.semester,
                size: b.size,
                shift: b.shift,
                subjects: b
                    .subjects
                    .into_iter()
                    .map(|r| BatchSubjectInput {
                        subject_id: r.subject_id,
                        classes_per_week: r.classes_per_week,
                        // None stays None: serialized as explicit null.
                        assigned_faculty_id: r.assigned_faculty_id,
                    })
                    .collect(),
            })
            .collect(),
        days,
        slots_per_day,
        time_slots,
        constraints,
        fixed_slots,
        config: SolverOptions {
            timeout_seconds: config.timeout_seconds,
            max_solutions: config.max_solutions,
            num_workers: settings.solver_workers,
        },
    };

    debug!(
        "Aggregated scope {}/{}: {} batches, {} faculties, {} rooms, {} subjects",
        department_id,
        semester,
        payload.batches.len(),
        payload.faculties.len(),
        payload.rooms.len(),
        payload.subjects.len()
    );

    Ok(AggregateOutput {
        payload,
        snapshot,
        summary,
    })
}
