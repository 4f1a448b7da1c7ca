//! Domain store collaborator interface.
//!
//! Entity CRUD lives outside this pipeline; the aggregator only needs
//! read access to the scheduling inputs for a (department, semester)
//! scope. [`DomainStore`] is that seam. The records deliberately reuse
//! the wire vocabulary (days, slots, shifts, constraint sets) so the
//! aggregator is a plain projection.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::optimizer::payload::{
    Constraints, Day, FacultyPreferences, FixedSlot, RoomKind, Shift, SlotRef, TimeSlot,
};

pub mod memory;

pub use memory::InMemoryDomainStore;

/// Errors surfaced by a domain store backend.
#[derive(Error, Debug)]
pub enum DomainError {
    /// The backing store could not be reached or answered abnormally.
    #[error("Domain store unavailable: {0}")]
    Unavailable(String),

    /// A stored record is structurally unusable.
    #[error("Invalid domain record: {0}")]
    Invalid(String),
}

/// Weekly requirement of one subject for a batch, with the optionally
/// pre-assigned teacher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequirement {
    pub subject_id: String,
    pub classes_per_week: u8,
    pub assigned_faculty_id: Option<String>,
}

/// A student batch/section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub id: String,
    pub code: String,
    pub department_id: String,
    pub semester: u8,
    pub size: u32,
    pub shift: Shift,
    pub active: bool,
    pub subjects: Vec<BatchRequirement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Faculty {
    pub id: String,
    pub name: String,
    pub department_id: String,
    pub subject_ids: Vec<String>,
    pub max_daily_classes: u8,
    pub max_weekly_classes: u8,
    pub unavailable_slots: Vec<SlotRef>,
    pub preferences: Option<FacultyPreferences>,
    pub active: bool,
}

/// A room. `department_id` is `None` for shared, campus-wide rooms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub code: String,
    pub capacity: u32,
    pub kind: RoomKind,
    pub department_id: Option<String>,
    pub unavailable_slots: Vec<SlotRef>,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub code: String,
    pub name: String,
    pub department_id: String,
    pub is_lab: bool,
    pub credits: u8,
    pub active: bool,
}

/// Calendar configuration: teaching days and the daily period grid.
/// Department-specific when `department_id` is set, otherwise a shared
/// configuration that may be flagged as the default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlotConfig {
    pub id: String,
    pub department_id: Option<String>,
    pub is_default: bool,
    pub days: Vec<Day>,
    pub slots: Vec<TimeSlot>,
}

/// Constraint configuration with the same department-or-default scoping.
/// Fixed slots are carried opaquely into the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintConfig {
    pub id: String,
    pub department_id: Option<String>,
    pub is_default: bool,
    pub constraints: Constraints,
    pub fixed_slots: Vec<FixedSlot>,
}

/// Scoping shared by the two configuration record types, so the
/// department-or-default precedence rule is written once.
pub trait ScopedConfig {
    fn department_id(&self) -> Option<&str>;
    fn is_default(&self) -> bool;
}

impl ScopedConfig for TimeSlotConfig {
    fn department_id(&self) -> Option<&str> {
        self.department_id.as_deref()
    }

    fn is_default(&self) -> bool {
        self.is_default
    }
}

impl ScopedConfig for ConstraintConfig {
    fn department_id(&self) -> Option<&str> {
        self.department_id.as_deref()
    }

    fn is_default(&self) -> bool {
        self.is_default
    }
}

/// Read-only access to scheduling inputs. Implementations must be cheap
/// to call repeatedly; the aggregator issues its reads concurrently.
#[async_trait]
pub trait DomainStore: Send + Sync {
    /// Active batches for the department and semester.
    async fn active_batches(
        &self,
        department_id: &str,
        semester: u8,
    ) -> Result<Vec<Batch>, DomainError>;

    /// Active faculties of the department.
    async fn active_faculties(&self, department_id: &str) -> Result<Vec<Faculty>, DomainError>;

    /// Active rooms usable by the department: its own plus shared rooms.
    async fn available_rooms(&self, department_id: &str) -> Result<Vec<Room>, DomainError>;

    /// Active subjects of the department.
    async fn active_subjects(&self, department_id: &str) -> Result<Vec<Subject>, DomainError>;

    /// All time-slot configurations (department-scoped and shared).
    async fn time_slot_configs(&self) -> Result<Vec<TimeSlotConfig>, DomainError>;

    /// All constraint configurations (department-scoped and shared).
    async fn constraint_configs(&self) -> Result<Vec<ConstraintConfig>, DomainError>;
}
