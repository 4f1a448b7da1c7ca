//! Solver request wire types.
//!
//! These mirror the optimizer service's input schema exactly. The payload
//! is built once per submission by the aggregator, serialized onto the job
//! row for redelivery, and sent as JSON to the solve/validate endpoints.

use serde::{Deserialize, Serialize};

/// Teaching days. The calendar runs Monday through Saturday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Day {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
}

/// The default teaching week.
pub const WEEK_DAYS: [Day; 6] = [Day::Mon, Day::Tue, Day::Wed, Day::Thu, Day::Fri, Day::Sat];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shift {
    Morning,
    Afternoon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomKind {
    Lecture,
    Lab,
    Seminar,
}

/// A (day, slot) position in the weekly grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRef {
    pub day: Day,
    pub slot: u8,
}

/// One teaching period in the daily calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub slot_number: u8,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub is_break: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FacultyPreferences {
    #[serde(default)]
    pub preferred_slots: Vec<SlotRef>,
    #[serde(default)]
    pub avoid_consecutive: bool,
    #[serde(default)]
    pub prefer_morning: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacultyInput {
    pub id: String,
    pub name: String,
    pub department_id: String,
    pub subject_ids: Vec<String>,
    pub max_daily_classes: u8,
    pub max_weekly_classes: u8,
    #[serde(default)]
    pub unavailable_slots: Vec<SlotRef>,
    pub preferences: Option<FacultyPreferences>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomInput {
    pub id: String,
    pub code: String,
    pub capacity: u32,
    #[serde(rename = "type")]
    pub kind: RoomKind,
    pub department_id: Option<String>,
    #[serde(default)]
    pub unavailable_slots: Vec<SlotRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectInput {
    pub id: String,
    pub code: String,
    pub name: String,
    pub department_id: String,
    #[serde(default)]
    pub is_lab: bool,
    pub credits: u8,
}

/// Weekly requirement of one subject for a batch.
///
/// `assigned_faculty_id` is serialized as an explicit `null` when no
/// faculty is mapped, so the solver treats "unassigned" uniformly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSubjectInput {
    pub subject_id: String,
    pub classes_per_week: u8,
    pub assigned_faculty_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchInput {
    pub id: String,
    pub code: String,
    pub department_id: String,
    pub semester: u8,
    pub size: u32,
    pub shift: Shift,
    pub subjects: Vec<BatchSubjectInput>,
}

/// A pre-assigned entry the solver must respect, passed through opaquely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedSlot {
    pub batch_id: String,
    pub subject_id: String,
    pub faculty_id: Option<String>,
    pub room_id: Option<String>,
    pub day: Day,
    pub slot: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardConstraints {
    pub max_classes_per_day_batch: u8,
    pub no_consecutive_labs: bool,
    pub respect_faculty_unavailability: bool,
    pub respect_room_capacity: bool,
    pub labs_only_in_lab_rooms: bool,
}

impl Default for HardConstraints {
    fn default() -> Self {
        Self {
            max_classes_per_day_batch: 6,
            no_consecutive_labs: true,
            respect_faculty_unavailability: true,
            respect_room_capacity: true,
            labs_only_in_lab_rooms: true,
        }
    }
}

/// Switch and weight for one soft constraint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SoftSetting {
    pub enabled: bool,
    pub weight: u32,
}

impl SoftSetting {
    fn on(weight: u32) -> Self {
        Self {
            enabled: true,
            weight,
        }
    }

    fn off(weight: u32) -> Self {
        Self {
            enabled: false,
            weight,
        }
    }
}

/// The closed set of soft constraint names accepted as weight overrides.
pub const SOFT_CONSTRAINT_NAMES: &[&str] = &[
    "faculty_load_balance",
    "avoid_consecutive_for_faculty",
    "student_daily_load_limit",
    "even_distribution",
    "room_utilization",
    "minimize_idle_gaps",
    "preferred_slot_matching",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftConstraints {
    pub faculty_load_balance: SoftSetting,
    pub avoid_consecutive_for_faculty: SoftSetting,
    pub student_daily_load_limit: SoftSetting,
    pub even_distribution: SoftSetting,
    pub room_utilization: SoftSetting,
    pub minimize_idle_gaps: SoftSetting,
    pub preferred_slot_matching: SoftSetting,
}

impl Default for SoftConstraints {
    fn default() -> Self {
        Self {
            faculty_load_balance: SoftSetting::on(5),
            avoid_consecutive_for_faculty: SoftSetting::on(5),
            student_daily_load_limit: SoftSetting::on(7),
            even_distribution: SoftSetting::on(4),
            room_utilization: SoftSetting::off(3),
            minimize_idle_gaps: SoftSetting::on(10),
            preferred_slot_matching: SoftSetting::off(2),
        }
    }
}

impl SoftConstraints {
    /// Overrides the weight of a named constraint. Returns false if the
    /// name is not in [`SOFT_CONSTRAINT_NAMES`].
    pub fn set_weight(&mut self, name: &str, weight: u32) -> bool {
        let setting = match name {
            "faculty_load_balance" => &mut self.faculty_load_balance,
            "avoid_consecutive_for_faculty" => &mut self.avoid_consecutive_for_faculty,
            "student_daily_load_limit" => &mut self.student_daily_load_limit,
            "even_distribution" => &mut self.even_distribution,
            "room_utilization" => &mut self.room_utilization,
            "minimize_idle_gaps" => &mut self.minimize_idle_gaps,
            "preferred_slot_matching" => &mut self.preferred_slot_matching,
            _ => return false,
        };
        setting.weight = weight;
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    pub hard: HardConstraints,
    pub soft: SoftConstraints,
}

/// Per-run solver tuning forwarded verbatim to the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverOptions {
    pub timeout_seconds: u32,
    pub max_solutions: u32,
    pub num_workers: u32,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 300,
            max_solutions: 5,
            num_workers: 4,
        }
    }
}

/// The complete solver input document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverPayload {
    pub faculties: Vec<FacultyInput>,
    pub rooms: Vec<RoomInput>,
    pub subjects: Vec<SubjectInput>,
    pub batches: Vec<BatchInput>,
    pub days: Vec<Day>,
    pub slots_per_day: u8,
    pub time_slots: Vec<TimeSlot>,
    pub constraints: Constraints,
    pub fixed_slots: Vec<FixedSlot>,
    pub config: SolverOptions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unassigned_faculty_serializes_as_null() {
        let entry = BatchSubjectInput {
            subject_id: "s1".to_string(),
            classes_per_week: 3,
            assigned_faculty_id: None,
        };

        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("assigned_faculty_id").is_some());
        assert!(json["assigned_faculty_id"].is_null());
    }

    #[test]
    fn test_day_serialization() {
        assert_eq!(serde_json::to_string(&Day::Mon).unwrap(), "\"Mon\"");
        assert_eq!(serde_json::to_string(&Day::Sat).unwrap(), "\"Sat\"");
        let day: Day = serde_json::from_str("\"Wed\"").unwrap();
        assert_eq!(day, Day::Wed);
    }

    #[test]
    fn test_room_kind_renamed_to_type() {
        let room = RoomInput {
            id: "r1".to_string(),
            code: "LAB-1".to_string(),
            capacity: 30,
            kind: RoomKind::Lab,
            department_id: None,
            unavailable_slots: vec![],
        };

        let json = serde_json::to_value(&room).unwrap();
        assert_eq!(json["type"], "lab");
        assert!(json.get("kind").is_none());
    }

    #[test]
    fn test_soft_constraint_defaults() {
        let soft = SoftConstraints::default();
        assert_eq!(soft.student_daily_load_limit.weight, 7);
        assert!(soft.student_daily_load_limit.enabled);
        assert!(!soft.room_utilization.enabled);
        assert_eq!(soft.minimize_idle_gaps.weight, 10);
    }

    #[test]
    fn test_set_weight_known_and_unknown() {
        let mut soft = SoftConstraints::default();
        assert!(soft.set_weight("even_distribution", 9));
        assert_eq!(soft.even_distribution.weight, 9);

        assert!(!soft.set_weight("not_a_constraint", 5));
    }

    #[test]
    fn test_every_listed_name_is_settable() {
        let mut soft = SoftConstraints::default();
        for name in SOFT_CONSTRAINT_NAMES {
            assert!(soft.set_weight(name, 6), "name not settable: {}", name);
        }
    }

    #[test]
    fn test_payload_round_trips_through_json() {
        let payload = SolverPayload {
            faculties: vec![],
            rooms: vec![],
            subjects: vec![],
            batches: vec![],
            days: WEEK_DAYS.to_vec(),
            slots_per_day: 6,
            time_slots: vec![],
            constraints: Constraints::default(),
            fixed_slots: vec![],
            config: SolverOptions::default(),
        };

        let json = serde_json::to_string(&payload).unwrap();
        let back: SolverPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);
    }
}
