//! In-memory [`DomainStore`] backed by plain vectors.
//!
//! Used by the test suite and by embedders that load scheduling data from
//! somewhere other than a live entity service.

use async_trait::async_trait;

use super::{
    Batch, ConstraintConfig, DomainError, DomainStore, Faculty, Room, Subject, TimeSlotConfig,
};

#[derive(Debug, Default, Clone)]
pub struct InMemoryDomainStore {
    pub batches: Vec<Batch>,
    pub faculties: Vec<Faculty>,
    pub rooms: Vec<Room>,
    pub subjects: Vec<Subject>,
    pub time_slot_configs: Vec<TimeSlotConfig>,
    pub constraint_configs: Vec<ConstraintConfig>,
}

impl InMemoryDomainStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batches(mut self, batches: Vec<Batch>) -> Self {
        self.batches = batches;
        self
    }

    pub fn with_faculties(mut self, faculties: Vec<Faculty>) -> Self {
        self.faculties = faculties;
        self
    }

    pub fn with_rooms(mut self, rooms: Vec<Room>) -> Self {
        self.rooms = rooms;
        self
    }

    pub fn with_subjects(mut self, subjects: Vec<Subject>) -> Self {
        self.subjects = subjects;
        self
    }

    pub fn with_time_slot_configs(mut self, configs: Vec<TimeSlotConfig>) -> Self {
        self.time_slot_configs = configs;
        self
    }

    pub fn with_constraint_configs(mut self, configs: Vec<ConstraintConfig>) -> Self {
        self.constraint_configs = configs;
        self
    }
}

#[async_trait]
impl DomainStore for InMemoryDomainStore {
    async fn active_batches(
        &self,
        department_id: &str,
        semester: u8,
    ) -> Result<Vec<Batch>, DomainError> {
        Ok(self
            .batches
            .iter()
            .filter(|b| b.active && b.department_id == department_id && b.semester == semester)
            .cloned()
            .collect())
    }

    async fn active_faculties(&self, department_id: &str) -> Result<Vec<Faculty>, DomainError> {
        Ok(self
            .faculties
            .iter()
            .filter(|f| f.active && f.department_id == department_id)
            .cloned()
            .collect())
    }

    async fn available_rooms(&self, department_id: &str) -> Result<Vec<Room>, DomainError> {
        // Department rooms plus shared (unscoped) rooms.
        Ok(self
            .rooms
            .iter()
            .filter(|r| {
                r.active
                    && r.department_id
                        .as_deref()
                        .map(|d| d == department_id)
                        .unwrap_or(true)
            })
            .cloned()
            .collect())
    }

    async fn active_subjects(&self, department_id: &str) -> Result<Vec<Subject>, DomainError> {
        Ok(self
            .subjects
            .iter()
            .filter(|s| s.active && s.department_id == department_id)
            .cloned()
            .collect())
    }

    async fn time_slot_configs(&self) -> Result<Vec<TimeSlotConfig>, DomainError> {
        Ok(self.time_slot_configs.clone())
    }

    async fn constraint_configs(&self) -> Result<Vec<ConstraintConfig>, DomainError> {
        Ok(self.constraint_configs.clone())
    }
}
