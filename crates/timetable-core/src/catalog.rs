//! Registration of reference entities: time slots, teachers, subjects,
//! groups and classrooms.

use chrono::NaiveTime;
use tracing::info;
use uuid::Uuid;

use crate::error::{ScheduleError, StoreError, UniqueConstraint, ValidationError};
use crate::model::{Classroom, Group, RecordStatus, Subject, Teacher, TimeSlot};
use crate::store::CatalogStore;

/// `start < end`, otherwise [`ValidationError::InvalidTimeRange`].
pub fn validate_time_range(start: NaiveTime, end: NaiveTime) -> Result<(), ValidationError> {
    if start < end {
        Ok(())
    } else {
        Err(ValidationError::InvalidTimeRange { start, end })
    }
}

fn non_empty(field: &str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            message: "must not be empty".to_string(),
        });
    }
    Ok(trimmed.to_string())
}

pub struct Catalogs<'a, S> {
    store: &'a S,
}

impl<'a, S: CatalogStore> Catalogs<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn create_time_slot(
        &self,
        institution_id: &str,
        name: &str,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Result<TimeSlot, ScheduleError> {
        let name = non_empty("name", name)?;
        validate_time_range(start_time, end_time)?;

        let slot = TimeSlot {
            id: Uuid::new_v4().to_string(),
            institution_id: institution_id.to_string(),
            name,
            start_time,
            end_time,
            status: RecordStatus::Active,
        };
        match self.store.insert_time_slot(&slot) {
            Ok(()) => {}
            Err(StoreError::UniqueViolation(UniqueConstraint::TimeSlotRange)) => {
                return Err(ValidationError::DuplicateTimeSlot {
                    institution_id: institution_id.to_string(),
                    start: start_time,
                    end: end_time,
                }
                .into());
            }
            Err(err) => return Err(err.into()),
        }
        info!(slot_id = %slot.id, institution_id, "time slot created");
        Ok(slot)
    }

    pub fn create_teacher(&self, institution_id: &str, name: &str) -> Result<Teacher, ScheduleError> {
        let teacher = Teacher {
            id: Uuid::new_v4().to_string(),
            institution_id: institution_id.to_string(),
            name: non_empty("name", name)?,
        };
        self.store.insert_teacher(&teacher)?;
        Ok(teacher)
    }

    pub fn create_subject(&self, institution_id: &str, name: &str) -> Result<Subject, ScheduleError> {
        let subject = Subject {
            id: Uuid::new_v4().to_string(),
            institution_id: institution_id.to_string(),
            name: non_empty("name", name)?,
        };
        self.store.insert_subject(&subject)?;
        Ok(subject)
    }

    pub fn create_group(
        &self,
        institution_id: &str,
        site_id: &str,
        grade_level_id: &str,
        name: &str,
    ) -> Result<Group, ScheduleError> {
        let group = Group {
            id: Uuid::new_v4().to_string(),
            institution_id: institution_id.to_string(),
            site_id: non_empty("site_id", site_id)?,
            grade_level_id: non_empty("grade_level_id", grade_level_id)?,
            name: non_empty("name", name)?,
        };
        self.store.insert_group(&group)?;
        Ok(group)
    }

    pub fn create_classroom(
        &self,
        institution_id: &str,
        name: &str,
        kind: &str,
        capacity: u32,
    ) -> Result<Classroom, ScheduleError> {
        if capacity == 0 {
            return Err(ValidationError::InvalidValue {
                field: "capacity".to_string(),
                message: "must be greater than zero".to_string(),
            }
            .into());
        }
        let classroom = Classroom {
            id: Uuid::new_v4().to_string(),
            institution_id: institution_id.to_string(),
            name: non_empty("name", name)?,
            kind: non_empty("kind", kind)?,
            capacity,
        };
        self.store.insert_classroom(&classroom)?;
        Ok(classroom)
    }
}
