use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DayOfWeek, RecordStatus, SlotCoordinate};

/// Who teaches what to whom, at which (day, slot) of an academic year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: String,
    pub teacher_id: String,
    pub subject_id: String,
    pub group_id: String,
    pub time_slot_id: String,
    pub day_of_week: DayOfWeek,
    pub academic_year_id: String,
    pub period_id: Option<String>,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Assignment {
    /// Build a fresh active assignment from creation input.
    pub fn from_new(id: String, input: NewAssignment, now: DateTime<Utc>) -> Self {
        Self {
            id,
            teacher_id: input.teacher_id,
            subject_id: input.subject_id,
            group_id: input.group_id,
            time_slot_id: input.time_slot_id,
            day_of_week: input.day_of_week,
            academic_year_id: input.academic_year_id,
            period_id: input.period_id,
            status: RecordStatus::Active,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn slot(&self) -> SlotCoordinate {
        SlotCoordinate::new(
            self.day_of_week,
            self.time_slot_id.clone(),
            self.academic_year_id.clone(),
        )
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Only active, non-deleted assignments take part in exclusivity checks.
    pub fn occupies(&self) -> bool {
        self.status.is_active() && !self.is_deleted()
    }

    /// Merge a partial update onto this assignment. Fields absent from the
    /// patch keep their current value.
    pub fn merged(&self, patch: &AssignmentPatch, now: DateTime<Utc>) -> Self {
        let mut merged = self.clone();
        if let Some(ref teacher_id) = patch.teacher_id {
            merged.teacher_id = teacher_id.clone();
        }
        if let Some(ref subject_id) = patch.subject_id {
            merged.subject_id = subject_id.clone();
        }
        if let Some(ref group_id) = patch.group_id {
            merged.group_id = group_id.clone();
        }
        if let Some(ref time_slot_id) = patch.time_slot_id {
            merged.time_slot_id = time_slot_id.clone();
        }
        if let Some(day) = patch.day_of_week {
            merged.day_of_week = day;
        }
        if let Some(ref academic_year_id) = patch.academic_year_id {
            merged.academic_year_id = academic_year_id.clone();
        }
        if patch.clear_period {
            merged.period_id = None;
        } else if let Some(ref period_id) = patch.period_id {
            merged.period_id = Some(period_id.clone());
        }
        if let Some(status) = patch.status {
            merged.status = status;
        }
        merged.updated_at = now;
        merged
    }
}

/// Creation input for an assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAssignment {
    pub teacher_id: String,
    pub subject_id: String,
    pub group_id: String,
    pub time_slot_id: String,
    pub day_of_week: DayOfWeek,
    pub academic_year_id: String,
    #[serde(default)]
    pub period_id: Option<String>,
}

/// Partial update of an assignment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssignmentPatch {
    #[serde(default)]
    pub teacher_id: Option<String>,
    #[serde(default)]
    pub subject_id: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub time_slot_id: Option<String>,
    #[serde(default)]
    pub day_of_week: Option<DayOfWeek>,
    #[serde(default)]
    pub academic_year_id: Option<String>,
    #[serde(default)]
    pub period_id: Option<String>,
    /// Drop the period binding. Takes precedence over `period_id`.
    #[serde(default)]
    pub clear_period: bool,
    #[serde(default)]
    pub status: Option<RecordStatus>,
}

/// Read filter for listing assignments of a year.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentFilter {
    pub teacher_id: Option<String>,
    pub group_id: Option<String>,
    pub status: Option<RecordStatus>,
}

impl AssignmentFilter {
    pub fn matches(&self, assignment: &Assignment) -> bool {
        if assignment.is_deleted() {
            return false;
        }
        if let Some(ref teacher_id) = self.teacher_id {
            if &assignment.teacher_id != teacher_id {
                return false;
            }
        }
        if let Some(ref group_id) = self.group_id {
            if &assignment.group_id != group_id {
                return false;
            }
        }
        if let Some(status) = self.status {
            if assignment.status != status {
                return false;
            }
        }
        true
    }
}
