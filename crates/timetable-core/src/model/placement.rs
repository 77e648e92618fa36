use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DayOfWeek, SlotCoordinate};

/// Room binding of an assignment at its (day, slot, year).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub id: String,
    pub assignment_id: String,
    pub classroom_id: String,
    pub time_slot_id: String,
    pub day_of_week: DayOfWeek,
    pub academic_year_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Placement {
    pub fn from_new(id: String, input: NewPlacement, now: DateTime<Utc>) -> Self {
        Self {
            id,
            assignment_id: input.assignment_id,
            classroom_id: input.classroom_id,
            time_slot_id: input.time_slot_id,
            day_of_week: input.day_of_week,
            academic_year_id: input.academic_year_id,
            created_at: now,
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

    /// Placed, i.e. not removed.
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPlacement {
    pub assignment_id: String,
    pub classroom_id: String,
    pub time_slot_id: String,
    pub day_of_week: DayOfWeek,
    pub academic_year_id: String,
}

impl NewPlacement {
    pub fn slot(&self) -> SlotCoordinate {
        SlotCoordinate::new(
            self.day_of_week,
            self.time_slot_id.clone(),
            self.academic_year_id.clone(),
        )
    }
}

/// Read filter for listing live placements of a year.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlacementFilter {
    pub classroom_id: Option<String>,
    pub assignment_id: Option<String>,
}

impl PlacementFilter {
    pub fn matches(&self, placement: &Placement) -> bool {
        if !placement.is_live() {
            return false;
        }
        if let Some(ref classroom_id) = self.classroom_id {
            if &placement.classroom_id != classroom_id {
                return false;
            }
        }
        if let Some(ref assignment_id) = self.assignment_id {
            if &placement.assignment_id != assignment_id {
                return false;
            }
        }
        true
    }
}

/// Result of a soft delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    Removed,
    AlreadyRemoved,
}
