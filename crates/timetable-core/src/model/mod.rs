//! Domain types for the calendar, the reference catalogs, assignments and
//! placements.

mod assignment;
mod calendar;
mod catalog;
mod placement;

use std::fmt;
use std::str::FromStr;

use chrono::Weekday;
use serde::{Deserialize, Serialize};

pub use assignment::{Assignment, AssignmentFilter, AssignmentPatch, NewAssignment};
pub use calendar::{AcademicYear, Period};
pub use catalog::{Classroom, Group, Subject, Teacher, TimeSlot};
pub use placement::{DeleteOutcome, NewPlacement, Placement, PlacementFilter};

/// School day an assignment recurs on. Sunday is not a teaching day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 6] = [
        DayOfWeek::Mon,
        DayOfWeek::Tue,
        DayOfWeek::Wed,
        DayOfWeek::Thu,
        DayOfWeek::Fri,
        DayOfWeek::Sat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DayOfWeek::Mon => "mon",
            DayOfWeek::Tue => "tue",
            DayOfWeek::Wed => "wed",
            DayOfWeek::Thu => "thu",
            DayOfWeek::Fri => "fri",
            DayOfWeek::Sat => "sat",
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DayOfWeek {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mon" | "monday" => Ok(DayOfWeek::Mon),
            "tue" | "tuesday" => Ok(DayOfWeek::Tue),
            "wed" | "wednesday" => Ok(DayOfWeek::Wed),
            "thu" | "thursday" => Ok(DayOfWeek::Thu),
            "fri" | "friday" => Ok(DayOfWeek::Fri),
            "sat" | "saturday" => Ok(DayOfWeek::Sat),
            other => Err(format!("invalid day of week: '{other}' (expected mon..sat)")),
        }
    }
}

impl TryFrom<Weekday> for DayOfWeek {
    type Error = String;

    fn try_from(day: Weekday) -> Result<Self, Self::Error> {
        match day {
            Weekday::Mon => Ok(DayOfWeek::Mon),
            Weekday::Tue => Ok(DayOfWeek::Tue),
            Weekday::Wed => Ok(DayOfWeek::Wed),
            Weekday::Thu => Ok(DayOfWeek::Thu),
            Weekday::Fri => Ok(DayOfWeek::Fri),
            Weekday::Sat => Ok(DayOfWeek::Sat),
            Weekday::Sun => Err("sunday is not a school day".to_string()),
        }
    }
}

impl From<DayOfWeek> for Weekday {
    fn from(day: DayOfWeek) -> Self {
        match day {
            DayOfWeek::Mon => Weekday::Mon,
            DayOfWeek::Tue => Weekday::Tue,
            DayOfWeek::Wed => Weekday::Wed,
            DayOfWeek::Thu => Weekday::Thu,
            DayOfWeek::Fri => Weekday::Fri,
            DayOfWeek::Sat => Weekday::Sat,
        }
    }
}

/// Activation status shared by years, time slots and assignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    #[default]
    Active,
    Inactive,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Active => "active",
            RecordStatus::Inactive => "inactive",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, RecordStatus::Active)
    }
}

impl FromStr for RecordStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(RecordStatus::Active),
            "inactive" => Ok(RecordStatus::Inactive),
            other => Err(format!("invalid status: '{other}' (expected active|inactive)")),
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The (day, time slot, academic year) point every exclusivity rule is
/// evaluated at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotCoordinate {
    pub day_of_week: DayOfWeek,
    pub time_slot_id: String,
    pub academic_year_id: String,
}

impl SlotCoordinate {
    pub fn new(
        day_of_week: DayOfWeek,
        time_slot_id: impl Into<String>,
        academic_year_id: impl Into<String>,
    ) -> Self {
        Self {
            day_of_week,
            time_slot_id: time_slot_id.into(),
            academic_year_id: academic_year_id.into(),
        }
    }
}

impl fmt::Display for SlotCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} slot '{}' in year '{}'",
            self.day_of_week, self.time_slot_id, self.academic_year_id
        )
    }
}
