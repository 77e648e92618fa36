use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use super::RecordStatus;

/// Recurring clock interval defined by an institution (e.g. 08:00-09:00).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub id: String,
    pub institution_id: String,
    pub name: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[serde(default)]
    pub status: RecordStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classroom {
    pub id: String,
    pub institution_id: String,
    pub name: String,
    pub kind: String,
    pub capacity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Teacher {
    pub id: String,
    pub institution_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub institution_id: String,
    pub name: String,
}

/// A class section, scoped to a site and a grade level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub institution_id: String,
    pub site_id: String,
    pub grade_level_id: String,
    pub name: String,
}
