use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::RecordStatus;

/// A school year owned by an institution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcademicYear {
    pub id: String,
    pub institution_id: String,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub status: RecordStatus,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl AcademicYear {
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// True when `date` falls inside the year, bounds included.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

/// A subdivision of an academic year (term, semester, quarter).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Period {
    pub id: String,
    pub academic_year_id: String,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Period {
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Half-open overlap test on `[start, end)`.
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start_date < end && start < self.end_date
    }
}
