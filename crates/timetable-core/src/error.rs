//! Core error types for timetable-core.
//!
//! Errors are layered the same way the storage stack is:
//!
//! - [`DatabaseError`] and [`ConfigError`] describe infrastructure failures.
//! - [`StoreError`] is what a [`crate::store::ScheduleStore`] or
//!   [`crate::store::ReferenceCatalog`] returns, and distinguishes
//!   uniqueness violations from other storage failures.
//! - [`ScheduleError`] is the taxonomy callers of the ledger and the
//!   placement engine see. Every business-rule rejection carries the
//!   coordinate it was rejected at.
//! - [`CoreError`] is the umbrella used by application entry points.

use std::fmt;
use std::path::PathBuf;

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use thiserror::Error;

use crate::model::SlotCoordinate;

/// Core error type for timetable-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Scheduling rule violations and lookups
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Input validation errors. Always a client error, never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Date range with start not strictly before end
    #[error("Invalid date range: end_date ({end}) must be after start_date ({start})")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    /// Clock range with start not strictly before end
    #[error("Invalid time range: end_time ({end}) must be after start_time ({start})")]
    InvalidTimeRange { start: NaiveTime, end: NaiveTime },

    /// Period dates fall outside the parent academic year
    #[error("Period range {start}..{end} is outside academic year '{academic_year_id}' ({year_start}..{year_end})")]
    PeriodOutsideYear {
        academic_year_id: String,
        start: NaiveDate,
        end: NaiveDate,
        year_start: NaiveDate,
        year_end: NaiveDate,
    },

    /// Period overlaps a sibling period of the same year
    #[error("Period overlaps existing period '{other_period_id}' of the same academic year")]
    PeriodOverlap { other_period_id: String },

    /// A time slot with the same clock range already exists for the institution
    #[error("Time slot {start}-{end} already exists for institution '{institution_id}'")]
    DuplicateTimeSlot {
        institution_id: String,
        start: NaiveTime,
        end: NaiveTime,
    },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Which storage-level uniqueness constraint rejected a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UniqueConstraint {
    /// Active assignment per (year, teacher, day, slot)
    TeacherSlot,
    /// Active assignment per (year, group, day, slot)
    GroupSlot,
    /// Live placement per (year, classroom, day, slot)
    RoomSlot,
    /// Live placement per (year, assignment, day, slot)
    AssignmentSlot,
    /// Time slot per (institution, start, end)
    TimeSlotRange,
}

impl UniqueConstraint {
    /// Name of the backing index in the SQLite schema.
    pub fn index_name(&self) -> &'static str {
        match self {
            UniqueConstraint::TeacherSlot => "ux_assignments_teacher_slot",
            UniqueConstraint::GroupSlot => "ux_assignments_group_slot",
            UniqueConstraint::RoomSlot => "ux_placements_room_slot",
            UniqueConstraint::AssignmentSlot => "ux_placements_assignment_slot",
            UniqueConstraint::TimeSlotRange => "ux_time_slots_range",
        }
    }

    /// Identify the constraint from a SQLite "UNIQUE constraint failed" message.
    ///
    /// SQLite reports the indexed columns, e.g.
    /// `UNIQUE constraint failed: assignments.academic_year_id, assignments.teacher_id, ...`.
    pub fn from_sqlite_message(message: &str) -> Option<Self> {
        if message.contains("assignments.teacher_id") {
            Some(UniqueConstraint::TeacherSlot)
        } else if message.contains("assignments.group_id") {
            Some(UniqueConstraint::GroupSlot)
        } else if message.contains("placements.classroom_id") {
            Some(UniqueConstraint::RoomSlot)
        } else if message.contains("placements.assignment_id") {
            Some(UniqueConstraint::AssignmentSlot)
        } else if message.contains("time_slots.start_time") {
            Some(UniqueConstraint::TimeSlotRange)
        } else {
            None
        }
    }
}

impl fmt::Display for UniqueConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.index_name())
    }
}

/// Errors returned by store implementations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A write collided with a uniqueness constraint at commit time.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(UniqueConstraint),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(code, Some(message)) = &err {
            if code.code == rusqlite::ErrorCode::ConstraintViolation {
                if let Some(constraint) = UniqueConstraint::from_sqlite_message(message) {
                    return StoreError::UniqueViolation(constraint);
                }
            }
        }
        StoreError::Database(DatabaseError::from(err))
    }
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by the calendar registry, catalogs, assignment ledger and
/// placement engine.
#[derive(Error, Debug)]
pub enum ScheduleError {
    /// Malformed input
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Referenced id does not exist inside the institution scope
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    /// Period belongs to a different academic year
    #[error("Period '{period_id}' does not belong to academic year '{academic_year_id}'")]
    PeriodScope {
        period_id: String,
        academic_year_id: String,
    },

    #[error("Teacher '{teacher_id}' is already assigned at {slot}")]
    TeacherConflict {
        teacher_id: String,
        slot: SlotCoordinate,
    },

    #[error("Group '{group_id}' is already assigned at {slot}")]
    GroupConflict { group_id: String, slot: SlotCoordinate },

    #[error("Classroom '{classroom_id}' is already occupied at {slot}")]
    RoomConflict {
        classroom_id: String,
        slot: SlotCoordinate,
    },

    #[error("Assignment '{assignment_id}' is already placed at {slot}")]
    AssignmentDoubleBooked {
        assignment_id: String,
        slot: SlotCoordinate,
    },

    /// Placement tried to retarget its assignment to another coordinate
    #[error("Assignment '{assignment_id}' is scheduled at {expected}, not {requested}")]
    SlotMismatch {
        assignment_id: String,
        expected: SlotCoordinate,
        requested: SlotCoordinate,
    },

    #[error("Assignment '{assignment_id}' is inactive")]
    InactiveAssignment { assignment_id: String },

    #[error("Placement '{placement_id}' has been removed")]
    PlacementRemoved { placement_id: String },

    /// Commit-time uniqueness violation. Retried once by the engine and
    /// translated into the matching business error if it persists.
    #[error("Concurrent write rejected by {constraint}")]
    ConcurrencyConflict { constraint: UniqueConstraint },

    #[error("Storage error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for ScheduleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation(constraint) => {
                ScheduleError::ConcurrencyConflict { constraint }
            }
            other => ScheduleError::Store(other),
        }
    }
}

impl ScheduleError {
    pub(crate) fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        ScheduleError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ScheduleError::Validation(_) => "VALIDATION",
            ScheduleError::NotFound { .. } => "NOT_FOUND",
            ScheduleError::PeriodScope { .. } => "PERIOD_SCOPE",
            ScheduleError::TeacherConflict { .. } => "TEACHER_CONFLICT",
            ScheduleError::GroupConflict { .. } => "GROUP_CONFLICT",
            ScheduleError::RoomConflict { .. } => "ROOM_CONFLICT",
            ScheduleError::AssignmentDoubleBooked { .. } => "ASSIGNMENT_DOUBLE_BOOKED",
            ScheduleError::SlotMismatch { .. } => "SLOT_MISMATCH",
            ScheduleError::InactiveAssignment { .. } => "ASSIGNMENT_INACTIVE",
            ScheduleError::PlacementRemoved { .. } => "PLACEMENT_REMOVED",
            ScheduleError::ConcurrencyConflict { .. } => "CONCURRENCY_CONFLICT",
            ScheduleError::Store(_) => "STORAGE",
        }
    }

    /// HTTP status a transport layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            ScheduleError::Validation(_) => 422,
            ScheduleError::NotFound { .. } => 404,
            ScheduleError::Store(_) => 500,
            _ => 409,
        }
    }

    /// True for the expected business-rule rejections.
    pub fn is_conflict(&self) -> bool {
        self.http_status() == 409
    }

    /// The coordinate a conflict was detected at, if any.
    pub fn coordinate(&self) -> Option<&SlotCoordinate> {
        match self {
            ScheduleError::TeacherConflict { slot, .. }
            | ScheduleError::GroupConflict { slot, .. }
            | ScheduleError::RoomConflict { slot, .. }
            | ScheduleError::AssignmentDoubleBooked { slot, .. } => Some(slot),
            ScheduleError::SlotMismatch { requested, .. } => Some(requested),
            _ => None,
        }
    }

    /// Serializable body for transport wrappers.
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code(),
            message: self.to_string(),
            coordinate: self.coordinate().cloned(),
        }
    }
}

/// Wire shape of a [`ScheduleError`].
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinate: Option<SlotCoordinate>,
}

// Helper implementations for converting from other error types

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, _msg) => {
                if code.code == rusqlite::ErrorCode::DatabaseLocked
                    || code.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DayOfWeek;

    fn coordinate() -> SlotCoordinate {
        SlotCoordinate::new(DayOfWeek::Mon, "slot-1", "year-2024")
    }

    #[test]
    fn conflict_codes_and_statuses() {
        let err = ScheduleError::TeacherConflict {
            teacher_id: "t1".into(),
            slot: coordinate(),
        };
        assert_eq!(err.code(), "TEACHER_CONFLICT");
        assert_eq!(err.http_status(), 409);
        assert!(err.is_conflict());
        assert_eq!(err.coordinate(), Some(&coordinate()));

        let err = ScheduleError::not_found("teacher", "t9");
        assert_eq!(err.code(), "NOT_FOUND");
        assert_eq!(err.http_status(), 404);
        assert!(!err.is_conflict());

        let err: ScheduleError = ValidationError::InvalidValue {
            field: "name".into(),
            message: "empty".into(),
        }
        .into();
        assert_eq!(err.code(), "VALIDATION");
        assert_eq!(err.http_status(), 422);
    }

    #[test]
    fn unique_violation_becomes_concurrency_conflict() {
        let err: ScheduleError = StoreError::UniqueViolation(UniqueConstraint::RoomSlot).into();
        assert!(matches!(
            err,
            ScheduleError::ConcurrencyConflict {
                constraint: UniqueConstraint::RoomSlot
            }
        ));

        let err: ScheduleError = StoreError::Database(DatabaseError::Locked).into();
        assert_eq!(err.code(), "STORAGE");
    }

    #[test]
    fn constraint_parsed_from_sqlite_message() {
        let msg = "UNIQUE constraint failed: assignments.academic_year_id, assignments.teacher_id, assignments.day_of_week, assignments.time_slot_id";
        assert_eq!(
            UniqueConstraint::from_sqlite_message(msg),
            Some(UniqueConstraint::TeacherSlot)
        );
        let msg = "UNIQUE constraint failed: placements.academic_year_id, placements.assignment_id, placements.day_of_week, placements.time_slot_id";
        assert_eq!(
            UniqueConstraint::from_sqlite_message(msg),
            Some(UniqueConstraint::AssignmentSlot)
        );
        assert_eq!(
            UniqueConstraint::from_sqlite_message("UNIQUE constraint failed: teachers.id"),
            None
        );
    }

    #[test]
    fn error_body_serializes_code_and_coordinate() {
        let err = ScheduleError::RoomConflict {
            classroom_id: "r1".into(),
            slot: coordinate(),
        };
        let json = serde_json::to_value(err.to_body()).unwrap();
        assert_eq!(json["code"], "ROOM_CONFLICT");
        assert_eq!(json["coordinate"]["day_of_week"], "mon");
        assert_eq!(json["coordinate"]["time_slot_id"], "slot-1");

        let body = ScheduleError::not_found("classroom", "r9").to_body();
        let json = serde_json::to_value(body).unwrap();
        assert!(json.get("coordinate").is_none());
    }
}
