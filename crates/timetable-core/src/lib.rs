//! # Timetable Core Library
//!
//! This library provides the core business logic for school timetabling:
//! recording who teaches what to whom at which (day, time slot) of an
//! academic year, and binding those lessons to classrooms, without ever
//! double-booking a teacher, a group or a room. All operations are
//! available through the standalone `timetable-cli` binary, which is a thin
//! layer over this crate.
//!
//! ## Architecture
//!
//! - **Calendar and catalogs**: academic years, periods, time slots and the
//!   reference entities, always looked up inside an explicit institution
//! - **Assignment ledger**: creates and edits assignments, enforcing teacher
//!   and group exclusivity per (day, slot, year)
//! - **Placement engine**: binds active assignments to classrooms, enforcing
//!   room and assignment exclusivity
//! - **Storage**: a store trait with an in-memory implementation and a SQLite
//!   implementation whose partial unique indexes back every exclusivity rule,
//!   plus TOML-based configuration
//!
//! ## Key Components
//!
//! - [`AssignmentLedger`]: assignment lifecycle
//! - [`PlacementEngine`]: placement lifecycle
//! - [`ConflictChecker`]: read-only exclusivity predicates
//! - [`TimetableDb`]: SQLite persistence
//! - [`Config`]: application configuration management

pub mod calendar;
pub mod catalog;
pub mod conflict;
pub mod error;
pub mod ledger;
pub mod model;
pub mod placement;
pub mod storage;
pub mod store;
pub mod timetable;

pub use calendar::CalendarRegistry;
pub use catalog::Catalogs;
pub use conflict::ConflictChecker;
pub use error::{
    ConfigError, CoreError, DatabaseError, ErrorBody, ScheduleError, StoreError, UniqueConstraint,
    ValidationError,
};
pub use ledger::{AssignmentLedger, Deactivation};
pub use model::{
    AcademicYear, Assignment, AssignmentFilter, AssignmentPatch, Classroom, DayOfWeek,
    DeleteOutcome, Group, NewAssignment, NewPlacement, Period, Placement, PlacementFilter,
    RecordStatus, SlotCoordinate, Subject, Teacher, TimeSlot,
};
pub use placement::PlacementEngine;
pub use storage::{Config, TimetableDb};
pub use store::{CatalogStore, MemoryStore, ReferenceCatalog, ScheduleStore, Transactional};
pub use timetable::{weekly_timetable, TimetableEntry, TimetableView};
