//! Storage seams used by the scheduling core.
//!
//! [`ReferenceCatalog`] is the read side of the calendar and the resource
//! catalogs. Every lookup takes the institution explicitly.
//! [`CatalogStore`] adds the writes the calendar registry and catalogs
//! perform. [`ScheduleStore`] holds assignments and placements and is the
//! only path through which they are mutated. Both writers share
//! [`Transactional`], so a calendar check and its write serialize the same
//! way an assignment check and its write do.
//!
//! Two implementations exist: [`MemoryStore`] for tests and embedding, and
//! [`crate::storage::TimetableDb`] on SQLite.

mod memory;

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{StoreError, StoreResult};
use crate::model::{
    AcademicYear, Assignment, AssignmentFilter, Classroom, Group, Period, Placement,
    PlacementFilter, SlotCoordinate, Subject, Teacher, TimeSlot,
};

pub use memory::MemoryStore;

/// Read-only access to calendar and reference entities.
pub trait ReferenceCatalog {
    fn academic_year(&self, institution_id: &str, id: &str) -> StoreResult<Option<AcademicYear>>;
    fn list_academic_years(&self, institution_id: &str) -> StoreResult<Vec<AcademicYear>>;
    /// Periods are reached through their year; callers scope by checking the
    /// year first.
    fn period(&self, id: &str) -> StoreResult<Option<Period>>;
    fn periods_of_year(&self, academic_year_id: &str) -> StoreResult<Vec<Period>>;
    fn time_slot(&self, institution_id: &str, id: &str) -> StoreResult<Option<TimeSlot>>;
    fn list_time_slots(&self, institution_id: &str) -> StoreResult<Vec<TimeSlot>>;
    fn teacher(&self, institution_id: &str, id: &str) -> StoreResult<Option<Teacher>>;
    fn subject(&self, institution_id: &str, id: &str) -> StoreResult<Option<Subject>>;
    fn group(&self, institution_id: &str, id: &str) -> StoreResult<Option<Group>>;
    fn classroom(&self, institution_id: &str, id: &str) -> StoreResult<Option<Classroom>>;

    /// Live period of the year whose range contains `date`.
    fn period_containing(
        &self,
        academic_year_id: &str,
        date: NaiveDate,
    ) -> StoreResult<Option<Period>> {
        Ok(self
            .periods_of_year(academic_year_id)?
            .into_iter()
            .find(|p| p.is_live() && p.start_date <= date && date <= p.end_date))
    }
}

/// Check-then-write units of work.
pub trait Transactional {
    /// Run `f` as one atomic unit. Writes made by `f` are discarded when it
    /// returns `Err`. Concurrent writers are serialized, and a call made
    /// from inside `f` joins the running unit.
    fn atomically<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<StoreError>;
}

/// Writes backing the calendar registry and the reference catalogs.
pub trait CatalogStore: ReferenceCatalog + Transactional {
    fn insert_academic_year(&self, year: &AcademicYear) -> StoreResult<()>;
    fn insert_period(&self, period: &Period) -> StoreResult<()>;
    fn update_period(&self, period: &Period) -> StoreResult<()>;
    /// Fails with [`StoreError::UniqueViolation`] when the institution already
    /// has a slot with the same clock range.
    fn insert_time_slot(&self, slot: &TimeSlot) -> StoreResult<()>;
    fn insert_teacher(&self, teacher: &Teacher) -> StoreResult<()>;
    fn insert_subject(&self, subject: &Subject) -> StoreResult<()>;
    fn insert_group(&self, group: &Group) -> StoreResult<()>;
    fn insert_classroom(&self, classroom: &Classroom) -> StoreResult<()>;
}

/// Assignment and placement persistence.
///
/// Implementations enforce the four exclusivity keys as uniqueness
/// constraints on write, independent of any check the caller ran first:
/// active assignments per (year, teacher, day, slot) and (year, group, day,
/// slot); live placements per (year, classroom, day, slot) and (year,
/// assignment, day, slot). A colliding write fails with
/// [`StoreError::UniqueViolation`].
pub trait ScheduleStore: Transactional {
    fn find_active_by_teacher_slot(
        &self,
        teacher_id: &str,
        slot: &SlotCoordinate,
    ) -> StoreResult<Vec<Assignment>>;

    fn find_active_by_group_slot(
        &self,
        group_id: &str,
        slot: &SlotCoordinate,
    ) -> StoreResult<Vec<Assignment>>;

    fn find_live_by_room_slot(
        &self,
        classroom_id: &str,
        slot: &SlotCoordinate,
    ) -> StoreResult<Vec<Placement>>;

    fn find_live_by_assignment_slot(
        &self,
        assignment_id: &str,
        slot: &SlotCoordinate,
    ) -> StoreResult<Vec<Placement>>;

    /// Fetch by id, including inactive and soft-deleted rows.
    fn assignment(&self, id: &str) -> StoreResult<Option<Assignment>>;
    fn list_assignments(
        &self,
        academic_year_id: &str,
        filter: &AssignmentFilter,
    ) -> StoreResult<Vec<Assignment>>;
    fn insert_assignment(&self, assignment: &Assignment) -> StoreResult<()>;
    fn update_assignment(&self, assignment: &Assignment) -> StoreResult<()>;

    /// Fetch by id, including removed rows.
    fn placement(&self, id: &str) -> StoreResult<Option<Placement>>;
    fn list_placements(
        &self,
        academic_year_id: &str,
        filter: &PlacementFilter,
    ) -> StoreResult<Vec<Placement>>;
    fn insert_placement(&self, placement: &Placement) -> StoreResult<()>;
    /// Returns false when the placement was already removed or never existed.
    fn soft_delete_placement(&self, id: &str, at: DateTime<Utc>) -> StoreResult<bool>;
    fn soft_delete_placements_of_assignment(
        &self,
        assignment_id: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<usize>;
    /// Live placements whose assignment is inactive or deleted.
    fn orphaned_placements(&self) -> StoreResult<Vec<Placement>>;
}
