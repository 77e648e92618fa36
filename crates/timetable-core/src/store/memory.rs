//! In-memory store.
//!
//! Holds every table in a mutex-guarded map set. Every write passes a
//! single write gate. [`Transactional::atomically`] holds that gate for the
//! whole closure and restores a snapshot of the tables when the closure
//! fails, so it behaves like a serialized transaction; writes issued by the
//! gate holder's own thread go straight through. Uniqueness keys are
//! enforced inside the insert/update methods themselves, mirroring the
//! partial unique indexes of the SQLite schema.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::thread::{self, ThreadId};

use chrono::{DateTime, Utc};

use super::{CatalogStore, ReferenceCatalog, ScheduleStore, Transactional};
use crate::error::{DatabaseError, StoreError, StoreResult, UniqueConstraint};
use crate::model::{
    AcademicYear, Assignment, AssignmentFilter, Classroom, Group, Period, Placement,
    PlacementFilter, SlotCoordinate, Subject, Teacher, TimeSlot,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    academic_years: HashMap<String, AcademicYear>,
    periods: HashMap<String, Period>,
    time_slots: HashMap<String, TimeSlot>,
    teachers: HashMap<String, Teacher>,
    subjects: HashMap<String, Subject>,
    groups: HashMap<String, Group>,
    classrooms: HashMap<String, Classroom>,
    assignments: HashMap<String, Assignment>,
    placements: HashMap<String, Placement>,
}

impl Tables {
    fn assignment_key_taken(&self, candidate: &Assignment) -> Option<UniqueConstraint> {
        if !candidate.occupies() {
            return None;
        }
        let others = self
            .assignments
            .values()
            .filter(|a| a.id != candidate.id && a.occupies())
            .filter(|a| {
                a.academic_year_id == candidate.academic_year_id
                    && a.day_of_week == candidate.day_of_week
                    && a.time_slot_id == candidate.time_slot_id
            });
        let mut group_taken = false;
        for other in others {
            if other.teacher_id == candidate.teacher_id {
                return Some(UniqueConstraint::TeacherSlot);
            }
            if other.group_id == candidate.group_id {
                group_taken = true;
            }
        }
        group_taken.then_some(UniqueConstraint::GroupSlot)
    }

    fn placement_key_taken(&self, candidate: &Placement) -> Option<UniqueConstraint> {
        if !candidate.is_live() {
            return None;
        }
        let others = self
            .placements
            .values()
            .filter(|p| p.id != candidate.id && p.is_live())
            .filter(|p| {
                p.academic_year_id == candidate.academic_year_id
                    && p.day_of_week == candidate.day_of_week
                    && p.time_slot_id == candidate.time_slot_id
            });
        let mut assignment_taken = false;
        for other in others {
            if other.classroom_id == candidate.classroom_id {
                return Some(UniqueConstraint::RoomSlot);
            }
            if other.assignment_id == candidate.assignment_id {
                assignment_taken = true;
            }
        }
        assignment_taken.then_some(UniqueConstraint::AssignmentSlot)
    }
}

fn duplicate_id(table: &str, id: &str) -> StoreError {
    StoreError::Database(DatabaseError::QueryFailed(format!(
        "duplicate primary key '{id}' in {table}"
    )))
}

fn missing_row(table: &str, id: &str) -> StoreError {
    StoreError::Database(DatabaseError::QueryFailed(format!(
        "no row '{id}' in {table}"
    )))
}

fn in_institution<T: Clone>(
    map: &HashMap<String, T>,
    id: &str,
    institution_of: impl Fn(&T) -> &str,
    institution_id: &str,
) -> Option<T> {
    map.get(id)
        .filter(|row| institution_of(row) == institution_id)
        .cloned()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Records the thread holding the write gate until dropped.
struct GateHolder<'a> {
    slot: &'a Mutex<Option<ThreadId>>,
}

impl<'a> GateHolder<'a> {
    fn claim(slot: &'a Mutex<Option<ThreadId>>) -> Self {
        *lock(slot) = Some(thread::current().id());
        Self { slot }
    }
}

impl Drop for GateHolder<'_> {
    fn drop(&mut self) {
        *lock(self.slot) = None;
    }
}

/// Store keeping everything in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    write_gate: Mutex<()>,
    gate_holder: Mutex<Option<ThreadId>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        lock(&self.tables)
    }

    fn holds_gate(&self) -> bool {
        *lock(&self.gate_holder) == Some(thread::current().id())
    }

    /// Apply one mutation under the write gate, unless this thread already
    /// holds it inside `atomically`.
    fn write<R>(&self, op: impl FnOnce(&mut Tables) -> StoreResult<R>) -> StoreResult<R> {
        let _gate = (!self.holds_gate()).then(|| lock(&self.write_gate));
        op(&mut *self.tables())
    }
}

impl ReferenceCatalog for MemoryStore {
    fn academic_year(&self, institution_id: &str, id: &str) -> StoreResult<Option<AcademicYear>> {
        Ok(in_institution(
            &self.tables().academic_years,
            id,
            |y| &y.institution_id,
            institution_id,
        )
        .filter(AcademicYear::is_live))
    }

    fn list_academic_years(&self, institution_id: &str) -> StoreResult<Vec<AcademicYear>> {
        let mut years: Vec<AcademicYear> = self
            .tables()
            .academic_years
            .values()
            .filter(|y| y.institution_id == institution_id && y.is_live())
            .cloned()
            .collect();
        years.sort_by(|a, b| a.start_date.cmp(&b.start_date).then(a.id.cmp(&b.id)));
        Ok(years)
    }

    fn period(&self, id: &str) -> StoreResult<Option<Period>> {
        Ok(self.tables().periods.get(id).filter(|p| p.is_live()).cloned())
    }

    fn periods_of_year(&self, academic_year_id: &str) -> StoreResult<Vec<Period>> {
        let mut periods: Vec<Period> = self
            .tables()
            .periods
            .values()
            .filter(|p| p.academic_year_id == academic_year_id && p.is_live())
            .cloned()
            .collect();
        periods.sort_by(|a, b| a.start_date.cmp(&b.start_date).then(a.id.cmp(&b.id)));
        Ok(periods)
    }

    fn time_slot(&self, institution_id: &str, id: &str) -> StoreResult<Option<TimeSlot>> {
        Ok(in_institution(
            &self.tables().time_slots,
            id,
            |s| &s.institution_id,
            institution_id,
        ))
    }

    fn list_time_slots(&self, institution_id: &str) -> StoreResult<Vec<TimeSlot>> {
        let mut slots: Vec<TimeSlot> = self
            .tables()
            .time_slots
            .values()
            .filter(|s| s.institution_id == institution_id)
            .cloned()
            .collect();
        slots.sort_by(|a, b| a.start_time.cmp(&b.start_time).then(a.id.cmp(&b.id)));
        Ok(slots)
    }

    fn teacher(&self, institution_id: &str, id: &str) -> StoreResult<Option<Teacher>> {
        Ok(in_institution(
            &self.tables().teachers,
            id,
            |t| &t.institution_id,
            institution_id,
        ))
    }

    fn subject(&self, institution_id: &str, id: &str) -> StoreResult<Option<Subject>> {
        Ok(in_institution(
            &self.tables().subjects,
            id,
            |s| &s.institution_id,
            institution_id,
        ))
    }

    fn group(&self, institution_id: &str, id: &str) -> StoreResult<Option<Group>> {
        Ok(in_institution(
            &self.tables().groups,
            id,
            |g| &g.institution_id,
            institution_id,
        ))
    }

    fn classroom(&self, institution_id: &str, id: &str) -> StoreResult<Option<Classroom>> {
        Ok(in_institution(
            &self.tables().classrooms,
            id,
            |c| &c.institution_id,
            institution_id,
        ))
    }
}

impl CatalogStore for MemoryStore {
    fn insert_academic_year(&self, year: &AcademicYear) -> StoreResult<()> {
        self.write(|tables| {
            if tables.academic_years.contains_key(&year.id) {
                return Err(duplicate_id("academic_years", &year.id));
            }
            tables.academic_years.insert(year.id.clone(), year.clone());
            Ok(())
        })
    }

    fn insert_period(&self, period: &Period) -> StoreResult<()> {
        self.write(|tables| {
            if tables.periods.contains_key(&period.id) {
                return Err(duplicate_id("periods", &period.id));
            }
            tables.periods.insert(period.id.clone(), period.clone());
            Ok(())
        })
    }

    fn update_period(&self, period: &Period) -> StoreResult<()> {
        self.write(|tables| match tables.periods.get_mut(&period.id) {
            Some(row) => {
                *row = period.clone();
                Ok(())
            }
            None => Err(missing_row("periods", &period.id)),
        })
    }

    fn insert_time_slot(&self, slot: &TimeSlot) -> StoreResult<()> {
        self.write(|tables| {
            if tables.time_slots.contains_key(&slot.id) {
                return Err(duplicate_id("time_slots", &slot.id));
            }
            let taken = tables.time_slots.values().any(|s| {
                s.institution_id == slot.institution_id
                    && s.start_time == slot.start_time
                    && s.end_time == slot.end_time
            });
            if taken {
                return Err(StoreError::UniqueViolation(UniqueConstraint::TimeSlotRange));
            }
            tables.time_slots.insert(slot.id.clone(), slot.clone());
            Ok(())
        })
    }

    fn insert_teacher(&self, teacher: &Teacher) -> StoreResult<()> {
        self.write(|tables| {
            if tables.teachers.contains_key(&teacher.id) {
                return Err(duplicate_id("teachers", &teacher.id));
            }
            tables.teachers.insert(teacher.id.clone(), teacher.clone());
            Ok(())
        })
    }

    fn insert_subject(&self, subject: &Subject) -> StoreResult<()> {
        self.write(|tables| {
            if tables.subjects.contains_key(&subject.id) {
                return Err(duplicate_id("subjects", &subject.id));
            }
            tables.subjects.insert(subject.id.clone(), subject.clone());
            Ok(())
        })
    }

    fn insert_group(&self, group: &Group) -> StoreResult<()> {
        self.write(|tables| {
            if tables.groups.contains_key(&group.id) {
                return Err(duplicate_id("groups", &group.id));
            }
            tables.groups.insert(group.id.clone(), group.clone());
            Ok(())
        })
    }

    fn insert_classroom(&self, classroom: &Classroom) -> StoreResult<()> {
        self.write(|tables| {
            if tables.classrooms.contains_key(&classroom.id) {
                return Err(duplicate_id("classrooms", &classroom.id));
            }
            tables.classrooms.insert(classroom.id.clone(), classroom.clone());
            Ok(())
        })
    }
}

impl Transactional for MemoryStore {
    fn atomically<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<StoreError>,
    {
        if self.holds_gate() {
            return f();
        }
        let _gate = lock(&self.write_gate);
        let _holder = GateHolder::claim(&self.gate_holder);
        let snapshot = self.tables().clone();
        let result = f();
        if result.is_err() {
            *self.tables() = snapshot;
        }
        result
    }
}

impl ScheduleStore for MemoryStore {
    fn find_active_by_teacher_slot(
        &self,
        teacher_id: &str,
        slot: &SlotCoordinate,
    ) -> StoreResult<Vec<Assignment>> {
        Ok(self
            .tables()
            .assignments
            .values()
            .filter(|a| a.occupies() && a.teacher_id == teacher_id && a.slot() == *slot)
            .cloned()
            .collect())
    }

    fn find_active_by_group_slot(
        &self,
        group_id: &str,
        slot: &SlotCoordinate,
    ) -> StoreResult<Vec<Assignment>> {
        Ok(self
            .tables()
            .assignments
            .values()
            .filter(|a| a.occupies() && a.group_id == group_id && a.slot() == *slot)
            .cloned()
            .collect())
    }

    fn find_live_by_room_slot(
        &self,
        classroom_id: &str,
        slot: &SlotCoordinate,
    ) -> StoreResult<Vec<Placement>> {
        Ok(self
            .tables()
            .placements
            .values()
            .filter(|p| p.is_live() && p.classroom_id == classroom_id && p.slot() == *slot)
            .cloned()
            .collect())
    }

    fn find_live_by_assignment_slot(
        &self,
        assignment_id: &str,
        slot: &SlotCoordinate,
    ) -> StoreResult<Vec<Placement>> {
        Ok(self
            .tables()
            .placements
            .values()
            .filter(|p| p.is_live() && p.assignment_id == assignment_id && p.slot() == *slot)
            .cloned()
            .collect())
    }

    fn assignment(&self, id: &str) -> StoreResult<Option<Assignment>> {
        Ok(self.tables().assignments.get(id).cloned())
    }

    fn list_assignments(
        &self,
        academic_year_id: &str,
        filter: &AssignmentFilter,
    ) -> StoreResult<Vec<Assignment>> {
        let mut rows: Vec<Assignment> = self
            .tables()
            .assignments
            .values()
            .filter(|a| a.academic_year_id == academic_year_id && filter.matches(a))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    fn insert_assignment(&self, assignment: &Assignment) -> StoreResult<()> {
        self.write(|tables| {
            if tables.assignments.contains_key(&assignment.id) {
                return Err(duplicate_id("assignments", &assignment.id));
            }
            if let Some(constraint) = tables.assignment_key_taken(assignment) {
                return Err(StoreError::UniqueViolation(constraint));
            }
            tables
                .assignments
                .insert(assignment.id.clone(), assignment.clone());
            Ok(())
        })
    }

    fn update_assignment(&self, assignment: &Assignment) -> StoreResult<()> {
        self.write(|tables| {
            if !tables.assignments.contains_key(&assignment.id) {
                return Err(missing_row("assignments", &assignment.id));
            }
            if let Some(constraint) = tables.assignment_key_taken(assignment) {
                return Err(StoreError::UniqueViolation(constraint));
            }
            tables
                .assignments
                .insert(assignment.id.clone(), assignment.clone());
            Ok(())
        })
    }

    fn placement(&self, id: &str) -> StoreResult<Option<Placement>> {
        Ok(self.tables().placements.get(id).cloned())
    }

    fn list_placements(
        &self,
        academic_year_id: &str,
        filter: &PlacementFilter,
    ) -> StoreResult<Vec<Placement>> {
        let mut rows: Vec<Placement> = self
            .tables()
            .placements
            .values()
            .filter(|p| p.academic_year_id == academic_year_id && filter.matches(p))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    fn insert_placement(&self, placement: &Placement) -> StoreResult<()> {
        self.write(|tables| {
            if tables.placements.contains_key(&placement.id) {
                return Err(duplicate_id("placements", &placement.id));
            }
            if let Some(constraint) = tables.placement_key_taken(placement) {
                return Err(StoreError::UniqueViolation(constraint));
            }
            tables
                .placements
                .insert(placement.id.clone(), placement.clone());
            Ok(())
        })
    }

    fn soft_delete_placement(&self, id: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        self.write(|tables| match tables.placements.get_mut(id) {
            Some(p) if p.is_live() => {
                p.deleted_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        })
    }

    fn soft_delete_placements_of_assignment(
        &self,
        assignment_id: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<usize> {
        self.write(|tables| {
            let mut removed = 0;
            for p in tables.placements.values_mut() {
                if p.assignment_id == assignment_id && p.is_live() {
                    p.deleted_at = Some(at);
                    removed += 1;
                }
            }
            Ok(removed)
        })
    }

    fn orphaned_placements(&self) -> StoreResult<Vec<Placement>> {
        let tables = self.tables();
        Ok(tables
            .placements
            .values()
            .filter(|p| p.is_live())
            .filter(|p| {
                tables
                    .assignments
                    .get(&p.assignment_id)
                    .map_or(true, |a| !a.occupies())
            })
            .cloned()
            .collect())
    }
}
