//! Exclusivity predicates over committed state.
//!
//! Every check is a read. Nothing here writes, so the checks can run any
//! number of times before a commit decision. Callers that act on the answer
//! run the check and the write inside
//! [`crate::store::Transactional::atomically`].

use tracing::{debug, warn};

use crate::error::{ScheduleError, StoreResult, UniqueConstraint};
use crate::model::{Assignment, DayOfWeek, SlotCoordinate};
use crate::store::ScheduleStore;

pub struct ConflictChecker<'a, S> {
    store: &'a S,
}

impl<'a, S: ScheduleStore> ConflictChecker<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// An active assignment already holds this teacher at the coordinate.
    pub fn teacher_has_conflict(
        &self,
        teacher_id: &str,
        day_of_week: DayOfWeek,
        time_slot_id: &str,
        academic_year_id: &str,
        exclude_assignment_id: Option<&str>,
    ) -> StoreResult<bool> {
        let slot = SlotCoordinate::new(day_of_week, time_slot_id, academic_year_id);
        let hit = self
            .store
            .find_active_by_teacher_slot(teacher_id, &slot)?
            .iter()
            .any(|a| Some(a.id.as_str()) != exclude_assignment_id);
        debug!(teacher_id, %slot, hit, "teacher slot check");
        Ok(hit)
    }

    /// An active assignment already holds this group at the coordinate.
    pub fn group_has_conflict(
        &self,
        group_id: &str,
        day_of_week: DayOfWeek,
        time_slot_id: &str,
        academic_year_id: &str,
        exclude_assignment_id: Option<&str>,
    ) -> StoreResult<bool> {
        let slot = SlotCoordinate::new(day_of_week, time_slot_id, academic_year_id);
        let hit = self
            .store
            .find_active_by_group_slot(group_id, &slot)?
            .iter()
            .any(|a| Some(a.id.as_str()) != exclude_assignment_id);
        debug!(group_id, %slot, hit, "group slot check");
        Ok(hit)
    }

    /// A live placement already occupies this classroom at the coordinate.
    pub fn room_has_conflict(
        &self,
        classroom_id: &str,
        day_of_week: DayOfWeek,
        time_slot_id: &str,
        academic_year_id: &str,
        exclude_placement_id: Option<&str>,
    ) -> StoreResult<bool> {
        let slot = SlotCoordinate::new(day_of_week, time_slot_id, academic_year_id);
        let hit = self
            .store
            .find_live_by_room_slot(classroom_id, &slot)?
            .iter()
            .any(|p| Some(p.id.as_str()) != exclude_placement_id);
        debug!(classroom_id, %slot, hit, "room slot check");
        Ok(hit)
    }

    /// The assignment is already placed in some room at the coordinate.
    pub fn assignment_slot_has_conflict(
        &self,
        assignment_id: &str,
        day_of_week: DayOfWeek,
        time_slot_id: &str,
        academic_year_id: &str,
        exclude_placement_id: Option<&str>,
    ) -> StoreResult<bool> {
        let slot = SlotCoordinate::new(day_of_week, time_slot_id, academic_year_id);
        let hit = self
            .store
            .find_live_by_assignment_slot(assignment_id, &slot)?
            .iter()
            .any(|p| Some(p.id.as_str()) != exclude_placement_id);
        debug!(assignment_id, %slot, hit, "assignment slot check");
        Ok(hit)
    }

    /// Business errors `candidate` would be rejected with, teacher first.
    pub fn conflicts_for(
        &self,
        candidate: &Assignment,
        exclude_assignment_id: Option<&str>,
    ) -> StoreResult<Vec<ScheduleError>> {
        let mut found = Vec::new();
        if self.teacher_has_conflict(
            &candidate.teacher_id,
            candidate.day_of_week,
            &candidate.time_slot_id,
            &candidate.academic_year_id,
            exclude_assignment_id,
        )? {
            found.push(assignment_conflict(UniqueConstraint::TeacherSlot, candidate));
        }
        if self.group_has_conflict(
            &candidate.group_id,
            candidate.day_of_week,
            &candidate.time_slot_id,
            &candidate.academic_year_id,
            exclude_assignment_id,
        )? {
            found.push(assignment_conflict(UniqueConstraint::GroupSlot, candidate));
        }
        Ok(found)
    }

    /// First business error for `candidate`, if any.
    pub(crate) fn ensure_assignment_free(
        &self,
        candidate: &Assignment,
        exclude_assignment_id: Option<&str>,
    ) -> Result<(), ScheduleError> {
        match self.conflicts_for(candidate, exclude_assignment_id)?.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Business error matching a violated assignment key.
pub(crate) fn assignment_conflict(constraint: UniqueConstraint, candidate: &Assignment) -> ScheduleError {
    match constraint {
        UniqueConstraint::TeacherSlot => ScheduleError::TeacherConflict {
            teacher_id: candidate.teacher_id.clone(),
            slot: candidate.slot(),
        },
        UniqueConstraint::GroupSlot => ScheduleError::GroupConflict {
            group_id: candidate.group_id.clone(),
            slot: candidate.slot(),
        },
        other => ScheduleError::ConcurrencyConflict { constraint: other },
    }
}

/// Run a check+write attempt, retrying once when the commit hits a
/// uniqueness constraint. A second violation is reported through
/// `translate` as the matching business error.
pub(crate) fn with_commit_retry<T>(
    operation: &str,
    mut attempt: impl FnMut() -> Result<T, ScheduleError>,
    translate: impl Fn(UniqueConstraint) -> ScheduleError,
) -> Result<T, ScheduleError> {
    match attempt() {
        Err(ScheduleError::ConcurrencyConflict { constraint }) => {
            warn!(operation, %constraint, "commit rejected by unique constraint, retrying");
            match attempt() {
                Err(ScheduleError::ConcurrencyConflict { constraint }) => Err(translate(constraint)),
                other => other,
            }
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewAssignment, NewPlacement, Placement, RecordStatus};
    use crate::store::MemoryStore;
    use chrono::Utc;
    use std::cell::Cell;

    fn assignment(id: &str, teacher: &str, group: &str, day: DayOfWeek) -> Assignment {
        Assignment::from_new(
            id.into(),
            NewAssignment {
                teacher_id: teacher.into(),
                subject_id: "s1".into(),
                group_id: group.into(),
                time_slot_id: "slot-1".into(),
                day_of_week: day,
                academic_year_id: "y2024".into(),
                period_id: None,
            },
            Utc::now(),
        )
    }

    #[test]
    fn teacher_check_matches_all_four_keys() {
        let store = MemoryStore::new();
        store
            .insert_assignment(&assignment("a1", "t1", "g1", DayOfWeek::Mon))
            .unwrap();
        let checker = ConflictChecker::new(&store);

        assert!(checker
            .teacher_has_conflict("t1", DayOfWeek::Mon, "slot-1", "y2024", None)
            .unwrap());
        assert!(!checker
            .teacher_has_conflict("t1", DayOfWeek::Tue, "slot-1", "y2024", None)
            .unwrap());
        assert!(!checker
            .teacher_has_conflict("t1", DayOfWeek::Mon, "slot-2", "y2024", None)
            .unwrap());
        assert!(!checker
            .teacher_has_conflict("t1", DayOfWeek::Mon, "slot-1", "y2025", None)
            .unwrap());
        assert!(!checker
            .teacher_has_conflict("t2", DayOfWeek::Mon, "slot-1", "y2024", None)
            .unwrap());
    }

    #[test]
    fn excluded_row_does_not_conflict_with_itself() {
        let store = MemoryStore::new();
        store
            .insert_assignment(&assignment("a1", "t1", "g1", DayOfWeek::Mon))
            .unwrap();
        let checker = ConflictChecker::new(&store);
        assert!(!checker
            .teacher_has_conflict("t1", DayOfWeek::Mon, "slot-1", "y2024", Some("a1"))
            .unwrap());
        assert!(!checker
            .group_has_conflict("g1", DayOfWeek::Mon, "slot-1", "y2024", Some("a1"))
            .unwrap());
        assert!(checker
            .group_has_conflict("g1", DayOfWeek::Mon, "slot-1", "y2024", Some("other"))
            .unwrap());
    }

    #[test]
    fn inactive_assignments_are_ignored() {
        let store = MemoryStore::new();
        let mut a = assignment("a1", "t1", "g1", DayOfWeek::Mon);
        a.status = RecordStatus::Inactive;
        store.insert_assignment(&a).unwrap();
        let checker = ConflictChecker::new(&store);
        assert!(!checker
            .teacher_has_conflict("t1", DayOfWeek::Mon, "slot-1", "y2024", None)
            .unwrap());
    }

    #[test]
    fn room_and_assignment_slot_checks() {
        let store = MemoryStore::new();
        let placement = Placement::from_new(
            "p1".into(),
            NewPlacement {
                assignment_id: "a1".into(),
                classroom_id: "r1".into(),
                time_slot_id: "slot-1".into(),
                day_of_week: DayOfWeek::Mon,
                academic_year_id: "y2024".into(),
            },
            Utc::now(),
        );
        store.insert_placement(&placement).unwrap();
        let checker = ConflictChecker::new(&store);

        assert!(checker
            .room_has_conflict("r1", DayOfWeek::Mon, "slot-1", "y2024", None)
            .unwrap());
        assert!(!checker
            .room_has_conflict("r1", DayOfWeek::Mon, "slot-1", "y2024", Some("p1"))
            .unwrap());
        assert!(checker
            .assignment_slot_has_conflict("a1", DayOfWeek::Mon, "slot-1", "y2024", None)
            .unwrap());

        store.soft_delete_placement("p1", Utc::now()).unwrap();
        assert!(!checker
            .room_has_conflict("r1", DayOfWeek::Mon, "slot-1", "y2024", None)
            .unwrap());
    }

    #[test]
    fn conflicts_for_reports_teacher_before_group() {
        let store = MemoryStore::new();
        store
            .insert_assignment(&assignment("a1", "t1", "g1", DayOfWeek::Mon))
            .unwrap();
        let checker = ConflictChecker::new(&store);
        let found = checker
            .conflicts_for(&assignment("a2", "t1", "g1", DayOfWeek::Mon), None)
            .unwrap();
        let codes: Vec<_> = found.iter().map(|e| e.code()).collect();
        assert_eq!(codes, vec!["TEACHER_CONFLICT", "GROUP_CONFLICT"]);
    }

    #[test]
    fn checks_do_not_write() {
        let store = MemoryStore::new();
        let checker = ConflictChecker::new(&store);
        for _ in 0..3 {
            assert!(!checker
                .teacher_has_conflict("t1", DayOfWeek::Mon, "slot-1", "y2024", None)
                .unwrap());
        }
        assert!(store
            .list_assignments("y2024", &Default::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn commit_retry_runs_at_most_twice() {
        let calls = Cell::new(0);
        let result: Result<(), ScheduleError> = with_commit_retry(
            "test",
            || {
                calls.set(calls.get() + 1);
                Err(ScheduleError::ConcurrencyConflict {
                    constraint: UniqueConstraint::TeacherSlot,
                })
            },
            |_| ScheduleError::not_found("teacher", "t1"),
        );
        assert_eq!(calls.get(), 2);
        assert_eq!(result.unwrap_err().code(), "NOT_FOUND");

        let calls = Cell::new(0);
        let result = with_commit_retry(
            "test",
            || {
                calls.set(calls.get() + 1);
                if calls.get() == 1 {
                    Err(ScheduleError::ConcurrencyConflict {
                        constraint: UniqueConstraint::RoomSlot,
                    })
                } else {
                    Ok(7)
                }
            },
            |c| ScheduleError::ConcurrencyConflict { constraint: c },
        );
        assert_eq!(result.unwrap(), 7);
    }
}
