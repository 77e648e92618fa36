//! Timetable placement engine: binds active assignments to classrooms.
//!
//! A placement always sits at its assignment's own (day, slot, year); the
//! engine refuses to retarget an assignment through a placement. Room and
//! assignment exclusivity are checked when a placement is made and not
//! re-verified afterwards.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::conflict::{with_commit_retry, ConflictChecker};
use crate::error::{ScheduleError, UniqueConstraint};
use crate::model::{Assignment, DeleteOutcome, NewPlacement, Placement, PlacementFilter};
use crate::store::{ReferenceCatalog, ScheduleStore};

fn placement_conflict(constraint: UniqueConstraint, placement: &Placement) -> ScheduleError {
    match constraint {
        UniqueConstraint::RoomSlot => ScheduleError::RoomConflict {
            classroom_id: placement.classroom_id.clone(),
            slot: placement.slot(),
        },
        UniqueConstraint::AssignmentSlot => ScheduleError::AssignmentDoubleBooked {
            assignment_id: placement.assignment_id.clone(),
            slot: placement.slot(),
        },
        other => ScheduleError::ConcurrencyConflict { constraint: other },
    }
}

pub struct PlacementEngine<'a, S> {
    store: &'a S,
}

impl<'a, S: ScheduleStore + ReferenceCatalog> PlacementEngine<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    fn checker(&self) -> ConflictChecker<'a, S> {
        ConflictChecker::new(self.store)
    }

    pub fn create_placement(
        &self,
        institution_id: &str,
        input: NewPlacement,
    ) -> Result<Placement, ScheduleError> {
        let candidate = Placement::from_new(Uuid::new_v4().to_string(), input, Utc::now());

        with_commit_retry(
            "create_placement",
            || {
                self.store.atomically(|| -> Result<(), ScheduleError> {
                    self.check_target(institution_id, &candidate)?;
                    self.ensure_room_free(&candidate, None)?;
                    self.ensure_assignment_unplaced(&candidate)?;
                    self.store.insert_placement(&candidate)?;
                    Ok(())
                })
            },
            |constraint| placement_conflict(constraint, &candidate),
        )?;

        info!(
            placement_id = %candidate.id,
            assignment_id = %candidate.assignment_id,
            classroom_id = %candidate.classroom_id,
            slot = %candidate.slot(),
            "placement created"
        );
        Ok(candidate)
    }

    /// Soft-delete a placement. Repeated calls report
    /// [`DeleteOutcome::AlreadyRemoved`].
    pub fn delete_placement(&self, id: &str) -> Result<DeleteOutcome, ScheduleError> {
        let outcome = self.store.atomically(|| -> Result<_, ScheduleError> {
            if self.store.placement(id)?.is_none() {
                return Err(ScheduleError::not_found("placement", id));
            }
            if self.store.soft_delete_placement(id, Utc::now())? {
                Ok(DeleteOutcome::Removed)
            } else {
                Ok(DeleteOutcome::AlreadyRemoved)
            }
        })?;
        info!(placement_id = id, ?outcome, "placement deleted");
        Ok(outcome)
    }

    /// Move a placement to another classroom at the same coordinate. The old
    /// placement is removed and a new one created in one transaction.
    pub fn move_placement(
        &self,
        institution_id: &str,
        id: &str,
        new_classroom_id: &str,
    ) -> Result<Placement, ScheduleError> {
        let current = self
            .store
            .placement(id)?
            .ok_or_else(|| ScheduleError::not_found("placement", id))?;
        if !current.is_live() {
            return Err(ScheduleError::PlacementRemoved {
                placement_id: id.to_string(),
            });
        }
        if current.classroom_id == new_classroom_id {
            return Ok(current);
        }

        let mut moved = current.clone();
        moved.id = Uuid::new_v4().to_string();
        moved.classroom_id = new_classroom_id.to_string();
        moved.created_at = Utc::now();

        with_commit_retry(
            "move_placement",
            || {
                self.store.atomically(|| -> Result<(), ScheduleError> {
                    let live = self
                        .store
                        .placement(id)?
                        .filter(Placement::is_live)
                        .ok_or_else(|| ScheduleError::PlacementRemoved {
                            placement_id: id.to_string(),
                        })?;
                    self.scoped_assignment(institution_id, &live.assignment_id)?;
                    self.check_classroom(institution_id, &moved.classroom_id)?;
                    self.ensure_room_free(&moved, Some(&live.id))?;
                    self.store.soft_delete_placement(&live.id, moved.created_at)?;
                    self.store.insert_placement(&moved)?;
                    Ok(())
                })
            },
            |constraint| placement_conflict(constraint, &moved),
        )?;

        info!(
            from_placement_id = id,
            placement_id = %moved.id,
            classroom_id = new_classroom_id,
            "placement moved"
        );
        Ok(moved)
    }

    pub fn get_placement(&self, id: &str) -> Result<Placement, ScheduleError> {
        self.store
            .placement(id)?
            .ok_or_else(|| ScheduleError::not_found("placement", id))
    }

    pub fn list_placements(
        &self,
        academic_year_id: &str,
        filter: &PlacementFilter,
    ) -> Result<Vec<Placement>, ScheduleError> {
        Ok(self.store.list_placements(academic_year_id, filter)?)
    }

    /// Remove live placements whose assignment no longer occupies its slot.
    pub fn sweep_orphaned_placements(&self) -> Result<usize, ScheduleError> {
        let removed = self.store.atomically(|| -> Result<usize, ScheduleError> {
            let now = Utc::now();
            let mut removed = 0;
            for orphan in self.store.orphaned_placements()? {
                if self.store.soft_delete_placement(&orphan.id, now)? {
                    removed += 1;
                }
            }
            Ok(removed)
        })?;
        if removed > 0 {
            info!(removed, "orphaned placements swept");
        }
        Ok(removed)
    }

    /// The assignment exists in the institution, is active, and sits at the
    /// placement's own coordinate; the classroom belongs to the same
    /// institution.
    fn check_target(&self, institution_id: &str, candidate: &Placement) -> Result<(), ScheduleError> {
        let assignment = self.scoped_assignment(institution_id, &candidate.assignment_id)?;
        if !assignment.status.is_active() {
            return Err(ScheduleError::InactiveAssignment {
                assignment_id: assignment.id,
            });
        }
        if assignment.slot() != candidate.slot() {
            return Err(ScheduleError::SlotMismatch {
                assignment_id: assignment.id.clone(),
                expected: assignment.slot(),
                requested: candidate.slot(),
            });
        }
        self.check_classroom(institution_id, &candidate.classroom_id)
    }

    /// A live assignment whose academic year belongs to the institution.
    fn scoped_assignment(
        &self,
        institution_id: &str,
        assignment_id: &str,
    ) -> Result<Assignment, ScheduleError> {
        let assignment = self
            .store
            .assignment(assignment_id)?
            .filter(|a| !a.is_deleted())
            .ok_or_else(|| ScheduleError::not_found("assignment", assignment_id))?;
        if self
            .store
            .academic_year(institution_id, &assignment.academic_year_id)?
            .is_none()
        {
            return Err(ScheduleError::not_found("assignment", assignment_id));
        }
        Ok(assignment)
    }

    fn check_classroom(&self, institution_id: &str, classroom_id: &str) -> Result<(), ScheduleError> {
        if self.store.classroom(institution_id, classroom_id)?.is_none() {
            return Err(ScheduleError::not_found("classroom", classroom_id));
        }
        Ok(())
    }

    fn ensure_room_free(
        &self,
        candidate: &Placement,
        exclude_placement_id: Option<&str>,
    ) -> Result<(), ScheduleError> {
        if self.checker().room_has_conflict(
            &candidate.classroom_id,
            candidate.day_of_week,
            &candidate.time_slot_id,
            &candidate.academic_year_id,
            exclude_placement_id,
        )? {
            return Err(placement_conflict(UniqueConstraint::RoomSlot, candidate));
        }
        Ok(())
    }

    fn ensure_assignment_unplaced(&self, candidate: &Placement) -> Result<(), ScheduleError> {
        if self.checker().assignment_slot_has_conflict(
            &candidate.assignment_id,
            candidate.day_of_week,
            &candidate.time_slot_id,
            &candidate.academic_year_id,
            None,
        )? {
            return Err(placement_conflict(UniqueConstraint::AssignmentSlot, candidate));
        }
        Ok(())
    }
}
