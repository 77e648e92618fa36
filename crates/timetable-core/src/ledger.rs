//! Assignment ledger.
//!
//! Creates, updates, deactivates and deletes pedagogical assignments while
//! keeping teacher and group exclusivity per (year, day, slot) and the
//! period-to-year scope rule. Each write runs its checks and the write in a
//! single store transaction; the store's unique constraints catch anything
//! a concurrent writer slipped in, and the attempt is retried once.
//!
//! There is no priority between competing assignments: whoever commits
//! second is rejected.

use std::cell::Cell;

use chrono::Utc;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::conflict::{assignment_conflict, with_commit_retry, ConflictChecker};
use crate::error::ScheduleError;
use crate::model::{
    Assignment, AssignmentFilter, AssignmentPatch, DeleteOutcome, NewAssignment, RecordStatus,
};
use crate::store::{ReferenceCatalog, ScheduleStore};

/// Outcome of a deactivation.
#[derive(Debug, Clone, Serialize)]
pub struct Deactivation {
    pub assignment: Assignment,
    /// Placements soft-deleted along with the assignment.
    pub placements_removed: usize,
}

pub struct AssignmentLedger<'a, S> {
    store: &'a S,
}

impl<'a, S: ScheduleStore + ReferenceCatalog> AssignmentLedger<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    fn checker(&self) -> ConflictChecker<'a, S> {
        ConflictChecker::new(self.store)
    }

    pub fn create_assignment(
        &self,
        institution_id: &str,
        input: NewAssignment,
    ) -> Result<Assignment, ScheduleError> {
        let candidate = Assignment::from_new(Uuid::new_v4().to_string(), input, Utc::now());
        self.check_references(institution_id, &candidate)?;

        with_commit_retry(
            "create_assignment",
            || {
                self.store.atomically(|| -> Result<(), ScheduleError> {
                    self.checker().ensure_assignment_free(&candidate, None)?;
                    self.store.insert_assignment(&candidate)?;
                    Ok(())
                })
            },
            |constraint| assignment_conflict(constraint, &candidate),
        )?;

        info!(
            assignment_id = %candidate.id,
            teacher_id = %candidate.teacher_id,
            group_id = %candidate.group_id,
            slot = %candidate.slot(),
            "assignment created"
        );
        Ok(candidate)
    }

    /// Apply a partial update. The merged row is validated as a whole,
    /// excluding itself from the conflict scan. A merged row that is
    /// inactive holds no slot and skips the exclusivity checks.
    ///
    /// Moving an assignment to another (day, slot, year) or deactivating it
    /// removes its placements, which were bound to the old coordinate.
    pub fn update_assignment(
        &self,
        institution_id: &str,
        id: &str,
        patch: AssignmentPatch,
    ) -> Result<Assignment, ScheduleError> {
        // The patch applies to the row as read inside the transaction.
        let last_merged = Cell::new(None);
        let (merged, removed) = with_commit_retry(
            "update_assignment",
            || {
                self.store.atomically(|| -> Result<(Assignment, usize), ScheduleError> {
                    let current = self.live_assignment(id)?;
                    let merged = current.merged(&patch, Utc::now());
                    self.check_references(institution_id, &merged)?;
                    last_merged.set(Some(merged.clone()));
                    if merged.occupies() {
                        self.checker().ensure_assignment_free(&merged, Some(id))?;
                    }
                    self.store.update_assignment(&merged)?;
                    let displaced = current.slot() != merged.slot() || !merged.occupies();
                    let removed = if displaced {
                        self.store
                            .soft_delete_placements_of_assignment(id, merged.updated_at)?
                    } else {
                        0
                    };
                    Ok((merged, removed))
                })
            },
            |constraint| match last_merged.take() {
                Some(merged) => assignment_conflict(constraint, &merged),
                None => ScheduleError::ConcurrencyConflict { constraint },
            },
        )?;

        info!(
            assignment_id = id,
            status = %merged.status,
            slot = %merged.slot(),
            placements_removed = removed,
            "assignment updated"
        );
        Ok(merged)
    }

    /// Mark the assignment inactive and remove its placements. Calling this
    /// on an inactive assignment changes nothing.
    pub fn deactivate_assignment(&self, id: &str) -> Result<Deactivation, ScheduleError> {
        let deactivation = self.store.atomically(|| -> Result<_, ScheduleError> {
            let mut assignment = self.live_assignment(id)?;
            if !assignment.status.is_active() {
                return Ok(Deactivation {
                    assignment,
                    placements_removed: 0,
                });
            }
            let now = Utc::now();
            assignment.status = RecordStatus::Inactive;
            assignment.updated_at = now;
            self.store.update_assignment(&assignment)?;
            let placements_removed = self.store.soft_delete_placements_of_assignment(id, now)?;
            Ok(Deactivation {
                assignment,
                placements_removed,
            })
        })?;

        info!(
            assignment_id = id,
            placements_removed = deactivation.placements_removed,
            "assignment deactivated"
        );
        Ok(deactivation)
    }

    /// Bring an inactive assignment back, validated as if it were created
    /// anew: references are re-resolved and any occupant that appeared
    /// meanwhile wins.
    pub fn reactivate_assignment(
        &self,
        institution_id: &str,
        id: &str,
    ) -> Result<Assignment, ScheduleError> {
        let existing = self.live_assignment(id)?;
        if existing.status.is_active() {
            return Ok(existing);
        }
        self.update_assignment(
            institution_id,
            id,
            AssignmentPatch {
                status: Some(RecordStatus::Active),
                ..Default::default()
            },
        )
    }

    /// Soft-delete the assignment and its placements.
    pub fn delete_assignment(&self, id: &str) -> Result<DeleteOutcome, ScheduleError> {
        let outcome = self.store.atomically(|| -> Result<_, ScheduleError> {
            let mut assignment = self
                .store
                .assignment(id)?
                .ok_or_else(|| ScheduleError::not_found("assignment", id))?;
            if assignment.is_deleted() {
                return Ok(DeleteOutcome::AlreadyRemoved);
            }
            let now = Utc::now();
            assignment.deleted_at = Some(now);
            assignment.updated_at = now;
            self.store.update_assignment(&assignment)?;
            self.store.soft_delete_placements_of_assignment(id, now)?;
            Ok(DeleteOutcome::Removed)
        })?;
        info!(assignment_id = id, ?outcome, "assignment deleted");
        Ok(outcome)
    }

    pub fn get_assignment(&self, id: &str) -> Result<Assignment, ScheduleError> {
        self.live_assignment(id)
    }

    pub fn list_assignments(
        &self,
        academic_year_id: &str,
        filter: &AssignmentFilter,
    ) -> Result<Vec<Assignment>, ScheduleError> {
        Ok(self.store.list_assignments(academic_year_id, filter)?)
    }

    /// Dry run of the exclusivity checks for a prospective assignment.
    pub fn check_assignment(
        &self,
        institution_id: &str,
        input: NewAssignment,
    ) -> Result<Vec<ScheduleError>, ScheduleError> {
        let candidate = Assignment::from_new(String::new(), input, Utc::now());
        self.check_references(institution_id, &candidate)?;
        Ok(self.checker().conflicts_for(&candidate, None)?)
    }

    fn live_assignment(&self, id: &str) -> Result<Assignment, ScheduleError> {
        self.store
            .assignment(id)?
            .filter(|a| !a.is_deleted())
            .ok_or_else(|| ScheduleError::not_found("assignment", id))
    }

    /// Referenced ids must exist inside the institution, and a period must
    /// belong to the assignment's year.
    fn check_references(&self, institution_id: &str, a: &Assignment) -> Result<(), ScheduleError> {
        if self.store.teacher(institution_id, &a.teacher_id)?.is_none() {
            return Err(ScheduleError::not_found("teacher", &a.teacher_id));
        }
        if self.store.subject(institution_id, &a.subject_id)?.is_none() {
            return Err(ScheduleError::not_found("subject", &a.subject_id));
        }
        if self.store.group(institution_id, &a.group_id)?.is_none() {
            return Err(ScheduleError::not_found("group", &a.group_id));
        }
        if self.store.time_slot(institution_id, &a.time_slot_id)?.is_none() {
            return Err(ScheduleError::not_found("time slot", &a.time_slot_id));
        }
        if self
            .store
            .academic_year(institution_id, &a.academic_year_id)?
            .is_none()
        {
            return Err(ScheduleError::not_found("academic year", &a.academic_year_id));
        }
        if let Some(ref period_id) = a.period_id {
            let period = self
                .store
                .period(period_id)?
                .ok_or_else(|| ScheduleError::not_found("period", period_id))?;
            if period.academic_year_id != a.academic_year_id {
                return Err(ScheduleError::PeriodScope {
                    period_id: period_id.clone(),
                    academic_year_id: a.academic_year_id.clone(),
                });
            }
        }
        Ok(())
    }
}
