//! Assignment and placement persistence on SQLite.
//!
//! The exclusivity keys live in the partial unique indexes created by
//! migration v2; a colliding INSERT or UPDATE surfaces as
//! [`crate::error::StoreError::UniqueViolation`].

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use super::TimetableDb;
use crate::error::StoreResult;
use crate::model::{Assignment, AssignmentFilter, Placement, PlacementFilter, SlotCoordinate};
use crate::store::ScheduleStore;

const ASSIGNMENT_COLUMNS: &str = "id, teacher_id, subject_id, group_id, time_slot_id, day_of_week,
     academic_year_id, period_id, status, created_at, updated_at, deleted_at";
const PLACEMENT_COLUMNS: &str = "id, assignment_id, classroom_id, time_slot_id, day_of_week,
     academic_year_id, created_at, deleted_at";

fn row_to_assignment(row: &rusqlite::Row) -> Result<Assignment, rusqlite::Error> {
    Ok(Assignment {
        id: row.get(0)?,
        teacher_id: row.get(1)?,
        subject_id: row.get(2)?,
        group_id: row.get(3)?,
        time_slot_id: row.get(4)?,
        day_of_week: row.get(5)?,
        academic_year_id: row.get(6)?,
        period_id: row.get(7)?,
        status: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
        deleted_at: row.get(11)?,
    })
}

fn row_to_placement(row: &rusqlite::Row) -> Result<Placement, rusqlite::Error> {
    Ok(Placement {
        id: row.get(0)?,
        assignment_id: row.get(1)?,
        classroom_id: row.get(2)?,
        time_slot_id: row.get(3)?,
        day_of_week: row.get(4)?,
        academic_year_id: row.get(5)?,
        created_at: row.get(6)?,
        deleted_at: row.get(7)?,
    })
}

impl TimetableDb {
    fn query_assignments(
        &self,
        filter_sql: &str,
        params: impl rusqlite::Params,
    ) -> StoreResult<Vec<Assignment>> {
        let sql = format!("SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE {filter_sql}");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params, row_to_assignment)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn query_placements(
        &self,
        filter_sql: &str,
        params: impl rusqlite::Params,
    ) -> StoreResult<Vec<Placement>> {
        let sql = format!("SELECT {PLACEMENT_COLUMNS} FROM placements WHERE {filter_sql}");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params, row_to_placement)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

impl ScheduleStore for TimetableDb {
    fn find_active_by_teacher_slot(
        &self,
        teacher_id: &str,
        slot: &SlotCoordinate,
    ) -> StoreResult<Vec<Assignment>> {
        self.query_assignments(
            "teacher_id = ?1 AND day_of_week = ?2 AND time_slot_id = ?3 AND academic_year_id = ?4
             AND status = 'active' AND deleted_at IS NULL",
            params![teacher_id, slot.day_of_week, slot.time_slot_id, slot.academic_year_id],
        )
    }

    fn find_active_by_group_slot(
        &self,
        group_id: &str,
        slot: &SlotCoordinate,
    ) -> StoreResult<Vec<Assignment>> {
        self.query_assignments(
            "group_id = ?1 AND day_of_week = ?2 AND time_slot_id = ?3 AND academic_year_id = ?4
             AND status = 'active' AND deleted_at IS NULL",
            params![group_id, slot.day_of_week, slot.time_slot_id, slot.academic_year_id],
        )
    }

    fn find_live_by_room_slot(
        &self,
        classroom_id: &str,
        slot: &SlotCoordinate,
    ) -> StoreResult<Vec<Placement>> {
        self.query_placements(
            "classroom_id = ?1 AND day_of_week = ?2 AND time_slot_id = ?3 AND academic_year_id = ?4
             AND deleted_at IS NULL",
            params![classroom_id, slot.day_of_week, slot.time_slot_id, slot.academic_year_id],
        )
    }

    fn find_live_by_assignment_slot(
        &self,
        assignment_id: &str,
        slot: &SlotCoordinate,
    ) -> StoreResult<Vec<Placement>> {
        self.query_placements(
            "assignment_id = ?1 AND day_of_week = ?2 AND time_slot_id = ?3 AND academic_year_id = ?4
             AND deleted_at IS NULL",
            params![assignment_id, slot.day_of_week, slot.time_slot_id, slot.academic_year_id],
        )
    }

    fn assignment(&self, id: &str) -> StoreResult<Option<Assignment>> {
        let sql = format!("SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE id = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![id], row_to_assignment)
            .optional()?)
    }

    fn list_assignments(
        &self,
        academic_year_id: &str,
        filter: &AssignmentFilter,
    ) -> StoreResult<Vec<Assignment>> {
        self.query_assignments(
            "academic_year_id = ?1 AND deleted_at IS NULL
             AND (?2 IS NULL OR teacher_id = ?2)
             AND (?3 IS NULL OR group_id = ?3)
             AND (?4 IS NULL OR status = ?4)
             ORDER BY created_at, id",
            params![academic_year_id, filter.teacher_id, filter.group_id, filter.status],
        )
    }

    fn insert_assignment(&self, a: &Assignment) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO assignments (id, teacher_id, subject_id, group_id, time_slot_id, day_of_week,
                 academic_year_id, period_id, status, created_at, updated_at, deleted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                a.id,
                a.teacher_id,
                a.subject_id,
                a.group_id,
                a.time_slot_id,
                a.day_of_week,
                a.academic_year_id,
                a.period_id,
                a.status,
                a.created_at,
                a.updated_at,
                a.deleted_at,
            ],
        )?;
        Ok(())
    }

    fn update_assignment(&self, a: &Assignment) -> StoreResult<()> {
        self.conn.execute(
            "UPDATE assignments SET teacher_id = ?2, subject_id = ?3, group_id = ?4,
                 time_slot_id = ?5, day_of_week = ?6, academic_year_id = ?7, period_id = ?8,
                 status = ?9, updated_at = ?10, deleted_at = ?11
             WHERE id = ?1",
            params![
                a.id,
                a.teacher_id,
                a.subject_id,
                a.group_id,
                a.time_slot_id,
                a.day_of_week,
                a.academic_year_id,
                a.period_id,
                a.status,
                a.updated_at,
                a.deleted_at,
            ],
        )?;
        Ok(())
    }

    fn placement(&self, id: &str) -> StoreResult<Option<Placement>> {
        let sql = format!("SELECT {PLACEMENT_COLUMNS} FROM placements WHERE id = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![id], row_to_placement)
            .optional()?)
    }

    fn list_placements(
        &self,
        academic_year_id: &str,
        filter: &PlacementFilter,
    ) -> StoreResult<Vec<Placement>> {
        self.query_placements(
            "academic_year_id = ?1 AND deleted_at IS NULL
             AND (?2 IS NULL OR classroom_id = ?2)
             AND (?3 IS NULL OR assignment_id = ?3)
             ORDER BY created_at, id",
            params![academic_year_id, filter.classroom_id, filter.assignment_id],
        )
    }

    fn insert_placement(&self, p: &Placement) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO placements (id, assignment_id, classroom_id, time_slot_id, day_of_week,
                 academic_year_id, created_at, deleted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                p.id,
                p.assignment_id,
                p.classroom_id,
                p.time_slot_id,
                p.day_of_week,
                p.academic_year_id,
                p.created_at,
                p.deleted_at,
            ],
        )?;
        Ok(())
    }

    fn soft_delete_placement(&self, id: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        let changed = self.conn.execute(
            "UPDATE placements SET deleted_at = ?2 WHERE id = ?1 AND deleted_at IS NULL",
            params![id, at],
        )?;
        Ok(changed > 0)
    }

    fn soft_delete_placements_of_assignment(
        &self,
        assignment_id: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<usize> {
        Ok(self.conn.execute(
            "UPDATE placements SET deleted_at = ?2 WHERE assignment_id = ?1 AND deleted_at IS NULL",
            params![assignment_id, at],
        )?)
    }

    fn orphaned_placements(&self) -> StoreResult<Vec<Placement>> {
        self.query_placements(
            "deleted_at IS NULL AND NOT EXISTS (
                 SELECT 1 FROM assignments a
                 WHERE a.id = placements.assignment_id
                   AND a.status = 'active' AND a.deleted_at IS NULL)
             ORDER BY created_at, id",
            [],
        )
    }
}
