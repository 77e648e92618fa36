//! Database schema migrations for the timetable store.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};
use tracing::{info, warn};

/// Current schema version.
///
/// Increment this when adding new migrations.
pub const SCHEMA_VERSION: i32 = 2;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }

    if current_version < SCHEMA_VERSION {
        info!(from = current_version, to = SCHEMA_VERSION, "schema migrated");
    }
    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Current schema version, 0 for a fresh database.
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            warn!(error = %e, "failed to read schema_version");
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: calendar, catalogs, assignments and placements.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS academic_years (
            id             TEXT PRIMARY KEY,
            institution_id TEXT NOT NULL,
            name           TEXT NOT NULL,
            start_date     TEXT NOT NULL,
            end_date       TEXT NOT NULL,
            status         TEXT NOT NULL DEFAULT 'active',
            deleted_at     TEXT
        );

        CREATE TABLE IF NOT EXISTS periods (
            id               TEXT PRIMARY KEY,
            academic_year_id TEXT NOT NULL REFERENCES academic_years(id),
            name             TEXT NOT NULL,
            start_date       TEXT NOT NULL,
            end_date         TEXT NOT NULL,
            deleted_at       TEXT
        );

        CREATE TABLE IF NOT EXISTS time_slots (
            id             TEXT PRIMARY KEY,
            institution_id TEXT NOT NULL,
            name           TEXT NOT NULL,
            start_time     TEXT NOT NULL,
            end_time       TEXT NOT NULL,
            status         TEXT NOT NULL DEFAULT 'active'
        );

        CREATE TABLE IF NOT EXISTS teachers (
            id             TEXT PRIMARY KEY,
            institution_id TEXT NOT NULL,
            name           TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS subjects (
            id             TEXT PRIMARY KEY,
            institution_id TEXT NOT NULL,
            name           TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS class_groups (
            id             TEXT PRIMARY KEY,
            institution_id TEXT NOT NULL,
            site_id        TEXT NOT NULL,
            grade_level_id TEXT NOT NULL,
            name           TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS classrooms (
            id             TEXT PRIMARY KEY,
            institution_id TEXT NOT NULL,
            name           TEXT NOT NULL,
            kind           TEXT NOT NULL,
            capacity       INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS assignments (
            id               TEXT PRIMARY KEY,
            teacher_id       TEXT NOT NULL REFERENCES teachers(id),
            subject_id       TEXT NOT NULL REFERENCES subjects(id),
            group_id         TEXT NOT NULL REFERENCES class_groups(id),
            time_slot_id     TEXT NOT NULL REFERENCES time_slots(id),
            day_of_week      TEXT NOT NULL,
            academic_year_id TEXT NOT NULL REFERENCES academic_years(id),
            period_id        TEXT REFERENCES periods(id),
            status           TEXT NOT NULL DEFAULT 'active',
            created_at       TEXT NOT NULL,
            updated_at       TEXT NOT NULL,
            deleted_at       TEXT
        );

        CREATE TABLE IF NOT EXISTS placements (
            id               TEXT PRIMARY KEY,
            assignment_id    TEXT NOT NULL REFERENCES assignments(id),
            classroom_id     TEXT NOT NULL REFERENCES classrooms(id),
            time_slot_id     TEXT NOT NULL REFERENCES time_slots(id),
            day_of_week      TEXT NOT NULL,
            academic_year_id TEXT NOT NULL REFERENCES academic_years(id),
            created_at       TEXT NOT NULL,
            deleted_at       TEXT
        );",
    )?;

    set_schema_version(&tx, 1)?;
    tx.commit()?;
    Ok(())
}

/// Migration v2: exclusivity keys as partial unique indexes, plus the
/// lookup indexes used by the conflict checks and listings.
///
/// Only active, non-deleted assignments and non-deleted placements hold a
/// key, so deactivated rows never block a coordinate.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE UNIQUE INDEX IF NOT EXISTS ux_assignments_teacher_slot
            ON assignments(academic_year_id, teacher_id, day_of_week, time_slot_id)
            WHERE status = 'active' AND deleted_at IS NULL;

        CREATE UNIQUE INDEX IF NOT EXISTS ux_assignments_group_slot
            ON assignments(academic_year_id, group_id, day_of_week, time_slot_id)
            WHERE status = 'active' AND deleted_at IS NULL;

        CREATE UNIQUE INDEX IF NOT EXISTS ux_placements_room_slot
            ON placements(academic_year_id, classroom_id, day_of_week, time_slot_id)
            WHERE deleted_at IS NULL;

        CREATE UNIQUE INDEX IF NOT EXISTS ux_placements_assignment_slot
            ON placements(academic_year_id, assignment_id, day_of_week, time_slot_id)
            WHERE deleted_at IS NULL;

        CREATE UNIQUE INDEX IF NOT EXISTS ux_time_slots_range
            ON time_slots(institution_id, start_time, end_time);

        CREATE INDEX IF NOT EXISTS idx_assignments_year ON assignments(academic_year_id);
        CREATE INDEX IF NOT EXISTS idx_placements_year ON placements(academic_year_id);
        CREATE INDEX IF NOT EXISTS idx_placements_assignment ON placements(assignment_id);
        CREATE INDEX IF NOT EXISTS idx_periods_year ON periods(academic_year_id);",
    )?;

    set_schema_version(&tx, 2)?;
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'index' AND name LIKE 'ux_%'")
            .unwrap();
        let mut names: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        names.sort();
        names
    }

    #[test]
    fn fresh_database_reaches_current_version() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);
        assert_eq!(
            index_names(&conn),
            vec![
                "ux_assignments_group_slot",
                "ux_assignments_teacher_slot",
                "ux_placements_assignment_slot",
                "ux_placements_room_slot",
                "ux_time_slots_range",
            ]
        );
    }

    #[test]
    fn migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);
    }

    #[test]
    fn v1_database_is_upgraded() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema_version_table(&conn).unwrap();
        migrate_v1(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), 1);
        assert!(index_names(&conn).is_empty());

        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), 2);
        assert_eq!(index_names(&conn).len(), 5);
    }
}
