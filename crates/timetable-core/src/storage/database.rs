//! SQLite-backed timetable store.
//!
//! Provides persistent storage for:
//! - Academic years and their periods
//! - Time slots, teachers, subjects, groups and classrooms
//! - Assignments and placements (see `schedule_db`)
//!
//! Each [`TimetableDb`] owns one connection. Several processes or threads
//! may open the same file; writers are serialized by SQLite's reserved lock
//! and wait up to the configured busy timeout for it.

use std::path::Path;
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};

use super::{migrations, Config};
use crate::error::{CoreError, DatabaseError, StoreError, StoreResult};
use crate::model::{AcademicYear, Classroom, Group, Period, Subject, Teacher, TimeSlot};
use crate::store::{CatalogStore, ReferenceCatalog, Transactional};

const YEAR_COLUMNS: &str =
    "id, institution_id, name, start_date, end_date, status, deleted_at";
const PERIOD_COLUMNS: &str = "id, academic_year_id, name, start_date, end_date, deleted_at";
const SLOT_COLUMNS: &str = "id, institution_id, name, start_time, end_time, status";

fn row_to_year(row: &rusqlite::Row) -> Result<AcademicYear, rusqlite::Error> {
    Ok(AcademicYear {
        id: row.get(0)?,
        institution_id: row.get(1)?,
        name: row.get(2)?,
        start_date: row.get(3)?,
        end_date: row.get(4)?,
        status: row.get(5)?,
        deleted_at: row.get(6)?,
    })
}

fn row_to_period(row: &rusqlite::Row) -> Result<Period, rusqlite::Error> {
    Ok(Period {
        id: row.get(0)?,
        academic_year_id: row.get(1)?,
        name: row.get(2)?,
        start_date: row.get(3)?,
        end_date: row.get(4)?,
        deleted_at: row.get(5)?,
    })
}

fn row_to_time_slot(row: &rusqlite::Row) -> Result<TimeSlot, rusqlite::Error> {
    Ok(TimeSlot {
        id: row.get(0)?,
        institution_id: row.get(1)?,
        name: row.get(2)?,
        start_time: row.get(3)?,
        end_time: row.get(4)?,
        status: row.get(5)?,
    })
}

/// SQLite database for the calendar, the catalogs and the schedule.
pub struct TimetableDb {
    pub(super) conn: Connection,
}

impl TimetableDb {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database named by `config`, creating its directory, the
    /// file and the schema as needed.
    ///
    /// # Errors
    /// Returns an error if the path cannot be resolved, or the database
    /// cannot be opened or migrated.
    pub fn open_with_config(config: &Config) -> Result<Self, CoreError> {
        let path = config.database_path()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self::open_at(&path, config.busy_timeout())?)
    }

    /// Open (or create) the database file at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &Path, busy_timeout: Duration) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        conn.busy_timeout(busy_timeout)?;
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        debug!(path = %path.display(), journal_mode = %mode, "database opened");
        Self::prepare(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, DatabaseError> {
        Self::prepare(Connection::open_in_memory()?)
    }

    fn prepare(conn: Connection) -> Result<Self, DatabaseError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrations::migrate(&conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    fn rollback(&self) {
        if let Err(err) = self.conn.execute_batch("ROLLBACK;") {
            warn!(error = %err, "rollback failed, transaction may still be open");
        }
    }

    fn institution_row<T>(
        &self,
        table: &str,
        columns: &str,
        institution_id: &str,
        id: &str,
        map: impl FnOnce(&rusqlite::Row) -> Result<T, rusqlite::Error>,
    ) -> StoreResult<Option<T>> {
        let sql = format!("SELECT {columns} FROM {table} WHERE id = ?1 AND institution_id = ?2");
        Ok(self
            .conn
            .query_row(&sql, params![id, institution_id], map)
            .optional()?)
    }
}

impl Transactional for TimetableDb {
    /// `BEGIN IMMEDIATE` takes the write lock up front, so the checks run
    /// by `f` see every commit that precedes this one. Calls made while a
    /// transaction is already open join it.
    fn atomically<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<StoreError>,
    {
        if !self.conn.is_autocommit() {
            return f();
        }

        self.conn
            .execute_batch("BEGIN IMMEDIATE TRANSACTION;")
            .map_err(|e| E::from(StoreError::from(e)))?;
        match f() {
            Ok(value) => match self.conn.execute_batch("COMMIT;") {
                Ok(()) => Ok(value),
                Err(err) => {
                    self.rollback();
                    Err(E::from(StoreError::from(err)))
                }
            },
            Err(err) => {
                self.rollback();
                debug!("transaction rolled back");
                Err(err)
            }
        }
    }
}

impl ReferenceCatalog for TimetableDb {
    fn academic_year(&self, institution_id: &str, id: &str) -> StoreResult<Option<AcademicYear>> {
        let sql = format!(
            "SELECT {YEAR_COLUMNS} FROM academic_years
             WHERE id = ?1 AND institution_id = ?2 AND deleted_at IS NULL"
        );
        Ok(self
            .conn
            .query_row(&sql, params![id, institution_id], row_to_year)
            .optional()?)
    }

    fn list_academic_years(&self, institution_id: &str) -> StoreResult<Vec<AcademicYear>> {
        let sql = format!(
            "SELECT {YEAR_COLUMNS} FROM academic_years
             WHERE institution_id = ?1 AND deleted_at IS NULL
             ORDER BY start_date, id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![institution_id], row_to_year)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn period(&self, id: &str) -> StoreResult<Option<Period>> {
        let sql = format!("SELECT {PERIOD_COLUMNS} FROM periods WHERE id = ?1 AND deleted_at IS NULL");
        Ok(self.conn.query_row(&sql, params![id], row_to_period).optional()?)
    }

    fn periods_of_year(&self, academic_year_id: &str) -> StoreResult<Vec<Period>> {
        let sql = format!(
            "SELECT {PERIOD_COLUMNS} FROM periods
             WHERE academic_year_id = ?1 AND deleted_at IS NULL
             ORDER BY start_date, id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![academic_year_id], row_to_period)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn time_slot(&self, institution_id: &str, id: &str) -> StoreResult<Option<TimeSlot>> {
        self.institution_row("time_slots", SLOT_COLUMNS, institution_id, id, row_to_time_slot)
    }

    fn list_time_slots(&self, institution_id: &str) -> StoreResult<Vec<TimeSlot>> {
        let sql = format!(
            "SELECT {SLOT_COLUMNS} FROM time_slots
             WHERE institution_id = ?1
             ORDER BY start_time, id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![institution_id], row_to_time_slot)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn teacher(&self, institution_id: &str, id: &str) -> StoreResult<Option<Teacher>> {
        self.institution_row("teachers", "id, institution_id, name", institution_id, id, |row| {
            Ok(Teacher {
                id: row.get(0)?,
                institution_id: row.get(1)?,
                name: row.get(2)?,
            })
        })
    }

    fn subject(&self, institution_id: &str, id: &str) -> StoreResult<Option<Subject>> {
        self.institution_row("subjects", "id, institution_id, name", institution_id, id, |row| {
            Ok(Subject {
                id: row.get(0)?,
                institution_id: row.get(1)?,
                name: row.get(2)?,
            })
        })
    }

    fn group(&self, institution_id: &str, id: &str) -> StoreResult<Option<Group>> {
        self.institution_row(
            "class_groups",
            "id, institution_id, site_id, grade_level_id, name",
            institution_id,
            id,
            |row| {
                Ok(Group {
                    id: row.get(0)?,
                    institution_id: row.get(1)?,
                    site_id: row.get(2)?,
                    grade_level_id: row.get(3)?,
                    name: row.get(4)?,
                })
            },
        )
    }

    fn classroom(&self, institution_id: &str, id: &str) -> StoreResult<Option<Classroom>> {
        self.institution_row(
            "classrooms",
            "id, institution_id, name, kind, capacity",
            institution_id,
            id,
            |row| {
                Ok(Classroom {
                    id: row.get(0)?,
                    institution_id: row.get(1)?,
                    name: row.get(2)?,
                    kind: row.get(3)?,
                    capacity: row.get(4)?,
                })
            },
        )
    }
}

impl CatalogStore for TimetableDb {
    fn insert_academic_year(&self, year: &AcademicYear) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO academic_years (id, institution_id, name, start_date, end_date, status, deleted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                year.id,
                year.institution_id,
                year.name,
                year.start_date,
                year.end_date,
                year.status,
                year.deleted_at,
            ],
        )?;
        Ok(())
    }

    fn insert_period(&self, period: &Period) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO periods (id, academic_year_id, name, start_date, end_date, deleted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                period.id,
                period.academic_year_id,
                period.name,
                period.start_date,
                period.end_date,
                period.deleted_at,
            ],
        )?;
        Ok(())
    }

    fn update_period(&self, period: &Period) -> StoreResult<()> {
        self.conn.execute(
            "UPDATE periods SET name = ?2, start_date = ?3, end_date = ?4, deleted_at = ?5
             WHERE id = ?1",
            params![
                period.id,
                period.name,
                period.start_date,
                period.end_date,
                period.deleted_at,
            ],
        )?;
        Ok(())
    }

    fn insert_time_slot(&self, slot: &TimeSlot) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO time_slots (id, institution_id, name, start_time, end_time, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                slot.id,
                slot.institution_id,
                slot.name,
                slot.start_time,
                slot.end_time,
                slot.status,
            ],
        )?;
        Ok(())
    }

    fn insert_teacher(&self, teacher: &Teacher) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO teachers (id, institution_id, name) VALUES (?1, ?2, ?3)",
            params![teacher.id, teacher.institution_id, teacher.name],
        )?;
        Ok(())
    }

    fn insert_subject(&self, subject: &Subject) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO subjects (id, institution_id, name) VALUES (?1, ?2, ?3)",
            params![subject.id, subject.institution_id, subject.name],
        )?;
        Ok(())
    }

    fn insert_group(&self, group: &Group) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO class_groups (id, institution_id, site_id, grade_level_id, name)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                group.id,
                group.institution_id,
                group.site_id,
                group.grade_level_id,
                group.name,
            ],
        )?;
        Ok(())
    }

    fn insert_classroom(&self, classroom: &Classroom) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO classrooms (id, institution_id, name, kind, capacity)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                classroom.id,
                classroom.institution_id,
                classroom.name,
                classroom.kind,
                classroom.capacity,
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::CalendarRegistry;
    use crate::catalog::Catalogs;
    use crate::error::{ScheduleError, ValidationError};
    use chrono::{NaiveDate, NaiveTime};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn t(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    #[test]
    fn calendar_round_trips_through_sqlite() {
        let db = TimetableDb::open_memory().unwrap();
        let registry = CalendarRegistry::new(&db);
        let year = registry
            .create_academic_year("i1", "2024", d(2024, 2, 1), d(2024, 12, 15))
            .unwrap();
        let first = registry
            .create_period("i1", &year.id, "T1", d(2024, 2, 1), d(2024, 6, 30))
            .unwrap();
        registry
            .create_period("i1", &year.id, "T2", d(2024, 6, 30), d(2024, 12, 15))
            .unwrap();

        assert_eq!(db.academic_year("i1", &year.id).unwrap(), Some(year.clone()));
        assert!(db.academic_year("i2", &year.id).unwrap().is_none());
        assert_eq!(db.list_academic_years("i1").unwrap().len(), 1);

        let periods = db.periods_of_year(&year.id).unwrap();
        assert_eq!(periods.len(), 2);
        assert_eq!(periods[0], first);

        let err = registry
            .create_period("i1", &year.id, "T3", d(2024, 3, 1), d(2024, 4, 1))
            .unwrap_err();
        assert!(matches!(
            err,
            ScheduleError::Validation(ValidationError::PeriodOverlap { .. })
        ));

        registry.delete_period("i1", &first.id).unwrap();
        assert!(db.period(&first.id).unwrap().is_none());
        assert_eq!(db.periods_of_year(&year.id).unwrap().len(), 1);
    }

    #[test]
    fn duplicate_time_slot_range_hits_the_unique_index() {
        let db = TimetableDb::open_memory().unwrap();
        let catalogs = Catalogs::new(&db);
        catalogs.create_time_slot("i1", "first", t(8), t(9)).unwrap();
        catalogs.create_time_slot("i1", "second", t(9), t(10)).unwrap();
        let err = catalogs.create_time_slot("i1", "again", t(8), t(9)).unwrap_err();
        assert!(matches!(
            err,
            ScheduleError::Validation(ValidationError::DuplicateTimeSlot { .. })
        ));

        let slots = db.list_time_slots("i1").unwrap();
        let names: Vec<_> = slots.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn catalog_entities_are_scoped_by_institution() {
        let db = TimetableDb::open_memory().unwrap();
        let catalogs = Catalogs::new(&db);
        let teacher = catalogs.create_teacher("i1", "Ada").unwrap();
        let subject = catalogs.create_subject("i1", "Maths").unwrap();
        let group = catalogs.create_group("i1", "north", "grade-7", "7A").unwrap();
        let room = catalogs.create_classroom("i1", "Lab 1", "lab", 24).unwrap();

        assert_eq!(db.teacher("i1", &teacher.id).unwrap(), Some(teacher.clone()));
        assert_eq!(db.subject("i1", &subject.id).unwrap(), Some(subject));
        assert_eq!(db.group("i1", &group.id).unwrap(), Some(group));
        assert_eq!(db.classroom("i1", &room.id).unwrap(), Some(room.clone()));
        assert!(db.teacher("i2", &teacher.id).unwrap().is_none());
        assert!(db.classroom("i2", &room.id).unwrap().is_none());
    }

    #[test]
    fn file_database_reopens_with_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timetable.db");
        let year_id = {
            let db = TimetableDb::open_at(&path, Duration::from_millis(100)).unwrap();
            CalendarRegistry::new(&db)
                .create_academic_year("i1", "2024", d(2024, 2, 1), d(2024, 12, 15))
                .unwrap()
                .id
        };
        let db = TimetableDb::open_at(&path, Duration::from_millis(100)).unwrap();
        assert!(db.academic_year("i1", &year_id).unwrap().is_some());
    }

    #[test]
    fn open_with_config_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("timetable.db");
        let mut config = Config::default();
        config.database.path = Some(path.to_string_lossy().into_owned());
        TimetableDb::open_with_config(&config).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn failed_rollback_still_reports_the_original_error() {
        let db = TimetableDb::open_memory().unwrap();
        let result: Result<(), ScheduleError> = db.atomically(|| {
            db.conn().execute_batch("ROLLBACK;").map_err(StoreError::from)?;
            Err(ScheduleError::not_found("teacher", "ghost"))
        });
        assert!(matches!(result, Err(ScheduleError::NotFound { .. })));
        assert!(db.conn().is_autocommit());
    }
}
