//! Integration tests for the scheduling workflow.
//!
//! The same scenarios run against the in-memory store and the SQLite store,
//! through the public API only.

use chrono::{NaiveDate, NaiveTime};
use timetable_core::{
    weekly_timetable, AssignmentFilter, AssignmentLedger, CalendarRegistry, CatalogStore,
    Catalogs, DayOfWeek, DeleteOutcome, MemoryStore, NewAssignment, NewPlacement,
    PlacementEngine, RecordStatus, ScheduleError, ScheduleStore, TimetableDb, TimetableView,
};

const INST: &str = "inst-1";

struct School {
    year: String,
    slot: String,
    subjects: [String; 2],
    teachers: [String; 2],
    groups: [String; 2],
    room: String,
}

fn open_school<S: CatalogStore>(store: &S) -> School {
    let calendar = CalendarRegistry::new(store);
    let catalogs = Catalogs::new(store);
    let year = calendar
        .create_academic_year(
            INST,
            "2024",
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 15).unwrap(),
        )
        .unwrap();
    let slot = catalogs
        .create_time_slot(
            INST,
            "08:00-09:00",
            NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        )
        .unwrap();
    School {
        year: year.id,
        slot: slot.id,
        subjects: [
            catalogs.create_subject(INST, "S1").unwrap().id,
            catalogs.create_subject(INST, "S2").unwrap().id,
        ],
        teachers: [
            catalogs.create_teacher(INST, "T1").unwrap().id,
            catalogs.create_teacher(INST, "T2").unwrap().id,
        ],
        groups: [
            catalogs.create_group(INST, "main", "grade-1", "G1").unwrap().id,
            catalogs.create_group(INST, "main", "grade-1", "G2").unwrap().id,
        ],
        room: catalogs.create_classroom(INST, "R1", "standard", 30).unwrap().id,
    }
}

fn lesson(school: &School, teacher: usize, subject: usize, group: usize) -> NewAssignment {
    NewAssignment {
        teacher_id: school.teachers[teacher].clone(),
        subject_id: school.subjects[subject].clone(),
        group_id: school.groups[group].clone(),
        time_slot_id: school.slot.clone(),
        day_of_week: DayOfWeek::Mon,
        academic_year_id: school.year.clone(),
        period_id: None,
    }
}

fn room_for(school: &School, assignment_id: &str) -> NewPlacement {
    NewPlacement {
        assignment_id: assignment_id.to_string(),
        classroom_id: school.room.clone(),
        time_slot_id: school.slot.clone(),
        day_of_week: DayOfWeek::Mon,
        academic_year_id: school.year.clone(),
    }
}

fn run_week<S: CatalogStore + ScheduleStore>(store: &S) {
    let school = open_school(store);
    let ledger = AssignmentLedger::new(store);
    let engine = PlacementEngine::new(store);

    // A teacher cannot take a second group at the same coordinate.
    let a1 = ledger.create_assignment(INST, lesson(&school, 0, 0, 0)).unwrap();
    let err = ledger
        .create_assignment(INST, lesson(&school, 0, 1, 1))
        .unwrap_err();
    assert_eq!(err.code(), "TEACHER_CONFLICT");
    assert_eq!(err.http_status(), 409);

    // Nor can a group have two teachers.
    let err = ledger
        .create_assignment(INST, lesson(&school, 1, 1, 0))
        .unwrap_err();
    assert_eq!(err.code(), "GROUP_CONFLICT");

    // One room, one lesson.
    let a2 = ledger.create_assignment(INST, lesson(&school, 1, 1, 1)).unwrap();
    let placement = engine.create_placement(INST, room_for(&school, &a1.id)).unwrap();
    let err = engine
        .create_placement(INST, room_for(&school, &a2.id))
        .unwrap_err();
    assert!(matches!(err, ScheduleError::RoomConflict { .. }));
    let body = serde_json::to_value(err.to_body()).unwrap();
    assert_eq!(body["code"], "ROOM_CONFLICT");
    assert_eq!(body["coordinate"]["day_of_week"], "mon");

    let week = weekly_timetable(store, INST, &school.year, &TimetableView::Group(school.groups[0].clone()))
        .unwrap();
    assert_eq!(week.len(), 1);
    assert_eq!(week[0].classroom.as_ref().map(|c| c.id.clone()), Some(school.room.clone()));

    // Deactivation frees the coordinate and removes the placement.
    let deactivation = ledger.deactivate_assignment(&a1.id).unwrap();
    assert_eq!(deactivation.placements_removed, 1);
    assert!(!engine.get_placement(&placement.id).unwrap().is_live());
    assert_eq!(
        engine.delete_placement(&placement.id).unwrap(),
        DeleteOutcome::AlreadyRemoved
    );
    let again = ledger.create_assignment(INST, lesson(&school, 0, 0, 0)).unwrap();
    engine.create_placement(INST, room_for(&school, &again.id)).unwrap();

    let active = AssignmentFilter {
        status: Some(RecordStatus::Active),
        ..Default::default()
    };
    assert_eq!(ledger.list_assignments(&school.year, &active).unwrap().len(), 2);
}

#[test]
fn test_week_on_memory_store() {
    run_week(&MemoryStore::new());
}

#[test]
fn test_week_on_sqlite_store() {
    run_week(&TimetableDb::open_memory().unwrap());
}

#[test]
fn test_week_on_sqlite_file() {
    let dir = tempfile::tempdir().unwrap();
    let db = TimetableDb::open_at(&dir.path().join("school.db"), std::time::Duration::from_secs(1))
        .unwrap();
    run_week(&db);
}
