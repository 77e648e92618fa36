//! Weekly timetable views assembled from active assignments and their
//! live placements.

use serde::{Deserialize, Serialize};

use crate::error::ScheduleError;
use crate::model::{
    Assignment, AssignmentFilter, Classroom, DayOfWeek, Group, PlacementFilter, RecordStatus,
    Subject, Teacher, TimeSlot,
};
use crate::store::{ReferenceCatalog, ScheduleStore};

/// Whose week to show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum TimetableView {
    Teacher(String),
    Group(String),
    Classroom(String),
}

/// One lesson in a weekly timetable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimetableEntry {
    pub day_of_week: DayOfWeek,
    pub time_slot: TimeSlot,
    pub assignment_id: String,
    pub subject: Subject,
    pub teacher: Teacher,
    pub group: Group,
    /// `None` while the assignment has no live placement.
    pub classroom: Option<Classroom>,
}

/// Entries for `view` in the academic year, ordered by day then slot start.
pub fn weekly_timetable<S: ScheduleStore + ReferenceCatalog>(
    store: &S,
    institution_id: &str,
    academic_year_id: &str,
    view: &TimetableView,
) -> Result<Vec<TimetableEntry>, ScheduleError> {
    if store.academic_year(institution_id, academic_year_id)?.is_none() {
        return Err(ScheduleError::not_found("academic year", academic_year_id));
    }

    let active = |teacher_id: Option<&str>, group_id: Option<&str>| AssignmentFilter {
        teacher_id: teacher_id.map(str::to_string),
        group_id: group_id.map(str::to_string),
        status: Some(RecordStatus::Active),
    };

    let assignments: Vec<Assignment> = match view {
        TimetableView::Teacher(id) => {
            require(store.teacher(institution_id, id)?, "teacher", id)?;
            store.list_assignments(academic_year_id, &active(Some(id), None))?
        }
        TimetableView::Group(id) => {
            require(store.group(institution_id, id)?, "group", id)?;
            store.list_assignments(academic_year_id, &active(None, Some(id)))?
        }
        TimetableView::Classroom(id) => {
            require(store.classroom(institution_id, id)?, "classroom", id)?;
            let filter = PlacementFilter {
                classroom_id: Some(id.clone()),
                assignment_id: None,
            };
            let mut placed = Vec::new();
            for placement in store.list_placements(academic_year_id, &filter)? {
                if let Some(a) = store.assignment(&placement.assignment_id)? {
                    if a.occupies() {
                        placed.push(a);
                    }
                }
            }
            placed
        }
    };

    let mut entries = assignments
        .into_iter()
        .map(|a| entry_for(store, institution_id, a))
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort_by(|a, b| {
        a.day_of_week
            .cmp(&b.day_of_week)
            .then(a.time_slot.start_time.cmp(&b.time_slot.start_time))
            .then(a.assignment_id.cmp(&b.assignment_id))
    });
    Ok(entries)
}

fn require<T>(row: Option<T>, entity: &'static str, id: &str) -> Result<T, ScheduleError> {
    row.ok_or_else(|| ScheduleError::not_found(entity, id))
}

fn entry_for<S: ScheduleStore + ReferenceCatalog>(
    store: &S,
    institution_id: &str,
    assignment: Assignment,
) -> Result<TimetableEntry, ScheduleError> {
    let filter = PlacementFilter {
        classroom_id: None,
        assignment_id: Some(assignment.id.clone()),
    };
    let classroom = match store
        .list_placements(&assignment.academic_year_id, &filter)?
        .into_iter()
        .find(|p| p.slot() == assignment.slot())
    {
        Some(p) => Some(require(
            store.classroom(institution_id, &p.classroom_id)?,
            "classroom",
            &p.classroom_id,
        )?),
        None => None,
    };

    Ok(TimetableEntry {
        day_of_week: assignment.day_of_week,
        time_slot: require(
            store.time_slot(institution_id, &assignment.time_slot_id)?,
            "time slot",
            &assignment.time_slot_id,
        )?,
        subject: require(
            store.subject(institution_id, &assignment.subject_id)?,
            "subject",
            &assignment.subject_id,
        )?,
        teacher: require(
            store.teacher(institution_id, &assignment.teacher_id)?,
            "teacher",
            &assignment.teacher_id,
        )?,
        group: require(
            store.group(institution_id, &assignment.group_id)?,
            "group",
            &assignment.group_id,
        )?,
        assignment_id: assignment.id,
        classroom,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::CalendarRegistry;
    use crate::catalog::Catalogs;
    use crate::ledger::AssignmentLedger;
    use crate::model::{NewAssignment, NewPlacement};
    use crate::placement::PlacementEngine;
    use crate::store::MemoryStore;
    use chrono::{NaiveDate, NaiveTime};

    const INST: &str = "inst-1";

    #[test]
    fn teacher_week_is_ordered_and_shows_rooms() {
        let store = MemoryStore::new();
        let catalogs = Catalogs::new(&store);
        let year = CalendarRegistry::new(&store)
            .create_academic_year(
                INST,
                "2024",
                NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 12, 15).unwrap(),
            )
            .unwrap();
        let early = catalogs
            .create_time_slot(
                INST,
                "first",
                NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            )
            .unwrap();
        let late = catalogs
            .create_time_slot(
                INST,
                "second",
                NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            )
            .unwrap();
        let teacher = catalogs.create_teacher(INST, "Ada").unwrap();
        let other = catalogs.create_teacher(INST, "Grace").unwrap();
        let subject = catalogs.create_subject(INST, "Maths").unwrap();
        let group = catalogs.create_group(INST, "main", "grade-7", "7A").unwrap();
        let room = catalogs.create_classroom(INST, "R1", "standard", 30).unwrap();

        let ledger = AssignmentLedger::new(&store);
        let make = |teacher_id: &str, slot_id: &str, day: DayOfWeek| {
            ledger
                .create_assignment(
                    INST,
                    NewAssignment {
                        teacher_id: teacher_id.into(),
                        subject_id: subject.id.clone(),
                        group_id: group.id.clone(),
                        time_slot_id: slot_id.into(),
                        day_of_week: day,
                        academic_year_id: year.id.clone(),
                        period_id: None,
                    },
                )
                .unwrap()
        };
        let tue_late = make(&teacher.id, &late.id, DayOfWeek::Tue);
        let mon_late = make(&teacher.id, &late.id, DayOfWeek::Mon);
        let mon_early = make(&teacher.id, &early.id, DayOfWeek::Mon);
        let others = make(&other.id, &early.id, DayOfWeek::Wed);

        PlacementEngine::new(&store)
            .create_placement(
                INST,
                NewPlacement {
                    assignment_id: mon_late.id.clone(),
                    classroom_id: room.id.clone(),
                    time_slot_id: late.id.clone(),
                    day_of_week: DayOfWeek::Mon,
                    academic_year_id: year.id.clone(),
                },
            )
            .unwrap();
        ledger.deactivate_assignment(&tue_late.id).unwrap();

        let week = weekly_timetable(&store, INST, &year.id, &TimetableView::Teacher(teacher.id.clone()))
            .unwrap();
        let ids: Vec<_> = week.iter().map(|e| e.assignment_id.clone()).collect();
        assert_eq!(ids, vec![mon_early.id.clone(), mon_late.id.clone()]);
        assert!(week[0].classroom.is_none());
        assert_eq!(week[1].classroom.as_ref().map(|c| c.name.as_str()), Some("R1"));
        assert_eq!(week[1].time_slot.start_time, late.start_time);

        let by_room = weekly_timetable(&store, INST, &year.id, &TimetableView::Classroom(room.id.clone()))
            .unwrap();
        assert_eq!(by_room.len(), 1);
        assert_eq!(by_room[0].assignment_id, mon_late.id);

        let by_group = weekly_timetable(&store, INST, &year.id, &TimetableView::Group(group.id.clone()))
            .unwrap();
        assert_eq!(by_group.len(), 3);
        assert_eq!(by_group[2].assignment_id, others.id);
    }

    #[test]
    fn unknown_year_or_subject_of_view_is_not_found() {
        let store = MemoryStore::new();
        let err = weekly_timetable(&store, INST, "ghost", &TimetableView::Teacher("t".into()))
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");

        let year = CalendarRegistry::new(&store)
            .create_academic_year(
                INST,
                "2024",
                NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 12, 15).unwrap(),
            )
            .unwrap();
        let err = weekly_timetable(&store, INST, &year.id, &TimetableView::Group("ghost".into()))
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }
}
