//! Calendar registry: academic years and their periods.
//!
//! A period lies inside its year (bounds inclusive) and never overlaps a
//! sibling period. Overlap uses half-open ranges, so a period may start on
//! the day its predecessor ends.

use chrono::{NaiveDate, Utc};
use tracing::info;
use uuid::Uuid;

use crate::error::{ScheduleError, ValidationError};
use crate::model::{AcademicYear, Period, RecordStatus};
use crate::store::CatalogStore;

/// `start < end`, otherwise [`ValidationError::InvalidDateRange`].
pub fn validate_date_range(start: NaiveDate, end: NaiveDate) -> Result<(), ValidationError> {
    if start < end {
        Ok(())
    } else {
        Err(ValidationError::InvalidDateRange { start, end })
    }
}

/// The period's range must be well formed and lie inside the year.
pub fn validate_period_range(
    year: &AcademicYear,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<(), ValidationError> {
    validate_date_range(start, end)?;
    if !year.contains(start) || !year.contains(end) {
        return Err(ValidationError::PeriodOutsideYear {
            academic_year_id: year.id.clone(),
            start,
            end,
            year_start: year.start_date,
            year_end: year.end_date,
        });
    }
    Ok(())
}

/// First live sibling overlapping `[start, end)`, ignoring `exclude_id`.
pub fn overlapping_period<'a>(
    siblings: &'a [Period],
    start: NaiveDate,
    end: NaiveDate,
    exclude_id: Option<&str>,
) -> Option<&'a Period> {
    siblings
        .iter()
        .filter(|p| p.is_live())
        .filter(|p| Some(p.id.as_str()) != exclude_id)
        .find(|p| p.overlaps(start, end))
}

fn require_name(field: &str, name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            message: "must not be empty".to_string(),
        });
    }
    Ok(())
}

/// Writes to the calendar, validated.
pub struct CalendarRegistry<'a, S> {
    store: &'a S,
}

impl<'a, S: CatalogStore> CalendarRegistry<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn create_academic_year(
        &self,
        institution_id: &str,
        name: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<AcademicYear, ScheduleError> {
        require_name("name", name)?;
        validate_date_range(start_date, end_date)?;

        let year = AcademicYear {
            id: Uuid::new_v4().to_string(),
            institution_id: institution_id.to_string(),
            name: name.trim().to_string(),
            start_date,
            end_date,
            status: RecordStatus::Active,
            deleted_at: None,
        };
        self.store.insert_academic_year(&year)?;
        info!(year_id = %year.id, institution_id, "academic year created");
        Ok(year)
    }

    pub fn create_period(
        &self,
        institution_id: &str,
        academic_year_id: &str,
        name: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Period, ScheduleError> {
        require_name("name", name)?;

        let period = self.store.atomically(|| -> Result<Period, ScheduleError> {
            let year = self.year(institution_id, academic_year_id)?;
            validate_period_range(&year, start_date, end_date)?;
            self.ensure_no_overlap(&year.id, start_date, end_date, None)?;

            let period = Period {
                id: Uuid::new_v4().to_string(),
                academic_year_id: year.id,
                name: name.trim().to_string(),
                start_date,
                end_date,
                deleted_at: None,
            };
            self.store.insert_period(&period)?;
            Ok(period)
        })?;
        info!(period_id = %period.id, academic_year_id, "period created");
        Ok(period)
    }

    /// Change a period's name or dates, re-validating containment and overlap
    /// against every other period of the year.
    pub fn update_period(
        &self,
        institution_id: &str,
        period_id: &str,
        name: Option<&str>,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Period, ScheduleError> {
        if let Some(name) = name {
            require_name("name", name)?;
        }

        let period = self.store.atomically(|| -> Result<Period, ScheduleError> {
            let mut period = self
                .store
                .period(period_id)?
                .ok_or_else(|| ScheduleError::not_found("period", period_id))?;
            let year = self.year(institution_id, &period.academic_year_id)?;

            if let Some(name) = name {
                period.name = name.trim().to_string();
            }
            period.start_date = start_date.unwrap_or(period.start_date);
            period.end_date = end_date.unwrap_or(period.end_date);

            validate_period_range(&year, period.start_date, period.end_date)?;
            self.ensure_no_overlap(
                &year.id,
                period.start_date,
                period.end_date,
                Some(&period.id),
            )?;
            self.store.update_period(&period)?;
            Ok(period)
        })?;
        info!(period_id, "period updated");
        Ok(period)
    }

    /// Period of the year containing `date`, if any.
    pub fn period_containing(
        &self,
        institution_id: &str,
        academic_year_id: &str,
        date: NaiveDate,
    ) -> Result<Option<Period>, ScheduleError> {
        let year = self.year(institution_id, academic_year_id)?;
        Ok(self.store.period_containing(&year.id, date)?)
    }

    pub fn list_periods(
        &self,
        institution_id: &str,
        academic_year_id: &str,
    ) -> Result<Vec<Period>, ScheduleError> {
        let year = self.year(institution_id, academic_year_id)?;
        Ok(self.store.periods_of_year(&year.id)?)
    }

    /// Soft-delete a period. Assignments keep their reference; period
    /// binding is advisory.
    pub fn delete_period(&self, institution_id: &str, period_id: &str) -> Result<(), ScheduleError> {
        self.store.atomically(|| -> Result<(), ScheduleError> {
            let mut period = self
                .store
                .period(period_id)?
                .ok_or_else(|| ScheduleError::not_found("period", period_id))?;
            self.year(institution_id, &period.academic_year_id)?;
            period.deleted_at = Some(Utc::now());
            self.store.update_period(&period)?;
            Ok(())
        })?;
        info!(period_id, "period deleted");
        Ok(())
    }

    fn year(&self, institution_id: &str, academic_year_id: &str) -> Result<AcademicYear, ScheduleError> {
        self.store
            .academic_year(institution_id, academic_year_id)?
            .ok_or_else(|| ScheduleError::not_found("academic year", academic_year_id))
    }

    fn ensure_no_overlap(
        &self,
        academic_year_id: &str,
        start: NaiveDate,
        end: NaiveDate,
        exclude_id: Option<&str>,
    ) -> Result<(), ScheduleError> {
        let siblings = self.store.periods_of_year(academic_year_id)?;
        if let Some(other) = overlapping_period(&siblings, start, end, exclude_id) {
            return Err(ValidationError::PeriodOverlap {
                other_period_id: other.id.clone(),
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn period(id: &str, start: NaiveDate, end: NaiveDate) -> Period {
        Period {
            id: id.into(),
            academic_year_id: "y1".into(),
            name: id.into(),
            start_date: start,
            end_date: end,
            deleted_at: None,
        }
    }

    #[test]
    fn date_range_requires_start_before_end() {
        assert!(validate_date_range(d(2024, 1, 1), d(2024, 1, 2)).is_ok());
        assert!(validate_date_range(d(2024, 1, 2), d(2024, 1, 2)).is_err());
        assert!(validate_date_range(d(2024, 1, 3), d(2024, 1, 2)).is_err());
    }

    #[test]
    fn adjacent_periods_do_not_overlap() {
        let siblings = vec![period("p1", d(2024, 2, 1), d(2024, 6, 30))];
        assert!(overlapping_period(&siblings, d(2024, 6, 30), d(2024, 11, 30), None).is_none());
        assert!(overlapping_period(&siblings, d(2024, 6, 29), d(2024, 11, 30), None).is_some());
        assert!(overlapping_period(&siblings, d(2024, 1, 1), d(2024, 2, 1), None).is_none());
    }

    #[test]
    fn overlap_ignores_excluded_and_deleted_periods() {
        let mut removed = period("p2", d(2024, 3, 1), d(2024, 4, 1));
        removed.deleted_at = Some(Utc::now());
        let siblings = vec![period("p1", d(2024, 2, 1), d(2024, 6, 30)), removed];
        assert!(overlapping_period(&siblings, d(2024, 3, 1), d(2024, 5, 1), Some("p1")).is_none());
    }

    #[test]
    fn period_must_fit_inside_year() {
        let store = MemoryStore::new();
        let registry = CalendarRegistry::new(&store);
        let year = registry
            .create_academic_year("i1", "2024", d(2024, 2, 1), d(2024, 12, 15))
            .unwrap();

        let err = registry
            .create_period("i1", &year.id, "T1", d(2024, 1, 15), d(2024, 5, 1))
            .unwrap_err();
        assert!(matches!(
            err,
            ScheduleError::Validation(ValidationError::PeriodOutsideYear { .. })
        ));

        registry
            .create_period("i1", &year.id, "T1", d(2024, 2, 1), d(2024, 12, 15))
            .unwrap();
    }

    #[test]
    fn overlapping_period_is_rejected_and_update_excludes_itself() {
        let store = MemoryStore::new();
        let registry = CalendarRegistry::new(&store);
        let year = registry
            .create_academic_year("i1", "2024", d(2024, 2, 1), d(2024, 12, 15))
            .unwrap();
        let first = registry
            .create_period("i1", &year.id, "T1", d(2024, 2, 1), d(2024, 6, 30))
            .unwrap();
        let second = registry
            .create_period("i1", &year.id, "T2", d(2024, 6, 30), d(2024, 12, 15))
            .unwrap();

        let err = registry
            .create_period("i1", &year.id, "T3", d(2024, 5, 1), d(2024, 7, 1))
            .unwrap_err();
        match err {
            ScheduleError::Validation(ValidationError::PeriodOverlap { other_period_id }) => {
                assert_eq!(other_period_id, first.id);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // Shrinking a period only compares against its siblings.
        let updated = registry
            .update_period("i1", &first.id, None, None, Some(d(2024, 6, 1)))
            .unwrap();
        assert_eq!(updated.end_date, d(2024, 6, 1));

        let err = registry
            .update_period("i1", &second.id, None, Some(d(2024, 5, 1)), None)
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION");
    }

    #[test]
    fn year_lookup_respects_institution() {
        let store = MemoryStore::new();
        let registry = CalendarRegistry::new(&store);
        let year = registry
            .create_academic_year("i1", "2024", d(2024, 2, 1), d(2024, 12, 15))
            .unwrap();
        let err = registry
            .create_period("i2", &year.id, "T1", d(2024, 2, 1), d(2024, 3, 1))
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn period_containing_finds_the_enclosing_period() {
        let store = MemoryStore::new();
        let registry = CalendarRegistry::new(&store);
        let year = registry
            .create_academic_year("i1", "2024", d(2024, 2, 1), d(2024, 12, 15))
            .unwrap();
        let first = registry
            .create_period("i1", &year.id, "T1", d(2024, 2, 1), d(2024, 6, 30))
            .unwrap();
        let found = registry
            .period_containing("i1", &year.id, d(2024, 3, 10))
            .unwrap();
        assert_eq!(found.map(|p| p.id), Some(first.id.clone()));
        assert!(registry
            .period_containing("i1", &year.id, d(2024, 8, 1))
            .unwrap()
            .is_none());

        registry.delete_period("i1", &first.id).unwrap();
        assert!(registry.list_periods("i1", &year.id).unwrap().is_empty());
    }

    #[test]
    fn racing_period_creates_never_both_commit() {
        let store = MemoryStore::new();
        let registry = CalendarRegistry::new(&store);
        let year = registry
            .create_academic_year("i1", "2024", d(2024, 2, 1), d(2024, 12, 15))
            .unwrap();

        for round in 0..20u64 {
            let start = d(2024, 2, 1) + chrono::Days::new(round * 7);
            let end = start + chrono::Days::new(7);
            let barrier = std::sync::Barrier::new(2);
            let results: Vec<_> = std::thread::scope(|scope| {
                let handles: Vec<_> = (0..2)
                    .map(|i| {
                        let (registry, barrier, year) = (&registry, &barrier, &year);
                        scope.spawn(move || {
                            barrier.wait();
                            registry.create_period("i1", &year.id, &format!("P{round}-{i}"), start, end)
                        })
                    })
                    .collect();
                handles.into_iter().map(|h| h.join().unwrap()).collect()
            });
            assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1, "round {round}");
        }
        assert_eq!(registry.list_periods("i1", &year.id).unwrap().len(), 20);
    }
}
