//! Absence aggregation for calendar views.
//!
//! # Responsibility
//! - Load absences per subject (user or membership) in input order.
//! - Expand each inclusive `[start, end]` range day by day.
//!
//! # Invariants
//! - Every input subject gets an entry, possibly with empty lists.
//! - Expansion is bounded by the caller-supplied span limit when set.
//! - Stored absences are read only.

use crate::calendar::grid::CalendarGrid;
use crate::calendar::CalendarError;
use crate::model::absence::{Absence, AbsenceId};
use crate::model::membership::Relationship;
use crate::model::user::{User, UserId};
use crate::repo::absence_repo::AbsenceRepository;
use chrono::NaiveDate;
use log::debug;
use serde::Serialize;

/// Anything that resolves to the user whose absences should be shown.
pub trait AbsenceSubject {
    fn subject_user(&self) -> UserId;
}

impl AbsenceSubject for UserId {
    fn subject_user(&self) -> UserId {
        *self
    }
}

impl AbsenceSubject for User {
    fn subject_user(&self) -> UserId {
        self.uuid
    }
}

impl AbsenceSubject for Relationship {
    fn subject_user(&self) -> UserId {
        self.user
    }
}

/// One absence with its expanded dates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AbsenceEntry {
    pub id: AbsenceId,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub dates: Vec<NaiveDate>,
}

/// Aggregated absences of one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectAbsences<S> {
    pub subject: S,
    pub absences: Vec<AbsenceEntry>,
    /// Concatenation of every entry's `dates`, in absence order.
    pub dates: Vec<NaiveDate>,
}

impl<S> SubjectAbsences<S> {
    pub fn is_absent_on(&self, date: NaiveDate) -> bool {
        self.absences
            .iter()
            .any(|entry| entry.start <= date && date <= entry.end)
    }

    /// Per-day absence flags aligned with `grid.day_range`.
    pub fn month_cells(&self, grid: &CalendarGrid) -> Vec<bool> {
        grid.day_range
            .iter()
            .map(|day| grid.date(*day).is_some_and(|date| self.is_absent_on(date)))
            .collect()
    }
}

/// Loads and expands absences for every subject, preserving input order.
///
/// Expansion cost grows with absence length; `max_span_days` rejects any
/// stored absence longer than the limit instead of expanding it.
pub fn aggregate_absences<S, R>(
    repo: &R,
    subjects: &[S],
    max_span_days: Option<u32>,
) -> Result<Vec<SubjectAbsences<S>>, CalendarError>
where
    S: AbsenceSubject + Clone,
    R: AbsenceRepository + ?Sized,
{
    let mut aggregated = Vec::with_capacity(subjects.len());

    for subject in subjects {
        let user = subject.subject_user();
        let stored = repo.list_absences_by_owner(user)?;
        let mut absences = Vec::with_capacity(stored.len());
        let mut dates = Vec::new();

        for absence in &stored {
            let entry = expand_absence(absence, max_span_days)?;
            dates.extend_from_slice(&entry.dates);
            absences.push(entry);
        }

        debug!(
            "event=absence_aggregate module=calendar status=ok user_id={user} absences={} days={}",
            absences.len(),
            dates.len()
        );
        aggregated.push(SubjectAbsences {
            subject: subject.clone(),
            absences,
            dates,
        });
    }

    Ok(aggregated)
}

fn expand_absence(
    absence: &Absence,
    max_span_days: Option<u32>,
) -> Result<AbsenceEntry, CalendarError> {
    if let Some(max_days) = max_span_days {
        let days = absence.span_days();
        if days > i64::from(max_days) {
            return Err(CalendarError::AbsenceSpanExceeded {
                absence: absence.uuid,
                days,
                max_days,
            });
        }
    }

    Ok(AbsenceEntry {
        id: absence.uuid,
        start: absence.start,
        end: absence.end,
        dates: expand_range(absence.start, absence.end),
    })
}

/// Every date from `start` to `end`, both included. Empty when `end < start`.
pub fn expand_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|date| *date <= end).collect()
}

#[cfg(test)]
mod tests {
    use super::{expand_absence, expand_range, SubjectAbsences};
    use crate::calendar::CalendarError;
    use crate::model::absence::Absence;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn range_is_inclusive_on_both_ends() {
        let dates = expand_range(day(2024, 3, 10), day(2024, 3, 12));
        assert_eq!(dates, vec![day(2024, 3, 10), day(2024, 3, 11), day(2024, 3, 12)]);
    }

    #[test]
    fn range_crosses_month_boundary() {
        let dates = expand_range(day(2024, 1, 30), day(2024, 2, 1));
        assert_eq!(dates, vec![day(2024, 1, 30), day(2024, 1, 31), day(2024, 2, 1)]);
    }

    #[test]
    fn inverted_range_is_empty() {
        assert!(expand_range(day(2024, 3, 12), day(2024, 3, 10)).is_empty());
    }

    #[test]
    fn span_guard_rejects_long_absences() {
        let absence = Absence::new(Uuid::new_v4(), day(2020, 1, 1), day(2024, 1, 1));
        let err = expand_absence(&absence, Some(366)).unwrap_err();
        assert!(matches!(
            err,
            CalendarError::AbsenceSpanExceeded { max_days: 366, .. }
        ));
        assert_eq!(expand_absence(&absence, None).unwrap().dates.len(), 1462);
    }

    #[test]
    fn presence_includes_both_range_ends() {
        let absence = Absence::new(Uuid::new_v4(), day(2024, 3, 10), day(2024, 3, 12));
        let entry = expand_absence(&absence, None).unwrap();
        let row = SubjectAbsences {
            subject: absence.owner,
            dates: entry.dates.clone(),
            absences: vec![entry],
        };
        assert!(row.is_absent_on(day(2024, 3, 10)));
        assert!(row.is_absent_on(day(2024, 3, 12)));
        assert!(!row.is_absent_on(day(2024, 3, 9)));
        assert!(!row.is_absent_on(day(2024, 3, 13)));
    }
}
