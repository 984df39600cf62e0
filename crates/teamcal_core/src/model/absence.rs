//! Absence domain model.
//!
//! # Responsibility
//! - Define the per-user absence record with an edit whitelist.
//! - Validate date range input at the write boundary.
//!
//! # Invariants
//! - `end >= start`; both dates are inclusive.
//! - Only the owner deletes; owner and whitelisted editors may edit.

use crate::model::user::UserId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of an absence.
pub type AbsenceId = Uuid;

/// Date range during which a user is unavailable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Absence {
    pub uuid: AbsenceId,
    pub owner: UserId,
    /// Inclusive first day.
    pub start: NaiveDate,
    /// Inclusive last day.
    pub end: NaiveDate,
    pub request_accepted: bool,
    /// Users other than the owner that may edit this absence.
    pub editors: BTreeSet<UserId>,
}

/// Validation failures for absence input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbsenceValidationError {
    EndBeforeStart { start: NaiveDate, end: NaiveDate },
    SpanTooLong { days: i64, max_days: u32 },
}

impl Display for AbsenceValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EndBeforeStart { start, end } => {
                write!(f, "absence end {end} is before start {start}")
            }
            Self::SpanTooLong { days, max_days } => write!(
                f,
                "absence spans {days} days, maximum is {max_days}"
            ),
        }
    }
}

impl Error for AbsenceValidationError {}

impl Absence {
    /// Creates a not-yet-accepted absence for `owner`.
    pub fn new(owner: UserId, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            owner,
            start,
            end,
            request_accepted: false,
            editors: BTreeSet::new(),
        }
    }

    pub fn validate(&self) -> Result<(), AbsenceValidationError> {
        if self.end < self.start {
            return Err(AbsenceValidationError::EndBeforeStart {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }

    /// Number of calendar days covered, both ends included.
    pub fn span_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Rejects spans longer than `max_days` when a limit is set.
    pub fn check_span(&self, max_days: Option<u32>) -> Result<(), AbsenceValidationError> {
        match max_days {
            Some(max_days) if self.span_days() > i64::from(max_days) => {
                Err(AbsenceValidationError::SpanTooLong {
                    days: self.span_days(),
                    max_days,
                })
            }
            _ => Ok(()),
        }
    }

    pub fn can_edit(&self, user: UserId) -> bool {
        self.owner == user || self.editors.contains(&user)
    }
}

#[cfg(test)]
mod tests {
    use super::{Absence, AbsenceValidationError};
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn single_day_absence_is_valid() {
        let absence = Absence::new(Uuid::new_v4(), day(2024, 3, 10), day(2024, 3, 10));
        absence.validate().unwrap();
        assert_eq!(absence.span_days(), 1);
    }

    #[test]
    fn end_before_start_is_rejected() {
        let absence = Absence::new(Uuid::new_v4(), day(2024, 3, 12), day(2024, 3, 10));
        assert!(matches!(
            absence.validate(),
            Err(AbsenceValidationError::EndBeforeStart { .. })
        ));
    }

    #[test]
    fn span_guard_counts_both_ends() {
        let absence = Absence::new(Uuid::new_v4(), day(2024, 1, 1), day(2024, 1, 10));
        absence.check_span(Some(10)).unwrap();
        assert!(absence.check_span(Some(9)).is_err());
        absence.check_span(None).unwrap();
    }

    #[test]
    fn editors_and_owner_can_edit() {
        let owner = Uuid::new_v4();
        let editor = Uuid::new_v4();
        let mut absence = Absence::new(owner, day(2024, 1, 1), day(2024, 1, 2));
        absence.editors.insert(editor);
        assert!(absence.can_edit(owner));
        assert!(absence.can_edit(editor));
        assert!(!absence.can_edit(Uuid::new_v4()));
    }
}
