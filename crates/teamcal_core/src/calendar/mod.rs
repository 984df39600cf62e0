//! Calendar computations shared by team and all-teams views.
//!
//! # Responsibility
//! - Build month grids with weekday labels and navigation targets.
//! - Expand stored absences into per-day date lists per subject.
//!
//! # Invariants
//! - Grid days always match the Gregorian length of the month.
//! - Aggregation never mutates stored absences.

use crate::model::absence::AbsenceId;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod absences;
pub mod grid;

/// Errors from calendar grid building and absence aggregation.
#[derive(Debug)]
pub enum CalendarError {
    /// Month name is not a full English month name.
    UnknownMonth(String),
    /// Year is outside `1..=9999`.
    InvalidYear(i32),
    /// Stored absence is longer than the configured expansion guard.
    AbsenceSpanExceeded {
        absence: AbsenceId,
        days: i64,
        max_days: u32,
    },
    Repo(RepoError),
}

impl Display for CalendarError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownMonth(value) => write!(f, "unknown month name `{value}`"),
            Self::InvalidYear(year) => write!(f, "year {year} is outside 1..=9999"),
            Self::AbsenceSpanExceeded {
                absence,
                days,
                max_days,
            } => write!(
                f,
                "absence {absence} spans {days} days, expansion limit is {max_days}"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CalendarError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for CalendarError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}
