//! Month grid builder.
//!
//! # Responsibility
//! - Parse full English month names.
//! - Produce the day range, two-letter weekday labels and prev/next targets.
//!
//! # Invariants
//! - `day_range` is `1..=days_in_month(year, month)` (proleptic Gregorian).
//! - `day_names[i]` labels `day_range[i]`.
//! - Navigation never points at the requested month itself.
//! - Navigation targets stay within `MIN_YEAR..=MAX_YEAR`; at the bounds
//!   `Rollover` falls back to the same-year wrap.

use crate::calendar::CalendarError;
use chrono::{Datelike, Local, Month, NaiveDate};
use serde::{Deserialize, Serialize};

/// Earliest year a grid can be built for.
pub const MIN_YEAR: i32 = 1;
/// Latest year a grid can be built for.
pub const MAX_YEAR: i32 = 9999;

/// How January/December navigation picks the neighbouring year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationPolicy {
    /// December of `year - 1` before January, January of `year + 1` after
    /// December.
    #[default]
    Rollover,
    /// Legacy wrap: December/January of the same year. Interior months
    /// still navigate within the year.
    SameYear,
}

/// Month/year selection for a calendar request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarQuery {
    /// Full English month name, e.g. `March`.
    pub month: String,
    pub year: i32,
}

impl CalendarQuery {
    pub fn new(month: impl Into<String>, year: i32) -> Self {
        Self {
            month: month.into(),
            year,
        }
    }

    /// Query for the month containing `date`.
    pub fn for_date(date: NaiveDate) -> Self {
        Self::new(month_name(date.month()), date.year())
    }

    /// Query for the current local month, evaluated at call time.
    pub fn today() -> Self {
        Self::for_date(Local::now().date_naive())
    }
}

/// Month grid view model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarGrid {
    pub day_range: Vec<u32>,
    pub day_names: Vec<String>,
    /// Canonical month name (`March`), whatever the input casing was.
    pub month: String,
    pub year: i32,
    pub month_num: u32,
    pub previous_month: String,
    pub previous_year: i32,
    pub next_month: String,
    pub next_year: i32,
}

impl CalendarGrid {
    /// Date of one grid day, `None` outside `day_range`.
    pub fn date(&self, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month_num, day)
    }

    /// First and last date shown by the grid.
    pub fn bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        let last = *self.day_range.last()?;
        Some((self.date(1)?, self.date(last)?))
    }
}

/// Builds the grid for `query` using `policy` for year wrap-around.
pub fn build_grid(
    query: &CalendarQuery,
    policy: NavigationPolicy,
) -> Result<CalendarGrid, CalendarError> {
    let month_num = parse_month_name(&query.month)?;
    let year = query.year;
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return Err(CalendarError::InvalidYear(year));
    }

    let total_days = days_in_month(year, month_num).ok_or(CalendarError::InvalidYear(year))?;
    let day_range: Vec<u32> = (1..=total_days).collect();
    let day_names = day_range
        .iter()
        .filter_map(|day| NaiveDate::from_ymd_opt(year, month_num, *day))
        .map(weekday_abbreviation)
        .collect();

    let rollover = policy == NavigationPolicy::Rollover;
    let (previous_num, previous_year) = match month_num {
        1 if rollover && year > MIN_YEAR => (12, year - 1),
        1 => (12, year),
        month => (month - 1, year),
    };
    let (next_num, next_year) = match month_num {
        12 if rollover && year < MAX_YEAR => (1, year + 1),
        12 => (1, year),
        month => (month + 1, year),
    };

    Ok(CalendarGrid {
        day_range,
        day_names,
        month: month_name(month_num),
        year,
        month_num,
        previous_month: month_name(previous_num),
        previous_year,
        next_month: month_name(next_num),
        next_year,
    })
}

/// Parses a full English month name (case-insensitive) to `1..=12`.
pub fn parse_month_name(value: &str) -> Result<u32, CalendarError> {
    let trimmed = value.trim();
    (1..=12u32)
        .find(|number| month_name(*number).eq_ignore_ascii_case(trimmed))
        .ok_or_else(|| CalendarError::UnknownMonth(value.to_string()))
}

/// Number of days in `month` of `year`, `None` for invalid input.
pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    u32::try_from((next_first - first).num_days()).ok()
}

fn month_name(month: u32) -> String {
    u8::try_from(month)
        .ok()
        .and_then(|number| Month::try_from(number).ok())
        .map(|month| month.name().to_string())
        .unwrap_or_default()
}

/// First two characters of the full weekday name (`Mo`, `Tu`, ...).
fn weekday_abbreviation(date: NaiveDate) -> String {
    date.format("%A").to_string().chars().take(2).collect()
}
