//! Calendar arithmetic shared by the attendance grid and the statistics view.
//!
//! Business days are Monday to Friday; holidays are not modeled.

use chrono::{Datelike, Months, NaiveDate, Weekday};
use derive_more::Display;

const WEEKDAYS_SHORT: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Years a stored `DATE` column can hold.
pub const MIN_YEAR: i32 = 1;
pub const MAX_YEAR: i32 = 9999;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
#[display(fmt = "{}-{} is not a valid calendar month", year, month)]
pub struct InvalidDateError {
    pub year: i32,
    pub month: u32,
}

impl std::error::Error for InvalidDateError {}

pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// All Monday-Friday dates in `[start, end]`, ascending.
pub fn business_days_in_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|day| *day <= end)
        .filter(|day| is_business_day(*day))
        .collect()
}

/// Splits an ascending run of dates into groups that share an ISO week.
///
/// A new group starts every time the ISO week changes from the previous date,
/// so the first and last groups of a month may be short.
pub fn group_by_iso_week(dates: &[NaiveDate]) -> Vec<Vec<NaiveDate>> {
    let mut weeks: Vec<Vec<NaiveDate>> = Vec::new();

    for date in dates {
        let same_week = weeks
            .last()
            .and_then(|week| week.last())
            .is_some_and(|last| last.iso_week() == date.iso_week());

        match weeks.last_mut() {
            Some(current) if same_week => current.push(*date),
            _ => weeks.push(vec![*date]),
        }
    }

    weeks
}

/// First and last day of a calendar month.
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), InvalidDateError> {
    let invalid = InvalidDateError { year, month };

    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return Err(invalid);
    }

    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or(invalid)?;
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .ok_or(invalid)?;

    Ok((first, last))
}

/// Moves `delta` months away from `(year, month)`, wrapping across years.
pub fn adjacent_month(year: i32, month: u32, delta: i32) -> (i32, u32) {
    let index = year * 12 + (month as i32 - 1) + delta;
    (index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
}

pub fn weekday_short(date: NaiveDate) -> &'static str {
    WEEKDAYS_SHORT[date.weekday().num_days_from_monday() as usize]
}

/// English month name; `month` must be in 1..=12.
pub fn month_name(month: u32) -> &'static str {
    MONTH_NAMES[(month.clamp(1, 12) - 1) as usize]
}
