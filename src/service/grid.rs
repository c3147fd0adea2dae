//! Builds the employees x business-days attendance grid for one month.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;

use crate::model::{
    attendance_record::{RecordKey, RecordWithStatus},
    attendance_status::{AttendanceStatus, StatusBadge},
    employee::Employee,
};
use crate::utils::calendar::{
    InvalidDateError, adjacent_month, business_days_in_range, group_by_iso_week, month_bounds,
    month_name, weekday_short,
};

/// The days a grid request shows, before any record is loaded.
#[derive(Debug, Clone)]
pub struct GridLayout {
    pub year: i32,
    pub month: u32,
    pub weeks: Vec<Vec<NaiveDate>>,
    pub visible_days: Vec<NaiveDate>,
    pub selected_week: Option<usize>,
}

impl GridLayout {
    /// Lays out the business days of a month, optionally narrowed to one ISO
    /// week. An out-of-range week index shows the whole month.
    pub fn for_month(year: i32, month: u32, week: Option<usize>) -> Result<Self, InvalidDateError> {
        let (first, last) = month_bounds(year, month)?;
        let business_days = business_days_in_range(first, last);
        let weeks = group_by_iso_week(&business_days);

        let (visible_days, selected_week) = match week.and_then(|idx| weeks.get(idx).map(|w| (idx, w))) {
            Some((idx, days)) => (days.clone(), Some(idx)),
            None => (business_days, None),
        };

        Ok(Self {
            year,
            month,
            weeks,
            visible_days,
            selected_week,
        })
    }

    /// Inclusive date span covered by the visible days, if any.
    pub fn visible_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((*self.visible_days.first()?, *self.visible_days.last()?))
    }
}

/// A status painted into a cell, with the record's note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellRecord {
    pub status: StatusBadge,
    pub note: String,
}

/// Indexes records by (employee, date) so the grid is assembled without
/// per-cell queries.
pub fn index_records(records: &[RecordWithStatus]) -> HashMap<RecordKey, CellRecord> {
    records
        .iter()
        .map(|r| {
            (
                r.key(),
                CellRecord {
                    status: r.status().badge(),
                    note: r.note.clone(),
                },
            )
        })
        .collect()
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GridColumn {
    #[schema(value_type = String, format = "date", example = "2024-02-05")]
    pub date: NaiveDate,
    #[schema(example = 5)]
    pub day: u32,
    #[schema(example = "Mon")]
    pub weekday: String,
    pub is_today: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GridCell {
    #[schema(value_type = String, format = "date", example = "2024-02-05")]
    pub date: NaiveDate,
    pub is_today: bool,
    pub status: Option<StatusBadge>,
    pub note: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GridRow {
    pub employee_id: u64,
    #[schema(example = "Carrizo, Lorena")]
    pub employee_name: String,
    pub cells: Vec<GridCell>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WeekOption {
    pub index: usize,
    #[schema(example = "Week 1: Thu 1 - Fri 2")]
    pub label: String,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct MonthRef {
    pub year: i32,
    pub month: u32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AttendanceGrid {
    pub year: i32,
    pub month: u32,
    #[schema(example = "February")]
    pub month_name: String,
    #[schema(value_type = String, format = "date")]
    pub today: NaiveDate,
    pub columns: Vec<GridColumn>,
    pub rows: Vec<GridRow>,
    pub weeks: Vec<WeekOption>,
    pub selected_week: Option<usize>,
    pub previous: MonthRef,
    pub next: MonthRef,
    /// Active statuses a cell can be set to.
    pub statuses: Vec<AttendanceStatus>,
}

fn week_label(index: usize, days: &[NaiveDate]) -> String {
    match (days.first(), days.last()) {
        (Some(first), Some(last)) => format!(
            "Week {}: {} {} - {} {}",
            index + 1,
            weekday_short(*first),
            first.format("%-d"),
            weekday_short(*last),
            last.format("%-d"),
        ),
        _ => format!("Week {}", index + 1),
    }
}

pub fn build_grid(
    layout: &GridLayout,
    today: NaiveDate,
    employees: &[Employee],
    statuses: Vec<AttendanceStatus>,
    records: &HashMap<RecordKey, CellRecord>,
) -> AttendanceGrid {
    let columns = layout
        .visible_days
        .iter()
        .map(|day| GridColumn {
            date: *day,
            day: chrono::Datelike::day(day),
            weekday: weekday_short(*day).to_string(),
            is_today: *day == today,
        })
        .collect();

    let rows = employees
        .iter()
        .map(|employee| GridRow {
            employee_id: employee.id,
            employee_name: employee.display_name(),
            cells: layout
                .visible_days
                .iter()
                .map(|day| {
                    let record = records.get(&(employee.id, *day));
                    GridCell {
                        date: *day,
                        is_today: *day == today,
                        status: record.map(|r| r.status.clone()),
                        note: record.map(|r| r.note.clone()).unwrap_or_default(),
                    }
                })
                .collect(),
        })
        .collect();

    let weeks = layout
        .weeks
        .iter()
        .enumerate()
        .map(|(index, days)| WeekOption {
            index,
            label: week_label(index, days),
            active: layout.selected_week == Some(index),
        })
        .collect();

    let (prev_year, prev_month) = adjacent_month(layout.year, layout.month, -1);
    let (next_year, next_month) = adjacent_month(layout.year, layout.month, 1);

    AttendanceGrid {
        year: layout.year,
        month: layout.month,
        month_name: month_name(layout.month).to_string(),
        today,
        columns,
        rows,
        weeks,
        selected_week: layout.selected_week,
        previous: MonthRef {
            year: prev_year,
            month: prev_month,
        },
        next: MonthRef {
            year: next_year,
            month: next_month,
        },
        statuses,
    }
}
