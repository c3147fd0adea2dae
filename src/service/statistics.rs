//! Coverage statistics over a month, quarter, half-year or year.
//!
//! Coverage compares the records actually entered with every possible
//! (active employee x business day) slot. Periods are cut at today, so the
//! future never counts as missing attendance.

use std::collections::{HashMap, HashSet};

use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

use crate::model::{
    attendance_record::RecordWithStatus, attendance_status::AttendanceStatus, employee::Employee,
};
use crate::utils::calendar::{
    InvalidDateError, MAX_YEAR, MIN_YEAR, business_days_in_range, month_bounds, month_name,
};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, EnumString, Display, Serialize, ToSchema,
)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    #[default]
    #[strum(to_string = "monthly", serialize = "mensual")]
    Monthly,
    #[strum(to_string = "quarterly", serialize = "trimestral")]
    Quarterly,
    #[strum(to_string = "semester", serialize = "semestral")]
    Semester,
    #[strum(to_string = "annual", serialize = "anual")]
    Annual,
}

impl Period {
    pub fn spans_several_months(self) -> bool {
        !matches!(self, Period::Monthly)
    }
}

/// Raw query string. Everything is optional text so that malformed values can
/// fall back to defaults instead of failing extraction.
#[derive(Debug, Default)]
pub struct StatisticsQuery {
    pub periodo: Option<String>,
    pub anio: Option<String>,
    pub mes: Option<String>,
    pub trimestre: Option<String>,
    pub semestre: Option<String>,
}

impl StatisticsQuery {
    /// Collects decoded query pairs. A repeated key keeps its last value and
    /// unknown keys are ignored.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut query = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "periodo" => &mut query.periodo,
                "anio" => &mut query.anio,
                "mes" => &mut query.mes,
                "trimestre" => &mut query.trimestre,
                "semestre" => &mut query.semestre,
                _ => continue,
            };
            *slot = Some(value);
        }
        query
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct PeriodSelection {
    pub period: Period,
    pub year: i32,
    pub month: u32,
    pub quarter: u32,
    pub half: u32,
}

fn parse_clamped(raw: Option<&str>, default: u32, min: u32, max: u32) -> u32 {
    raw.and_then(|value| value.trim().parse::<i64>().ok())
        .map(|value| value.clamp(i64::from(min), i64::from(max)) as u32)
        .unwrap_or(default)
}

impl PeriodSelection {
    /// Resolves the query against `today`. Unknown periods mean monthly,
    /// non-numeric values take today's year/month/quarter/half and numbers
    /// are clamped into range.
    pub fn from_query(query: &StatisticsQuery, today: NaiveDate) -> Self {
        let period = query
            .periodo
            .as_deref()
            .and_then(|p| p.trim().parse::<Period>().ok())
            .unwrap_or_default();

        let year = query
            .anio
            .as_deref()
            .and_then(|y| y.trim().parse::<i32>().ok())
            .filter(|y| (MIN_YEAR..=MAX_YEAR).contains(y))
            .unwrap_or_else(|| today.year());

        let mut selection = Self {
            period,
            year,
            month: today.month(),
            quarter: (today.month() - 1) / 3 + 1,
            half: if today.month() <= 6 { 1 } else { 2 },
        };

        match period {
            Period::Monthly => {
                selection.month = parse_clamped(query.mes.as_deref(), selection.month, 1, 12)
            }
            Period::Quarterly => {
                selection.quarter =
                    parse_clamped(query.trimestre.as_deref(), selection.quarter, 1, 4)
            }
            Period::Semester => {
                selection.half = parse_clamped(query.semestre.as_deref(), selection.half, 1, 2)
            }
            Period::Annual => {}
        }

        selection
    }

    fn month_span(&self) -> (u32, u32) {
        match self.period {
            Period::Monthly => (self.month, self.month),
            Period::Quarterly => {
                let first = (self.quarter - 1) * 3 + 1;
                (first, first + 2)
            }
            Period::Semester if self.half == 1 => (1, 6),
            Period::Semester => (7, 12),
            Period::Annual => (1, 12),
        }
    }

    /// Calendar bounds of the period, not yet cut at today.
    pub fn bounds(&self) -> Result<(NaiveDate, NaiveDate), InvalidDateError> {
        let (first_month, last_month) = self.month_span();
        let (start, _) = month_bounds(self.year, first_month)?;
        let (_, end) = month_bounds(self.year, last_month)?;
        Ok((start, end))
    }

    pub fn title(&self) -> String {
        match self.period {
            Period::Monthly => format!("{} {}", month_name(self.month), self.year),
            Period::Quarterly => format!("Q{} {}", self.quarter, self.year),
            Period::Semester => format!("H{} {}", self.half, self.year),
            Period::Annual => self.year.to_string(),
        }
    }
}

/// `numerator / denominator * 100` rounded to one decimal, halves to even,
/// or 0 for an empty denominator.
pub fn percentage(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    let value = numerator as f64 / denominator as f64 * 100.0;
    (value * 10.0).round_ties_even() / 10.0
}

/// Rows loaded from the store for one statistics request.
#[derive(Debug, Default)]
pub struct StatisticsData {
    /// Active employees in roster order.
    pub employees: Vec<Employee>,
    /// Active statuses in display order.
    pub statuses: Vec<AttendanceStatus>,
    pub records: Vec<RecordWithStatus>,
    pub first_record_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatusShare {
    pub status_id: u64,
    pub code: String,
    pub description: String,
    pub background_color: String,
    pub text_color: String,
    pub sort_order: u32,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct StatusCount {
    pub code: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EmployeeStats {
    pub employee_id: u64,
    pub employee_name: String,
    pub counts: Vec<StatusCount>,
    pub recorded: usize,
    pub unrecorded: usize,
    pub coverage: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MonthTrend {
    pub year: i32,
    pub month: u32,
    #[schema(example = "Jan 24")]
    pub label: String,
    pub business_days: usize,
    pub records: usize,
    pub coverage: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatisticsReport {
    pub selection: PeriodSelection,
    #[schema(example = "Q1 2024")]
    pub title: String,
    #[schema(value_type = String, format = "date")]
    pub start: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub effective_end: NaiveDate,
    pub business_days: usize,
    pub active_employees: usize,
    pub total_records: usize,
    pub possible_slots: usize,
    pub coverage: f64,
    pub unrecorded_total: usize,
    pub distribution: Vec<StatusShare>,
    pub employees: Vec<EmployeeStats>,
    /// Column order of `EmployeeStats::counts`.
    pub statuses: Vec<AttendanceStatus>,
    pub monthly_trend: Vec<MonthTrend>,
    pub available_years: Vec<i32>,
}

pub fn aggregate(
    selection: PeriodSelection,
    today: NaiveDate,
    data: &StatisticsData,
) -> Result<StatisticsReport, InvalidDateError> {
    let (start, end) = selection.bounds()?;
    let effective_end = end.min(today);

    let business_days = business_days_in_range(start, effective_end).len();
    let active_employees = data.employees.len();

    let active_ids: HashSet<u64> = data.employees.iter().map(|e| e.id).collect();
    let records: Vec<&RecordWithStatus> = data
        .records
        .iter()
        .filter(|r| r.date >= start && r.date <= effective_end && active_ids.contains(&r.employee_id))
        .collect();

    let total_records = records.len();
    let possible_slots = business_days * active_employees;

    // Distribution over every referenced status, inactive ones included.
    let mut shares: HashMap<u64, StatusShare> = HashMap::new();
    for record in &records {
        shares
            .entry(record.status_id)
            .or_insert_with(|| StatusShare {
                status_id: record.status_id,
                code: record.status_code.clone(),
                description: record.status_description.clone(),
                background_color: record.status_background_color.clone(),
                text_color: record.status_text_color.clone(),
                sort_order: record.status_sort_order,
                count: 0,
                percentage: 0.0,
            })
            .count += 1;
    }
    let mut distribution: Vec<StatusShare> = shares
        .into_values()
        .map(|share| StatusShare {
            percentage: percentage(share.count, total_records),
            ..share
        })
        .collect();
    distribution.sort_by(|a, b| {
        a.sort_order
            .cmp(&b.sort_order)
            .then_with(|| a.code.cmp(&b.code))
    });

    let mut per_employee: HashMap<u64, Vec<&RecordWithStatus>> = HashMap::new();
    for record in &records {
        per_employee.entry(record.employee_id).or_default().push(record);
    }

    let mut employees: Vec<EmployeeStats> = data
        .employees
        .iter()
        .map(|employee| {
            let own = per_employee
                .get(&employee.id)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let counts = data
                .statuses
                .iter()
                .map(|status| StatusCount {
                    code: status.code.clone(),
                    count: own.iter().filter(|r| r.status_id == status.id).count(),
                })
                .collect();
            let recorded = own.len();

            EmployeeStats {
                employee_id: employee.id,
                employee_name: employee.display_name(),
                counts,
                recorded,
                unrecorded: business_days.saturating_sub(recorded),
                coverage: percentage(recorded, business_days),
            }
        })
        .collect();
    // Stable, so ties keep roster order.
    employees.sort_by(|a, b| b.coverage.total_cmp(&a.coverage));

    let unrecorded_total = employees.iter().map(|e| e.unrecorded).sum();

    let monthly_trend = if selection.period.spans_several_months() {
        monthly_trend(start, end, today, active_employees, &records)?
    } else {
        Vec::new()
    };

    let first_year = data
        .first_record_date
        .map_or_else(|| today.year(), |d| d.year());

    Ok(StatisticsReport {
        selection,
        title: selection.title(),
        start,
        effective_end,
        business_days,
        active_employees,
        total_records,
        possible_slots,
        coverage: percentage(total_records, possible_slots),
        unrecorded_total,
        distribution,
        employees,
        statuses: data.statuses.clone(),
        monthly_trend,
        available_years: (first_year..=today.year()).collect(),
    })
}

fn monthly_trend(
    start: NaiveDate,
    end: NaiveDate,
    today: NaiveDate,
    active_employees: usize,
    records: &[&RecordWithStatus],
) -> Result<Vec<MonthTrend>, InvalidDateError> {
    let mut trend = Vec::new();
    let mut cursor = start.with_day(1);

    while let Some(month_start) = cursor.filter(|d| *d <= end && *d <= today) {
        let (first, last) = month_bounds(month_start.year(), month_start.month())?;
        let business_days = business_days_in_range(first, last.min(today)).len();
        let month_records = records
            .iter()
            .filter(|r| r.date.year() == first.year() && r.date.month() == first.month())
            .count();

        trend.push(MonthTrend {
            year: first.year(),
            month: first.month(),
            label: format!("{} {}", first.format("%b"), first.format("%y")),
            business_days,
            records: month_records,
            coverage: percentage(month_records, business_days * active_employees),
        });

        cursor = month_start.checked_add_months(Months::new(1));
    }

    Ok(trend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn employee(id: u64, last: &str) -> Employee {
        Employee {
            id,
            first_name: format!("E{id}"),
            last_name: last.to_string(),
            active: true,
            created_on: date(2023, 1, 1),
            notes: String::new(),
        }
    }

    fn status(id: u64, code: &str, sort_order: u32) -> AttendanceStatus {
        AttendanceStatus {
            id,
            code: code.to_string(),
            description: code.to_string(),
            background_color: "#FFFFFF".to_string(),
            text_color: "#000000".to_string(),
            sort_order,
            active: true,
        }
    }

    fn record(employee_id: u64, day: NaiveDate, status: &AttendanceStatus) -> RecordWithStatus {
        RecordWithStatus {
            employee_id,
            date: day,
            note: String::new(),
            status_id: status.id,
            status_code: status.code.clone(),
            status_description: status.description.clone(),
            status_background_color: status.background_color.clone(),
            status_text_color: status.text_color.clone(),
            status_sort_order: status.sort_order,
            status_active: status.active,
        }
    }

    fn query(pairs: &[(&str, &str)]) -> StatisticsQuery {
        StatisticsQuery::from_pairs(
            pairs
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string())),
        )
    }

    fn monthly(year: i32, month: u32) -> PeriodSelection {
        PeriodSelection {
            period: Period::Monthly,
            year,
            month,
            quarter: 1,
            half: 1,
        }
    }

    #[rstest]
    #[case(80, 105, 76.2)]
    #[case(0, 105, 0.0)]
    #[case(105, 105, 100.0)]
    #[case(1, 3, 33.3)]
    #[case(2, 3, 66.7)]
    #[case(1, 16, 6.2)]
    #[case(5, 16, 31.2)]
    #[case(3, 16, 18.8)]
    #[case(5, 0, 0.0)]
    fn percentage_rounds_to_one_decimal(
        #[case] numerator: usize,
        #[case] denominator: usize,
        #[case] expected: f64,
    ) {
        assert_eq!(percentage(numerator, denominator), expected);
    }

    #[rstest]
    #[case(&[], Period::Monthly, 2026, 10)]
    #[case(&[("periodo", "weekly")], Period::Monthly, 2026, 10)]
    #[case(&[("mes", "13"), ("anio", "2024")], Period::Monthly, 2024, 12)]
    #[case(&[("mes", "-4")], Period::Monthly, 2026, 1)]
    #[case(&[("mes", "abc"), ("anio", "20x4")], Period::Monthly, 2026, 10)]
    #[case(&[("anio", "0")], Period::Monthly, 2026, 10)]
    #[case(&[("periodo", "mensual"), ("mes", " 3 ")], Period::Monthly, 2026, 3)]
    #[case(&[("mes", "3"), ("mes", "4")], Period::Monthly, 2026, 4)]
    #[case(&[("mes", "5"), ("dia", "9")], Period::Monthly, 2026, 5)]
    fn resolves_monthly_queries(
        #[case] pairs: &[(&str, &str)],
        #[case] period: Period,
        #[case] year: i32,
        #[case] month: u32,
    ) {
        let selection = PeriodSelection::from_query(&query(pairs), date(2026, 10, 17));
        assert_eq!(selection.period, period);
        assert_eq!(selection.year, year);
        assert_eq!(selection.month, month);
    }

    #[test]
    fn resolves_longer_periods() {
        let today = date(2026, 10, 17);

        let q = PeriodSelection::from_query(&query(&[("periodo", "quarterly"), ("trimestre", "9")]), today);
        assert_eq!((q.period, q.quarter), (Period::Quarterly, 4));

        let q = PeriodSelection::from_query(&query(&[("periodo", "trimestral")]), today);
        assert_eq!(q.quarter, 4);

        let h = PeriodSelection::from_query(&query(&[("periodo", "Semestral"), ("semestre", "x")]), today);
        assert_eq!((h.period, h.half), (Period::Semester, 2));

        let a = PeriodSelection::from_query(&query(&[("periodo", "anual"), ("anio", "2023")]), today);
        assert_eq!((a.period, a.year), (Period::Annual, 2023));
        assert_eq!(a.bounds().unwrap(), (date(2023, 1, 1), date(2023, 12, 31)));
        assert_eq!(a.title(), "2023");
        assert_eq!(Period::Annual.to_string(), "annual");
    }

    #[rstest]
    #[case(Period::Quarterly, 1, 1, (date(2024, 1, 1), date(2024, 3, 31)), "Q1 2024")]
    #[case(Period::Quarterly, 4, 1, (date(2024, 10, 1), date(2024, 12, 31)), "Q4 2024")]
    #[case(Period::Semester, 1, 1, (date(2024, 1, 1), date(2024, 6, 30)), "H1 2024")]
    #[case(Period::Semester, 1, 2, (date(2024, 7, 1), date(2024, 12, 31)), "H2 2024")]
    fn period_bounds_and_titles(
        #[case] period: Period,
        #[case] quarter: u32,
        #[case] half: u32,
        #[case] bounds: (NaiveDate, NaiveDate),
        #[case] title: &str,
    ) {
        let selection = PeriodSelection {
            period,
            year: 2024,
            month: 1,
            quarter,
            half,
        };
        assert_eq!(selection.bounds().unwrap(), bounds);
        assert_eq!(selection.title(), title);
    }

    #[test]
    fn leap_february_coverage_example() {
        let present = status(1, "P", 1);
        let employees: Vec<Employee> = (1..=5).map(|id| employee(id, "Lobo")).collect();
        let days = business_days_in_range(date(2024, 2, 1), date(2024, 2, 29));
        assert_eq!(days.len(), 21);

        let records: Vec<RecordWithStatus> = employees
            .iter()
            .flat_map(|e| days.iter().map(move |d| (e.id, *d)))
            .take(80)
            .map(|(id, d)| record(id, d, &present))
            .collect();

        let data = StatisticsData {
            employees,
            statuses: vec![present],
            records,
            first_record_date: Some(date(2024, 2, 1)),
        };
        let report = aggregate(monthly(2024, 2), date(2024, 3, 15), &data).unwrap();

        assert_eq!(report.business_days, 21);
        assert_eq!(report.total_records, 80);
        assert_eq!(report.possible_slots, 105);
        assert_eq!(report.coverage, 76.2);
        assert_eq!(report.title, "February 2024");
        assert!(report.monthly_trend.is_empty());
        assert_eq!(report.available_years, vec![2024]);
        assert_eq!(report.unrecorded_total, 25);
    }

    #[test]
    fn full_coverage_is_one_hundred() {
        let present = status(1, "P", 1);
        let employees = vec![employee(1, "A"), employee(2, "B")];
        let days = business_days_in_range(date(2024, 4, 1), date(2024, 4, 30));
        let records = employees
            .iter()
            .flat_map(|e| days.iter().map(move |d| (e.id, *d)))
            .map(|(id, d)| record(id, d, &present))
            .collect();

        let data = StatisticsData {
            employees,
            statuses: vec![present],
            records,
            first_record_date: None,
        };
        let report = aggregate(monthly(2024, 4), date(2024, 6, 1), &data).unwrap();

        assert_eq!(report.coverage, 100.0);
        assert!(report.employees.iter().all(|e| e.coverage == 100.0 && e.unrecorded == 0));
        assert_eq!(report.distribution.len(), 1);
        assert_eq!(report.distribution[0].percentage, 100.0);
    }

    #[test]
    fn no_employees_means_zero_coverage() {
        let report = aggregate(monthly(2024, 4), date(2024, 6, 1), &StatisticsData::default()).unwrap();
        assert_eq!(report.coverage, 0.0);
        assert_eq!(report.possible_slots, 0);
        assert_eq!(report.available_years, vec![2024]);
    }

    #[test]
    fn future_period_has_no_business_days() {
        let data = StatisticsData {
            employees: vec![employee(1, "A")],
            ..StatisticsData::default()
        };
        let report = aggregate(monthly(2024, 9), date(2024, 6, 1), &data).unwrap();

        assert_eq!(report.business_days, 0);
        assert_eq!(report.coverage, 0.0);
        assert_eq!(report.employees[0].coverage, 0.0);
        assert_eq!(report.employees[0].unrecorded, 0);
    }

    #[test]
    fn range_is_cut_at_today() {
        let present = status(1, "P", 1);
        let data = StatisticsData {
            employees: vec![employee(1, "A")],
            statuses: vec![present.clone()],
            records: vec![
                record(1, date(2024, 2, 14), &present),
                // after today, ignored
                record(1, date(2024, 2, 20), &present),
            ],
            first_record_date: Some(date(2024, 2, 14)),
        };
        let report = aggregate(monthly(2024, 2), date(2024, 2, 14), &data).unwrap();

        assert_eq!(report.effective_end, date(2024, 2, 14));
        assert_eq!(report.business_days, 10);
        assert_eq!(report.total_records, 1);
        assert_eq!(report.coverage, 10.0);
    }

    #[test]
    fn breaks_down_per_employee_and_status() {
        let present = status(1, "P", 1);
        let late = status(2, "TA", 5);
        let absent = status(3, "A", 2);
        let mut retired = status(4, "X", 9);
        retired.active = false;

        let data = StatisticsData {
            employees: vec![employee(1, "Alvarez"), employee(2, "Borquez"), employee(3, "Cruces")],
            statuses: vec![present.clone(), absent.clone(), late.clone()],
            records: vec![
                record(1, date(2024, 1, 2), &late),
                record(2, date(2024, 1, 2), &present),
                record(2, date(2024, 1, 3), &absent),
                record(2, date(2024, 1, 4), &retired),
                record(3, date(2024, 1, 2), &present),
                record(3, date(2024, 1, 3), &present),
                // inactive employee, not in the roster
                record(9, date(2024, 1, 2), &present),
            ],
            first_record_date: Some(date(2022, 5, 3)),
        };
        let report = aggregate(monthly(2024, 1), date(2024, 1, 5), &data).unwrap();

        // Jan 1-5 2024 is Mon-Fri.
        assert_eq!(report.business_days, 5);
        assert_eq!(report.total_records, 6);
        assert_eq!(report.coverage, percentage(6, 15));
        assert_eq!(report.available_years, vec![2022, 2023, 2024]);

        let codes: Vec<&str> = report.distribution.iter().map(|d| d.code.as_str()).collect();
        assert_eq!(codes, vec!["P", "A", "TA", "X"]);
        assert_eq!(report.distribution[0].count, 3);
        assert_eq!(report.distribution[0].percentage, 50.0);

        let order: Vec<u64> = report.employees.iter().map(|e| e.employee_id).collect();
        assert_eq!(order, vec![2, 3, 1]);

        let borquez = &report.employees[0];
        assert_eq!(borquez.recorded, 3);
        assert_eq!(borquez.unrecorded, 2);
        assert_eq!(borquez.coverage, 60.0);
        assert_eq!(
            borquez.counts,
            vec![
                StatusCount { code: "P".into(), count: 1 },
                StatusCount { code: "A".into(), count: 1 },
                StatusCount { code: "TA".into(), count: 0 },
            ]
        );
        assert_eq!(report.unrecorded_total, 2 + 3 + 4);
    }

    #[test]
    fn quarterly_trend_stops_at_today() {
        let present = status(1, "P", 1);
        let data = StatisticsData {
            employees: vec![employee(1, "A")],
            statuses: vec![present.clone()],
            records: vec![
                record(1, date(2024, 1, 2), &present),
                record(1, date(2024, 1, 3), &present),
                record(1, date(2024, 2, 5), &present),
            ],
            first_record_date: Some(date(2024, 1, 2)),
        };
        let selection = PeriodSelection {
            period: Period::Quarterly,
            year: 2024,
            month: 1,
            quarter: 1,
            half: 1,
        };
        let report = aggregate(selection, date(2024, 2, 14), &data).unwrap();

        assert_eq!(report.monthly_trend.len(), 2);

        let january = &report.monthly_trend[0];
        assert_eq!(january.label, "Jan 24");
        assert_eq!(january.business_days, 23);
        assert_eq!(january.records, 2);
        assert_eq!(january.coverage, percentage(2, 23));

        let february = &report.monthly_trend[1];
        assert_eq!((february.year, february.month), (2024, 2));
        assert_eq!(february.business_days, 10);
        assert_eq!(february.records, 1);
        assert_eq!(february.coverage, 10.0);
    }
}
