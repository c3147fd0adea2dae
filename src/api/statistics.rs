use crate::{
    api::{attendance_status::fetch_active_statuses, employee::fetch_active_employees},
    error::AppError,
    model::attendance_record::{RECORD_WITH_STATUS_SQL, RecordWithStatus},
    service::statistics::{PeriodSelection, StatisticsData, StatisticsQuery, aggregate},
};
use actix_web::{HttpResponse, Responder, web};
use chrono::{Local, NaiveDate};
use sqlx::MySqlPool;
use tracing::{debug, error};

async fn fetch_active_records_between(
    pool: &MySqlPool,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<RecordWithStatus>, AppError> {
    let sql = format!(
        "{RECORD_WITH_STATUS_SQL} JOIN employees e ON e.id = r.employee_id \
         WHERE e.active = TRUE AND r.date BETWEEN ? AND ?"
    );

    sqlx::query_as::<_, RecordWithStatus>(&sql)
        .bind(start)
        .bind(end)
        .fetch_all(pool)
        .await
        .map_err(|e| {
            error!(error = %e, %start, %end, "Failed to fetch records for statistics");
            AppError::Internal(e.to_string())
        })
}

async fn fetch_first_record_date(pool: &MySqlPool) -> Result<Option<NaiveDate>, AppError> {
    sqlx::query_scalar::<_, Option<NaiveDate>>("SELECT MIN(date) FROM attendance_records")
        .fetch_one(pool)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to fetch first record date");
            AppError::Internal(e.to_string())
        })
}

/// Attendance Statistics
///
/// Coverage, status distribution and per-employee breakdown for a month,
/// quarter, half-year or year. Malformed parameters fall back to the current
/// period instead of failing.
#[utoipa::path(
    get,
    path = "/api/statistics",
    params(
        ("periodo" = Option<String>, Query, description = "monthly | quarterly | semester | annual (mensual, trimestral, semestral, anual also accepted)"),
        ("anio" = Option<i32>, Query, description = "Year, defaults to the current one"),
        ("mes" = Option<u32>, Query, description = "Month 1-12, monthly period only"),
        ("trimestre" = Option<u32>, Query, description = "Quarter 1-4, quarterly period only"),
        ("semestre" = Option<u32>, Query, description = "Half 1-2, semester period only")
    ),
    responses(
        (status = 200, description = "Statistics report", body = crate::service::statistics::StatisticsReport)
    ),
    tag = "Statistics",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn statistics(
    pool: web::Data<MySqlPool>,
    query: web::Query<Vec<(String, String)>>,
) -> actix_web::Result<impl Responder> {
    let today = Local::now().date_naive();
    let query = StatisticsQuery::from_pairs(query.into_inner());
    let selection = PeriodSelection::from_query(&query, today);
    debug!(?selection, "Computing statistics");

    let (start, end) = selection
        .bounds()
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let effective_end = end.min(today);

    let employees = fetch_active_employees(pool.get_ref()).await?;
    let statuses = fetch_active_statuses(pool.get_ref()).await?;
    // A period that starts in the future has nothing to load.
    let records = if start <= effective_end {
        fetch_active_records_between(pool.get_ref(), start, effective_end).await?
    } else {
        Vec::new()
    };
    let first_record_date = fetch_first_record_date(pool.get_ref()).await?;

    let data = StatisticsData {
        employees,
        statuses,
        records,
        first_record_date,
    };
    let report = aggregate(selection, today, &data).map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(HttpResponse::Ok().json(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::statistics::Period;
    use chrono::Datelike;

    #[test]
    fn repeated_parameters_fall_back_to_the_last_value() {
        let pairs = web::Query::<Vec<(String, String)>>::from_query(
            "periodo=trimestral&trimestre=1&trimestre=3&anio=abc&anio=2024",
        )
        .unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();

        let selection = PeriodSelection::from_query(&StatisticsQuery::from_pairs(pairs.into_inner()), today);

        assert_eq!(selection.period, Period::Quarterly);
        assert_eq!(selection.quarter, 3);
        assert_eq!(selection.year, 2024);
    }

    #[test]
    fn duplicated_month_still_resolves() {
        let pairs = web::Query::<Vec<(String, String)>>::from_query("periodo=mensual&mes=3&mes=4").unwrap();
        let today = Local::now().date_naive();

        let selection = PeriodSelection::from_query(&StatisticsQuery::from_pairs(pairs.into_inner()), today);

        assert_eq!(selection.month, 4);
        assert_eq!(selection.year, today.year());
    }
}
