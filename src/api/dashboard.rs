use crate::{error::AppError, utils::calendar::month_name};
use actix_web::{HttpResponse, Responder, web};
use chrono::{Datelike, Local, NaiveDate};
use serde::Serialize;
use sqlx::MySqlPool;
use tracing::error;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardSummary {
    #[schema(example = 12)]
    pub active_employees: i64,
    #[schema(example = 6)]
    pub active_statuses: i64,
    #[schema(value_type = String, format = "date")]
    pub today: NaiveDate,
    pub year: i32,
    pub month: u32,
    #[schema(example = "February")]
    pub month_name: String,
}

async fn count(pool: &MySqlPool, sql: &str) -> Result<i64, AppError> {
    sqlx::query_scalar::<_, i64>(sql)
        .fetch_one(pool)
        .await
        .map_err(|e| {
            error!(error = %e, sql, "Dashboard count failed");
            AppError::Internal(e.to_string())
        })
}

/// Dashboard
#[utoipa::path(
    get,
    path = "/api/dashboard",
    responses(
        (status = 200, description = "Dashboard counters", body = DashboardSummary)
    ),
    tag = "Dashboard",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn dashboard(pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    let active_employees =
        count(pool.get_ref(), "SELECT COUNT(*) FROM employees WHERE active = TRUE").await?;
    let active_statuses =
        count(pool.get_ref(), "SELECT COUNT(*) FROM attendance_statuses WHERE active = TRUE").await?;

    let today = Local::now().date_naive();

    Ok(HttpResponse::Ok().json(DashboardSummary {
        active_employees,
        active_statuses,
        today,
        year: today.year(),
        month: today.month(),
        month_name: month_name(today.month()).to_string(),
    }))
}
