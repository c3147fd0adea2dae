use crate::{
    api::{attendance_status::fetch_active_statuses, employee::fetch_active_employees},
    auth::auth::AuthUser,
    config::Config,
    error::AppError,
    model::attendance_record::{RECORD_WITH_STATUS_SQL, RecordWithStatus},
    service::{
        batch::{MySqlRecordWriter, SaveAttendanceRequest, save_batch},
        grid::{GridLayout, build_grid, index_records},
    },
};
use actix_web::{HttpResponse, Responder, http::header, web};
use chrono::{Datelike, Local, NaiveDate};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info};

/// `semana` is the historical parameter name; `week` is accepted as well.
#[derive(Debug, Default)]
pub struct GridQuery {
    pub semana: Option<String>,
    pub week: Option<String>,
}

impl GridQuery {
    /// A repeated key keeps its last value; unknown keys are ignored.
    fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut query = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "semana" => query.semana = Some(value),
                "week" => query.week = Some(value),
                _ => {}
            }
        }
        query
    }

    /// Week index, if one was given as plain digits.
    fn week_index(&self) -> Option<usize> {
        let raw = self.semana.as_deref().or(self.week.as_deref())?.trim();
        if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        raw.parse().ok()
    }
}

fn current_month_location(config: &Config) -> String {
    let today = Local::now().date_naive();
    format!("{}/attendance/{}/{}", config.api_prefix, today.year(), today.month())
}

/// Year and month as typed in the URL; anything that is not a number in
/// range yields `None`.
fn parse_year_month(year: &str, month: &str) -> Option<(i32, u32)> {
    Some((year.trim().parse().ok()?, month.trim().parse().ok()?))
}

fn redirect_to(location: String) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location))
        .finish()
}

/// Records of any employee within `[start, end]`.
pub async fn fetch_records_between(
    pool: &MySqlPool,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<RecordWithStatus>, AppError> {
    let sql = format!("{RECORD_WITH_STATUS_SQL} WHERE r.date BETWEEN ? AND ?");

    sqlx::query_as::<_, RecordWithStatus>(&sql)
        .bind(start)
        .bind(end)
        .fetch_all(pool)
        .await
        .map_err(|e| {
            error!(error = %e, %start, %end, "Failed to fetch attendance records");
            AppError::Internal(e.to_string())
        })
}

/// Current Month Grid
#[utoipa::path(
    get,
    path = "/api/attendance",
    responses(
        (status = 302, description = "Redirects to the current month's grid")
    ),
    tag = "Attendance",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn redirect_to_current_month(config: web::Data<Config>) -> impl Responder {
    redirect_to(current_month_location(&config))
}

/// Monthly Attendance Grid
///
/// Active employees against the business days of the month, or of one ISO
/// week when `semana` selects it.
#[utoipa::path(
    get,
    path = "/api/attendance/{year}/{month}",
    params(
        ("year" = i32, Path, description = "Year", example = 2024),
        ("month" = u32, Path, description = "Month (1-12)", example = 2),
        ("semana" = Option<usize>, Query, description = "Week index within the month; out of range shows the whole month"),
        ("week" = Option<usize>, Query, description = "Alias of semana")
    ),
    responses(
        (status = 200, description = "Attendance grid", body = crate::service::grid::AttendanceGrid),
        (status = 302, description = "Invalid year or month, redirects to the current month")
    ),
    tag = "Attendance",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn attendance_grid(
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<(String, String)>,
    query: web::Query<Vec<(String, String)>>,
) -> actix_web::Result<HttpResponse> {
    let (raw_year, raw_month) = path.into_inner();
    let query = GridQuery::from_pairs(query.into_inner());

    let Some((year, month)) = parse_year_month(&raw_year, &raw_month) else {
        debug!(year = %raw_year, month = %raw_month, "Unparseable grid month, redirecting");
        return Ok(redirect_to(current_month_location(&config)));
    };

    let layout = match GridLayout::for_month(year, month, query.week_index()) {
        Ok(layout) => layout,
        Err(e) => {
            debug!(error = %e, "Invalid grid month, redirecting");
            return Ok(redirect_to(current_month_location(&config)));
        }
    };

    let employees = fetch_active_employees(pool.get_ref()).await?;
    let statuses = fetch_active_statuses(pool.get_ref()).await?;
    let records = match layout.visible_range() {
        Some((start, end)) => fetch_records_between(pool.get_ref(), start, end).await?,
        None => Vec::new(),
    };

    let today = Local::now().date_naive();
    let grid = build_grid(&layout, today, &employees, statuses, &index_records(&records));

    Ok(HttpResponse::Ok().json(grid))
}

/// Save Attendance Batch
///
/// All entries are written in one transaction. An entry without a status
/// removes the record for that employee and date.
#[utoipa::path(
    post,
    path = "/api/attendance/save",
    request_body(content = Object, description = "Batch of grid cells", example = json!({
        "registros": [
            {"empleado_id": 1, "fecha": "2024-02-05", "estado_id": 1, "observaciones": ""},
            {"empleado_id": 2, "fecha": "2024-02-05", "estado_id": null}
        ]
    })),
    responses(
        (status = 200, description = "Batch committed", body = Object, example = json!({"success": true})),
        (status = 400, description = "Invalid entry or unknown employee/status, nothing saved", body = Object, example = json!({
            "error": "Invalid date \"2024-13-01\" for employee 1, expected YYYY-MM-DD"
        })),
        (status = 500, description = "Database unavailable, nothing saved")
    ),
    tag = "Attendance",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn save_attendance(
    pool: web::Data<MySqlPool>,
    payload: web::Json<SaveAttendanceRequest>,
    user: AuthUser,
) -> actix_web::Result<impl Responder> {
    let summary = save_batch(MySqlRecordWriter::begin(pool.get_ref()), &payload.entries).await?;

    info!(
        user_id = user.user_id,
        username = %user.username,
        upserted = summary.upserted,
        deleted = summary.deleted,
        skipped = summary.skipped,
        "Attendance batch saved"
    );

    Ok(HttpResponse::Ok().json(json!({"success": true})))
}
