use crate::{
    error::{AppError, is_integrity_violation},
    model::attendance_status::AttendanceStatus,
};
use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

const STATUS_COLUMNS: &str =
    "id, code, description, background_color, text_color, sort_order, active";

/// Accepts `#RRGGBB`.
fn validate_hex_color(value: &str) -> Result<(), ValidationError> {
    let valid = value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit());

    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("hex_color"))
    }
}

#[derive(Deserialize, ToSchema, Validate)]
pub struct CreateStatus {
    #[validate(length(min = 1, max = 5))]
    #[schema(example = "TA")]
    pub code: String,
    #[validate(length(min = 1, max = 100))]
    #[schema(example = "Late with notice")]
    pub description: String,
    #[validate(custom(function = "validate_hex_color"))]
    #[schema(example = "#fff3cd")]
    pub background_color: Option<String>,
    #[validate(custom(function = "validate_hex_color"))]
    #[schema(example = "#856404")]
    pub text_color: Option<String>,
    #[schema(example = 5)]
    pub sort_order: Option<u32>,
    pub active: Option<bool>,
}

#[derive(Deserialize, ToSchema, Validate)]
pub struct UpdateStatus {
    #[validate(length(min = 1, max = 5))]
    pub code: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub description: Option<String>,
    #[validate(custom(function = "validate_hex_color"))]
    pub background_color: Option<String>,
    #[validate(custom(function = "validate_hex_color"))]
    pub text_color: Option<String>,
    pub sort_order: Option<u32>,
    pub active: Option<bool>,
}

impl UpdateStatus {
    fn apply_to(self, current: AttendanceStatus) -> AttendanceStatus {
        AttendanceStatus {
            id: current.id,
            code: self.code.map(|c| c.trim().to_string()).unwrap_or(current.code),
            description: self
                .description
                .map(|d| d.trim().to_string())
                .unwrap_or(current.description),
            background_color: self.background_color.unwrap_or(current.background_color),
            text_color: self.text_color.unwrap_or(current.text_color),
            sort_order: self.sort_order.unwrap_or(current.sort_order),
            active: self.active.unwrap_or(current.active),
        }
    }
}

fn duplicate_code(code: &str) -> AppError {
    AppError::Conflict(format!("A status with code \"{code}\" already exists"))
}

pub async fn fetch_status(pool: &MySqlPool, status_id: u64) -> Result<AttendanceStatus, AppError> {
    let sql = format!("SELECT {STATUS_COLUMNS} FROM attendance_statuses WHERE id = ?");

    sqlx::query_as::<_, AttendanceStatus>(&sql)
        .bind(status_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            error!(error = %e, status_id, "Failed to fetch status");
            AppError::Internal(e.to_string())
        })?
        .ok_or(AppError::NotFound("Status"))
}

/// Active statuses in display order.
pub async fn fetch_active_statuses(pool: &MySqlPool) -> Result<Vec<AttendanceStatus>, AppError> {
    let sql = format!(
        "SELECT {STATUS_COLUMNS} FROM attendance_statuses WHERE active = TRUE ORDER BY sort_order, code"
    );

    sqlx::query_as::<_, AttendanceStatus>(&sql)
        .fetch_all(pool)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to fetch active statuses");
            AppError::Internal(e.to_string())
        })
}

/// List Statuses
#[utoipa::path(
    get,
    path = "/api/status",
    responses(
        (status = 200, description = "All statuses ordered by sort order and code", body = [AttendanceStatus])
    ),
    tag = "Status",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_statuses(pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    let sql = format!("SELECT {STATUS_COLUMNS} FROM attendance_statuses ORDER BY sort_order, code");

    let statuses = sqlx::query_as::<_, AttendanceStatus>(&sql)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to list statuses");
            AppError::Internal(e.to_string())
        })?;

    Ok(HttpResponse::Ok().json(statuses))
}

/// Get Status by ID
#[utoipa::path(
    get,
    path = "/api/status/{status_id}",
    params(
        ("status_id" = u64, Path, description = "Status ID")
    ),
    responses(
        (status = 200, description = "Status found", body = AttendanceStatus),
        (status = 404, description = "Status not found")
    ),
    tag = "Status",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_status(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let status = fetch_status(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(status))
}

/// Create Status
#[utoipa::path(
    post,
    path = "/api/status",
    request_body = CreateStatus,
    responses(
        (status = 201, description = "Status created", body = AttendanceStatus),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Code already in use", body = Object, example = json!({
            "error": "A status with code \"P\" already exists"
        }))
    ),
    tag = "Status",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_status(
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateStatus>,
) -> actix_web::Result<impl Responder> {
    let mut payload = payload.into_inner();
    payload.code = payload.code.trim().to_string();
    payload.description = payload.description.trim().to_string();
    payload.validate().map_err(AppError::from)?;

    let result = sqlx::query(
        r#"
        INSERT INTO attendance_statuses
            (code, description, background_color, text_color, sort_order, active)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&payload.code)
    .bind(&payload.description)
    .bind(payload.background_color.as_deref().unwrap_or("#FFFFFF"))
    .bind(payload.text_color.as_deref().unwrap_or("#000000"))
    .bind(payload.sort_order.unwrap_or(0))
    .bind(payload.active.unwrap_or(true))
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        if is_integrity_violation(&e) {
            return duplicate_code(&payload.code);
        }
        error!(error = %e, "Failed to create status");
        AppError::Internal(e.to_string())
    })?;

    let status = fetch_status(pool.get_ref(), result.last_insert_id()).await?;
    info!(status_id = status.id, code = %status.code, "Status created");

    Ok(HttpResponse::Created().json(status))
}

/// Update Status
#[utoipa::path(
    put,
    path = "/api/status/{status_id}",
    params(
        ("status_id" = u64, Path, description = "Status ID")
    ),
    request_body = UpdateStatus,
    responses(
        (status = 200, description = "Status updated", body = AttendanceStatus),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Status not found"),
        (status = 409, description = "Code already in use")
    ),
    tag = "Status",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_status(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateStatus>,
) -> actix_web::Result<impl Responder> {
    let status_id = path.into_inner();
    let payload = payload.into_inner();
    payload.validate().map_err(AppError::from)?;

    let current = fetch_status(pool.get_ref(), status_id).await?;
    let updated = payload.apply_to(current);
    // Trimming can empty a code that passed the length check.
    if updated.code.is_empty() || updated.description.is_empty() {
        return Err(AppError::Validation("code and description must not be blank".to_string()).into());
    }

    sqlx::query(
        r#"
        UPDATE attendance_statuses
        SET code = ?, description = ?, background_color = ?, text_color = ?, sort_order = ?, active = ?
        WHERE id = ?
        "#,
    )
    .bind(&updated.code)
    .bind(&updated.description)
    .bind(&updated.background_color)
    .bind(&updated.text_color)
    .bind(updated.sort_order)
    .bind(updated.active)
    .bind(status_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        if is_integrity_violation(&e) {
            return duplicate_code(&updated.code);
        }
        error!(error = %e, status_id, "Failed to update status");
        AppError::Internal(e.to_string())
    })?;

    Ok(HttpResponse::Ok().json(updated))
}

fn status_in_use(status: &AttendanceStatus) -> AppError {
    AppError::Conflict(format!(
        "Status \"{} - {}\" cannot be deleted because attendance records reference it. \
         Deactivate it instead.",
        status.code, status.description
    ))
}

/// Delete Status
///
/// Rejected while any attendance record points at the status.
#[utoipa::path(
    delete,
    path = "/api/status/{status_id}",
    params(
        ("status_id" = u64, Path, description = "Status ID")
    ),
    responses(
        (status = 200, description = "Status deleted", body = Object, example = json!({
            "message": "Status \"TS - Late without notice\" deleted"
        })),
        (status = 404, description = "Status not found"),
        (status = 409, description = "Status referenced by attendance records")
    ),
    tag = "Status",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_status(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let status_id = path.into_inner();
    let status = fetch_status(pool.get_ref(), status_id).await?;

    let references =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM attendance_records WHERE status_id = ?")
            .bind(status_id)
            .fetch_one(pool.get_ref())
            .await
            .map_err(|e| {
                error!(error = %e, status_id, "Failed to count status references");
                AppError::Internal(e.to_string())
            })?;

    if references > 0 {
        info!(status_id, references, "Refusing to delete referenced status");
        return Err(status_in_use(&status).into());
    }

    sqlx::query("DELETE FROM attendance_statuses WHERE id = ?")
        .bind(status_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            // a record may have been saved since the count
            if is_integrity_violation(&e) {
                return status_in_use(&status);
            }
            error!(error = %e, status_id, "Failed to delete status");
            AppError::Internal(e.to_string())
        })?;

    info!(status_id, code = %status.code, "Status deleted");

    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Status \"{} - {}\" deleted", status.code, status.description)
    })))
}
