use crate::{error::AppError, model::employee::Employee};
use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info};
use utoipa::ToSchema;
use validator::Validate;

const EMPLOYEE_COLUMNS: &str = "id, first_name, last_name, active, created_on, notes";

#[derive(Deserialize, ToSchema, Validate)]
pub struct CreateEmployee {
    #[validate(length(min = 1, max = 100))]
    #[schema(example = "Lautaro")]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    #[schema(example = "Lobo")]
    pub last_name: String,
    #[schema(example = "Night shift")]
    pub notes: Option<String>,
}

impl CreateEmployee {
    fn normalized(self) -> Self {
        Self {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            notes: self.notes.map(|n| n.trim().to_string()),
        }
    }
}

#[derive(Deserialize, ToSchema, Validate)]
pub struct UpdateEmployee {
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub last_name: Option<String>,
    pub notes: Option<String>,
}

impl UpdateEmployee {
    fn normalized(self) -> Self {
        Self {
            first_name: self.first_name.map(|n| n.trim().to_string()),
            last_name: self.last_name.map(|n| n.trim().to_string()),
            notes: self.notes.map(|n| n.trim().to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EmployeeQuery {
    pub active: Option<bool>,
}

pub async fn fetch_employee(pool: &MySqlPool, employee_id: u64) -> Result<Employee, AppError> {
    let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?");

    sqlx::query_as::<_, Employee>(&sql)
        .bind(employee_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            error!(error = %e, employee_id, "Failed to fetch employee");
            AppError::Internal(e.to_string())
        })?
        .ok_or(AppError::NotFound("Employee"))
}

/// Active employees in roster order (last name, first name).
pub async fn fetch_active_employees(pool: &MySqlPool) -> Result<Vec<Employee>, AppError> {
    let sql = format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE active = TRUE ORDER BY last_name, first_name, id"
    );

    sqlx::query_as::<_, Employee>(&sql)
        .fetch_all(pool)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to fetch active employees");
            AppError::Internal(e.to_string())
        })
}

/// List Employees
#[utoipa::path(
    get,
    path = "/api/employee",
    params(
        ("active" = Option<bool>, Query, description = "Only active (true) or inactive (false) employees")
    ),
    responses(
        (status = 200, description = "Employees ordered by last and first name", body = [Employee])
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_employees(
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> actix_web::Result<impl Responder> {
    let where_clause = match query.active {
        Some(true) => "WHERE active = TRUE",
        Some(false) => "WHERE active = FALSE",
        None => "",
    };
    let sql = format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employees {where_clause} ORDER BY last_name, first_name, id"
    );
    debug!(sql = %sql, "Listing employees");

    let employees = sqlx::query_as::<_, Employee>(&sql)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, sql = %sql, "Failed to list employees");
            AppError::Internal(e.to_string())
        })?;

    Ok(HttpResponse::Ok().json(employees))
}

/// Get Employee by ID
#[utoipa::path(
    get,
    path = "/api/employee/{employee_id}",
    params(
        ("employee_id" = u64, Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "error": "Employee not found"
        }))
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_employee(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let employee = fetch_employee(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(employee))
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/api/employee",
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee created", body = Object, example = json!({
            "message": "Employee created successfully",
            "id": 14
        })),
        (status = 400, description = "Validation failed")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_employee(
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateEmployee>,
) -> actix_web::Result<impl Responder> {
    let payload = payload.into_inner().normalized();
    payload.validate().map_err(AppError::from)?;

    let result = sqlx::query(
        r#"
        INSERT INTO employees (first_name, last_name, active, created_on, notes)
        VALUES (?, ?, TRUE, CURDATE(), ?)
        "#,
    )
    .bind(&payload.first_name)
    .bind(&payload.last_name)
    .bind(payload.notes.as_deref().unwrap_or_default())
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to create employee");
        AppError::Internal(e.to_string())
    })?;

    let id = result.last_insert_id();
    info!(employee_id = id, "Employee created");

    Ok(HttpResponse::Created().json(json!({
        "message": "Employee created successfully",
        "id": id
    })))
}

/// Update Employee
#[utoipa::path(
    put,
    path = "/api/employee/{employee_id}",
    params(
        ("employee_id" = u64, Path, description = "Employee ID")
    ),
    request_body = UpdateEmployee,
    responses(
        (status = 200, description = "Employee updated", body = Employee),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_employee(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateEmployee>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    let payload = payload.into_inner().normalized();
    payload.validate().map_err(AppError::from)?;

    let current = fetch_employee(pool.get_ref(), employee_id).await?;

    sqlx::query("UPDATE employees SET first_name = ?, last_name = ?, notes = ? WHERE id = ?")
        .bind(payload.first_name.unwrap_or(current.first_name))
        .bind(payload.last_name.unwrap_or(current.last_name))
        .bind(payload.notes.unwrap_or(current.notes))
        .bind(employee_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, employee_id, "Failed to update employee");
            AppError::Internal(e.to_string())
        })?;

    let updated = fetch_employee(pool.get_ref(), employee_id).await?;
    Ok(HttpResponse::Ok().json(updated))
}

async fn set_active(pool: &MySqlPool, employee_id: u64, active: bool) -> Result<Employee, AppError> {
    let employee = fetch_employee(pool, employee_id).await?;

    sqlx::query("UPDATE employees SET active = ? WHERE id = ?")
        .bind(active)
        .bind(employee_id)
        .execute(pool)
        .await
        .map_err(|e| {
            error!(error = %e, employee_id, active, "Failed to change employee state");
            AppError::Internal(e.to_string())
        })?;

    info!(employee_id, active, "Employee state changed");
    Ok(Employee { active, ..employee })
}

/// Deactivate Employee
///
/// Employees are never hard-deleted so their attendance history survives.
#[utoipa::path(
    delete,
    path = "/api/employee/{employee_id}",
    params(
        ("employee_id" = u64, Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Employee deactivated", body = Object, example = json!({
            "message": "Employee \"Lobo, Lautaro\" deactivated"
        })),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn deactivate_employee(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let employee = set_active(pool.get_ref(), path.into_inner(), false).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Employee \"{}\" deactivated", employee.display_name())
    })))
}

/// Reactivate Employee
#[utoipa::path(
    post,
    path = "/api/employee/{employee_id}/activate",
    params(
        ("employee_id" = u64, Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Employee reactivated", body = Object, example = json!({
            "message": "Employee \"Lobo, Lautaro\" reactivated"
        })),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn activate_employee(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let employee = set_active(pool.get_ref(), path.into_inner(), true).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Employee \"{}\" reactivated", employee.display_name())
    })))
}
