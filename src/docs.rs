use crate::api::attendance_status::{CreateStatus, UpdateStatus};
use crate::api::dashboard::DashboardSummary;
use crate::api::employee::{CreateEmployee, UpdateEmployee};
use crate::model::attendance_status::{AttendanceStatus, StatusBadge};
use crate::model::employee::Employee;
use crate::models::{LoginReqDto, LoginResponse};
use crate::service::grid::{AttendanceGrid, GridCell, GridColumn, GridRow, MonthRef, WeekOption};
use crate::service::statistics::{
    EmployeeStats, MonthTrend, Period, PeriodSelection, StatisticsReport, StatusCount, StatusShare,
};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Attendance API",
        version = "1.0.0",
        description = r#"
## Daily Attendance Tracking

Records one status per employee per business day and reports on it.

### Features
- **Attendance grid**: employees against the business days of a month, or of one ISO week
- **Batch save**: every edited cell of the grid in one all-or-nothing request
- **Statistics**: coverage, status distribution and per-employee breakdown by month, quarter, half-year or year
- **Employees and statuses**: catalog management; employees are deactivated, never deleted

### Security
Every endpoint except `/auth/login` expects a **JWT Bearer** token.

### Errors
Failures answer `{"error": "<message>"}` with the matching status code.
"#,
    ),
    paths(
        crate::auth::handlers::login,

        crate::api::dashboard::dashboard,

        crate::api::employee::list_employees,
        crate::api::employee::get_employee,
        crate::api::employee::create_employee,
        crate::api::employee::update_employee,
        crate::api::employee::deactivate_employee,
        crate::api::employee::activate_employee,

        crate::api::attendance_status::list_statuses,
        crate::api::attendance_status::get_status,
        crate::api::attendance_status::create_status,
        crate::api::attendance_status::update_status,
        crate::api::attendance_status::delete_status,

        crate::api::attendance::redirect_to_current_month,
        crate::api::attendance::attendance_grid,
        crate::api::attendance::save_attendance,

        crate::api::statistics::statistics
    ),
    components(
        schemas(
            LoginReqDto,
            LoginResponse,
            DashboardSummary,
            Employee,
            CreateEmployee,
            UpdateEmployee,
            AttendanceStatus,
            StatusBadge,
            CreateStatus,
            UpdateStatus,
            AttendanceGrid,
            GridColumn,
            GridRow,
            GridCell,
            WeekOption,
            MonthRef,
            Period,
            PeriodSelection,
            StatisticsReport,
            StatusShare,
            StatusCount,
            EmployeeStats,
            MonthTrend
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login"),
        (name = "Dashboard", description = "Landing page counters"),
        (name = "Employee", description = "Employee management APIs"),
        (name = "Status", description = "Attendance status catalog"),
        (name = "Attendance", description = "Monthly grid and batch save"),
        (name = "Statistics", description = "Coverage statistics"),
    )
)]
pub struct ApiDoc;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route_and_the_bearer_scheme() {
        let doc = ApiDoc::openapi();

        for path in [
            "/auth/login",
            "/api/dashboard",
            "/api/employee/{employee_id}/activate",
            "/api/status/{status_id}",
            "/api/attendance/{year}/{month}",
            "/api/attendance/save",
            "/api/statistics",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path}");
        }

        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
