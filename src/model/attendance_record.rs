use chrono::NaiveDate;
use serde::Serialize;

use crate::model::attendance_status::AttendanceStatus;

/// Natural key of an attendance record.
pub type RecordKey = (u64, NaiveDate);

/// One attendance record joined with its status.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RecordWithStatus {
    pub employee_id: u64,
    pub date: NaiveDate,
    pub note: String,
    pub status_id: u64,
    pub status_code: String,
    pub status_description: String,
    pub status_background_color: String,
    pub status_text_color: String,
    pub status_sort_order: u32,
    pub status_active: bool,
}

impl RecordWithStatus {
    pub fn key(&self) -> RecordKey {
        (self.employee_id, self.date)
    }

    pub fn status(&self) -> AttendanceStatus {
        AttendanceStatus {
            id: self.status_id,
            code: self.status_code.clone(),
            description: self.status_description.clone(),
            background_color: self.status_background_color.clone(),
            text_color: self.status_text_color.clone(),
            sort_order: self.status_sort_order,
            active: self.status_active,
        }
    }
}

/// Columns selected by [`RecordWithStatus`]; callers append their own
/// `WHERE` clause.
pub const RECORD_WITH_STATUS_SQL: &str = r#"
    SELECT
        r.employee_id,
        r.date,
        r.note,
        s.id AS status_id,
        s.code AS status_code,
        s.description AS status_description,
        s.background_color AS status_background_color,
        s.text_color AS status_text_color,
        s.sort_order AS status_sort_order,
        s.active AS status_active
    FROM attendance_records r
    JOIN attendance_statuses s ON s.id = r.status_id
"#;
