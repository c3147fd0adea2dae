//! Transactional save of the cells edited in the attendance grid.

use std::future::Future;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{MySql, MySqlPool, Transaction};
use utoipa::ToSchema;

use crate::error::{AppError, is_integrity_violation};
use crate::model::attendance_record::RecordKey;

pub const MAX_NOTE_CHARS: usize = 255;

#[derive(Debug, Deserialize, ToSchema)]
#[schema(example = json!({
    "registros": [
        {"empleado_id": 3, "fecha": "2024-02-05", "estado_id": 1, "observaciones": ""},
        {"empleado_id": 3, "fecha": "2024-02-06", "estado_id": null}
    ]
}))]
pub struct SaveAttendanceRequest {
    #[serde(rename = "registros", default)]
    pub entries: Vec<SaveEntry>,
}

/// One edited cell. A missing status clears the cell.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct SaveEntry {
    #[serde(rename = "empleado_id", default)]
    pub employee_id: Option<u64>,
    #[serde(rename = "fecha", default)]
    #[schema(example = "2024-02-05", format = "date")]
    pub date: Option<String>,
    #[serde(rename = "estado_id", default)]
    pub status_id: Option<u64>,
    #[serde(rename = "observaciones", default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Upsert {
        key: RecordKey,
        status_id: u64,
        note: String,
    },
    Delete {
        key: RecordKey,
    },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub upserted: usize,
    pub deleted: usize,
    pub skipped: usize,
}

/// Turns the submitted entries into write operations.
///
/// Entries without an employee or a date are skipped. A malformed date or an
/// oversized note rejects the whole batch before anything is written.
pub fn plan(entries: &[SaveEntry]) -> Result<(Vec<BatchOp>, usize), AppError> {
    let mut ops = Vec::with_capacity(entries.len());
    let mut skipped = 0;

    for entry in entries {
        let (Some(employee_id), Some(raw_date)) = (
            entry.employee_id.filter(|id| *id != 0),
            entry.date.as_deref().map(str::trim).filter(|d| !d.is_empty()),
        ) else {
            skipped += 1;
            continue;
        };

        let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d").map_err(|_| {
            AppError::BadRequest(format!(
                "Invalid date \"{raw_date}\" for employee {employee_id}, expected YYYY-MM-DD"
            ))
        })?;
        let key = (employee_id, date);

        match entry.status_id.filter(|id| *id != 0) {
            Some(status_id) => {
                let note = entry.note.clone().unwrap_or_default();
                if note.chars().count() > MAX_NOTE_CHARS {
                    return Err(AppError::BadRequest(format!(
                        "Note for employee {employee_id} on {date} exceeds {MAX_NOTE_CHARS} characters"
                    )));
                }
                ops.push(BatchOp::Upsert {
                    key,
                    status_id,
                    note,
                });
            }
            None => ops.push(BatchOp::Delete { key }),
        }
    }

    Ok((ops, skipped))
}

/// Storage seam for [`save_batch`]; one writer spans one transaction and is
/// consumed by `commit` or `rollback`.
pub(crate) trait RecordWriter: Sized {
    async fn upsert(&mut self, key: RecordKey, status_id: u64, note: &str) -> Result<(), AppError>;

    /// Deleting a key with no record is not an error.
    async fn delete(&mut self, key: RecordKey) -> Result<bool, AppError>;

    async fn commit(self) -> Result<(), AppError>;

    /// Failures are logged, the original error is what the caller reports.
    async fn rollback(self);
}

/// Applies operations in order, stopping at the first failure.
pub(crate) async fn apply<W: RecordWriter>(
    writer: &mut W,
    ops: &[BatchOp],
) -> Result<BatchSummary, AppError> {
    let mut summary = BatchSummary::default();

    for op in ops {
        match op {
            BatchOp::Upsert {
                key,
                status_id,
                note,
            } => {
                writer.upsert(*key, *status_id, note).await?;
                summary.upserted += 1;
            }
            BatchOp::Delete { key } => {
                if writer.delete(*key).await? {
                    summary.deleted += 1;
                }
            }
        }
    }

    Ok(summary)
}

pub struct MySqlRecordWriter<'c> {
    tx: Transaction<'c, MySql>,
}

impl MySqlRecordWriter<'static> {
    pub async fn begin(pool: &MySqlPool) -> Result<Self, AppError> {
        let tx = pool.begin().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to open attendance transaction");
            AppError::Internal(e.to_string())
        })?;
        Ok(Self { tx })
    }
}

impl RecordWriter for MySqlRecordWriter<'_> {
    async fn commit(self) -> Result<(), AppError> {
        self.tx.commit().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to commit attendance transaction");
            AppError::Internal(e.to_string())
        })
    }

    async fn rollback(self) {
        if let Err(e) = self.tx.rollback().await {
            tracing::warn!(error = %e, "Rollback of attendance transaction failed");
        }
    }

    async fn upsert(&mut self, key: RecordKey, status_id: u64, note: &str) -> Result<(), AppError> {
        let (employee_id, date) = key;

        sqlx::query(
            r#"
            INSERT INTO attendance_records (employee_id, date, status_id, note)
            VALUES (?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                status_id = VALUES(status_id),
                note = VALUES(note)
            "#,
        )
        .bind(employee_id)
        .bind(date)
        .bind(status_id)
        .bind(note)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            if is_integrity_violation(&e) {
                return AppError::BadRequest(format!(
                    "Employee {employee_id} or status {status_id} does not exist"
                ));
            }
            tracing::error!(error = %e, employee_id, %date, "Attendance upsert failed");
            AppError::Internal(e.to_string())
        })?;

        Ok(())
    }

    async fn delete(&mut self, key: RecordKey) -> Result<bool, AppError> {
        let (employee_id, date) = key;

        let result = sqlx::query("DELETE FROM attendance_records WHERE employee_id = ? AND date = ?")
            .bind(employee_id)
            .bind(date)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, employee_id, %date, "Attendance delete failed");
                AppError::Internal(e.to_string())
            })?;

        Ok(result.rows_affected() > 0)
    }
}

/// Validates and applies a batch in one transaction. Either every entry is
/// stored or none is.
///
/// `begin` opens the transaction; it is only awaited once the whole batch
/// has passed validation.
pub(crate) async fn save_batch<W, B>(begin: B, entries: &[SaveEntry]) -> Result<BatchSummary, AppError>
where
    W: RecordWriter,
    B: Future<Output = Result<W, AppError>>,
{
    let (ops, skipped) = plan(entries)?;

    let mut writer = begin.await?;
    match apply(&mut writer, &ops).await {
        Ok(summary) => {
            writer.commit().await?;
            Ok(BatchSummary { skipped, ..summary })
        }
        Err(e) => {
            writer.rollback().await;
            Err(e)
        }
    }
}
