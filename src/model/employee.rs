use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "first_name": "Lorena",
        "last_name": "Carrizo",
        "active": true,
        "created_on": "2024-01-08",
        "notes": ""
    })
)]
pub struct Employee {
    #[schema(example = 1)]
    pub id: u64,

    #[schema(example = "Lorena")]
    pub first_name: String,

    #[schema(example = "Carrizo")]
    pub last_name: String,

    #[schema(example = true)]
    pub active: bool,

    #[schema(
        example = "2024-01-08",
        value_type = String,
        format = "date"
    )]
    pub created_on: NaiveDate,

    #[schema(example = "")]
    pub notes: String,
}

impl Employee {
    /// "Last, First", the way the roster is sorted and shown.
    pub fn display_name(&self) -> String {
        format!("{}, {}", self.last_name, self.first_name)
    }
}
