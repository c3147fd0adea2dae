use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "code": "P",
        "description": "Present",
        "background_color": "#d4edda",
        "text_color": "#155724",
        "sort_order": 1,
        "active": true
    })
)]
pub struct AttendanceStatus {
    pub id: u64,
    pub code: String,
    pub description: String,
    pub background_color: String,
    pub text_color: String,
    pub sort_order: u32,
    pub active: bool,
}

impl AttendanceStatus {
    pub fn badge(&self) -> StatusBadge {
        StatusBadge {
            id: self.id,
            code: self.code.clone(),
            description: self.description.clone(),
            background_color: self.background_color.clone(),
            text_color: self.text_color.clone(),
        }
    }
}

/// What a grid cell needs to paint a status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct StatusBadge {
    pub id: u64,
    pub code: String,
    pub description: String,
    pub background_color: String,
    pub text_color: String,
}
