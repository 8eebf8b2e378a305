use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TemplateRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub original_filename: String,
    /// Content-addressed blob key; several rows may share one.
    pub storage_key: String,
    pub size_bytes: i64,
    /// Placeholder names found at upload time, sorted.
    pub placeholders: Vec<String>,
    pub created_at: DateTime<Utc>,
}
