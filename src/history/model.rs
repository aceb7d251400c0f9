//! History record model and its API view

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// A row from the `prompt_history` table. Never updated after insert.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct HistoryRecord {
    pub id: Uuid,
    pub owner: Option<String>,
    pub prompt: String,
    pub style: String,
    /// Storage handle of the image, relative to the media root
    pub image: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub generation_time: Option<f64>,
    pub model_used: String,
}

/// Record as returned by the HTTP API
#[derive(Debug, Clone, Serialize)]
pub struct HistoryRecordView {
    pub id: Uuid,
    pub prompt: String,
    pub style: String,
    pub image: String,
    pub image_url: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub generation_time: Option<f64>,
    pub model_used: String,
}

impl From<HistoryRecord> for HistoryRecordView {
    fn from(record: HistoryRecord) -> Self {
        Self {
            id: record.id,
            prompt: record.prompt,
            style: record.style,
            image: record.image,
            image_url: record.image_url,
            timestamp: record.created_at,
            generation_time: record.generation_time,
            model_used: record.model_used,
        }
    }
}
