//! Database entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

/// Title every conversation carries until it is renamed or derived from its first question.
pub const DEFAULT_TITLE: &str = "New Chat";

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Conversation {
    pub id: Uuid,
    pub user: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_from_course_id: Option<String>,
    pub started_from_material_id: Option<String>,
}

/// Author of a message. Closed set, stored as an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Sender {
    User = 1,
    Assistant = 2,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender: Sender,
    pub content: String,
    pub sources: Option<Json<Vec<String>>>,
    pub created_at: DateTime<Utc>,
    /// Position within the conversation, breaks `created_at` ties.
    pub sequence: i64,
}

impl Message {
    pub fn source_labels(&self) -> &[String] {
        self.sources.as_ref().map(|s| s.0.as_slice()).unwrap_or(&[])
    }
}
