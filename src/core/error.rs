//! Error taxonomy for conversation operations.

use crate::infrastructure::entities::Message;
use log::error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    /// Input rejected before anything was written.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The referenced conversation does not exist for this user.
    #[error("not found: {0}")]
    NotFound(String),

    /// The answering service failed. The question was still saved.
    #[error("answer generation failed: {reason}")]
    Collaborator {
        user_message: Box<Message>,
        reason: String,
    },

    #[error("storage error: {0}")]
    Storage(String),
}

impl ChatError {
    pub fn validation(message: impl Into<String>) -> Self {
        ChatError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ChatError::NotFound(message.into())
    }

    pub fn conversation_not_found(id: uuid::Uuid) -> Self {
        ChatError::NotFound(format!("conversation {id}"))
    }
}

impl From<sqlx::Error> for ChatError {
    fn from(e: sqlx::Error) -> Self {
        error!("{e}");
        match e {
            sqlx::Error::RowNotFound => ChatError::NotFound("row not found".to_owned()),
            other => ChatError::Storage(other.to_string()),
        }
    }
}

/// Failure reported by an answer generator.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct AnswerError(pub String);
