//! Value types shared by the stores, the service and the session controller.

use crate::infrastructure::entities::{Message, Sender};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of the signed-in user. Every store call is scoped by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for UserId {
    fn from(id: Uuid) -> Self {
        UserId(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Parameters for creating a conversation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewConversation {
    pub title: Option<String>,
    pub course_id: Option<String>,
    pub material_id: Option<String>,
}

impl NewConversation {
    pub fn titled(title: impl Into<String>) -> Self {
        NewConversation {
            title: Some(title.into()),
            ..Default::default()
        }
    }
}

/// A message about to be appended. The store assigns id, timestamp and sequence.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender: Sender,
    pub content: String,
    pub sources: Option<Vec<String>>,
}

impl NewMessage {
    pub fn user(content: impl Into<String>) -> Self {
        NewMessage {
            sender: Sender::User,
            content: content.into(),
            sources: None,
        }
    }

    pub fn assistant(content: impl Into<String>, sources: Vec<String>) -> Self {
        NewMessage {
            sender: Sender::Assistant,
            content: content.into(),
            sources: Some(sources),
        }
    }
}

/// The pair of messages persisted by one send.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub user_message: Message,
    pub assistant_message: Message,
}

/// Input handed to the answer-generation collaborator.
#[derive(Debug, Clone)]
pub struct AnswerRequest {
    pub conversation_id: Uuid,
    pub question: String,
    /// Messages of the conversation up to and including the question.
    pub history: Vec<Message>,
    pub course_id: Option<String>,
    pub material_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<String>,
}
