//! Infrastructure traits, used for DI on higher levels

use crate::core::error::ChatError;
use crate::core::types::{NewConversation, NewMessage, UserId};
use crate::infrastructure::entities;
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Lists the user's conversations, most recently active first.
    async fn list(&self, user_id: UserId) -> Result<Vec<entities::Conversation>, ChatError>;

    async fn get(
        &self,
        user_id: UserId,
        conversation_id: Uuid,
    ) -> Result<Option<entities::Conversation>, ChatError>;

    /// Creates a conversation with `created_at = updated_at = now`.
    async fn create(
        &self,
        user_id: UserId,
        conversation: NewConversation,
    ) -> Result<entities::Conversation, ChatError>;

    /// Sets the title and advances `updated_at`. A blank title keeps the old one.
    ///
    /// Returns `NotFound` if the conversation does not exist for this user.
    async fn rename(
        &self,
        user_id: UserId,
        conversation_id: Uuid,
        title: &str,
    ) -> Result<(), ChatError>;

    /// Removes the conversation. Unknown ids are a no-op.
    async fn delete(&self, user_id: UserId, conversation_id: Uuid) -> Result<(), ChatError>;

    /// Advances `updated_at` to the current time (never below `created_at`) and, while the
    /// conversation is untitled, derives its title from `first_user_message`.
    async fn touch(
        &self,
        user_id: UserId,
        conversation_id: Uuid,
        first_user_message: Option<&str>,
    ) -> Result<(), ChatError>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Messages in chronological order. Unknown conversations yield an empty list.
    async fn list_for_conversation(
        &self,
        user_id: UserId,
        conversation_id: Uuid,
    ) -> Result<Vec<entities::Message>, ChatError>;

    /// Appends a message stamped with the current time, raised if needed so it
    /// never precedes the latest message already in the conversation.
    ///
    /// Returns `Validation` for an empty user message and `NotFound` when the
    /// conversation does not exist for this user.
    async fn append(
        &self,
        user_id: UserId,
        conversation_id: Uuid,
        message: NewMessage,
    ) -> Result<entities::Message, ChatError>;

    /// Removes every message of the conversation. Idempotent.
    async fn delete_for_conversation(
        &self,
        user_id: UserId,
        conversation_id: Uuid,
    ) -> Result<(), ChatError>;
}

/// Shared append precondition for every message store.
pub fn validate_new_message(message: &NewMessage) -> Result<(), ChatError> {
    if message.sender == entities::Sender::User && message.content.trim().is_empty() {
        return Err(ChatError::validation("message content must not be empty"));
    }
    Ok(())
}
