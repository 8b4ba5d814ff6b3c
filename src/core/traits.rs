//! DI "Interfaces"

use crate::core::error::{AnswerError, ChatError};
use crate::core::types::{Answer, AnswerRequest, Exchange, NewConversation, UserId};
use crate::infrastructure::entities;
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait ConversationService: Send + Sync {
    /// Lists all conversations for the given user, most recently active first.
    async fn list_conversations(
        &self,
        user_id: UserId,
    ) -> Result<Vec<entities::Conversation>, ChatError>;

    /// Returns `NotFound` if the conversation does not exist for this user.
    async fn get_conversation(
        &self,
        user_id: UserId,
        conversation_id: Uuid,
    ) -> Result<entities::Conversation, ChatError>;

    /// Creates a new conversation for the given user.
    async fn create_conversation(
        &self,
        user_id: UserId,
        conversation: NewConversation,
    ) -> Result<entities::Conversation, ChatError>;

    /// Renames a conversation. A blank title leaves the title as it was.
    async fn rename_conversation(
        &self,
        user_id: UserId,
        conversation_id: Uuid,
        title: String,
    ) -> Result<(), ChatError>;

    /// Deletes a conversation together with its messages.
    ///
    /// Deleting a conversation that does not exist succeeds.
    async fn delete_conversation(
        &self,
        user_id: UserId,
        conversation_id: Uuid,
    ) -> Result<(), ChatError>;

    /// List all messages in a conversation, oldest first.
    async fn list_messages(
        &self,
        user_id: UserId,
        conversation_id: Uuid,
    ) -> Result<Vec<entities::Message>, ChatError>;

    /// Saves the question, asks the assistant and saves its answer.
    ///
    /// If the assistant fails the question stays saved and
    /// [`ChatError::Collaborator`] carries it back.
    async fn send_message(
        &self,
        user_id: UserId,
        conversation_id: Uuid,
        content: String,
    ) -> Result<Exchange, ChatError>;
}

/// Answers questions asked in a conversation.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn answer(&self, request: AnswerRequest) -> Result<Answer, AnswerError>;
}
