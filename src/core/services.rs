//! Implementations for the service the app needs.
//!

use crate::core::error::ChatError;
use crate::core::traits::{AnswerGenerator, ConversationService};
use crate::core::types::{AnswerRequest, Exchange, NewConversation, NewMessage, UserId};
use crate::infrastructure::entities::{Conversation, Message, Sender};
use crate::infrastructure::traits::{ConversationRepository, MessageRepository};
use async_trait::async_trait;
use di::{Ref, injectable};
use log::{debug, info, warn};
use uuid::Uuid;

#[injectable(ConversationService)]
pub struct StudyConversationService {
    conversations: Ref<dyn ConversationRepository>,
    messages: Ref<dyn MessageRepository>,
    assistant: Ref<dyn AnswerGenerator>,
}

impl StudyConversationService {
    pub fn new(
        conversations: Ref<dyn ConversationRepository>,
        messages: Ref<dyn MessageRepository>,
        assistant: Ref<dyn AnswerGenerator>,
    ) -> Self {
        Self {
            conversations,
            messages,
            assistant,
        }
    }
}

fn first_user_message(messages: &[Message]) -> Option<&Message> {
    messages.iter().find(|m| m.sender == Sender::User)
}

#[async_trait]
impl ConversationService for StudyConversationService {
    async fn list_conversations(&self, user_id: UserId) -> Result<Vec<Conversation>, ChatError> {
        self.conversations.list(user_id).await
    }

    async fn get_conversation(
        &self,
        user_id: UserId,
        conversation_id: Uuid,
    ) -> Result<Conversation, ChatError> {
        self.conversations
            .get(user_id, conversation_id)
            .await?
            .ok_or_else(|| ChatError::conversation_not_found(conversation_id))
    }

    async fn create_conversation(
        &self,
        user_id: UserId,
        conversation: NewConversation,
    ) -> Result<Conversation, ChatError> {
        let created = self.conversations.create(user_id, conversation).await?;
        info!("user {user_id} created conversation {}", created.id);
        Ok(created)
    }

    async fn rename_conversation(
        &self,
        user_id: UserId,
        conversation_id: Uuid,
        title: String,
    ) -> Result<(), ChatError> {
        self.conversations
            .rename(user_id, conversation_id, title.trim())
            .await
    }

    async fn delete_conversation(
        &self,
        user_id: UserId,
        conversation_id: Uuid,
    ) -> Result<(), ChatError> {
        // Messages first; a partial failure leaves the conversation for a retry.
        self.messages
            .delete_for_conversation(user_id, conversation_id)
            .await?;
        self.conversations.delete(user_id, conversation_id).await?;
        debug!("user {user_id} deleted conversation {conversation_id}");
        Ok(())
    }

    async fn list_messages(
        &self,
        user_id: UserId,
        conversation_id: Uuid,
    ) -> Result<Vec<Message>, ChatError> {
        self.messages
            .list_for_conversation(user_id, conversation_id)
            .await
    }

    async fn send_message(
        &self,
        user_id: UserId,
        conversation_id: Uuid,
        content: String,
    ) -> Result<Exchange, ChatError> {
        if content.trim().is_empty() {
            return Err(ChatError::validation("message content must not be empty"));
        }

        let conversation = self.get_conversation(user_id, conversation_id).await?;

        let user_message = self
            .messages
            .append(user_id, conversation_id, NewMessage::user(content))
            .await?;

        let history = self
            .messages
            .list_for_conversation(user_id, conversation_id)
            .await?;
        let first_question = first_user_message(&history).map(|m| m.content.clone());

        let request = AnswerRequest {
            conversation_id,
            question: user_message.content.clone(),
            history,
            course_id: conversation.started_from_course_id,
            material_id: conversation.started_from_material_id,
        };

        let answer = match self.assistant.answer(request).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!("assistant failed for conversation {conversation_id}: {e}");
                self.conversations
                    .touch(user_id, conversation_id, first_question.as_deref())
                    .await?;
                return Err(ChatError::Collaborator {
                    user_message: Box::new(user_message),
                    reason: e.to_string(),
                });
            }
        };

        let assistant_message = self
            .messages
            .append(
                user_id,
                conversation_id,
                NewMessage::assistant(answer.text, answer.sources),
            )
            .await?;

        self.conversations
            .touch(user_id, conversation_id, first_question.as_deref())
            .await?;

        Ok(Exchange {
            user_message,
            assistant_message,
        })
    }
}
