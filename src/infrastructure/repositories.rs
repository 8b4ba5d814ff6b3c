//! DB Repository abstractions

use crate::core::error::ChatError;
use crate::core::title::{derive_title, initial_title};
use crate::core::types::{NewConversation, NewMessage, UserId};
use crate::infrastructure::database::DatabaseConnection;
use crate::infrastructure::entities::{Conversation, Message};
use crate::infrastructure::traits::{
    ConversationRepository, MessageRepository, validate_new_message,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use di::{Ref, injectable};
use log::debug;
use sqlx::types::Json;
use uuid::Uuid;

#[injectable(ConversationRepository)]
pub struct DbConversationRepository {
    connection: Ref<DatabaseConnection>,
}

impl DbConversationRepository {
    pub fn new(connection: Ref<DatabaseConnection>) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl ConversationRepository for DbConversationRepository {
    async fn list(&self, user_id: UserId) -> Result<Vec<Conversation>, ChatError> {
        Ok(sqlx::query_as::<_, Conversation>(
            "SELECT * FROM conversations WHERE user = ? ORDER BY updated_at DESC, created_at DESC",
        )
        .bind(user_id.as_uuid())
        .fetch_all(&**self.connection)
        .await?)
    }

    async fn get(
        &self,
        user_id: UserId,
        conversation_id: Uuid,
    ) -> Result<Option<Conversation>, ChatError> {
        Ok(
            sqlx::query_as::<_, Conversation>("SELECT * FROM conversations WHERE id = ? AND user = ?")
                .bind(conversation_id)
                .bind(user_id.as_uuid())
                .fetch_optional(&**self.connection)
                .await?,
        )
    }

    async fn create(
        &self,
        user_id: UserId,
        conversation: NewConversation,
    ) -> Result<Conversation, ChatError> {
        let now = Utc::now();
        Ok(sqlx::query_as::<_, Conversation>(
            "INSERT INTO conversations (id, user, title, created_at, updated_at, started_from_course_id, started_from_material_id) VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(user_id.as_uuid())
        .bind(initial_title(conversation.title.as_deref()))
        .bind(now)
        .bind(now)
        .bind(conversation.course_id)
        .bind(conversation.material_id)
        .fetch_one(&**self.connection)
        .await?)
    }

    async fn rename(
        &self,
        user_id: UserId,
        conversation_id: Uuid,
        title: &str,
    ) -> Result<(), ChatError> {
        let mut tx = self.connection.begin().await?;

        let current: Conversation =
            sqlx::query_as("SELECT * FROM conversations WHERE id = ? AND user = ?")
                .bind(conversation_id)
                .bind(user_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| ChatError::conversation_not_found(conversation_id))?;

        let title = if title.trim().is_empty() {
            current.title.clone()
        } else {
            title.to_owned()
        };

        sqlx::query("UPDATE conversations SET title = ?, updated_at = ? WHERE id = ?")
            .bind(title)
            .bind(advanced_timestamp(&current))
            .bind(conversation_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, user_id: UserId, conversation_id: Uuid) -> Result<(), ChatError> {
        let result = sqlx::query("DELETE FROM conversations WHERE id = ? AND user = ?")
            .bind(conversation_id)
            .bind(user_id.as_uuid())
            .execute(&**self.connection)
            .await?;

        if result.rows_affected() == 0 {
            debug!("delete of unknown conversation {conversation_id} ignored");
        }
        Ok(())
    }

    async fn touch(
        &self,
        user_id: UserId,
        conversation_id: Uuid,
        first_user_message: Option<&str>,
    ) -> Result<(), ChatError> {
        let mut tx = self.connection.begin().await?;

        let current: Conversation =
            sqlx::query_as("SELECT * FROM conversations WHERE id = ? AND user = ?")
                .bind(conversation_id)
                .bind(user_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| ChatError::conversation_not_found(conversation_id))?;

        let title = match first_user_message {
            Some(content) => derive_title(&current.title, content),
            None => current.title.clone(),
        };

        sqlx::query("UPDATE conversations SET title = ?, updated_at = ? WHERE id = ?")
            .bind(title)
            .bind(advanced_timestamp(&current))
            .bind(conversation_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

/// New `updated_at` for an activity happening now, never below the creation time.
fn advanced_timestamp(conversation: &Conversation) -> DateTime<Utc> {
    Utc::now()
        .max(conversation.created_at)
        .max(conversation.updated_at)
}

#[injectable(MessageRepository)]
pub struct DbMessageRepository {
    connection: Ref<DatabaseConnection>,
}

impl DbMessageRepository {
    pub fn new(connection: Ref<DatabaseConnection>) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl MessageRepository for DbMessageRepository {
    async fn list_for_conversation(
        &self,
        user_id: UserId,
        conversation_id: Uuid,
    ) -> Result<Vec<Message>, ChatError> {
        Ok(sqlx::query_as::<_, Message>(
            "SELECT messages.id, messages.conversation_id, messages.sender, messages.content, messages.sources, messages.created_at, messages.sequence FROM messages INNER JOIN conversations ON conversations.id = messages.conversation_id WHERE messages.conversation_id = ? AND conversations.user = ? ORDER BY messages.created_at ASC, messages.sequence ASC",
        )
        .bind(conversation_id)
        .bind(user_id.as_uuid())
        .fetch_all(&**self.connection)
        .await?)
    }

    async fn append(
        &self,
        user_id: UserId,
        conversation_id: Uuid,
        message: NewMessage,
    ) -> Result<Message, ChatError> {
        validate_new_message(&message)?;

        let mut tx = self.connection.begin().await?;

        let owned: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM conversations WHERE id = ? AND user = ?")
                .bind(conversation_id)
                .bind(user_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;
        if owned.is_none() {
            return Err(ChatError::conversation_not_found(conversation_id));
        }

        let latest: Option<(DateTime<Utc>, i64)> = sqlx::query_as(
            "SELECT created_at, sequence FROM messages WHERE conversation_id = ? ORDER BY sequence DESC LIMIT 1",
        )
        .bind(conversation_id)
        .fetch_optional(&mut *tx)
        .await?;

        let (created_at, sequence) = match latest {
            Some((last_created_at, last_sequence)) => {
                (Utc::now().max(last_created_at), last_sequence + 1)
            }
            None => (Utc::now(), 1),
        };

        let stored: Message = sqlx::query_as(
            "INSERT INTO messages (id, conversation_id, sender, content, sources, created_at, sequence) VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(conversation_id)
        .bind(message.sender)
        .bind(message.content)
        .bind(message.sources.map(Json))
        .bind(created_at)
        .bind(sequence)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(stored)
    }

    async fn delete_for_conversation(
        &self,
        user_id: UserId,
        conversation_id: Uuid,
    ) -> Result<(), ChatError> {
        sqlx::query(
            "DELETE FROM messages WHERE conversation_id IN (SELECT id FROM conversations WHERE id = ? AND user = ?)",
        )
        .bind(conversation_id)
        .bind(user_id.as_uuid())
        .execute(&**self.connection)
        .await?;
        Ok(())
    }
}
