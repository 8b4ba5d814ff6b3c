//! In-memory stores with the same contracts as the SQLite ones.
//!
//! Both repositories share one [`MemoryDatabase`], the way the SQLite
//! repositories share a pool.

use crate::core::error::ChatError;
use crate::core::title::{derive_title, initial_title};
use crate::core::types::{NewConversation, NewMessage, UserId};
use crate::infrastructure::entities::{Conversation, Message};
use crate::infrastructure::traits::{
    ConversationRepository, MessageRepository, validate_new_message,
};
use async_trait::async_trait;
use chrono::Utc;
use di::{Ref, inject, injectable};
use log::debug;
use sqlx::types::Json;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    conversations: HashMap<Uuid, Conversation>,
    /// Messages per conversation, in append order.
    messages: HashMap<Uuid, Vec<Message>>,
}

impl Tables {
    fn owned_conversation(&self, user_id: UserId, conversation_id: Uuid) -> Option<&Conversation> {
        self.conversations
            .get(&conversation_id)
            .filter(|c| c.user == user_id.as_uuid())
    }

    fn owned_conversation_mut(
        &mut self,
        user_id: UserId,
        conversation_id: Uuid,
    ) -> Result<&mut Conversation, ChatError> {
        self.conversations
            .get_mut(&conversation_id)
            .filter(|c| c.user == user_id.as_uuid())
            .ok_or_else(|| ChatError::conversation_not_found(conversation_id))
    }
}

#[derive(Default)]
pub struct MemoryDatabase {
    tables: RwLock<Tables>,
}

#[injectable]
impl MemoryDatabase {
    #[inject]
    pub fn create() -> MemoryDatabase {
        MemoryDatabase::default()
    }
}

impl MemoryDatabase {
    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, ChatError> {
        self.tables.read().map_err(poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, ChatError> {
        self.tables.write().map_err(poisoned)
    }
}

fn poisoned<T>(_: PoisonError<T>) -> ChatError {
    ChatError::Storage("in-memory store lock poisoned".to_owned())
}

#[injectable(ConversationRepository)]
pub struct InMemoryConversationRepository {
    database: Ref<MemoryDatabase>,
}

impl InMemoryConversationRepository {
    pub fn new(database: Ref<MemoryDatabase>) -> Self {
        Self { database }
    }
}

#[async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn list(&self, user_id: UserId) -> Result<Vec<Conversation>, ChatError> {
        let tables = self.database.read()?;
        let mut conversations: Vec<Conversation> = tables
            .conversations
            .values()
            .filter(|c| c.user == user_id.as_uuid())
            .cloned()
            .collect();
        conversations.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(conversations)
    }

    async fn get(
        &self,
        user_id: UserId,
        conversation_id: Uuid,
    ) -> Result<Option<Conversation>, ChatError> {
        let tables = self.database.read()?;
        Ok(tables.owned_conversation(user_id, conversation_id).cloned())
    }

    async fn create(
        &self,
        user_id: UserId,
        conversation: NewConversation,
    ) -> Result<Conversation, ChatError> {
        let now = Utc::now();
        let created = Conversation {
            id: Uuid::new_v4(),
            user: user_id.as_uuid(),
            title: initial_title(conversation.title.as_deref()),
            created_at: now,
            updated_at: now,
            started_from_course_id: conversation.course_id,
            started_from_material_id: conversation.material_id,
        };

        self.database
            .write()?
            .conversations
            .insert(created.id, created.clone());
        Ok(created)
    }

    async fn rename(
        &self,
        user_id: UserId,
        conversation_id: Uuid,
        title: &str,
    ) -> Result<(), ChatError> {
        let mut tables = self.database.write()?;
        let conversation = tables.owned_conversation_mut(user_id, conversation_id)?;

        if !title.trim().is_empty() {
            conversation.title = title.to_owned();
        }
        advance(conversation);
        Ok(())
    }

    async fn delete(&self, user_id: UserId, conversation_id: Uuid) -> Result<(), ChatError> {
        let mut tables = self.database.write()?;
        if tables.owned_conversation(user_id, conversation_id).is_none() {
            debug!("delete of unknown conversation {conversation_id} ignored");
            return Ok(());
        }
        tables.conversations.remove(&conversation_id);
        tables.messages.remove(&conversation_id);
        Ok(())
    }

    async fn touch(
        &self,
        user_id: UserId,
        conversation_id: Uuid,
        first_user_message: Option<&str>,
    ) -> Result<(), ChatError> {
        let mut tables = self.database.write()?;
        let conversation = tables.owned_conversation_mut(user_id, conversation_id)?;

        if let Some(content) = first_user_message {
            conversation.title = derive_title(&conversation.title, content);
        }
        advance(conversation);
        Ok(())
    }
}

fn advance(conversation: &mut Conversation) {
    conversation.updated_at = Utc::now()
        .max(conversation.created_at)
        .max(conversation.updated_at);
}

#[injectable(MessageRepository)]
pub struct InMemoryMessageRepository {
    database: Ref<MemoryDatabase>,
}

impl InMemoryMessageRepository {
    pub fn new(database: Ref<MemoryDatabase>) -> Self {
        Self { database }
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn list_for_conversation(
        &self,
        user_id: UserId,
        conversation_id: Uuid,
    ) -> Result<Vec<Message>, ChatError> {
        let tables = self.database.read()?;
        if tables.owned_conversation(user_id, conversation_id).is_none() {
            return Ok(Vec::new());
        }

        let mut messages = tables
            .messages
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default();
        messages.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.sequence.cmp(&b.sequence))
        });
        Ok(messages)
    }

    async fn append(
        &self,
        user_id: UserId,
        conversation_id: Uuid,
        message: NewMessage,
    ) -> Result<Message, ChatError> {
        validate_new_message(&message)?;

        let mut tables = self.database.write()?;
        if tables.owned_conversation(user_id, conversation_id).is_none() {
            return Err(ChatError::conversation_not_found(conversation_id));
        }

        let thread = tables.messages.entry(conversation_id).or_default();
        let (created_at, sequence) = match thread.last() {
            Some(last) => (Utc::now().max(last.created_at), last.sequence + 1),
            None => (Utc::now(), 1),
        };

        let stored = Message {
            id: Uuid::new_v4(),
            conversation_id,
            sender: message.sender,
            content: message.content,
            sources: message.sources.map(Json),
            created_at,
            sequence,
        };
        thread.push(stored.clone());
        Ok(stored)
    }

    async fn delete_for_conversation(
        &self,
        user_id: UserId,
        conversation_id: Uuid,
    ) -> Result<(), ChatError> {
        let mut tables = self.database.write()?;
        if tables.owned_conversation(user_id, conversation_id).is_some() {
            tables.messages.remove(&conversation_id);
        }
        Ok(())
    }
}
