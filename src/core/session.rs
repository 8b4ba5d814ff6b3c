//! Chat session controller.
//!
//! Tracks one user's conversation list, the active conversation and the
//! messages on display. Sends are single-flight per session: a second send
//! while one is in flight is rejected, whatever conversation it targets.
//! A send is always scoped to the conversation id it was given, so switching
//! conversations mid-send is safe; the finished send simply doesn't touch the
//! display of the conversation now active.

use crate::core::error::ChatError;
use crate::core::traits::ConversationService;
use crate::core::types::{Exchange, NewConversation, UserId};
use crate::infrastructure::entities::{Conversation, DEFAULT_TITLE, Message, Sender};
use di::Ref;
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    NoConversations,
    ConversationSelected,
    Sending,
}

/// A message as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayMessage {
    /// Shown immediately on send, before the server has confirmed it.
    Pending {
        local_id: Uuid,
        conversation_id: Uuid,
        content: String,
    },
    Confirmed(Message),
}

impl DisplayMessage {
    pub fn content(&self) -> &str {
        match self {
            DisplayMessage::Pending { content, .. } => content,
            DisplayMessage::Confirmed(message) => &message.content,
        }
    }

    pub fn sender(&self) -> Sender {
        match self {
            DisplayMessage::Pending { .. } => Sender::User,
            DisplayMessage::Confirmed(message) => message.sender,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, DisplayMessage::Pending { .. })
    }

    fn local_id(&self) -> Option<Uuid> {
        match self {
            DisplayMessage::Pending { local_id, .. } => Some(*local_id),
            DisplayMessage::Confirmed(_) => None,
        }
    }

    fn message_id(&self) -> Option<Uuid> {
        match self {
            DisplayMessage::Pending { .. } => None,
            DisplayMessage::Confirmed(message) => Some(message.id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendRejection {
    EmptyContent,
    AlreadySending,
}

#[derive(Debug)]
pub enum SendOutcome {
    Sent(Exchange),
    Rejected(SendRejection),
}

#[derive(Default)]
struct SessionState {
    conversations: Vec<Conversation>,
    active: Option<Uuid>,
    messages: Vec<DisplayMessage>,
}

/// Clears the in-flight flag when the send finishes, however it finishes.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct ChatSession {
    service: Ref<dyn ConversationService>,
    user_id: UserId,
    state: Mutex<SessionState>,
    sending: AtomicBool,
}

impl ChatSession {
    pub fn new(service: Ref<dyn ConversationService>, user_id: UserId) -> ChatSession {
        ChatSession {
            service,
            user_id,
            state: Mutex::new(SessionState::default()),
            sending: AtomicBool::new(false),
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn phase(&self) -> SessionPhase {
        if self.sending.load(Ordering::Acquire) {
            SessionPhase::Sending
        } else if self.state().active.is_some() {
            SessionPhase::ConversationSelected
        } else {
            SessionPhase::NoConversations
        }
    }

    pub fn is_sending(&self) -> bool {
        self.sending.load(Ordering::Acquire)
    }

    pub fn conversations(&self) -> Vec<Conversation> {
        self.state().conversations.clone()
    }

    pub fn active_conversation_id(&self) -> Option<Uuid> {
        self.state().active
    }

    pub fn active_conversation(&self) -> Option<Conversation> {
        let state = self.state();
        let active = state.active?;
        state.conversations.iter().find(|c| c.id == active).cloned()
    }

    pub fn messages(&self) -> Vec<DisplayMessage> {
        self.state().messages.clone()
    }

    /// Loads the conversation list and selects the most recently active one,
    /// creating a first conversation when the user has none.
    pub async fn initialize(&self) -> Result<Uuid, ChatError> {
        let mut conversations = self.service.list_conversations(self.user_id).await?;

        let selected = match conversations.first().map(|latest| latest.id) {
            Some(latest) => latest,
            None => {
                let created = self
                    .service
                    .create_conversation(self.user_id, NewConversation::titled(DEFAULT_TITLE))
                    .await?;
                debug!("user {} had no conversations, created {}", self.user_id, created.id);
                conversations = self.service.list_conversations(self.user_id).await?;
                created.id
            }
        };

        self.state().conversations = conversations;
        self.select_conversation(selected).await?;
        Ok(selected)
    }

    /// Makes `conversation_id` active and loads its messages.
    pub async fn select_conversation(&self, conversation_id: Uuid) -> Result<(), ChatError> {
        {
            let mut state = self.state();
            state.active = Some(conversation_id);
            state.messages.clear();
        }

        let messages = self
            .service
            .list_messages(self.user_id, conversation_id)
            .await?;

        let mut state = self.state();
        // Another selection may have happened while loading.
        if state.active == Some(conversation_id) {
            state.messages = messages.into_iter().map(DisplayMessage::Confirmed).collect();
        }
        Ok(())
    }

    /// Creates an empty conversation and selects it.
    pub async fn new_conversation(&self) -> Result<Conversation, ChatError> {
        let created = self
            .service
            .create_conversation(self.user_id, NewConversation::titled(DEFAULT_TITLE))
            .await?;
        self.refresh_conversations().await?;
        self.select_conversation(created.id).await?;
        Ok(created)
    }

    /// Sends `content` to `conversation_id` and shows the exchange if that
    /// conversation is still active when the answer arrives.
    ///
    /// Content is sent as typed. Blank content and sends issued while another is in flight are rejected
    /// without contacting the service.
    pub async fn send(
        &self,
        conversation_id: Uuid,
        content: &str,
    ) -> Result<SendOutcome, ChatError> {
        if content.trim().is_empty() {
            return Ok(SendOutcome::Rejected(SendRejection::EmptyContent));
        }
        if self
            .sending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(SendOutcome::Rejected(SendRejection::AlreadySending));
        }
        let _in_flight = InFlight(&self.sending);

        let local_id = Uuid::new_v4();
        {
            let mut state = self.state();
            if state.active == Some(conversation_id) {
                state.messages.push(DisplayMessage::Pending {
                    local_id,
                    conversation_id,
                    content: content.to_owned(),
                });
            }
        }

        let result = self
            .service
            .send_message(self.user_id, conversation_id, content.to_owned())
            .await;

        match result {
            Ok(exchange) => {
                self.reconcile(
                    local_id,
                    conversation_id,
                    vec![
                        exchange.user_message.clone(),
                        exchange.assistant_message.clone(),
                    ],
                );
                self.refresh_after_send().await;
                Ok(SendOutcome::Sent(exchange))
            }
            Err(ChatError::Collaborator {
                user_message,
                reason,
            }) => {
                self.reconcile(local_id, conversation_id, vec![(*user_message).clone()]);
                self.refresh_after_send().await;
                Err(ChatError::Collaborator {
                    user_message,
                    reason,
                })
            }
            Err(e) => {
                self.reconcile(local_id, conversation_id, Vec::new());
                Err(e)
            }
        }
    }

    pub async fn rename(&self, conversation_id: Uuid, title: &str) -> Result<(), ChatError> {
        self.service
            .rename_conversation(self.user_id, conversation_id, title.to_owned())
            .await?;
        self.refresh_conversations().await
    }

    /// Deletes a conversation. When it was the active one the most recently
    /// active remaining conversation is selected, or none if the list is empty.
    pub async fn delete(&self, conversation_id: Uuid) -> Result<(), ChatError> {
        self.service
            .delete_conversation(self.user_id, conversation_id)
            .await?;
        self.refresh_conversations().await?;

        let next = {
            let mut state = self.state();
            if state.active != Some(conversation_id) {
                return Ok(());
            }
            let next = state.conversations.first().map(|c| c.id);
            if next.is_none() {
                state.active = None;
                state.messages.clear();
            }
            next
        };

        match next {
            Some(next) => self.select_conversation(next).await,
            None => Ok(()),
        }
    }

    pub async fn refresh_conversations(&self) -> Result<(), ChatError> {
        let conversations = self.service.list_conversations(self.user_id).await?;
        self.state().conversations = conversations;
        Ok(())
    }

    async fn refresh_after_send(&self) {
        if let Err(e) = self.refresh_conversations().await {
            warn!("failed to refresh conversations after send: {e}");
        }
    }

    /// Swaps the pending entry for the server-confirmed messages.
    fn reconcile(&self, local_id: Uuid, conversation_id: Uuid, confirmed: Vec<Message>) {
        let mut state = self.state();

        let position = state
            .messages
            .iter()
            .position(|m| m.local_id() == Some(local_id));
        if let Some(index) = position {
            state.messages.remove(index);
        }

        if state.active != Some(conversation_id) {
            return;
        }

        let fresh: Vec<DisplayMessage> = confirmed
            .into_iter()
            .filter(|m| !state.messages.iter().any(|d| d.message_id() == Some(m.id)))
            .map(DisplayMessage::Confirmed)
            .collect();

        let insert_at = position.unwrap_or(state.messages.len()).min(state.messages.len());
        for (offset, message) in fresh.into_iter().enumerate() {
            state.messages.insert(insert_at + offset, message);
        }
    }
}
