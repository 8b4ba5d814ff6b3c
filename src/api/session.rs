//! Session bootstrap: what the chat page needs on first load.

use crate::api::conversations::schemas;
use crate::api::{ApiError, ExtractUser};
use crate::core::session::{ChatSession, DisplayMessage};
use crate::core::traits::ConversationService;
use axum::routing::get;
use axum::{Json, Router};
use di_axum::Inject;
use serde::Serialize;
use uuid::Uuid;

pub fn router() -> Router {
    Router::new().route("/", get(start_session))
}

#[derive(Serialize, Debug)]
pub struct SessionSnapshot {
    pub conversations: Vec<schemas::Conversation>,
    pub selected_conversation_id: Uuid,
    pub messages: Vec<schemas::Message>,
}

async fn start_session(
    Inject(conversation_service): Inject<dyn ConversationService>,
    ExtractUser(current_user): ExtractUser,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = ChatSession::new(conversation_service, current_user);
    let selected_conversation_id = session.initialize().await?;

    Ok(Json(SessionSnapshot {
        conversations: session
            .conversations()
            .into_iter()
            .map(schemas::Conversation::from)
            .collect(),
        selected_conversation_id,
        messages: session
            .messages()
            .into_iter()
            .filter_map(|m| match m {
                DisplayMessage::Confirmed(message) => Some(schemas::Message::from(message)),
                DisplayMessage::Pending { .. } => None,
            })
            .collect(),
    }))
}
