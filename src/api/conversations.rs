//! Conversations endpoints

use crate::api::conversations::schemas::{
    ConversationList, CreateConversation, CreateMessage, RenameConversation, SentMessages,
};
use crate::api::{ApiError, ExtractUser};
use crate::core::traits::ConversationService;
use crate::core::types::NewConversation;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use di_axum::Inject;
use log::info;
use uuid::Uuid;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_conversations).post(new_conversation))
        .route(
            "/:id",
            get(get_conversation)
                .patch(rename_conversation)
                .delete(delete_conversation),
        )
        .route(
            "/:id/messages",
            get(conversation_messages).post(post_message),
        )
}

async fn list_conversations(
    Inject(conversation_service): Inject<dyn ConversationService>,
    ExtractUser(current_user): ExtractUser,
) -> Result<(StatusCode, Json<ConversationList>), ApiError> {
    let conversations = conversation_service.list_conversations(current_user).await?;

    Ok((
        StatusCode::OK,
        ConversationList {
            conversations: conversations
                .into_iter()
                .map(schemas::Conversation::from)
                .collect(),
        }
        .into(),
    ))
}

async fn new_conversation(
    Inject(conversation_service): Inject<dyn ConversationService>,
    ExtractUser(current_user): ExtractUser,
    Json(create_conversation): Json<CreateConversation>,
) -> Result<(StatusCode, Json<schemas::Conversation>), ApiError> {
    let conversation = conversation_service
        .create_conversation(
            current_user,
            NewConversation {
                title: create_conversation.title,
                course_id: create_conversation.course_id,
                material_id: create_conversation.material_id,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(conversation.into())))
}

async fn get_conversation(
    Inject(conversation_service): Inject<dyn ConversationService>,
    ExtractUser(current_user): ExtractUser,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<schemas::Conversation>, ApiError> {
    let conversation = conversation_service
        .get_conversation(current_user, conversation_id)
        .await?;

    Ok(Json(conversation.into()))
}

async fn rename_conversation(
    Inject(conversation_service): Inject<dyn ConversationService>,
    ExtractUser(current_user): ExtractUser,
    Path(conversation_id): Path<Uuid>,
    Json(rename): Json<RenameConversation>,
) -> Result<Json<schemas::Conversation>, ApiError> {
    conversation_service
        .rename_conversation(current_user, conversation_id, rename.title)
        .await?;
    let conversation = conversation_service
        .get_conversation(current_user, conversation_id)
        .await?;

    Ok(Json(conversation.into()))
}

async fn delete_conversation(
    Inject(conversation_service): Inject<dyn ConversationService>,
    ExtractUser(current_user): ExtractUser,
    Path(conversation_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    conversation_service
        .delete_conversation(current_user, conversation_id)
        .await?;
    info!("user {current_user} deleted conversation {conversation_id}");

    Ok(StatusCode::NO_CONTENT)
}

async fn conversation_messages(
    Inject(conversation_service): Inject<dyn ConversationService>,
    Path(conversation_id): Path<Uuid>,
    ExtractUser(current_user): ExtractUser,
) -> Result<(StatusCode, Json<schemas::MessagesList>), ApiError> {
    let messages = conversation_service
        .list_messages(current_user, conversation_id)
        .await?;

    Ok((
        StatusCode::OK,
        Json(schemas::MessagesList {
            messages: messages.into_iter().map(schemas::Message::from).collect(),
        }),
    ))
}

async fn post_message(
    Inject(conversation_service): Inject<dyn ConversationService>,
    ExtractUser(current_user): ExtractUser,
    Path(conversation_id): Path<Uuid>,
    Json(message): Json<CreateMessage>,
) -> Result<(StatusCode, Json<SentMessages>), ApiError> {
    let exchange = conversation_service
        .send_message(current_user, conversation_id, message.text)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SentMessages {
            user_message: exchange.user_message.into(),
            assistant_message: exchange.assistant_message.into(),
        }),
    ))
}

pub mod schemas {
    use crate::infrastructure::entities;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    #[derive(Deserialize, Debug, Default)]
    pub struct CreateConversation {
        pub title: Option<String>,
        pub course_id: Option<String>,
        pub material_id: Option<String>,
    }

    #[derive(Deserialize, Debug)]
    pub struct RenameConversation {
        pub title: String,
    }

    #[derive(Serialize, Debug)]
    pub struct Conversation {
        pub id: Uuid,
        pub title: String,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub started_from_course_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub started_from_material_id: Option<String>,
    }

    impl From<entities::Conversation> for Conversation {
        fn from(conversation: entities::Conversation) -> Self {
            Conversation {
                id: conversation.id,
                title: conversation.title,
                created_at: conversation.created_at,
                updated_at: conversation.updated_at,
                started_from_course_id: conversation.started_from_course_id,
                started_from_material_id: conversation.started_from_material_id,
            }
        }
    }

    #[derive(Serialize, Debug)]
    pub struct ConversationList {
        pub conversations: Vec<Conversation>,
    }

    #[derive(Serialize, Debug, Default)]
    pub struct MessagesList {
        pub messages: Vec<Message>,
    }

    #[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
    #[serde(rename_all = "lowercase")]
    pub enum Sender {
        User,
        Assistant,
    }

    impl From<entities::Sender> for Sender {
        fn from(sender: entities::Sender) -> Self {
            match sender {
                entities::Sender::User => Sender::User,
                entities::Sender::Assistant => Sender::Assistant,
            }
        }
    }

    #[derive(Serialize, Debug)]
    pub struct Message {
        pub conversation_id: Uuid,
        pub id: Uuid,
        pub sender: Sender,
        pub content: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        pub sources: Vec<String>,
        pub created_at: DateTime<Utc>,
    }

    impl From<entities::Message> for Message {
        fn from(message: entities::Message) -> Self {
            Message {
                conversation_id: message.conversation_id,
                id: message.id,
                sender: message.sender.into(),
                content: message.content,
                sources: message.sources.map(|s| s.0).unwrap_or_default(),
                created_at: message.created_at,
            }
        }
    }

    #[derive(Deserialize, Debug)]
    pub struct CreateMessage {
        pub text: String,
    }

    #[derive(Serialize, Debug)]
    pub struct SentMessages {
        pub user_message: Message,
        pub assistant_message: Message,
    }
}
