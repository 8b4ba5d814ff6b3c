use crate::core::error::ChatError;
use crate::core::types::UserId;
use async_trait::async_trait;
use axum::Json;
use axum::Router;
use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::str::FromStr;
use uuid::Uuid;

pub mod conversations;
pub mod session;

const X_USER_ID: &str = "X-User-ID";

/// All API routes. The caller attaches the DI provider.
pub fn router() -> Router {
    Router::new()
        .nest("/conversations", conversations::router())
        .nest("/session", session::router())
}

/// The signed-in user, as asserted by the identity provider in front of us.
#[derive(Debug)]
pub struct ExtractUser(pub UserId);

#[async_trait]
impl<S> FromRequestParts<S> for ExtractUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Self, (StatusCode, &'static str)> {
        if let Some(user_id) = parts.headers.get(X_USER_ID) {
            let user_id = user_id
                .to_str()
                .map_err(|_| (StatusCode::BAD_REQUEST, "invalid user id"))?;
            let user_id = Uuid::from_str(user_id)
                .map_err(|_| (StatusCode::BAD_REQUEST, "invalid user id"))?;
            Ok(ExtractUser(UserId(user_id)))
        } else {
            Err((StatusCode::BAD_REQUEST, "`X-User-ID` header is missing"))
        }
    }
}

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub error: String,
    /// The question that was saved before the assistant failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_message: Option<conversations::schemas::Message>,
}

/// [`ChatError`] rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub ChatError);

impl From<ChatError> for ApiError {
    fn from(e: ChatError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error = self.0.to_string();
        let (status, user_message) = match self.0 {
            ChatError::Validation(_) => (StatusCode::BAD_REQUEST, None),
            ChatError::NotFound(_) => (StatusCode::NOT_FOUND, None),
            ChatError::Collaborator { user_message, .. } => (
                StatusCode::BAD_GATEWAY,
                Some(conversations::schemas::Message::from(*user_message)),
            ),
            ChatError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, None),
        };

        (
            status,
            Json(ErrorBody {
                error,
                user_message,
            }),
        )
            .into_response()
    }
}
