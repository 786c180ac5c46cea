//! API routes

use axum::{
    extract::{Path, Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{delete, get},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::conversation::{
    RawAttachment, RawConversation, RawMessage, Sender, DEFAULT_CONVERSATION_TITLE,
};

use super::repository::RepositoryError;
use super::BackendState;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct PostMessageRequest {
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<RawAttachment>,
}

/// Errors surfaced to HTTP clients
#[derive(Debug)]
pub enum ApiFailure {
    Repository(RepositoryError),
    BadRequest(&'static str),
}

impl From<RepositoryError> for ApiFailure {
    fn from(e: RepositoryError) -> Self {
        ApiFailure::Repository(e)
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiFailure::Repository(e @ RepositoryError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, e.to_string())
            }
            ApiFailure::Repository(e) => {
                tracing::error!(error = %e, "Repository failure");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            ApiFailure::BadRequest(reason) => (StatusCode::BAD_REQUEST, reason.to_string()),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn require_token(State(state): State<BackendState>, request: Request, next: Next) -> Response {
    if let Some(expected) = state.token.as_deref() {
        let authorized = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected);

        if !authorized {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "unauthorized" })),
            )
                .into_response();
        }
    }
    next.run(request).await
}

async fn list_conversations(
    State(state): State<BackendState>,
) -> Result<Json<Vec<RawConversation>>, ApiFailure> {
    let conversations = state.repository.list_conversations().await?;
    Ok(Json(conversations.into_iter().map(RawConversation::from).collect()))
}

async fn create_conversation(
    State(state): State<BackendState>,
    Json(request): Json<CreateConversationRequest>,
) -> Result<(StatusCode, Json<RawConversation>), ApiFailure> {
    let title = match request.title.trim() {
        "" => DEFAULT_CONVERSATION_TITLE,
        title => title,
    };
    let conversation = state.repository.create_conversation(title).await?;
    tracing::info!(id = %conversation.id, "Conversation created");
    Ok((StatusCode::CREATED, Json(conversation.into())))
}

async fn delete_conversation(
    State(state): State<BackendState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiFailure> {
    state.repository.delete_conversation(&id).await?;
    tracing::info!(id = %id, "Conversation deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn list_messages(
    State(state): State<BackendState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<RawMessage>>, ApiFailure> {
    let messages = state.repository.list_messages(&id).await?;
    Ok(Json(messages.into_iter().map(RawMessage::from).collect()))
}

/// Store the learner's message, then the assistant's reply.
///
/// Responds with the learner's message; the reply shows up in the next
/// message listing. A failed reply is logged and does not fail the request.
async fn post_message(
    State(state): State<BackendState>,
    Path(id): Path<String>,
    Json(request): Json<PostMessageRequest>,
) -> Result<(StatusCode, Json<RawMessage>), ApiFailure> {
    if request.content.trim().is_empty() {
        return Err(ApiFailure::BadRequest("content must not be empty"));
    }

    let message = state
        .repository
        .save_message(&id, Sender::User, &request.content, &request.attachments)
        .await?;

    let history = state.repository.list_messages(&id).await?;
    match state.responder.reply(&history).await {
        Ok(reply) => {
            state
                .repository
                .save_message(&id, Sender::Ai, &reply, &[])
                .await?;
        }
        Err(e) => tracing::warn!(conversation_id = %id, error = %e, "Assistant reply failed"),
    }

    Ok((StatusCode::CREATED, Json(message.into())))
}

pub fn router(state: BackendState) -> Router {
    let chat = Router::new()
        .route(
            "/conversations",
            get(list_conversations).post(create_conversation),
        )
        .route("/conversations/:id", delete(delete_conversation))
        .route(
            "/conversations/:id/messages",
            get(list_messages).post(post_message),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    Router::new()
        .route("/health", get(health))
        .nest("/api/user/chat", chat)
        .with_state(state)
}
