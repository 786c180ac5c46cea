//! Remote conversation API
//!
//! The store only ever talks to the backend through [`ConversationApi`], so tests
//! can script responses and the HTTP implementation stays a thin adapter.

mod auth;
mod http;

use async_trait::async_trait;
use thiserror::Error;

use crate::conversation::{Attachment, RawConversation, RawMessage};

pub use auth::Credentials;
pub use http::{HttpConversationApi, HttpTransport};

/// Transport/HTTP failure.
///
/// This is the only error kind the client layer distinguishes; the variants
/// record the cause so callers can present it.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// HTTP status carried by the error, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Unauthorized => Some(401),
            ApiError::Request(e) => e.status().map(|s| s.as_u16()),
            ApiError::InvalidResponse(_) => None,
        }
    }
}

/// Round-trips offered by the conversation endpoints.
///
/// Implementations return wire records untouched; normalization happens in the
/// store.
#[async_trait]
pub trait ConversationApi: Send + Sync {
    /// `GET /conversations`
    async fn list_conversations(&self) -> Result<Vec<RawConversation>, ApiError>;

    /// `GET /conversations/{id}/messages`
    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<RawMessage>, ApiError>;

    /// `POST /conversations/{id}/messages`; attachments are omitted from the body when empty
    async fn post_message(
        &self,
        conversation_id: &str,
        content: &str,
        attachments: &[Attachment],
    ) -> Result<RawMessage, ApiError>;

    /// `POST /conversations`
    async fn create_conversation(&self, title: &str) -> Result<RawConversation, ApiError>;

    /// `DELETE /conversations/{id}`
    async fn delete_conversation(&self, conversation_id: &str) -> Result<(), ApiError>;
}
