//! Chat with a human trainer
//!
//! Unlike the assistant chat, nothing here is cached: every call is a fresh
//! round-trip and the results belong to the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{ApiError, HttpTransport};
use crate::conversation::{parse_timestamp, RawConversation, RawMessage, Sender};

pub const DEFAULT_TRAINER_TITLE: &str = "Conversation with trainer";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainerConversation {
    pub id: String,
    pub title: String,
    pub last_message: Option<String>,
    pub last_message_date: Option<DateTime<Utc>>,
    pub messages_count: u32,
}

impl TrainerConversation {
    fn from_raw(raw: RawConversation) -> Result<Self, ApiError> {
        Ok(Self {
            id: raw.id,
            title: raw.title.unwrap_or_default(),
            last_message: raw.last_message,
            last_message_date: raw
                .last_message_date
                .as_deref()
                .map(parse_timestamp)
                .transpose()?,
            messages_count: raw.messages_count.unwrap_or(0),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerMessage {
    pub id: String,
    pub content: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
}

impl TrainerMessage {
    fn from_raw(raw: RawMessage) -> Result<Self, ApiError> {
        let timestamp = raw
            .timestamp
            .as_deref()
            .ok_or_else(|| ApiError::InvalidResponse(format!("message {} has no timestamp", raw.id)))
            .and_then(parse_timestamp)?;

        Ok(Self {
            id: raw.id,
            content: raw.content.unwrap_or_default(),
            sender: counterpart_sender(raw.sender.as_deref()),
            timestamp,
            read: raw.read.unwrap_or(false),
        })
    }
}

/// On this channel anything that is not the learner is the trainer side.
fn counterpart_sender(raw: Option<&str>) -> Sender {
    match raw {
        Some(s) if s.trim().eq_ignore_ascii_case("user") => Sender::User,
        _ => Sender::Ai,
    }
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct Title<'a> {
    title: &'a str,
}

/// Client for `{api_base}/user/trainer-chat`
pub struct TrainerChatClient {
    transport: HttpTransport,
    endpoint: String,
}

impl TrainerChatClient {
    pub fn new(transport: HttpTransport, api_base: &str) -> Self {
        Self {
            transport,
            endpoint: format!("{}/user/trainer-chat", api_base.trim_end_matches('/')),
        }
    }

    pub async fn conversations(&self) -> Result<Vec<TrainerConversation>, ApiError> {
        let raw: Vec<RawConversation> = self
            .transport
            .get_json(&format!("{}/conversations", self.endpoint))
            .await?;
        raw.into_iter().map(TrainerConversation::from_raw).collect()
    }

    pub async fn messages(&self, conversation_id: &str) -> Result<Vec<TrainerMessage>, ApiError> {
        let url = format!("{}/conversation/{}/messages", self.endpoint, conversation_id);
        let raw: Vec<RawMessage> = self.transport.get_json(&url).await?;
        raw.into_iter().map(TrainerMessage::from_raw).collect()
    }

    pub async fn send(
        &self,
        conversation_id: &str,
        content: &str,
    ) -> Result<TrainerMessage, ApiError> {
        let url = format!("{}/conversation/{}/message", self.endpoint, conversation_id);
        let raw: RawMessage = self.transport.post_json(&url, &Content { content }).await?;
        TrainerMessage::from_raw(raw)
    }

    /// Open a conversation; `None` uses the default title.
    pub async fn create(&self, title: Option<&str>) -> Result<TrainerConversation, ApiError> {
        let title = title
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_TRAINER_TITLE);
        let raw: RawConversation = self
            .transport
            .post_json(&format!("{}/conversation", self.endpoint), &Title { title })
            .await?;
        TrainerConversation::from_raw(raw)
    }
}
