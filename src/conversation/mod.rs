//! Conversation types and wire normalization
//!
//! The remote API speaks in loosely-typed records (`Raw*`): most fields are
//! optional, senders are uppercase, timestamps are strings. Everything handed to
//! UI consumers goes through `from_raw` first.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::ApiError;

pub const DEFAULT_CONVERSATION_TITLE: &str = "New conversation";
pub const DEFAULT_ATTACHMENT_TITLE: &str = "Attachment";

/// Who wrote a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

impl Sender {
    /// Map a wire sender (`"AI"`, `"ai"`, `"USER"`, ...) to its canonical form.
    /// Anything that is not recognisably the assistant is the human.
    pub fn normalize(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(s) if s.eq_ignore_ascii_case("ai") || s.eq_ignore_ascii_case("assistant") => {
                Sender::Ai
            }
            _ => Sender::User,
        }
    }

    /// Uppercase form used on the wire
    pub fn as_wire(&self) -> &'static str {
        match self {
            Sender::User => "USER",
            Sender::Ai => "AI",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Suggestion,
    Feedback,
}

impl MessageKind {
    fn normalize(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("suggestion") => MessageKind::Suggestion,
            Some("feedback") => MessageKind::Feedback,
            _ => MessageKind::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    #[default]
    Link,
    Document,
    Exercise,
    Audio,
}

impl AttachmentKind {
    fn normalize(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("document") => AttachmentKind::Document,
            Some("exercise") => AttachmentKind::Exercise,
            Some("audio") => AttachmentKind::Audio,
            _ => AttachmentKind::Link,
        }
    }
}

/// Conversation summary as held by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub last_message: String,
    pub last_message_date: DateTime<Utc>,
    pub messages_count: u32,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Client-side selection, never sent to the server
    #[serde(default)]
    pub is_active: bool,
}

impl Conversation {
    /// Normalize a wire summary. A bad date only costs that field: the last
    /// message date falls back to now and the audit dates to `None`.
    pub fn from_raw(raw: RawConversation) -> Self {
        let last_message_date =
            lenient_timestamp(&raw.id, "lastMessageDate", raw.last_message_date.as_deref())
                .unwrap_or_else(Utc::now);
        let created_at = lenient_timestamp(&raw.id, "createdAt", raw.created_at.as_deref());
        let updated_at = lenient_timestamp(&raw.id, "updatedAt", raw.updated_at.as_deref());

        Self {
            id: raw.id,
            user_id: raw.user_id.unwrap_or_default(),
            title: raw
                .title
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_CONVERSATION_TITLE.to_string()),
            last_message: raw.last_message.unwrap_or_default(),
            last_message_date,
            messages_count: raw.messages_count.unwrap_or(0),
            created_at,
            updated_at,
            is_active: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    pub title: String,
    pub url: String,
}

impl From<RawAttachment> for Attachment {
    fn from(raw: RawAttachment) -> Self {
        Self {
            id: raw.id,
            kind: AttachmentKind::normalize(raw.kind.as_deref()),
            title: raw
                .title
                .unwrap_or_else(|| DEFAULT_ATTACHMENT_TITLE.to_string()),
            url: raw.url.unwrap_or_default(),
        }
    }
}

/// One turn of a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender: Sender,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub attachments: Vec<Attachment>,
}

impl Message {
    /// Normalize a wire message. `conversation_id` fills in for servers that
    /// omit the parent id.
    pub fn from_raw(raw: RawMessage, conversation_id: &str) -> Result<Self, ApiError> {
        Ok(Self {
            id: raw.id,
            conversation_id: raw
                .conversation_id
                .unwrap_or_else(|| conversation_id.to_string()),
            sender: Sender::normalize(raw.sender.as_deref()),
            content: raw.content.unwrap_or_default(),
            timestamp: timestamp_or_now(raw.timestamp.as_deref())?,
            kind: MessageKind::normalize(raw.kind.as_deref()),
            attachments: raw
                .attachments
                .unwrap_or_default()
                .into_iter()
                .map(Attachment::from)
                .collect(),
        })
    }
}

/// Conversation record as sent by the server
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawConversation {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Message record as sent by the server
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<RawAttachment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawAttachment {
    pub id: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Parse a serialized timestamp.
///
/// Accepts RFC 3339 and zone-less ISO-8601 date-times, the latter read as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| ApiError::InvalidResponse(format!("bad timestamp {:?}: {}", raw, e)))
}

fn lenient_timestamp(
    conversation_id: &str,
    field: &'static str,
    raw: Option<&str>,
) -> Option<DateTime<Utc>> {
    let raw = raw.filter(|s| !s.trim().is_empty())?;
    match parse_timestamp(raw) {
        Ok(ts) => Some(ts),
        Err(e) => {
            tracing::warn!(conversation_id, field, "Ignoring conversation date: {}", e);
            None
        }
    }
}

fn timestamp_or_now(raw: Option<&str>) -> Result<DateTime<Utc>, ApiError> {
    match raw {
        Some(s) if !s.trim().is_empty() => parse_timestamp(s),
        _ => Ok(Utc::now()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn raw_message(sender: &str) -> RawMessage {
        RawMessage {
            id: "m1".into(),
            sender: Some(sender.into()),
            content: Some("hi".into()),
            timestamp: Some("2024-01-01T00:00:00Z".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_sender_normalization_ignores_case() {
        for raw in ["AI", "ai", "Ai", "aI", "ASSISTANT"] {
            assert_eq!(Sender::normalize(Some(raw)), Sender::Ai, "{raw}");
        }
        for raw in ["USER", "user", "User", "TRAINER", ""] {
            assert_eq!(Sender::normalize(Some(raw)), Sender::User, "{raw}");
        }
        assert_eq!(Sender::normalize(None), Sender::User);
    }

    #[test]
    fn test_sender_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Sender::Ai).unwrap(), "\"ai\"");
        assert_eq!(serde_json::to_string(&Sender::User).unwrap(), "\"user\"");
    }

    #[test]
    fn test_ai_message_scenario() {
        let msg = Message::from_raw(raw_message("AI"), "c1").unwrap();

        assert_eq!(msg.sender, Sender::Ai);
        assert_eq!(msg.content, "hi");
        assert_eq!(msg.timestamp, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(msg.conversation_id, "c1");
        assert_eq!(msg.kind, MessageKind::Text);
        assert!(msg.attachments.is_empty());
    }

    #[test]
    fn test_message_keeps_server_conversation_id() {
        let mut raw = raw_message("USER");
        raw.conversation_id = Some("server-side".into());

        let msg = Message::from_raw(raw, "requested").unwrap();
        assert_eq!(msg.conversation_id, "server-side");
        assert_eq!(msg.sender, Sender::User);
    }

    #[test]
    fn test_zoneless_timestamp_is_utc() {
        let ts = parse_timestamp("2024-03-05T10:20:30.123").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-03-05T10:20:30.123+00:00");

        let offset = parse_timestamp("2024-03-05T12:20:30+02:00").unwrap();
        assert_eq!(offset, Utc.with_ymd_and_hms(2024, 3, 5, 10, 20, 30).unwrap());
    }

    #[test]
    fn test_invalid_timestamp_is_rejected() {
        let mut raw = raw_message("AI");
        raw.timestamp = Some("yesterday".into());

        let err = Message::from_raw(raw, "c1").unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[test]
    fn test_missing_timestamp_defaults_to_now() {
        let mut raw = raw_message("AI");
        raw.timestamp = None;

        let before = Utc::now();
        let msg = Message::from_raw(raw, "c1").unwrap();
        assert!(msg.timestamp >= before);
    }

    #[test]
    fn test_attachments_normalized() {
        let raw: RawMessage = serde_json::from_value(serde_json::json!({
            "id": "m1",
            "sender": "AI",
            "type": "SUGGESTION",
            "attachments": [
                { "id": "a1", "type": "DOCUMENT", "title": "Slides", "url": "http://x/y.pdf" },
                { "id": "a2", "type": "hologram" }
            ]
        }))
        .unwrap();

        let msg = Message::from_raw(raw, "c1").unwrap();
        assert_eq!(msg.kind, MessageKind::Suggestion);
        assert_eq!(msg.attachments[0].kind, AttachmentKind::Document);
        assert_eq!(msg.attachments[0].title, "Slides");
        assert_eq!(msg.attachments[1].kind, AttachmentKind::Link);
        assert_eq!(msg.attachments[1].title, DEFAULT_ATTACHMENT_TITLE);
        assert_eq!(msg.attachments[1].url, "");
    }

    #[test]
    fn test_conversation_defaults() {
        let raw: RawConversation = serde_json::from_value(serde_json::json!({
            "id": "c1",
            "title": "",
            "lastMessageDate": "2024-02-01T08:00:00Z",
            "messagesCount": 4
        }))
        .unwrap();

        let conv = Conversation::from_raw(raw);
        assert_eq!(conv.title, DEFAULT_CONVERSATION_TITLE);
        assert_eq!(conv.user_id, "");
        assert_eq!(conv.messages_count, 4);
        assert_eq!(
            conv.last_message_date,
            Utc.with_ymd_and_hms(2024, 2, 1, 8, 0, 0).unwrap()
        );
        assert!(!conv.is_active);
        assert!(conv.created_at.is_none());
    }

    #[test]
    fn test_conversation_with_bad_dates_still_normalizes() {
        let raw: RawConversation = serde_json::from_value(serde_json::json!({
            "id": "c1",
            "title": "Mobility",
            "lastMessageDate": "last tuesday",
            "createdAt": "2024-02-01T08:00:00Z",
            "updatedAt": "not a date"
        }))
        .unwrap();

        let before = Utc::now();
        let conv = Conversation::from_raw(raw);
        assert_eq!(conv.title, "Mobility");
        assert!(conv.last_message_date >= before);
        assert_eq!(
            conv.created_at,
            Some(Utc.with_ymd_and_hms(2024, 2, 1, 8, 0, 0).unwrap())
        );
        assert_eq!(conv.updated_at, None);
    }

    #[test]
    fn test_raw_conversation_skips_absent_fields() {
        let raw = RawConversation {
            id: "c1".into(),
            title: Some("Hello".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&raw).unwrap();
        assert_eq!(json, serde_json::json!({ "id": "c1", "title": "Hello" }));
    }
}
