//! Assistant replies for the development backend

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conversation::Sender;

use super::repository::StoredMessage;

const SYSTEM_PROMPT: &str = "You are a supportive coaching assistant. \
Answer the learner's questions clearly and suggest concrete next steps.";

#[derive(Debug, Error)]
pub enum ResponderError {
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Produces the assistant's answer to a conversation
#[async_trait]
pub trait Responder: Send + Sync {
    /// `history` is the whole conversation, oldest first, ending with the
    /// learner's new message.
    async fn reply(&self, history: &[StoredMessage]) -> Result<String, ResponderError>;
}

/// Answers by quoting the learner. Needs no model.
pub struct EchoResponder;

#[async_trait]
impl Responder for EchoResponder {
    async fn reply(&self, history: &[StoredMessage]) -> Result<String, ResponderError> {
        let last = history
            .iter()
            .rev()
            .find(|m| m.sender == Sender::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        Ok(format!("You said: {}", last))
    }
}

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
}

/// Replies generated by a local Ollama model
pub struct OllamaResponder {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaResponder {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    fn build_request(&self, history: &[StoredMessage]) -> OllamaRequest {
        let mut messages = vec![OllamaMessage {
            role: "system".to_string(),
            content: SYSTEM_PROMPT.to_string(),
        }];
        messages.extend(history.iter().map(|m| OllamaMessage {
            role: match m.sender {
                Sender::User => "user".to_string(),
                Sender::Ai => "assistant".to_string(),
            },
            content: m.content.clone(),
        }));

        OllamaRequest {
            model: self.model.clone(),
            messages,
            stream: false,
        }
    }
}

#[async_trait]
impl Responder for OllamaResponder {
    async fn reply(&self, history: &[StoredMessage]) -> Result<String, ResponderError> {
        let request = self.build_request(history);

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url.trim_end_matches('/')))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ResponderError::InvalidResponse(format!(
                "{}: {}",
                status, body
            )));
        }

        let ollama_response: OllamaResponse = response.json().await?;
        Ok(ollama_response.message.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use serde_json::{json, Value};

    fn message(sender: Sender, content: &str) -> StoredMessage {
        StoredMessage {
            id: content.to_string(),
            conversation_id: "c1".into(),
            sender,
            content: content.into(),
            attachments: Vec::new(),
            created_at: "2024-01-01T00:00:00.000000Z".into(),
        }
    }

    #[tokio::test]
    async fn test_echo_quotes_last_user_message() {
        let history = [
            message(Sender::User, "first"),
            message(Sender::Ai, "reply"),
            message(Sender::User, "second"),
        ];
        let reply = EchoResponder.reply(&history).await.unwrap();
        assert_eq!(reply, "You said: second");
    }

    #[test]
    fn test_ollama_request_roles() {
        let responder = OllamaResponder::new("http://localhost:11434", "llama3.2");
        let request = responder.build_request(&[
            message(Sender::User, "hi"),
            message(Sender::Ai, "hello"),
        ]);

        let roles: Vec<&str> = request.messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, ["system", "user", "assistant"]);
        assert_eq!(request.model, "llama3.2");
        assert!(!request.stream);
    }

    #[tokio::test]
    async fn test_ollama_reply_from_server() {
        let app = Router::new().route(
            "/api/chat",
            post(|Json(body): Json<Value>| async move {
                let turns = body["messages"].as_array().map(Vec::len).unwrap_or(0);
                Json(json!({
                    "message": { "role": "assistant", "content": format!("{turns} turns") }
                }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let responder = OllamaResponder::new(format!("http://{}", addr), "llama3.2");
        let reply = responder
            .reply(&[message(Sender::User, "hi")])
            .await
            .unwrap();
        assert_eq!(reply, "2 turns");
    }
}
