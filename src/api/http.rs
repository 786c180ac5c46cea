//! HTTP implementation of the conversation API

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::conversation::{Attachment, RawConversation, RawMessage};

use super::{ApiError, ConversationApi, Credentials};

#[derive(Debug, Serialize)]
struct NewMessage<'a> {
    content: &'a str,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    attachments: &'a [Attachment],
}

#[derive(Debug, Serialize)]
struct NewConversation<'a> {
    title: &'a str,
}

/// Authenticated JSON-over-HTTP plumbing shared by the API clients
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    credentials: Credentials,
}

impl HttpTransport {
    /// `timeout` of `None` lets a round-trip wait forever, like the browser client did.
    pub fn new(credentials: Credentials, timeout: Option<Duration>) -> Result<Self, ApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            credentials,
        })
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        let response = self.execute(self.client.get(url), url).await?;
        decode(response).await
    }

    pub async fn post_json<B, T>(&self, url: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.execute(self.client.post(url).json(body), url).await?;
        decode(response).await
    }

    pub async fn delete(&self, url: &str) -> Result<(), ApiError> {
        self.execute(self.client.delete(url), url).await?;
        Ok(())
    }

    async fn execute(&self, request: RequestBuilder, url: &str) -> Result<Response, ApiError> {
        tracing::debug!(url, "API request");

        let response = self.credentials.authorize(request, url).send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            self.credentials.reject();
            return Err(ApiError::Unauthorized);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| {
        ApiError::InvalidResponse(format!("Failed to parse response: {} - Body: {}", e, body))
    })
}

/// Conversation endpoints under `{api_base}/user/chat`
pub struct HttpConversationApi {
    transport: HttpTransport,
    endpoint: String,
}

impl HttpConversationApi {
    pub fn new(transport: HttpTransport, api_base: &str) -> Self {
        Self {
            transport,
            endpoint: format!("{}/user/chat", api_base.trim_end_matches('/')),
        }
    }

    fn conversations_url(&self) -> String {
        format!("{}/conversations", self.endpoint)
    }

    fn conversation_url(&self, conversation_id: &str) -> String {
        format!("{}/conversations/{}", self.endpoint, conversation_id)
    }
}

#[async_trait]
impl ConversationApi for HttpConversationApi {
    async fn list_conversations(&self) -> Result<Vec<RawConversation>, ApiError> {
        self.transport.get_json(&self.conversations_url()).await
    }

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<RawMessage>, ApiError> {
        let url = format!("{}/messages", self.conversation_url(conversation_id));
        self.transport.get_json(&url).await
    }

    async fn post_message(
        &self,
        conversation_id: &str,
        content: &str,
        attachments: &[Attachment],
    ) -> Result<RawMessage, ApiError> {
        let url = format!("{}/messages", self.conversation_url(conversation_id));
        self.transport
            .post_json(
                &url,
                &NewMessage {
                    content,
                    attachments,
                },
            )
            .await
    }

    async fn create_conversation(&self, title: &str) -> Result<RawConversation, ApiError> {
        self.transport
            .post_json(&self.conversations_url(), &NewConversation { title })
            .await
    }

    async fn delete_conversation(&self, conversation_id: &str) -> Result<(), ApiError> {
        self.transport
            .delete(&self.conversation_url(conversation_id))
            .await
    }
}
