//! Client-side settings for reaching the remote API
//!
//! Also the place where the client pieces get wired together: one set of
//! credentials and one HTTP transport shared by the conversation store and the
//! trainer chat.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::api::{ApiError, Credentials, HttpConversationApi, HttpTransport};
use crate::store::ConversationStore;
use crate::trainer::TrainerChatClient;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Prefix of every API URL; also decides which requests carry the token
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token of the current session
    #[serde(default)]
    pub token: Option<String>,

    /// Per-request timeout. Unset means round-trips may wait indefinitely.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_base_url() -> String {
    "http://localhost:8081/api".to_string()
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            timeout_secs: None,
        }
    }
}

impl ApiSettings {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.base_url.clone(), self.token.clone())
    }

    pub fn transport(&self, credentials: Credentials) -> Result<HttpTransport, ApiError> {
        HttpTransport::new(credentials, self.timeout())
    }

    /// Build the conversation store and the trainer client over one session.
    ///
    /// The store performs its initial load before this returns.
    pub async fn connect(&self) -> Result<ChatClients, ApiError> {
        let credentials = self.credentials();
        let transport = self.transport(credentials.clone())?;

        let api = Arc::new(HttpConversationApi::new(transport.clone(), &self.base_url));
        let conversations = ConversationStore::connect(api).await;
        let trainer = TrainerChatClient::new(transport, &self.base_url);

        Ok(ChatClients {
            credentials,
            conversations,
            trainer,
        })
    }
}

/// Everything a UI needs to talk to the chat endpoints
pub struct ChatClients {
    pub credentials: Credentials,
    pub conversations: ConversationStore,
    pub trainer: TrainerChatClient,
}
