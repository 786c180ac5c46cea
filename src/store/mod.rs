//! Client-side conversation store
//!
//! Holds the conversation list the UI renders and keeps it in step with the
//! server. Every change republishes the whole list through a `watch` channel;
//! subscribers always receive full snapshots, never deltas.
//!
//! Round-trips are not serialized. Local edits (`create`, `delete`,
//! `set_active`) patch whatever list is current when they complete, while
//! `refresh` replaces it wholesale with the server's answer. A refresh that was
//! issued before a `create` completed, but lands after it, therefore drops the
//! created entry until the next refresh: the last completion wins.

use std::sync::Arc;

use futures::Stream;
use tokio::sync::watch;

use crate::api::{ApiError, ConversationApi};
use crate::conversation::{Attachment, Conversation, Message};

/// Cheaply cloneable handle to the shared conversation cache
#[derive(Clone)]
pub struct ConversationStore {
    api: Arc<dyn ConversationApi>,
    conversations: Arc<watch::Sender<Vec<Conversation>>>,
}

impl ConversationStore {
    /// Create an empty store. Nothing is fetched until `refresh` is called.
    pub fn new(api: Arc<dyn ConversationApi>) -> Self {
        let (conversations, _) = watch::channel(Vec::new());
        Self {
            api,
            conversations: Arc::new(conversations),
        }
    }

    /// Create a store and try an initial load.
    ///
    /// A failed load is logged and leaves the store empty.
    pub async fn connect(api: Arc<dyn ConversationApi>) -> Self {
        let store = Self::new(api);
        if let Err(e) = store.refresh().await {
            tracing::warn!(error = %e, "Could not load conversations on startup");
        }
        store
    }

    /// Current cached list, no round-trip
    pub fn snapshot(&self) -> Vec<Conversation> {
        self.conversations.borrow().clone()
    }

    /// Stream of full snapshots: the current list first, then one per republish.
    ///
    /// A subscriber that falls behind skips straight to the newest snapshot.
    pub fn subscribe(&self) -> impl Stream<Item = Vec<Conversation>> + Send + 'static {
        let mut rx = self.conversations.subscribe();
        async_stream::stream! {
            let current = rx.borrow_and_update().clone();
            yield current;
            while rx.changed().await.is_ok() {
                let next = rx.borrow_and_update().clone();
                yield next;
            }
        }
    }

    /// Reload the list from the server and republish it in server order.
    ///
    /// On failure the cache is left as it was.
    pub async fn refresh(&self) -> Result<Vec<Conversation>, ApiError> {
        let raw = self.api.list_conversations().await.map_err(|e| {
            tracing::error!(error = %e, "Error fetching conversations");
            e
        })?;

        let conversations: Vec<Conversation> =
            raw.into_iter().map(Conversation::from_raw).collect();

        tracing::debug!(count = conversations.len(), "Conversations refreshed");
        self.conversations.send_replace(conversations.clone());
        Ok(conversations)
    }

    /// Fetch the messages of one conversation. Always a fresh round-trip.
    pub async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, ApiError> {
        let raw = self
            .api
            .list_messages(conversation_id)
            .await
            .map_err(|e| {
                tracing::error!(conversation_id, error = %e, "Error fetching messages");
                e
            })?;

        raw.into_iter()
            .map(|m| Message::from_raw(m, conversation_id))
            .collect()
    }

    /// Post a message and return the server's record of it.
    ///
    /// Afterwards the list is refreshed in the background so the last-message
    /// summary catches up; that refresh's outcome is not reported. Callers must
    /// not send empty content.
    pub async fn send(&self, conversation_id: &str, content: &str) -> Result<Message, ApiError> {
        self.send_with_attachments(conversation_id, content, &[]).await
    }

    /// `send` with attachments carried alongside the text
    pub async fn send_with_attachments(
        &self,
        conversation_id: &str,
        content: &str,
        attachments: &[Attachment],
    ) -> Result<Message, ApiError> {
        let raw = self
            .api
            .post_message(conversation_id, content, attachments)
            .await
            .map_err(|e| {
                tracing::error!(conversation_id, error = %e, "Error sending message");
                e
            })?;
        let message = Message::from_raw(raw, conversation_id)?;

        let store = self.clone();
        tokio::spawn(async move {
            if let Err(e) = store.refresh().await {
                tracing::warn!(error = %e, "Background refresh after send failed");
            }
        });

        Ok(message)
    }

    /// Create a conversation and put it at the head of the list.
    pub async fn create(&self, title: &str) -> Result<Conversation, ApiError> {
        let raw = self.api.create_conversation(title).await.map_err(|e| {
            tracing::error!(error = %e, "Error creating conversation");
            e
        })?;
        let conversation = Conversation::from_raw(raw);

        self.conversations.send_modify(|list| {
            list.insert(0, conversation.clone());
        });
        Ok(conversation)
    }

    /// Mark `conversation_id` as the active one and every other entry inactive.
    ///
    /// Purely local. Always reports success, even when the id is unknown (the
    /// list then ends up with nothing active).
    pub fn set_active(&self, conversation_id: &str) -> bool {
        self.conversations.send_modify(|list| {
            for conversation in list.iter_mut() {
                conversation.is_active = conversation.id == conversation_id;
            }
        });
        true
    }

    /// Delete a conversation on the server, then drop it from the list.
    pub async fn delete(&self, conversation_id: &str) -> Result<(), ApiError> {
        self.api
            .delete_conversation(conversation_id)
            .await
            .map_err(|e| {
                tracing::error!(conversation_id, error = %e, "Error deleting conversation");
                e
            })?;

        self.conversations.send_modify(|list| {
            list.retain(|c| c.id != conversation_id);
        });
        Ok(())
    }
}
