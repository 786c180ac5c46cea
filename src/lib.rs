//! Coach chat client
//!
//! Client-side conversation store for the coaching assistant chat, the REST
//! client it sits on, and a development backend implementing the same API.

pub mod api;
pub mod backend;
pub mod config;
pub mod conversation;
pub mod store;
pub mod trainer;

pub use api::{ApiError, ConversationApi, Credentials};
pub use config::Config;
pub use conversation::{Conversation, Message, Sender};
pub use store::ConversationStore;
pub use trainer::TrainerChatClient;
