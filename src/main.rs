//! Coach chat development backend
//!
//! Serves the conversation API locally so the client and UI can run without
//! the production server.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coach_chat::backend::{self, BackendState, ChatRepository};
use coach_chat::config::{Config, ResponderKind};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coach_chat=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let settings = &config.backend;
    let addr: SocketAddr = format!("{}:{}", settings.host, settings.port).parse()?;

    let repository = Arc::new(ChatRepository::open(&settings.database_path()).await?);
    tracing::info!("Database at {}", settings.database_path().display());

    if settings.responder == ResponderKind::Ollama {
        tracing::info!("Replies from Ollama model {} at {}", settings.model, settings.ollama_url);
    }
    if settings.token.is_none() {
        tracing::warn!("COACH_BACKEND_TOKEN not set, API is open to any caller");
    }

    let state = BackendState {
        repository,
        responder: settings.responder(),
        token: settings.token.clone(),
    };

    tracing::info!("Coach chat backend running at http://{}/api/user/chat", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    backend::serve(listener, state).await?;

    Ok(())
}
