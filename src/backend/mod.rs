//! Development backend
//!
//! A local implementation of the conversation API, backed by SQLite, so the
//! client can be exercised end to end without the production server.

mod repository;
mod responder;
mod routes;

use std::sync::Arc;

use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use repository::{ChatRepository, RepositoryError, StoredConversation, StoredMessage};
pub use responder::{EchoResponder, OllamaResponder, Responder, ResponderError};
pub use routes::router;

/// State shared across handlers
#[derive(Clone)]
pub struct BackendState {
    pub repository: Arc<ChatRepository>,
    pub responder: Arc<dyn Responder>,
    /// Bearer token every `/api` request must carry; `None` disables the check
    pub token: Option<String>,
}

/// Serve the backend on an already-bound listener until the process stops
pub async fn serve(listener: TcpListener, state: BackendState) -> std::io::Result<()> {
    let app = router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    axum::serve(listener, app).await
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Start an in-memory backend on a random port and return its API base URL
    pub async fn spawn_backend(token: Option<&str>) -> String {
        let state = BackendState {
            repository: Arc::new(ChatRepository::in_memory().await.unwrap()),
            responder: Arc::new(EchoResponder),
            token: token.map(String::from),
        };
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            serve(listener, state).await.unwrap();
        });
        format!("http://{}/api", addr)
    }
}
