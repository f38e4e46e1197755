use axum::{Router, http::Uri};

use crate::{error::AppError, state::SharedState};

pub mod chat;
pub mod conversations;
pub mod docs;
pub mod health;
pub mod scores;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(scores::router())
        .merge(conversations::router())
        .merge(chat::router());

    let docs_router = docs::router(state.clone());

    api_router
        .merge(docs_router)
        .method_not_allowed_fallback(method_not_allowed)
        .fallback(not_found)
        .with_state(state)
}

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("no route for {}", uri.path()))
}

async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}
