use axum::{
    Json, Router,
    extract::{Path, State, rejection::{JsonRejection, PathRejection}},
    http::{HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    routing::post,
};
use tracing::info;

use crate::{
    dto::chat::{ChatRequest, SendMessageRequest},
    error::AppError,
    services::{chat_service, sse_service},
    state::SharedState,
};

/// Header carrying the conversation a `/api/chat` turn was stored in.
pub const CONVERSATION_ID_HEADER: &str = "x-conversation-id";

/// Routes for the chat relay.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/conversations/{id}/messages", post(send_message))
        .route("/api/chat", post(chat))
}

/// Send a user turn to an existing conversation and relay the assistant reply.
///
/// Answers with an event stream of `{"content"}` fragments closed by `{"done": true}`
/// (or `{"error"}`), or with one buffered JSON body when streaming is disabled.
#[utoipa::path(
    post,
    path = "/api/conversations/{id}/messages",
    tag = "chat",
    params(("id" = i32, Path, description = "Conversation identifier")),
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "Assistant reply as an event stream, or a buffered ChatReply when streaming is disabled", content_type = "text/event-stream", body = String),
        (status = 400, description = "Neither content nor image given, or invalid image URL"),
        (status = 404, description = "Unknown conversation"),
        (status = 500, description = "Storage or model failure before streaming started")
    )
)]
pub async fn send_message(
    State(state): State<SharedState>,
    id: Result<Path<i32>, PathRejection>,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Path(id) = id?;
    let Json(payload) = payload?;
    relay(&state, Some(id), payload).await
}

/// Send a user turn, opening a new conversation when `conversationId` is absent.
#[utoipa::path(
    post,
    path = "/api/chat",
    tag = "chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Assistant reply as an event stream, or a buffered ChatReply when streaming is disabled; `x-conversation-id` names the conversation", content_type = "text/event-stream", body = String),
        (status = 400, description = "Neither content nor image given, or invalid image URL"),
        (status = 404, description = "Unknown conversation"),
        (status = 500, description = "Storage or model failure before streaming started")
    )
)]
pub async fn chat(
    State(state): State<SharedState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(ChatRequest {
        conversation_id,
        message,
    }) = payload?;
    relay(&state, conversation_id, message).await
}

async fn relay(
    state: &SharedState,
    conversation_id: Option<i32>,
    message: SendMessageRequest,
) -> Result<Response, AppError> {
    let turn = chat_service::prepare_turn(state, conversation_id, message).await?;
    let conversation_id = turn.conversation_id();
    let header = [(
        HeaderName::from_static(CONVERSATION_ID_HEADER),
        HeaderValue::from(conversation_id),
    )];

    if state.config().chat.streaming {
        let receiver = chat_service::open_stream(state, turn).await?;
        info!(conversation_id, "streaming chat reply");
        Ok((header, sse_service::to_sse_stream(receiver)).into_response())
    } else {
        let reply = chat_service::reply_buffered(state, turn).await?;
        Ok((header, Json(reply)).into_response())
    }
}
