use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State, rejection::PathRejection},
    http::StatusCode,
    routing::get,
};

use crate::{
    dto::chat::{ConversationDetailResponse, ConversationResponse, CreateConversationRequest},
    error::AppError,
    services::conversation_service,
    state::SharedState,
};

/// Routes for conversation CRUD.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route(
            "/api/conversations",
            get(list_conversations).post(create_conversation),
        )
        .route(
            "/api/conversations/{id}",
            get(get_conversation).delete(delete_conversation),
        )
}

/// List every conversation, newest first.
#[utoipa::path(
    get,
    path = "/api/conversations",
    tag = "conversations",
    responses((status = 200, description = "Conversations", body = [ConversationResponse]))
)]
pub async fn list_conversations(
    State(state): State<SharedState>,
) -> Result<Json<Vec<ConversationResponse>>, AppError> {
    let conversations = conversation_service::list_conversations(&state).await?;
    Ok(Json(conversations))
}

/// Open a conversation. The body may be omitted entirely.
#[utoipa::path(
    post,
    path = "/api/conversations",
    tag = "conversations",
    request_body(content = CreateConversationRequest, description = "Optional title"),
    responses(
        (status = 201, description = "Conversation created", body = ConversationResponse),
        (status = 400, description = "Malformed body")
    )
)]
pub async fn create_conversation(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<(StatusCode, Json<ConversationResponse>), AppError> {
    let request = parse_optional_body(&body)?;
    let conversation = conversation_service::create_conversation(&state, request).await?;
    Ok((StatusCode::CREATED, Json(conversation)))
}

/// Fetch a conversation with its messages in replay order.
#[utoipa::path(
    get,
    path = "/api/conversations/{id}",
    tag = "conversations",
    params(("id" = i32, Path, description = "Conversation identifier")),
    responses(
        (status = 200, description = "Conversation and messages", body = ConversationDetailResponse),
        (status = 404, description = "Unknown conversation")
    )
)]
pub async fn get_conversation(
    State(state): State<SharedState>,
    id: Result<Path<i32>, PathRejection>,
) -> Result<Json<ConversationDetailResponse>, AppError> {
    let Path(id) = id?;
    let conversation = conversation_service::get_conversation(&state, id).await?;
    Ok(Json(conversation))
}

/// Delete a conversation and all of its messages.
#[utoipa::path(
    delete,
    path = "/api/conversations/{id}",
    tag = "conversations",
    params(("id" = i32, Path, description = "Conversation identifier")),
    responses((status = 204, description = "Conversation deleted (or already gone)"))
)]
pub async fn delete_conversation(
    State(state): State<SharedState>,
    id: Result<Path<i32>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(id) = id?;
    conversation_service::delete_conversation(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn parse_optional_body(body: &[u8]) -> Result<CreateConversationRequest, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(CreateConversationRequest::default());
    }

    serde_json::from_slice(body).map_err(|err| AppError::BadRequest {
        message: format!("Failed to parse the request body as JSON: {err}"),
        field: None,
    })
}
