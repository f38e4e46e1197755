//! Conversation CRUD used by the chat UI.

use tracing::info;

use crate::{
    config::DEFAULT_CONVERSATION_TITLE,
    dto::chat::{
        ConversationDetailResponse, ConversationResponse, CreateConversationRequest,
        MessageResponse,
    },
    error::ServiceError,
    state::SharedState,
};

/// All conversations, newest first.
pub async fn list_conversations(
    state: &SharedState,
) -> Result<Vec<ConversationResponse>, ServiceError> {
    let conversations = state.store().list_conversations().await?;
    Ok(conversations
        .into_iter()
        .map(ConversationResponse::from)
        .collect())
}

/// Open a conversation, defaulting blank titles.
pub async fn create_conversation(
    state: &SharedState,
    request: CreateConversationRequest,
) -> Result<ConversationResponse, ServiceError> {
    let title = request
        .title
        .map(|title| title.trim().to_string())
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| DEFAULT_CONVERSATION_TITLE.to_string());

    let conversation = state.store().create_conversation(title).await?;
    info!(id = conversation.id, "conversation created");
    Ok(conversation.into())
}

/// A conversation with its messages in replay order.
pub async fn get_conversation(
    state: &SharedState,
    id: i32,
) -> Result<ConversationDetailResponse, ServiceError> {
    let conversation = state
        .store()
        .find_conversation(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("conversation {id}")))?;
    let messages = state.store().list_messages(id).await?;

    Ok(ConversationDetailResponse {
        conversation: conversation.into(),
        messages: messages.into_iter().map(MessageResponse::from).collect(),
    })
}

/// Delete a conversation and its messages. Deleting a missing conversation is not an error.
pub async fn delete_conversation(state: &SharedState, id: i32) -> Result<(), ServiceError> {
    let removed = state.store().delete_conversation(id).await?;
    info!(id, removed, "conversation deleted");
    Ok(())
}
