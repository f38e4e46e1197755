//! DTO definitions for conversations and the chat relay.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    dao::models::{ConversationEntity, MessageEntity},
    dto::{format_timestamp, validation::validate_image_url},
};

/// Payload used to open a new conversation.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CreateConversationRequest {
    /// Optional title; blank or missing titles become "New Chat".
    #[serde(default)]
    pub title: Option<String>,
}

/// Conversation metadata.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResponse {
    pub id: i32,
    pub title: String,
    /// RFC 3339 timestamp.
    pub created_at: String,
}

impl From<ConversationEntity> for ConversationResponse {
    fn from(entity: ConversationEntity) -> Self {
        Self {
            id: entity.id,
            title: entity.title,
            created_at: format_timestamp(entity.created_at),
        }
    }
}

/// One stored chat message.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub id: i32,
    pub conversation_id: i32,
    /// `user`, `assistant` or `system`.
    pub role: String,
    pub content: String,
    pub created_at: String,
}

impl From<MessageEntity> for MessageResponse {
    fn from(entity: MessageEntity) -> Self {
        Self {
            id: entity.id,
            conversation_id: entity.conversation_id,
            role: entity.role.to_string(),
            content: entity.content,
            created_at: format_timestamp(entity.created_at),
        }
    }
}

/// Conversation together with its messages in replay order.
#[derive(Debug, Serialize, ToSchema)]
pub struct ConversationDetailResponse {
    #[serde(flatten)]
    pub conversation: ConversationResponse,
    pub messages: Vec<MessageResponse>,
}

/// A user turn: text, an image reference, or both.
#[derive(Debug, Default, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[serde(default)]
    pub content: Option<String>,
    /// HTTP(S) or `data:` URL of an image to show the model.
    #[serde(default)]
    pub image_url: Option<String>,
}

impl SendMessageRequest {
    /// Text content, with empty strings treated as absent.
    pub fn text(&self) -> Option<&str> {
        self.content.as_deref().filter(|text| !text.trim().is_empty())
    }

    /// Image reference, with empty strings treated as absent.
    pub fn image(&self) -> Option<&str> {
        self.image_url.as_deref().filter(|url| !url.trim().is_empty())
    }
}

impl Validate for SendMessageRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.text().is_none() && self.image().is_none() {
            let mut err = ValidationError::new("content_required");
            err.message = Some("Message needs text content or an image".into());
            errors.add("content", err);
        }

        if let Some(url) = self.image() {
            if let Err(e) = validate_image_url(url) {
                errors.add("image_url", e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Message sent without a path-bound conversation; a new one is opened when
/// `conversationId` is absent.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub conversation_id: Option<i32>,
    #[serde(flatten)]
    pub message: SendMessageRequest,
}

/// Buffered relay reply.
#[derive(Debug, Serialize, ToSchema)]
pub struct ChatReply {
    pub content: String,
    pub done: bool,
}
