//! Client abstraction over the external chat-completion provider.

mod error;
pub mod openai;

use futures::{future::BoxFuture, stream::BoxStream};
use serde::Serialize;

use crate::dao::models::MessageRole;

pub use error::{UpstreamError, UpstreamResult};

/// Ordered, finite sequence of text fragments produced by a streaming completion.
pub type FragmentStream = BoxStream<'static, UpstreamResult<String>>;

/// One element of a multi-part user turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

/// Reference to an image the model should look at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

/// Body of a chat turn: plain text, or text and images for vision-capable models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TurnContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// One message of the context sent to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatTurn {
    #[serde(serialize_with = "serialize_role")]
    pub role: MessageRole,
    pub content: TurnContent,
}

impl ChatTurn {
    /// Plain-text turn.
    pub fn text(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: TurnContent::Text(content.into()),
        }
    }
}

fn serialize_role<S>(role: &MessageRole, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(role.as_str())
}

/// Provider of model completions, injected into the application state.
pub trait CompletionClient: Send + Sync {
    /// Request a whole completion in one response.
    fn complete(&self, turns: Vec<ChatTurn>) -> BoxFuture<'static, UpstreamResult<String>>;
    /// Open a streaming completion. Errors before the first fragment are returned
    /// from the future; later ones are items of the stream.
    fn stream(&self, turns: Vec<ChatTurn>) -> BoxFuture<'static, UpstreamResult<FragmentStream>>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn multi_part_turn_serializes_like_the_provider_expects() {
        let turn = ChatTurn {
            role: MessageRole::User,
            content: TurnContent::Parts(vec![
                ContentPart::Text {
                    text: "what is this?".into(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: "https://example.com/cat.png".into(),
                    },
                },
            ]),
        };

        assert_eq!(
            serde_json::to_value(&turn).unwrap(),
            json!({
                "role": "user",
                "content": [
                    {"type": "text", "text": "what is this?"},
                    {"type": "image_url", "image_url": {"url": "https://example.com/cat.png"}}
                ]
            })
        );
    }

    #[test]
    fn text_turn_serializes_as_string_content() {
        let turn = ChatTurn::text(MessageRole::System, "be nice");
        assert_eq!(
            serde_json::to_value(&turn).unwrap(),
            json!({"role": "system", "content": "be nice"})
        );
    }
}
