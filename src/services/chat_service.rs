//! Chat Relay: stores the user turn, asks the model, forwards its reply and stores it.

use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{info, warn};
use validator::Validate;

use crate::{
    config::DEFAULT_CONVERSATION_TITLE,
    dao::{
        completion::{ChatTurn, ContentPart, FragmentStream, ImageUrl, TurnContent},
        models::{MessageEntity, MessageRole, NewMessage},
        storage::StorageError,
    },
    dto::chat::{ChatReply, SendMessageRequest},
    error::ServiceError,
    state::{RelayProgress, RelayStage, SharedState, relay::InvalidRelayTransition},
};

/// Stored content for a turn that only carries an image.
pub const IMAGE_PLACEHOLDER: &str = "[Image]";
/// Fragments buffered between the relay task and the HTTP response.
const RELAY_CHANNEL_CAPACITY: usize = 16;

/// Item pushed from the relay task to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    /// Next piece of model output, in arrival order.
    Fragment(String),
    /// The reply is complete and stored.
    Done,
    /// The relay stopped after streaming had begun.
    Failed(String),
}

/// A user turn that has been stored and is ready to send to the model.
#[derive(Debug)]
pub struct PreparedTurn {
    conversation_id: i32,
    turns: Vec<ChatTurn>,
    progress: RelayProgress,
}

impl PreparedTurn {
    /// Conversation the turn belongs to (possibly created for it).
    pub fn conversation_id(&self) -> i32 {
        self.conversation_id
    }
}

/// Resolve the conversation, store the user turn and assemble the model context.
///
/// An absent `conversation_id` opens a new conversation; an unknown one fails with
/// [`ServiceError::NotFound`] before anything is written.
pub async fn prepare_turn(
    state: &SharedState,
    conversation_id: Option<i32>,
    request: SendMessageRequest,
) -> Result<PreparedTurn, ServiceError> {
    request.validate()?;

    let mut progress = RelayProgress::new();
    match resolve_and_load(state, conversation_id, &request, &mut progress).await {
        Ok(turn) => Ok(turn),
        Err(err) => {
            let stage = progress.fail();
            warn!(
                conversation_id = ?progress.conversation_id(),
                ?stage,
                error = %err,
                "chat relay failed before the model call"
            );
            Err(err)
        }
    }
}

async fn resolve_and_load(
    state: &SharedState,
    conversation_id: Option<i32>,
    request: &SendMessageRequest,
    progress: &mut RelayProgress,
) -> Result<PreparedTurn, ServiceError> {
    let store = state.store();
    let conversation = match conversation_id {
        Some(id) => store
            .find_conversation(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("conversation {id}")))?,
        None => {
            store
                .create_conversation(DEFAULT_CONVERSATION_TITLE.to_string())
                .await?
        }
    };

    let stored = store
        .insert_message(NewMessage {
            conversation_id: conversation.id,
            role: MessageRole::User,
            content: request.text().unwrap_or(IMAGE_PLACEHOLDER).to_string(),
        })
        .await
        .map_err(|err| match err {
            // Deleted between the lookup and the insert.
            StorageError::MissingParent { id, .. } => {
                ServiceError::NotFound(format!("conversation {id}"))
            }
            other => other.into(),
        })?;
    checked(progress.resolve(conversation.id));

    let history = store
        .list_messages(conversation.id)
        .await?
        .into_iter()
        .filter(|message| message.id != stored.id)
        .collect::<Vec<_>>();

    let turns = build_context(
        &state.config().chat.system_prompt,
        history,
        request.text(),
        request.image(),
    );
    enter(progress, RelayStage::HistoryLoaded);

    Ok(PreparedTurn {
        conversation_id: conversation.id,
        turns,
        progress: progress.clone(),
    })
}

/// System prompt, then prior messages, then the new user turn (with its image, if any).
pub fn build_context(
    system_prompt: &str,
    history: Vec<MessageEntity>,
    text: Option<&str>,
    image_url: Option<&str>,
) -> Vec<ChatTurn> {
    let mut turns = Vec::with_capacity(history.len() + 2);
    turns.push(ChatTurn::text(MessageRole::System, system_prompt));
    turns.extend(
        history
            .into_iter()
            .map(|message| ChatTurn::text(message.role, message.content)),
    );

    let content = match image_url {
        Some(url) => {
            let mut parts = Vec::with_capacity(2);
            if let Some(text) = text {
                parts.push(ContentPart::Text {
                    text: text.to_string(),
                });
            }
            parts.push(ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: url.to_string(),
                },
            });
            TurnContent::Parts(parts)
        }
        None => TurnContent::Text(text.unwrap_or_default().to_string()),
    };
    turns.push(ChatTurn {
        role: MessageRole::User,
        content,
    });

    turns
}

/// Ask for the whole reply at once, store it and return it.
pub async fn reply_buffered(
    state: &SharedState,
    turn: PreparedTurn,
) -> Result<ChatReply, ServiceError> {
    let PreparedTurn {
        conversation_id,
        turns,
        mut progress,
    } = turn;

    enter(&mut progress, RelayStage::ModelRequested);
    let result = async {
        let content = state.completions().complete(turns).await?;
        if store_reply(state, conversation_id, &content).await? {
            enter(&mut progress, RelayStage::Persisted);
        }
        Ok::<_, ServiceError>(content)
    }
    .await;

    match result {
        Ok(content) => {
            enter(&mut progress, RelayStage::Done);
            Ok(ChatReply {
                content,
                done: true,
            })
        }
        Err(err) => {
            let stage = progress.fail();
            warn!(conversation_id, ?stage, error = %err, "buffered chat relay failed");
            Err(err)
        }
    }
}

/// Open the upstream stream and hand its fragments to a relay task.
///
/// Failures opening the stream are returned directly so the caller can still answer
/// with an error status; later failures arrive as [`RelayEvent::Failed`].
pub async fn open_stream(
    state: &SharedState,
    turn: PreparedTurn,
) -> Result<mpsc::Receiver<RelayEvent>, ServiceError> {
    let PreparedTurn {
        conversation_id,
        turns,
        mut progress,
    } = turn;

    enter(&mut progress, RelayStage::ModelRequested);
    let fragments = match state.completions().stream(turns).await {
        Ok(fragments) => fragments,
        Err(err) => {
            let stage = progress.fail();
            warn!(conversation_id, ?stage, error = %err, "failed to open completion stream");
            return Err(err.into());
        }
    };
    enter(&mut progress, RelayStage::Streaming);

    let (tx, rx) = mpsc::channel(RELAY_CHANNEL_CAPACITY);
    tokio::spawn(relay_fragments(
        state.clone(),
        conversation_id,
        progress,
        fragments,
        tx,
    ));
    Ok(rx)
}

enum StreamOutcome {
    Completed,
    Disconnected,
    Failed(String),
}

/// Forward fragments as they arrive, then store their concatenation.
///
/// If the caller goes away, reading stops and whatever was accumulated is stored.
/// An upstream failure stores nothing for the assistant turn.
async fn relay_fragments(
    state: SharedState,
    conversation_id: i32,
    mut progress: RelayProgress,
    mut fragments: FragmentStream,
    tx: mpsc::Sender<RelayEvent>,
) {
    let mut reply = String::new();

    let outcome = loop {
        tokio::select! {
            _ = tx.closed() => break StreamOutcome::Disconnected,
            next = fragments.next() => match next {
                Some(Ok(fragment)) => {
                    reply.push_str(&fragment);
                    if tx.send(RelayEvent::Fragment(fragment)).await.is_err() {
                        break StreamOutcome::Disconnected;
                    }
                }
                Some(Err(err)) => break StreamOutcome::Failed(err.to_string()),
                None => break StreamOutcome::Completed,
            }
        }
    };
    drop(fragments);

    match outcome {
        StreamOutcome::Completed => match store_reply(&state, conversation_id, &reply).await {
            Ok(stored) => {
                if stored {
                    enter(&mut progress, RelayStage::Persisted);
                }
                enter(&mut progress, RelayStage::Done);
                info!(conversation_id, chars = reply.chars().count(), "chat reply streamed");
                let _ = tx.send(RelayEvent::Done).await;
            }
            Err(err) => {
                let stage = progress.fail();
                warn!(conversation_id, ?stage, error = %err, "failed to store streamed reply");
                let _ = tx
                    .send(RelayEvent::Failed("failed to save the assistant reply".into()))
                    .await;
            }
        },
        StreamOutcome::Disconnected => {
            info!(conversation_id, "client disconnected during chat stream");
            match store_reply(&state, conversation_id, &reply).await {
                Ok(true) => {
                    enter(&mut progress, RelayStage::Persisted);
                    enter(&mut progress, RelayStage::Done);
                }
                Ok(false) => enter(&mut progress, RelayStage::Done),
                Err(err) => {
                    let stage = progress.fail();
                    warn!(conversation_id, ?stage, error = %err, "failed to store partial reply");
                }
            }
        }
        StreamOutcome::Failed(message) => {
            let stage = progress.fail();
            warn!(conversation_id, ?stage, error = %message, "completion stream failed");
            let _ = tx.send(RelayEvent::Failed(message)).await;
        }
    }
}

/// Store a non-empty assistant reply. Returns whether a row was written.
async fn store_reply(
    state: &SharedState,
    conversation_id: i32,
    content: &str,
) -> Result<bool, ServiceError> {
    if content.is_empty() {
        warn!(conversation_id, "model returned an empty reply; nothing stored");
        return Ok(false);
    }

    state
        .store()
        .insert_message(NewMessage {
            conversation_id,
            role: MessageRole::Assistant,
            content: content.to_string(),
        })
        .await?;
    Ok(true)
}

fn enter(progress: &mut RelayProgress, stage: RelayStage) {
    checked(progress.advance(stage));
}

fn checked(result: Result<(), InvalidRelayTransition>) {
    if let Err(err) = result {
        warn!(error = %err, "unexpected chat relay stage change");
    }
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;

    use super::*;

    fn message(id: i32, role: MessageRole, content: &str) -> MessageEntity {
        MessageEntity {
            id,
            conversation_id: 1,
            role,
            content: content.into(),
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn context_starts_with_system_prompt_and_ends_with_new_turn() {
        let history = vec![
            message(1, MessageRole::User, "hi"),
            message(2, MessageRole::Assistant, "hello!"),
        ];
        let turns = build_context("be fun", history, Some("how are you?"), None);

        assert_eq!(
            turns,
            vec![
                ChatTurn::text(MessageRole::System, "be fun"),
                ChatTurn::text(MessageRole::User, "hi"),
                ChatTurn::text(MessageRole::Assistant, "hello!"),
                ChatTurn::text(MessageRole::User, "how are you?"),
            ]
        );
    }

    #[test]
    fn image_turn_pairs_text_with_image_reference() {
        let turns = build_context("p", Vec::new(), Some("what is it?"), Some("https://x.io/a.png"));
        let last = turns.last().unwrap();
        assert_eq!(
            last.content,
            TurnContent::Parts(vec![
                ContentPart::Text {
                    text: "what is it?".into()
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: "https://x.io/a.png".into()
                    }
                },
            ])
        );
    }

    #[test]
    fn image_only_turn_has_no_text_part() {
        let turns = build_context("p", Vec::new(), None, Some("https://x.io/a.png"));
        match &turns.last().unwrap().content {
            TurnContent::Parts(parts) => {
                assert_eq!(parts.len(), 1);
                assert!(matches!(parts[0], ContentPart::ImageUrl { .. }));
            }
            other => panic!("unexpected content: {other:?}"),
        }
    }
}
