//! Process-local store used for tests and for running without a database.

use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt};
use time::OffsetDateTime;

use crate::dao::{
    models::{
        ConversationEntity, MessageEntity, NewMessage, NewScore, RankOrder, ScoreEntity,
    },
    storage::{StorageError, StorageResult},
    store::{ChatStore, ScoreStore, Store},
};

#[derive(Default)]
struct Tables {
    scores: Vec<ScoreEntity>,
    conversations: Vec<ConversationEntity>,
    messages: Vec<MessageEntity>,
    next_score_id: i32,
    next_conversation_id: i32,
    next_message_id: i32,
}

/// In-memory implementation of [`Store`] mirroring the Postgres semantics
/// (serial ids, cascade delete, replay ordering).
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|_| StorageError::Corrupted {
            table: "memory",
            reason: "lock poisoned".into(),
        })
    }

    fn with_tables<T, F>(&self, work: F) -> BoxFuture<'static, StorageResult<T>>
    where
        F: FnOnce(&mut Tables) -> StorageResult<T>,
        T: Send + 'static,
    {
        let result = self.lock().and_then(|mut tables| work(&mut tables));
        futures::future::ready(result).boxed()
    }
}

impl ScoreStore for MemoryStore {
    fn insert_score(&self, score: NewScore) -> BoxFuture<'static, StorageResult<ScoreEntity>> {
        self.with_tables(move |tables| {
            tables.next_score_id += 1;
            let entity = ScoreEntity {
                id: tables.next_score_id,
                game_name: score.game_name,
                score: score.score,
                player_name: score.player_name,
                created_at: OffsetDateTime::now_utc(),
            };
            tables.scores.push(entity.clone());
            Ok(entity)
        })
    }

    fn top_scores(
        &self,
        game_name: String,
        order: RankOrder,
        limit: u32,
    ) -> BoxFuture<'static, StorageResult<Vec<ScoreEntity>>> {
        self.with_tables(move |tables| {
            let mut ranked = tables
                .scores
                .iter()
                .filter(|score| score.game_name == game_name)
                .cloned()
                .collect::<Vec<_>>();
            // Stable sort keeps insertion order among ties.
            match order {
                RankOrder::HigherIsBetter => ranked.sort_by(|a, b| b.score.cmp(&a.score)),
                RankOrder::LowerIsBetter => ranked.sort_by(|a, b| a.score.cmp(&b.score)),
            }
            ranked.truncate(limit as usize);
            Ok(ranked)
        })
    }
}

impl ChatStore for MemoryStore {
    fn create_conversation(
        &self,
        title: String,
    ) -> BoxFuture<'static, StorageResult<ConversationEntity>> {
        self.with_tables(move |tables| {
            tables.next_conversation_id += 1;
            let entity = ConversationEntity {
                id: tables.next_conversation_id,
                title,
                created_at: OffsetDateTime::now_utc(),
            };
            tables.conversations.push(entity.clone());
            Ok(entity)
        })
    }

    fn list_conversations(&self) -> BoxFuture<'static, StorageResult<Vec<ConversationEntity>>> {
        self.with_tables(|tables| {
            let mut conversations = tables.conversations.clone();
            conversations.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            Ok(conversations)
        })
    }

    fn find_conversation(
        &self,
        id: i32,
    ) -> BoxFuture<'static, StorageResult<Option<ConversationEntity>>> {
        self.with_tables(move |tables| {
            Ok(tables
                .conversations
                .iter()
                .find(|conversation| conversation.id == id)
                .cloned())
        })
    }

    fn delete_conversation(&self, id: i32) -> BoxFuture<'static, StorageResult<bool>> {
        self.with_tables(move |tables| {
            let before = tables.conversations.len();
            tables.conversations.retain(|conversation| conversation.id != id);
            tables
                .messages
                .retain(|message| message.conversation_id != id);
            Ok(tables.conversations.len() != before)
        })
    }

    fn insert_message(
        &self,
        message: NewMessage,
    ) -> BoxFuture<'static, StorageResult<MessageEntity>> {
        self.with_tables(move |tables| {
            if !tables
                .conversations
                .iter()
                .any(|conversation| conversation.id == message.conversation_id)
            {
                return Err(StorageError::MissingParent {
                    table: "conversations",
                    id: message.conversation_id,
                });
            }

            tables.next_message_id += 1;
            let entity = MessageEntity {
                id: tables.next_message_id,
                conversation_id: message.conversation_id,
                role: message.role,
                content: message.content,
                created_at: OffsetDateTime::now_utc(),
            };
            tables.messages.push(entity.clone());
            Ok(entity)
        })
    }

    fn list_messages(
        &self,
        conversation_id: i32,
    ) -> BoxFuture<'static, StorageResult<Vec<MessageEntity>>> {
        self.with_tables(move |tables| {
            let mut messages = tables
                .messages
                .iter()
                .filter(|message| message.conversation_id == conversation_id)
                .cloned()
                .collect::<Vec<_>>();
            messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
            Ok(messages)
        })
    }
}

impl Store for MemoryStore {
    fn prepare_schema(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.with_tables(|_| Ok(()))
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.with_tables(|_| Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::MessageRole;

    fn score(game: &str, value: i32, player: &str) -> NewScore {
        NewScore {
            game_name: game.into(),
            score: value,
            player_name: player.into(),
        }
    }

    #[tokio::test]
    async fn top_scores_respects_rank_order_and_limit() {
        let store = MemoryStore::new();
        for value in 0..15 {
            store.insert_score(score("clicker", value, "Ann")).await.unwrap();
        }
        store.insert_score(score("reaction", 300, "Bo")).await.unwrap();
        store.insert_score(score("reaction", 180, "Cy")).await.unwrap();

        let clicker = store
            .top_scores("clicker".into(), RankOrder::HigherIsBetter, 10)
            .await
            .unwrap();
        assert_eq!(clicker.len(), 10);
        assert_eq!(clicker.first().map(|s| s.score), Some(14));
        assert_eq!(clicker.last().map(|s| s.score), Some(5));

        let reaction = store
            .top_scores("reaction".into(), RankOrder::LowerIsBetter, 10)
            .await
            .unwrap();
        let values = reaction.iter().map(|s| s.score).collect::<Vec<_>>();
        assert_eq!(values, vec![180, 300]);
    }

    #[tokio::test]
    async fn ties_keep_insertion_order() {
        let store = MemoryStore::new();
        let first = store.insert_score(score("clicker", 10, "First")).await.unwrap();
        let second = store.insert_score(score("clicker", 10, "Second")).await.unwrap();

        let ranked = store
            .top_scores("clicker".into(), RankOrder::HigherIsBetter, 10)
            .await
            .unwrap();
        assert_eq!(
            ranked.iter().map(|s| s.id).collect::<Vec<_>>(),
            vec![first.id, second.id]
        );
    }

    #[tokio::test]
    async fn deleting_conversation_cascades_to_messages() {
        let store = MemoryStore::new();
        let conversation = store.create_conversation("Chat".into()).await.unwrap();
        store
            .insert_message(NewMessage {
                conversation_id: conversation.id,
                role: MessageRole::User,
                content: "hi".into(),
            })
            .await
            .unwrap();

        assert!(store.delete_conversation(conversation.id).await.unwrap());
        assert!(store.list_messages(conversation.id).await.unwrap().is_empty());
        assert!(!store.delete_conversation(conversation.id).await.unwrap());
    }

    #[tokio::test]
    async fn message_insert_requires_existing_conversation() {
        let store = MemoryStore::new();
        let err = store
            .insert_message(NewMessage {
                conversation_id: 42,
                role: MessageRole::User,
                content: "hello?".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::MissingParent { id: 42, .. }));
    }
}
