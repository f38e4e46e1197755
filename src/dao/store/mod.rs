pub mod memory;
#[cfg(feature = "postgres-store")]
pub mod postgres;

use futures::future::BoxFuture;

use crate::dao::models::{
    ConversationEntity, MessageEntity, NewMessage, NewScore, RankOrder, ScoreEntity,
};
use crate::dao::storage::StorageResult;

/// Persistence for submitted scores and the leaderboard read path.
pub trait ScoreStore: Send + Sync {
    fn insert_score(&self, score: NewScore) -> BoxFuture<'static, StorageResult<ScoreEntity>>;
    /// Return at most `limit` scores for `game_name` ranked according to `order`,
    /// ties resolved by insertion order.
    fn top_scores(
        &self,
        game_name: String,
        order: RankOrder,
        limit: u32,
    ) -> BoxFuture<'static, StorageResult<Vec<ScoreEntity>>>;
}

/// Persistence for conversations and their append-only messages.
pub trait ChatStore: Send + Sync {
    fn create_conversation(
        &self,
        title: String,
    ) -> BoxFuture<'static, StorageResult<ConversationEntity>>;
    /// All conversations, newest first.
    fn list_conversations(&self) -> BoxFuture<'static, StorageResult<Vec<ConversationEntity>>>;
    fn find_conversation(
        &self,
        id: i32,
    ) -> BoxFuture<'static, StorageResult<Option<ConversationEntity>>>;
    /// Delete a conversation and its messages. Returns whether a row was removed.
    fn delete_conversation(&self, id: i32) -> BoxFuture<'static, StorageResult<bool>>;
    fn insert_message(&self, message: NewMessage)
    -> BoxFuture<'static, StorageResult<MessageEntity>>;
    /// Messages of a conversation in replay order (`created_at`, then `id`).
    fn list_messages(
        &self,
        conversation_id: i32,
    ) -> BoxFuture<'static, StorageResult<Vec<MessageEntity>>>;
}

/// Full storage backend injected into the application state.
pub trait Store: ScoreStore + ChatStore {
    /// Create whatever tables the backend needs. Safe to call repeatedly.
    fn prepare_schema(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
