use std::str::FromStr;

use futures::future::BoxFuture;
use sqlx::{
    PgPool, Row,
    postgres::{PgConnectOptions, PgPoolOptions, PgRow},
};
use tracing::info;

use crate::dao::{
    models::{
        ConversationEntity, MessageEntity, MessageRole, NewMessage, NewScore, RankOrder,
        ScoreEntity,
    },
    storage::{StorageError, StorageResult},
    store::{ChatStore, ScoreStore, Store},
};

use super::{config::PostgresConfig, schema::SCHEMA};

const SCORE_COLUMNS: &str = "id, game_name, score, player_name, created_at";
const MESSAGE_COLUMNS: &str = "id, conversation_id, role, content, created_at";

/// Postgres-backed [`Store`] sharing a single lazily-connected pool.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Build the pool without opening a connection; connections are established on first use.
    pub fn connect_lazy(config: &PostgresConfig) -> StorageResult<Self> {
        let options = PgConnectOptions::from_str(&config.url)
            .map_err(|err| StorageError::unavailable("invalid DATABASE_URL".into(), err))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_lazy_with(options);

        Ok(Self { pool })
    }

    /// Create tables and indexes when they do not exist yet.
    pub async fn ensure_schema(&self) -> StorageResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|err| StorageError::unavailable("failed to apply schema".into(), err))?;
        info!("database schema ready");
        Ok(())
    }
}

fn query_failed(what: &str, err: sqlx::Error) -> StorageError {
    StorageError::unavailable(format!("failed to {what}"), err)
}

fn score_from_row(row: &PgRow) -> Result<ScoreEntity, sqlx::Error> {
    Ok(ScoreEntity {
        id: row.try_get("id")?,
        game_name: row.try_get("game_name")?,
        score: row.try_get("score")?,
        player_name: row.try_get("player_name")?,
        created_at: row.try_get("created_at")?,
    })
}

fn conversation_from_row(row: &PgRow) -> Result<ConversationEntity, sqlx::Error> {
    Ok(ConversationEntity {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        created_at: row.try_get("created_at")?,
    })
}

fn message_from_row(row: &PgRow) -> StorageResult<MessageEntity> {
    let decode = |err| query_failed("decode message row", err);
    let role: String = row.try_get("role").map_err(decode)?;
    let role = MessageRole::from_str(&role).map_err(|reason| StorageError::Corrupted {
        table: "messages",
        reason,
    })?;

    Ok(MessageEntity {
        id: row.try_get("id").map_err(decode)?,
        conversation_id: row.try_get("conversation_id").map_err(decode)?,
        role,
        content: row.try_get("content").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
    })
}

impl ScoreStore for PostgresStore {
    fn insert_score(&self, score: NewScore) -> BoxFuture<'static, StorageResult<ScoreEntity>> {
        let store = self.clone();
        Box::pin(async move {
            let sql = format!(
                "INSERT INTO scores (game_name, score, player_name) VALUES ($1, $2, $3) RETURNING {SCORE_COLUMNS}"
            );
            let row = sqlx::query(&sql)
                .bind(&score.game_name)
                .bind(score.score)
                .bind(&score.player_name)
                .fetch_one(&store.pool)
                .await
                .map_err(|err| query_failed("insert score", err))?;
            score_from_row(&row).map_err(|err| query_failed("decode score row", err))
        })
    }

    fn top_scores(
        &self,
        game_name: String,
        order: RankOrder,
        limit: u32,
    ) -> BoxFuture<'static, StorageResult<Vec<ScoreEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let direction = match order {
                RankOrder::HigherIsBetter => "DESC",
                RankOrder::LowerIsBetter => "ASC",
            };
            let sql = format!(
                "SELECT {SCORE_COLUMNS} FROM scores WHERE game_name = $1 ORDER BY score {direction}, id ASC LIMIT $2"
            );
            let rows = sqlx::query(&sql)
                .bind(&game_name)
                .bind(i64::from(limit))
                .fetch_all(&store.pool)
                .await
                .map_err(|err| query_failed("fetch leaderboard", err))?;

            rows.iter()
                .map(score_from_row)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| query_failed("decode score row", err))
        })
    }
}

impl ChatStore for PostgresStore {
    fn create_conversation(
        &self,
        title: String,
    ) -> BoxFuture<'static, StorageResult<ConversationEntity>> {
        let store = self.clone();
        Box::pin(async move {
            let row = sqlx::query(
                "INSERT INTO conversations (title) VALUES ($1) RETURNING id, title, created_at",
            )
            .bind(&title)
            .fetch_one(&store.pool)
            .await
            .map_err(|err| query_failed("create conversation", err))?;
            conversation_from_row(&row).map_err(|err| query_failed("decode conversation row", err))
        })
    }

    fn list_conversations(&self) -> BoxFuture<'static, StorageResult<Vec<ConversationEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let rows = sqlx::query(
                "SELECT id, title, created_at FROM conversations ORDER BY created_at DESC, id DESC",
            )
            .fetch_all(&store.pool)
            .await
            .map_err(|err| query_failed("list conversations", err))?;

            rows.iter()
                .map(conversation_from_row)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| query_failed("decode conversation row", err))
        })
    }

    fn find_conversation(
        &self,
        id: i32,
    ) -> BoxFuture<'static, StorageResult<Option<ConversationEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let row = sqlx::query("SELECT id, title, created_at FROM conversations WHERE id = $1")
                .bind(id)
                .fetch_optional(&store.pool)
                .await
                .map_err(|err| query_failed("fetch conversation", err))?;

            row.as_ref()
                .map(conversation_from_row)
                .transpose()
                .map_err(|err| query_failed("decode conversation row", err))
        })
    }

    fn delete_conversation(&self, id: i32) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            // Messages go with it through ON DELETE CASCADE.
            let result = sqlx::query("DELETE FROM conversations WHERE id = $1")
                .bind(id)
                .execute(&store.pool)
                .await
                .map_err(|err| query_failed("delete conversation", err))?;
            Ok(result.rows_affected() > 0)
        })
    }

    fn insert_message(
        &self,
        message: NewMessage,
    ) -> BoxFuture<'static, StorageResult<MessageEntity>> {
        let store = self.clone();
        Box::pin(async move {
            let sql = format!(
                "INSERT INTO messages (conversation_id, role, content) VALUES ($1, $2, $3) RETURNING {MESSAGE_COLUMNS}"
            );
            let row = sqlx::query(&sql)
                .bind(message.conversation_id)
                .bind(message.role.as_str())
                .bind(&message.content)
                .fetch_one(&store.pool)
                .await
                .map_err(|err| match err {
                    sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                        StorageError::MissingParent {
                            table: "conversations",
                            id: message.conversation_id,
                        }
                    }
                    other => query_failed("insert message", other),
                })?;
            message_from_row(&row)
        })
    }

    fn list_messages(
        &self,
        conversation_id: i32,
    ) -> BoxFuture<'static, StorageResult<Vec<MessageEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_id = $1 ORDER BY created_at ASC, id ASC"
            );
            let rows = sqlx::query(&sql)
                .bind(conversation_id)
                .fetch_all(&store.pool)
                .await
                .map_err(|err| query_failed("list messages", err))?;

            rows.iter().map(message_from_row).collect()
        })
    }
}

impl Store for PostgresStore {
    fn prepare_schema(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_schema().await })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            sqlx::query("SELECT 1")
                .execute(&store.pool)
                .await
                .map_err(|err| query_failed("ping database", err))?;
            Ok(())
        })
    }
}
