use std::{fmt, str::FromStr};

use time::OffsetDateTime;

/// A persisted leaderboard entry. Never updated after insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreEntity {
    /// Identifier assigned by the store.
    pub id: i32,
    /// Game identifier the score belongs to (e.g. `clicker`).
    pub game_name: String,
    /// Raw score as submitted by the client.
    pub score: i32,
    /// Display name of the player.
    pub player_name: String,
    /// Insertion timestamp.
    pub created_at: OffsetDateTime,
}

/// Fields supplied when recording a new score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewScore {
    pub game_name: String,
    pub score: i32,
    pub player_name: String,
}

/// Direction in which a leaderboard is ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RankOrder {
    /// Larger scores rank first (point-based games).
    #[default]
    HigherIsBetter,
    /// Smaller scores rank first (timings such as reaction time).
    LowerIsBetter,
}

/// A titled chat thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationEntity {
    pub id: i32,
    pub title: String,
    pub created_at: OffsetDateTime,
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    /// Lowercase name used both in the database and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            "system" => Ok(MessageRole::System),
            other => Err(format!("unknown message role `{other}`")),
        }
    }
}

/// One append-only message of a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEntity {
    pub id: i32,
    pub conversation_id: i32,
    pub role: MessageRole,
    pub content: String,
    pub created_at: OffsetDateTime,
}

/// Fields supplied when appending a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub conversation_id: i32,
    pub role: MessageRole,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_names_round_trip_through_storage_representation() {
        for role in [MessageRole::User, MessageRole::Assistant, MessageRole::System] {
            assert_eq!(role.as_str().parse::<MessageRole>(), Ok(role));
        }
        assert!("moderator".parse::<MessageRole>().is_err());
    }

    #[test]
    fn unknown_games_default_to_higher_is_better() {
        assert_eq!(RankOrder::default(), RankOrder::HigherIsBetter);
    }
}
