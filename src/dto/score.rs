use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::{
    dao::models::{NewScore, ScoreEntity},
    dto::{
        format_timestamp,
        validation::{validate_game_name, validate_player_name},
    },
};

/// Payload submitted when a game round ends.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitScoreRequest {
    /// Game identifier, e.g. `clicker` or `reaction`.
    pub game_name: String,
    /// Raw score; any integer is accepted.
    pub score: i32,
    /// Display name, 2 to 20 characters.
    pub player_name: String,
}

impl Validate for SubmitScoreRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_game_name(&self.game_name) {
            errors.add("game_name", e);
        }
        if let Err(e) = validate_player_name(&self.player_name) {
            errors.add("player_name", e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl From<SubmitScoreRequest> for NewScore {
    fn from(value: SubmitScoreRequest) -> Self {
        Self {
            game_name: value.game_name,
            score: value.score,
            player_name: value.player_name,
        }
    }
}

/// A persisted score as returned to clients.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResponse {
    pub id: i32,
    pub game_name: String,
    pub score: i32,
    pub player_name: String,
    /// RFC 3339 timestamp.
    pub created_at: String,
}

impl From<ScoreEntity> for ScoreResponse {
    fn from(entity: ScoreEntity) -> Self {
        Self {
            id: entity.id,
            game_name: entity.game_name,
            score: entity.score,
            player_name: entity.player_name,
            created_at: format_timestamp(entity.created_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(game: &str, player: &str) -> SubmitScoreRequest {
        SubmitScoreRequest {
            game_name: game.into(),
            score: 57,
            player_name: player.into(),
        }
    }

    #[test]
    fn accepts_well_formed_submission() {
        assert!(request("clicker", "Ann").validate().is_ok());
    }

    #[test]
    fn reports_every_offending_field() {
        let errors = request("", "A").validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("game_name"));
        assert!(fields.contains_key("player_name"));
    }

    #[test]
    fn deserializes_camel_case_body() {
        let parsed: SubmitScoreRequest = serde_json::from_str(
            r#"{"gameName":"clicker","score":-3,"playerName":"Ann"}"#,
        )
        .unwrap();
        assert_eq!(parsed.score, -3);
        assert_eq!(parsed.player_name, "Ann");
        assert!(
            serde_json::from_str::<SubmitScoreRequest>(
                r#"{"gameName":"clicker","score":1.5,"playerName":"Ann"}"#
            )
            .is_err()
        );
    }
}
