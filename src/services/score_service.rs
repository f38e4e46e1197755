//! Score Service: score submission and per-game leaderboards.

use tracing::{info, warn};
use validator::Validate;

use crate::{
    dao::models::NewScore,
    dto::score::{ScoreResponse, SubmitScoreRequest},
    error::ServiceError,
    state::SharedState,
};

/// Number of entries a leaderboard holds.
pub const LEADERBOARD_SIZE: u32 = 10;

/// Validate and persist a score, returning the stored row.
pub async fn submit_score(
    state: &SharedState,
    request: SubmitScoreRequest,
) -> Result<ScoreResponse, ServiceError> {
    request.validate()?;

    let entity = state.store().insert_score(request.into()).await?;
    info!(
        id = entity.id,
        game = %entity.game_name,
        score = entity.score,
        "score recorded"
    );
    Ok(entity.into())
}

/// Top scores for `game_name`, ranked by the game's configured direction.
///
/// Unknown games rank higher scores first; games without scores yield an empty list.
pub async fn get_leaderboard(
    state: &SharedState,
    game_name: &str,
) -> Result<Vec<ScoreResponse>, ServiceError> {
    let order = state.config().leaderboard.rank_order(game_name);
    let scores = state
        .store()
        .top_scores(game_name.to_string(), order, LEADERBOARD_SIZE)
        .await?;

    Ok(scores.into_iter().map(ScoreResponse::from).collect())
}

/// Insert demo scores when enabled and the `clicker` leaderboard is still empty.
pub async fn seed_demo_scores(state: &SharedState) -> Result<bool, ServiceError> {
    if !state.config().leaderboard.seed_demo_scores {
        return Ok(false);
    }

    if !get_leaderboard(state, "clicker").await?.is_empty() {
        return Ok(false);
    }

    let demo = [("clicker", 42, "VibeCheck"), ("reaction", 250, "Speedy")];
    for (game_name, score, player_name) in demo {
        state
            .store()
            .insert_score(NewScore {
                game_name: game_name.into(),
                score,
                player_name: player_name.into(),
            })
            .await
            .inspect_err(|err| warn!(error = %err, game = game_name, "failed to seed score"))?;
    }

    info!("seeded leaderboards with demo scores");
    Ok(true)
}
