use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post},
};

use crate::{
    dto::score::{ScoreResponse, SubmitScoreRequest},
    error::AppError,
    services::score_service,
    state::SharedState,
};

/// Routes for score submission and leaderboards.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/scores", post(submit_score))
        .route("/api/scores/{game_name}", get(get_leaderboard))
}

/// Record a finished round.
#[utoipa::path(
    post,
    path = "/api/scores",
    tag = "scores",
    request_body = SubmitScoreRequest,
    responses(
        (status = 201, description = "Score recorded", body = ScoreResponse),
        (status = 400, description = "Invalid game name, player name or body")
    )
)]
pub async fn submit_score(
    State(state): State<SharedState>,
    payload: Result<Json<SubmitScoreRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ScoreResponse>), AppError> {
    let Json(payload) = payload?;
    let score = score_service::submit_score(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(score)))
}

/// Top ten scores of a game, best first.
#[utoipa::path(
    get,
    path = "/api/scores/{game_name}",
    tag = "scores",
    params(("game_name" = String, Path, description = "Game identifier, e.g. clicker or reaction")),
    responses((status = 200, description = "Leaderboard, at most ten entries", body = [ScoreResponse]))
)]
pub async fn get_leaderboard(
    State(state): State<SharedState>,
    Path(game_name): Path<String>,
) -> Result<Json<Vec<ScoreResponse>>, AppError> {
    let scores = score_service::get_leaderboard(&state, &game_name).await?;
    Ok(Json(scores))
}
