use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::state::AppState;
use crate::services::{error::GameError, game_service};

#[derive(Debug, Serialize, Deserialize)]
pub struct HostRequest {
    pub participant_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TargetedAction {
    pub participant_id: String,
    pub target_id: String,
}

/// `target_id: null` abstains.
#[derive(Debug, Serialize, Deserialize)]
pub struct DayVoteAction {
    pub participant_id: String,
    pub target_id: Option<String>,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .nest(
            "/:roomid",
            Router::new()
                .route("/start", post(start_game))
                .route("/new-game", post(new_game))
                .route("/state", get(get_game_state))
                .nest(
                    "/actions",
                    Router::new()
                        .route("/mafia-vote", post(mafia_vote_handler))
                        .route("/police-guess", post(police_guess_handler))
                        .route("/heal", post(heal_handler))
                        .route("/day-vote", post(day_vote_handler)),
                )
                // any participant may nudge resolution
                .route("/phase/resolve", post(resolve_phase_handler))
                .route("/check-winner", get(check_winner_handler)),
        )
        .with_state(state)
}

pub async fn start_game(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(req): Json<HostRequest>,
) -> Result<impl IntoResponse, GameError> {
    let resolutions = game_service::start_game(&state, &room_id, &req.participant_id).await?;
    Ok((StatusCode::OK, Json(resolutions)))
}

async fn new_game(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(req): Json<HostRequest>,
) -> Result<impl IntoResponse, GameError> {
    let code = game_service::new_game(&state, &room_id, &req.participant_id).await?;
    Ok((StatusCode::OK, Json(json!({ "code": code }))))
}

pub async fn get_game_state(
    Path(room_id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, GameError> {
    let view = game_service::get_game_state(&state, &room_id).await?;
    Ok((StatusCode::OK, Json(view)))
}

async fn mafia_vote_handler(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(action): Json<TargetedAction>,
) -> Result<impl IntoResponse, GameError> {
    let receipt = game_service::submit_mafia_vote(
        &state,
        &room_id,
        &action.participant_id,
        &action.target_id,
    )
    .await?;
    Ok((StatusCode::OK, Json(receipt)))
}

async fn police_guess_handler(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(action): Json<TargetedAction>,
) -> Result<impl IntoResponse, GameError> {
    let receipt = game_service::submit_police_guess(
        &state,
        &room_id,
        &action.participant_id,
        &action.target_id,
    )
    .await?;
    Ok((StatusCode::OK, Json(receipt)))
}

async fn heal_handler(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(action): Json<TargetedAction>,
) -> Result<impl IntoResponse, GameError> {
    let receipt =
        game_service::submit_heal(&state, &room_id, &action.participant_id, &action.target_id)
            .await?;
    Ok((StatusCode::OK, Json(receipt)))
}

async fn day_vote_handler(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(action): Json<DayVoteAction>,
) -> Result<impl IntoResponse, GameError> {
    let receipt = game_service::submit_day_vote(
        &state,
        &room_id,
        &action.participant_id,
        action.target_id.as_deref(),
    )
    .await?;
    Ok((StatusCode::OK, Json(receipt)))
}

async fn resolve_phase_handler(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<impl IntoResponse, GameError> {
    let resolutions = game_service::resolve_phase(&state, &room_id).await?;
    Ok((StatusCode::OK, Json(resolutions)))
}

async fn check_winner_handler(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<impl IntoResponse, GameError> {
    let winner = game_service::check_winner(&state, &room_id).await?;
    Ok((StatusCode::OK, Json(json!({ "winner": winner }))))
}
