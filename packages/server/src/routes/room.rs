use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    services::{error::GameError, room_service},
    state::AppState,
    utils::websocket,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateRoomRequest {
    pub participant_id: String,
    pub display_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JoinRoomRequest {
    pub code: String,
    pub participant_id: String,
    pub display_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LeaveRoomRequest {
    pub participant_id: String,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        // curl -X POST http://localhost:8080/api/room/create -H 'content-type: application/json' \
        //   -d '{"participant_id":"p1","display_name":"Alice"}'
        .route("/create", post(create_room))
        // curl -X POST http://localhost:8080/api/room/join -H 'content-type: application/json' \
        //   -d '{"code":"ABC234","participant_id":"p2","display_name":"Bob"}'
        .route("/join", post(join_room))
        // curl http://localhost:8080/api/room/{roomid}
        .route("/:roomid", get(get_room_info))
        // curl http://localhost:8080/api/room/{roomid}/players
        .route("/:roomid/players", get(get_players))
        .route("/:roomid/leave", post(leave_room))
        // websocat ws://localhost:8080/api/room/{roomid}/ws
        .route("/:roomid/ws", get(websocket::handler))
        .with_state(state)
}

pub async fn create_room(
    State(state): State<AppState>,
    Json(req): Json<CreateRoomRequest>,
) -> Result<impl IntoResponse, GameError> {
    let created =
        room_service::create_room(&state, &req.participant_id, &req.display_name).await?;
    Ok((StatusCode::OK, Json(created)))
}

pub async fn join_room(
    State(state): State<AppState>,
    Json(req): Json<JoinRoomRequest>,
) -> Result<impl IntoResponse, GameError> {
    let joined =
        room_service::join_room(&state, &req.code, &req.participant_id, &req.display_name).await?;
    Ok((StatusCode::OK, Json(joined)))
}

async fn get_room_info(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<impl IntoResponse, GameError> {
    let room = room_service::get_room_info(&state, &room_id).await?;
    Ok((StatusCode::OK, Json(room)))
}

async fn get_players(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<impl IntoResponse, GameError> {
    room_service::get_room_info(&state, &room_id).await?;
    let players = room_service::get_players(&state, &room_id).await?;
    Ok((StatusCode::OK, Json(players)))
}

pub async fn leave_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(req): Json<LeaveRoomRequest>,
) -> Result<impl IntoResponse, GameError> {
    room_service::leave_room(&state, &room_id, &req.participant_id).await?;
    Ok((StatusCode::OK, Json("Successfully left room")))
}
