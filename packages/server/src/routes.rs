use crate::services::error::GameError;
use crate::state::AppState;
use crate::store::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::json;

mod game;
mod room;

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .nest("/api/room", room::routes(state.clone()))
        .nest("/api/game", game::routes(state))
}

impl IntoResponse for GameError {
    fn into_response(self) -> Response {
        let status = match &self {
            GameError::Validation(_) => StatusCode::BAD_REQUEST,
            GameError::NotFound(_) => StatusCode::NOT_FOUND,
            GameError::Forbidden(_) => StatusCode::FORBIDDEN,
            GameError::Conflict(_) => StatusCode::CONFLICT,
            GameError::Store(StoreError::Unavailable) => StatusCode::SERVICE_UNAVAILABLE,
            GameError::Store(StoreError::RoomNotFound(_) | StoreError::PlayerNotFound { .. }) => {
                StatusCode::NOT_FOUND
            }
            GameError::Store(StoreError::RoomExists(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            log::error!("request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
