use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::state::AppState;

pub async fn handler(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, room_id))
}

/// Streams the room's change feed to one participant. While the socket is open
/// that participant also runs an observer that resolves the room's phases.
pub async fn handle_socket(ws: WebSocket, state: AppState, room_id: String) {
    info!("New WebSocket connection established for room: {}", room_id);

    let mut rx = state.store.subscribe(&room_id).await;
    let _observer = state.observer().spawn(room_id.clone()).await;

    let (mut sender, mut receiver) = ws.split();

    let room_id_for_send = room_id.clone();
    let mut send_task = tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(missed)) => {
                    warn!("room {} feed lagged by {} events", room_id_for_send, missed);
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Error encoding event: {}", e);
                    continue;
                }
            };
            if let Err(e) = sender.send(Message::Text(text)).await {
                warn!("Error sending message: {}", e);
                break;
            }
        }
    });

    // clients only listen; drain until they hang up
    let mut receive_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => receive_task.abort(),
        _ = &mut receive_task => send_task.abort(),
    }
    info!("WebSocket connection closed for room: {}", room_id);
}
