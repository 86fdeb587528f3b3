use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    models::{
        game::GamePhase,
        player::{Player, PlayerPatch},
        room::{Room, RoomStatus},
    },
    services::error::GameError,
    state::AppState,
    store::{CommitOutcome, DocumentStore, PhaseGuard, Precondition, WriteBatch},
    utils::code::{new_room_code, normalize_code},
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreatedRoom {
    pub room_id: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JoinedRoom {
    pub room_id: String,
    pub code: String,
    pub rejoined: bool,
}

pub(crate) fn validate_display_name(name: &str) -> Result<String, GameError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(GameError::validation("Please enter your name"));
    }
    Ok(trimmed.to_string())
}

fn already_started() -> GameError {
    GameError::conflict("This game is already in progress. You cannot join as a new player")
}

fn validate_participant(participant_id: &str) -> Result<(), GameError> {
    if participant_id.trim().is_empty() {
        return Err(GameError::validation("Missing participant id"));
    }
    Ok(())
}

/// Draws codes until one is unused. Codes are only unique at the moment of the check.
pub(crate) async fn unique_room_code(
    store: &dyn DocumentStore,
    attempts: usize,
) -> Result<String, GameError> {
    for _ in 0..attempts {
        let code = new_room_code();
        if store.find_rooms_by_code(&code).await?.is_empty() {
            return Ok(code);
        }
    }
    Err(GameError::conflict("Could not allocate a free room code"))
}

pub async fn create_room(
    state: &AppState,
    host_id: &str,
    display_name: &str,
) -> Result<CreatedRoom, GameError> {
    validate_participant(host_id)?;
    let display_name = validate_display_name(display_name)?;

    let code = unique_room_code(state.store.as_ref(), state.config.code_attempts).await?;
    let room_id = uuid::Uuid::new_v4().to_string();
    let room = Room::new(
        room_id.clone(),
        code.clone(),
        host_id.to_string(),
        state.config.max_players,
    );
    state.store.insert_room(room).await?;
    state
        .store
        .put_player(&room_id, Player::new(host_id.to_string(), display_name))
        .await?;

    info!("room {} created by {} with code {}", room_id, host_id, code);
    Ok(CreatedRoom { room_id, code })
}

pub async fn join_room(
    state: &AppState,
    code: &str,
    participant_id: &str,
    display_name: &str,
) -> Result<JoinedRoom, GameError> {
    validate_participant(participant_id)?;
    let display_name = validate_display_name(display_name)?;
    let code =
        normalize_code(code).ok_or_else(|| GameError::validation("Please enter a room code"))?;

    // codes can collide across rooms; the oldest match wins
    let room = state
        .store
        .find_rooms_by_code(&code)
        .await?
        .into_iter()
        .next()
        .ok_or(GameError::NotFound("room"))?;

    if room.status == RoomStatus::Ended {
        return Err(GameError::conflict("This game has already ended"));
    }

    let existing = state.store.get_player(&room.room_id, participant_id).await?;
    if existing.is_some() {
        state
            .store
            .update_player(
                &room.room_id,
                participant_id,
                PlayerPatch {
                    display_name: Some(display_name),
                    ..Default::default()
                },
            )
            .await?;
        info!("{} rejoined room {}", participant_id, room.room_id);
        return Ok(JoinedRoom {
            room_id: room.room_id,
            code: room.code,
            rejoined: true,
        });
    }

    if room.status == RoomStatus::InProgress || room.phase != GamePhase::Lobby {
        return Err(already_started());
    }
    let players = state.store.list_players(&room.room_id).await?;
    if players.len() >= room.max_players {
        return Err(GameError::conflict("Room is full"));
    }

    // the lobby check above is only a snapshot; the commit re-checks it
    let batch = WriteBatch::default()
        .insert(Player::new(participant_id.to_string(), display_name))
        .require(Precondition::RosterBelow(room.max_players));
    match state
        .store
        .commit(&room.room_id, PhaseGuard::lobby(), batch)
        .await?
    {
        CommitOutcome::Applied => {}
        CommitOutcome::Rejected { .. } => return Err(already_started()),
        CommitOutcome::Outdated => return Err(GameError::conflict("Room is full")),
    }
    info!("{} joined room {}", participant_id, room.room_id);
    Ok(JoinedRoom {
        room_id: room.room_id,
        code: room.code,
        rejoined: false,
    })
}

/// Only possible from the lobby; after the start a player document is never removed.
pub async fn leave_room(
    state: &AppState,
    room_id: &str,
    participant_id: &str,
) -> Result<(), GameError> {
    let room = get_room_info(state, room_id).await?;
    if room.phase != GamePhase::Lobby {
        return Err(GameError::conflict("Cannot leave a game that has started"));
    }
    if state.store.get_player(room_id, participant_id).await?.is_none() {
        return Err(GameError::NotFound("player"));
    }
    let batch = WriteBatch::default().remove(participant_id);
    match state.store.commit(room_id, PhaseGuard::lobby(), batch).await? {
        CommitOutcome::Applied => {}
        CommitOutcome::Rejected { .. } | CommitOutcome::Outdated => {
            return Err(GameError::conflict("Cannot leave a game that has started"))
        }
    }
    info!("{} left room {}", participant_id, room_id);
    Ok(())
}

pub async fn get_room_info(state: &AppState, room_id: &str) -> Result<Room, GameError> {
    state
        .store
        .get_room(room_id)
        .await?
        .ok_or(GameError::NotFound("room"))
}

pub async fn get_players(state: &AppState, room_id: &str) -> Result<Vec<Player>, GameError> {
    Ok(state.store.list_players(room_id).await?.into_values().collect())
}
