use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    models::{
        game::{GamePhase, GameView, PoliceReport, RoomCounts, Winner},
        player::{Player, PlayerId, PlayerPatch, Vote},
        role::Role,
        room::{Room, RoomPatch, RoomStatus},
        rule::MIN_PLAYERS,
    },
    services::{
        error::GameError,
        phase_machine::Resolution,
        role_assignment::assign_roles,
        room_service::{get_room_info, unique_room_code},
        win,
    },
    state::AppState,
    store::{CommitOutcome, PhaseGuard, Precondition, Roster, WriteBatch},
};

/// Outcome of a player action: every resolution step that followed it, and
/// for the police, what the guess revealed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionReceipt {
    pub resolutions: Vec<Resolution>,
    pub police_report: Option<PoliceReport>,
}

pub async fn start_game(
    state: &AppState,
    room_id: &str,
    participant_id: &str,
) -> Result<Vec<Resolution>, GameError> {
    let room = get_room_info(state, room_id).await?;
    if !room.is_host(participant_id) {
        return Err(GameError::forbidden("Only the host can start the game"));
    }
    if room.phase != GamePhase::Lobby {
        return Err(GameError::conflict("The game has already started"));
    }

    let players = state.store.list_players(room_id).await?;
    if players.len() < MIN_PLAYERS {
        return Err(GameError::validation(format!(
            "Need at least {} players to start",
            MIN_PLAYERS
        )));
    }

    let ids: Vec<PlayerId> = players.keys().cloned().collect();
    let roles = assign_roles(&ids)?;
    // a join or leave after this read must not end up in the dealt game
    let start = WriteBatch::room(RoomPatch::phase(GamePhase::AssignRoles))
        .require(Precondition::Roster(players.keys().cloned().collect()));
    let batch = roles
        .into_iter()
        .fold(start, |batch, (id, role)| batch.with_player(id, PlayerPatch::assign(role)));

    commit_or_conflict(state, &room, batch).await?;
    info!("room {}: roles dealt to {} players", room_id, ids.len());

    state.machine.settle(room_id).await
}

/// Host-only rematch in the same room with a fresh code.
pub async fn new_game(
    state: &AppState,
    room_id: &str,
    participant_id: &str,
) -> Result<String, GameError> {
    let room = get_room_info(state, room_id).await?;
    if !room.is_host(participant_id) {
        return Err(GameError::forbidden("Only the host can start a new game"));
    }
    if room.phase != GamePhase::Ended {
        return Err(GameError::conflict("The current game has not ended"));
    }

    let code = unique_room_code(state.store.as_ref(), state.config.code_attempts).await?;
    let players = state.store.list_players(room_id).await?;
    let reset = RoomPatch {
        code: Some(code.clone()),
        phase: Some(GamePhase::Lobby),
        status: Some(RoomStatus::Open),
        round: Some(0),
        winner: Some(None),
        last_night_result: Some(None),
    };
    let batch = players.keys().fold(WriteBatch::room(reset), |batch, id| {
        batch.with_player(id.clone(), PlayerPatch::reset_for_rematch())
    });

    commit_or_conflict(state, &room, batch).await?;
    info!("room {}: new game, code {}", room_id, code);
    Ok(code)
}

pub async fn get_game_state(state: &AppState, room_id: &str) -> Result<GameView, GameError> {
    let room = get_room_info(state, room_id).await?;
    let players: Vec<Player> = state.store.list_players(room_id).await?.into_values().collect();
    let counts = RoomCounts::from_players(&players);
    Ok(GameView {
        room,
        players,
        counts,
    })
}

pub async fn check_winner(state: &AppState, room_id: &str) -> Result<Option<Winner>, GameError> {
    let room = get_room_info(state, room_id).await?;
    if room.phase == GamePhase::Ended {
        return Ok(room.winner);
    }
    if room.phase == GamePhase::Lobby {
        return Ok(None);
    }
    let players = state.store.list_players(room_id).await?;
    Ok(win::evaluate(players.values()))
}

/// Resolution attempt on behalf of any observer.
pub async fn resolve_phase(state: &AppState, room_id: &str) -> Result<Vec<Resolution>, GameError> {
    state.machine.settle(room_id).await
}

pub async fn submit_mafia_vote(
    state: &AppState,
    room_id: &str,
    actor_id: &str,
    target_id: &str,
) -> Result<ActionReceipt, GameError> {
    let (room, players) = load_for_action(state, room_id, GamePhase::NightMafia).await?;
    require_actor(&players, actor_id, Some(Role::Mafia))?;
    require_target(&players, actor_id, target_id, false)?;

    let patch = PlayerPatch {
        night_vote: Some(Vote::Target(target_id.to_string())),
        ..Default::default()
    };
    submit(state, &room, WriteBatch::player(actor_id, patch), None).await
}

pub async fn submit_police_guess(
    state: &AppState,
    room_id: &str,
    actor_id: &str,
    target_id: &str,
) -> Result<ActionReceipt, GameError> {
    let (room, players) = load_for_action(state, room_id, GamePhase::NightPolice).await?;
    let police = require_actor(&players, actor_id, Some(Role::Police))?;
    if police.has_guessed() {
        return Err(GameError::validation(
            "You have already made your guess. You can only guess once per game",
        ));
    }
    let target = require_target(&players, actor_id, target_id, false)?;

    let report = PoliceReport {
        target_id: target.id.clone(),
        target_name: target.display_name.clone(),
        is_mafia: target.role.map(|r| r.is_mafia()).unwrap_or(false),
    };
    let patch = PlayerPatch {
        police_guess: Some(Some(target_id.to_string())),
        ..Default::default()
    };
    let batch =
        WriteBatch::player(actor_id, patch).require(Precondition::Unchanged(police.clone()));
    submit(state, &room, batch, Some(report)).await
}

pub async fn submit_heal(
    state: &AppState,
    room_id: &str,
    actor_id: &str,
    target_id: &str,
) -> Result<ActionReceipt, GameError> {
    let (room, players) = load_for_action(state, room_id, GamePhase::NightHealer).await?;
    require_actor(&players, actor_id, Some(Role::Healer))?;
    require_target(&players, actor_id, target_id, true)?;

    let patch = PlayerPatch {
        heal_target: Some(Vote::Target(target_id.to_string())),
        ..Default::default()
    };
    submit(state, &room, WriteBatch::player(actor_id, patch), None).await
}

/// `None` abstains, which still counts as having voted.
pub async fn submit_day_vote(
    state: &AppState,
    room_id: &str,
    actor_id: &str,
    target_id: Option<&str>,
) -> Result<ActionReceipt, GameError> {
    let (room, players) = load_for_action(state, room_id, GamePhase::Day).await?;
    require_actor(&players, actor_id, None)?;
    if let Some(target_id) = target_id {
        require_target(&players, actor_id, target_id, false)?;
    }

    let patch = PlayerPatch {
        day_vote: Some(Vote::from(target_id.map(str::to_string))),
        ..Default::default()
    };
    submit(state, &room, WriteBatch::player(actor_id, patch), None).await
}

async fn load_for_action(
    state: &AppState,
    room_id: &str,
    phase: GamePhase,
) -> Result<(Room, Roster), GameError> {
    let room = get_room_info(state, room_id).await?;
    if room.phase != phase {
        return Err(GameError::conflict(format!(
            "Action not allowed during {}",
            room.phase
        )));
    }
    let players = state.store.list_players(room_id).await?;
    Ok((room, players))
}

fn require_actor<'a>(
    players: &'a Roster,
    actor_id: &str,
    role: Option<Role>,
) -> Result<&'a Player, GameError> {
    let actor = players.get(actor_id).ok_or(GameError::NotFound("player"))?;
    if !actor.is_alive {
        return Err(GameError::validation("Dead players cannot act"));
    }
    if let Some(role) = role {
        if !actor.has_role(role) {
            return Err(GameError::validation(format!("Only {} can do that", role)));
        }
    }
    Ok(actor)
}

fn require_target<'a>(
    players: &'a Roster,
    actor_id: &str,
    target_id: &str,
    allow_self: bool,
) -> Result<&'a Player, GameError> {
    if target_id.trim().is_empty() {
        return Err(GameError::validation("Please select a target"));
    }
    let target = players.get(target_id).ok_or(GameError::NotFound("target"))?;
    if !target.is_alive {
        return Err(GameError::validation("Target is not alive"));
    }
    if !allow_self && target_id == actor_id {
        return Err(GameError::validation("You cannot target yourself"));
    }
    Ok(target)
}

// Writes the action under the phase it was validated against, then resolves
// as far as the room can go on its own.
async fn submit(
    state: &AppState,
    room: &Room,
    batch: WriteBatch,
    police_report: Option<PoliceReport>,
) -> Result<ActionReceipt, GameError> {
    commit_or_conflict(state, room, batch).await?;
    let resolutions = state.machine.settle(&room.room_id).await?;
    Ok(ActionReceipt {
        resolutions,
        police_report,
    })
}

async fn commit_or_conflict(
    state: &AppState,
    room: &Room,
    batch: WriteBatch,
) -> Result<(), GameError> {
    match state
        .store
        .commit(&room.room_id, PhaseGuard::of(room), batch)
        .await?
    {
        CommitOutcome::Applied => Ok(()),
        CommitOutcome::Rejected { phase, .. } => Err(GameError::conflict(format!(
            "The room moved on to {}",
            phase
        ))),
        CommitOutcome::Outdated => Err(GameError::conflict(
            "The room changed while your request was processed, please try again",
        )),
    }
}
