//! Phase resolution for a room.
//!
//! Any number of observers may call [`PhaseMachine::try_advance`] for the same
//! room at the same time. Each call re-reads the room, plans the transition on
//! that fresh snapshot and commits it guarded by the snapshot's `(phase, round)`.
//! Whoever commits first wins; everyone else gets [`Resolution::Stale`].
//! A re-vote does not move the phase, so it is additionally conditioned on the
//! mafia documents it was planned from.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::models::{
    game::{GamePhase, NightResult, Winner},
    player::{Player, PlayerId, PlayerPatch, Vote},
    role::Role,
    room::{Room, RoomPatch, RoomStatus},
    rule::majority_threshold,
};
use crate::services::{error::GameError, tally::tally, win};
use crate::store::{CommitOutcome, DocumentStore, PhaseGuard, Precondition, Roster, WriteBatch};

// upper bound on chained automatic transitions in one settle pass
const MAX_CASCADE: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "resolution", rename_all = "snake_case")]
pub enum Resolution {
    /// The room changed after the caller read it; someone else resolves the new state.
    Stale {
        expected: GamePhase,
        actual: GamePhase,
    },
    /// Required actions are still missing.
    Pending,
    /// Mafia votes were split; they were cleared for another round of voting.
    Revote,
    Advanced {
        from: GamePhase,
        to: GamePhase,
    },
    Ended {
        winner: Winner,
    },
}

impl Resolution {
    pub fn made_progress(&self) -> bool {
        matches!(self, Resolution::Advanced { .. } | Resolution::Ended { .. })
    }
}

/// A planned mutation and what it will mean once committed.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub resolution: Resolution,
    pub batch: WriteBatch,
}

/// Decides what, if anything, the room should do next. Pure.
pub fn plan(room: &Room, players: &Roster) -> Option<Transition> {
    match room.phase {
        GamePhase::Lobby | GamePhase::Ended => None,
        GamePhase::AssignRoles => plan_roles_written(players),
        GamePhase::NightMafia => plan_mafia_vote(players),
        GamePhase::NightPolice => plan_police_guess(players),
        GamePhase::NightHealer => plan_healer(room, players),
        GamePhase::Day => plan_day(room, players),
    }
}

fn alive_map(players: &Roster) -> HashMap<PlayerId, bool> {
    players
        .iter()
        .map(|(id, p)| (id.clone(), p.is_alive))
        .collect()
}

fn alive_with_role(players: &Roster, role: Role) -> Vec<&Player> {
    players.values().filter(|p| p.is_alive_as(role)).collect()
}

fn advance(from: GamePhase, to: GamePhase) -> Transition {
    Transition {
        resolution: Resolution::Advanced { from, to },
        batch: WriteBatch::room(RoomPatch::phase(to)),
    }
}

fn plan_roles_written(players: &Roster) -> Option<Transition> {
    if players.is_empty() || players.values().any(|p| p.role.is_none()) {
        return None;
    }
    let patch = RoomPatch {
        phase: Some(GamePhase::NightMafia),
        status: Some(RoomStatus::InProgress),
        round: Some(1),
        ..Default::default()
    };
    Some(Transition {
        resolution: Resolution::Advanced {
            from: GamePhase::AssignRoles,
            to: GamePhase::NightMafia,
        },
        batch: WriteBatch::room(patch),
    })
}

fn plan_mafia_vote(players: &Roster) -> Option<Transition> {
    let mafia = alive_with_role(players, Role::Mafia);
    if mafia.is_empty() {
        return Some(advance(GamePhase::NightMafia, GamePhase::NightPolice));
    }

    let alive = alive_map(players);
    let top = tally(mafia.iter().map(|p| (&p.id, &p.night_vote)), &alive);
    let needed = majority_threshold(mafia.len());
    if top.as_ref().map(|t| t.votes >= needed).unwrap_or(false) {
        return Some(advance(GamePhase::NightMafia, GamePhase::NightPolice));
    }

    if mafia.iter().all(|p| p.night_vote.is_submitted()) {
        let batch = mafia.iter().fold(WriteBatch::default(), |batch, p| {
            batch
                .with_player(
                    p.id.clone(),
                    PlayerPatch {
                        night_vote: Some(Vote::Unset),
                        ..Default::default()
                    },
                )
                .require(Precondition::Unchanged((*p).clone()))
        });
        return Some(Transition {
            resolution: Resolution::Revote,
            batch,
        });
    }
    None
}

fn plan_police_guess(players: &Roster) -> Option<Transition> {
    // the guess is spent once per game; later nights pass straight through
    let police = alive_with_role(players, Role::Police);
    if police.iter().all(|p| p.has_guessed()) {
        return Some(advance(GamePhase::NightPolice, GamePhase::NightHealer));
    }
    None
}

fn plan_healer(room: &Room, players: &Roster) -> Option<Transition> {
    let healers = alive_with_role(players, Role::Healer);
    if healers.iter().all(|p| p.heal_target.is_submitted()) {
        return Some(resolve_night(room, players));
    }
    None
}

fn plan_day(room: &Room, players: &Roster) -> Option<Transition> {
    let mut alive = players.values().filter(|p| p.is_alive).peekable();
    alive.peek()?;
    if alive.all(|p| p.day_vote.is_submitted()) {
        return Some(resolve_day(room, players));
    }
    None
}

/// Applies the mafia kill unless a living healer chose the same target.
pub fn resolve_night(room: &Room, players: &Roster) -> Transition {
    let alive = alive_map(players);
    let mafia = alive_with_role(players, Role::Mafia);
    let target = tally(mafia.iter().map(|p| (&p.id, &p.night_vote)), &alive)
        .map(|t| t.target)
        .filter(|id| players.contains_key(id));

    let healed: HashSet<&PlayerId> = alive_with_role(players, Role::Healer)
        .into_iter()
        .filter_map(|p| p.heal_target.target())
        .collect();

    let mut result = NightResult::default();
    let mut batch = WriteBatch::default();
    for id in players.keys() {
        batch = batch.with_player(id.clone(), PlayerPatch::clear_night_actions());
    }

    match target {
        Some(id) if healed.contains(&id) => {
            result.healed = true;
            result.healed_player = players.get(&id).map(|p| p.display_name.clone());
        }
        Some(id) => {
            batch = batch.with_player(id.clone(), PlayerPatch::kill());
            result.killed = Some(id);
        }
        None => {}
    }

    finish(
        room,
        players,
        batch,
        GamePhase::NightHealer,
        RoomPatch::phase(GamePhase::Day).with_night_result(result.clone()),
        Some(result),
    )
}

/// Eliminates the day vote's top target, then either ends the game or starts the next night.
pub fn resolve_day(room: &Room, players: &Roster) -> Transition {
    let alive = alive_map(players);
    let target = tally(players.iter().map(|(id, p)| (id, &p.day_vote)), &alive)
        .map(|t| t.target)
        .filter(|id| players.contains_key(id));

    let mut batch = WriteBatch::default();
    for id in players.keys() {
        batch = batch.with_player(id.clone(), PlayerPatch::clear_day_vote());
    }
    if let Some(id) = target {
        batch = batch.with_player(id, PlayerPatch::kill());
    }

    let next_night = RoomPatch {
        phase: Some(GamePhase::NightMafia),
        round: Some(room.round + 1),
        ..Default::default()
    };
    finish(room, players, batch, GamePhase::Day, next_night, None)
}

// Win-checks the roster as it will be after `batch` and picks the room patch.
fn finish(
    room: &Room,
    players: &Roster,
    mut batch: WriteBatch,
    from: GamePhase,
    continue_with: RoomPatch,
    night_result: Option<NightResult>,
) -> Transition {
    let mut after_room = room.clone();
    let mut after_players = players.clone();
    batch.apply_to(&mut after_room, &mut after_players);

    match win::evaluate(after_players.values()) {
        Some(winner) => {
            let mut patch = RoomPatch::end(winner);
            if let Some(result) = night_result {
                patch = patch.with_night_result(result);
            }
            batch.room = patch;
            Transition {
                resolution: Resolution::Ended { winner },
                batch,
            }
        }
        None => {
            let to = continue_with.phase.unwrap_or(from);
            batch.room = continue_with;
            Transition {
                resolution: Resolution::Advanced { from, to },
                batch,
            }
        }
    }
}

#[derive(Clone)]
pub struct PhaseMachine {
    store: Arc<dyn DocumentStore>,
}

impl PhaseMachine {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// One resolution attempt for a room believed to be in `observed`.
    pub async fn try_advance(
        &self,
        room_id: &str,
        observed: GamePhase,
    ) -> Result<Resolution, GameError> {
        let room = self
            .store
            .get_room(room_id)
            .await?
            .ok_or(GameError::NotFound("room"))?;
        if room.phase != observed {
            debug!(
                "room {}: skip {} resolution, already at {}",
                room_id, observed, room.phase
            );
            return Ok(Resolution::Stale {
                expected: observed,
                actual: room.phase,
            });
        }

        let players = self.store.list_players(room_id).await?;
        let Some(transition) = plan(&room, &players) else {
            return Ok(Resolution::Pending);
        };

        match self
            .store
            .commit(room_id, PhaseGuard::of(&room), transition.batch)
            .await?
        {
            CommitOutcome::Applied => {
                info!(
                    "room {} round {}: {:?}",
                    room_id, room.round, transition.resolution
                );
                Ok(transition.resolution)
            }
            CommitOutcome::Rejected { phase, round } => {
                debug!(
                    "room {}: lost {} resolution race, now {} round {}",
                    room_id, observed, phase, round
                );
                Ok(Resolution::Stale {
                    expected: observed,
                    actual: phase,
                })
            }
            CommitOutcome::Outdated => {
                debug!(
                    "room {}: {} plan outdated by a concurrent write",
                    room_id, observed
                );
                Ok(Resolution::Stale {
                    expected: observed,
                    actual: room.phase,
                })
            }
        }
    }

    /// Resolves whatever phase the room is currently in.
    pub async fn resolve_current(&self, room_id: &str) -> Result<Resolution, GameError> {
        let room = self
            .store
            .get_room(room_id)
            .await?
            .ok_or(GameError::NotFound("room"))?;
        self.try_advance(room_id, room.phase).await
    }

    /// Keeps resolving while phases complete on their own, e.g. a police
    /// guess spent in an earlier round followed by a dead healer.
    pub async fn settle(&self, room_id: &str) -> Result<Vec<Resolution>, GameError> {
        let mut steps = Vec::new();
        for _ in 0..MAX_CASCADE {
            let step = self.resolve_current(room_id).await?;
            let progressed = step.made_progress();
            steps.push(step);
            if !progressed {
                break;
            }
        }
        Ok(steps)
    }
}
