//! Shared document store seen by every observer of a room.
//!
//! A room is one aggregate: the room document plus one document per player.
//! Writes are field merges. [`DocumentStore::commit`] applies a batch atomically
//! iff the room is still at the expected `(phase, round)` and every
//! [`Precondition`] of the batch holds. That is what makes phase transitions
//! exactly-once when many observers race on the same room, and what keeps
//! lobby joins and leaves from landing in a started game.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::broadcast;

use crate::models::{
    game::GamePhase,
    player::{Player, PlayerId, PlayerPatch},
    room::{Room, RoomPatch},
};

pub mod in_memory;

pub use in_memory::InMemoryStore;

/// Players of one room, ordered by participant id.
pub type Roster = BTreeMap<PlayerId, Player>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("document store unavailable")]
    Unavailable,
    #[error("room {0} not found")]
    RoomNotFound(String),
    #[error("player {player_id} not found in room {room_id}")]
    PlayerNotFound { room_id: String, player_id: PlayerId },
    #[error("room {0} already exists")]
    RoomExists(String),
}

/// Change notification pushed to subscribers after every committed write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StoreEvent {
    RoomChanged { room_id: String },
    PlayerChanged { room_id: String, player_id: PlayerId },
    PlayerRemoved { room_id: String, player_id: PlayerId },
}

impl StoreEvent {
    pub fn room_id(&self) -> &str {
        match self {
            StoreEvent::RoomChanged { room_id }
            | StoreEvent::PlayerChanged { room_id, .. }
            | StoreEvent::PlayerRemoved { room_id, .. } => room_id,
        }
    }
}

/// Precondition of a conditional commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseGuard {
    pub phase: GamePhase,
    pub round: u32,
}

impl PhaseGuard {
    /// A room that has not started (or was reset for a new game).
    pub fn lobby() -> Self {
        Self {
            phase: GamePhase::Lobby,
            round: 0,
        }
    }

    pub fn of(room: &Room) -> Self {
        Self {
            phase: room.phase,
            round: room.round,
        }
    }

    pub fn matches(&self, room: &Room) -> bool {
        room.phase == self.phase && room.round == self.round
    }
}

/// Document-level condition checked inside a commit, under the same lock as the guard.
#[derive(Debug, Clone, PartialEq)]
pub enum Precondition {
    /// The room holds exactly these players.
    Roster(BTreeSet<PlayerId>),
    /// The room holds fewer than this many players.
    RosterBelow(usize),
    /// The player document is exactly as it was read.
    Unchanged(Player),
}

impl Precondition {
    pub fn holds(&self, players: &Roster) -> bool {
        match self {
            Precondition::Roster(ids) => {
                players.len() == ids.len() && ids.iter().all(|id| players.contains_key(id))
            }
            Precondition::RosterBelow(limit) => players.len() < *limit,
            Precondition::Unchanged(snapshot) => players.get(&snapshot.id) == Some(snapshot),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    pub room: RoomPatch,
    pub players: Vec<(PlayerId, PlayerPatch)>,
    pub inserts: Vec<Player>,
    pub removals: Vec<PlayerId>,
    pub conditions: Vec<Precondition>,
}

impl WriteBatch {
    pub fn room(patch: RoomPatch) -> Self {
        Self {
            room: patch,
            ..Default::default()
        }
    }

    pub fn player(player_id: impl Into<PlayerId>, patch: PlayerPatch) -> Self {
        Self {
            players: vec![(player_id.into(), patch)],
            ..Default::default()
        }
    }

    pub fn with_player(mut self, player_id: impl Into<PlayerId>, patch: PlayerPatch) -> Self {
        self.players.push((player_id.into(), patch));
        self
    }

    /// Adds a new player document, replacing one with the same id.
    pub fn insert(mut self, player: Player) -> Self {
        self.inserts.push(player);
        self
    }

    pub fn remove(mut self, player_id: impl Into<PlayerId>) -> Self {
        self.removals.push(player_id.into());
        self
    }

    pub fn require(mut self, condition: Precondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Applies the batch to local copies; used to evaluate a transition before committing it.
    pub fn apply_to(&self, room: &mut Room, players: &mut Roster) {
        self.room.apply(room);
        for player in &self.inserts {
            players.insert(player.id.clone(), player.clone());
        }
        for (id, patch) in &self.players {
            if let Some(player) = players.get_mut(id) {
                patch.apply(player);
            }
        }
        for id in &self.removals {
            players.remove(id);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Applied,
    /// The guard no longer held; nothing was written.
    Rejected { phase: GamePhase, round: u32 },
    /// The phase still matched but a precondition failed; nothing was written.
    Outdated,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert_room(&self, room: Room) -> Result<(), StoreError>;

    async fn get_room(&self, room_id: &str) -> Result<Option<Room>, StoreError>;

    /// Equality query on the room code, oldest room first.
    async fn find_rooms_by_code(&self, code: &str) -> Result<Vec<Room>, StoreError>;

    async fn get_player(
        &self,
        room_id: &str,
        player_id: &str,
    ) -> Result<Option<Player>, StoreError>;

    async fn list_players(&self, room_id: &str) -> Result<Roster, StoreError>;

    async fn put_player(&self, room_id: &str, player: Player) -> Result<(), StoreError>;

    async fn update_player(
        &self,
        room_id: &str,
        player_id: &str,
        patch: PlayerPatch,
    ) -> Result<(), StoreError>;

    async fn commit(
        &self,
        room_id: &str,
        guard: PhaseGuard,
        batch: WriteBatch,
    ) -> Result<CommitOutcome, StoreError>;

    /// Change feed for one room. Dropping the receiver unsubscribes; a lagged
    /// receiver has missed events and should re-read the room.
    async fn subscribe(&self, room_id: &str) -> broadcast::Receiver<StoreEvent>;
}
