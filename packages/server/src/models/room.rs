use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::game::{GamePhase, NightResult, Winner};
use super::player::PlayerId;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Open,
    InProgress,
    Ended,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Room {
    pub room_id: String,
    pub code: String,
    pub created_by: PlayerId,
    pub created_at: DateTime<Utc>,
    pub phase: GamePhase,
    pub status: RoomStatus,
    pub round: u32,
    pub winner: Option<Winner>,
    pub last_night_result: Option<NightResult>,
    pub max_players: usize,
}

impl Room {
    pub fn new(room_id: String, code: String, created_by: PlayerId, max_players: usize) -> Self {
        Room {
            room_id,
            code,
            created_by,
            created_at: Utc::now(),
            phase: GamePhase::Lobby,
            status: RoomStatus::Open,
            round: 0,
            winner: None,
            last_night_result: None,
            max_players,
        }
    }

    pub fn is_host(&self, player_id: &str) -> bool {
        self.created_by == player_id
    }
}

/// Field-level merge onto a room document. `None` leaves the field untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomPatch {
    pub code: Option<String>,
    pub phase: Option<GamePhase>,
    pub status: Option<RoomStatus>,
    pub round: Option<u32>,
    pub winner: Option<Option<Winner>>,
    pub last_night_result: Option<Option<NightResult>>,
}

impl RoomPatch {
    pub fn phase(phase: GamePhase) -> Self {
        Self {
            phase: Some(phase),
            ..Default::default()
        }
    }

    /// Terminal patch. Keeps `phase`, `status` and `winner` in lockstep.
    pub fn end(winner: Winner) -> Self {
        Self {
            phase: Some(GamePhase::Ended),
            status: Some(RoomStatus::Ended),
            winner: Some(Some(winner)),
            ..Default::default()
        }
    }

    pub fn with_night_result(mut self, result: NightResult) -> Self {
        self.last_night_result = Some(Some(result));
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &RoomPatch::default()
    }

    pub fn apply(&self, room: &mut Room) {
        if let Some(code) = &self.code {
            room.code = code.clone();
        }
        if let Some(phase) = self.phase {
            room.phase = phase;
        }
        if let Some(status) = self.status {
            room.status = status;
        }
        if let Some(round) = self.round {
            room.round = round;
        }
        if let Some(winner) = self.winner {
            room.winner = winner;
        }
        if let Some(result) = &self.last_night_result {
            room.last_night_result = result.clone();
        }
    }
}
