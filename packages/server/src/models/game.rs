use serde::{Deserialize, Serialize};
use std::fmt;

use super::player::{Player, PlayerId};
use super::room::Room;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    Lobby,       // waiting for the host
    AssignRoles, // roles being written
    NightMafia,
    NightPolice,
    NightHealer,
    Day,
    Ended,
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GamePhase::Lobby => "lobby",
            GamePhase::AssignRoles => "assign_roles",
            GamePhase::NightMafia => "night_mafia",
            GamePhase::NightPolice => "night_police",
            GamePhase::NightHealer => "night_healer",
            GamePhase::Day => "day",
            GamePhase::Ended => "ended",
        };
        f.write_str(label)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Winner {
    Town,
    Mafia,
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Winner::Town => write!(f, "town"),
            Winner::Mafia => write!(f, "mafia"),
        }
    }
}

/// Public summary of the latest night. A save names the saved player but not the healer.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NightResult {
    pub killed: Option<PlayerId>,
    pub healed: bool,
    pub healed_player: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomCounts {
    pub total: usize,
    pub alive: usize,
    pub mafia_alive: usize,
}

impl RoomCounts {
    pub fn from_players<'a>(players: impl IntoIterator<Item = &'a Player>) -> Self {
        players.into_iter().fold(RoomCounts::default(), |mut acc, p| {
            acc.total += 1;
            if p.is_alive {
                acc.alive += 1;
                if p.role.map(|r| r.is_mafia()).unwrap_or(false) {
                    acc.mafia_alive += 1;
                }
            }
            acc
        })
    }
}

/// Snapshot served to clients: the room aggregate plus derived counts.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameView {
    pub room: Room,
    pub players: Vec<Player>,
    pub counts: RoomCounts,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoliceReport {
    pub target_id: PlayerId,
    pub target_name: String,
    pub is_mafia: bool,
}
