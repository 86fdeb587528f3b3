use serde::{Deserialize, Serialize};

use super::role::Role;

/// Stable per-session participant identifier, provided by the identity layer.
pub type PlayerId = String;

/// Submission state of a per-phase action.
///
/// `Unset` means the player has not acted in the current cycle. `Abstain` is an
/// explicit "no vote", which still counts as submitted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum Vote {
    #[default]
    Unset,
    Abstain,
    Target(PlayerId),
}

impl Vote {
    pub fn is_submitted(&self) -> bool {
        !matches!(self, Vote::Unset)
    }

    pub fn target(&self) -> Option<&PlayerId> {
        match self {
            Vote::Target(id) => Some(id),
            _ => None,
        }
    }
}

impl From<Option<PlayerId>> for Vote {
    fn from(value: Option<PlayerId>) -> Self {
        match value {
            Some(id) => Vote::Target(id),
            None => Vote::Abstain,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub display_name: String,
    pub is_alive: bool,
    pub role: Option<Role>,
    pub night_vote: Vote,
    pub heal_target: Vote,
    pub day_vote: Vote,
    /// One guess per game. Survives night resolution; only a new game clears it.
    pub police_guess: Option<PlayerId>,
}

impl Player {
    pub fn new(id: PlayerId, display_name: String) -> Self {
        Self {
            id,
            display_name,
            is_alive: true,
            role: None,
            night_vote: Vote::Unset,
            heal_target: Vote::Unset,
            day_vote: Vote::Unset,
            police_guess: None,
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role == Some(role)
    }

    pub fn is_alive_as(&self, role: Role) -> bool {
        self.is_alive && self.has_role(role)
    }

    pub fn has_guessed(&self) -> bool {
        self.police_guess.is_some()
    }
}

/// Field-level merge onto a player document. `None` leaves the field untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerPatch {
    pub display_name: Option<String>,
    pub is_alive: Option<bool>,
    pub role: Option<Option<Role>>,
    pub night_vote: Option<Vote>,
    pub heal_target: Option<Vote>,
    pub day_vote: Option<Vote>,
    pub police_guess: Option<Option<PlayerId>>,
}

impl PlayerPatch {
    pub fn kill() -> Self {
        Self {
            is_alive: Some(false),
            ..Default::default()
        }
    }

    pub fn clear_night_actions() -> Self {
        Self {
            night_vote: Some(Vote::Unset),
            heal_target: Some(Vote::Unset),
            ..Default::default()
        }
    }

    pub fn clear_day_vote() -> Self {
        Self {
            day_vote: Some(Vote::Unset),
            ..Default::default()
        }
    }

    pub fn assign(role: Role) -> Self {
        Self {
            is_alive: Some(true),
            role: Some(Some(role)),
            night_vote: Some(Vote::Unset),
            heal_target: Some(Vote::Unset),
            day_vote: Some(Vote::Unset),
            police_guess: Some(None),
            ..Default::default()
        }
    }

    /// Rematch reset: everything but the display name goes back to a fresh join.
    pub fn reset_for_rematch() -> Self {
        Self {
            role: Some(None),
            ..Self::assign(Role::Villager)
        }
    }

    pub fn apply(&self, player: &mut Player) {
        if let Some(name) = &self.display_name {
            player.display_name = name.clone();
        }
        if let Some(alive) = self.is_alive {
            player.is_alive = alive;
        }
        if let Some(role) = self.role {
            player.role = role;
        }
        if let Some(vote) = &self.night_vote {
            player.night_vote = vote.clone();
        }
        if let Some(vote) = &self.heal_target {
            player.heal_target = vote.clone();
        }
        if let Some(vote) = &self.day_vote {
            player.day_vote = vote.clone();
        }
        if let Some(guess) = &self.police_guess {
            player.police_guess = guess.clone();
        }
    }
}
