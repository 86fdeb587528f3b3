use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Mafia,
    Villager,
    Police,
    Healer,
}

impl Role {
    pub fn is_mafia(&self) -> bool {
        matches!(self, Role::Mafia)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Mafia => write!(f, "Mafia"),
            Role::Villager => write!(f, "Villager"),
            Role::Police => write!(f, "Police"),
            Role::Healer => write!(f, "Healer"),
        }
    }
}
