use log::{debug, warn};

use crate::models::{game::Winner, player::Player};

/// Decides the game from the living roster.
///
/// A living player without a role means the roster is not fully written yet;
/// the game is never ended on such data.
pub fn evaluate<'a>(players: impl IntoIterator<Item = &'a Player>) -> Option<Winner> {
    let mut mafia_alive = 0usize;
    let mut others_alive = 0usize;
    let mut without_role = 0usize;

    for player in players.into_iter().filter(|p| p.is_alive) {
        match player.role {
            Some(role) if role.is_mafia() => mafia_alive += 1,
            Some(_) => others_alive += 1,
            None => {
                warn!("win check: {} has no role yet", player.display_name);
                without_role += 1;
            }
        }
    }

    debug!(
        "win check: mafia_alive={} others_alive={} without_role={}",
        mafia_alive, others_alive, without_role
    );

    if without_role > 0 {
        return None;
    }
    if mafia_alive == 0 {
        return Some(Winner::Town);
    }
    // mafia vote as a block, so parity already decides the day votes
    if mafia_alive >= others_alive {
        return Some(Winner::Mafia);
    }
    None
}
