//! Fixed game rules: role quotas and vote thresholds.

pub const MIN_PLAYERS: usize = 4;

/// Mafia seats for a table of `player_count`.
pub fn mafia_count(player_count: usize) -> usize {
    match player_count {
        0..=4 => 1,
        5..=8 => 2,
        _ => 3,
    }
}

/// Votes needed for the mafia to settle on a target: strictly more than half.
pub fn majority_threshold(alive_mafia: usize) -> usize {
    alive_mafia / 2 + 1
}
