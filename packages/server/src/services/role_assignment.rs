use rand::{rngs::OsRng, seq::SliceRandom, Rng};
use std::collections::{HashMap, HashSet};

use crate::models::{
    player::PlayerId,
    role::Role,
    rule::{mafia_count, MIN_PLAYERS},
};
use crate::services::error::GameError;

/// Deals one role per participant, shuffled with the OS CSPRNG.
pub fn assign_roles(player_ids: &[PlayerId]) -> Result<HashMap<PlayerId, Role>, GameError> {
    assign_roles_with(player_ids, &mut OsRng)
}

pub fn assign_roles_with<R: Rng + ?Sized>(
    player_ids: &[PlayerId],
    rng: &mut R,
) -> Result<HashMap<PlayerId, Role>, GameError> {
    if player_ids.len() < MIN_PLAYERS {
        return Err(GameError::validation(format!(
            "Need at least {} players to start",
            MIN_PLAYERS
        )));
    }
    let unique: HashSet<&PlayerId> = player_ids.iter().collect();
    if unique.len() != player_ids.len() {
        return Err(GameError::validation("Duplicate participant in role assignment"));
    }

    let mut roles = role_pool(player_ids.len());
    roles.shuffle(rng);

    Ok(player_ids.iter().cloned().zip(roles).collect())
}

fn role_pool(player_count: usize) -> Vec<Role> {
    let mafia = mafia_count(player_count);
    let mut pool = Vec::with_capacity(player_count);
    pool.push(Role::Police);
    pool.push(Role::Healer);
    pool.extend(std::iter::repeat(Role::Mafia).take(mafia));
    pool.resize(player_count, Role::Villager);
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<PlayerId> {
        (0..n).map(|i| format!("p{}", i)).collect()
    }

    fn count(map: &HashMap<PlayerId, Role>, role: Role) -> usize {
        map.values().filter(|r| **r == role).count()
    }

    #[test]
    fn test_quotas_for_every_table_size() {
        for n in 4..=20 {
            let players = ids(n);
            let roles = assign_roles(&players).unwrap();

            assert_eq!(roles.len(), n);
            for id in &players {
                assert!(roles.contains_key(id), "{} missing for n={}", id, n);
            }
            let expected_mafia = match n {
                4 => 1,
                5..=8 => 2,
                _ => 3,
            };
            assert_eq!(count(&roles, Role::Mafia), expected_mafia, "n={}", n);
            assert_eq!(count(&roles, Role::Police), 1, "n={}", n);
            assert_eq!(count(&roles, Role::Healer), 1, "n={}", n);
            assert_eq!(
                count(&roles, Role::Villager),
                n - 2 - expected_mafia,
                "n={}",
                n
            );
        }
    }

    #[test]
    fn test_rejects_small_tables() {
        for n in 0..4 {
            assert!(matches!(
                assign_roles(&ids(n)),
                Err(GameError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let players = vec![
            "a".to_string(),
            "b".to_string(),
            "c".to_string(),
            "a".to_string(),
        ];
        assert!(assign_roles(&players).is_err());
    }

    #[test]
    fn test_every_seat_can_be_mafia() {
        // 4 players, 1 mafia: over many deals every seat should draw it at least once
        let players = ids(4);
        let mut seen = HashSet::new();
        for _ in 0..200 {
            let roles = assign_roles(&players).unwrap();
            let mafia = roles
                .iter()
                .find(|(_, r)| r.is_mafia())
                .map(|(id, _)| id.clone())
                .unwrap();
            seen.insert(mafia);
        }
        assert_eq!(seen.len(), 4);
    }
}
