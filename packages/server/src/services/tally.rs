use std::collections::{BTreeMap, HashMap};

use crate::models::player::{PlayerId, Vote};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TallyResult {
    pub target: PlayerId,
    pub votes: usize,
    /// Another target reached the same count; `target` is the lowest id among them.
    pub tied: bool,
}

/// Plurality over the votes of living voters.
///
/// Voters missing from `alive` count as dead. Abstentions and unset votes are
/// ignored. Ties go to the lowest target id so every observer computes the
/// same answer from the same data.
pub fn tally<'a, I>(votes: I, alive: &HashMap<PlayerId, bool>) -> Option<TallyResult>
where
    I: IntoIterator<Item = (&'a PlayerId, &'a Vote)>,
{
    let mut counts: BTreeMap<&PlayerId, usize> = BTreeMap::new();
    for (voter, vote) in votes {
        if !alive.get(voter).copied().unwrap_or(false) {
            continue;
        }
        if let Some(target) = vote.target() {
            *counts.entry(target).or_insert(0) += 1;
        }
    }

    let mut top: Option<TallyResult> = None;
    for (target, votes) in counts {
        match top.as_mut() {
            Some(best) if votes == best.votes => best.tied = true,
            Some(best) if votes < best.votes => {}
            _ => {
                top = Some(TallyResult {
                    target: target.clone(),
                    votes,
                    tied: false,
                })
            }
        }
    }
    top
}
