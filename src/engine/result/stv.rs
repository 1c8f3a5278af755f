//! Single transferable vote with the Droop quota.
//!
//! Ballot weights are fixed-point numbers with five decimal places. Transfer values are
//! truncated, so the count is exact and deterministic for a given ballot set.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::model::mongodb::Id;

/// One whole vote in fixed-point.
pub const UNIT_WEIGHT: u64 = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Standing {
    Continuing,
    Elected,
    Eliminated,
}

struct Ballot {
    /// Indices into the alternative list, most preferred first.
    preferences: Vec<usize>,
    /// Index into `preferences` of the candidate currently holding this ballot.
    position: usize,
    weight: u64,
}

impl Ballot {
    /// Move on to the first continuing preference. Returns the holder, or `None` if the
    /// ballot is exhausted.
    fn settle(&mut self, standings: &[Standing]) -> Option<usize> {
        while let Some(&candidate) = self.preferences.get(self.position) {
            if standings[candidate] == Standing::Continuing {
                return Some(candidate);
            }
            self.position += 1;
        }
        None
    }
}

/// First-preference counts per alternative, in alternative order. Preferences naming
/// unknown alternatives are skipped.
pub fn first_preferences(alternatives: &[Id], ballots: &[Vec<Id>]) -> Vec<u64> {
    let mut counts = vec![0; alternatives.len()];
    for ballot in ballots {
        if let Some(first) = parse(alternatives, ballot).first() {
            counts[*first] += 1;
        }
    }
    counts
}

/// Resolve a ballot to alternative indices, dropping unknown and repeated entries.
fn parse(alternatives: &[Id], ballot: &[Id]) -> Vec<usize> {
    let mut seen = HashSet::new();
    ballot
        .iter()
        .filter_map(|id| alternatives.iter().position(|a| a == id))
        .filter(|index| seen.insert(*index))
        .collect()
}

/// Count ranked ballots for `seats` seats.
///
/// Ties for elimination go to the candidate with the fewest first preferences, then to
/// the one listed last. Candidates reaching quota in the same round are seated in the
/// opposite order.
pub fn count(alternatives: &[Id], ballots: &[Vec<Id>], seats: usize) -> HashSet<Id> {
    let first = first_preferences(alternatives, ballots);
    let mut ballots = ballots
        .iter()
        .map(|ballot| Ballot {
            preferences: parse(alternatives, ballot),
            position: 0,
            weight: UNIT_WEIGHT,
        })
        .filter(|ballot| !ballot.preferences.is_empty())
        .collect::<Vec<_>>();

    if ballots.is_empty() || seats == 0 {
        return HashSet::new();
    }

    let mut standings = vec![Standing::Continuing; alternatives.len()];
    let mut elected = Vec::new();

    // Weaker candidates compare as `Less`.
    let strength = |tallies: &[u64], a: usize, b: usize| -> Ordering {
        tallies[a]
            .cmp(&tallies[b])
            .then(first[a].cmp(&first[b]))
            .then(b.cmp(&a))
    };

    while elected.len() < seats {
        let remaining = seats - elected.len();

        let mut tallies = vec![0u64; alternatives.len()];
        let mut active = 0u64;
        for ballot in ballots.iter_mut() {
            if ballot.weight == 0 {
                continue;
            }
            if let Some(holder) = ballot.settle(&standings) {
                tallies[holder] += ballot.weight;
                active += 1;
            }
        }

        let mut continuing = (0..alternatives.len())
            .filter(|&c| standings[c] == Standing::Continuing)
            .collect::<Vec<_>>();
        continuing.sort_by(|&a, &b| strength(&tallies, b, a));

        if continuing.len() <= remaining {
            elected.extend(continuing);
            break;
        }
        if active == 0 {
            break;
        }

        let quota = (active / (seats as u64 + 1) + 1) * UNIT_WEIGHT;
        let reached = continuing
            .iter()
            .copied()
            .filter(|&c| tallies[c] >= quota)
            .take(remaining)
            .collect::<Vec<_>>();

        if reached.is_empty() {
            // `continuing` is strongest first, so the weakest is last.
            if let Some(&weakest) = continuing.last() {
                debug!("STV: eliminating candidate {weakest} with {}", tallies[weakest]);
                standings[weakest] = Standing::Eliminated;
            }
            continue;
        }

        for candidate in reached {
            debug!("STV: electing candidate {candidate} with {}", tallies[candidate]);
            standings[candidate] = Standing::Elected;
            elected.push(candidate);

            let total = tallies[candidate];
            let surplus = total - quota;
            for ballot in ballots.iter_mut() {
                if ballot.preferences.get(ballot.position) == Some(&candidate) {
                    ballot.weight = transfer_weight(ballot.weight, surplus, total);
                }
            }
        }
    }

    elected.into_iter().map(|c| alternatives[c]).collect()
}

/// The weight a ballot carries on after its holder is elected with `surplus` of `total`.
fn transfer_weight(weight: u64, surplus: u64, total: u64) -> u64 {
    if total == 0 {
        return 0;
    }
    (u128::from(weight) * u128::from(surplus) / u128::from(total)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids<const N: usize>() -> [Id; N] {
        [(); N].map(|_| Id::new())
    }

    #[test]
    fn lowest_is_eliminated_and_transferred() {
        let [a, b, c] = ids();
        let ballots = vec![vec![a, b], vec![a, b], vec![b, a], vec![c], vec![c]];
        assert_eq!(count(&[a, b, c], &ballots, 1), HashSet::from([a]));
    }

    #[test]
    fn majority_of_first_preferences_wins_outright() {
        let [a, b] = ids();
        let ballots = vec![vec![a], vec![a], vec![b]];
        assert_eq!(count(&[a, b], &ballots, 1), HashSet::from([a]));
    }

    #[test]
    fn surplus_elects_second_preference() {
        let [a, b, c, d] = ids();
        // Quota for 2 seats of 7 ballots is 3. A has 5: surplus 2/5 of each ballot goes
        // to B, giving 2.0 against C's 1 and D's 1.
        let mut ballots = vec![vec![a, b]; 5];
        ballots.push(vec![c]);
        ballots.push(vec![d]);
        assert_eq!(count(&[a, b, c, d], &ballots, 2), HashSet::from([a, b]));
    }

    #[test]
    fn elimination_tie_breaks_on_order() {
        let [a, b, c] = ids();
        // All three tie on 2 votes and 2 first preferences against a quota of 4.
        // C is listed last and goes first; its ballots carry A to 4.
        let ballots = vec![vec![a], vec![a], vec![b, c], vec![c, a], vec![b], vec![c, a]];
        assert_eq!(count(&[a, b, c], &ballots, 1), HashSet::from([a]));
    }

    #[test]
    fn no_ballots_no_winners() {
        let [a, b] = ids();
        assert!(count(&[a, b], &[], 1).is_empty());
        assert!(count(&[a, b], &[vec![]], 1).is_empty());
    }

    #[test]
    fn remaining_candidates_fill_remaining_seats() {
        let [a, b] = ids();
        let ballots = vec![vec![a], vec![b], vec![b]];
        assert_eq!(count(&[a, b], &ballots, 2), HashSet::from([a, b]));
    }

    #[test]
    fn unknown_and_repeated_preferences_are_ignored() {
        let [a, b, stranger] = ids();
        let ballots = vec![vec![stranger, a, a], vec![a], vec![b]];
        assert_eq!(first_preferences(&[a, b], &ballots), vec![2, 1]);
        assert_eq!(count(&[a, b], &ballots, 1), HashSet::from([a]));
    }

    #[test]
    fn counting_is_repeatable() {
        let [a, b, c, d] = ids();
        let ballots = vec![
            vec![a, c],
            vec![b, d, a],
            vec![c, a],
            vec![d],
            vec![a, b],
            vec![c, b, d],
        ];
        let first = count(&[a, b, c, d], &ballots, 2);
        let second = count(&[a, b, c, d], &ballots, 2);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn transfer_truncates() {
        assert_eq!(transfer_weight(UNIT_WEIGHT, 1, 3), 33_333);
        assert_eq!(transfer_weight(UNIT_WEIGHT, 0, 3), 0);
        assert_eq!(transfer_weight(UNIT_WEIGHT, 5, 0), 0);
    }
}
