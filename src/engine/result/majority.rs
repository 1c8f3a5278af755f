use std::collections::HashSet;

use crate::model::mongodb::Id;

/// Fill up to `seats` seats with the highest counts.
///
/// A tie straddling the last seat leaves every tied alternative without a seat, so fewer
/// than `seats` winners may be returned. Alternatives with no votes never win.
pub fn top_seats(counts: &[(Id, u64)], seats: usize) -> HashSet<Id> {
    let mut ranked = counts
        .iter()
        .copied()
        .filter(|(_, votes)| *votes > 0)
        .collect::<Vec<_>>();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    if seats == 0 {
        return HashSet::new();
    }
    if ranked.len() <= seats {
        return ranked.into_iter().map(|(id, _)| id).collect();
    }

    let cutoff = ranked[seats - 1].1;
    let straddles = ranked[seats].1 == cutoff;
    ranked
        .into_iter()
        .take(seats)
        .filter(|(_, votes)| !straddles || *votes > cutoff)
        .map(|(id, _)| id)
        .collect()
}

/// Winners of a qualified-majority count: alternatives whose share of the non-blank
/// votes strictly exceeds `threshold` percent, seated by [`top_seats`].
pub fn qualified_seats(counts: &[(Id, u64)], seats: usize, threshold: u32) -> HashSet<Id> {
    let total = counts.iter().map(|(_, votes)| votes).sum::<u64>();
    let qualifying = counts
        .iter()
        .copied()
        .filter(|(_, votes)| {
            u128::from(*votes) * 100 > u128::from(threshold) * u128::from(total)
        })
        .collect::<Vec<_>>();
    top_seats(&qualifying, seats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids<const N: usize>() -> [Id; N] {
        [(); N].map(|_| Id::new())
    }

    #[test]
    fn highest_count_wins() {
        let [a, b] = ids();
        let winners = top_seats(&[(a, 2), (b, 1)], 1);
        assert_eq!(winners, HashSet::from([a]));
    }

    #[test]
    fn tie_for_last_seat_has_no_winner() {
        let [a, b] = ids();
        assert!(top_seats(&[(a, 1), (b, 1)], 1).is_empty());
    }

    #[test]
    fn tie_below_a_clear_leader_only_drops_the_tied() {
        let [a, b, c, d] = ids();
        let counts = [(a, 3), (b, 2), (c, 2), (d, 1)];
        assert_eq!(top_seats(&counts, 2), HashSet::from([a]));
        assert_eq!(top_seats(&counts, 3), HashSet::from([a, b, c]));
    }

    #[test]
    fn zero_votes_never_win() {
        let [a, b] = ids();
        assert_eq!(top_seats(&[(a, 1), (b, 0)], 2), HashSet::from([a]));
        assert!(top_seats(&[(a, 0), (b, 0)], 1).is_empty());
    }

    #[test]
    fn no_seats_no_winners() {
        let [a] = ids();
        assert!(top_seats(&[(a, 5)], 0).is_empty());
    }

    #[test]
    fn qualified_share_must_strictly_exceed_threshold() {
        let [a, b] = ids();
        let counts = [(a, 2), (b, 1)];
        assert_eq!(qualified_seats(&counts, 1, 66), HashSet::from([a]));
        assert!(qualified_seats(&counts, 1, 67).is_empty());
    }

    #[test]
    fn exact_threshold_does_not_qualify() {
        let [a, b] = ids();
        assert!(qualified_seats(&[(a, 1), (b, 1)], 1, 50).is_empty());
    }

    #[test]
    fn qualified_without_votes_has_no_winner() {
        let [a] = ids();
        assert!(qualified_seats(&[(a, 0)], 1, 0).is_empty());
    }
}
