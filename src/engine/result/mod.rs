//! Winner computation. Everything here is a pure function of the votation settings,
//! its alternatives and its frozen ballots.

use std::collections::HashSet;

use crate::model::{
    common::votation::VotationType,
    db::{alternative::Alternative, ballot::BallotSet, votation::VotationSettings},
    mongodb::Id,
};

pub mod majority;
pub mod stv;

/// The outcome of counting a votation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    /// Votes per alternative, in alternative order. First preferences for ranked votations.
    pub votes: Vec<(Id, u64)>,
    pub winners: HashSet<Id>,
}

impl Tally {
    pub fn votes_for(&self, alternative: Id) -> u64 {
        self.votes
            .iter()
            .find(|(id, _)| *id == alternative)
            .map(|(_, votes)| *votes)
            .unwrap_or_default()
    }
}

/// The winners of a votation under its counting rule.
pub fn winners(
    settings: &VotationSettings,
    alternatives: &[Alternative],
    ballots: &BallotSet,
) -> HashSet<Id> {
    tally(settings, alternatives, ballots).winners
}

/// Count the ballots of a votation under its counting rule.
pub fn tally(
    settings: &VotationSettings,
    alternatives: &[Alternative],
    ballots: &BallotSet,
) -> Tally {
    let ids = alternatives.iter().map(|a| a.id).collect::<Vec<_>>();
    let seats = settings.number_of_winners as usize;

    match settings.kind {
        VotationType::Simple | VotationType::Qualified => {
            let votes = ids
                .iter()
                .map(|&id| {
                    let count = ballots
                        .votes
                        .iter()
                        .filter(|vote| vote.alternative_id == id)
                        .count();
                    (id, count as u64)
                })
                .collect::<Vec<_>>();
            let winners = if settings.kind == VotationType::Simple {
                majority::top_seats(&votes, seats)
            } else {
                majority::qualified_seats(&votes, seats, settings.majority_threshold)
            };
            Tally { votes, winners }
        }
        VotationType::Stv => {
            let rankings = ballots
                .stv_votes
                .iter()
                .map(|ballot| ballot.preferences.clone())
                .collect::<Vec<_>>();
            let first = stv::first_preferences(&ids, &rankings);
            Tally {
                votes: ids.iter().copied().zip(first).collect(),
                winners: stv::count(&ids, &rankings, seats),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::db::{
        alternative::AlternativeCore,
        ballot::{StvVote, Vote},
    };

    fn alternatives(votation_id: Id, n: usize) -> Vec<Alternative> {
        (0..n)
            .map(|i| Alternative {
                id: Id::new(),
                alternative: AlternativeCore::new(votation_id, format!("Alternative {i}")),
            })
            .collect()
    }

    fn votes(votation_id: Id, choices: &[&Alternative]) -> BallotSet {
        BallotSet {
            votes: choices
                .iter()
                .map(|alternative| Vote {
                    id: Id::new(),
                    votation_id,
                    alternative_id: alternative.id,
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn simple_counts_and_winner() {
        let votation_id = Id::new();
        let alts = alternatives(votation_id, 2);
        let ballots = votes(votation_id, &[&alts[0], &alts[0], &alts[1]]);

        let tally = tally(&VotationSettings::simple_example(), &alts, &ballots);
        assert_eq!(tally.votes_for(alts[0].id), 2);
        assert_eq!(tally.votes_for(alts[1].id), 1);
        assert_eq!(tally.winners, HashSet::from([alts[0].id]));
    }

    #[test]
    fn simple_tie_has_no_winner() {
        let votation_id = Id::new();
        let alts = alternatives(votation_id, 2);
        let ballots = votes(votation_id, &[&alts[0], &alts[1]]);

        let tally = tally(&VotationSettings::simple_example(), &alts, &ballots);
        assert!(tally.winners.is_empty());
    }

    #[test]
    fn qualified_threshold_is_strict() {
        let votation_id = Id::new();
        let alts = alternatives(votation_id, 2);
        let ballots = votes(votation_id, &[&alts[0], &alts[0], &alts[1]]);

        let at_66 = tally(&VotationSettings::qualified_example(66), &alts, &ballots);
        let at_67 = tally(&VotationSettings::qualified_example(67), &alts, &ballots);
        assert_eq!(at_66.winners, HashSet::from([alts[0].id]));
        assert!(at_67.winners.is_empty());
    }

    #[test]
    fn blank_votes_do_not_count_towards_qualified_share() {
        let votation_id = Id::new();
        let alts = alternatives(votation_id, 2);
        let mut ballots = votes(votation_id, &[&alts[0], &alts[0], &alts[1]]);
        ballots.blank_count = 10;

        let tally = tally(&VotationSettings::qualified_example(66), &alts, &ballots);
        assert_eq!(tally.winners, HashSet::from([alts[0].id]));
    }

    #[test]
    fn stv_reports_first_preferences() {
        let votation_id = Id::new();
        let alts = alternatives(votation_id, 3);
        let (a, b, c) = (alts[0].id, alts[1].id, alts[2].id);
        let stv_votes = [vec![a, b], vec![a, b], vec![b, a], vec![c], vec![c]]
            .into_iter()
            .map(|preferences| StvVote {
                id: Id::new(),
                votation_id,
                preferences,
            })
            .collect();
        let ballots = BallotSet {
            stv_votes,
            ..Default::default()
        };

        let tally = tally(&VotationSettings::stv_example(1), &alts, &ballots);
        assert_eq!(tally.votes, vec![(a, 2), (b, 1), (c, 2)]);
        assert_eq!(tally.winners, HashSet::from([a]));
    }

    #[test]
    fn counting_twice_gives_the_same_winners() {
        let votation_id = Id::new();
        let alts = alternatives(votation_id, 3);
        let ballots = votes(votation_id, &[&alts[0], &alts[2], &alts[2], &alts[1]]);
        let settings = VotationSettings::simple_example();

        assert_eq!(
            tally(&settings, &alts, &ballots),
            tally(&settings, &alts, &ballots)
        );
    }
}
