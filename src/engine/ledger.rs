use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::model::{
    api::ballot::{AlternativeResult, StvRanking, VotationResults, VoteCountResult},
    common::{ballot::BallotRejection, votation::VotationStatus},
    db::{
        ballot::{BallotRecord, HasVoted, StvVote, Vote},
        votation::Votation,
    },
    mongodb::Id,
};
use crate::store::CastOutcome;

use super::{result, Engine};

impl Engine {
    /// Cast a single-choice ballot for an alternative.
    pub async fn cast_vote(&self, alternative_id: Id, user_id: &str) -> Result<Vote> {
        let alternative = self.alternative(alternative_id).await?;
        let votation = self.votation(alternative.votation_id).await?;
        self.check_ballot(&votation, user_id, false).await?;

        let vote = Vote {
            id: Id::new(),
            votation_id: votation.id,
            alternative_id,
        };
        self.record(&votation, user_id, BallotRecord::Single(vote.clone()))
            .await?;
        Ok(vote)
    }

    /// Cast a blank ballot. Returns the votation's blank count afterwards.
    pub async fn cast_blank_vote(&self, votation_id: Id, user_id: &str) -> Result<u64> {
        let votation = self.votation(votation_id).await?;
        self.check_ballot(&votation, user_id, votation.settings.kind.is_ranked())
            .await?;
        if !votation.settings.blank_votes {
            return Err(BallotRejection::BlankVotesNotAllowed.into());
        }

        self.record(&votation, user_id, BallotRecord::Blank).await?;
        Ok(self.votation(votation_id).await?.blank_vote_count)
    }

    /// Cast a ranked ballot. Every ranking must name an alternative of the votation and
    /// the ranks must run 1, 2, ..., n.
    pub async fn cast_stv_vote(
        &self,
        votation_id: Id,
        rankings: &[StvRanking],
        user_id: &str,
    ) -> Result<()> {
        let votation = self.votation(votation_id).await?;
        self.check_ballot(&votation, user_id, true).await?;

        let preferences = order_rankings(rankings)?;
        let known = self
            .store
            .alternatives(votation_id)
            .await?
            .into_iter()
            .map(|alternative| alternative.id)
            .collect::<HashSet<_>>();
        if preferences.iter().any(|id| !known.contains(id)) {
            return Err(BallotRejection::AlternativeNotInVotation.into());
        }

        let ballot = StvVote {
            id: Id::new(),
            votation_id,
            preferences,
        };
        self.record(&votation, user_id, BallotRecord::Ranked(ballot))
            .await
    }

    /// Has the user cast a ballot in this votation?
    pub async fn has_voted(&self, votation_id: Id, user_id: &str) -> Result<bool> {
        self.store.has_voted(votation_id, user_id).await
    }

    /// Ballots cast so far against the number of eligible voters. Ordinary participants
    /// only see this when votes are not hidden or results are published.
    pub async fn get_vote_count(&self, votation_id: Id, user_id: &str) -> Result<VoteCountResult> {
        let votation = self.votation(votation_id).await?;
        let eligibility = self.eligibility(votation.meeting_id, user_id).await?;
        let visible = eligibility.is_privileged()
            || (eligibility.participant().is_some()
                && (!votation.settings.hidden_votes
                    || votation.status == VotationStatus::PublishedResult));
        if !visible {
            return Err(Error::Forbidden(format!(
                "Vote count of votation {votation_id} is hidden"
            )));
        }

        Ok(VoteCountResult {
            vote_count: votation.ballot_count,
            voting_eligible_count: self.voting_eligible_count(votation.meeting_id).await?,
        })
    }

    /// Per-alternative counts and winners. Admins and counters see them once counted,
    /// everyone else once published.
    pub async fn get_votation_results(
        &self,
        votation_id: Id,
        user_id: &str,
    ) -> Result<VotationResults> {
        let votation = self.votation(votation_id).await?;
        let eligibility = self.eligibility(votation.meeting_id, user_id).await?;
        let visible = match votation.status {
            VotationStatus::PublishedResult => eligibility.participant().is_some(),
            VotationStatus::CheckingResult => eligibility.is_privileged(),
            _ => false,
        };
        if !visible {
            return Err(Error::Forbidden(format!(
                "Results of votation {votation_id} are not available"
            )));
        }

        self.results(&votation).await
    }

    /// Assemble results without any visibility check.
    pub(super) async fn results(&self, votation: &Votation) -> Result<VotationResults> {
        let alternatives = self.store.alternatives(votation.id).await?;
        let ballots = self.store.ballots(votation.id).await?;
        let tally = result::tally(&votation.settings, &alternatives, &ballots);

        Ok(VotationResults {
            alternatives: alternatives
                .into_iter()
                .map(|alternative| AlternativeResult {
                    id: alternative.id.into(),
                    votes: tally.votes_for(alternative.id),
                    is_winner: alternative.is_winner,
                    text: alternative.alternative.text,
                })
                .collect(),
            vote_count: votation.ballot_count,
            voting_eligible_count: self.voting_eligible_count(votation.meeting_id).await?,
            blank_votes: votation.settings.blank_votes,
            blank_vote_count: votation.blank_vote_count,
        })
    }

    /// The checks every cast shares, in order: membership, eligibility, ballot kind,
    /// open status and a first look at whether they already voted.
    async fn check_ballot(&self, votation: &Votation, user_id: &str, ranked: bool) -> Result<()> {
        self.eligibility(votation.meeting_id, user_id)
            .await?
            .voter()?;
        if votation.settings.kind.is_ranked() != ranked {
            return Err(BallotRejection::WrongVotationType.into());
        }
        if votation.status != VotationStatus::Open {
            return Err(BallotRejection::VotationNotOpen.into());
        }
        if self.store.has_voted(votation.id, user_id).await? {
            return Err(BallotRejection::AlreadyVoted.into());
        }
        Ok(())
    }

    /// Commit a ballot. The store has the final say on the status and single-ballot rules.
    async fn record(&self, votation: &Votation, user_id: &str, ballot: BallotRecord) -> Result<()> {
        let marker = HasVoted {
            votation_id: votation.id,
            user_id: user_id.to_string(),
        };
        match self.store.record_ballot(marker, ballot).await? {
            CastOutcome::Recorded => {
                debug!("Recorded a ballot in votation {}", votation.id);
                Ok(())
            }
            CastOutcome::AlreadyVoted => Err(BallotRejection::AlreadyVoted.into()),
            CastOutcome::NotOpen => Err(BallotRejection::VotationNotOpen.into()),
        }
    }
}

/// Turn rankings into a preference list, most preferred first.
fn order_rankings(rankings: &[StvRanking]) -> std::result::Result<Vec<Id>, BallotRejection> {
    if rankings.is_empty() {
        return Err(BallotRejection::InvalidRanking(
            "at least one alternative must be ranked".to_string(),
        ));
    }

    let mut sorted = rankings.to_vec();
    sorted.sort_by_key(|r| r.ranking);
    for (expected, ranking) in (1..).zip(&sorted) {
        if ranking.ranking != expected {
            return Err(BallotRejection::InvalidRanking(format!(
                "ranks must run from 1 to {} without gaps or repeats",
                rankings.len()
            )));
        }
    }

    let mut seen = HashSet::new();
    if !sorted.iter().all(|r| seen.insert(r.alternative_id)) {
        return Err(BallotRejection::InvalidRanking(
            "an alternative is ranked more than once".to_string(),
        ));
    }

    Ok(sorted.into_iter().map(|r| Id::from(r.alternative_id)).collect())
}
