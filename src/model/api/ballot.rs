use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, db::ballot::Vote};

/// One entry of a ranked ballot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StvRanking {
    pub alternative_id: ApiId,
    /// 1 is the most preferred.
    pub ranking: u32,
}

/// Receipt for a single-choice vote. Names the alternative, never the voter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub id: ApiId,
    pub alternative_id: ApiId,
}

impl From<Vote> for VoteReceipt {
    fn from(vote: Vote) -> Self {
        Self {
            id: vote.id.into(),
            alternative_id: vote.alternative_id.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlankVoteCount {
    pub blank_vote_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCountResult {
    /// Ballots cast so far, blank ones included.
    pub vote_count: u64,
    pub voting_eligible_count: u64,
}

/// Per-alternative outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlternativeResult {
    pub id: ApiId,
    pub text: String,
    /// First-preference votes for ranked votations.
    pub votes: u64,
    pub is_winner: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotationResults {
    pub alternatives: Vec<AlternativeResult>,
    pub vote_count: u64,
    pub voting_eligible_count: u64,
    pub blank_votes: bool,
    pub blank_vote_count: u64,
}
