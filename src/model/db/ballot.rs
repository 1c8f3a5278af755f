use serde::{Deserialize, Serialize};

use crate::model::{common::UserId, mongodb::Id};

/// Marks that a user took part in a votation. Unique per (votation, user).
///
/// This is the only ballot record that names the voter; it never says what they chose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HasVoted {
    pub votation_id: Id,
    pub user_id: UserId,
}

/// An anonymous single-choice vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    #[serde(rename = "_id")]
    pub id: Id,
    pub votation_id: Id,
    pub alternative_id: Id,
}

/// An anonymous ranked ballot. `preferences` holds alternative IDs, most preferred first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StvVote {
    #[serde(rename = "_id")]
    pub id: Id,
    pub votation_id: Id,
    pub preferences: Vec<Id>,
}

/// The anonymous half of a cast, as handed to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BallotRecord {
    Blank,
    Single(Vote),
    Ranked(StvVote),
}

/// Every anonymous ballot of a votation, read once intake has closed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BallotSet {
    pub votes: Vec<Vote>,
    pub stv_votes: Vec<StvVote>,
    pub blank_count: u64,
}
