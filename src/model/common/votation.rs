use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// States in the Votation lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VotationStatus {
    /// Being prepared; details and alternatives may still change.
    Upcoming,
    /// Accepting ballots. At most one per meeting.
    Open,
    /// Ballots frozen, winners computed, visible to counters and admins only.
    CheckingResult,
    /// Winners visible to every participant.
    PublishedResult,
    /// Voided by an administrator. Terminal.
    Invalid,
}

impl VotationStatus {
    /// Is moving from `self` to `target` a legal transition?
    ///
    /// Transitions only ever move forward through the lifecycle, one step at a time,
    /// except that anything which is not already invalid may be invalidated.
    pub fn can_transition_to(self, target: VotationStatus) -> bool {
        use VotationStatus::*;
        matches!(
            (self, target),
            (Upcoming, Open)
                | (Open, CheckingResult)
                | (CheckingResult, PublishedResult)
                | (Upcoming | Open | CheckingResult | PublishedResult, Invalid)
        )
    }
}

impl From<VotationStatus> for Bson {
    fn from(status: VotationStatus) -> Self {
        to_bson(&status).expect("Serialisation is infallible")
    }
}

/// The counting rule used to pick winners.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VotationType {
    /// Highest counts win.
    Simple,
    /// Winners must exceed a percentage threshold of non-blank votes.
    Qualified,
    /// Ranked ballots, single transferable vote.
    Stv,
}

impl VotationType {
    /// Does this type take ranked ballots?
    pub fn is_ranked(self) -> bool {
        self == Self::Stv
    }
}

impl From<VotationType> for Bson {
    fn from(kind: VotationType) -> Self {
        to_bson(&kind).expect("Serialisation is infallible")
    }
}
