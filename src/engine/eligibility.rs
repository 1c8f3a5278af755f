use crate::error::Result;
use crate::model::{
    common::{ballot::BallotRejection, meeting::Role},
    db::participant::Participant,
    mongodb::Id,
};

use super::Engine;

/// A caller's standing in one meeting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    NotParticipant,
    Participant(Participant),
}

impl Eligibility {
    pub fn participant(&self) -> Option<&Participant> {
        match self {
            Self::NotParticipant => None,
            Self::Participant(participant) => Some(participant),
        }
    }

    pub fn role(&self) -> Option<Role> {
        self.participant().map(|p| p.role)
    }

    /// Is the caller an admin or counter of the meeting?
    pub fn is_privileged(&self) -> bool {
        self.role().map_or(false, Role::is_privileged)
    }

    /// The participant, if they may cast a ballot.
    pub fn voter(self) -> std::result::Result<Participant, BallotRejection> {
        match self {
            Self::NotParticipant => Err(BallotRejection::NotParticipant),
            Self::Participant(p) if !p.is_voting_eligible => {
                Err(BallotRejection::NotVotingEligible)
            }
            Self::Participant(p) => Ok(p),
        }
    }
}

impl Engine {
    /// Look up the caller's standing in a meeting.
    pub async fn eligibility(&self, meeting_id: Id, user_id: &str) -> Result<Eligibility> {
        Ok(match self.store.participant(meeting_id, user_id).await? {
            Some(participant) => Eligibility::Participant(participant),
            None => Eligibility::NotParticipant,
        })
    }

    /// Number of participants of the meeting who may vote.
    pub async fn voting_eligible_count(&self, meeting_id: Id) -> Result<u64> {
        self.store.count_voting_eligible(meeting_id).await
    }
}
