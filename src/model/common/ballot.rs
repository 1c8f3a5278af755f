use rocket::http::Status;
use thiserror::Error;

/// Reasons a cast is refused. These are legitimate outcomes that callers branch on,
/// so each has its own variant rather than a free-form message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BallotRejection {
    #[error("votation is not open")]
    VotationNotOpen,
    #[error("caller is not a participant of the meeting")]
    NotParticipant,
    #[error("participant is not eligible to vote")]
    NotVotingEligible,
    #[error("participant has already voted")]
    AlreadyVoted,
    #[error("blank votes are not allowed in this votation")]
    BlankVotesNotAllowed,
    #[error("alternative does not belong to the votation")]
    AlternativeNotInVotation,
    #[error("ballot kind does not match the votation type")]
    WrongVotationType,
    #[error("invalid ranking: {0}")]
    InvalidRanking(String),
}

impl BallotRejection {
    pub fn status(&self) -> Status {
        match self {
            Self::AlreadyVoted | Self::VotationNotOpen => Status::Conflict,
            Self::NotParticipant | Self::NotVotingEligible => Status::Forbidden,
            Self::BlankVotesNotAllowed
            | Self::AlternativeNotInVotation
            | Self::WrongVotationType
            | Self::InvalidRanking(_) => Status::BadRequest,
        }
    }
}
