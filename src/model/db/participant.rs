use serde::{Deserialize, Serialize};

use crate::model::{
    common::{meeting::Role, UserId},
    mongodb::Id,
};

/// A user's membership of a meeting. Unique per (user, meeting).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub meeting_id: Id,
    pub user_id: UserId,
    pub role: Role,
    pub is_voting_eligible: bool,
}

/// A pending membership for an email with no user account yet.
/// Carries no ballot rights until bound to a user. Unique per (email, meeting).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invite {
    pub meeting_id: Id,
    pub email: String,
    pub role: Role,
    pub is_voting_eligible: bool,
}

impl Invite {
    /// Turn this invite into a participant for the given user.
    pub fn bind(self, user_id: UserId) -> Participant {
        Participant {
            meeting_id: self.meeting_id,
            user_id,
            role: self.role,
            is_voting_eligible: self.is_voting_eligible,
        }
    }
}

/// A user account known to the backend, as registered from a verified bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: UserId,
    pub email: String,
}
