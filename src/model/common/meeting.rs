use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// States in the Meeting lifecycle. Purely informational; votations do not depend on it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeetingStatus {
    Upcoming,
    Ongoing,
    Ended,
}

impl From<MeetingStatus> for Bson {
    fn from(status: MeetingStatus) -> Self {
        to_bson(&status).expect("Serialisation is infallible")
    }
}

/// A participant's role within a single meeting.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Runs the meeting: manages votations and participants.
    Admin,
    /// Oversees counting: may see live totals.
    Counter,
    Participant,
}

impl Role {
    /// Privileged roles may see live counts and unpublished results.
    pub fn is_privileged(self) -> bool {
        matches!(self, Self::Admin | Self::Counter)
    }
}

impl From<Role> for Bson {
    fn from(role: Role) -> Self {
        to_bson(&role).expect("Serialisation is infallible")
    }
}
