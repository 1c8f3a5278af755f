use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::id::ApiId,
    common::{
        meeting::{MeetingStatus, Role},
        UserId,
    },
    db::{
        meeting::{Meeting, NewMeeting},
        participant::{Invite, Participant},
    },
};

/// Description used when a meeting is created without one.
pub const DEFAULT_MEETING_DESCRIPTION: &str = "Ingen beskrivelse satt.";

/// A request to create a meeting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingSpec {
    pub organization: String,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub description: Option<String>,
}

impl MeetingSpec {
    /// Convert this spec into a new, upcoming meeting owned by the given user.
    pub fn into_meeting(self, owner_id: UserId) -> NewMeeting {
        NewMeeting {
            organization: self.organization,
            title: self.title,
            start_time: self.start_time,
            description: Some(
                self.description
                    .unwrap_or_else(|| DEFAULT_MEETING_DESCRIPTION.to_string()),
            ),
            status: MeetingStatus::Upcoming,
            owner_id,
        }
    }
}

/// API-friendly representation of a meeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingDescription {
    pub id: ApiId,
    pub organization: String,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub description: Option<String>,
    pub status: MeetingStatus,
    pub owner_id: UserId,
}

impl From<Meeting> for MeetingDescription {
    fn from(meeting: Meeting) -> Self {
        Self {
            id: meeting.id.into(),
            organization: meeting.meeting.organization,
            title: meeting.meeting.title,
            start_time: meeting.meeting.start_time,
            description: meeting.meeting.description,
            status: meeting.meeting.status,
            owner_id: meeting.meeting.owner_id,
        }
    }
}

/// A participant to add or update, addressed by email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantSpec {
    pub email: String,
    pub role: Role,
    pub is_voting_eligible: bool,
}

/// Either a bound participant or a pending invite, addressed by email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantOrInvite {
    pub email: String,
    pub role: Role,
    pub is_voting_eligible: bool,
    /// Whether the email belongs to a registered user.
    pub user_exists: bool,
}

impl ParticipantOrInvite {
    pub fn from_participant(participant: &Participant, email: String) -> Self {
        Self {
            email,
            role: participant.role,
            is_voting_eligible: participant.is_voting_eligible,
            user_exists: true,
        }
    }
}

impl From<Invite> for ParticipantOrInvite {
    fn from(invite: Invite) -> Self {
        Self {
            email: invite.email,
            role: invite.role,
            is_voting_eligible: invite.is_voting_eligible,
            user_exists: false,
        }
    }
}

/// Outcome of removing participants. Trying to remove the owner is a legitimate outcome
/// the caller must handle, not a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "__typename")]
pub enum DeleteParticipantsResult {
    /// Emails that were removed.
    Deleted { emails: Vec<String> },
    OwnerCannotBeRemovedFromParticipantError { message: String },
}

impl DeleteParticipantsResult {
    pub fn owner_error() -> Self {
        Self::OwnerCannotBeRemovedFromParticipantError {
            message: "The owner of the meeting cannot be removed from its participants"
                .to_string(),
        }
    }
}
