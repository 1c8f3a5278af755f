use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{meeting::MeetingStatus, UserId},
    mongodb::Id,
};

/// Core meeting data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingCore {
    pub organization: String,
    pub title: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_time: DateTime<Utc>,
    pub description: Option<String>,
    pub status: MeetingStatus,
    /// The owning user. Always an ADMIN participant of this meeting.
    pub owner_id: UserId,
}

/// A meeting without an ID.
pub type NewMeeting = MeetingCore;

/// A meeting from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meeting {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub meeting: MeetingCore,
}

impl Deref for Meeting {
    type Target = MeetingCore;

    fn deref(&self) -> &Self::Target {
        &self.meeting
    }
}

impl DerefMut for Meeting {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.meeting
    }
}

/// A partial update to a meeting. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingUpdate {
    pub organization: Option<String>,
    pub title: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub status: Option<MeetingStatus>,
}

impl MeetingUpdate {
    /// Apply this update in place.
    pub fn apply(self, meeting: &mut MeetingCore) {
        if let Some(organization) = self.organization {
            meeting.organization = organization;
        }
        if let Some(title) = self.title {
            meeting.title = title;
        }
        if let Some(start_time) = self.start_time {
            meeting.start_time = start_time;
        }
        if let Some(description) = self.description {
            meeting.description = Some(description);
        }
        if let Some(status) = self.status {
            meeting.status = status;
        }
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    use chrono::TimeZone;

    impl MeetingCore {
        pub fn example(owner_id: &str) -> Self {
            Self {
                organization: "Studentersamfundet".to_string(),
                title: "General assembly".to_string(),
                start_time: Utc.with_ymd_and_hms(2021, 4, 13, 11, 29, 58).unwrap(),
                description: Some("Spring general assembly".to_string()),
                status: MeetingStatus::Upcoming,
                owner_id: owner_id.to_string(),
            }
        }
    }
}
