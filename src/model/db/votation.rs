use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::{
    common::votation::{VotationStatus, VotationType},
    mongodb::Id,
};

/// The parameters of a votation that an admin chooses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotationSettings {
    pub title: String,
    pub description: Option<String>,
    /// Display position within the meeting.
    pub index: u32,
    #[serde(rename = "type")]
    pub kind: VotationType,
    /// Percentage a winner must strictly exceed; only meaningful for qualified votations.
    pub majority_threshold: u32,
    pub number_of_winners: u32,
    /// Whether blank ballots may be cast.
    pub blank_votes: bool,
    /// Whether live counts are hidden from ordinary participants.
    pub hidden_votes: bool,
}

/// Core votation data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotationCore {
    pub meeting_id: Id,
    #[serde(flatten)]
    pub settings: VotationSettings,
    pub status: VotationStatus,
    /// Number of blank ballots cast.
    pub blank_vote_count: u64,
    /// Number of ballots of any kind cast.
    pub ballot_count: u64,
    /// Number of times the winners were computed. Every count writes it.
    #[serde(default)]
    pub times_counted: u64,
}

impl VotationCore {
    /// A fresh, upcoming votation in the given meeting.
    pub fn new(meeting_id: Id, settings: VotationSettings) -> Self {
        Self {
            meeting_id,
            settings,
            status: VotationStatus::Upcoming,
            blank_vote_count: 0,
            ballot_count: 0,
            times_counted: 0,
        }
    }
}

/// A votation without an ID.
pub type NewVotation = VotationCore;

/// A votation from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Votation {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub votation: VotationCore,
}

impl Deref for Votation {
    type Target = VotationCore;

    fn deref(&self) -> &Self::Target {
        &self.votation
    }
}

impl DerefMut for Votation {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.votation
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl VotationSettings {
        pub fn simple_example() -> Self {
            Self {
                title: "Elect a chair".to_string(),
                description: Some("Who should chair the assembly?".to_string()),
                index: 0,
                kind: VotationType::Simple,
                majority_threshold: 50,
                number_of_winners: 1,
                blank_votes: true,
                hidden_votes: true,
            }
        }

        pub fn qualified_example(threshold: u32) -> Self {
            Self {
                title: "Amend the statutes".to_string(),
                kind: VotationType::Qualified,
                majority_threshold: threshold,
                index: 1,
                ..Self::simple_example()
            }
        }

        pub fn stv_example(seats: u32) -> Self {
            Self {
                title: "Elect the board".to_string(),
                kind: VotationType::Stv,
                number_of_winners: seats,
                index: 2,
                ..Self::simple_example()
            }
        }
    }
}
