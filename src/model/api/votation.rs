use serde::{Deserialize, Serialize};

use crate::model::{
    api::id::ApiId,
    common::votation::{VotationStatus, VotationType},
    db::{
        alternative::Alternative,
        votation::{Votation, VotationSettings},
    },
};

/// A request to create a votation, with the texts of its initial alternatives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VotationSpec {
    #[serde(flatten)]
    pub settings: VotationSettings,
    #[serde(default)]
    pub alternatives: Vec<String>,
}

/// An alternative to create or rename as part of a votation update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlternativeSpec {
    /// Existing alternative to rename; a new one is created when absent.
    pub id: Option<ApiId>,
    pub text: String,
}

/// A request to replace a votation's settings and upsert its alternatives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VotationUpdate {
    pub id: ApiId,
    #[serde(flatten)]
    pub settings: VotationSettings,
    #[serde(default)]
    pub alternatives: Vec<AlternativeSpec>,
}

/// A request to move a votation to another status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StatusRequest {
    pub status: VotationStatus,
}

/// API-friendly representation of a votation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotationDescription {
    pub id: ApiId,
    pub meeting_id: ApiId,
    pub title: String,
    pub description: Option<String>,
    pub index: u32,
    #[serde(rename = "type")]
    pub kind: VotationType,
    pub majority_threshold: u32,
    pub number_of_winners: u32,
    pub blank_votes: bool,
    pub hidden_votes: bool,
    pub status: VotationStatus,
}

impl From<Votation> for VotationDescription {
    fn from(votation: Votation) -> Self {
        let settings = votation.votation.settings;
        Self {
            id: votation.id.into(),
            meeting_id: votation.votation.meeting_id.into(),
            title: settings.title,
            description: settings.description,
            index: settings.index,
            kind: settings.kind,
            majority_threshold: settings.majority_threshold,
            number_of_winners: settings.number_of_winners,
            blank_votes: settings.blank_votes,
            hidden_votes: settings.hidden_votes,
            status: votation.votation.status,
        }
    }
}

/// API-friendly representation of an alternative. Winner flags are only shown once
/// results exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlternativeDescription {
    pub id: ApiId,
    pub votation_id: ApiId,
    pub text: String,
}

impl From<Alternative> for AlternativeDescription {
    fn from(alternative: Alternative) -> Self {
        Self {
            id: alternative.id.into(),
            votation_id: alternative.alternative.votation_id.into(),
            text: alternative.alternative.text,
        }
    }
}

/// Outcome of a status change. Opening a second votation in a meeting is a legitimate
/// outcome the caller must handle, not a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "__typename")]
pub enum UpdateVotationStatusResult {
    Votation(VotationDescription),
    MaxOneOpenVotationError { message: String },
}

impl UpdateVotationStatusResult {
    pub fn max_one_open() -> Self {
        Self::MaxOneOpenVotationError {
            message: "Only one votation can be open at a time in a meeting".to_string(),
        }
    }
}
