use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core alternative data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlternativeCore {
    pub votation_id: Id,
    pub text: String,
    /// Set only by result computation.
    pub is_winner: bool,
}

impl AlternativeCore {
    pub fn new(votation_id: Id, text: String) -> Self {
        Self {
            votation_id,
            text,
            is_winner: false,
        }
    }
}

/// An alternative without an ID.
pub type NewAlternative = AlternativeCore;

/// An alternative from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alternative {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub alternative: AlternativeCore,
}

impl Deref for Alternative {
    type Target = AlternativeCore;

    fn deref(&self) -> &Self::Target {
        &self.alternative
    }
}

impl DerefMut for Alternative {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.alternative
    }
}
