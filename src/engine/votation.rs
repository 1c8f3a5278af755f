use crate::error::{Error, Result};
use crate::model::{
    api::votation::{AlternativeSpec, VotationSpec, VotationUpdate},
    common::votation::{VotationStatus, VotationType},
    db::{
        alternative::{Alternative, NewAlternative},
        votation::{NewVotation, Votation, VotationSettings},
    },
    mongodb::Id,
};

use super::Engine;

/// Reject settings no count could be run with.
fn validate(settings: &VotationSettings) -> Result<()> {
    if settings.title.trim().is_empty() {
        return Err(Error::BadRequest("Votation title must not be empty".to_string()));
    }
    if settings.number_of_winners < 1 {
        return Err(Error::BadRequest(
            "A votation must have at least one winner".to_string(),
        ));
    }
    if settings.kind == VotationType::Qualified && settings.majority_threshold > 100 {
        return Err(Error::BadRequest(format!(
            "Majority threshold {}% is above 100%",
            settings.majority_threshold
        )));
    }
    Ok(())
}

/// Details and alternatives only change before a votation opens.
fn require_upcoming(votation: &Votation) -> Result<()> {
    if votation.status == VotationStatus::Upcoming {
        Ok(())
    } else {
        Err(Error::BadRequest(format!(
            "Votation {} is {:?} and can no longer be edited",
            votation.id, votation.status
        )))
    }
}

impl Engine {
    /// Create an upcoming votation with its initial alternatives.
    pub async fn create_votation(
        &self,
        meeting_id: Id,
        settings: VotationSettings,
        alternatives: Vec<String>,
    ) -> Result<Votation> {
        validate(&settings)?;
        self.meeting(meeting_id).await?;
        let votation = self
            .store
            .insert_votation(NewVotation::new(meeting_id, settings), alternatives)
            .await?;
        info!("Created votation {} in meeting {meeting_id}", votation.id);
        Ok(votation)
    }

    /// Create several votations in one meeting. Every spec is validated before any is
    /// created.
    pub async fn create_votations(
        &self,
        meeting_id: Id,
        specs: Vec<VotationSpec>,
    ) -> Result<Vec<Votation>> {
        for spec in &specs {
            validate(&spec.settings)?;
        }
        let mut votations = Vec::with_capacity(specs.len());
        for spec in specs {
            votations.push(
                self.create_votation(meeting_id, spec.settings, spec.alternatives)
                    .await?,
            );
        }
        Ok(votations)
    }

    /// Replace the settings of upcoming votations, renaming or adding alternatives.
    pub async fn update_votations(&self, updates: Vec<VotationUpdate>) -> Result<Vec<Votation>> {
        let mut updated = Vec::with_capacity(updates.len());
        for update in updates {
            validate(&update.settings)?;
            let id = Id::from(update.id);
            require_upcoming(&self.votation(id).await?)?;

            if !self.store.replace_settings(id, update.settings).await? {
                // Opened in the meantime.
                require_upcoming(&self.votation(id).await?)?;
            }
            for alternative in update.alternatives {
                self.upsert_alternative(id, alternative).await?;
            }
            updated.push(self.votation(id).await?);
        }
        Ok(updated)
    }

    /// Delete votations with their alternatives and ballots. Open votations must be
    /// closed first. Returns the IDs deleted.
    pub async fn delete_votations(&self, ids: Vec<Id>) -> Result<Vec<Id>> {
        let mut existing = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(votation) = self.store.votation(id).await? {
                if votation.status == VotationStatus::Open {
                    return Err(Error::BadRequest(format!(
                        "Votation {id} is open and cannot be deleted"
                    )));
                }
                existing.push(id);
            }
        }
        let deleted = self.store.delete_votations(&existing).await?;
        info!("Deleted {deleted} votation(s)");
        Ok(existing)
    }

    /// Votations of a meeting, ordered by index.
    pub async fn votations_by_meeting(&self, meeting_id: Id) -> Result<Vec<Votation>> {
        self.store.votations(meeting_id).await
    }

    /// Alternatives of a votation, in creation order.
    pub async fn alternatives_by_votation(&self, votation_id: Id) -> Result<Vec<Alternative>> {
        self.votation(votation_id).await?;
        self.store.alternatives(votation_id).await
    }

    pub async fn create_alternative(&self, votation_id: Id, text: String) -> Result<Alternative> {
        require_upcoming(&self.votation(votation_id).await?)?;
        self.store
            .insert_alternative(NewAlternative::new(votation_id, text))
            .await
    }

    /// Delete alternatives of upcoming votations. Returns the IDs deleted.
    pub async fn delete_alternatives(&self, ids: Vec<Id>) -> Result<Vec<Id>> {
        let mut existing = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(alternative) = self.store.alternative(id).await? {
                require_upcoming(&self.votation(alternative.votation_id).await?)?;
                existing.push(id);
            }
        }
        self.store.delete_alternatives(&existing).await?;
        Ok(existing)
    }

    async fn upsert_alternative(&self, votation_id: Id, spec: AlternativeSpec) -> Result<()> {
        match spec.id {
            Some(id) => {
                let id = Id::from(id);
                let alternative = self.alternative(id).await?;
                if alternative.votation_id != votation_id {
                    return Err(Error::not_found(format!(
                        "Alternative with ID '{id}' in votation '{votation_id}'"
                    )));
                }
                self.store.rename_alternative(id, spec.text).await?;
            }
            None => {
                self.store
                    .insert_alternative(NewAlternative::new(votation_id, spec.text))
                    .await?;
            }
        }
        Ok(())
    }
}
