use std::collections::HashMap;

use crate::error::Result;
use crate::model::{
    api::meeting::{DeleteParticipantsResult, MeetingSpec, ParticipantOrInvite, ParticipantSpec},
    db::{
        meeting::{Meeting, MeetingUpdate},
        participant::{Invite, Participant},
    },
    mongodb::Id,
};

use super::Engine;

impl Engine {
    /// Create a meeting owned by the given user, who becomes its first admin.
    pub async fn create_meeting(&self, spec: MeetingSpec, owner_id: &str) -> Result<Meeting> {
        let meeting = self
            .store
            .insert_meeting(spec.into_meeting(owner_id.to_string()))
            .await?;
        info!("Created meeting {}", meeting.id);
        Ok(meeting)
    }

    pub async fn update_meeting(&self, id: Id, update: MeetingUpdate) -> Result<Meeting> {
        let mut meeting = self.meeting(id).await?;
        update.apply(&mut meeting);
        self.store.replace_meeting(&meeting).await?;
        Ok(meeting)
    }

    /// Delete a meeting with all of its votations, ballots, participants and invites.
    pub async fn delete_meeting(&self, id: Id) -> Result<Meeting> {
        let meeting = self.meeting(id).await?;
        self.store.delete_meeting(id).await?;
        info!("Deleted meeting {id}");
        Ok(meeting)
    }

    /// Every participant and pending invite of a meeting.
    pub async fn participants(&self, meeting_id: Id) -> Result<Vec<ParticipantOrInvite>> {
        let participants = self.store.participants(meeting_id).await?;
        let user_ids = participants
            .iter()
            .map(|p| p.user_id.clone())
            .collect::<Vec<_>>();
        let emails = self
            .store
            .users(&user_ids)
            .await?
            .into_iter()
            .map(|user| (user.id, user.email))
            .collect::<HashMap<_, _>>();

        let mut entries = participants
            .iter()
            .map(|p| {
                // Users who signed in without an email are shown by ID.
                let email = emails.get(&p.user_id).unwrap_or(&p.user_id).clone();
                ParticipantOrInvite::from_participant(p, email)
            })
            .collect::<Vec<_>>();
        entries.extend(
            self.store
                .invites(meeting_id)
                .await?
                .into_iter()
                .map(ParticipantOrInvite::from),
        );
        Ok(entries)
    }

    /// Add or update participants by email. Registered users become participants
    /// straight away; other emails get an invite. The owner's entry is never changed.
    pub async fn add_participants(
        &self,
        meeting_id: Id,
        specs: Vec<ParticipantSpec>,
    ) -> Result<Vec<ParticipantOrInvite>> {
        let meeting = self.meeting(meeting_id).await?;

        let mut entries = Vec::with_capacity(specs.len());
        for spec in specs {
            match self.store.user_by_email(&spec.email).await? {
                Some(user) if user.id == meeting.owner_id => {
                    debug!("Leaving the owner of meeting {meeting_id} unchanged");
                    if let Some(owner) = self.store.participant(meeting_id, &user.id).await? {
                        entries.push(ParticipantOrInvite::from_participant(&owner, user.email));
                    }
                }
                Some(user) => {
                    let participant = Participant {
                        meeting_id,
                        user_id: user.id,
                        role: spec.role,
                        is_voting_eligible: spec.is_voting_eligible,
                    };
                    entries.push(ParticipantOrInvite::from_participant(
                        &participant,
                        user.email,
                    ));
                    self.store.upsert_participant(participant).await?;
                }
                None => {
                    let invite = Invite {
                        meeting_id,
                        email: spec.email,
                        role: spec.role,
                        is_voting_eligible: spec.is_voting_eligible,
                    };
                    entries.push(invite.clone().into());
                    self.store.upsert_invite(invite).await?;
                }
            }
        }
        Ok(entries)
    }

    /// Remove participants and invites by email. If the owner is among them, nothing
    /// is removed.
    pub async fn delete_participants(
        &self,
        meeting_id: Id,
        emails: Vec<String>,
    ) -> Result<DeleteParticipantsResult> {
        let meeting = self.meeting(meeting_id).await?;

        let mut users = Vec::new();
        let mut invited = Vec::new();
        for email in emails {
            match self.store.user_by_email(&email).await? {
                Some(user) if user.id == meeting.owner_id => {
                    return Ok(DeleteParticipantsResult::owner_error());
                }
                Some(user) => users.push(user),
                None => invited.push(email),
            }
        }

        let emails = self
            .store
            .remove_members(meeting_id, &users, &invited)
            .await?;
        Ok(DeleteParticipantsResult::Deleted { emails })
    }
}
