use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rocket::tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::model::{
    common::{meeting::Role, votation::VotationStatus, UserId},
    db::{
        alternative::{Alternative, NewAlternative},
        ballot::{BallotRecord, BallotSet, HasVoted, StvVote, Vote},
        meeting::{Meeting, NewMeeting},
        participant::{Invite, Participant, User},
        votation::{NewVotation, Votation, VotationSettings},
    },
    mongodb::Id,
};

use super::{CastOutcome, Counter, StatusChange, Store};

/// A store held entirely in process memory, used when no database is configured
/// and by tests.
///
/// Every operation takes one lock over all tables, so each is trivially atomic.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, User>,
    meetings: Vec<Meeting>,
    participants: Vec<Participant>,
    invites: Vec<Invite>,
    votations: Vec<Votation>,
    alternatives: Vec<Alternative>,
    has_voted: HashSet<(Id, UserId)>,
    votes: Vec<Vote>,
    stv_votes: Vec<StvVote>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tables {
    fn votation_mut(&mut self, id: Id) -> Option<&mut Votation> {
        self.votations.iter_mut().find(|v| v.id == id)
    }

    fn ballot_set(&self, votation_id: Id) -> BallotSet {
        let blank_count = self
            .votations
            .iter()
            .find(|v| v.id == votation_id)
            .map(|v| v.blank_vote_count)
            .unwrap_or_default();
        BallotSet {
            votes: self
                .votes
                .iter()
                .filter(|v| v.votation_id == votation_id)
                .cloned()
                .collect(),
            stv_votes: self
                .stv_votes
                .iter()
                .filter(|v| v.votation_id == votation_id)
                .cloned()
                .collect(),
            blank_count,
        }
    }

    fn mark_winners(&mut self, votation_id: Id, winners: &HashSet<Id>) {
        for alternative in self
            .alternatives
            .iter_mut()
            .filter(|a| a.votation_id == votation_id)
        {
            alternative.is_winner = winners.contains(&alternative.id);
        }
    }

    /// Count the ballots of a votation and store the winners.
    fn count(&mut self, id: Id, count: &Counter) -> Option<(Votation, HashSet<Id>)> {
        let alternatives = self
            .alternatives
            .iter()
            .filter(|a| a.votation_id == id)
            .cloned()
            .collect::<Vec<_>>();
        let ballots = self.ballot_set(id);
        let votation = self.votation_mut(id)?;
        votation.times_counted += 1;
        let votation = votation.clone();

        let winners = count(&votation.settings, &alternatives, &ballots);
        self.mark_winners(id, &winners);
        Some((votation, winners))
    }

    /// Remove votations and everything hanging off them.
    fn purge_votations(&mut self, ids: &HashSet<Id>) -> u64 {
        let before = self.votations.len();
        self.votations.retain(|v| !ids.contains(&v.id));
        self.alternatives.retain(|a| !ids.contains(&a.votation_id));
        self.has_voted.retain(|(votation_id, _)| !ids.contains(votation_id));
        self.votes.retain(|v| !ids.contains(&v.votation_id));
        self.stv_votes.retain(|v| !ids.contains(&v.votation_id));
        (before - self.votations.len()) as u64
    }
}

#[rocket::async_trait]
impl Store for MemoryStore {
    async fn register_user(&self, user: User) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        if tables.users.contains_key(&user.id) {
            return Ok(0);
        }
        if tables.users.values().any(|u| u.email == user.email) {
            warn!("Not registering user {}: email {} is taken", user.id, user.email);
            return Ok(0);
        }

        let (bound, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut tables.invites)
            .into_iter()
            .partition(|invite| invite.email == user.email);
        tables.invites = pending;
        let count = bound.len() as u64;
        for invite in bound {
            let participant = invite.bind(user.id.clone());
            let exists = tables.participants.iter().any(|p| {
                p.meeting_id == participant.meeting_id && p.user_id == participant.user_id
            });
            if !exists {
                tables.participants.push(participant);
            }
        }
        tables.users.insert(user.id.clone(), user);
        Ok(count)
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn users(&self, ids: &[UserId]) -> Result<Vec<User>> {
        let tables = self.tables.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.users.get(id).cloned())
            .collect())
    }

    async fn participant(&self, meeting_id: Id, user_id: &str) -> Result<Option<Participant>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .participants
            .iter()
            .find(|p| p.meeting_id == meeting_id && p.user_id == user_id)
            .cloned())
    }

    async fn participants(&self, meeting_id: Id) -> Result<Vec<Participant>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .participants
            .iter()
            .filter(|p| p.meeting_id == meeting_id)
            .cloned()
            .collect())
    }

    async fn invites(&self, meeting_id: Id) -> Result<Vec<Invite>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .invites
            .iter()
            .filter(|i| i.meeting_id == meeting_id)
            .cloned()
            .collect())
    }

    async fn count_voting_eligible(&self, meeting_id: Id) -> Result<u64> {
        let tables = self.tables.lock().await;
        Ok(tables
            .participants
            .iter()
            .filter(|p| p.meeting_id == meeting_id && p.is_voting_eligible)
            .count() as u64)
    }

    async fn upsert_participant(&self, participant: Participant) -> Result<()> {
        let mut tables = self.tables.lock().await;
        match tables.participants.iter().position(|p| {
            p.meeting_id == participant.meeting_id && p.user_id == participant.user_id
        }) {
            Some(i) => tables.participants[i] = participant,
            None => tables.participants.push(participant),
        }
        Ok(())
    }

    async fn upsert_invite(&self, invite: Invite) -> Result<()> {
        let mut tables = self.tables.lock().await;
        match tables
            .invites
            .iter()
            .position(|i| i.meeting_id == invite.meeting_id && i.email == invite.email)
        {
            Some(i) => tables.invites[i] = invite,
            None => tables.invites.push(invite),
        }
        Ok(())
    }

    async fn remove_members(
        &self,
        meeting_id: Id,
        users: &[User],
        invited_emails: &[String],
    ) -> Result<Vec<String>> {
        let mut tables = self.tables.lock().await;
        let mut removed = Vec::new();
        for user in users {
            let before = tables.participants.len();
            tables
                .participants
                .retain(|p| !(p.meeting_id == meeting_id && p.user_id == user.id));
            if tables.participants.len() < before {
                removed.push(user.email.clone());
            }
        }
        for email in invited_emails {
            let before = tables.invites.len();
            tables
                .invites
                .retain(|i| !(i.meeting_id == meeting_id && &i.email == email));
            if tables.invites.len() < before {
                removed.push(email.clone());
            }
        }
        Ok(removed)
    }

    async fn insert_meeting(&self, meeting: NewMeeting) -> Result<Meeting> {
        let mut tables = self.tables.lock().await;
        let meeting = Meeting {
            id: Id::new(),
            meeting,
        };
        tables.participants.push(Participant {
            meeting_id: meeting.id,
            user_id: meeting.owner_id.clone(),
            role: Role::Admin,
            is_voting_eligible: true,
        });
        tables.meetings.push(meeting.clone());
        Ok(meeting)
    }

    async fn meeting(&self, id: Id) -> Result<Option<Meeting>> {
        let tables = self.tables.lock().await;
        Ok(tables.meetings.iter().find(|m| m.id == id).cloned())
    }

    async fn replace_meeting(&self, meeting: &Meeting) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if let Some(existing) = tables.meetings.iter_mut().find(|m| m.id == meeting.id) {
            *existing = meeting.clone();
        }
        Ok(())
    }

    async fn delete_meeting(&self, id: Id) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        let before = tables.meetings.len();
        tables.meetings.retain(|m| m.id != id);
        if tables.meetings.len() == before {
            return Ok(false);
        }
        tables.participants.retain(|p| p.meeting_id != id);
        tables.invites.retain(|i| i.meeting_id != id);
        let votations = tables
            .votations
            .iter()
            .filter(|v| v.meeting_id == id)
            .map(|v| v.id)
            .collect::<HashSet<_>>();
        tables.purge_votations(&votations);
        Ok(true)
    }

    async fn insert_votation(
        &self,
        votation: NewVotation,
        alternatives: Vec<String>,
    ) -> Result<Votation> {
        let mut tables = self.tables.lock().await;
        let votation = Votation {
            id: Id::new(),
            votation,
        };
        for text in alternatives {
            tables.alternatives.push(Alternative {
                id: Id::new(),
                alternative: NewAlternative::new(votation.id, text),
            });
        }
        tables.votations.push(votation.clone());
        Ok(votation)
    }

    async fn votation(&self, id: Id) -> Result<Option<Votation>> {
        let tables = self.tables.lock().await;
        Ok(tables.votations.iter().find(|v| v.id == id).cloned())
    }

    async fn votations(&self, meeting_id: Id) -> Result<Vec<Votation>> {
        let tables = self.tables.lock().await;
        let mut votations = tables
            .votations
            .iter()
            .filter(|v| v.meeting_id == meeting_id)
            .cloned()
            .collect::<Vec<_>>();
        votations.sort_by_key(|v| v.settings.index);
        Ok(votations)
    }

    async fn replace_settings(&self, id: Id, settings: VotationSettings) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        match tables.votation_mut(id) {
            Some(votation) if votation.status == VotationStatus::Upcoming => {
                votation.settings = settings;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_votations(&self, ids: &[Id]) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        let ids = ids.iter().copied().collect::<HashSet<_>>();
        Ok(tables.purge_votations(&ids))
    }

    async fn change_status(
        &self,
        id: Id,
        from: VotationStatus,
        to: VotationStatus,
    ) -> Result<StatusChange> {
        let mut tables = self.tables.lock().await;
        let (meeting_id, current) = match tables.votations.iter().find(|v| v.id == id) {
            Some(votation) => (votation.meeting_id, votation.status),
            None => return Err(Error::not_found(format!("Votation {id}"))),
        };
        if current != from {
            return Ok(StatusChange::Stale(current));
        }
        if to == VotationStatus::Open {
            let other_open = tables.votations.iter().any(|v| {
                v.meeting_id == meeting_id && v.id != id && v.status == VotationStatus::Open
            });
            if other_open {
                return Ok(StatusChange::MaxOneOpen);
            }
        }
        let votation = tables
            .votation_mut(id)
            .ok_or_else(|| Error::not_found(format!("Votation {id}")))?;
        votation.status = to;
        let votation = votation.clone();
        if to == VotationStatus::Invalid {
            tables.mark_winners(id, &HashSet::new());
        }
        Ok(StatusChange::Changed(votation))
    }

    async fn close_for_counting(&self, id: Id, count: &Counter) -> Result<StatusChange> {
        let mut tables = self.tables.lock().await;
        let votation = tables
            .votation_mut(id)
            .ok_or_else(|| Error::not_found(format!("Votation {id}")))?;
        if votation.status != VotationStatus::Open {
            return Ok(StatusChange::Stale(votation.status));
        }
        votation.status = VotationStatus::CheckingResult;

        match tables.count(id, count) {
            Some((votation, _)) => Ok(StatusChange::Changed(votation)),
            None => Err(Error::not_found(format!("Votation {id}"))),
        }
    }

    async fn recount(&self, id: Id, count: &Counter) -> Result<Option<HashSet<Id>>> {
        let mut tables = self.tables.lock().await;
        match tables.votations.iter().find(|v| v.id == id) {
            Some(votation) if votation.status == VotationStatus::CheckingResult => {}
            Some(_) => return Ok(None),
            None => return Err(Error::not_found(format!("Votation {id}"))),
        }
        Ok(tables.count(id, count).map(|(_, winners)| winners))
    }

    async fn insert_alternative(&self, alternative: NewAlternative) -> Result<Alternative> {
        let mut tables = self.tables.lock().await;
        let alternative = Alternative {
            id: Id::new(),
            alternative,
        };
        tables.alternatives.push(alternative.clone());
        Ok(alternative)
    }

    async fn alternative(&self, id: Id) -> Result<Option<Alternative>> {
        let tables = self.tables.lock().await;
        Ok(tables.alternatives.iter().find(|a| a.id == id).cloned())
    }

    async fn alternatives(&self, votation_id: Id) -> Result<Vec<Alternative>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .alternatives
            .iter()
            .filter(|a| a.votation_id == votation_id)
            .cloned()
            .collect())
    }

    async fn rename_alternative(&self, id: Id, text: String) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        match tables.alternatives.iter_mut().find(|a| a.id == id) {
            Some(alternative) => {
                alternative.text = text;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_alternatives(&self, ids: &[Id]) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        let before = tables.alternatives.len();
        tables.alternatives.retain(|a| !ids.contains(&a.id));
        Ok((before - tables.alternatives.len()) as u64)
    }

    async fn record_ballot(&self, marker: HasVoted, ballot: BallotRecord) -> Result<CastOutcome> {
        let mut tables = self.tables.lock().await;
        let key = (marker.votation_id, marker.user_id);
        if tables.has_voted.contains(&key) {
            return Ok(CastOutcome::AlreadyVoted);
        }
        match tables.votation_mut(key.0) {
            Some(votation) if votation.status == VotationStatus::Open => {
                votation.ballot_count += 1;
                if ballot == BallotRecord::Blank {
                    votation.blank_vote_count += 1;
                }
            }
            _ => return Ok(CastOutcome::NotOpen),
        }

        match ballot {
            BallotRecord::Blank => {}
            BallotRecord::Single(vote) => tables.votes.push(vote),
            BallotRecord::Ranked(stv_vote) => tables.stv_votes.push(stv_vote),
        }
        tables.has_voted.insert(key);
        Ok(CastOutcome::Recorded)
    }

    async fn has_voted(&self, votation_id: Id, user_id: &str) -> Result<bool> {
        let tables = self.tables.lock().await;
        Ok(tables
            .has_voted
            .iter()
            .any(|(v, u)| *v == votation_id && u == user_id))
    }

    async fn count_has_voted(&self, votation_id: Id) -> Result<u64> {
        let tables = self.tables.lock().await;
        Ok(tables
            .has_voted
            .iter()
            .filter(|(v, _)| *v == votation_id)
            .count() as u64)
    }

    async fn ballots(&self, votation_id: Id) -> Result<BallotSet> {
        let tables = self.tables.lock().await;
        Ok(tables.ballot_set(votation_id))
    }
}
