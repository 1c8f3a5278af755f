//! Persistence behind the engine.
//!
//! Every method is one all-or-nothing commit. The invariants that must hold under
//! concurrent requests (one open votation per meeting, one ballot per participant)
//! are enforced here, at the storage layer, not by the engine's preliminary checks.

use std::collections::HashSet;

use crate::error::Result;
use crate::model::{
    common::{votation::VotationStatus, UserId},
    db::{
        alternative::{Alternative, NewAlternative},
        ballot::{BallotRecord, BallotSet, HasVoted},
        meeting::{Meeting, NewMeeting},
        participant::{Invite, Participant, User},
        votation::{NewVotation, Votation, VotationSettings},
    },
    mongodb::Id,
};

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Result of a conditional status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusChange {
    /// The votation was in the expected status and now has the new one.
    Changed(Votation),
    /// The votation was not in the expected status; nothing was written.
    Stale(VotationStatus),
    /// Opening would have made a second open votation in the meeting; nothing was written.
    MaxOneOpen,
}

/// Computes the winning alternatives of a votation from its frozen ballots.
pub type Counter =
    dyn Fn(&VotationSettings, &[Alternative], &BallotSet) -> HashSet<Id> + Send + Sync;

/// Result of recording a ballot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastOutcome {
    Recorded,
    /// A has-voted marker already existed for this participant.
    AlreadyVoted,
    /// The votation left the open status before the commit.
    NotOpen,
}

#[rocket::async_trait]
pub trait Store: Send + Sync {
    // Users and membership.

    /// Register a user if unseen, binding every pending invite for their email.
    /// Returns the number of invites bound.
    async fn register_user(&self, user: User) -> Result<u64>;
    async fn user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn users(&self, ids: &[UserId]) -> Result<Vec<User>>;
    async fn participant(&self, meeting_id: Id, user_id: &str) -> Result<Option<Participant>>;
    async fn participants(&self, meeting_id: Id) -> Result<Vec<Participant>>;
    async fn invites(&self, meeting_id: Id) -> Result<Vec<Invite>>;
    async fn count_voting_eligible(&self, meeting_id: Id) -> Result<u64>;
    async fn upsert_participant(&self, participant: Participant) -> Result<()>;
    async fn upsert_invite(&self, invite: Invite) -> Result<()>;
    /// Remove the given users and invited emails from a meeting.
    /// Returns the emails actually removed.
    async fn remove_members(
        &self,
        meeting_id: Id,
        users: &[User],
        invited_emails: &[String],
    ) -> Result<Vec<String>>;

    // Meetings.

    /// Insert a meeting together with its owner as a voting-eligible admin.
    async fn insert_meeting(&self, meeting: NewMeeting) -> Result<Meeting>;
    async fn meeting(&self, id: Id) -> Result<Option<Meeting>>;
    async fn replace_meeting(&self, meeting: &Meeting) -> Result<()>;
    /// Delete a meeting and everything in it. Returns false if it did not exist.
    async fn delete_meeting(&self, id: Id) -> Result<bool>;

    // Votations.

    /// Insert a votation and its initial alternatives.
    async fn insert_votation(
        &self,
        votation: NewVotation,
        alternatives: Vec<String>,
    ) -> Result<Votation>;
    async fn votation(&self, id: Id) -> Result<Option<Votation>>;
    /// Votations of a meeting, ordered by index.
    async fn votations(&self, meeting_id: Id) -> Result<Vec<Votation>>;
    /// Replace the settings of a votation that is still upcoming.
    /// Returns false if it is missing or no longer upcoming.
    async fn replace_settings(&self, id: Id, settings: VotationSettings) -> Result<bool>;
    /// Delete votations with their alternatives and ballots. Returns how many existed.
    async fn delete_votations(&self, ids: &[Id]) -> Result<u64>;
    /// Atomically move a votation from `from` to `to`.
    /// Moving to invalid clears every winner flag in the same commit.
    async fn change_status(&self, id: Id, from: VotationStatus, to: VotationStatus)
        -> Result<StatusChange>;
    /// Move an open votation to checking-result and store the winners `count` computes,
    /// in one commit.
    async fn close_for_counting(&self, id: Id, count: &Counter) -> Result<StatusChange>;
    /// Recompute and store the winners of a votation, provided it is still in
    /// checking-result. Returns `None` and writes nothing otherwise.
    async fn recount(&self, id: Id, count: &Counter) -> Result<Option<HashSet<Id>>>;

    // Alternatives.

    async fn insert_alternative(&self, alternative: NewAlternative) -> Result<Alternative>;
    async fn alternative(&self, id: Id) -> Result<Option<Alternative>>;
    /// Alternatives of a votation, in creation order.
    async fn alternatives(&self, votation_id: Id) -> Result<Vec<Alternative>>;
    async fn rename_alternative(&self, id: Id, text: String) -> Result<bool>;
    async fn delete_alternatives(&self, ids: &[Id]) -> Result<u64>;

    // Ballots.

    /// Record the has-voted marker and the anonymous ballot in one commit, provided the
    /// votation is still open and the participant has not voted.
    async fn record_ballot(&self, marker: HasVoted, ballot: BallotRecord) -> Result<CastOutcome>;
    async fn has_voted(&self, votation_id: Id, user_id: &str) -> Result<bool>;
    async fn count_has_voted(&self, votation_id: Id) -> Result<u64>;
    async fn ballots(&self, votation_id: Id) -> Result<BallotSet>;
}
