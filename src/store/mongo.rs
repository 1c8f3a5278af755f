use std::collections::HashSet;
use std::future::Future;

use mongodb::{
    bson::doc,
    error::Result as DbResult,
    options::{FindOneAndUpdateOptions, FindOptions, ReplaceOptions, ReturnDocument, UpdateOptions},
    Client, ClientSession, Database, SessionCursor,
};
use rocket::futures::TryStreamExt;
use serde::de::DeserializeOwned;

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
    mongodb::{is_duplicate_key_error, is_transient_error, Coll, Id, MongoCollection},
};

use super::{CastOutcome, Counter, StatusChange, Store};

/// How many times a transaction is attempted before a write conflict is reported.
const MAX_TRANSACTION_ATTEMPTS: usize = 16;

/// A store backed by a MongoDB replica set. Multi-document commits use transactions,
/// and uniqueness invariants are backed by the indexes from
/// [`crate::model::mongodb::ensure_indexes_exist`].
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    pub fn new(client: Client, db: Database) -> Self {
        Self { client, db }
    }

    fn coll<T: MongoCollection>(&self) -> Coll<T> {
        Coll::from_db(&self.db)
    }

    async fn transaction(&self) -> DbResult<ClientSession> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;
        Ok(session)
    }

    /// Delete votations and everything hanging off them within the given transaction.
    async fn purge_votations(&self, ids: &[Id], session: &mut ClientSession) -> DbResult<u64> {
        let ids = ids.to_vec();
        let result = self
            .coll::<Votation>()
            .delete_many_with_session(doc! {"_id": {"$in": ids.clone()}}, None, session)
            .await?;

        let by_votation = doc! {"votation_id": {"$in": ids}};
        self.coll::<Alternative>()
            .delete_many_with_session(by_votation.clone(), None, session)
            .await?;
        self.coll::<HasVoted>()
            .delete_many_with_session(by_votation.clone(), None, session)
            .await?;
        self.coll::<Vote>()
            .delete_many_with_session(by_votation.clone(), None, session)
            .await?;
        self.coll::<StvVote>()
            .delete_many_with_session(by_votation, None, session)
            .await?;

        Ok(result.deleted_count)
    }

    /// Set the winner flags of a votation's alternatives within the given transaction.
    async fn mark_winners(
        &self,
        votation_id: Id,
        winners: &HashSet<Id>,
        session: &mut ClientSession,
    ) -> DbResult<()> {
        let winners = winners.iter().copied().collect::<Vec<_>>();
        self.coll::<Alternative>()
            .update_many_with_session(
                doc! {"votation_id": votation_id},
                doc! {"$set": {"is_winner": false}},
                None,
                session,
            )
            .await?;
        self.coll::<Alternative>()
            .update_many_with_session(
                doc! {"votation_id": votation_id, "_id": {"$in": winners}},
                doc! {"$set": {"is_winner": true}},
                None,
                session,
            )
            .await?;
        Ok(())
    }

    /// Read a votation's alternatives and ballots within the given transaction, count
    /// them and store the winners.
    async fn count(
        &self,
        votation: &Votation,
        count: &Counter,
        session: &mut ClientSession,
    ) -> DbResult<HashSet<Id>> {
        let by_votation = doc! {"votation_id": votation.id};
        let by_creation = FindOptions::builder().sort(doc! {"_id": 1}).build();
        let cursor = self
            .coll::<Alternative>()
            .find_with_session(by_votation.clone(), by_creation, session)
            .await?;
        let alternatives = collect(cursor, session).await?;
        let cursor = self
            .coll::<Vote>()
            .find_with_session(by_votation.clone(), None, session)
            .await?;
        let votes = collect(cursor, session).await?;
        let cursor = self
            .coll::<StvVote>()
            .find_with_session(by_votation, None, session)
            .await?;
        let stv_votes = collect(cursor, session).await?;

        let ballots = BallotSet {
            votes,
            stv_votes,
            blank_count: votation.blank_vote_count,
        };
        let winners = count(&votation.settings, &alternatives, &ballots);
        self.mark_winners(votation.id, &winners, session).await?;
        Ok(winners)
    }

    /// Move a votation out of `from` within the given transaction, bumping its count
    /// when `counting`. Returns the updated votation, or its current status if it was
    /// not in `from`.
    async fn advance(
        &self,
        id: Id,
        from: VotationStatus,
        to: VotationStatus,
        counting: bool,
        session: &mut ClientSession,
    ) -> DbResult<std::result::Result<Votation, Option<VotationStatus>>> {
        let filter = doc! {
            "_id": id,
            "status": from,
        };
        let mut update = doc! {"$set": {"status": to}};
        if counting {
            update.insert("$inc", doc! {"times_counted": 1_i64});
        }
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        let votations = self.coll::<Votation>();
        match votations
            .find_one_and_update_with_session(filter, update, options, session)
            .await?
        {
            Some(votation) => Ok(Ok(votation)),
            None => {
                let current = votations
                    .find_one_with_session(id.as_doc(), None, session)
                    .await?;
                Ok(Err(current.map(|votation| votation.status)))
            }
        }
    }

    /// One attempt at a status change.
    async fn try_change_status(
        &self,
        id: Id,
        from: VotationStatus,
        to: VotationStatus,
    ) -> DbResult<Option<StatusChange>> {
        let mut session = self.transaction().await?;
        let votation = match self.advance(id, from, to, false, &mut session).await {
            Ok(Ok(votation)) => votation,
            Ok(Err(current)) => return Ok(current.map(StatusChange::Stale)),
            // The partial unique index admits one open votation per meeting.
            Err(e) if is_duplicate_key_error(&e) => return Ok(Some(StatusChange::MaxOneOpen)),
            Err(e) => return Err(e),
        };
        if to == VotationStatus::Invalid {
            self.mark_winners(id, &HashSet::new(), &mut session).await?;
        }
        session.commit_transaction().await?;
        Ok(Some(StatusChange::Changed(votation)))
    }

    /// One attempt at closing and counting a votation.
    async fn try_close_for_counting(
        &self,
        id: Id,
        count: &Counter,
    ) -> DbResult<Option<StatusChange>> {
        let mut session = self.transaction().await?;
        let votation = match self
            .advance(
                id,
                VotationStatus::Open,
                VotationStatus::CheckingResult,
                true,
                &mut session,
            )
            .await?
        {
            Ok(votation) => votation,
            Err(current) => return Ok(current.map(StatusChange::Stale)),
        };
        self.count(&votation, count, &mut session).await?;
        session.commit_transaction().await?;
        Ok(Some(StatusChange::Changed(votation)))
    }

    /// One attempt at recounting a votation.
    async fn try_recount(
        &self,
        id: Id,
        count: &Counter,
    ) -> DbResult<std::result::Result<HashSet<Id>, Option<VotationStatus>>> {
        let mut session = self.transaction().await?;
        let status = VotationStatus::CheckingResult;
        let votation = match self.advance(id, status, status, true, &mut session).await? {
            Ok(votation) => votation,
            Err(current) => return Ok(Err(current)),
        };
        let winners = self.count(&votation, count, &mut session).await?;
        session.commit_transaction().await?;
        Ok(Ok(winners))
    }

    /// One attempt at recording a ballot. Dropping the session aborts the transaction.
    async fn try_record_ballot(
        &self,
        marker: &HasVoted,
        ballot: &BallotRecord,
    ) -> DbResult<CastOutcome> {
        let mut session = self.transaction().await?;

        match self
            .coll::<HasVoted>()
            .insert_one_with_session(marker, None, &mut session)
            .await
        {
            Err(e) if is_duplicate_key_error(&e) => return Ok(CastOutcome::AlreadyVoted),
            other => other?,
        };

        let blank = i64::from(*ballot == BallotRecord::Blank);
        let filter = doc! {
            "_id": marker.votation_id,
            "status": VotationStatus::Open,
        };
        let update = doc! {
            "$inc": {
                "ballot_count": 1_i64,
                "blank_vote_count": blank,
            }
        };
        let result = self
            .coll::<Votation>()
            .update_one_with_session(filter, update, None, &mut session)
            .await?;
        if result.matched_count == 0 {
            return Ok(CastOutcome::NotOpen);
        }

        match ballot {
            BallotRecord::Blank => {}
            BallotRecord::Single(vote) => {
                self.coll::<Vote>()
                    .insert_one_with_session(vote, None, &mut session)
                    .await?;
            }
            BallotRecord::Ranked(stv_vote) => {
                self.coll::<StvVote>()
                    .insert_one_with_session(stv_vote, None, &mut session)
                    .await?;
            }
        }

        session.commit_transaction().await?;
        Ok(CastOutcome::Recorded)
    }
}

/// Drain a session cursor into a vector.
async fn collect<T>(mut cursor: SessionCursor<T>, session: &mut ClientSession) -> DbResult<Vec<T>>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    let mut items = Vec::new();
    while let Some(item) = cursor.next(session).await {
        items.push(item?);
    }
    Ok(items)
}

/// Run a transaction until it commits or fails with an error that retrying cannot fix.
async fn retry_transient<T, F, Fut>(what: &str, mut attempt: F) -> DbResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DbResult<T>>,
{
    let mut attempts = 1;
    loop {
        match attempt().await {
            Err(e) if is_transient_error(&e) && attempts < MAX_TRANSACTION_ATTEMPTS => {
                debug!("Retrying {what} transaction after transient error: {e}");
                attempts += 1;
            }
            result => return result,
        }
    }
}

#[rocket::async_trait]
impl Store for MongoStore {
    async fn register_user(&self, user: User) -> Result<u64> {
        let users = self.coll::<User>();
        if users.find_one(doc! {"_id": user.id.as_str()}, None).await?.is_some() {
            return Ok(0);
        }

        let mut session = self.transaction().await?;
        match users.insert_one_with_session(&user, None, &mut session).await {
            // Registered concurrently by another request, or the email is taken.
            Err(e) if is_duplicate_key_error(&e) => {
                warn!("Not registering user {}: id or email {} is taken", user.id, user.email);
                return Ok(0);
            }
            other => other?,
        };

        let by_email = doc! {"email": user.email.as_str()};
        let cursor = self
            .coll::<Invite>()
            .find_with_session(by_email.clone(), None, &mut session)
            .await?;
        let invites = collect(cursor, &mut session).await?;
        let count = invites.len() as u64;

        let upsert = UpdateOptions::builder().upsert(true).build();
        for invite in invites {
            let participant = invite.bind(user.id.clone());
            let filter = doc! {
                "meeting_id": participant.meeting_id,
                "user_id": participant.user_id.as_str(),
            };
            let update = doc! {
                "$setOnInsert": {
                    "role": participant.role,
                    "is_voting_eligible": participant.is_voting_eligible,
                }
            };
            self.coll::<Participant>()
                .update_one_with_session(filter, update, upsert.clone(), &mut session)
                .await?;
        }
        self.coll::<Invite>()
            .delete_many_with_session(by_email, None, &mut session)
            .await?;

        session.commit_transaction().await?;
        Ok(count)
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .coll::<User>()
            .find_one(doc! {"email": email}, None)
            .await?)
    }

    async fn users(&self, ids: &[UserId]) -> Result<Vec<User>> {
        let filter = doc! {"_id": {"$in": ids.to_vec()}};
        Ok(self
            .coll::<User>()
            .find(filter, None)
            .await?
            .try_collect()
            .await?)
    }

    async fn participant(&self, meeting_id: Id, user_id: &str) -> Result<Option<Participant>> {
        let filter = doc! {
            "meeting_id": meeting_id,
            "user_id": user_id,
        };
        Ok(self.coll::<Participant>().find_one(filter, None).await?)
    }

    async fn participants(&self, meeting_id: Id) -> Result<Vec<Participant>> {
        Ok(self
            .coll::<Participant>()
            .find(doc! {"meeting_id": meeting_id}, None)
            .await?
            .try_collect()
            .await?)
    }

    async fn invites(&self, meeting_id: Id) -> Result<Vec<Invite>> {
        Ok(self
            .coll::<Invite>()
            .find(doc! {"meeting_id": meeting_id}, None)
            .await?
            .try_collect()
            .await?)
    }

    async fn count_voting_eligible(&self, meeting_id: Id) -> Result<u64> {
        let filter = doc! {
            "meeting_id": meeting_id,
            "is_voting_eligible": true,
        };
        Ok(self
            .coll::<Participant>()
            .count_documents(filter, None)
            .await?)
    }

    async fn upsert_participant(&self, participant: Participant) -> Result<()> {
        let filter = doc! {
            "meeting_id": participant.meeting_id,
            "user_id": participant.user_id.as_str(),
        };
        let upsert = ReplaceOptions::builder().upsert(true).build();
        self.coll::<Participant>()
            .replace_one(filter, &participant, upsert)
            .await?;
        Ok(())
    }

    async fn upsert_invite(&self, invite: Invite) -> Result<()> {
        let filter = doc! {
            "meeting_id": invite.meeting_id,
            "email": invite.email.as_str(),
        };
        let upsert = ReplaceOptions::builder().upsert(true).build();
        self.coll::<Invite>()
            .replace_one(filter, &invite, upsert)
            .await?;
        Ok(())
    }

    async fn remove_members(
        &self,
        meeting_id: Id,
        users: &[User],
        invited_emails: &[String],
    ) -> Result<Vec<String>> {
        let mut session = self.transaction().await?;
        let mut removed = Vec::new();

        for user in users {
            let filter = doc! {
                "meeting_id": meeting_id,
                "user_id": user.id.as_str(),
            };
            let result = self
                .coll::<Participant>()
                .delete_one_with_session(filter, None, &mut session)
                .await?;
            if result.deleted_count > 0 {
                removed.push(user.email.clone());
            }
        }
        for email in invited_emails {
            let filter = doc! {
                "meeting_id": meeting_id,
                "email": email.as_str(),
            };
            let result = self
                .coll::<Invite>()
                .delete_one_with_session(filter, None, &mut session)
                .await?;
            if result.deleted_count > 0 {
                removed.push(email.clone());
            }
        }

        session.commit_transaction().await?;
        Ok(removed)
    }

    async fn insert_meeting(&self, meeting: NewMeeting) -> Result<Meeting> {
        let meeting = Meeting {
            id: Id::new(),
            meeting,
        };
        let owner = Participant {
            meeting_id: meeting.id,
            user_id: meeting.owner_id.clone(),
            role: Role::Admin,
            is_voting_eligible: true,
        };

        let mut session = self.transaction().await?;
        self.coll::<Meeting>()
            .insert_one_with_session(&meeting, None, &mut session)
            .await?;
        self.coll::<Participant>()
            .insert_one_with_session(&owner, None, &mut session)
            .await?;
        session.commit_transaction().await?;

        Ok(meeting)
    }

    async fn meeting(&self, id: Id) -> Result<Option<Meeting>> {
        Ok(self.coll::<Meeting>().find_one(id.as_doc(), None).await?)
    }

    async fn replace_meeting(&self, meeting: &Meeting) -> Result<()> {
        self.coll::<Meeting>()
            .replace_one(meeting.id.as_doc(), meeting, None)
            .await?;
        Ok(())
    }

    async fn delete_meeting(&self, id: Id) -> Result<bool> {
        let mut session = self.transaction().await?;

        let result = self
            .coll::<Meeting>()
            .delete_one_with_session(id.as_doc(), None, &mut session)
            .await?;
        if result.deleted_count == 0 {
            return Ok(false);
        }

        let by_meeting = doc! {"meeting_id": id};
        self.coll::<Participant>()
            .delete_many_with_session(by_meeting.clone(), None, &mut session)
            .await?;
        self.coll::<Invite>()
            .delete_many_with_session(by_meeting.clone(), None, &mut session)
            .await?;

        let cursor = self
            .coll::<Votation>()
            .find_with_session(by_meeting, None, &mut session)
            .await?;
        let votation_ids = collect(cursor, &mut session)
            .await?
            .into_iter()
            .map(|votation| votation.id)
            .collect::<Vec<_>>();
        self.purge_votations(&votation_ids, &mut session).await?;

        session.commit_transaction().await?;
        Ok(true)
    }

    async fn insert_votation(
        &self,
        votation: NewVotation,
        alternatives: Vec<String>,
    ) -> Result<Votation> {
        let votation = Votation {
            id: Id::new(),
            votation,
        };
        let alternatives = alternatives
            .into_iter()
            .map(|text| Alternative {
                id: Id::new(),
                alternative: NewAlternative::new(votation.id, text),
            })
            .collect::<Vec<_>>();

        let mut session = self.transaction().await?;
        self.coll::<Votation>()
            .insert_one_with_session(&votation, None, &mut session)
            .await?;
        if !alternatives.is_empty() {
            self.coll::<Alternative>()
                .insert_many_with_session(&alternatives, None, &mut session)
                .await?;
        }
        session.commit_transaction().await?;

        Ok(votation)
    }

    async fn votation(&self, id: Id) -> Result<Option<Votation>> {
        Ok(self.coll::<Votation>().find_one(id.as_doc(), None).await?)
    }

    async fn votations(&self, meeting_id: Id) -> Result<Vec<Votation>> {
        let by_index = FindOptions::builder().sort(doc! {"index": 1}).build();
        Ok(self
            .coll::<Votation>()
            .find(doc! {"meeting_id": meeting_id}, by_index)
            .await?
            .try_collect()
            .await?)
    }

    async fn replace_settings(&self, id: Id, settings: VotationSettings) -> Result<bool> {
        let filter = doc! {
            "_id": id,
            "status": VotationStatus::Upcoming,
        };
        let update = doc! {
            "$set": {
                "title": settings.title,
                "description": settings.description,
                "index": i64::from(settings.index),
                "type": settings.kind,
                "majority_threshold": i64::from(settings.majority_threshold),
                "number_of_winners": i64::from(settings.number_of_winners),
                "blank_votes": settings.blank_votes,
                "hidden_votes": settings.hidden_votes,
            }
        };
        let result = self
            .coll::<Votation>()
            .update_one(filter, update, None)
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn delete_votations(&self, ids: &[Id]) -> Result<u64> {
        let mut session = self.transaction().await?;
        let deleted = self.purge_votations(ids, &mut session).await?;
        session.commit_transaction().await?;
        Ok(deleted)
    }

    async fn change_status(
        &self,
        id: Id,
        from: VotationStatus,
        to: VotationStatus,
    ) -> Result<StatusChange> {
        retry_transient("status", move || self.try_change_status(id, from, to))
            .await?
            .ok_or_else(|| Error::not_found(format!("Votation {id}")))
    }

    async fn close_for_counting(&self, id: Id, count: &Counter) -> Result<StatusChange> {
        retry_transient("counting", move || self.try_close_for_counting(id, count))
            .await?
            .ok_or_else(|| Error::not_found(format!("Votation {id}")))
    }

    async fn recount(&self, id: Id, count: &Counter) -> Result<Option<HashSet<Id>>> {
        match retry_transient("recount", move || self.try_recount(id, count)).await? {
            Ok(winners) => Ok(Some(winners)),
            Err(Some(_)) => Ok(None),
            Err(None) => Err(Error::not_found(format!("Votation {id}"))),
        }
    }

    async fn insert_alternative(&self, alternative: NewAlternative) -> Result<Alternative> {
        let alternative = Alternative {
            id: Id::new(),
            alternative,
        };
        self.coll::<Alternative>()
            .insert_one(&alternative, None)
            .await?;
        Ok(alternative)
    }

    async fn alternative(&self, id: Id) -> Result<Option<Alternative>> {
        Ok(self
            .coll::<Alternative>()
            .find_one(id.as_doc(), None)
            .await?)
    }

    async fn alternatives(&self, votation_id: Id) -> Result<Vec<Alternative>> {
        // IDs are generated in creation order.
        let by_creation = FindOptions::builder().sort(doc! {"_id": 1}).build();
        Ok(self
            .coll::<Alternative>()
            .find(doc! {"votation_id": votation_id}, by_creation)
            .await?
            .try_collect()
            .await?)
    }

    async fn rename_alternative(&self, id: Id, text: String) -> Result<bool> {
        let result = self
            .coll::<Alternative>()
            .update_one(id.as_doc(), doc! {"$set": {"text": text}}, None)
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn delete_alternatives(&self, ids: &[Id]) -> Result<u64> {
        let result = self
            .coll::<Alternative>()
            .delete_many(doc! {"_id": {"$in": ids.to_vec()}}, None)
            .await?;
        Ok(result.deleted_count)
    }

    async fn record_ballot(&self, marker: HasVoted, ballot: BallotRecord) -> Result<CastOutcome> {
        let (marker, ballot) = (&marker, &ballot);
        Ok(retry_transient("ballot", move || self.try_record_ballot(marker, ballot)).await?)
    }

    async fn has_voted(&self, votation_id: Id, user_id: &str) -> Result<bool> {
        let filter = doc! {
            "votation_id": votation_id,
            "user_id": user_id,
        };
        Ok(self
            .coll::<HasVoted>()
            .find_one(filter, None)
            .await?
            .is_some())
    }

    async fn count_has_voted(&self, votation_id: Id) -> Result<u64> {
        Ok(self
            .coll::<HasVoted>()
            .count_documents(doc! {"votation_id": votation_id}, None)
            .await?)
    }

    async fn ballots(&self, votation_id: Id) -> Result<BallotSet> {
        let blank_count = self
            .votation(votation_id)
            .await?
            .map(|votation| votation.blank_vote_count)
            .unwrap_or_default();
        let by_votation = doc! {"votation_id": votation_id};
        let votes = self
            .coll::<Vote>()
            .find(by_votation.clone(), None)
            .await?
            .try_collect()
            .await?;
        let stv_votes = self
            .coll::<StvVote>()
            .find(by_votation, None)
            .await?
            .try_collect()
            .await?;

        Ok(BallotSet {
            votes,
            stv_votes,
            blank_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use mongodb::{bson::Document, Database};

    use super::*;

    use crate::engine::Engine;
    use crate::model::{
        api::votation::UpdateVotationStatusResult,
        db::{meeting::MeetingCore, votation::VotationCore},
    };

    fn first_alternative(
        _: &VotationSettings,
        alternatives: &[Alternative],
        _: &BallotSet,
    ) -> HashSet<Id> {
        alternatives.iter().take(1).map(|a| a.id).collect()
    }

    async fn upcoming_votation(store: &MongoStore, meeting_id: Id) -> Votation {
        store
            .insert_votation(
                VotationCore::new(meeting_id, VotationSettings::simple_example()),
                vec!["A".to_string(), "B".to_string()],
            )
            .await
            .unwrap()
    }

    async fn open_votation(store: &MongoStore) -> Votation {
        let meeting = store
            .insert_meeting(MeetingCore::example("owner"))
            .await
            .unwrap();
        let votation = upcoming_votation(store, meeting.id).await;
        match store
            .change_status(votation.id, VotationStatus::Upcoming, VotationStatus::Open)
            .await
            .unwrap()
        {
            StatusChange::Changed(votation) => votation,
            other => panic!("Unexpected {other:?}"),
        }
    }

    fn marker(votation: &Votation, user_id: &str) -> HasVoted {
        HasVoted {
            votation_id: votation.id,
            user_id: user_id.to_string(),
        }
    }

    async fn winners(store: &MongoStore, votation_id: Id) -> usize {
        let alternatives = store.alternatives(votation_id).await.unwrap();
        alternatives.iter().filter(|a| a.is_winner).count()
    }

    #[backend_test(mongodb)]
    async fn concurrent_opens_leave_one_open(store: MongoStore, engine: Engine) {
        let meeting = store
            .insert_meeting(MeetingCore::example("owner"))
            .await
            .unwrap();
        let first = upcoming_votation(&store, meeting.id).await;
        let second = upcoming_votation(&store, meeting.id).await;

        let (a, b) = rocket::tokio::join!(
            engine.open_votation(first.id),
            engine.open_votation(second.id)
        );
        let opened = [a.unwrap(), b.unwrap()]
            .into_iter()
            .filter(|result| matches!(result, UpdateVotationStatusResult::Votation(_)))
            .count();
        assert_eq!(opened, 1);

        let open = store
            .votations(meeting.id)
            .await
            .unwrap()
            .into_iter()
            .filter(|v| v.status == VotationStatus::Open)
            .count();
        assert_eq!(open, 1);
    }

    #[backend_test(mongodb)]
    async fn second_cast_is_refused(store: MongoStore) {
        let votation = open_votation(&store).await;

        let first = store
            .record_ballot(marker(&votation, "owner"), BallotRecord::Blank)
            .await
            .unwrap();
        let vote = Vote {
            id: Id::new(),
            votation_id: votation.id,
            alternative_id: store.alternatives(votation.id).await.unwrap()[0].id,
        };
        let second = store
            .record_ballot(marker(&votation, "owner"), BallotRecord::Single(vote))
            .await
            .unwrap();
        assert_eq!(first, CastOutcome::Recorded);
        assert_eq!(second, CastOutcome::AlreadyVoted);

        let stored = store.votation(votation.id).await.unwrap().unwrap();
        assert_eq!(stored.ballot_count, 1);
        assert_eq!(stored.blank_vote_count, 1);
        assert!(store.ballots(votation.id).await.unwrap().votes.is_empty());
    }

    #[backend_test(mongodb)]
    async fn concurrent_casts_leave_one_marker(store: MongoStore) {
        let votation = open_votation(&store).await;

        let (a, b) = rocket::tokio::join!(
            store.record_ballot(marker(&votation, "owner"), BallotRecord::Blank),
            store.record_ballot(marker(&votation, "owner"), BallotRecord::Blank)
        );
        let recorded = [a.unwrap(), b.unwrap()]
            .into_iter()
            .filter(|outcome| *outcome == CastOutcome::Recorded)
            .count();
        assert_eq!(recorded, 1);
        assert_eq!(store.count_has_voted(votation.id).await.unwrap(), 1);
        let stored = store.votation(votation.id).await.unwrap().unwrap();
        assert_eq!(stored.ballot_count, 1);
    }

    #[backend_test(mongodb)]
    async fn closed_votation_takes_no_ballots(store: MongoStore) {
        let votation = open_votation(&store).await;
        store
            .close_for_counting(votation.id, &first_alternative)
            .await
            .unwrap();

        let outcome = store
            .record_ballot(marker(&votation, "owner"), BallotRecord::Blank)
            .await
            .unwrap();
        assert_eq!(outcome, CastOutcome::NotOpen);
        assert!(!store.has_voted(votation.id, "owner").await.unwrap());
        assert_eq!(store.count_has_voted(votation.id).await.unwrap(), 0);
        let stored = store.votation(votation.id).await.unwrap().unwrap();
        assert_eq!(stored.ballot_count, 0);
    }

    #[backend_test(mongodb)]
    async fn invalid_votations_are_never_counted(store: MongoStore) {
        let votation = open_votation(&store).await;
        let change = store
            .close_for_counting(votation.id, &first_alternative)
            .await
            .unwrap();
        assert!(matches!(
            change,
            StatusChange::Changed(closed) if closed.times_counted == 1
        ));
        assert_eq!(winners(&store, votation.id).await, 1);

        store
            .change_status(
                votation.id,
                VotationStatus::CheckingResult,
                VotationStatus::Invalid,
            )
            .await
            .unwrap();
        assert_eq!(winners(&store, votation.id).await, 0);

        let recount = store.recount(votation.id, &first_alternative).await.unwrap();
        assert_eq!(recount, None);
        assert_eq!(winners(&store, votation.id).await, 0);
        let stored = store.votation(votation.id).await.unwrap().unwrap();
        assert_eq!(stored.times_counted, 1);
    }

    #[backend_test(mongodb)]
    async fn closing_races_with_invalidation(store: MongoStore, engine: Engine) {
        let votation = open_votation(&store).await;
        store
            .record_ballot(marker(&votation, "owner"), BallotRecord::Blank)
            .await
            .unwrap();

        let (closed, invalidated) = rocket::tokio::join!(
            store.close_for_counting(votation.id, &first_alternative),
            engine.invalidate_votation(votation.id)
        );
        let closed = matches!(closed.unwrap(), StatusChange::Changed(_));
        assert!(closed || invalidated.is_ok());

        let stored = store.votation(votation.id).await.unwrap().unwrap();
        match stored.status {
            VotationStatus::Invalid => assert_eq!(winners(&store, votation.id).await, 0),
            VotationStatus::CheckingResult => assert_eq!(winners(&store, votation.id).await, 1),
            status => panic!("Unexpected status {status:?}"),
        }
    }

    #[backend_test(mongodb)]
    async fn meeting_deletion_leaves_no_orphans(store: MongoStore, db: Database) {
        let votation = open_votation(&store).await;
        let alternatives = store.alternatives(votation.id).await.unwrap();
        store
            .upsert_invite(Invite {
                meeting_id: votation.meeting_id,
                email: "bob@example.com".to_string(),
                role: Role::Participant,
                is_voting_eligible: true,
            })
            .await
            .unwrap();
        let vote = Vote {
            id: Id::new(),
            votation_id: votation.id,
            alternative_id: alternatives[0].id,
        };
        store
            .record_ballot(marker(&votation, "owner"), BallotRecord::Single(vote))
            .await
            .unwrap();

        assert!(store.delete_meeting(votation.meeting_id).await.unwrap());
        assert!(!store.delete_meeting(votation.meeting_id).await.unwrap());

        for name in db.list_collection_names(None).await.unwrap() {
            if name == User::NAME {
                continue;
            }
            let left = db
                .collection::<Document>(&name)
                .count_documents(None, None)
                .await
                .unwrap();
            assert_eq!(left, 0, "{name} kept {left} document(s)");
        }
    }

    #[backend_test(mongodb)]
    async fn taken_email_is_not_registered(store: MongoStore) {
        let alice = User {
            id: "alice".to_string(),
            email: "shared@example.com".to_string(),
        };
        let impostor = User {
            id: "impostor".to_string(),
            email: "shared@example.com".to_string(),
        };
        store.register_user(alice).await.unwrap();

        assert_eq!(store.register_user(impostor).await.unwrap(), 0);
        let users = store
            .users(&["alice".to_string(), "impostor".to_string()])
            .await
            .unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, "alice");
    }
}
