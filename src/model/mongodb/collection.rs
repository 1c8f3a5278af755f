use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};

use crate::model::db::{
    alternative::{Alternative, NewAlternative},
    ballot::{HasVoted, StvVote, Vote},
    meeting::{Meeting, NewMeeting},
    participant::{Invite, Participant, User},
    votation::{NewVotation, Votation},
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// Meeting collections
const MEETINGS: &str = "meetings";
impl MongoCollection for Meeting {
    const NAME: &'static str = MEETINGS;
}
impl MongoCollection for NewMeeting {
    const NAME: &'static str = MEETINGS;
}

// Membership collections
const USERS: &str = "users";
impl MongoCollection for User {
    const NAME: &'static str = USERS;
}

const PARTICIPANTS: &str = "participants";
impl MongoCollection for Participant {
    const NAME: &'static str = PARTICIPANTS;
}

const INVITES: &str = "invites";
impl MongoCollection for Invite {
    const NAME: &'static str = INVITES;
}

// Votation collections
const VOTATIONS: &str = "votations";
impl MongoCollection for Votation {
    const NAME: &'static str = VOTATIONS;
}
impl MongoCollection for NewVotation {
    const NAME: &'static str = VOTATIONS;
}

const ALTERNATIVES: &str = "alternatives";
impl MongoCollection for Alternative {
    const NAME: &'static str = ALTERNATIVES;
}
impl MongoCollection for NewAlternative {
    const NAME: &'static str = ALTERNATIVES;
}

// Ballot collections. `has_voted` and the vote collections share no key,
// so who voted cannot be joined against what was voted.
const HAS_VOTED: &str = "has_voted";
impl MongoCollection for HasVoted {
    const NAME: &'static str = HAS_VOTED;
}

const VOTES: &str = "votes";
impl MongoCollection for Vote {
    const NAME: &'static str = VOTES;
}

const STV_VOTES: &str = "stv_votes";
impl MongoCollection for StvVote {
    const NAME: &'static str = STV_VOTES;
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // Participant collection.
    let participant_index = IndexModel::builder()
        .keys(doc! {"user_id": 1, "meeting_id": 1})
        .options(unique.clone())
        .build();
    Coll::<Participant>::from_db(db)
        .create_index(participant_index, None)
        .await?;

    // Invite collection.
    let invite_index = IndexModel::builder()
        .keys(doc! {"email": 1, "meeting_id": 1})
        .options(unique.clone())
        .build();
    Coll::<Invite>::from_db(db)
        .create_index(invite_index, None)
        .await?;

    // User collection.
    let user_index = IndexModel::builder()
        .keys(doc! {"email": 1})
        .options(unique.clone())
        .build();
    Coll::<User>::from_db(db)
        .create_index(user_index, None)
        .await?;

    // Votation collection: at most one open votation per meeting.
    let one_open = IndexOptions::builder()
        .unique(true)
        .partial_filter_expression(doc! {"status": "OPEN"})
        .name("one_open_votation_per_meeting".to_string())
        .build();
    let open_index = IndexModel::builder()
        .keys(doc! {"meeting_id": 1})
        .options(one_open)
        .build();
    Coll::<Votation>::from_db(db)
        .create_index(open_index, None)
        .await?;

    // Has-voted collection: one ballot per participant and votation.
    let has_voted_index = IndexModel::builder()
        .keys(doc! {"votation_id": 1, "user_id": 1})
        .options(unique)
        .build();
    Coll::<HasVoted>::from_db(db)
        .create_index(has_voted_index, None)
        .await?;

    // Vote collections, looked up by votation when counting.
    for name in [Vote::NAME, StvVote::NAME, Alternative::NAME] {
        let index = IndexModel::builder().keys(doc! {"votation_id": 1}).build();
        db.collection::<mongodb::bson::Document>(name)
            .create_index(index, None)
            .await?;
    }

    Ok(())
}
