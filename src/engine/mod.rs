//! The votation engine: lifecycle, ballot intake and counting over a [`Store`].
//!
//! The engine trusts its caller's identity but not their rights to vote; whether a
//! caller may administer a meeting is decided in front of it, by the API layer.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::{
    db::{alternative::Alternative, meeting::Meeting, participant::User, votation::Votation},
    mongodb::Id,
};
use crate::store::Store;

mod eligibility;
mod ledger;
mod lifecycle;
mod meeting;
pub mod result;
mod votation;

pub use eligibility::Eligibility;

/// Entry point for every meeting and votation operation. Cheap to clone.
#[derive(Clone)]
pub struct Engine {
    store: Arc<dyn Store>,
}

impl Engine {
    pub fn new(store: impl Store + 'static) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    /// Register the user on their first authenticated request, binding any invites to
    /// their email. Returns the number of invites bound.
    pub async fn register_user(&self, user: User) -> Result<u64> {
        let bound = self.store.register_user(user).await?;
        if bound > 0 {
            info!("Bound {bound} invite(s) on user registration");
        }
        Ok(bound)
    }

    pub async fn meeting(&self, id: Id) -> Result<Meeting> {
        self.store
            .meeting(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Meeting with ID '{id}'")))
    }

    pub async fn votation(&self, id: Id) -> Result<Votation> {
        self.store
            .votation(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Votation with ID '{id}'")))
    }

    pub async fn alternative(&self, id: Id) -> Result<Alternative> {
        self.store
            .alternative(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Alternative with ID '{id}'")))
    }
}
