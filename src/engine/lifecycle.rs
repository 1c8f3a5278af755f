use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::model::{
    api::{ballot::VotationResults, votation::UpdateVotationStatusResult},
    common::votation::VotationStatus,
    db::votation::Votation,
    mongodb::Id,
};
use crate::store::StatusChange;

use super::{result, Engine};

impl Engine {
    /// Move a votation to `status`.
    ///
    /// Closing for counting computes and stores the winners in the same commit;
    /// invalidating clears them.
    /// Opening while another votation of the meeting is open is reported as a result
    /// value, not an error.
    pub async fn update_votation_status(
        &self,
        id: Id,
        status: VotationStatus,
    ) -> Result<UpdateVotationStatusResult> {
        Ok(match self.transition(id, status).await? {
            Some(votation) => UpdateVotationStatusResult::Votation(votation.into()),
            None => UpdateVotationStatusResult::max_one_open(),
        })
    }

    pub async fn open_votation(&self, id: Id) -> Result<UpdateVotationStatusResult> {
        self.update_votation_status(id, VotationStatus::Open).await
    }

    pub async fn close_votation_for_counting(&self, id: Id) -> Result<Votation> {
        self.transition_to(id, VotationStatus::CheckingResult).await
    }

    /// Publish the results of a counted votation, returning them.
    pub async fn publish_results(&self, id: Id) -> Result<VotationResults> {
        let votation = self
            .transition_to(id, VotationStatus::PublishedResult)
            .await?;
        self.results(&votation).await
    }

    pub async fn invalidate_votation(&self, id: Id) -> Result<Votation> {
        self.transition_to(id, VotationStatus::Invalid).await
    }

    /// Recount a votation that is being checked and store the winners. Safe to repeat:
    /// winners are recomputed from the same frozen ballots and every flag is overwritten.
    /// Writes nothing once the votation has left checking-result.
    pub async fn count_votation(&self, votation: &Votation) -> Result<HashSet<Id>> {
        let winners = self
            .store
            .recount(votation.id, &result::winners)
            .await?
            .ok_or_else(|| {
                Error::BadRequest(format!("Votation {} is not being counted", votation.id))
            })?;
        info!("Counted votation {}: {} winner(s)", votation.id, winners.len());
        Ok(winners)
    }

    /// A transition that can never hit the one-open rule.
    async fn transition_to(&self, id: Id, status: VotationStatus) -> Result<Votation> {
        self.transition(id, status).await?.ok_or_else(|| {
            Error::BadRequest(format!("Votation {id} cannot move to {status:?}"))
        })
    }

    /// Perform a transition with its side effects. Returns `None` if the meeting
    /// already has an open votation.
    async fn transition(&self, id: Id, to: VotationStatus) -> Result<Option<Votation>> {
        let from = self.votation(id).await?.status;
        if !from.can_transition_to(to) {
            return Err(Error::IllegalTransition { from, to });
        }

        // Counting commits together with the move to checking-result.
        let change = match to {
            VotationStatus::CheckingResult => {
                self.store.close_for_counting(id, &result::winners).await?
            }
            _ => self.store.change_status(id, from, to).await?,
        };
        let votation = match change {
            StatusChange::Changed(votation) => votation,
            StatusChange::Stale(current) => {
                return Err(Error::IllegalTransition { from: current, to })
            }
            StatusChange::MaxOneOpen => {
                debug!("Refused to open votation {id}: another votation is open");
                return Ok(None);
            }
        };
        info!("Votation {id} moved from {from:?} to {to:?}");
        Ok(Some(votation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::engine::examples::*;
    use crate::model::{common::meeting::Role, db::votation::VotationSettings};

    #[rocket::async_test]
    async fn full_lifecycle() {
        let engine = engine().await;
        let meeting = meeting(&engine).await;
        let (votation, alternatives) = votation(
            &engine,
            &meeting,
            VotationSettings::simple_example(),
            &["A", "B"],
        )
        .await;

        let opened = engine.open_votation(votation.id).await.unwrap();
        assert!(matches!(opened, UpdateVotationStatusResult::Votation(v) if v.status == VotationStatus::Open));

        engine.cast_vote(alternatives[0].id, OWNER).await.unwrap();

        let closed = engine.close_votation_for_counting(votation.id).await.unwrap();
        assert_eq!(closed.status, VotationStatus::CheckingResult);
        let winner = engine.alternative(alternatives[0].id).await.unwrap();
        assert!(winner.is_winner);

        let results = engine.publish_results(votation.id).await.unwrap();
        assert_eq!(results.vote_count, 1);
        assert!(results.alternatives[0].is_winner);
        assert!(!results.alternatives[1].is_winner);
    }

    #[rocket::async_test]
    async fn only_one_open_votation_per_meeting() {
        let engine = engine().await;
        let meeting = meeting(&engine).await;
        let settings = VotationSettings::simple_example;
        let (first, _) = votation(&engine, &meeting, settings(), &["A"]).await;
        let (second, _) = votation(&engine, &meeting, settings(), &["A"]).await;

        engine.open_votation(first.id).await.unwrap();
        let refused = engine.open_votation(second.id).await.unwrap();
        assert_eq!(refused, UpdateVotationStatusResult::max_one_open());
        assert_eq!(
            engine.votation(second.id).await.unwrap().status,
            VotationStatus::Upcoming
        );

        // Once the first closes, the second may open.
        engine.close_votation_for_counting(first.id).await.unwrap();
        let opened = engine.open_votation(second.id).await.unwrap();
        assert!(matches!(opened, UpdateVotationStatusResult::Votation(_)));
    }

    #[rocket::async_test]
    async fn concurrent_opens_leave_one_open() {
        let engine = engine().await;
        let meeting = meeting(&engine).await;
        let (first, _) = votation(&engine, &meeting, VotationSettings::simple_example(), &["A"]).await;
        let (second, _) = votation(&engine, &meeting, VotationSettings::simple_example(), &["A"]).await;

        let (a, b) = rocket::tokio::join!(
            engine.open_votation(first.id),
            engine.open_votation(second.id)
        );
        let opened = [a.unwrap(), b.unwrap()]
            .into_iter()
            .filter(|result| matches!(result, UpdateVotationStatusResult::Votation(_)))
            .count();
        assert_eq!(opened, 1);

        let open = engine
            .votations_by_meeting(meeting.id)
            .await
            .unwrap()
            .into_iter()
            .filter(|v| v.status == VotationStatus::Open)
            .count();
        assert_eq!(open, 1);
    }

    #[rocket::async_test]
    async fn same_status_is_illegal() {
        let engine = engine().await;
        let meeting = meeting(&engine).await;
        let (votation, _) = votation(&engine, &meeting, VotationSettings::simple_example(), &["A"]).await;

        let err = engine
            .update_votation_status(votation.id, VotationStatus::Upcoming)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::IllegalTransition {
                from: VotationStatus::Upcoming,
                to: VotationStatus::Upcoming
            }
        ));
    }

    #[rocket::async_test]
    async fn skipping_counting_is_illegal() {
        let engine = engine().await;
        let meeting = meeting(&engine).await;
        let (votation, _) = votation(&engine, &meeting, VotationSettings::simple_example(), &["A"]).await;
        engine.open_votation(votation.id).await.unwrap();

        let err = engine.publish_results(votation.id).await.unwrap_err();
        assert!(matches!(err, Error::IllegalTransition { .. }));
        assert_eq!(
            engine.votation(votation.id).await.unwrap().status,
            VotationStatus::Open
        );
    }

    #[rocket::async_test]
    async fn invalidation_clears_winners_and_is_terminal() {
        let engine = engine().await;
        let meeting = meeting(&engine).await;
        join(&engine, &meeting, "voter", Role::Participant, true).await;
        let (votation, alternatives) = votation(
            &engine,
            &meeting,
            VotationSettings::simple_example(),
            &["A", "B"],
        )
        .await;
        engine.open_votation(votation.id).await.unwrap();
        engine.cast_vote(alternatives[1].id, "voter").await.unwrap();
        engine.close_votation_for_counting(votation.id).await.unwrap();
        assert!(engine.alternative(alternatives[1].id).await.unwrap().is_winner);

        let invalid = engine.invalidate_votation(votation.id).await.unwrap();
        assert_eq!(invalid.status, VotationStatus::Invalid);
        assert!(!engine.alternative(alternatives[1].id).await.unwrap().is_winner);

        let err = engine.open_votation(votation.id).await.unwrap_err();
        assert!(matches!(err, Error::IllegalTransition { .. }));
    }

    #[rocket::async_test]
    async fn recounting_is_idempotent() {
        let engine = engine().await;
        let meeting = meeting(&engine).await;
        join(&engine, &meeting, "voter", Role::Participant, true).await;
        let (votation, alternatives) = votation(
            &engine,
            &meeting,
            VotationSettings::simple_example(),
            &["A", "B"],
        )
        .await;
        engine.open_votation(votation.id).await.unwrap();
        engine.cast_vote(alternatives[0].id, OWNER).await.unwrap();
        engine.cast_vote(alternatives[0].id, "voter").await.unwrap();
        let closed = engine.close_votation_for_counting(votation.id).await.unwrap();

        let first = engine.count_votation(&closed).await.unwrap();
        let second = engine.count_votation(&closed).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first, HashSet::from([alternatives[0].id]));
    }

    #[rocket::async_test]
    async fn late_count_leaves_invalid_votation_alone() {
        let engine = engine().await;
        let meeting = meeting(&engine).await;
        let (votation, alternatives) = votation(
            &engine,
            &meeting,
            VotationSettings::simple_example(),
            &["A", "B"],
        )
        .await;
        engine.open_votation(votation.id).await.unwrap();
        engine.cast_vote(alternatives[0].id, OWNER).await.unwrap();
        let closed = engine.close_votation_for_counting(votation.id).await.unwrap();
        assert_eq!(closed.times_counted, 1);
        engine.invalidate_votation(votation.id).await.unwrap();

        // A count that started before the invalidation must not bring the winner back.
        let err = engine.count_votation(&closed).await.unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
        let stored = engine.votation(votation.id).await.unwrap();
        assert_eq!(stored.status, VotationStatus::Invalid);
        assert_eq!(stored.times_counted, 1);
        for alternative in engine.alternatives_by_votation(votation.id).await.unwrap() {
            assert!(!alternative.is_winner);
        }
    }

    #[rocket::async_test]
    async fn closing_races_with_invalidation() {
        let engine = engine().await;
        let meeting = meeting(&engine).await;
        let (votation, alternatives) = votation(
            &engine,
            &meeting,
            VotationSettings::simple_example(),
            &["A", "B"],
        )
        .await;
        engine.open_votation(votation.id).await.unwrap();
        engine.cast_vote(alternatives[1].id, OWNER).await.unwrap();

        let (closed, invalidated) = rocket::tokio::join!(
            engine.close_votation_for_counting(votation.id),
            engine.invalidate_votation(votation.id)
        );
        assert!(closed.is_ok() || invalidated.is_ok());

        let stored = engine.votation(votation.id).await.unwrap();
        let winner = engine.alternative(alternatives[1].id).await.unwrap();
        match stored.status {
            VotationStatus::Invalid => assert!(!winner.is_winner),
            VotationStatus::CheckingResult => assert!(winner.is_winner),
            status => panic!("Unexpected status {status:?}"),
        }
    }
}
