use rocket::{serde::json::Json, Route, State};

use crate::engine::Engine;
use crate::error::Result;
use crate::model::{
    api::{
        auth::Caller,
        ballot::{BlankVoteCount, StvRanking, VotationResults, VoteCountResult, VoteReceipt},
    },
    mongodb::Id,
};

use super::common::require_participant;

pub fn routes() -> Vec<Route> {
    routes![
        cast_vote,
        cast_blank_vote,
        cast_stv_vote,
        get_vote_count,
        get_results,
        has_voted,
    ]
}

#[post("/alternatives/<alternative_id>/vote")]
async fn cast_vote(
    caller: Caller,
    alternative_id: Id,
    engine: &State<Engine>,
) -> Result<Json<VoteReceipt>> {
    let vote = engine.cast_vote(alternative_id, &caller.user_id).await?;
    Ok(Json(vote.into()))
}

#[post("/votations/<votation_id>/vote/blank")]
async fn cast_blank_vote(
    caller: Caller,
    votation_id: Id,
    engine: &State<Engine>,
) -> Result<Json<BlankVoteCount>> {
    let blank_vote_count = engine
        .cast_blank_vote(votation_id, &caller.user_id)
        .await?;
    Ok(Json(BlankVoteCount { blank_vote_count }))
}

#[post("/votations/<votation_id>/vote/stv", data = "<rankings>", format = "json")]
async fn cast_stv_vote(
    caller: Caller,
    votation_id: Id,
    rankings: Json<Vec<StvRanking>>,
    engine: &State<Engine>,
) -> Result<()> {
    engine
        .cast_stv_vote(votation_id, &rankings, &caller.user_id)
        .await
}

#[get("/votations/<votation_id>/vote-count")]
async fn get_vote_count(
    caller: Caller,
    votation_id: Id,
    engine: &State<Engine>,
) -> Result<Json<VoteCountResult>> {
    Ok(Json(
        engine.get_vote_count(votation_id, &caller.user_id).await?,
    ))
}

#[get("/votations/<votation_id>/results")]
async fn get_results(
    caller: Caller,
    votation_id: Id,
    engine: &State<Engine>,
) -> Result<Json<VotationResults>> {
    Ok(Json(
        engine
            .get_votation_results(votation_id, &caller.user_id)
            .await?,
    ))
}

#[get("/votations/<votation_id>/has-voted")]
async fn has_voted(caller: Caller, votation_id: Id, engine: &State<Engine>) -> Result<Json<bool>> {
    let votation = engine.votation(votation_id).await?;
    require_participant(engine, votation.meeting_id, &caller).await?;
    Ok(Json(engine.has_voted(votation_id, &caller.user_id).await?))
}
