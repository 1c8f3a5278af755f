use rocket::{serde::json::Json, Route, State};
use serde::{Deserialize, Serialize};

use crate::engine::Engine;
use crate::error::Result;
use crate::model::{
    api::{
        auth::Caller,
        ballot::VotationResults,
        id::ApiId,
        votation::{
            AlternativeDescription, StatusRequest, UpdateVotationStatusResult,
            VotationDescription, VotationSpec, VotationUpdate,
        },
    },
    mongodb::Id,
};

use super::common::{administered_votation, require_admin, require_participant};

pub fn routes() -> Vec<Route> {
    routes![
        get_votations,
        create_votations,
        update_votations,
        delete_votations,
        get_votation,
        update_status,
        publish_results,
        get_alternatives,
        create_alternative,
        delete_alternatives,
    ]
}

#[get("/meetings/<meeting_id>/votations")]
async fn get_votations(
    caller: Caller,
    meeting_id: Id,
    engine: &State<Engine>,
) -> Result<Json<Vec<VotationDescription>>> {
    require_participant(engine, meeting_id, &caller).await?;
    let votations = engine.votations_by_meeting(meeting_id).await?;
    Ok(Json(votations.into_iter().map(Into::into).collect()))
}

#[post("/meetings/<meeting_id>/votations", data = "<specs>", format = "json")]
async fn create_votations(
    caller: Caller,
    meeting_id: Id,
    specs: Json<Vec<VotationSpec>>,
    engine: &State<Engine>,
) -> Result<Json<Vec<VotationDescription>>> {
    require_admin(engine, meeting_id, &caller).await?;
    let votations = engine.create_votations(meeting_id, specs.0).await?;
    Ok(Json(votations.into_iter().map(Into::into).collect()))
}

#[put("/votations", data = "<updates>", format = "json")]
async fn update_votations(
    caller: Caller,
    updates: Json<Vec<VotationUpdate>>,
    engine: &State<Engine>,
) -> Result<Json<Vec<VotationDescription>>> {
    for update in updates.iter() {
        administered_votation(engine, *update.id, &caller).await?;
    }
    let votations = engine.update_votations(updates.0).await?;
    Ok(Json(votations.into_iter().map(Into::into).collect()))
}

#[delete("/votations", data = "<ids>", format = "json")]
async fn delete_votations(
    caller: Caller,
    ids: Json<Vec<ApiId>>,
    engine: &State<Engine>,
) -> Result<Json<Vec<ApiId>>> {
    let mut existing = Vec::with_capacity(ids.len());
    for id in ids.0 {
        // Missing votations are skipped, not refused.
        if engine.votation(*id).await.is_ok() {
            administered_votation(engine, *id, &caller).await?;
            existing.push(*id);
        }
    }
    let deleted = engine.delete_votations(existing).await?;
    Ok(Json(deleted.into_iter().map(Into::into).collect()))
}

#[get("/votations/<votation_id>")]
async fn get_votation(
    caller: Caller,
    votation_id: Id,
    engine: &State<Engine>,
) -> Result<Json<VotationDescription>> {
    let votation = engine.votation(votation_id).await?;
    require_participant(engine, votation.meeting_id, &caller).await?;
    Ok(Json(votation.into()))
}

#[post("/votations/<votation_id>/status", data = "<request>", format = "json")]
async fn update_status(
    caller: Caller,
    votation_id: Id,
    request: Json<StatusRequest>,
    engine: &State<Engine>,
) -> Result<Json<UpdateVotationStatusResult>> {
    administered_votation(engine, votation_id, &caller).await?;
    let result = engine
        .update_votation_status(votation_id, request.status)
        .await?;
    Ok(Json(result))
}

/// Publish the results of a counted votation, returning them.
#[post("/votations/<votation_id>/publish")]
async fn publish_results(
    caller: Caller,
    votation_id: Id,
    engine: &State<Engine>,
) -> Result<Json<VotationResults>> {
    administered_votation(engine, votation_id, &caller).await?;
    Ok(Json(engine.publish_results(votation_id).await?))
}

#[get("/votations/<votation_id>/alternatives")]
async fn get_alternatives(
    caller: Caller,
    votation_id: Id,
    engine: &State<Engine>,
) -> Result<Json<Vec<AlternativeDescription>>> {
    let votation = engine.votation(votation_id).await?;
    require_participant(engine, votation.meeting_id, &caller).await?;
    let alternatives = engine.alternatives_by_votation(votation_id).await?;
    Ok(Json(alternatives.into_iter().map(Into::into).collect()))
}

#[post("/votations/<votation_id>/alternatives", data = "<alternative>", format = "json")]
async fn create_alternative(
    caller: Caller,
    votation_id: Id,
    alternative: Json<AlternativeText>,
    engine: &State<Engine>,
) -> Result<Json<AlternativeDescription>> {
    administered_votation(engine, votation_id, &caller).await?;
    let alternative = engine
        .create_alternative(votation_id, alternative.0.text)
        .await?;
    Ok(Json(alternative.into()))
}

#[delete("/alternatives", data = "<ids>", format = "json")]
async fn delete_alternatives(
    caller: Caller,
    ids: Json<Vec<ApiId>>,
    engine: &State<Engine>,
) -> Result<Json<Vec<ApiId>>> {
    let mut existing = Vec::with_capacity(ids.len());
    for id in ids.0 {
        if let Ok(alternative) = engine.alternative(*id).await {
            administered_votation(engine, alternative.votation_id, &caller).await?;
            existing.push(*id);
        }
    }
    let deleted = engine.delete_alternatives(existing).await?;
    Ok(Json(deleted.into_iter().map(Into::into).collect()))
}

/// The text of a new alternative.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
struct AlternativeText {
    text: String,
}
