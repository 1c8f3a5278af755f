use rocket::{serde::json::Json, Route, State};

use crate::engine::Engine;
use crate::error::Result;
use crate::model::{
    api::{
        auth::Caller,
        meeting::{
            DeleteParticipantsResult, MeetingDescription, MeetingSpec, ParticipantOrInvite,
            ParticipantSpec,
        },
    },
    db::meeting::MeetingUpdate,
    mongodb::Id,
};

use super::common::{require_admin, require_participant};

pub fn routes() -> Vec<Route> {
    routes![
        create_meeting,
        get_meeting,
        update_meeting,
        delete_meeting,
        get_participants,
        add_participants,
        delete_participants,
    ]
}

#[post("/meetings", data = "<spec>", format = "json")]
async fn create_meeting(
    caller: Caller,
    spec: Json<MeetingSpec>,
    engine: &State<Engine>,
) -> Result<Json<MeetingDescription>> {
    let meeting = engine.create_meeting(spec.0, &caller.user_id).await?;
    Ok(Json(meeting.into()))
}

#[get("/meetings/<meeting_id>")]
async fn get_meeting(
    caller: Caller,
    meeting_id: Id,
    engine: &State<Engine>,
) -> Result<Json<MeetingDescription>> {
    require_participant(engine, meeting_id, &caller).await?;
    Ok(Json(engine.meeting(meeting_id).await?.into()))
}

#[put("/meetings/<meeting_id>", data = "<update>", format = "json")]
async fn update_meeting(
    caller: Caller,
    meeting_id: Id,
    update: Json<MeetingUpdate>,
    engine: &State<Engine>,
) -> Result<Json<MeetingDescription>> {
    require_admin(engine, meeting_id, &caller).await?;
    let meeting = engine.update_meeting(meeting_id, update.0).await?;
    Ok(Json(meeting.into()))
}

#[delete("/meetings/<meeting_id>")]
async fn delete_meeting(
    caller: Caller,
    meeting_id: Id,
    engine: &State<Engine>,
) -> Result<Json<MeetingDescription>> {
    require_admin(engine, meeting_id, &caller).await?;
    let meeting = engine.delete_meeting(meeting_id).await?;
    Ok(Json(meeting.into()))
}

#[get("/meetings/<meeting_id>/participants")]
async fn get_participants(
    caller: Caller,
    meeting_id: Id,
    engine: &State<Engine>,
) -> Result<Json<Vec<ParticipantOrInvite>>> {
    require_participant(engine, meeting_id, &caller).await?;
    Ok(Json(engine.participants(meeting_id).await?))
}

#[post("/meetings/<meeting_id>/participants", data = "<specs>", format = "json")]
async fn add_participants(
    caller: Caller,
    meeting_id: Id,
    specs: Json<Vec<ParticipantSpec>>,
    engine: &State<Engine>,
) -> Result<Json<Vec<ParticipantOrInvite>>> {
    require_admin(engine, meeting_id, &caller).await?;
    Ok(Json(engine.add_participants(meeting_id, specs.0).await?))
}

#[delete("/meetings/<meeting_id>/participants", data = "<emails>", format = "json")]
async fn delete_participants(
    caller: Caller,
    meeting_id: Id,
    emails: Json<Vec<String>>,
    engine: &State<Engine>,
) -> Result<Json<DeleteParticipantsResult>> {
    require_admin(engine, meeting_id, &caller).await?;
    Ok(Json(engine.delete_participants(meeting_id, emails.0).await?))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::serde_json,
    };

    use crate::api::examples::bearer;
    use crate::model::common::meeting::Role;

    use super::*;

    const OWNER: &str = "owner";

    fn spec() -> MeetingSpec {
        MeetingSpec {
            organization: "Studentersamfundet".to_string(),
            title: "General assembly".to_string(),
            start_time: Utc::now(),
            description: None,
        }
    }

    fn participant(user_id: &str, role: Role) -> ParticipantSpec {
        ParticipantSpec {
            email: format!("{user_id}@example.com"),
            role,
            is_voting_eligible: true,
        }
    }

    async fn create(client: &Client) -> Id {
        let response = client
            .post(uri!(create_meeting))
            .header(ContentType::JSON)
            .header(bearer(OWNER))
            .body(serde_json::to_string(&spec()).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let meeting: MeetingDescription = response.into_json().await.unwrap();
        assert_eq!(meeting.owner_id, OWNER);
        meeting.id.into()
    }

    async fn add(client: &Client, meeting_id: Id, specs: &[ParticipantSpec]) -> Status {
        client
            .post(uri!(add_participants(meeting_id)))
            .header(ContentType::JSON)
            .header(bearer(OWNER))
            .body(serde_json::to_string(specs).unwrap())
            .dispatch()
            .await
            .status()
    }

    #[backend_test]
    async fn create_and_get_meeting(client: Client) {
        let meeting_id = create(&client).await;

        // The owner can read it.
        let response = client
            .get(uri!(get_meeting(meeting_id)))
            .header(bearer(OWNER))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let meeting: MeetingDescription = response.into_json().await.unwrap();
        assert_eq!(meeting.title, spec().title);

        // Strangers and anonymous callers cannot.
        let response = client
            .get(uri!(get_meeting(meeting_id)))
            .header(bearer("stranger"))
            .dispatch()
            .await;
        assert_eq!(Status::Forbidden, response.status());
        let response = client.get(uri!(get_meeting(meeting_id))).dispatch().await;
        assert_eq!(Status::Unauthorized, response.status());

        // Unknown meetings are not found.
        let response = client
            .get(uri!(get_meeting(Id::new())))
            .header(bearer(OWNER))
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test]
    async fn only_admins_modify_meetings(client: Client, engine: Engine) {
        let meeting_id = create(&client).await;
        assert_eq!(
            Status::Ok,
            add(&client, meeting_id, &[participant("voter", Role::Participant)]).await
        );

        let update = MeetingUpdate {
            title: Some("Extraordinary assembly".to_string()),
            ..Default::default()
        };
        let body = serde_json::to_string(&update).unwrap();

        // The invite binds on the voter's first request, which is still refused.
        let response = client
            .put(uri!(update_meeting(meeting_id)))
            .header(ContentType::JSON)
            .header(bearer("voter"))
            .body(&body)
            .dispatch()
            .await;
        assert_eq!(Status::Forbidden, response.status());
        let response = client
            .delete(uri!(delete_meeting(meeting_id)))
            .header(bearer("voter"))
            .dispatch()
            .await;
        assert_eq!(Status::Forbidden, response.status());

        let response = client
            .put(uri!(update_meeting(meeting_id)))
            .header(ContentType::JSON)
            .header(bearer(OWNER))
            .body(&body)
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        assert_eq!(
            engine.meeting(meeting_id).await.unwrap().title,
            "Extraordinary assembly"
        );

        let response = client
            .delete(uri!(delete_meeting(meeting_id)))
            .header(bearer(OWNER))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        assert!(engine.meeting(meeting_id).await.is_err());
    }

    #[backend_test]
    async fn participants_are_managed_by_email(client: Client) {
        let meeting_id = create(&client).await;
        let specs = [
            participant("counter", Role::Counter),
            ParticipantSpec {
                email: "pending@example.com".to_string(),
                role: Role::Participant,
                is_voting_eligible: false,
            },
        ];
        assert_eq!(Status::Ok, add(&client, meeting_id, &specs).await);

        let response = client
            .get(uri!(get_participants(meeting_id)))
            .header(bearer(OWNER))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let entries: Vec<ParticipantOrInvite> = response.into_json().await.unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().all(|entry| entry.email != "pending@example.com" || !entry.user_exists));

        // Removing the owner is reported, and removes nothing.
        let response = client
            .delete(uri!(delete_participants(meeting_id)))
            .header(ContentType::JSON)
            .header(bearer(OWNER))
            .body(r#"["owner@example.com", "pending@example.com"]"#)
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let result: DeleteParticipantsResult = response.into_json().await.unwrap();
        assert_eq!(result, DeleteParticipantsResult::owner_error());

        let response = client
            .delete(uri!(delete_participants(meeting_id)))
            .header(ContentType::JSON)
            .header(bearer(OWNER))
            .body(r#"["pending@example.com"]"#)
            .dispatch()
            .await;
        let result: DeleteParticipantsResult = response.into_json().await.unwrap();
        assert_eq!(
            result,
            DeleteParticipantsResult::Deleted {
                emails: vec!["pending@example.com".to_string()]
            }
        );
    }

    #[backend_test]
    async fn participants_cannot_add_participants(client: Client) {
        let meeting_id = create(&client).await;
        assert_eq!(
            Status::Ok,
            add(&client, meeting_id, &[participant("counter", Role::Counter)]).await
        );

        let response = client
            .post(uri!(add_participants(meeting_id)))
            .header(ContentType::JSON)
            .header(bearer("counter"))
            .body(serde_json::to_string(&[participant("friend", Role::Admin)]).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Forbidden, response.status());
    }
}
