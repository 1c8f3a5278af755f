use crate::engine::{Eligibility, Engine};
use crate::error::{Error, Result};
use crate::model::{
    api::auth::Caller, common::meeting::Role, db::votation::Votation, mongodb::Id,
};

/// Ensure the caller is an admin of the meeting.
pub async fn require_admin(engine: &Engine, meeting_id: Id, caller: &Caller) -> Result<()> {
    let eligibility = require_participant(engine, meeting_id, caller).await?;
    if eligibility.role() == Some(Role::Admin) {
        Ok(())
    } else {
        Err(Error::Forbidden(format!(
            "Only admins of meeting {meeting_id} may do this"
        )))
    }
}

/// Ensure the caller takes part in the meeting, in any role.
pub async fn require_participant(
    engine: &Engine,
    meeting_id: Id,
    caller: &Caller,
) -> Result<Eligibility> {
    engine.meeting(meeting_id).await?;
    let eligibility = engine.eligibility(meeting_id, &caller.user_id).await?;
    match eligibility {
        Eligibility::NotParticipant => Err(Error::Forbidden(format!(
            "Not a participant of meeting {meeting_id}"
        ))),
        eligibility => Ok(eligibility),
    }
}

/// Get a votation, ensuring the caller administers its meeting.
pub async fn administered_votation(
    engine: &Engine,
    votation_id: Id,
    caller: &Caller,
) -> Result<Votation> {
    let votation = engine.votation(votation_id).await?;
    require_admin(engine, votation.meeting_id, caller).await?;
    Ok(votation)
}
