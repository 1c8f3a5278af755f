use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, TokenData, Validation};
use rocket::{
    http::Status,
    request::{FromRequest, Outcome},
    Request,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::engine::Engine;
use crate::error::Error;
use crate::model::{common::UserId, db::participant::User};

pub const AUTHORIZATION_HEADER: &str = "Authorization";
const BEARER_PREFIX: &str = "Bearer ";

/// Bearer token claims issued by the identity provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject, e.g. `auth0|60b8d2f5`.
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "exp", with = "ts_seconds")]
    pub expire_at: DateTime<Utc>,
}

/// A verified caller identity. Says nothing about what the caller may do; that is
/// decided per meeting from their participant record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub email: Option<String>,
}

impl Caller {
    /// Verify a bearer token and extract the caller.
    pub fn from_token(token: &str, config: &Config) -> Result<Self, Error> {
        let claims = jsonwebtoken::decode(
            token,
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|data: TokenData<Claims>| data.claims)?;
        Ok(Self {
            user_id: strip_provider(&claims.sub),
            email: claims.email,
        })
    }
}

/// Identity providers prefix subjects with their connection name; we only keep the ID.
fn strip_provider(sub: &str) -> UserId {
    match sub.split_once('|') {
        Some((_, id)) => id.to_string(),
        None => sub.to_string(),
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Caller {
    type Error = Error;

    /// Get the caller from the bearer token, registering them as a user the first time
    /// they are seen with an email.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        // Both are managed by the fairings before launch.
        let (config, engine) = match (req.rocket().state::<Config>(), req.rocket().state::<Engine>()) {
            (Some(config), Some(engine)) => (config, engine),
            _ => {
                return Outcome::Failure((
                    Status::InternalServerError,
                    Error::BadRequest("Server is not configured".to_string()),
                ))
            }
        };

        let token = match req
            .headers()
            .get_one(AUTHORIZATION_HEADER)
            .and_then(|header| header.strip_prefix(BEARER_PREFIX))
        {
            Some(token) => token,
            None => {
                return Outcome::Failure((
                    Status::Unauthorized,
                    Error::Unauthorized("Missing bearer token".to_string()),
                ))
            }
        };

        let caller = match Self::from_token(token, config) {
            Ok(caller) => caller,
            Err(e) => return Outcome::Failure((Status::Unauthorized, e)),
        };

        if let Some(email) = &caller.email {
            let user = User {
                id: caller.user_id.clone(),
                email: email.clone(),
            };
            if let Err(e) = engine.register_user(user).await {
                return Outcome::Failure((e.status(), e));
            }
        }

        Outcome::Success(caller)
    }
}
