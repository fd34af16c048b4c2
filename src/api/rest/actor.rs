use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::models::order::{Actor, ActorRole};

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// The auth layer in front of this service resolves identity and role into headers.
#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header(parts, ACTOR_ID_HEADER)?;
        let role: ActorRole = header(parts, ACTOR_ROLE_HEADER)?
            .parse()
            .map_err(AppError::Unauthorized)?;

        if role == ActorRole::System {
            return Err(AppError::Unauthorized(
                "system actor cannot be asserted by clients".to_string(),
            ));
        }

        Ok(Actor::new(id, role))
    }
}

fn header(parts: &Parts, name: &str) -> Result<String, AppError> {
    let value = parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::Unauthorized(format!("missing {name} header")))?;

    Ok(value.to_string())
}
