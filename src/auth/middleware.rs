use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::auth::models::AuthenticatedUser;
use crate::error::AppError;

/// Header carrying the caller's uid, set by the authenticating gateway.
pub const USER_UID_HEADER: &str = "x-user-uid";

/// Read the caller's uid from request headers.
pub fn uid_from_parts(parts: &Parts) -> Result<String, AppError> {
    let value = parts
        .headers
        .get(USER_UID_HEADER)
        .ok_or_else(|| AppError::Auth("Not logged in".into()))?;

    let uid = value
        .to_str()
        .map_err(|_| AppError::Auth("Malformed user header".into()))?
        .trim();

    if uid.is_empty() {
        return Err(AppError::Auth("Not logged in".into()));
    }

    Ok(uid.to_string())
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let uid = uid_from_parts(parts)?;
        Ok(AuthenticatedUser { uid })
    }
}
