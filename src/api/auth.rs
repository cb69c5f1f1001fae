use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::api::response::ApiError;

/// Header carrying the authenticated user id, set by the upstream gateway
/// after it has resolved the caller's session.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub String);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, ApiError> {
        let user = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

        Ok(CurrentUser(user.to_string()))
    }
}
