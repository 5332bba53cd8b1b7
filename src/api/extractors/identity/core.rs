use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::state::AppState;

use super::Identity;

/// Handler-side access to the verified `Identity`.
/// The access middleware inserts it into request extensions on admission; if it is
/// missing the route was reached without a session (public route or middleware not
/// installed), so we answer 401.
pub struct IdentityExtractor(pub Identity);

impl FromRequestParts<AppState> for IdentityExtractor
where
    AppState: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(IdentityExtractor)
            .ok_or(AppError::Unauthorized)
    }
}
