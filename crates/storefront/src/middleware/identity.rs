//! Identity resolution.
//!
//! Every request carries an [`Identity`]: the signed-in user when a session
//! user exists, otherwise a guest token minted on first contact and kept in
//! the session. Cart and checkout handlers never see raw session keys.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use tower_sessions::Session;
use tracing::debug;

use driftwood_core::{GuestToken, Identity};

use crate::models::{CurrentUser, session_keys};

/// Extractor resolving the request's cart identity.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(
///     CurrentIdentity(identity): CurrentIdentity,
/// ) -> impl IntoResponse {
///     format!("cart key: {}", identity.storage_key())
/// }
/// ```
pub struct CurrentIdentity(pub Identity);

/// Rejection when the session layer is missing or unusable.
pub struct IdentityRejection;

impl IntoResponse for IdentityRejection {
    fn into_response(self) -> Response {
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}

impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = IdentityRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or(IdentityRejection)?;

        if let Ok(Some(user)) = session.get::<CurrentUser>(session_keys::CURRENT_USER).await {
            return Ok(Self(Identity::user(user.id)));
        }

        if let Ok(Some(token)) = session.get::<String>(session_keys::GUEST_TOKEN).await {
            return Ok(Self(Identity::guest(GuestToken::from_string(token))));
        }

        let token = GuestToken::mint();
        debug!("minted guest token for new session");
        session
            .insert(session_keys::GUEST_TOKEN, token.as_str().to_owned())
            .await
            .map_err(|_| IdentityRejection)?;
        Ok(Self(Identity::guest(token)))
    }
}
