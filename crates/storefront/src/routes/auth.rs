//! Session sign-in and sign-out.
//!
//! Credential verification happens upstream (the identity service fronts
//! this engine); these handlers attach or detach the verified user on the
//! session. Sign-in is also the moment the anonymous cart folds into the
//! user's cart.

use axum::{Json, extract::State};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use driftwood_core::{Email, GuestToken, Identity, UserId};

use crate::error::{AppError, Result};
use crate::models::{CurrentUser, session_keys};
use crate::state::AppState;

use super::cart::CartView;

#[derive(Debug, Deserialize)]
pub struct SigninPayload {
    pub user_id: UserId,
    pub email: String,
}

/// POST /auth/signin - attach a verified user and merge the guest cart.
#[instrument(skip_all, fields(user_id = %payload.user_id))]
pub async fn signin(
    State(app): State<AppState>,
    session: Session,
    Json(payload): Json<SigninPayload>,
) -> Result<Json<CartView>> {
    let email = Email::parse(&payload.email)
        .map_err(|e| AppError::BadRequest(format!("invalid email: {e}")))?;

    let guest_token = session
        .get::<String>(session_keys::GUEST_TOKEN)
        .await
        .ok()
        .flatten()
        .map(GuestToken::from_string);

    // Rotate the session id on privilege change.
    session
        .cycle_id()
        .await
        .map_err(|e| AppError::Internal(format!("session rotation failed: {e}")))?;
    session
        .insert(
            session_keys::CURRENT_USER,
            CurrentUser {
                id: payload.user_id,
                email,
            },
        )
        .await
        .map_err(|e| AppError::Internal(format!("session write failed: {e}")))?;
    let _ = session.remove::<String>(session_keys::GUEST_TOKEN).await;

    let cart = if let Some(token) = guest_token {
        app.carts().merge_on_sign_in(&token, payload.user_id).await
    } else {
        app.carts().load(&Identity::user(payload.user_id)).await
    };

    Ok(Json(CartView::from_cart(&cart)))
}

/// POST /auth/signout - drop the session user and all session state.
///
/// The anonymous cart that existed before sign-in is not resurrected; the
/// next request starts from a fresh guest token and an empty cart.
#[instrument(skip_all)]
pub async fn signout(session: Session) -> Result<()> {
    session
        .flush()
        .await
        .map_err(|e| AppError::Internal(format!("session flush failed: {e}")))?;
    Ok(())
}
