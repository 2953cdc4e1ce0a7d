//! Session-stored types and keys.

use serde::{Deserialize, Serialize};

use driftwood_core::{Email, UserId};

/// Minimal identity of the signed-in user, stored in the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
}

/// Session keys.
pub mod keys {
    /// Key for the signed-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the anonymous cart token.
    pub const GUEST_TOKEN: &str = "guest_token";

    /// Key for the live checkout state machine.
    pub const CHECKOUT_STATE: &str = "checkout_state";

    /// Key for the payment intent reference of the live checkout.
    pub const PAYMENT_INTENT: &str = "payment_intent";
}
