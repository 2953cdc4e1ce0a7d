//! Cart and order owner identities.
//!
//! A cart is owned by exactly one identity at a time: either an anonymous
//! guest token or an authenticated user id, never both. Orders are owned by
//! either a user id or a guest email.

use core::fmt;

use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};

use super::email::Email;
use super::id::UserId;

/// Length of a minted guest token.
const GUEST_TOKEN_LENGTH: usize = 32;

/// An opaque token identifying an anonymous shopper.
///
/// Minted on first cart interaction and stored in the browser session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuestToken(String);

impl GuestToken {
    /// Mint a fresh random token.
    #[must_use]
    pub fn mint() -> Self {
        let token: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(GUEST_TOKEN_LENGTH)
            .map(char::from)
            .collect();
        Self(token)
    }

    /// Wrap an existing token string (e.g., read back from a session).
    #[must_use]
    pub fn from_string(token: String) -> Self {
        Self(token)
    }

    /// The token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GuestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The current owner of a cart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Identity {
    /// Anonymous shopper identified by a session-scoped token.
    Guest {
        /// The guest token.
        token: GuestToken,
    },
    /// Authenticated user.
    User {
        /// The user's id.
        id: UserId,
    },
}

impl Identity {
    /// Identity for a guest token.
    #[must_use]
    pub const fn guest(token: GuestToken) -> Self {
        Self::Guest { token }
    }

    /// Identity for an authenticated user.
    #[must_use]
    pub const fn user(id: UserId) -> Self {
        Self::User { id }
    }

    /// Whether this identity is anonymous.
    #[must_use]
    pub const fn is_guest(&self) -> bool {
        matches!(self, Self::Guest { .. })
    }

    /// The key under which this identity's cart is stored.
    ///
    /// Guest and user keyspaces are disjoint by construction.
    #[must_use]
    pub fn storage_key(&self) -> String {
        match self {
            Self::Guest { token } => format!("guest:{token}"),
            Self::User { id } => format!("user:{id}"),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}

/// The owner of a placed order: a user id or a guest email, exactly one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderOwner {
    /// Order placed by an authenticated user.
    User {
        /// The user's id.
        id: UserId,
    },
    /// Order placed by a guest, identified by the checkout email.
    Guest {
        /// Contact email collected at checkout.
        email: Email,
    },
}

impl OrderOwner {
    /// Stable string form for persistence (`user:<id>` / `guest:<email>`).
    #[must_use]
    pub fn as_ref_string(&self) -> String {
        match self {
            Self::User { id } => format!("user:{id}"),
            Self::Guest { email } => format!("guest:{email}"),
        }
    }

    /// Parse the persisted form produced by [`Self::as_ref_string`].
    #[must_use]
    pub fn parse_ref(s: &str) -> Option<Self> {
        let (kind, rest) = s.split_once(':')?;
        match kind {
            "user" => rest.parse::<i64>().ok().map(|id| Self::User {
                id: UserId::new(id),
            }),
            "guest" => Email::parse(rest).ok().map(|email| Self::Guest { email }),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_mint_token_shape() {
        let token = GuestToken::mint();
        assert_eq!(token.as_str().len(), 32);
        assert!(token.as_str().chars().all(char::is_alphanumeric));
    }

    #[test]
    fn test_mint_tokens_differ() {
        assert_ne!(GuestToken::mint(), GuestToken::mint());
    }

    #[test]
    fn test_storage_keys_disjoint() {
        let guest = Identity::guest(GuestToken::from_string("abc123".to_owned()));
        let user = Identity::user(UserId::new(9));
        assert_eq!(guest.storage_key(), "guest:abc123");
        assert_eq!(user.storage_key(), "user:9");
        assert!(guest.is_guest());
        assert!(!user.is_guest());
    }

    #[test]
    fn test_order_owner_ref_string() {
        let owner = OrderOwner::Guest {
            email: Email::parse("shopper@example.com").unwrap(),
        };
        assert_eq!(owner.as_ref_string(), "guest:shopper@example.com");
        assert_eq!(
            OrderOwner::parse_ref("guest:shopper@example.com"),
            Some(owner)
        );
        assert_eq!(
            OrderOwner::parse_ref("user:42"),
            Some(OrderOwner::User { id: UserId::new(42) })
        );
        assert_eq!(OrderOwner::parse_ref("session:42"), None);
        assert_eq!(OrderOwner::parse_ref("user:abc"), None);
    }

    #[test]
    fn test_identity_serde_tagged() {
        let user = Identity::user(UserId::new(4));
        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains("\"kind\":\"user\""));
        let back: Identity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, user);
    }
}
