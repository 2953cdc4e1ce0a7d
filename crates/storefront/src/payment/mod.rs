//! Payment gateway abstraction.
//!
//! The checkout flow talks to a [`PaymentGateway`] trait object, never to a
//! concrete provider. Two implementations exist: [`provider::HttpGateway`]
//! binds to the real payment API over HTTPS, and [`sandbox::SandboxGateway`]
//! is a deterministic in-process double used in development and tests.
//!
//! The intent lifecycle mirrors the provider's: an intent is created in
//! `requires_payment_method`, confirmation either moves it to `succeeded`
//! or leaves the status untouched alongside a typed card error (so the
//! shopper can retry with another card), and any non-terminal intent can be
//! canceled.

pub mod provider;
pub mod sandbox;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use driftwood_core::{CurrencyCode, IntentStatus};

pub use provider::HttpGateway;
pub use sandbox::SandboxGateway;

// ============================================================================
// Types
// ============================================================================

/// A payment intent, the provider-side record of one payment attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    /// Provider-assigned opaque reference (`pi_...`).
    pub id: String,
    /// Amount in the currency's minor unit (cents).
    pub amount_minor: i64,
    pub currency: CurrencyCode,
    pub status: IntentStatus,
    /// Secret handed to the client for confirmation.
    pub client_secret: String,
    /// Free-form labels attached at creation, round-tripped verbatim.
    pub metadata: BTreeMap<String, String>,
    /// Shipping snapshot attached at creation, if any.
    #[serde(default)]
    pub shipping: Option<ShippingSnapshot>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Shipping address frozen onto an intent at creation time.
///
/// The provider uses it for fraud screening, so it reflects the checkout
/// draft as of the moment the intent was created, not the final order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingSnapshot {
    pub name: String,
    pub phone: String,
    pub address1: String,
    pub address2: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

/// Card details submitted for confirmation.
///
/// The number keeps whatever separators the shopper typed; implementations
/// strip them before use. Never logged and never serialized into state.
#[derive(Clone)]
pub struct CardDetails {
    pub number: String,
    /// Expiry in `MM/YY` form.
    pub expiry: String,
    pub cvv: String,
    pub holder_name: String,
}

impl CardDetails {
    /// The card number with separators removed.
    #[must_use]
    pub fn normalized_number(&self) -> String {
        self.number
            .chars()
            .filter(char::is_ascii_digit)
            .collect()
    }
}

impl std::fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardDetails")
            .field("number", &"[REDACTED]")
            .field("expiry", &self.expiry)
            .field("cvv", &"[REDACTED]")
            .field("holder_name", &self.holder_name)
            .finish()
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Card-specific decline reasons the provider reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardErrorCode {
    /// The issuer declined the charge.
    CardDeclined,
    /// The card is past its expiry date.
    ExpiredCard,
    /// The security code did not match.
    IncorrectCvc,
}

impl CardErrorCode {
    /// The provider's wire code for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::CardDeclined => "card_declined",
            Self::ExpiredCard => "expired_card",
            Self::IncorrectCvc => "incorrect_cvc",
        }
    }

    /// Parse a provider wire code.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "card_declined" => Some(Self::CardDeclined),
            "expired_card" => Some(Self::ExpiredCard),
            "incorrect_cvc" => Some(Self::IncorrectCvc),
            _ => None,
        }
    }
}

/// Errors a gateway can surface.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The card was rejected; the intent is still confirmable with another
    /// card.
    #[error("card error: {0}")]
    Card(CardErrorCode),

    /// The provider or the network failed; not the shopper's fault.
    #[error("payment api error: {0}")]
    Api(String),

    /// The request was malformed or the intent is in the wrong state.
    #[error("payment validation error: {0}")]
    Validation(String),
}

impl std::fmt::Display for CardErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl PaymentError {
    /// The sentence shown to the shopper.
    ///
    /// Card errors map to specific guidance; everything else collapses to a
    /// generic retry message so internal detail never leaks to the page.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::Card(CardErrorCode::CardDeclined) => {
                "Your card was declined. Please try a different card."
            }
            Self::Card(CardErrorCode::ExpiredCard) => {
                "Your card has expired. Please use a different card."
            }
            Self::Card(CardErrorCode::IncorrectCvc) => {
                "The security code is incorrect. Please check and try again."
            }
            Self::Api(_) | Self::Validation(_) => {
                "Something went wrong processing your payment. Please try again."
            }
        }
    }

    /// Whether the shopper can retry the same intent with corrected details.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Card(_))
    }
}

// ============================================================================
// Gateway trait
// ============================================================================

/// The seam between checkout and the payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create an intent for `amount_minor` in `currency`.
    ///
    /// The intent starts in [`IntentStatus::RequiresPaymentMethod`]. When a
    /// shipping snapshot is given it is forwarded to the provider and kept
    /// on the intent.
    ///
    /// # Errors
    ///
    /// [`PaymentError::Validation`] for a non-positive amount,
    /// [`PaymentError::Api`] when the provider is unreachable.
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: CurrencyCode,
        metadata: BTreeMap<String, String>,
        shipping: Option<ShippingSnapshot>,
    ) -> Result<PaymentIntent, PaymentError>;

    /// Confirm an intent with card details.
    ///
    /// On success the returned intent is [`IntentStatus::Succeeded`]. On a
    /// card error the stored intent keeps its previous status so the
    /// shopper can retry.
    ///
    /// # Errors
    ///
    /// [`PaymentError::Card`] for issuer rejections,
    /// [`PaymentError::Validation`] when the intent is unknown or not in a
    /// confirmable state, [`PaymentError::Api`] for provider failures.
    async fn confirm_intent(
        &self,
        intent_id: &str,
        card: &CardDetails,
    ) -> Result<PaymentIntent, PaymentError>;

    /// Fetch the current state of an intent.
    ///
    /// # Errors
    ///
    /// [`PaymentError::Validation`] when the intent is unknown.
    async fn get_intent(&self, intent_id: &str) -> Result<PaymentIntent, PaymentError>;

    /// Cancel a non-terminal intent.
    ///
    /// # Errors
    ///
    /// [`PaymentError::Validation`] when the intent is unknown or already
    /// succeeded or canceled.
    async fn cancel_intent(&self, intent_id: &str) -> Result<PaymentIntent, PaymentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_error_wire_codes_round_trip() {
        for code in [
            CardErrorCode::CardDeclined,
            CardErrorCode::ExpiredCard,
            CardErrorCode::IncorrectCvc,
        ] {
            assert_eq!(CardErrorCode::from_code(code.code()), Some(code));
        }
        assert_eq!(CardErrorCode::from_code("insufficient_funds"), None);
    }

    #[test]
    fn test_user_messages_are_specific_for_card_errors() {
        let declined = PaymentError::Card(CardErrorCode::CardDeclined).user_message();
        let expired = PaymentError::Card(CardErrorCode::ExpiredCard).user_message();
        let cvc = PaymentError::Card(CardErrorCode::IncorrectCvc).user_message();
        assert_ne!(declined, expired);
        assert_ne!(expired, cvc);

        let api = PaymentError::Api("tls handshake".to_owned()).user_message();
        let validation = PaymentError::Validation("bad state".to_owned()).user_message();
        assert_eq!(api, validation);
        assert!(!api.contains("tls"));
    }

    #[test]
    fn test_card_details_debug_redacts() {
        let card = CardDetails {
            number: "4242424242424242".to_owned(),
            expiry: "12/30".to_owned(),
            cvv: "123".to_owned(),
            holder_name: "Ada".to_owned(),
        };
        let debug = format!("{card:?}");
        assert!(!debug.contains("4242"));
        assert!(!debug.contains("123,"));
        assert!(debug.contains("[REDACTED]"));
    }
}
