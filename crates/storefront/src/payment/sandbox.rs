//! Deterministic in-process payment gateway.
//!
//! Used in development and tests so checkout exercises the full intent
//! lifecycle without network access. A handful of reserved card numbers
//! trigger specific decline paths; every other plausible card succeeds
//! after a configurable simulated confirmation delay.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use rand::distr::Alphanumeric;
use tokio::sync::RwLock;
use tracing::debug;

use driftwood_core::{CurrencyCode, IntentStatus};

use super::{
    CardDetails, CardErrorCode, PaymentError, PaymentGateway, PaymentIntent, ShippingSnapshot,
};

/// Always declined by the issuer.
pub const CARD_DECLINED: &str = "4000000000000002";
/// Reported as expired.
pub const CARD_EXPIRED: &str = "4000000000000069";
/// Reported as having a wrong security code.
pub const CARD_INCORRECT_CVC: &str = "4000000000000127";

/// In-memory gateway double with provider-shaped behavior.
#[derive(Clone)]
pub struct SandboxGateway {
    inner: Arc<SandboxInner>,
}

struct SandboxInner {
    intents: RwLock<HashMap<String, PaymentIntent>>,
    confirm_delay: Duration,
}

impl SandboxGateway {
    /// Create a sandbox with a simulated confirmation delay.
    #[must_use]
    pub fn new(confirm_delay: Duration) -> Self {
        Self {
            inner: Arc::new(SandboxInner {
                intents: RwLock::new(HashMap::new()),
                confirm_delay,
            }),
        }
    }

    fn mint_id(prefix: &str) -> String {
        let suffix: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(24)
            .map(char::from)
            .collect();
        format!("{prefix}_{suffix}")
    }

    /// Map the reserved test numbers to their decline codes.
    fn decline_for(number: &str) -> Option<CardErrorCode> {
        match number {
            CARD_DECLINED => Some(CardErrorCode::CardDeclined),
            CARD_EXPIRED => Some(CardErrorCode::ExpiredCard),
            CARD_INCORRECT_CVC => Some(CardErrorCode::IncorrectCvc),
            _ => None,
        }
    }
}

impl Default for SandboxGateway {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}

#[async_trait]
impl PaymentGateway for SandboxGateway {
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: CurrencyCode,
        metadata: BTreeMap<String, String>,
        shipping: Option<ShippingSnapshot>,
    ) -> Result<PaymentIntent, PaymentError> {
        if amount_minor <= 0 {
            return Err(PaymentError::Validation(format!(
                "amount must be positive, got {amount_minor}"
            )));
        }
        let now = Utc::now();
        let intent = PaymentIntent {
            id: Self::mint_id("pi"),
            amount_minor,
            currency,
            status: IntentStatus::RequiresPaymentMethod,
            client_secret: Self::mint_id("cs"),
            metadata,
            shipping,
            created_at: now,
            updated_at: now,
        };
        debug!(intent_id = %intent.id, amount_minor, "sandbox intent created");
        self.inner
            .intents
            .write()
            .await
            .insert(intent.id.clone(), intent.clone());
        Ok(intent)
    }

    async fn confirm_intent(
        &self,
        intent_id: &str,
        card: &CardDetails,
    ) -> Result<PaymentIntent, PaymentError> {
        {
            let intents = self.inner.intents.read().await;
            let intent = intents
                .get(intent_id)
                .ok_or_else(|| PaymentError::Validation(format!("unknown intent {intent_id}")))?;
            if !intent.status.is_confirmable() {
                return Err(PaymentError::Validation(format!(
                    "intent {intent_id} is {} and cannot be confirmed",
                    intent.status
                )));
            }
        }

        if !self.inner.confirm_delay.is_zero() {
            tokio::time::sleep(self.inner.confirm_delay).await;
        }

        // Reserved numbers fail without touching the stored status, so a
        // retry with a different card remains possible.
        if let Some(code) = Self::decline_for(&card.normalized_number()) {
            debug!(intent_id, code = %code, "sandbox confirmation declined");
            return Err(PaymentError::Card(code));
        }

        let mut intents = self.inner.intents.write().await;
        let intent = intents
            .get_mut(intent_id)
            .ok_or_else(|| PaymentError::Validation(format!("unknown intent {intent_id}")))?;
        intent.status = IntentStatus::Succeeded;
        intent.updated_at = Utc::now();
        debug!(intent_id, "sandbox confirmation succeeded");
        Ok(intent.clone())
    }

    async fn get_intent(&self, intent_id: &str) -> Result<PaymentIntent, PaymentError> {
        self.inner
            .intents
            .read()
            .await
            .get(intent_id)
            .cloned()
            .ok_or_else(|| PaymentError::Validation(format!("unknown intent {intent_id}")))
    }

    async fn cancel_intent(&self, intent_id: &str) -> Result<PaymentIntent, PaymentError> {
        let mut intents = self.inner.intents.write().await;
        let intent = intents
            .get_mut(intent_id)
            .ok_or_else(|| PaymentError::Validation(format!("unknown intent {intent_id}")))?;
        if intent.status.is_terminal() {
            return Err(PaymentError::Validation(format!(
                "intent {intent_id} is {} and cannot be canceled",
                intent.status
            )));
        }
        intent.status = IntentStatus::Canceled;
        intent.updated_at = Utc::now();
        Ok(intent.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn card(number: &str) -> CardDetails {
        CardDetails {
            number: number.to_owned(),
            expiry: "12/30".to_owned(),
            cvv: "123".to_owned(),
            holder_name: "Ada Lovelace".to_owned(),
        }
    }

    async fn created(gateway: &SandboxGateway) -> PaymentIntent {
        gateway
            .create_intent(4999, CurrencyCode::Usd, BTreeMap::new(), None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_starts_requiring_payment_method() {
        let gateway = SandboxGateway::default();
        let intent = created(&gateway).await;
        assert_eq!(intent.status, IntentStatus::RequiresPaymentMethod);
        assert!(intent.id.starts_with("pi_"));
        assert_eq!(intent.amount_minor, 4999);
    }

    #[tokio::test]
    async fn test_create_rejects_non_positive_amount() {
        let gateway = SandboxGateway::default();
        let err = gateway
            .create_intent(0, CurrencyCode::Usd, BTreeMap::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_keeps_shipping_snapshot() {
        let gateway = SandboxGateway::default();
        let snapshot = ShippingSnapshot {
            name: "Ada Lovelace".to_owned(),
            phone: "555-0100".to_owned(),
            address1: "1 Analytical Way".to_owned(),
            address2: String::new(),
            city: "London".to_owned(),
            state: "LDN".to_owned(),
            postal_code: "EC1A".to_owned(),
            country: "GB".to_owned(),
        };
        let intent = gateway
            .create_intent(4999, CurrencyCode::Usd, BTreeMap::new(), Some(snapshot.clone()))
            .await
            .unwrap();
        assert_eq!(intent.shipping, Some(snapshot.clone()));

        let stored = gateway.get_intent(&intent.id).await.unwrap();
        assert_eq!(stored.shipping, Some(snapshot));
    }

    #[tokio::test]
    async fn test_confirm_succeeds_for_ordinary_card() {
        let gateway = SandboxGateway::default();
        let intent = created(&gateway).await;
        let confirmed = gateway
            .confirm_intent(&intent.id, &card("4242 4242 4242 4242"))
            .await
            .unwrap();
        assert_eq!(confirmed.status, IntentStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_reserved_cards_map_to_their_codes() {
        let gateway = SandboxGateway::default();
        for (number, expected) in [
            (CARD_DECLINED, CardErrorCode::CardDeclined),
            (CARD_EXPIRED, CardErrorCode::ExpiredCard),
            (CARD_INCORRECT_CVC, CardErrorCode::IncorrectCvc),
        ] {
            let intent = created(&gateway).await;
            let err = gateway
                .confirm_intent(&intent.id, &card(number))
                .await
                .unwrap_err();
            match err {
                PaymentError::Card(code) => assert_eq!(code, expected),
                other => panic!("expected card error, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_decline_leaves_intent_confirmable() {
        let gateway = SandboxGateway::default();
        let intent = created(&gateway).await;
        gateway
            .confirm_intent(&intent.id, &card(CARD_DECLINED))
            .await
            .unwrap_err();

        let stored = gateway.get_intent(&intent.id).await.unwrap();
        assert_eq!(stored.status, IntentStatus::RequiresPaymentMethod);

        let confirmed = gateway
            .confirm_intent(&intent.id, &card("4242424242424242"))
            .await
            .unwrap();
        assert_eq!(confirmed.status, IntentStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_confirm_rejects_terminal_intent() {
        let gateway = SandboxGateway::default();
        let intent = created(&gateway).await;
        gateway
            .confirm_intent(&intent.id, &card("4242424242424242"))
            .await
            .unwrap();
        let err = gateway
            .confirm_intent(&intent.id, &card("4242424242424242"))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Validation(_)));
    }

    #[tokio::test]
    async fn test_cancel_non_terminal_then_terminal() {
        let gateway = SandboxGateway::default();
        let intent = created(&gateway).await;
        let canceled = gateway.cancel_intent(&intent.id).await.unwrap();
        assert_eq!(canceled.status, IntentStatus::Canceled);

        let err = gateway.cancel_intent(&intent.id).await.unwrap_err();
        assert!(matches!(err, PaymentError::Validation(_)));
    }

    #[tokio::test]
    async fn test_unknown_intent_is_validation_error() {
        let gateway = SandboxGateway::default();
        let err = gateway.get_intent("pi_missing").await.unwrap_err();
        assert!(matches!(err, PaymentError::Validation(_)));
    }
}
