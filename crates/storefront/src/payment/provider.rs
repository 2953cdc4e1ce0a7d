//! HTTPS binding to the real payment provider.
//!
//! Thin translation layer: requests are provider-shaped JSON, responses and
//! error bodies are mapped onto [`PaymentIntent`] and [`PaymentError`]. No
//! business rules live here.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::warn;

use driftwood_core::CurrencyCode;

use crate::config::PaymentConfig;

use super::{
    CardDetails, CardErrorCode, PaymentError, PaymentGateway, PaymentIntent, ShippingSnapshot,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Gateway backed by the provider's REST API.
#[derive(Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct CreateIntentBody<'a> {
    amount: i64,
    currency: &'a str,
    metadata: &'a BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    shipping: Option<&'a ShippingSnapshot>,
}

#[derive(Serialize)]
struct ConfirmBody<'a> {
    card_number: &'a str,
    card_expiry: &'a str,
    card_cvv: &'a str,
    cardholder_name: &'a str,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl HttpGateway {
    /// Build a gateway from config.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Validation`] when the secret key is missing
    /// or malformed, [`PaymentError::Api`] when the HTTP client fails to
    /// build.
    pub fn new(config: &PaymentConfig) -> Result<Self, PaymentError> {
        let secret = config.secret_key.as_ref().ok_or_else(|| {
            PaymentError::Validation("provider mode requires a secret key".to_owned())
        })?;
        let base_url = config.api_url.as_deref().ok_or_else(|| {
            PaymentError::Validation("provider mode requires an API URL".to_owned())
        })?;

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", secret.expose_secret());
        let mut auth = HeaderValue::from_str(&auth)
            .map_err(|e| PaymentError::Validation(format!("invalid secret key: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PaymentError::Api(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Turn a non-success response into the matching [`PaymentError`].
    async fn map_error(response: reqwest::Response) -> PaymentError {
        let status = response.status();
        let body = match response.json::<ErrorEnvelope>().await {
            Ok(envelope) => envelope.error,
            Err(e) => {
                warn!(%status, error = %e, "unparseable provider error body");
                return PaymentError::Api(format!("provider returned {status}"));
            }
        };
        let message = body.message.unwrap_or_else(|| status.to_string());
        match body.kind.as_str() {
            "card_error" => body
                .code
                .as_deref()
                .and_then(CardErrorCode::from_code)
                .map_or_else(
                    || PaymentError::Api(format!("unrecognized card error: {message}")),
                    PaymentError::Card,
                ),
            "validation_error" => PaymentError::Validation(message),
            _ => PaymentError::Api(message),
        }
    }

    async fn read_intent(response: reqwest::Response) -> Result<PaymentIntent, PaymentError> {
        if response.status() == StatusCode::OK || response.status() == StatusCode::CREATED {
            response
                .json::<PaymentIntent>()
                .await
                .map_err(|e| PaymentError::Api(format!("malformed intent body: {e}")))
        } else {
            Err(Self::map_error(response).await)
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
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
        let response = self
            .client
            .post(self.url("/v1/payment_intents"))
            .json(&CreateIntentBody {
                amount: amount_minor,
                currency: currency.code(),
                metadata: &metadata,
                shipping: shipping.as_ref(),
            })
            .send()
            .await
            .map_err(|e| PaymentError::Api(format!("create intent request failed: {e}")))?;
        Self::read_intent(response).await
    }

    async fn confirm_intent(
        &self,
        intent_id: &str,
        card: &CardDetails,
    ) -> Result<PaymentIntent, PaymentError> {
        let response = self
            .client
            .post(self.url(&format!("/v1/payment_intents/{intent_id}/confirm")))
            .json(&ConfirmBody {
                card_number: &card.normalized_number(),
                card_expiry: &card.expiry,
                card_cvv: &card.cvv,
                cardholder_name: &card.holder_name,
            })
            .send()
            .await
            .map_err(|e| PaymentError::Api(format!("confirm request failed: {e}")))?;
        Self::read_intent(response).await
    }

    async fn get_intent(&self, intent_id: &str) -> Result<PaymentIntent, PaymentError> {
        let response = self
            .client
            .get(self.url(&format!("/v1/payment_intents/{intent_id}")))
            .send()
            .await
            .map_err(|e| PaymentError::Api(format!("get intent request failed: {e}")))?;
        Self::read_intent(response).await
    }

    async fn cancel_intent(&self, intent_id: &str) -> Result<PaymentIntent, PaymentError> {
        let response = self
            .client
            .post(self.url(&format!("/v1/payment_intents/{intent_id}/cancel")))
            .send()
            .await
            .map_err(|e| PaymentError::Api(format!("cancel request failed: {e}")))?;
        Self::read_intent(response).await
    }
}
