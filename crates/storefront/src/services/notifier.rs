//! Order confirmation notifications.
//!
//! Confirmation delivery is strictly fire-and-forget: the order is already
//! durable when the notification is dispatched, and a delivery failure is
//! logged but never surfaces to the shopper.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::order::Order;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts order confirmations to a webhook, typically an email service.
#[derive(Clone)]
pub struct ConfirmationNotifier {
    client: reqwest::Client,
    webhook_url: Option<String>,
}

#[derive(Serialize)]
struct ConfirmationPayload {
    event: &'static str,
    order_number: String,
    email: String,
    total: String,
    currency: &'static str,
}

impl ConfirmationNotifier {
    /// Build a notifier; `None` disables delivery (development default).
    #[must_use]
    pub fn new(webhook_url: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            webhook_url,
        }
    }

    /// Dispatch a confirmation for `order` on a background task.
    pub fn send_confirmation(&self, order: &Order) {
        let Some(url) = self.webhook_url.clone() else {
            debug!(order_number = %order.order_number, "no webhook configured, skipping confirmation");
            return;
        };
        let client = self.client.clone();
        let payload = ConfirmationPayload {
            event: "order.confirmed",
            order_number: order.order_number.clone(),
            email: order.email.as_str().to_owned(),
            total: order.total.amount.to_string(),
            currency: order.total.currency.code(),
        };
        let order_number = order.order_number.clone();
        tokio::spawn(async move {
            match client.post(&url).json(&payload).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(%order_number, "confirmation dispatched");
                }
                Ok(response) => {
                    warn!(%order_number, status = %response.status(), "confirmation webhook rejected");
                }
                Err(e) => {
                    warn!(%order_number, error = %e, "confirmation webhook unreachable");
                }
            }
        });
    }
}
