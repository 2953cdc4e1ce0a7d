//! Order creation workflow.
//!
//! Turns a successful payment into a durable order record. The workflow is
//! idempotent on the payment intent reference: submitting the same intent
//! twice, whether from a double click or a concurrent request, yields the
//! one order that was created first. A failure while writing order lines
//! compensates by deleting the order header, so no half-written order is
//! ever visible.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use driftwood_core::{
    Email, Identity, IntentStatus, Money, OrderId, OrderLineId, OrderOwner, OrderStatus,
    PaymentStatus, ProductId, VariantId,
};

use crate::cart::{Cart, CartStore};
use crate::checkout::{BillingInfo, CheckoutState, ShippingInfo};
use crate::db::RepositoryError;
use crate::payment::{PaymentError, PaymentGateway};
use crate::services::ConfirmationNotifier;

// ============================================================================
// Types
// ============================================================================

/// A postal address snapshot frozen into the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAddress {
    pub name: String,
    pub address1: String,
    pub address2: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

impl OrderAddress {
    fn from_shipping(shipping: &ShippingInfo) -> Self {
        Self {
            name: format!("{} {}", shipping.first_name, shipping.last_name),
            address1: shipping.address1.clone(),
            address2: shipping.address2.clone(),
            city: shipping.city.clone(),
            state: shipping.state.clone(),
            postal_code: shipping.postal_code.clone(),
            country: shipping.country.clone(),
        }
    }

    fn from_billing(shipping: &ShippingInfo, billing: &BillingInfo) -> Self {
        if billing.same_as_shipping {
            Self::from_shipping(shipping)
        } else {
            Self {
                name: format!("{} {}", shipping.first_name, shipping.last_name),
                address1: billing.address1.clone(),
                address2: billing.address2.clone(),
                city: billing.city.clone(),
                state: billing.state.clone(),
                postal_code: billing.postal_code.clone(),
                country: billing.country.clone(),
            }
        }
    }
}

/// Shipping and billing snapshots, persisted as one JSON document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAddresses {
    pub shipping: OrderAddress,
    pub billing: OrderAddress,
    pub phone: String,
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Human-facing unique reference, e.g. `DW-20260829-X7K2QP`.
    pub order_number: String,
    pub owner: OrderOwner,
    pub email: Email,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
    pub addresses: OrderAddresses,
    /// Payment intent reference; unique, the idempotence key.
    pub intent_ref: String,
    pub created_at: DateTime<Utc>,
}

/// An order header ready to insert.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: String,
    pub owner: OrderOwner,
    pub email: Email,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
    pub addresses: OrderAddresses,
    pub intent_ref: String,
}

/// One purchased line, frozen from the cart at placement time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: OrderLineId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub total_price: Money,
}

/// An order line ready to insert.
#[derive(Debug, Clone)]
pub struct NewOrderLine {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub total_price: Money,
}

// ============================================================================
// Store seam
// ============================================================================

/// Persistence seam for orders.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Look up an order by its payment intent reference.
    async fn find_by_intent(&self, intent_ref: &str) -> Result<Option<Order>, RepositoryError>;

    /// Insert an order header.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::Conflict`] when an order with the same intent
    /// reference or order number already exists.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, RepositoryError>;

    /// Insert the lines of an order.
    async fn insert_lines(
        &self,
        order_id: OrderId,
        lines: &[NewOrderLine],
    ) -> Result<Vec<OrderLine>, RepositoryError>;

    /// Fetch the lines of an order.
    async fn lines_for(&self, order_id: OrderId) -> Result<Vec<OrderLine>, RepositoryError>;

    /// Delete an order header and any lines already written.
    async fn delete_order(&self, order_id: OrderId) -> Result<(), RepositoryError>;
}

// ============================================================================
// Workflow
// ============================================================================

/// Errors the placement workflow can surface.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The intent has not succeeded; nothing was written.
    #[error("payment intent {intent_ref} is {status}, not succeeded")]
    PaymentIncomplete {
        intent_ref: String,
        status: IntentStatus,
    },

    /// The cart was empty at submission time.
    #[error("cannot place an order from an empty cart")]
    EmptyCart,

    /// The gateway failed while verifying the intent.
    #[error(transparent)]
    Payment(#[from] PaymentError),

    /// Persistence failed; any partial write was compensated.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Orchestrates verification, persistence, compensation, and follow-up.
#[derive(Clone)]
pub struct OrderWorkflow {
    inner: Arc<OrderWorkflowInner>,
}

struct OrderWorkflowInner {
    store: Arc<dyn OrderStore>,
    gateway: Arc<dyn PaymentGateway>,
    carts: CartStore,
    notifier: ConfirmationNotifier,
    tax_rate: Decimal,
}

impl OrderWorkflow {
    #[must_use]
    pub fn new(
        store: Arc<dyn OrderStore>,
        gateway: Arc<dyn PaymentGateway>,
        carts: CartStore,
        notifier: ConfirmationNotifier,
        tax_rate: Decimal,
    ) -> Self {
        Self {
            inner: Arc::new(OrderWorkflowInner {
                store,
                gateway,
                carts,
                notifier,
                tax_rate,
            }),
        }
    }

    /// Place an order for a succeeded payment intent.
    ///
    /// Verifies the intent, then inserts the order header and lines. If the
    /// same intent was already turned into an order, that order is returned
    /// unchanged. On success the cart is cleared and a confirmation
    /// notification is dispatched without blocking the response.
    ///
    /// # Errors
    ///
    /// [`OrderError::PaymentIncomplete`] when the intent has not succeeded,
    /// [`OrderError::EmptyCart`] for an empty cart, and persistence or
    /// gateway failures otherwise.
    pub async fn place_order(
        &self,
        identity: &Identity,
        cart: &Cart,
        checkout: &CheckoutState,
        intent_ref: &str,
    ) -> Result<Order, OrderError> {
        let intent = self.inner.gateway.get_intent(intent_ref).await?;
        if intent.status != IntentStatus::Succeeded {
            return Err(OrderError::PaymentIncomplete {
                intent_ref: intent_ref.to_owned(),
                status: intent.status,
            });
        }

        // Idempotence: the intent reference is unique, so a duplicate
        // submission finds the order the first submission created.
        if let Some(existing) = self.inner.store.find_by_intent(intent_ref).await? {
            info!(order_number = %existing.order_number, "duplicate submission, returning existing order");
            return Ok(existing);
        }

        if cart.is_empty() {
            return Err(OrderError::EmptyCart);
        }

        let email = Email::parse(checkout.shipping.email.trim()).map_err(|e| {
            RepositoryError::DataCorruption(format!("checkout email failed validation: {e}"))
        })?;
        let owner = match identity {
            Identity::User { id } => OrderOwner::User { id: *id },
            Identity::Guest { .. } => OrderOwner::Guest {
                email: email.clone(),
            },
        };

        let subtotal = cart.total_amount();
        let tax = Money::new(
            (subtotal.amount * self.inner.tax_rate).round_dp(2),
            subtotal.currency,
        );
        let total = subtotal
            .checked_add(&tax)
            .map_err(|e| RepositoryError::DataCorruption(format!("order total overflow: {e}")))?;

        let new_order = NewOrder {
            order_number: generate_order_number(),
            owner,
            email,
            status: OrderStatus::Confirmed,
            payment_status: PaymentStatus::Completed,
            subtotal,
            tax,
            total,
            addresses: OrderAddresses {
                shipping: OrderAddress::from_shipping(&checkout.shipping),
                billing: OrderAddress::from_billing(&checkout.shipping, &checkout.billing),
                phone: checkout.shipping.phone.clone(),
            },
            intent_ref: intent_ref.to_owned(),
        };

        let order = match self.inner.store.insert_order(new_order).await {
            Ok(order) => order,
            // Lost the race: another request inserted this intent's order
            // between our lookup and our insert.
            Err(RepositoryError::Conflict(_)) => {
                return self
                    .inner
                    .store
                    .find_by_intent(intent_ref)
                    .await?
                    .ok_or_else(|| {
                        RepositoryError::DataCorruption(format!(
                            "conflict on intent {intent_ref} but no order found"
                        ))
                        .into()
                    });
            }
            Err(e) => return Err(e.into()),
        };

        let lines: Vec<NewOrderLine> = cart
            .lines
            .iter()
            .map(|line| NewOrderLine {
                product_id: line.product_id,
                variant_id: line.variant_id,
                name: line.display.name.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                total_price: line.unit_price.times(line.quantity),
            })
            .collect();

        if let Err(e) = self.inner.store.insert_lines(order.id, &lines).await {
            error!(order_number = %order.order_number, error = %e, "line insert failed, deleting order header");
            if let Err(cleanup) = self.inner.store.delete_order(order.id).await {
                // The header stays behind; flag it loudly rather than hide it.
                error!(order_number = %order.order_number, error = %cleanup, "compensating delete failed");
            }
            return Err(e.into());
        }

        info!(order_number = %order.order_number, total = %order.total, "order placed");

        let cleared = self.inner.carts.clear(identity).await;
        debug_assert!(cleared.is_empty());
        if let Err(e) = self.inner.carts.flush(identity).await {
            warn!(error = %e, "failed to flush cleared cart");
        }

        self.inner.notifier.send_confirmation(&order);
        Ok(order)
    }

    /// Fetch the lines of a placed order.
    ///
    /// # Errors
    ///
    /// Propagates repository failures.
    pub async fn lines_for(&self, order_id: OrderId) -> Result<Vec<OrderLine>, RepositoryError> {
        self.inner.store.lines_for(order_id).await
    }
}

/// Generate a human-facing order number: `DW-<date>-<6 random chars>`.
///
/// Uniqueness is ultimately enforced by the database constraint; the random
/// suffix makes collisions vanishingly rare in the first place.
#[must_use]
pub fn generate_order_number() -> String {
    const SUFFIX_CHARS: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
    let mut rng = rand::rng();
    let suffix: String = (0..6)
        .map(|_| {
            let idx = rng.random_range(0..SUFFIX_CHARS.len());
            char::from(SUFFIX_CHARS[idx])
        })
        .collect();
    format!("DW-{}-{suffix}", Utc::now().format("%Y%m%d"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_number_shape() {
        let number = generate_order_number();
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "DW");
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), 6);
        assert_ne!(generate_order_number(), number);
    }

    #[test]
    fn test_billing_address_resolves_same_as_shipping() {
        let shipping = ShippingInfo {
            first_name: "Ada".to_owned(),
            last_name: "Lovelace".to_owned(),
            address1: "1 Analytical Way".to_owned(),
            city: "London".to_owned(),
            ..ShippingInfo::default()
        };
        let billing = BillingInfo {
            same_as_shipping: true,
            address1: "ignored".to_owned(),
            ..BillingInfo::default()
        };
        let resolved = OrderAddress::from_billing(&shipping, &billing);
        assert_eq!(resolved.address1, "1 Analytical Way");
        assert_eq!(resolved.name, "Ada Lovelace");

        let own = BillingInfo {
            same_as_shipping: false,
            address1: "2 Billing St".to_owned(),
            ..BillingInfo::default()
        };
        assert_eq!(
            OrderAddress::from_billing(&shipping, &own).address1,
            "2 Billing St"
        );
    }
}
