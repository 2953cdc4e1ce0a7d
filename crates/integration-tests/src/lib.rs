//! In-process test harness for the Driftwood engine.
//!
//! Wires the storefront's real components - cart store, checkout machine,
//! sandbox gateway, order workflow - against in-memory backends, so the
//! tests in `tests/` exercise whole flows without Postgres or a network.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use driftwood_core::{CurrencyCode, OrderId, OrderLineId};
use driftwood_storefront::cart::{CartStore, MemoryCartBackend};
use driftwood_storefront::config::CartConfig;
use driftwood_storefront::db::RepositoryError;
use driftwood_storefront::order::{
    NewOrder, NewOrderLine, Order, OrderLine, OrderStore, OrderWorkflow,
};
use driftwood_storefront::payment::{
    CardDetails, PaymentError, PaymentGateway, PaymentIntent, SandboxGateway, ShippingSnapshot,
};
use driftwood_storefront::services::ConfirmationNotifier;

/// In-memory [`OrderStore`] with optional line-insert failure injection.
#[derive(Default)]
pub struct MemoryOrderStore {
    state: Mutex<MemoryOrderState>,
    /// Remaining `insert_lines` calls that will fail.
    line_failures: AtomicU32,
    /// Total `insert_order` calls observed.
    insert_calls: AtomicU32,
}

#[derive(Default)]
struct MemoryOrderState {
    orders: Vec<Order>,
    lines: HashMap<i64, Vec<OrderLine>>,
    next_id: i64,
    next_line_id: i64,
}

impl MemoryOrderStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` calls to `insert_lines` fail.
    pub fn fail_next_line_inserts(&self, count: u32) {
        self.line_failures.store(count, Ordering::SeqCst);
    }

    /// How many order headers were inserted.
    #[must_use]
    pub fn insert_count(&self) -> u32 {
        self.insert_calls.load(Ordering::SeqCst)
    }

    /// How many orders currently exist.
    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn find_by_intent(&self, intent_ref: &str) -> Result<Option<Order>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .iter()
            .find(|o| o.intent_ref == intent_ref)
            .cloned())
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().await;
        if state.orders.iter().any(|o| o.intent_ref == order.intent_ref) {
            return Err(RepositoryError::Conflict(format!(
                "duplicate intent_ref {}",
                order.intent_ref
            )));
        }
        state.next_id += 1;
        let order = Order {
            id: OrderId::new(state.next_id),
            order_number: order.order_number,
            owner: order.owner,
            email: order.email,
            status: order.status,
            payment_status: order.payment_status,
            subtotal: order.subtotal,
            tax: order.tax,
            total: order.total,
            addresses: order.addresses,
            intent_ref: order.intent_ref,
            created_at: Utc::now(),
        };
        state.orders.push(order.clone());
        Ok(order)
    }

    async fn insert_lines(
        &self,
        order_id: OrderId,
        lines: &[NewOrderLine],
    ) -> Result<Vec<OrderLine>, RepositoryError> {
        let injected = self
            .line_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(RepositoryError::DataCorruption(
                "injected line insert failure".to_owned(),
            ));
        }

        let mut state = self.state.lock().await;
        let mut inserted = Vec::with_capacity(lines.len());
        for line in lines {
            state.next_line_id += 1;
            inserted.push(OrderLine {
                id: OrderLineId::new(state.next_line_id),
                order_id,
                product_id: line.product_id,
                variant_id: line.variant_id,
                name: line.name.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                total_price: line.total_price,
            });
        }
        state
            .lines
            .entry(i64::from(order_id))
            .or_default()
            .extend(inserted.iter().cloned());
        Ok(inserted)
    }

    async fn lines_for(&self, order_id: OrderId) -> Result<Vec<OrderLine>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .lines
            .get(&i64::from(order_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_order(&self, order_id: OrderId) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        state.orders.retain(|o| o.id != order_id);
        state.lines.remove(&i64::from(order_id));
        Ok(())
    }
}

/// Sandbox wrapper that counts confirmation attempts.
///
/// Lets tests assert how many times checkout actually reached the gateway,
/// not just what it returned.
#[derive(Default)]
pub struct CountingGateway {
    inner: SandboxGateway,
    confirms: AtomicU32,
}

impl CountingGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total `confirm_intent` calls observed.
    #[must_use]
    pub fn confirm_calls(&self) -> u32 {
        self.confirms.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for CountingGateway {
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: CurrencyCode,
        metadata: BTreeMap<String, String>,
        shipping: Option<ShippingSnapshot>,
    ) -> Result<PaymentIntent, PaymentError> {
        self.inner
            .create_intent(amount_minor, currency, metadata, shipping)
            .await
    }

    async fn confirm_intent(
        &self,
        intent_id: &str,
        card: &CardDetails,
    ) -> Result<PaymentIntent, PaymentError> {
        self.confirms.fetch_add(1, Ordering::SeqCst);
        self.inner.confirm_intent(intent_id, card).await
    }

    async fn get_intent(&self, intent_id: &str) -> Result<PaymentIntent, PaymentError> {
        self.inner.get_intent(intent_id).await
    }

    async fn cancel_intent(&self, intent_id: &str) -> Result<PaymentIntent, PaymentError> {
        self.inner.cancel_intent(intent_id).await
    }
}

/// Fully wired engine over in-memory backends.
pub struct TestEngine {
    pub carts: CartStore,
    pub gateway: Arc<SandboxGateway>,
    pub store: Arc<MemoryOrderStore>,
    pub workflow: OrderWorkflow,
}

impl TestEngine {
    /// Build an engine with an 8.75% tax rate and no write debounce.
    #[must_use]
    pub fn new() -> Self {
        let carts = CartStore::new(
            Arc::new(MemoryCartBackend::new()),
            Arc::new(MemoryCartBackend::new()),
            CartConfig { debounce_ms: 0 },
        );
        let gateway = Arc::new(SandboxGateway::new(Duration::ZERO));
        let store = Arc::new(MemoryOrderStore::new());
        let workflow = OrderWorkflow::new(
            Arc::clone(&store) as Arc<dyn OrderStore>,
            Arc::clone(&gateway) as Arc<dyn PaymentGateway>,
            carts.clone(),
            ConfirmationNotifier::new(None),
            Decimal::new(875, 4),
        );
        Self {
            carts,
            gateway,
            store,
            workflow,
        }
    }
}

impl Default for TestEngine {
    fn default() -> Self {
        Self::new()
    }
}
