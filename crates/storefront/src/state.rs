//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use crate::cart::{CartStore, MemoryCartBackend};
use crate::config::{GatewayMode, StorefrontConfig};
use crate::db::{CartRepository, PgOrderStore};
use crate::order::OrderWorkflow;
use crate::payment::{HttpGateway, PaymentError, PaymentGateway, SandboxGateway};
use crate::services::{Catalog, ConfirmationNotifier, FixtureCatalog, HttpCatalog};

/// Error assembling the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("payment gateway configuration: {0}")]
    Gateway(#[from] PaymentError),
    #[error("catalog configuration: {0}")]
    Catalog(#[from] crate::services::CatalogError),
}

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    carts: CartStore,
    gateway: Arc<dyn PaymentGateway>,
    catalog: Arc<dyn Catalog>,
    orders: OrderWorkflow,
}

impl AppState {
    /// Assemble the application state from configuration.
    ///
    /// The payment gateway and catalog implementations are chosen here:
    /// sandbox and fixture when no provider is configured, HTTP bindings
    /// otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error when a configured provider client cannot be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let gateway: Arc<dyn PaymentGateway> = match config.payment.mode {
            GatewayMode::Sandbox => Arc::new(SandboxGateway::new(Duration::from_millis(
                config.payment.sandbox_confirm_delay_ms,
            ))),
            GatewayMode::Provider => Arc::new(HttpGateway::new(&config.payment)?),
        };

        let catalog: Arc<dyn Catalog> = match &config.catalog_api_url {
            Some(url) => Arc::new(HttpCatalog::new(url)?),
            None => Arc::new(FixtureCatalog::demo()),
        };

        let carts = CartStore::new(
            Arc::new(MemoryCartBackend::new()),
            Arc::new(CartRepository::new(pool.clone())),
            config.cart,
        );

        let notifier = ConfirmationNotifier::new(config.order_webhook_url.clone());
        let orders = OrderWorkflow::new(
            Arc::new(PgOrderStore::new(pool.clone())),
            Arc::clone(&gateway),
            carts.clone(),
            notifier,
            config.tax_rate,
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                carts,
                gateway,
                catalog,
                orders,
            }),
        })
    }

    /// Storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Two-tier cart store.
    #[must_use]
    pub fn carts(&self) -> &CartStore {
        &self.inner.carts
    }

    /// Payment gateway.
    #[must_use]
    pub fn gateway(&self) -> &Arc<dyn PaymentGateway> {
        &self.inner.gateway
    }

    /// Product catalog.
    #[must_use]
    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.inner.catalog
    }

    /// Order placement workflow.
    #[must_use]
    pub fn orders(&self) -> &OrderWorkflow {
        &self.inner.orders
    }
}
