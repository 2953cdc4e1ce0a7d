//! Key-value backends for cart persistence.
//!
//! Two tiers hang behind one interface: a moka-backed in-memory tier scoped
//! to the running process, and a durable Postgres tier
//! ([`crate::db::CartRepository`]). The [`CartStore`](super::CartStore)
//! selects between them by the current owner type.

use async_trait::async_trait;
use moka::future::Cache;

use crate::db::RepositoryError;

use super::Cart;

/// Default capacity of the in-memory cart tier.
const LOCAL_CACHE_CAPACITY: u64 = 10_000;

/// A key-value store holding one cart per identity key.
#[async_trait]
pub trait CartBackend: Send + Sync {
    /// Load the cart stored under `key`, if any.
    async fn load(&self, key: &str) -> Result<Option<Cart>, RepositoryError>;

    /// Store `cart` under `key`, replacing any previous value.
    async fn store(&self, key: &str, cart: &Cart) -> Result<(), RepositoryError>;

    /// Remove the cart stored under `key`; no-op if absent.
    async fn remove(&self, key: &str) -> Result<(), RepositoryError>;
}

/// In-memory cart tier backed by a moka cache.
///
/// Writes are synchronous and infallible, which is what makes this tier a
/// safe fallback path when the durable tier is unavailable.
#[derive(Clone)]
pub struct MemoryCartBackend {
    cache: Cache<String, Cart>,
}

impl MemoryCartBackend {
    /// Create an empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: Cache::builder().max_capacity(LOCAL_CACHE_CAPACITY).build(),
        }
    }
}

impl Default for MemoryCartBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CartBackend for MemoryCartBackend {
    async fn load(&self, key: &str) -> Result<Option<Cart>, RepositoryError> {
        Ok(self.cache.get(key).await)
    }

    async fn store(&self, key: &str, cart: &Cart) -> Result<(), RepositoryError> {
        self.cache.insert(key.to_owned(), cart.clone()).await;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), RepositoryError> {
        self.cache.invalidate(key).await;
        Ok(())
    }
}
