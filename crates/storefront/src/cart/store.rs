//! The two-tier cart store.
//!
//! Every mutation lands synchronously in the in-memory tier. Durable
//! persistence depends on the owner: anonymous carts get an opportunistic
//! background write (the cross-device fallback channel), authenticated carts
//! get a debounced write that coalesces bursts of mutations into one row
//! update and retries on failure. Because mutations are idempotent clamps,
//! persistence is last-writer-wins per identity key.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, instrument, warn};

use driftwood_core::{GuestToken, Identity, UserId};

use crate::config::CartConfig;
use crate::db::RepositoryError;

use super::backend::CartBackend;
use super::merge::merge_carts;
use super::{Cart, CartLine, LineKey};

/// Durable write attempts before giving up on a debounced flush.
const WRITE_ATTEMPTS: u32 = 3;

/// Fixed delay between durable write retries.
const WRITE_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Merge attempts on sign-in before degrading to the unmerged guest cart.
const MERGE_ATTEMPTS: u32 = 3;

/// Fixed delay between merge attempts.
const MERGE_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Cart store selecting between the local and durable tiers by owner type.
///
/// Cheaply cloneable; all clones share the same tiers and debounce state.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<CartStoreInner>,
}

struct CartStoreInner {
    local: Arc<dyn CartBackend>,
    durable: Arc<dyn CartBackend>,
    debounce: Duration,
    /// Monotonic generation per identity key; a scheduled write only fires
    /// if its generation is still current when the window elapses.
    pending: Mutex<HashMap<String, u64>>,
}

impl CartStore {
    /// Create a cart store over the given tiers.
    #[must_use]
    pub fn new(
        local: Arc<dyn CartBackend>,
        durable: Arc<dyn CartBackend>,
        config: CartConfig,
    ) -> Self {
        Self {
            inner: Arc::new(CartStoreInner {
                local,
                durable,
                debounce: Duration::from_millis(config.debounce_ms),
                pending: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Load the current cart for an identity.
    ///
    /// The local tier is read first: durable writes are debounced, so between
    /// flushes the freshest state lives in memory. The durable tier is the
    /// fallback after a process restart or a write from another device.
    #[instrument(skip(self), fields(identity = %identity))]
    pub async fn load(&self, identity: &Identity) -> Cart {
        let key = identity.storage_key();

        if let Ok(Some(cart)) = self.inner.local.load(&key).await {
            return cart;
        }

        match self.inner.durable.load(&key).await {
            Ok(Some(cart)) => {
                let _ = self.inner.local.store(&key, &cart).await;
                cart
            }
            Ok(None) => Cart::empty(),
            Err(e) => {
                warn!("durable cart read failed, starting from empty: {e}");
                Cart::empty()
            }
        }
    }

    /// Add a line (or increase an existing line's quantity).
    pub async fn add_line(&self, identity: &Identity, line: CartLine, quantity: u32) -> Cart {
        self.mutate(identity, |cart| cart.add_line(line, quantity))
            .await
    }

    /// Set a line's quantity; zero removes the line.
    pub async fn set_quantity(&self, identity: &Identity, key: LineKey, quantity: u32) -> Cart {
        self.mutate(identity, |cart| cart.set_quantity(key, quantity))
            .await
    }

    /// Remove a line if present.
    pub async fn remove_line(&self, identity: &Identity, key: LineKey) -> Cart {
        self.mutate(identity, |cart| cart.remove_line(key)).await
    }

    /// Empty the cart.
    pub async fn clear(&self, identity: &Identity) -> Cart {
        self.mutate(identity, Cart::clear).await
    }

    /// Apply a mutation and persist per the owner's tier rules.
    async fn mutate(&self, identity: &Identity, apply: impl FnOnce(&mut Cart)) -> Cart {
        let key = identity.storage_key();
        let mut cart = self.load(identity).await;
        apply(&mut cart);

        // The local tier is the synchronous source of truth for the mutation;
        // it cannot fail, so the mutation is never lost.
        let _ = self.inner.local.store(&key, &cart).await;

        if identity.is_guest() {
            self.spawn_opportunistic_write(key);
        } else {
            self.schedule_debounced_write(key);
        }

        cart
    }

    /// Write the identity's cart to the durable tier immediately, cancelling
    /// any pending debounced write.
    ///
    /// Called on navigation-away so the final state is durable without
    /// waiting out the debounce window.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the durable write fails; the local tier
    /// still holds the state.
    #[instrument(skip(self), fields(identity = %identity))]
    pub async fn flush(&self, identity: &Identity) -> Result<(), RepositoryError> {
        let key = identity.storage_key();
        self.bump_generation(&key);

        let Ok(Some(cart)) = self.inner.local.load(&key).await else {
            return Ok(());
        };
        self.inner.durable.store(&key, &cart).await
    }

    /// Merge the anonymous cart into the authenticated identity's durable
    /// cart. Runs exactly once, at sign-in.
    ///
    /// Retried up to three times with a fixed delay on transient persistence
    /// failure. On exhaustion the guest cart is returned unmerged (and kept
    /// in the local tier under the user's key) so nothing is lost; the
    /// durable identity cart remains whatever it already was.
    #[instrument(skip(self), fields(user = %user_id))]
    pub async fn merge_on_sign_in(&self, guest: &GuestToken, user_id: UserId) -> Cart {
        let guest_key = Identity::guest(guest.clone()).storage_key();
        let user_key = Identity::user(user_id).storage_key();

        let guest_cart = match self.inner.local.load(&guest_key).await {
            Ok(Some(cart)) => Some(cart),
            _ => self.inner.durable.load(&guest_key).await.ok().flatten(),
        };

        let Some(guest_cart) = guest_cart else {
            // Nothing anonymous to merge; serve the identity cart as-is.
            return self.load(&Identity::user(user_id)).await;
        };

        for attempt in 1..=MERGE_ATTEMPTS {
            match self.try_merge(&guest_key, &user_key, &guest_cart).await {
                Ok(merged) => return merged,
                Err(e) => {
                    warn!("cart merge attempt {attempt}/{MERGE_ATTEMPTS} failed: {e}");
                    if attempt < MERGE_ATTEMPTS {
                        tokio::time::sleep(MERGE_RETRY_DELAY).await;
                    }
                }
            }
        }

        // Degraded path: guest cart wins locally, durable state untouched.
        warn!("cart merge exhausted retries; continuing with unmerged guest cart");
        let _ = self.inner.local.store(&user_key, &guest_cart).await;
        guest_cart
    }

    /// One read-modify-write merge attempt against the durable tier.
    async fn try_merge(
        &self,
        guest_key: &str,
        user_key: &str,
        guest_cart: &Cart,
    ) -> Result<Cart, RepositoryError> {
        let identity_cart = self
            .inner
            .durable
            .load(user_key)
            .await?
            .unwrap_or_default();
        let merged = merge_carts(&identity_cart, guest_cart);
        self.inner.durable.store(user_key, &merged).await?;

        // Discard the anonymous cache; best-effort for the durable copy.
        let _ = self.inner.local.remove(guest_key).await;
        if let Err(e) = self.inner.durable.remove(guest_key).await {
            debug!("failed to remove durable guest cart after merge: {e}");
        }
        let _ = self.inner.local.store(user_key, &merged).await;

        Ok(merged)
    }

    /// Fire-and-forget durable write for anonymous carts.
    fn spawn_opportunistic_write(&self, key: String) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let Ok(Some(cart)) = inner.local.load(&key).await else {
                return;
            };
            if let Err(e) = inner.durable.store(&key, &cart).await {
                debug!("opportunistic guest cart write failed: {e}");
            }
        });
    }

    /// Schedule a durable write after the debounce window; a newer mutation
    /// within the window supersedes it.
    fn schedule_debounced_write(&self, key: String) {
        let generation = self.bump_generation(&key);
        let inner = Arc::clone(&self.inner);

        tokio::spawn(async move {
            tokio::time::sleep(inner.debounce).await;

            if inner.pending.lock().map_or(true, |pending| {
                pending.get(&key).copied() != Some(generation)
            }) {
                // Superseded by a later mutation or a flush.
                return;
            }

            let Ok(Some(cart)) = inner.local.load(&key).await else {
                return;
            };

            for attempt in 1..=WRITE_ATTEMPTS {
                match inner.durable.store(&key, &cart).await {
                    Ok(()) => return,
                    Err(e) => {
                        warn!(
                            "debounced cart write attempt {attempt}/{WRITE_ATTEMPTS} failed: {e}"
                        );
                        if attempt < WRITE_ATTEMPTS {
                            tokio::time::sleep(WRITE_RETRY_DELAY).await;
                        }
                    }
                }
            }
            // The local tier still holds the state; the next mutation or
            // flush will try again.
        });
    }

    fn bump_generation(&self, key: &str) -> u64 {
        self.inner.pending.lock().map_or(0, |mut pending| {
            let slot = pending.entry(key.to_owned()).or_insert(0);
            *slot += 1;
            *slot
        })
    }
}
