//! Durable cart repository.
//!
//! One row per identity key; lines are stored as a JSONB document because the
//! cart is always read and written whole (last-writer-wins per identity).

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use crate::cart::{Cart, CartBackend, CartLine};

use super::RepositoryError;

/// Repository for durable cart rows.
#[derive(Clone)]
pub struct CartRepository {
    pool: PgPool,
}

impl CartRepository {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load the cart for an identity key.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored lines are invalid.
    pub async fn get(&self, identity_key: &str) -> Result<Option<Cart>, RepositoryError> {
        let row = sqlx::query(
            r"
            SELECT lines, updated_at
            FROM carts
            WHERE identity_key = $1
            ",
        )
        .bind(identity_key)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => {
                let lines_json: serde_json::Value = r.try_get("lines")?;
                let updated_at: DateTime<Utc> = r.try_get("updated_at")?;
                let lines: Vec<CartLine> = serde_json::from_value(lines_json).map_err(|e| {
                    RepositoryError::DataCorruption(format!("invalid cart lines in database: {e}"))
                })?;
                Ok(Some(Cart { lines, updated_at }))
            }
            None => Ok(None),
        }
    }

    /// Upsert the cart for an identity key.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the write fails.
    pub async fn upsert(&self, identity_key: &str, cart: &Cart) -> Result<(), RepositoryError> {
        let lines_json = serde_json::to_value(&cart.lines).map_err(|e| {
            RepositoryError::DataCorruption(format!("failed to serialize cart lines: {e}"))
        })?;

        sqlx::query(
            r"
            INSERT INTO carts (identity_key, lines, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (identity_key)
            DO UPDATE SET lines = EXCLUDED.lines, updated_at = EXCLUDED.updated_at
            ",
        )
        .bind(identity_key)
        .bind(lines_json)
        .bind(cart.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Delete the cart for an identity key.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&self, identity_key: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM carts WHERE identity_key = $1")
            .bind(identity_key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl CartBackend for CartRepository {
    async fn load(&self, key: &str) -> Result<Option<Cart>, RepositoryError> {
        self.get(key).await
    }

    async fn store(&self, key: &str, cart: &Cart) -> Result<(), RepositoryError> {
        self.upsert(key, cart).await
    }

    async fn remove(&self, key: &str) -> Result<(), RepositoryError> {
        self.delete(key).await
    }
}
