//! Durable order storage.
//!
//! Order headers and lines live in separate tables; the header's intent
//! reference carries a unique constraint, which is what makes order
//! placement idempotent under concurrent submission.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use driftwood_core::{
    CurrencyCode, Email, Money, OrderId, OrderLineId, OrderOwner, OrderStatus, PaymentStatus,
    ProductId, VariantId,
};

use crate::order::{NewOrder, NewOrderLine, Order, OrderAddresses, OrderLine, OrderStore};

use super::RepositoryError;

/// Postgres-backed order store.
#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    /// Create a new order store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn corrupt(what: &str, detail: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::DataCorruption(format!("invalid {what} in database: {detail}"))
}

fn order_from_row(row: &PgRow) -> Result<Order, RepositoryError> {
    let id: i64 = row.try_get("id")?;
    let identity_ref: String = row.try_get("identity_ref")?;
    let email: String = row.try_get("email")?;
    let status: String = row.try_get("status")?;
    let payment_status: String = row.try_get("payment_status")?;
    let subtotal: Decimal = row.try_get("subtotal")?;
    let tax: Decimal = row.try_get("tax")?;
    let total: Decimal = row.try_get("total")?;
    let currency: String = row.try_get("currency")?;
    let addresses: serde_json::Value = row.try_get("addresses")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;

    let currency = CurrencyCode::from_code(&currency)
        .ok_or_else(|| corrupt("currency", &currency))?;
    let owner = OrderOwner::parse_ref(&identity_ref)
        .ok_or_else(|| corrupt("identity_ref", &identity_ref))?;
    let addresses: OrderAddresses =
        serde_json::from_value(addresses).map_err(|e| corrupt("addresses", e))?;

    Ok(Order {
        id: OrderId::new(id),
        order_number: row.try_get("order_number")?,
        owner,
        email: Email::parse(&email).map_err(|e| corrupt("email", e))?,
        status: status.parse::<OrderStatus>().map_err(|e| corrupt("status", e))?,
        payment_status: payment_status
            .parse::<PaymentStatus>()
            .map_err(|e| corrupt("payment_status", e))?,
        subtotal: Money::new(subtotal, currency),
        tax: Money::new(tax, currency),
        total: Money::new(total, currency),
        addresses,
        intent_ref: row.try_get("intent_ref")?,
        created_at,
    })
}

fn line_from_row(row: &PgRow, currency: CurrencyCode) -> Result<OrderLine, RepositoryError> {
    let id: i64 = row.try_get("id")?;
    let order_id: i64 = row.try_get("order_id")?;
    let product_id: i64 = row.try_get("product_id")?;
    let variant_id: Option<i64> = row.try_get("variant_id")?;
    let quantity: i32 = row.try_get("quantity")?;
    let unit_price: Decimal = row.try_get("unit_price")?;
    let total_price: Decimal = row.try_get("total_price")?;

    Ok(OrderLine {
        id: OrderLineId::new(id),
        order_id: OrderId::new(order_id),
        product_id: ProductId::new(product_id),
        variant_id: variant_id.map(VariantId::new),
        name: row.try_get("name")?,
        quantity: u32::try_from(quantity).map_err(|e| corrupt("quantity", e))?,
        unit_price: Money::new(unit_price, currency),
        total_price: Money::new(total_price, currency),
    })
}

/// Map a unique-constraint violation onto `Conflict`.
fn map_insert_error(e: sqlx::Error) -> RepositoryError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepositoryError::Conflict(db.message().to_owned())
        }
        _ => RepositoryError::Database(e),
    }
}

#[async_trait::async_trait]
impl OrderStore for PgOrderStore {
    async fn find_by_intent(&self, intent_ref: &str) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query(
            r"
            SELECT id, order_number, identity_ref, email, status, payment_status,
                   subtotal, tax, total, currency, addresses, intent_ref, created_at
            FROM orders
            WHERE intent_ref = $1
            ",
        )
        .bind(intent_ref)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(order_from_row).transpose()
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        let addresses = serde_json::to_value(&order.addresses).map_err(|e| {
            RepositoryError::DataCorruption(format!("failed to serialize addresses: {e}"))
        })?;

        let row = sqlx::query(
            r"
            INSERT INTO orders (order_number, identity_ref, email, status, payment_status,
                                subtotal, tax, total, currency, addresses, intent_ref)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id, order_number, identity_ref, email, status, payment_status,
                      subtotal, tax, total, currency, addresses, intent_ref, created_at
            ",
        )
        .bind(&order.order_number)
        .bind(order.owner.as_ref_string())
        .bind(order.email.as_str())
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.subtotal.amount)
        .bind(order.tax.amount)
        .bind(order.total.amount)
        .bind(order.total.currency.code())
        .bind(addresses)
        .bind(&order.intent_ref)
        .fetch_one(&self.pool)
        .await
        .map_err(map_insert_error)?;

        order_from_row(&row)
    }

    async fn insert_lines(
        &self,
        order_id: OrderId,
        lines: &[NewOrderLine],
    ) -> Result<Vec<OrderLine>, RepositoryError> {
        let mut inserted = Vec::with_capacity(lines.len());
        let mut tx = self.pool.begin().await?;
        for line in lines {
            let row = sqlx::query(
                r"
                INSERT INTO order_lines (order_id, product_id, variant_id, name,
                                         quantity, unit_price, total_price)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id, order_id, product_id, variant_id, name,
                          quantity, unit_price, total_price
                ",
            )
            .bind(i64::from(order_id))
            .bind(i64::from(line.product_id))
            .bind(line.variant_id.map(i64::from))
            .bind(&line.name)
            .bind(i32::try_from(line.quantity).unwrap_or(i32::MAX))
            .bind(line.unit_price.amount)
            .bind(line.total_price.amount)
            .fetch_one(&mut *tx)
            .await?;
            inserted.push(line_from_row(&row, line.unit_price.currency)?);
        }
        tx.commit().await?;
        Ok(inserted)
    }

    async fn lines_for(&self, order_id: OrderId) -> Result<Vec<OrderLine>, RepositoryError> {
        let currency: Option<String> = sqlx::query_scalar(
            "SELECT currency FROM orders WHERE id = $1",
        )
        .bind(i64::from(order_id))
        .fetch_optional(&self.pool)
        .await?;
        let currency = currency
            .as_deref()
            .and_then(CurrencyCode::from_code)
            .ok_or(RepositoryError::NotFound)?;

        let rows = sqlx::query(
            r"
            SELECT id, order_id, product_id, variant_id, name,
                   quantity, unit_price, total_price
            FROM order_lines
            WHERE order_id = $1
            ORDER BY id
            ",
        )
        .bind(i64::from(order_id))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|row| line_from_row(row, currency)).collect()
    }

    async fn delete_order(&self, order_id: OrderId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM order_lines WHERE order_id = $1")
            .bind(i64::from(order_id))
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(i64::from(order_id))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}
