//! Cart route handlers.
//!
//! Quantity rules live in the cart domain type; handlers only resolve the
//! catalog snapshot and report the resulting cart. Add and update never
//! fail on stock: quantities are clamped silently.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use driftwood_core::{ProductId, VariantId};

use crate::cart::Cart;
use crate::error::{AppError, Result};
use crate::middleware::CurrentIdentity;
use crate::state::AppState;

/// One line as reported to the client.
#[derive(Debug, Serialize)]
pub struct CartLineView {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub name: String,
    pub quantity: u32,
    pub unit_price: String,
    pub line_total: String,
    pub image_url: Option<String>,
}

/// The cart as reported to the client.
#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<CartLineView>,
    pub item_count: u32,
    pub subtotal: String,
    pub currency: &'static str,
}

impl CartView {
    pub(crate) fn from_cart(cart: &Cart) -> Self {
        let subtotal = cart.total_amount();
        Self {
            items: cart
                .lines
                .iter()
                .map(|line| CartLineView {
                    product_id: line.product_id,
                    variant_id: line.variant_id,
                    name: line.display.name.clone(),
                    quantity: line.quantity,
                    unit_price: line.unit_price.to_string(),
                    line_total: line.total_price().to_string(),
                    image_url: line.display.image_url.clone(),
                })
                .collect(),
            item_count: cart.item_count(),
            subtotal: subtotal.to_string(),
            currency: subtotal.currency.code(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddPayload {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

const fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct UpdatePayload {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct RemovePayload {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
}

/// GET /cart - the current cart.
#[instrument(skip(state, identity))]
pub async fn show(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Json<CartView> {
    let cart = state.carts().load(&identity).await;
    Json(CartView::from_cart(&cart))
}

/// POST /cart/add - add a product to the cart.
#[instrument(skip(state, identity), fields(product_id = %payload.product_id))]
pub async fn add(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Json(payload): Json<AddPayload>,
) -> Result<Json<CartView>> {
    let item = state
        .catalog()
        .lookup(payload.product_id, payload.variant_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {}", payload.product_id)))?;

    let cart = state
        .carts()
        .add_line(&identity, item.to_cart_line(0), payload.quantity)
        .await;
    Ok(Json(CartView::from_cart(&cart)))
}

/// POST /cart/update - set a line's quantity; 0 removes it.
#[instrument(skip(state, identity), fields(product_id = %payload.product_id))]
pub async fn update(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Json(payload): Json<UpdatePayload>,
) -> Json<CartView> {
    let cart = state
        .carts()
        .set_quantity(
            &identity,
            (payload.product_id, payload.variant_id),
            payload.quantity,
        )
        .await;
    Json(CartView::from_cart(&cart))
}

/// POST /cart/remove - remove a line.
#[instrument(skip(state, identity), fields(product_id = %payload.product_id))]
pub async fn remove(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Json(payload): Json<RemovePayload>,
) -> Json<CartView> {
    let cart = state
        .carts()
        .remove_line(&identity, (payload.product_id, payload.variant_id))
        .await;
    Json(CartView::from_cart(&cart))
}

/// POST /cart/clear - empty the cart.
#[instrument(skip(state, identity))]
pub async fn clear(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Json<CartView> {
    let cart = state.carts().clear(&identity).await;
    Json(CartView::from_cart(&cart))
}

/// POST /cart/flush - write the cart through to durable storage now.
///
/// Clients beacon this on navigation-away so the debounce window cannot
/// drop a trailing mutation.
#[instrument(skip(state, identity))]
pub async fn flush(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Result<StatusCode> {
    state.carts().flush(&identity).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Item count as reported to the client.
#[derive(Debug, Serialize)]
pub struct CartCountView {
    pub item_count: u32,
}

/// GET /cart/count - total item count for the header badge.
#[instrument(skip(state, identity))]
pub async fn count(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Json<CartCountView> {
    let cart = state.carts().load(&identity).await;
    Json(CartCountView {
        item_count: cart.item_count(),
    })
}
