//! HTTP route handlers for the storefront engine.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Health check
//!
//! # Cart
//! GET  /cart                   - Current cart
//! POST /cart/add               - Add a product (quantity clamped, never fails)
//! POST /cart/update            - Set a line's quantity (0 removes)
//! POST /cart/remove            - Remove a line
//! POST /cart/clear             - Empty the cart
//! POST /cart/flush             - Synchronous durable write-through
//! GET  /cart/count             - Item count badge
//!
//! # Checkout
//! GET  /checkout               - Current checkout state
//! POST /checkout/shipping      - Replace the shipping draft
//! POST /checkout/billing       - Replace the billing draft
//! POST /checkout/payment       - Replace the payment draft
//! POST /checkout/next          - Validate current step and advance
//! POST /checkout/back          - Step backward
//! POST /checkout/submit        - Pay and place the order
//! POST /checkout/abandon       - Cancel the live intent and reset
//!
//! # Auth
//! POST /auth/signin            - Attach a verified user to the session
//! POST /auth/signout           - Drop the session user
//! ```

pub mod auth;
pub mod cart;
pub mod checkout;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
        .route("/flush", post(cart::flush))
        .route("/count", get(cart::count))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(checkout::show))
        .route("/shipping", post(checkout::update_shipping))
        .route("/billing", post(checkout::update_billing))
        .route("/payment", post(checkout::update_payment))
        .route("/next", post(checkout::next_step))
        .route("/back", post(checkout::back_step))
        .route("/submit", post(checkout::submit))
        .route("/abandon", post(checkout::abandon))
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signin", post(auth::signin))
        .route("/signout", post(auth::signout))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .nest("/auth", auth_routes())
}
