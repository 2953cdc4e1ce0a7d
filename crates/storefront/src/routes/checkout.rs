//! Checkout route handlers.
//!
//! The checkout state machine lives in the session; handlers load it, apply
//! one action through the pure transition function, and write it back.
//! Submission is the only handler that talks to the payment gateway, and it
//! persists the in-flight guard to the session before any network call so a
//! double click cannot start a second charge.

use std::collections::BTreeMap;

use axum::{Json, extract::State};
use serde::Serialize;
use tower_sessions::Session;
use tracing::{instrument, warn};

use driftwood_core::{CheckoutStep, Money};

use crate::cart::Cart;
use crate::checkout::{
    BillingInfo, CheckoutAction, CheckoutState, FieldErrors, PaymentInfo, ShippingInfo,
    transition, validate_step,
};
use crate::error::{AppError, Result};
use crate::middleware::CurrentIdentity;
use crate::models::session_keys;
use crate::order::Order;
use crate::payment::{CardDetails, ShippingSnapshot};
use crate::state::AppState;

use super::cart::CartView;

/// Checkout state as reported to the client. Card fields never echo back.
#[derive(Debug, Serialize)]
pub struct CheckoutView {
    pub step: CheckoutStep,
    pub shipping: ShippingInfo,
    pub billing: BillingInfo,
    pub payment_method: crate::checkout::PaymentMethod,
    pub errors: FieldErrors,
    pub is_processing: bool,
    pub cart: CartView,
}

impl CheckoutView {
    fn new(state: &CheckoutState, cart: &Cart) -> Self {
        Self {
            step: state.step,
            shipping: state.shipping.clone(),
            billing: state.billing.clone(),
            payment_method: state.payment.method,
            errors: state.errors.clone(),
            is_processing: state.is_processing,
            cart: CartView::from_cart(cart),
        }
    }
}

/// Confirmation payload for a placed order.
#[derive(Debug, Serialize)]
pub struct OrderView {
    pub order_number: String,
    pub email: String,
    pub subtotal: String,
    pub tax: String,
    pub total: String,
}

impl OrderView {
    fn new(order: &Order) -> Self {
        Self {
            order_number: order.order_number.clone(),
            email: order.email.as_str().to_owned(),
            subtotal: order.subtotal.to_string(),
            tax: order.tax.to_string(),
            total: order.total.to_string(),
        }
    }
}

async fn load_state(session: &Session) -> Result<CheckoutState> {
    Ok(session
        .get::<CheckoutState>(session_keys::CHECKOUT_STATE)
        .await
        .map_err(|e| AppError::Internal(format!("session read failed: {e}")))?
        .unwrap_or_default())
}

async fn store_state(session: &Session, state: &CheckoutState) -> Result<()> {
    session
        .insert(session_keys::CHECKOUT_STATE, state)
        .await
        .map_err(|e| AppError::Internal(format!("session write failed: {e}")))
}

/// Apply one action and report the resulting state.
async fn apply(
    app: &AppState,
    session: &Session,
    identity: &driftwood_core::Identity,
    action: CheckoutAction,
) -> Result<Json<CheckoutView>> {
    let state = load_state(session).await?;
    let state = transition(state, action);
    store_state(session, &state).await?;
    let cart = app.carts().load(identity).await;
    Ok(Json(CheckoutView::new(&state, &cart)))
}

/// GET /checkout - the current checkout state.
#[instrument(skip_all)]
pub async fn show(
    State(app): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    session: Session,
) -> Result<Json<CheckoutView>> {
    let state = load_state(&session).await?;
    let cart = app.carts().load(&identity).await;
    Ok(Json(CheckoutView::new(&state, &cart)))
}

/// POST /checkout/shipping - replace the shipping draft.
#[instrument(skip_all)]
pub async fn update_shipping(
    State(app): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    session: Session,
    Json(shipping): Json<ShippingInfo>,
) -> Result<Json<CheckoutView>> {
    apply(&app, &session, &identity, CheckoutAction::UpdateShipping(shipping)).await
}

/// POST /checkout/billing - replace the billing draft.
#[instrument(skip_all)]
pub async fn update_billing(
    State(app): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    session: Session,
    Json(billing): Json<BillingInfo>,
) -> Result<Json<CheckoutView>> {
    apply(&app, &session, &identity, CheckoutAction::UpdateBilling(billing)).await
}

/// POST /checkout/payment - replace the payment draft.
#[instrument(skip_all)]
pub async fn update_payment(
    State(app): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    session: Session,
    Json(payment): Json<PaymentInfo>,
) -> Result<Json<CheckoutView>> {
    apply(&app, &session, &identity, CheckoutAction::UpdatePayment(payment)).await
}

/// POST /checkout/next - validate the current step and advance.
#[instrument(skip_all)]
pub async fn next_step(
    State(app): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    session: Session,
) -> Result<Json<CheckoutView>> {
    apply(&app, &session, &identity, CheckoutAction::NextStep).await
}

/// POST /checkout/back - step backward without validating.
#[instrument(skip_all)]
pub async fn back_step(
    State(app): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    session: Session,
) -> Result<Json<CheckoutView>> {
    apply(&app, &session, &identity, CheckoutAction::PrevStep).await
}

/// POST /checkout/submit - pay and place the order.
///
/// The guard is claimed and saved to the session store before the first
/// gateway call; a concurrent submit sees `is_processing` and gets a 409.
/// Whatever happens afterwards, the guard is released before responding.
#[instrument(skip_all)]
pub async fn submit(
    State(app): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    session: Session,
) -> Result<Json<OrderView>> {
    let mut state = load_state(&session).await?;

    if !state.begin_submit() {
        return Err(AppError::SubmissionInFlight);
    }

    // Full validation before the guard is persisted: a rejected submit must
    // not leave the session processing.
    let mut errors = FieldErrors::new();
    for step in [
        CheckoutStep::Shipping,
        CheckoutStep::Billing,
        CheckoutStep::Payment,
    ] {
        errors.append(&mut validate_step(&state, step));
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let cart = app.carts().load(&identity).await;
    if cart.is_empty() {
        return Err(AppError::BadRequest("cart is empty".to_owned()));
    }

    store_state(&session, &state).await?;
    session
        .save()
        .await
        .map_err(|e| AppError::Internal(format!("session save failed: {e}")))?;

    let result = process_submission(&app, &session, &identity, &state, &cart).await;

    match result {
        Ok(order) => {
            // Completed checkout: reset the machine and drop the intent ref.
            let _ = session.remove::<String>(session_keys::PAYMENT_INTENT).await;
            store_state(&session, &CheckoutState::default()).await?;
            Ok(Json(OrderView::new(&order)))
        }
        Err(e) => {
            let state = transition(state, CheckoutAction::FinishSubmit);
            store_state(&session, &state).await?;
            Err(e)
        }
    }
}

/// The network-facing part of submission, run while the guard is held.
async fn process_submission(
    app: &AppState,
    session: &Session,
    identity: &driftwood_core::Identity,
    state: &CheckoutState,
    cart: &Cart,
) -> Result<Order> {
    let intent_ref = ensure_intent(app, session, cart, &state.shipping).await?;

    let card = CardDetails {
        number: state.payment.card.number.clone(),
        expiry: state.payment.card.expiry.clone(),
        cvv: state.payment.card.cvv.clone(),
        holder_name: state.payment.card.holder_name.clone(),
    };
    app.gateway().confirm_intent(&intent_ref, &card).await?;

    let order = app
        .orders()
        .place_order(identity, cart, state, &intent_ref)
        .await?;
    Ok(order)
}

/// Freeze the validated shipping draft for the payment provider.
fn shipping_snapshot(shipping: &ShippingInfo) -> ShippingSnapshot {
    ShippingSnapshot {
        name: format!("{} {}", shipping.first_name, shipping.last_name),
        phone: shipping.phone.clone(),
        address1: shipping.address1.clone(),
        address2: shipping.address2.clone(),
        city: shipping.city.clone(),
        state: shipping.state.clone(),
        postal_code: shipping.postal_code.clone(),
        country: shipping.country.clone(),
    }
}

/// Reuse the session's live intent if it is still confirmable and priced
/// for the current cart, otherwise create a fresh one.
async fn ensure_intent(
    app: &AppState,
    session: &Session,
    cart: &Cart,
    shipping: &ShippingInfo,
) -> Result<String> {
    let subtotal = cart.total_amount();
    let tax = Money::new(
        (subtotal.amount * app.config().tax_rate).round_dp(2),
        subtotal.currency,
    );
    let total = subtotal
        .checked_add(&tax)
        .map_err(|e| AppError::Internal(format!("order total overflow: {e}")))?;
    let amount_minor = total
        .minor_units()
        .map_err(|e| AppError::Internal(format!("order total out of range: {e}")))?;

    if let Ok(Some(existing)) = session.get::<String>(session_keys::PAYMENT_INTENT).await {
        match app.gateway().get_intent(&existing).await {
            Ok(intent)
                if intent.status.is_confirmable() && intent.amount_minor == amount_minor =>
            {
                return Ok(existing);
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "stale intent lookup failed, creating a new one"),
        }
    }

    let intent = app
        .gateway()
        .create_intent(
            amount_minor,
            total.currency,
            BTreeMap::new(),
            Some(shipping_snapshot(shipping)),
        )
        .await?;
    session
        .insert(session_keys::PAYMENT_INTENT, intent.id.clone())
        .await
        .map_err(|e| AppError::Internal(format!("session write failed: {e}")))?;
    Ok(intent.id)
}

/// POST /checkout/abandon - cancel the live intent and reset the machine.
///
/// Cancellation is best-effort: a gateway failure is logged, never surfaced,
/// and never blocks the reset.
#[instrument(skip_all)]
pub async fn abandon(
    State(app): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    session: Session,
) -> Result<Json<CheckoutView>> {
    if let Ok(Some(intent_ref)) = session.get::<String>(session_keys::PAYMENT_INTENT).await {
        if let Err(e) = app.gateway().cancel_intent(&intent_ref).await {
            warn!(intent_ref, error = %e, "best-effort intent cancellation failed");
        }
        let _ = session.remove::<String>(session_keys::PAYMENT_INTENT).await;
    }
    apply(&app, &session, &identity, CheckoutAction::Reset).await
}
