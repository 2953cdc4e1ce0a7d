//! Checkout state machine flow tests.
//!
//! Step gating, backward movement, and the single in-flight submission
//! guard, driven through the same transition function the HTTP handlers
//! use.

use std::collections::BTreeMap;

use driftwood_core::{CheckoutStep, CurrencyCode};
use driftwood_storefront::checkout::{
    BillingInfo, CardDraft, CheckoutAction, CheckoutState, PaymentInfo, PaymentMethod,
    ShippingInfo, transition,
};
use driftwood_storefront::payment::{CardDetails, PaymentGateway};
use driftwood_integration_tests::CountingGateway;

fn valid_shipping() -> ShippingInfo {
    ShippingInfo {
        first_name: "Grace".to_owned(),
        last_name: "Hopper".to_owned(),
        email: "grace@example.com".to_owned(),
        phone: "555-0199".to_owned(),
        address1: "1 Harbor Ln".to_owned(),
        address2: String::new(),
        city: "Arlington".to_owned(),
        state: "VA".to_owned(),
        postal_code: "22201".to_owned(),
        country: "US".to_owned(),
    }
}

fn valid_payment() -> PaymentInfo {
    PaymentInfo {
        method: PaymentMethod::Card,
        card: CardDraft {
            number: "4242 4242 4242 4242".to_owned(),
            expiry: "11/29".to_owned(),
            cvv: "321".to_owned(),
            holder_name: "Grace Hopper".to_owned(),
        },
    }
}

/// Drive a default state to the payment step with valid data.
fn at_payment_step() -> CheckoutState {
    let state = transition(
        CheckoutState::default(),
        CheckoutAction::UpdateShipping(valid_shipping()),
    );
    let state = transition(state, CheckoutAction::NextStep);
    let state = transition(
        state,
        CheckoutAction::UpdateBilling(BillingInfo {
            same_as_shipping: true,
            ..BillingInfo::default()
        }),
    );
    let state = transition(state, CheckoutAction::NextStep);
    transition(state, CheckoutAction::UpdatePayment(valid_payment()))
}

#[test]
fn test_cannot_skip_ahead_with_invalid_step() {
    let state = transition(CheckoutState::default(), CheckoutAction::NextStep);
    assert_eq!(state.step, CheckoutStep::Shipping);
    assert!(state.errors.contains_key("email"));

    // A second NextStep still goes nowhere.
    let state = transition(state, CheckoutAction::NextStep);
    assert_eq!(state.step, CheckoutStep::Shipping);
}

#[test]
fn test_full_forward_walk() {
    let state = at_payment_step();
    assert_eq!(state.step, CheckoutStep::Payment);
    assert!(state.errors.is_empty());
}

#[test]
fn test_partial_shipping_names_each_missing_field() {
    let mut shipping = valid_shipping();
    shipping.city = String::new();
    shipping.postal_code = "  ".to_owned();

    let state = transition(
        CheckoutState::default(),
        CheckoutAction::UpdateShipping(shipping),
    );
    let state = transition(state, CheckoutAction::NextStep);
    assert_eq!(state.errors.len(), 2);
    assert!(state.errors.contains_key("city"));
    assert!(state.errors.contains_key("postal_code"));
}

#[test]
fn test_backward_steps_preserve_all_data() {
    let state = at_payment_step();
    let state = transition(state, CheckoutAction::PrevStep);
    assert_eq!(state.step, CheckoutStep::Billing);
    let state = transition(state, CheckoutAction::PrevStep);
    assert_eq!(state.step, CheckoutStep::Shipping);
    assert_eq!(state.shipping, valid_shipping());
    assert_eq!(state.payment, valid_payment());
}

#[test]
fn test_billing_with_own_address_is_gated() {
    let state = transition(
        CheckoutState::default(),
        CheckoutAction::UpdateShipping(valid_shipping()),
    );
    let state = transition(state, CheckoutAction::NextStep);
    let state = transition(
        state,
        CheckoutAction::UpdateBilling(BillingInfo {
            same_as_shipping: false,
            ..BillingInfo::default()
        }),
    );
    let state = transition(state, CheckoutAction::NextStep);
    assert_eq!(state.step, CheckoutStep::Billing);
    assert!(!state.errors.is_empty());
}

#[test]
fn test_single_inflight_submission_guard() {
    let mut state = at_payment_step();

    assert!(state.begin_submit(), "first submission claims the guard");
    assert!(!state.begin_submit(), "second submission is rejected");

    let mut state = transition(state, CheckoutAction::FinishSubmit);
    assert!(
        state.begin_submit(),
        "guard is free again after the first settles"
    );
}

#[tokio::test]
async fn test_double_submit_confirms_payment_once() {
    let gateway = CountingGateway::new();
    let intent = gateway
        .create_intent(5000, CurrencyCode::Usd, BTreeMap::new(), None)
        .await
        .expect("create intent");
    let card = CardDetails {
        number: "4242 4242 4242 4242".to_owned(),
        expiry: "11/29".to_owned(),
        cvv: "321".to_owned(),
        holder_name: "Grace Hopper".to_owned(),
    };

    // Two back-to-back submits: only the one that claims the guard may
    // reach the gateway, as in the submit handler.
    let mut state = at_payment_step();
    for _ in 0..2 {
        if state.begin_submit() {
            gateway
                .confirm_intent(&intent.id, &card)
                .await
                .expect("confirm intent");
        }
    }

    assert_eq!(gateway.confirm_calls(), 1);
}

#[test]
fn test_reset_clears_guard_and_drafts() {
    let mut state = at_payment_step();
    state.is_processing = true;
    let state = transition(state, CheckoutAction::Reset);
    assert_eq!(state, CheckoutState::default());
    assert!(!state.is_processing);
}
