//! Order placement workflow tests.
//!
//! Payment verification, idempotence on the intent reference, and
//! compensation when line persistence fails, all against the sandbox
//! gateway and the in-memory order store.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use driftwood_core::{
    CurrencyCode, GuestToken, Identity, Money, OrderStatus, PaymentStatus, ProductId, UserId,
};
use driftwood_storefront::cart::{Cart, CartLine, LineDisplay};
use driftwood_storefront::checkout::{
    BillingInfo, CardDraft, CheckoutState, PaymentInfo, PaymentMethod, ShippingInfo,
};
use driftwood_storefront::order::OrderError;
use driftwood_storefront::payment::{
    CardDetails, CardErrorCode, PaymentError, PaymentGateway, sandbox,
};
use driftwood_integration_tests::TestEngine;

fn checkout_state() -> CheckoutState {
    CheckoutState {
        shipping: ShippingInfo {
            first_name: "Ada".to_owned(),
            last_name: "Lovelace".to_owned(),
            email: "ada@example.com".to_owned(),
            phone: "555-0100".to_owned(),
            address1: "1 Analytical Way".to_owned(),
            address2: String::new(),
            city: "London".to_owned(),
            state: "LDN".to_owned(),
            postal_code: "EC1A".to_owned(),
            country: "GB".to_owned(),
        },
        billing: BillingInfo {
            same_as_shipping: true,
            ..BillingInfo::default()
        },
        payment: PaymentInfo {
            method: PaymentMethod::Card,
            card: CardDraft {
                number: "4242424242424242".to_owned(),
                expiry: "12/30".to_owned(),
                cvv: "123".to_owned(),
                holder_name: "Ada Lovelace".to_owned(),
            },
        },
        ..CheckoutState::default()
    }
}

fn card(number: &str) -> CardDetails {
    CardDetails {
        number: number.to_owned(),
        expiry: "12/30".to_owned(),
        cvv: "123".to_owned(),
        holder_name: "Ada Lovelace".to_owned(),
    }
}

fn cart_with(product: i64, cents: i64, quantity: u32) -> Cart {
    let mut cart = Cart::empty();
    cart.add_line(
        CartLine {
            product_id: ProductId::new(product),
            variant_id: None,
            quantity: 0,
            unit_price: Money::new(Decimal::new(cents, 2), CurrencyCode::Usd),
            stock: 10,
            display: LineDisplay {
                name: format!("Product {product}"),
                image_url: None,
                category: None,
                brand: None,
            },
        },
        quantity,
    );
    cart
}

/// Create and confirm an intent priced like the workflow prices the cart.
async fn succeeded_intent(engine: &TestEngine, cart: &Cart) -> String {
    let subtotal = cart.total_amount();
    let tax = (subtotal.amount * Decimal::new(875, 4)).round_dp(2);
    let total = Money::new(subtotal.amount + tax, subtotal.currency);
    let intent = engine
        .gateway
        .create_intent(
            total.minor_units().expect("total fits in minor units"),
            total.currency,
            BTreeMap::new(),
            None,
        )
        .await
        .expect("create intent");
    engine
        .gateway
        .confirm_intent(&intent.id, &card("4242424242424242"))
        .await
        .expect("confirm intent");
    intent.id
}

#[tokio::test]
async fn test_order_placed_with_totals_and_cleared_cart() {
    let engine = TestEngine::new();
    let identity = Identity::user(UserId::new(1));
    let cart = cart_with(1, 10000, 2);
    engine.carts.add_line(&identity, cart.lines[0].clone(), 2).await;

    let intent = succeeded_intent(&engine, &cart).await;
    let order = engine
        .workflow
        .place_order(&identity, &cart, &checkout_state(), &intent)
        .await
        .expect("place order");

    assert_eq!(order.status, OrderStatus::Confirmed);
    assert_eq!(order.payment_status, PaymentStatus::Completed);
    assert_eq!(order.subtotal.amount, Decimal::new(20000, 2));
    assert_eq!(order.tax.amount, Decimal::new(1750, 2));
    assert_eq!(order.total.amount, Decimal::new(21750, 2));
    assert!(order.order_number.starts_with("DW-"));

    let lines = engine.workflow.lines_for(order.id).await.expect("lines");
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, 2);
    assert_eq!(lines[0].total_price.amount, Decimal::new(20000, 2));

    assert!(engine.carts.load(&identity).await.is_empty());
}

#[tokio::test]
async fn test_duplicate_submission_returns_same_order() {
    let engine = TestEngine::new();
    let identity = Identity::user(UserId::new(2));
    let cart = cart_with(1, 5000, 1);

    let intent = succeeded_intent(&engine, &cart).await;
    let first = engine
        .workflow
        .place_order(&identity, &cart, &checkout_state(), &intent)
        .await
        .expect("first placement");
    let second = engine
        .workflow
        .place_order(&identity, &cart, &checkout_state(), &intent)
        .await
        .expect("second placement");

    assert_eq!(first.id, second.id);
    assert_eq!(first.order_number, second.order_number);
    assert_eq!(engine.store.order_count().await, 1);
}

#[tokio::test]
async fn test_unpaid_intent_is_rejected() {
    let engine = TestEngine::new();
    let identity = Identity::user(UserId::new(3));
    let cart = cart_with(1, 5000, 1);

    let intent = engine
        .gateway
        .create_intent(5000, CurrencyCode::Usd, BTreeMap::new(), None)
        .await
        .expect("create intent");

    let err = engine
        .workflow
        .place_order(&identity, &cart, &checkout_state(), &intent.id)
        .await
        .expect_err("unconfirmed intent must be rejected");
    assert!(matches!(err, OrderError::PaymentIncomplete { .. }));
    assert_eq!(engine.store.order_count().await, 0);
}

#[tokio::test]
async fn test_line_failure_compensates_order_header() {
    let engine = TestEngine::new();
    let identity = Identity::user(UserId::new(4));
    let cart = cart_with(1, 5000, 1);

    let intent = succeeded_intent(&engine, &cart).await;
    engine.store.fail_next_line_inserts(1);

    let err = engine
        .workflow
        .place_order(&identity, &cart, &checkout_state(), &intent)
        .await
        .expect_err("line insert failure must fail placement");
    assert!(matches!(err, OrderError::Repository(_)));

    // The header was inserted, then compensated away.
    assert_eq!(engine.store.insert_count(), 1);
    assert_eq!(engine.store.order_count().await, 0);

    // A retry with the same intent now succeeds from scratch.
    let order = engine
        .workflow
        .place_order(&identity, &cart, &checkout_state(), &intent)
        .await
        .expect("retry succeeds");
    assert_eq!(engine.store.order_count().await, 1);
    assert_eq!(order.intent_ref, intent);
}

#[tokio::test]
async fn test_reserved_cards_surface_typed_errors() {
    let engine = TestEngine::new();
    for (number, expected) in [
        (sandbox::CARD_DECLINED, CardErrorCode::CardDeclined),
        (sandbox::CARD_EXPIRED, CardErrorCode::ExpiredCard),
        (sandbox::CARD_INCORRECT_CVC, CardErrorCode::IncorrectCvc),
    ] {
        let intent = engine
            .gateway
            .create_intent(5000, CurrencyCode::Usd, BTreeMap::new(), None)
            .await
            .expect("create intent");
        let err = engine
            .gateway
            .confirm_intent(&intent.id, &card(number))
            .await
            .expect_err("reserved card must fail");
        match err {
            PaymentError::Card(code) => assert_eq!(code, expected),
            other => panic!("expected card error, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_guest_order_owned_by_checkout_email() {
    let engine = TestEngine::new();
    let identity = Identity::guest(GuestToken::mint());
    let cart = cart_with(1, 2500, 1);

    let intent = succeeded_intent(&engine, &cart).await;
    let order = engine
        .workflow
        .place_order(&identity, &cart, &checkout_state(), &intent)
        .await
        .expect("guest order");
    assert_eq!(order.owner.as_ref_string(), "guest:ada@example.com");
}
