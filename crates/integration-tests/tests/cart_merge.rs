//! Cart persistence and sign-in merge tests.
//!
//! Exercise the two-tier cart store end to end: guest mutations, the
//! durable flush, and the fold of an anonymous cart into a user cart at
//! sign-in.

use rust_decimal::Decimal;

use driftwood_core::{
    CurrencyCode, GuestToken, Identity, Money, ProductId, UserId, VariantId,
};
use driftwood_storefront::cart::{CartLine, LineDisplay};
use driftwood_integration_tests::TestEngine;

fn line(product: i64, cents: i64, stock: u32) -> CartLine {
    CartLine {
        product_id: ProductId::new(product),
        variant_id: None,
        quantity: 0,
        unit_price: Money::new(Decimal::new(cents, 2), CurrencyCode::Usd),
        stock,
        display: LineDisplay {
            name: format!("Product {product}"),
            image_url: None,
            category: None,
            brand: None,
        },
    }
}

#[tokio::test]
async fn test_guest_cart_round_trips_through_store() {
    let engine = TestEngine::new();
    let guest = Identity::guest(GuestToken::mint());

    engine.carts.add_line(&guest, line(1, 1999, 10), 2).await;
    let cart = engine.carts.add_line(&guest, line(2, 500, 10), 1).await;
    assert_eq!(cart.item_count(), 3);

    let reloaded = engine.carts.load(&guest).await;
    assert_eq!(reloaded.lines.len(), 2);
    assert_eq!(reloaded.total_amount().amount, Decimal::new(4498, 2));
}

#[tokio::test]
async fn test_sign_in_merges_guest_into_user_cart() {
    let engine = TestEngine::new();
    let token = GuestToken::mint();
    let guest = Identity::guest(token.clone());
    let user_id = UserId::new(7);
    let user = Identity::user(user_id);

    // User already has A:2 and B:1 from an earlier session.
    engine.carts.add_line(&user, line(1, 1000, 10), 2).await;
    engine.carts.add_line(&user, line(2, 2000, 10), 1).await;
    engine.carts.flush(&user).await.expect("flush user cart");

    // The guest picked up A:3 and C:5.
    engine.carts.add_line(&guest, line(1, 1000, 10), 3).await;
    engine.carts.add_line(&guest, line(3, 1500, 10), 5).await;

    let merged = engine.carts.merge_on_sign_in(&token, user_id).await;

    let qty = |product: i64| {
        merged
            .find_line((ProductId::new(product), None))
            .map(|l| l.quantity)
    };
    assert_eq!(qty(1), Some(5), "shared line quantities sum");
    assert_eq!(qty(2), Some(1), "user-only line kept");
    assert_eq!(qty(3), Some(5), "guest-only line appended");

    // The anonymous cart is gone; sign-in consumed it.
    let leftover = engine.carts.load(&guest).await;
    assert!(leftover.is_empty());
}

#[tokio::test]
async fn test_merge_respects_stock_ceiling() {
    let engine = TestEngine::new();
    let token = GuestToken::mint();
    let guest = Identity::guest(token.clone());
    let user_id = UserId::new(8);
    let user = Identity::user(user_id);

    engine.carts.add_line(&user, line(1, 1000, 4), 2).await;
    engine.carts.flush(&user).await.expect("flush user cart");
    engine.carts.add_line(&guest, line(1, 1000, 4), 3).await;

    let merged = engine.carts.merge_on_sign_in(&token, user_id).await;
    let line = merged
        .find_line((ProductId::new(1), None))
        .expect("merged line");
    assert_eq!(line.quantity, 4, "2 + 3 clamps to stock of 4");
}

#[tokio::test]
async fn test_variants_are_distinct_lines() {
    let engine = TestEngine::new();
    let guest = Identity::guest(GuestToken::mint());

    let mut variant_line = line(5, 2500, 10);
    variant_line.variant_id = Some(VariantId::new(51));

    engine.carts.add_line(&guest, line(5, 2500, 10), 1).await;
    let cart = engine.carts.add_line(&guest, variant_line, 1).await;
    assert_eq!(cart.lines.len(), 2);
}
