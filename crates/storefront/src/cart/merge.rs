//! Guest-to-identity cart merge.
//!
//! Pure merge logic; the retry loop around durable persistence lives in
//! [`CartStore::merge_on_sign_in`](super::CartStore::merge_on_sign_in).

use super::{Cart, CartLine, MAX_LINE_QUANTITY};

/// Merge a guest cart into an identity cart.
///
/// - A line present in both carts gets quantity
///   `min(identity + guest, stock, MAX_LINE_QUANTITY)`, keeping the identity
///   line's denormalized fields and the smaller of the two stock snapshots.
/// - Lines present only in the guest cart are appended unchanged.
/// - Lines present only in the identity cart are kept unchanged.
#[must_use]
pub fn merge_carts(identity_cart: &Cart, guest_cart: &Cart) -> Cart {
    let mut merged: Vec<CartLine> = identity_cart.lines.clone();

    for guest_line in &guest_cart.lines {
        if let Some(existing) = merged.iter_mut().find(|l| l.key() == guest_line.key()) {
            existing.stock = existing.stock.min(guest_line.stock);
            let limit = existing.stock.min(MAX_LINE_QUANTITY);
            existing.quantity = existing
                .quantity
                .saturating_add(guest_line.quantity)
                .min(limit);
        } else {
            merged.push(guest_line.clone());
        }
    }

    Cart {
        lines: merged,
        updated_at: chrono::Utc::now(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::super::test_support::line;
    use super::*;
    use driftwood_core::ProductId;

    fn cart_with(entries: &[(i64, u32, u32)]) -> Cart {
        // entries: (product, quantity, stock)
        let mut cart = Cart::empty();
        for &(product, quantity, stock) in entries {
            let mut l = line(product, 1000, stock);
            l.quantity = quantity;
            cart.lines.push(l);
        }
        cart
    }

    fn quantity_of(cart: &Cart, product: i64) -> u32 {
        cart.find_line((ProductId::new(product), None))
            .map_or(0, |l| l.quantity)
    }

    #[test]
    fn test_merge_sums_shared_lines() {
        // guest {A:2, B:1}, identity {A:3, C:5}, stock(A)=10
        let guest = cart_with(&[(1, 2, 10), (2, 1, 10)]);
        let identity = cart_with(&[(1, 3, 10), (3, 5, 10)]);

        let merged = merge_carts(&identity, &guest);
        assert_eq!(quantity_of(&merged, 1), 5);
        assert_eq!(quantity_of(&merged, 2), 1);
        assert_eq!(quantity_of(&merged, 3), 5);
        assert_eq!(merged.lines.len(), 3);
    }

    #[test]
    fn test_merge_clamps_to_stock() {
        // Same carts, but stock(A)=4: 2+3 clamps to 4.
        let guest = cart_with(&[(1, 2, 4), (2, 1, 10)]);
        let identity = cart_with(&[(1, 3, 4), (3, 5, 10)]);

        let merged = merge_carts(&identity, &guest);
        assert_eq!(quantity_of(&merged, 1), 4);
        assert_eq!(quantity_of(&merged, 2), 1);
        assert_eq!(quantity_of(&merged, 3), 5);
    }

    #[test]
    fn test_merge_clamps_to_global_max() {
        let guest = cart_with(&[(1, 7, 50)]);
        let identity = cart_with(&[(1, 6, 50)]);

        let merged = merge_carts(&identity, &guest);
        assert_eq!(quantity_of(&merged, 1), MAX_LINE_QUANTITY);
    }

    #[test]
    fn test_merge_with_empty_identity_cart() {
        let guest = cart_with(&[(1, 2, 10)]);
        let identity = Cart::empty();

        let merged = merge_carts(&identity, &guest);
        assert_eq!(quantity_of(&merged, 1), 2);
    }

    #[test]
    fn test_merge_keeps_identity_line_order_first() {
        let guest = cart_with(&[(9, 1, 10)]);
        let identity = cart_with(&[(1, 1, 10), (2, 1, 10)]);

        let merged = merge_carts(&identity, &guest);
        let products: Vec<i64> = merged.lines.iter().map(|l| l.product_id.as_i64()).collect();
        assert_eq!(products, vec![1, 2, 9]);
    }
}
