//! Cart state and the two-tier cart store.
//!
//! [`Cart`] and [`CartLine`] are pure state: every mutation is a clamp, never
//! a rejection, so the operations cannot fail. Persistence and the
//! guest-to-user merge live in [`store`] and [`merge`].

pub mod backend;
pub mod merge;
pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use driftwood_core::{CurrencyCode, Money, ProductId, VariantId};

pub use backend::{CartBackend, MemoryCartBackend};
pub use store::CartStore;

/// Global per-line quantity ceiling, applied on top of the stock snapshot.
pub const MAX_LINE_QUANTITY: u32 = 10;

/// Denormalized display fields captured from the catalog at add-time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LineDisplay {
    /// Product name.
    pub name: String,
    /// Primary image URL.
    pub image_url: Option<String>,
    /// Category name.
    pub category: Option<String>,
    /// Brand name.
    pub brand: Option<String>,
}

/// Key uniquely identifying a line within a cart.
pub type LineKey = (ProductId, Option<VariantId>);

/// One line in a cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    /// Product reference.
    pub product_id: ProductId,
    /// Optional variant reference.
    pub variant_id: Option<VariantId>,
    /// Quantity, always within `1..=min(stock, MAX_LINE_QUANTITY)`.
    pub quantity: u32,
    /// Unit price captured at add-time.
    pub unit_price: Money,
    /// Stock snapshot captured at add-time; not re-validated until submission.
    pub stock: u32,
    /// Display fields captured at add-time.
    pub display: LineDisplay,
}

impl CartLine {
    /// The product+variant key for this line.
    #[must_use]
    pub const fn key(&self) -> LineKey {
        (self.product_id, self.variant_id)
    }

    /// The quantity ceiling for this line.
    #[must_use]
    pub fn quantity_limit(&self) -> u32 {
        self.stock.min(MAX_LINE_QUANTITY)
    }

    /// Line total: unit price times quantity.
    #[must_use]
    pub fn total_price(&self) -> Money {
        self.unit_price.times(self.quantity)
    }
}

/// A shopper's cart: an ordered set of lines keyed by product+variant.
///
/// All quantity operations clamp rather than reject, so they always succeed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    /// Lines in insertion order.
    pub lines: Vec<CartLine>,
    /// Timestamp of the last mutation.
    pub updated_at: DateTime<Utc>,
}

impl Default for Cart {
    fn default() -> Self {
        Self::empty()
    }
}

impl Cart {
    /// A cart with no lines.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            lines: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Whether the cart holds no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Find a line by its product+variant key.
    #[must_use]
    pub fn find_line(&self, key: LineKey) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.key() == key)
    }

    /// Add a line, or increase an existing line's quantity.
    ///
    /// The resulting quantity is silently clamped to
    /// `min(stock, MAX_LINE_QUANTITY)`; exceeding stock never fails.
    pub fn add_line(&mut self, line: CartLine, quantity: u32) {
        let key = line.key();
        if let Some(existing) = self.lines.iter_mut().find(|l| l.key() == key) {
            let limit = existing.quantity_limit();
            existing.quantity = existing.quantity.saturating_add(quantity).min(limit);
        } else {
            let limit = line.quantity_limit();
            let mut line = line;
            line.quantity = quantity.clamp(1, limit.max(1)).min(limit);
            // A zero-stock product yields a zero-quantity line; drop it.
            if line.quantity > 0 {
                self.lines.push(line);
            }
        }
        self.touch();
    }

    /// Remove a line if present; no-op otherwise.
    pub fn remove_line(&mut self, key: LineKey) {
        self.lines.retain(|l| l.key() != key);
        self.touch();
    }

    /// Set a line's quantity, clamped to `[0, min(stock, MAX_LINE_QUANTITY)]`.
    ///
    /// A quantity of zero removes the line.
    pub fn set_quantity(&mut self, key: LineKey, quantity: u32) {
        if let Some(line) = self.lines.iter_mut().find(|l| l.key() == key) {
            let clamped = quantity.min(line.quantity_limit());
            if clamped == 0 {
                self.remove_line(key);
            } else {
                line.quantity = clamped;
                self.touch();
            }
        }
    }

    /// Empty the cart.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.touch();
    }

    /// Total amount across all lines.
    ///
    /// Derived from current lines, never persisted as authoritative. The
    /// catalog is single-currency; the first line's currency is used.
    #[must_use]
    pub fn total_amount(&self) -> Money {
        let currency = self
            .lines
            .first()
            .map_or(CurrencyCode::default(), |l| l.unit_price.currency);
        self.lines
            .iter()
            .fold(Money::zero(currency), |acc, line| {
                acc.checked_add(&line.total_price()).unwrap_or(acc)
            })
    }

    /// Total number of items (sum of line quantities).
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}


#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::test_support::line;
    use super::*;

    #[test]
    fn test_add_new_line_clamps_to_stock() {
        let mut cart = Cart::empty();
        cart.add_line(line(1, 1999, 3), 5);
        assert_eq!(cart.find_line((ProductId::new(1), None)).unwrap().quantity, 3);
    }

    #[test]
    fn test_add_new_line_clamps_to_global_max() {
        let mut cart = Cart::empty();
        cart.add_line(line(1, 1999, 50), 25);
        assert_eq!(
            cart.find_line((ProductId::new(1), None)).unwrap().quantity,
            MAX_LINE_QUANTITY
        );
    }

    #[test]
    fn test_add_existing_line_accumulates_and_clamps() {
        let mut cart = Cart::empty();
        cart.add_line(line(1, 1999, 8), 4);
        cart.add_line(line(1, 1999, 8), 7);
        assert_eq!(cart.find_line((ProductId::new(1), None)).unwrap().quantity, 8);
    }

    #[test]
    fn test_add_zero_stock_drops_line() {
        let mut cart = Cart::empty();
        cart.add_line(line(1, 1999, 0), 2);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_quantity_zero_removes() {
        let mut cart = Cart::empty();
        cart.add_line(line(1, 1999, 5), 2);
        cart.set_quantity((ProductId::new(1), None), 0);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_quantity_clamps() {
        let mut cart = Cart::empty();
        cart.add_line(line(1, 1999, 4), 1);
        cart.set_quantity((ProductId::new(1), None), 99);
        assert_eq!(cart.find_line((ProductId::new(1), None)).unwrap().quantity, 4);
    }

    #[test]
    fn test_remove_missing_line_is_noop() {
        let mut cart = Cart::empty();
        cart.add_line(line(1, 1999, 5), 2);
        cart.remove_line((ProductId::new(2), None));
        assert_eq!(cart.lines.len(), 1);
    }

    #[test]
    fn test_totals_are_derived() {
        let mut cart = Cart::empty();
        cart.add_line(line(1, 1000, 10), 2); // $20.00
        cart.add_line(line(2, 550, 10), 3); // $16.50
        assert_eq!(cart.total_amount().minor_units().unwrap(), 3650);
        assert_eq!(cart.item_count(), 5);
    }

    #[test]
    fn test_clamp_invariant_over_sequences() {
        // For any sequence of adds and set_quantity calls, quantities stay
        // within [0, min(stock, MAX_LINE_QUANTITY)].
        let mut cart = Cart::empty();
        for qty in [1_u32, 9, 3, 12, 7] {
            cart.add_line(line(1, 1999, 6), qty);
            cart.set_quantity((ProductId::new(1), None), qty.saturating_mul(2));
            if let Some(l) = cart.find_line((ProductId::new(1), None)) {
                assert!(l.quantity <= 6);
            }
        }
    }

    #[test]
    fn test_variant_distinguishes_lines() {
        let mut cart = Cart::empty();
        let mut a = line(1, 1999, 5);
        a.variant_id = Some(VariantId::new(10));
        let mut b = line(1, 1999, 5);
        b.variant_id = Some(VariantId::new(11));
        cart.add_line(a, 1);
        cart.add_line(b, 1);
        assert_eq!(cart.lines.len(), 2);
    }
}
