//! Monetary amounts with decimal arithmetic.
//!
//! Amounts are carried as `rust_decimal::Decimal` in the currency's standard
//! unit (dollars, not cents). The payment wire works in minor units, so
//! [`Money::minor_units`] performs the conversion at that boundary.

use core::fmt;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Errors from monetary arithmetic and conversion.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    /// Two amounts in different currencies were combined.
    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch {
        /// Currency of the left operand.
        left: CurrencyCode,
        /// Currency of the right operand.
        right: CurrencyCode,
    },
    /// The amount does not fit the target representation.
    #[error("amount out of range: {0}")]
    OutOfRange(Decimal),
}

/// A monetary amount with its currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// Amount in the currency's standard unit (e.g., dollars, not cents).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency: CurrencyCode,
}

impl Money {
    /// Create a new amount.
    #[must_use]
    pub const fn new(amount: Decimal, currency: CurrencyCode) -> Self {
        Self { amount, currency }
    }

    /// Zero in the given currency.
    #[must_use]
    pub const fn zero(currency: CurrencyCode) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency,
        }
    }

    /// Create an amount from minor currency units (e.g., cents for USD).
    #[must_use]
    pub fn from_minor_units(minor: i64, currency: CurrencyCode) -> Self {
        Self {
            amount: Decimal::new(minor, 2),
            currency,
        }
    }

    /// Convert to minor currency units, rounding to the nearest cent.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::OutOfRange` if the amount does not fit in `i64`.
    pub fn minor_units(&self) -> Result<i64, MoneyError> {
        let cents = (self.amount * Decimal::ONE_HUNDRED).round();
        cents.to_i64().ok_or(MoneyError::OutOfRange(self.amount))
    }

    /// Add another amount in the same currency.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::CurrencyMismatch` if the currencies differ.
    pub fn checked_add(&self, other: &Self) -> Result<Self, MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch {
                left: self.currency,
                right: other.currency,
            });
        }
        Ok(Self {
            amount: self.amount + other.amount,
            currency: self.currency,
        })
    }

    /// Multiply by a quantity (e.g., unit price times line quantity).
    #[must_use]
    pub fn times(&self, quantity: u32) -> Self {
        Self {
            amount: self.amount * Decimal::from(quantity),
            currency: self.currency,
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:.2}", self.currency.symbol(), self.amount)
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum CurrencyCode {
    #[default]
    Usd,
    Eur,
    Gbp,
    Cad,
    Aud,
}

impl CurrencyCode {
    /// The ISO 4217 code string.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Gbp => "GBP",
            Self::Cad => "CAD",
            Self::Aud => "AUD",
        }
    }

    /// Parse an ISO 4217 code string.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "USD" => Some(Self::Usd),
            "EUR" => Some(Self::Eur),
            "GBP" => Some(Self::Gbp),
            "CAD" => Some(Self::Cad),
            "AUD" => Some(Self::Aud),
            _ => None,
        }
    }

    /// Display symbol for the currency.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::Usd | Self::Cad | Self::Aud => "$",
            Self::Eur => "\u{20ac}",
            Self::Gbp => "\u{a3}",
        }
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_minor_units_roundtrip() {
        let price = Money::from_minor_units(1999, CurrencyCode::Usd);
        assert_eq!(price.amount, Decimal::new(1999, 2));
        assert_eq!(price.minor_units().unwrap(), 1999);
    }

    #[test]
    fn test_minor_units_rounds() {
        let price = Money::new(Decimal::new(19995, 3), CurrencyCode::Usd); // 19.995
        assert_eq!(price.minor_units().unwrap(), 2000);
    }

    #[test]
    fn test_checked_add_same_currency() {
        let a = Money::from_minor_units(150, CurrencyCode::Usd);
        let b = Money::from_minor_units(250, CurrencyCode::Usd);
        assert_eq!(a.checked_add(&b).unwrap().minor_units().unwrap(), 400);
    }

    #[test]
    fn test_checked_add_currency_mismatch() {
        let a = Money::from_minor_units(150, CurrencyCode::Usd);
        let b = Money::from_minor_units(250, CurrencyCode::Eur);
        assert!(matches!(
            a.checked_add(&b),
            Err(MoneyError::CurrencyMismatch { .. })
        ));
    }

    #[test]
    fn test_times() {
        let unit = Money::from_minor_units(1250, CurrencyCode::Usd);
        assert_eq!(unit.times(3).minor_units().unwrap(), 3750);
    }

    #[test]
    fn test_display() {
        let price = Money::from_minor_units(1999, CurrencyCode::Usd);
        assert_eq!(price.to_string(), "$19.99");
    }
}
