//! Status enums for orders, payments, and checkout progression.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error parsing a status string from persistence.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown {kind} status: {value}")]
pub struct StatusParseError {
    /// Which status enum was being parsed.
    pub kind: &'static str,
    /// The offending value.
    pub value: String,
}

/// Lifecycle of a placed order.
///
/// `Pending -> Confirmed` on payment success, `Pending -> Failed` on payment
/// or persistence failure. No further transitions in this engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Failed,
}

impl OrderStatus {
    /// Stable string form for persistence.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "failed" => Ok(Self::Failed),
            other => Err(StatusParseError {
                kind: "order",
                value: other.to_owned(),
            }),
        }
    }
}

/// Payment state recorded on the order row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    /// Stable string form for persistence.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(StatusParseError {
                kind: "payment",
                value: other.to_owned(),
            }),
        }
    }
}

/// Lifecycle of a payment intent, as reported by the payment gateway.
///
/// An intent is immutable once it reaches `Succeeded` or `Canceled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    Succeeded,
    Canceled,
}

impl IntentStatus {
    /// Whether the intent can still change state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Canceled)
    }

    /// Whether the intent can be confirmed with a payment method.
    #[must_use]
    pub const fn is_confirmable(&self) -> bool {
        matches!(self, Self::RequiresPaymentMethod | Self::RequiresConfirmation)
    }
}

impl fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::RequiresPaymentMethod => "requires_payment_method",
            Self::RequiresConfirmation => "requires_confirmation",
            Self::RequiresAction => "requires_action",
            Self::Processing => "processing",
            Self::Succeeded => "succeeded",
            Self::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

/// The three checkout steps, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStep {
    #[default]
    Shipping,
    Billing,
    Payment,
}

impl CheckoutStep {
    /// The step after this one, if any.
    #[must_use]
    pub const fn next(&self) -> Option<Self> {
        match self {
            Self::Shipping => Some(Self::Billing),
            Self::Billing => Some(Self::Payment),
            Self::Payment => None,
        }
    }

    /// The step before this one, if any.
    #[must_use]
    pub const fn prev(&self) -> Option<Self> {
        match self {
            Self::Shipping => None,
            Self::Billing => Some(Self::Shipping),
            Self::Payment => Some(Self::Billing),
        }
    }
}
