//! Core types for Driftwood.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod identity;
pub mod money;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use identity::{GuestToken, Identity, OrderOwner};
pub use money::{CurrencyCode, Money, MoneyError};
pub use status::*;
