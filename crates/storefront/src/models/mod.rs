//! Shared model types for the storefront.

pub mod session;

pub use session::{CurrentUser, keys as session_keys};
