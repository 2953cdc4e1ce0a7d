//! Driftwood storefront engine library.
//!
//! Cart, checkout, payment, and order orchestration behind a JSON HTTP
//! surface. Exposed as a library so the engine can be tested and reused.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod checkout;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod order;
pub mod payment;
pub mod routes;
pub mod services;
pub mod state;
