//! External service clients.

pub mod catalog;
pub mod notifier;

pub use catalog::{Catalog, CatalogError, CatalogItem, FixtureCatalog, HttpCatalog};
pub use notifier::ConfirmationNotifier;
