//! List the built-in demo catalog.
//!
//! The storefront runs against the fixture catalog when no `CATALOG_API_URL`
//! is configured. This command prints the fixture assortment so local
//! development knows which product and variant ids the sandbox accepts.

use tracing::info;

use driftwood_storefront::services::FixtureCatalog;

/// Print the fixture catalog assortment.
pub fn run() {
    let catalog = FixtureCatalog::demo();
    let mut items: Vec<_> = catalog.items().collect();
    items.sort_by_key(|item| (item.product_id, item.variant_id));

    for item in &items {
        match item.variant_id {
            Some(variant) => info!(
                product_id = %item.product_id,
                variant_id = %variant,
                price = %item.price,
                stock = item.stock,
                "{}", item.name,
            ),
            None => info!(
                product_id = %item.product_id,
                price = %item.price,
                stock = item.stock,
                "{}", item.name,
            ),
        }
    }
    info!(count = items.len(), "fixture catalog listed");
}
