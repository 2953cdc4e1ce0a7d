//! Product catalog lookups.
//!
//! The cart stores price, stock, and display snapshots taken at add time,
//! so the only catalog operation the engine needs is a point lookup. Two
//! implementations: [`HttpCatalog`] against the catalog service, and
//! [`FixtureCatalog`] with a small built-in assortment for development and
//! tests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use driftwood_core::{CurrencyCode, Money, ProductId, VariantId};

use crate::cart::{CartLine, LineDisplay};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a catalog snapshot stays fresh. Stock moves, so keep it short.
const CACHE_TTL: Duration = Duration::from_secs(60);
const CACHE_CAPACITY: u64 = 1_024;

/// Catalog lookup failures.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// HTTP request failed.
    #[error("catalog request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The catalog returned an unexpected response.
    #[error("catalog returned {status}")]
    UnexpectedStatus { status: u16 },
}

/// A product (or variant) as the catalog describes it right now.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CatalogItem {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub name: String,
    pub price: Decimal,
    pub currency: CurrencyCode,
    pub stock: u32,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
}

impl CatalogItem {
    /// Freeze this item into a cart line snapshot.
    #[must_use]
    pub fn to_cart_line(&self, quantity: u32) -> CartLine {
        CartLine {
            product_id: self.product_id,
            variant_id: self.variant_id,
            quantity,
            unit_price: Money::new(self.price, self.currency),
            stock: self.stock,
            display: LineDisplay {
                name: self.name.clone(),
                image_url: self.image_url.clone(),
                category: self.category.clone(),
                brand: self.brand.clone(),
            },
        }
    }
}

/// Point lookup into the product catalog.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Fetch one product or variant. `Ok(None)` means it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] when the catalog cannot be reached.
    async fn lookup(
        &self,
        product_id: ProductId,
        variant_id: Option<VariantId>,
    ) -> Result<Option<CatalogItem>, CatalogError>;
}

/// Catalog backed by the catalog service's REST API.
///
/// Lookups are cached for a short TTL. Misses (404) are cached too so a
/// page hammering a dead product id does not hammer the catalog.
#[derive(Clone)]
pub struct HttpCatalog {
    client: reqwest::Client,
    base_url: String,
    cache: Cache<(ProductId, Option<VariantId>), Option<CatalogItem>>,
}

impl HttpCatalog {
    /// Build a client for the catalog at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Http`] if the HTTP client fails to build.
    pub fn new(base_url: &str) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            cache: Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(CACHE_TTL)
                .build(),
        })
    }

    async fn fetch(
        &self,
        product_id: ProductId,
        variant_id: Option<VariantId>,
    ) -> Result<Option<CatalogItem>, CatalogError> {
        let mut url = format!("{}/v1/products/{product_id}", self.base_url);
        if let Some(variant) = variant_id {
            url.push_str(&format!("?variant={variant}"));
        }
        let response = self.client.get(url).send().await?;
        match response.status() {
            StatusCode::OK => Ok(Some(response.json::<CatalogItem>().await?)),
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(CatalogError::UnexpectedStatus {
                status: status.as_u16(),
            }),
        }
    }
}

#[async_trait]
impl Catalog for HttpCatalog {
    async fn lookup(
        &self,
        product_id: ProductId,
        variant_id: Option<VariantId>,
    ) -> Result<Option<CatalogItem>, CatalogError> {
        let key = (product_id, variant_id);
        if let Some(cached) = self.cache.get(&key).await {
            return Ok(cached);
        }
        // Errors are not cached; the next lookup retries.
        let item = self.fetch(product_id, variant_id).await?;
        self.cache.insert(key, item.clone()).await;
        Ok(item)
    }
}

/// Built-in catalog for development and tests.
#[derive(Clone, Default)]
pub struct FixtureCatalog {
    items: HashMap<(ProductId, Option<VariantId>), CatalogItem>,
}

impl FixtureCatalog {
    /// A small demo assortment.
    #[must_use]
    pub fn demo() -> Self {
        let mut catalog = Self::default();
        catalog.insert(CatalogItem {
            product_id: ProductId::new(1),
            variant_id: None,
            name: "Driftwood Tote".to_owned(),
            price: Decimal::new(4500, 2),
            currency: CurrencyCode::Usd,
            stock: 25,
            image_url: Some("https://cdn.example.com/tote.jpg".to_owned()),
            category: Some("Bags".to_owned()),
            brand: Some("Driftwood".to_owned()),
        });
        catalog.insert(CatalogItem {
            product_id: ProductId::new(2),
            variant_id: Some(VariantId::new(21)),
            name: "Canvas Jacket - Medium".to_owned(),
            price: Decimal::new(12900, 2),
            currency: CurrencyCode::Usd,
            stock: 8,
            image_url: Some("https://cdn.example.com/jacket.jpg".to_owned()),
            category: Some("Outerwear".to_owned()),
            brand: Some("Driftwood".to_owned()),
        });
        catalog.insert(CatalogItem {
            product_id: ProductId::new(3),
            variant_id: None,
            name: "Enamel Mug".to_owned(),
            price: Decimal::new(1800, 2),
            currency: CurrencyCode::Usd,
            stock: 3,
            image_url: None,
            category: Some("Kitchen".to_owned()),
            brand: None,
        });
        catalog
    }

    /// Add or replace an item.
    pub fn insert(&mut self, item: CatalogItem) {
        self.items
            .insert((item.product_id, item.variant_id), item);
    }

    /// All items, in no particular order.
    pub fn items(&self) -> impl Iterator<Item = &CatalogItem> {
        self.items.values()
    }
}

#[async_trait]
impl Catalog for FixtureCatalog {
    async fn lookup(
        &self,
        product_id: ProductId,
        variant_id: Option<VariantId>,
    ) -> Result<Option<CatalogItem>, CatalogError> {
        Ok(self.items.get(&(product_id, variant_id)).cloned())
    }
}
