//! Narrow ports onto the product catalog, location directory and batch registry.
//!
//! The engine only ever asks these three questions; everything else about products
//! and locations lives outside it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{LocationId, ProductId, TenantId};
use stockledger_inventory::Batch;

use crate::read_model::{InMemoryTenantStore, TenantStore};

/// The slice of a product the ledger needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub product_id: ProductId,
    pub sku: String,
    #[serde(default)]
    pub cost_price: Decimal,
    #[serde(default)]
    pub max_stock_level: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub location_id: LocationId,
    pub name: String,
}

pub trait ProductCatalog: Send + Sync {
    fn product(&self, tenant_id: TenantId, product_id: ProductId) -> Option<ProductSnapshot>;
}

pub trait LocationDirectory: Send + Sync {
    fn location_exists(&self, tenant_id: TenantId, location_id: LocationId) -> bool;
}

pub trait BatchSource: Send + Sync {
    fn batches(&self, tenant_id: TenantId) -> Vec<Batch>;
    /// Companies with at least one registered batch.
    fn tenants(&self) -> Vec<TenantId>;
}

type BatchKey = (ProductId, Option<LocationId>, String);

/// In-memory catalog implementing all three ports, for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    products: InMemoryTenantStore<ProductId, ProductSnapshot>,
    locations: InMemoryTenantStore<LocationId, LocationRecord>,
    batches: InMemoryTenantStore<BatchKey, Batch>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_product(&self, tenant_id: TenantId, product: ProductSnapshot) {
        self.products.upsert(tenant_id, product.product_id, product);
    }

    pub fn upsert_location(&self, tenant_id: TenantId, location: LocationRecord) {
        self.locations.upsert(tenant_id, location.location_id, location);
    }

    /// Batches are keyed by (product, location, batch number); re-registering replaces.
    pub fn upsert_batch(&self, tenant_id: TenantId, batch: Batch) {
        let key = (batch.product_id, batch.location_id, batch.batch_number.clone());
        self.batches.upsert(tenant_id, key, batch);
    }
}

impl ProductCatalog for InMemoryCatalog {
    fn product(&self, tenant_id: TenantId, product_id: ProductId) -> Option<ProductSnapshot> {
        self.products.get(tenant_id, &product_id)
    }
}

impl LocationDirectory for InMemoryCatalog {
    fn location_exists(&self, tenant_id: TenantId, location_id: LocationId) -> bool {
        self.locations.get(tenant_id, &location_id).is_some()
    }
}

impl BatchSource for InMemoryCatalog {
    fn batches(&self, tenant_id: TenantId) -> Vec<Batch> {
        self.batches.list(tenant_id)
    }

    fn tenants(&self) -> Vec<TenantId> {
        self.batches.tenants()
    }
}
