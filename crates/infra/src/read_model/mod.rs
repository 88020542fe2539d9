//! Company-isolated key/value storage used by the in-memory adapters.

pub mod tenant_store;

pub use tenant_store::{InMemoryTenantStore, TenantStore};
