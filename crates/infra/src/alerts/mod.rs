//! Alert persistence and generation.

pub mod generator;
pub mod in_memory;

pub use generator::{AlertGenerator, GenerationReport};
pub use in_memory::InMemoryAlertStore;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use stockledger_core::{AlertId, TenantId};
use stockledger_inventory::{Alert, AlertIntent, AlertRule, AlertStatus};

#[derive(Debug, Error)]
pub enum AlertStoreError {
    #[error("alert storage lock poisoned")]
    Poisoned,
}

/// What `upsert_pending` did with an intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertUpsert {
    Created(Alert),
    /// The pending alert for the key was refreshed.
    Updated(Alert),
    /// A pending alert already said exactly this.
    Unchanged(Alert),
}

impl AlertUpsert {
    pub fn alert(&self) -> &Alert {
        match self {
            AlertUpsert::Created(a) | AlertUpsert::Updated(a) | AlertUpsert::Unchanged(a) => a,
        }
    }
}

/// Persistence boundary for alerts and per-company alert rules.
///
/// `upsert_pending` must be atomic per company so that two concurrent evaluations
/// never create two PENDING alerts for the same (product, location, type).
pub trait AlertStore: Send + Sync {
    fn get(&self, tenant_id: TenantId, alert_id: AlertId) -> Result<Option<Alert>, AlertStoreError>;

    /// Alerts in creation order, optionally filtered by status.
    fn list(
        &self,
        tenant_id: TenantId,
        status: Option<AlertStatus>,
    ) -> Result<Vec<Alert>, AlertStoreError>;

    fn upsert_pending(
        &self,
        tenant_id: TenantId,
        intent: AlertIntent,
        now: DateTime<Utc>,
    ) -> Result<AlertUpsert, AlertStoreError>;

    /// Compare-and-set: store `alert` only if the stored status is still `expected`.
    fn replace(&self, alert: Alert, expected: AlertStatus) -> Result<bool, AlertStoreError>;

    fn rule(&self, tenant_id: TenantId) -> Result<Option<AlertRule>, AlertStoreError>;

    fn set_rule(&self, tenant_id: TenantId, rule: AlertRule) -> Result<(), AlertStoreError>;
}

impl<S> AlertStore for Arc<S>
where
    S: AlertStore + ?Sized,
{
    fn get(&self, tenant_id: TenantId, alert_id: AlertId) -> Result<Option<Alert>, AlertStoreError> {
        (**self).get(tenant_id, alert_id)
    }

    fn list(
        &self,
        tenant_id: TenantId,
        status: Option<AlertStatus>,
    ) -> Result<Vec<Alert>, AlertStoreError> {
        (**self).list(tenant_id, status)
    }

    fn upsert_pending(
        &self,
        tenant_id: TenantId,
        intent: AlertIntent,
        now: DateTime<Utc>,
    ) -> Result<AlertUpsert, AlertStoreError> {
        (**self).upsert_pending(tenant_id, intent, now)
    }

    fn replace(&self, alert: Alert, expected: AlertStatus) -> Result<bool, AlertStoreError> {
        (**self).replace(alert, expected)
    }

    fn rule(&self, tenant_id: TenantId) -> Result<Option<AlertRule>, AlertStoreError> {
        (**self).rule(tenant_id)
    }

    fn set_rule(&self, tenant_id: TenantId, rule: AlertRule) -> Result<(), AlertStoreError> {
        (**self).set_rule(tenant_id, rule)
    }
}
