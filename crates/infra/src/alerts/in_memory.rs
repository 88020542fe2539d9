use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use stockledger_core::{AlertId, TenantId};
use stockledger_inventory::{Alert, AlertIntent, AlertRule, AlertStatus};

use super::{AlertStore, AlertStoreError, AlertUpsert};

#[derive(Debug, Default)]
struct Tables {
    /// Per company, in creation order.
    alerts: HashMap<TenantId, Vec<Alert>>,
    rules: HashMap<TenantId, AlertRule>,
}

/// In-memory alert store, for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryAlertStore {
    tables: RwLock<Tables>,
}

impl InMemoryAlertStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AlertStore for InMemoryAlertStore {
    fn get(&self, tenant_id: TenantId, alert_id: AlertId) -> Result<Option<Alert>, AlertStoreError> {
        let tables = self.tables.read().map_err(|_| AlertStoreError::Poisoned)?;
        Ok(tables
            .alerts
            .get(&tenant_id)
            .and_then(|alerts| alerts.iter().find(|a| a.id == alert_id))
            .cloned())
    }

    fn list(
        &self,
        tenant_id: TenantId,
        status: Option<AlertStatus>,
    ) -> Result<Vec<Alert>, AlertStoreError> {
        let tables = self.tables.read().map_err(|_| AlertStoreError::Poisoned)?;
        Ok(tables
            .alerts
            .get(&tenant_id)
            .map(|alerts| {
                alerts
                    .iter()
                    .filter(|a| status.is_none_or(|s| a.status == s))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn upsert_pending(
        &self,
        tenant_id: TenantId,
        intent: AlertIntent,
        now: DateTime<Utc>,
    ) -> Result<AlertUpsert, AlertStoreError> {
        let mut tables = self.tables.write().map_err(|_| AlertStoreError::Poisoned)?;
        let alerts = tables.alerts.entry(tenant_id).or_default();

        if let Some(existing) = alerts.iter_mut().find(|a| a.matches(&intent)) {
            return Ok(if existing.refresh(&intent, now) {
                AlertUpsert::Updated(existing.clone())
            } else {
                AlertUpsert::Unchanged(existing.clone())
            });
        }

        let alert = Alert::raise(AlertId::new(), tenant_id, intent, now);
        alerts.push(alert.clone());
        Ok(AlertUpsert::Created(alert))
    }

    fn replace(&self, alert: Alert, expected: AlertStatus) -> Result<bool, AlertStoreError> {
        let mut tables = self.tables.write().map_err(|_| AlertStoreError::Poisoned)?;
        let Some(slot) = tables
            .alerts
            .get_mut(&alert.tenant_id)
            .and_then(|alerts| alerts.iter_mut().find(|a| a.id == alert.id))
        else {
            return Ok(false);
        };
        if slot.status != expected {
            return Ok(false);
        }
        *slot = alert;
        Ok(true)
    }

    fn rule(&self, tenant_id: TenantId) -> Result<Option<AlertRule>, AlertStoreError> {
        let tables = self.tables.read().map_err(|_| AlertStoreError::Poisoned)?;
        Ok(tables.rules.get(&tenant_id).cloned())
    }

    fn set_rule(&self, tenant_id: TenantId, rule: AlertRule) -> Result<(), AlertStoreError> {
        let mut tables = self.tables.write().map_err(|_| AlertStoreError::Poisoned)?;
        tables.rules.insert(tenant_id, rule);
        Ok(())
    }
}
