//! Turns threshold evaluations into stored alerts.
//!
//! Evaluation itself is pure (`stockledger_inventory::alert`); this module looks up
//! the inputs (company rule, product max level, batches), deduplicates through the
//! store, and publishes `inventory.alert.raised` for every new alert.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info};

use stockledger_core::{AlertId, DomainError, TenantId};
use stockledger_inventory::{
    Alert, AlertIntent, AlertRaised, AlertRule, AlertStatus, StockBalance, StockEvent,
    evaluate_expiry, evaluate_stock,
};

use super::{AlertStore, AlertUpsert};
use crate::catalog::{BatchSource, ProductCatalog};
use crate::error::EngineResult;
use crate::notifications::LedgerPublisher;

/// Counts from one `generate` run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GenerationReport {
    pub created: usize,
    pub updated: usize,
}

impl GenerationReport {
    fn record(&mut self, outcome: &AlertUpsert) {
        match outcome {
            AlertUpsert::Created(_) => self.created += 1,
            AlertUpsert::Updated(_) => self.updated += 1,
            AlertUpsert::Unchanged(_) => {}
        }
    }
}

pub struct AlertGenerator {
    store: Arc<dyn AlertStore>,
    catalog: Arc<dyn ProductCatalog>,
    batches: Arc<dyn BatchSource>,
    publisher: LedgerPublisher,
    default_rule: AlertRule,
}

impl core::fmt::Debug for AlertGenerator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AlertGenerator")
            .field("default_rule", &self.default_rule)
            .finish_non_exhaustive()
    }
}

impl AlertGenerator {
    pub fn new(
        store: Arc<dyn AlertStore>,
        catalog: Arc<dyn ProductCatalog>,
        batches: Arc<dyn BatchSource>,
        publisher: LedgerPublisher,
        default_rule: AlertRule,
    ) -> Self {
        Self {
            store,
            catalog,
            batches,
            publisher,
            default_rule,
        }
    }

    /// The company's rule, or the configured default when none was set.
    pub fn rule(&self, tenant_id: TenantId) -> EngineResult<AlertRule> {
        Ok(self
            .store
            .rule(tenant_id)?
            .unwrap_or_else(|| self.default_rule.clone()))
    }

    pub fn set_rule(&self, tenant_id: TenantId, rule: AlertRule) -> EngineResult<AlertRule> {
        self.store.set_rule(tenant_id, rule.clone())?;
        info!(company_id = %tenant_id, ?rule, "alert rule updated");
        Ok(rule)
    }

    /// Stock-level evaluation for one balance, right after it changed.
    pub fn evaluate_balance(&self, balance: &StockBalance) -> EngineResult<Option<AlertUpsert>> {
        let rule = self.rule(balance.tenant_id)?;
        let max_stock_level = self
            .catalog
            .product(balance.tenant_id, balance.product_id)
            .and_then(|p| p.max_stock_level);

        match evaluate_stock(balance, &rule, max_stock_level) {
            Some(intent) => self.apply(balance.tenant_id, intent).map(Some),
            None => Ok(None),
        }
    }

    /// Full evaluation for a company: every balance plus every batch.
    ///
    /// Running it twice with nothing changed in between creates nothing the second time.
    pub fn generate(
        &self,
        tenant_id: TenantId,
        balances: &[StockBalance],
        today: NaiveDate,
    ) -> EngineResult<GenerationReport> {
        let rule = self.rule(tenant_id)?;
        let mut report = GenerationReport::default();

        for balance in balances {
            let max_stock_level = self
                .catalog
                .product(tenant_id, balance.product_id)
                .and_then(|p| p.max_stock_level);
            if let Some(intent) = evaluate_stock(balance, &rule, max_stock_level) {
                report.record(&self.apply(tenant_id, intent)?);
            }
        }

        let batches = self.batches.batches(tenant_id);
        for intent in evaluate_expiry(&batches, &rule, today) {
            report.record(&self.apply(tenant_id, intent)?);
        }

        debug!(
            company_id = %tenant_id,
            created = report.created,
            updated = report.updated,
            "alert generation finished"
        );
        Ok(report)
    }

    pub fn list(&self, tenant_id: TenantId, status: Option<AlertStatus>) -> EngineResult<Vec<Alert>> {
        Ok(self.store.list(tenant_id, status)?)
    }

    pub fn acknowledge(&self, tenant_id: TenantId, alert_id: AlertId) -> EngineResult<Alert> {
        self.transition(tenant_id, alert_id, |alert| alert.acknowledge(Utc::now()))
    }

    pub fn dismiss(&self, tenant_id: TenantId, alert_id: AlertId) -> EngineResult<Alert> {
        self.transition(tenant_id, alert_id, |alert| alert.dismiss(Utc::now()))
    }

    fn apply(&self, tenant_id: TenantId, intent: AlertIntent) -> EngineResult<AlertUpsert> {
        let outcome = self.store.upsert_pending(tenant_id, intent, Utc::now())?;
        if let AlertUpsert::Created(alert) = &outcome {
            info!(
                company_id = %tenant_id,
                alert_id = %alert.id,
                product_id = %alert.product_id,
                alert_type = ?alert.alert_type,
                severity = ?alert.severity,
                "alert raised"
            );
            self.publisher.publish_stock(
                *alert.id.as_uuid(),
                &StockEvent::AlertRaised(AlertRaised::from(alert)),
            );
        }
        Ok(outcome)
    }

    /// Read, transition, compare-and-set; a lost race is re-evaluated against the
    /// winner's status.
    fn transition<F>(&self, tenant_id: TenantId, alert_id: AlertId, step: F) -> EngineResult<Alert>
    where
        F: Fn(&mut Alert) -> Result<(), DomainError>,
    {
        loop {
            let current = self
                .store
                .get(tenant_id, alert_id)?
                .ok_or(DomainError::AlertNotFound(alert_id))?;

            let mut next = current.clone();
            step(&mut next)?;
            if self.store.replace(next.clone(), current.status)? {
                info!(company_id = %tenant_id, %alert_id, status = %next.status, "alert status changed");
                return Ok(next);
            }
        }
    }
}
