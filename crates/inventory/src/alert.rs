//! Threshold evaluation and the alert lifecycle.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{AlertId, DomainError, DomainResult, LocationId, ProductId, TenantId};

use crate::balance::StockBalance;

/// Per-company alerting configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRule {
    pub low_stock_threshold: u64,
    pub critical_stock_threshold: u64,
    #[serde(default)]
    pub overstock_threshold: Option<u64>,
    #[serde(default = "default_expiry_warning_days")]
    pub expiry_warning_days: u32,
}

fn default_expiry_warning_days() -> u32 {
    30
}

impl Default for AlertRule {
    fn default() -> Self {
        Self {
            low_stock_threshold: 10,
            critical_stock_threshold: 3,
            overstock_threshold: None,
            expiry_warning_days: default_expiry_warning_days(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    LowStock,
    OutOfStock,
    Overstock,
    ExpiringSoon,
    Expired,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertStatus {
    Pending,
    Acknowledged,
    Dismissed,
}

impl AlertStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertStatus::Pending => "PENDING",
            AlertStatus::Acknowledged => "ACKNOWLEDGED",
            AlertStatus::Dismissed => "DISMISSED",
        }
    }
}

impl core::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lot of a product with an expiry date, as reported by the batch source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub product_id: ProductId,
    pub location_id: Option<LocationId>,
    pub batch_number: String,
    pub quantity: u64,
    pub expiry_date: NaiveDate,
}

/// What the evaluator decided should exist. The generator turns intents into alerts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertIntent {
    pub product_id: ProductId,
    pub location_id: Option<LocationId>,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub threshold: u64,
    pub current_quantity: u64,
    pub batch_number: Option<String>,
}

/// Stock-level evaluation; first match wins.
///
/// Out of stock, then critical low, then low, then overstock. A product's own
/// `max_stock_level` takes precedence over the company overstock threshold.
pub fn evaluate_stock(
    balance: &StockBalance,
    rule: &AlertRule,
    max_stock_level: Option<u64>,
) -> Option<AlertIntent> {
    let qty = balance.quantity_on_hand;
    let intent = |alert_type, severity, threshold| AlertIntent {
        product_id: balance.product_id,
        location_id: balance.location_id,
        alert_type,
        severity,
        threshold,
        current_quantity: qty,
        batch_number: None,
    };

    if qty == 0 {
        return Some(intent(AlertType::OutOfStock, AlertSeverity::Critical, 0));
    }
    if qty <= rule.critical_stock_threshold {
        return Some(intent(
            AlertType::LowStock,
            AlertSeverity::Critical,
            rule.critical_stock_threshold,
        ));
    }
    if qty <= rule.low_stock_threshold {
        return Some(intent(
            AlertType::LowStock,
            AlertSeverity::Warning,
            rule.low_stock_threshold,
        ));
    }
    match max_stock_level.or(rule.overstock_threshold) {
        Some(limit) if qty >= limit => Some(intent(AlertType::Overstock, AlertSeverity::Warning, limit)),
        _ => None,
    }
}

/// Expiry evaluation over batches with stock left.
///
/// Batches are grouped per (product, location); the earliest-expiring batch of each
/// group decides, so the one-pending-alert-per-key rule holds.
/// The threshold is the number of days remaining (0 once expired).
pub fn evaluate_expiry(batches: &[Batch], rule: &AlertRule, today: NaiveDate) -> Vec<AlertIntent> {
    let mut earliest: BTreeMap<(ProductId, Option<LocationId>), &Batch> = BTreeMap::new();
    for batch in batches.iter().filter(|b| b.quantity > 0) {
        earliest
            .entry((batch.product_id, batch.location_id))
            .and_modify(|current| {
                if batch.expiry_date < current.expiry_date {
                    *current = batch;
                }
            })
            .or_insert(batch);
    }

    earliest
        .into_values()
        .filter_map(|batch| {
            let days_left = (batch.expiry_date - today).num_days();
            let (alert_type, severity, threshold) = if days_left <= 0 {
                (AlertType::Expired, AlertSeverity::Critical, 0)
            } else if days_left <= i64::from(rule.expiry_warning_days) {
                (AlertType::ExpiringSoon, AlertSeverity::Warning, days_left.unsigned_abs())
            } else {
                return None;
            };
            Some(AlertIntent {
                product_id: batch.product_id,
                location_id: batch.location_id,
                alert_type,
                severity,
                threshold,
                current_quantity: batch.quantity,
                batch_number: Some(batch.batch_number.clone()),
            })
        })
        .collect()
}

/// Stored alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub location_id: Option<LocationId>,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub threshold: u64,
    pub current_quantity: u64,
    pub batch_number: Option<String>,
    pub status: AlertStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub dismissed_at: Option<DateTime<Utc>>,
}

impl Alert {
    pub fn raise(id: AlertId, tenant_id: TenantId, intent: AlertIntent, now: DateTime<Utc>) -> Self {
        Self {
            id,
            tenant_id,
            product_id: intent.product_id,
            location_id: intent.location_id,
            alert_type: intent.alert_type,
            severity: intent.severity,
            threshold: intent.threshold,
            current_quantity: intent.current_quantity,
            batch_number: intent.batch_number,
            status: AlertStatus::Pending,
            created_at: now,
            updated_at: now,
            acknowledged_at: None,
            dismissed_at: None,
        }
    }

    /// Whether this alert occupies the pending slot `intent` would need.
    pub fn matches(&self, intent: &AlertIntent) -> bool {
        self.status == AlertStatus::Pending
            && self.product_id == intent.product_id
            && self.location_id == intent.location_id
            && self.alert_type == intent.alert_type
    }

    /// Refresh a pending alert in place. Returns `false` when nothing changed.
    pub fn refresh(&mut self, intent: &AlertIntent, now: DateTime<Utc>) -> bool {
        let changed = self.threshold != intent.threshold
            || self.severity != intent.severity
            || self.current_quantity != intent.current_quantity
            || self.batch_number != intent.batch_number;
        if changed {
            self.threshold = intent.threshold;
            self.severity = intent.severity;
            self.current_quantity = intent.current_quantity;
            self.batch_number = intent.batch_number.clone();
            self.updated_at = now;
        }
        changed
    }

    /// PENDING -> ACKNOWLEDGED.
    pub fn acknowledge(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != AlertStatus::Pending {
            return Err(DomainError::invalid_transition(self.status, AlertStatus::Acknowledged));
        }
        self.status = AlertStatus::Acknowledged;
        self.acknowledged_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// PENDING | ACKNOWLEDGED -> DISMISSED.
    pub fn dismiss(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status == AlertStatus::Dismissed {
            return Err(DomainError::invalid_transition(self.status, AlertStatus::Dismissed));
        }
        self.status = AlertStatus::Dismissed;
        self.dismissed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balance::BalanceKey;

    fn balance_of(qty: u64) -> StockBalance {
        let mut b = StockBalance::zeroed(BalanceKey::new(
            TenantId::new(),
            ProductId::new(),
            Some(LocationId::new()),
        ));
        b.quantity_on_hand = qty;
        b
    }

    fn rule() -> AlertRule {
        AlertRule {
            low_stock_threshold: 5,
            critical_stock_threshold: 2,
            overstock_threshold: Some(100),
            expiry_warning_days: 14,
        }
    }

    #[test]
    fn zero_stock_is_out_of_stock() {
        let i = evaluate_stock(&balance_of(0), &rule(), None).unwrap();
        assert_eq!(i.alert_type, AlertType::OutOfStock);
        assert_eq!(i.severity, AlertSeverity::Critical);
    }

    #[test]
    fn low_stock_severity_depends_on_critical_threshold() {
        let critical = evaluate_stock(&balance_of(2), &rule(), None).unwrap();
        assert_eq!(critical.alert_type, AlertType::LowStock);
        assert_eq!(critical.severity, AlertSeverity::Critical);
        assert_eq!(critical.threshold, 2);

        let warning = evaluate_stock(&balance_of(4), &rule(), None).unwrap();
        assert_eq!(warning.severity, AlertSeverity::Warning);
        assert_eq!(warning.threshold, 5);

        assert!(evaluate_stock(&balance_of(6), &rule(), None).is_none());
    }

    #[test]
    fn product_max_level_overrides_company_overstock() {
        let i = evaluate_stock(&balance_of(50), &rule(), Some(40)).unwrap();
        assert_eq!(i.alert_type, AlertType::Overstock);
        assert_eq!(i.threshold, 40);

        assert!(evaluate_stock(&balance_of(99), &rule(), Some(120)).is_none());
        assert!(evaluate_stock(&balance_of(100), &rule(), None).is_some());
    }

    #[test]
    fn expiry_uses_earliest_batch_per_location() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let product_id = ProductId::new();
        let location_id = Some(LocationId::new());
        let batch = |n: &str, days: i64, qty| Batch {
            product_id,
            location_id,
            batch_number: n.to_string(),
            quantity: qty,
            expiry_date: today + chrono::Duration::days(days),
        };

        let intents = evaluate_expiry(
            &[batch("B-1", 10, 4), batch("B-2", 3, 4), batch("B-3", -1, 0)],
            &rule(),
            today,
        );
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].alert_type, AlertType::ExpiringSoon);
        assert_eq!(intents[0].threshold, 3);
        assert_eq!(intents[0].batch_number.as_deref(), Some("B-2"));

        let expired = evaluate_expiry(&[batch("B-9", 0, 1)], &rule(), today);
        assert_eq!(expired[0].alert_type, AlertType::Expired);
        assert_eq!(expired[0].threshold, 0);

        assert!(evaluate_expiry(&[batch("B-5", 30, 1)], &rule(), today).is_empty());
    }

    #[test]
    fn alert_lifecycle_transitions() {
        let intent = evaluate_stock(&balance_of(1), &rule(), None).unwrap();
        let mut alert = Alert::raise(AlertId::new(), TenantId::new(), intent.clone(), Utc::now());
        assert!(alert.matches(&intent));
        assert!(!alert.refresh(&intent, Utc::now()));

        alert.acknowledge(Utc::now()).unwrap();
        assert!(!alert.matches(&intent));
        assert_eq!(alert.acknowledge(Utc::now()).unwrap_err().code(), "INVALID_TRANSITION");

        alert.dismiss(Utc::now()).unwrap();
        assert_eq!(alert.status, AlertStatus::Dismissed);
        assert!(alert.dismiss(Utc::now()).is_err());
    }
}
