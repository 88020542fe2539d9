//! Movement processing: validation, ledger write, then alerting and publication.
//!
//! Catalog lookups run before the balance lock is taken; their outcome is only
//! reported after the stock checks, so a movement that is both invalid and for an
//! unknown product fails with the stock error.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use stockledger_core::{DomainError, LocationId, MovementId, ProductId, TenantId};
use stockledger_inventory::{
    BalanceKey, Movement, MovementInput, MovementRecorded, StockBalance, StockEvent,
};

use crate::alerts::AlertGenerator;
use crate::catalog::{LocationDirectory, ProductCatalog};
use crate::error::EngineResult;
use crate::ledger::{Ledger, LedgerEntry};
use crate::notifications::LedgerPublisher;

pub struct MovementProcessor {
    ledger: Arc<Ledger>,
    catalog: Arc<dyn ProductCatalog>,
    locations: Arc<dyn LocationDirectory>,
    alerts: Arc<AlertGenerator>,
    publisher: LedgerPublisher,
}

impl core::fmt::Debug for MovementProcessor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MovementProcessor")
            .field("ledger", &self.ledger)
            .finish_non_exhaustive()
    }
}

impl MovementProcessor {
    pub fn new(
        ledger: Arc<Ledger>,
        catalog: Arc<dyn ProductCatalog>,
        locations: Arc<dyn LocationDirectory>,
        alerts: Arc<AlertGenerator>,
        publisher: LedgerPublisher,
    ) -> Self {
        Self {
            ledger,
            catalog,
            locations,
            alerts,
            publisher,
        }
    }

    /// Validate and record one movement.
    pub fn create(&self, tenant_id: TenantId, input: MovementInput) -> EngineResult<Movement> {
        let key = BalanceKey::new(tenant_id, input.product_id, input.location_id);
        debug!(
            company_id = %tenant_id,
            product_id = %input.product_id,
            movement_type = %input.movement_type,
            quantity = input.quantity,
            "recording movement"
        );

        let product = self.catalog.product(tenant_id, input.product_id);
        let missing_location = input
            .location_id
            .filter(|location_id| !self.locations.location_exists(tenant_id, *location_id));

        let result = self.ledger.record(key, input.check(), |_| {
            let product = product.ok_or(DomainError::ProductNotFound(input.product_id))?;
            if let Some(location_id) = missing_location {
                return Err(DomainError::LocationNotFound(location_id).into());
            }
            Ok(Movement::from_input(
                MovementId::new(),
                tenant_id,
                &input,
                product.cost_price,
                Utc::now(),
            )?)
        });

        match result {
            Ok(entry) => {
                self.after_commit(&entry);
                Ok(entry.movement)
            }
            Err(err) => {
                warn!(
                    company_id = %tenant_id,
                    product_id = %input.product_id,
                    movement_type = %input.movement_type,
                    code = err.code(),
                    error = %err,
                    "movement rejected"
                );
                Err(err)
            }
        }
    }

    /// PENDING -> COMPLETED against the balance as it is now.
    pub fn approve(&self, tenant_id: TenantId, movement_id: MovementId) -> EngineResult<Movement> {
        let entry = self.ledger.approve(tenant_id, movement_id).inspect_err(|err| {
            warn!(company_id = %tenant_id, %movement_id, code = err.code(), "approval rejected");
        })?;
        self.after_commit(&entry);
        Ok(entry.movement)
    }

    /// PENDING -> CANCELLED.
    pub fn reject(&self, tenant_id: TenantId, movement_id: MovementId) -> EngineResult<Movement> {
        let movement = self.ledger.reject(tenant_id, movement_id)?;
        info!(company_id = %tenant_id, %movement_id, "movement rejected by approver");
        self.publish(&movement);
        Ok(movement)
    }

    pub fn get(&self, tenant_id: TenantId, movement_id: MovementId) -> EngineResult<Movement> {
        self.ledger.movement(tenant_id, movement_id)
    }

    pub fn list(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        location_id: Option<LocationId>,
    ) -> EngineResult<Vec<Movement>> {
        self.ledger
            .movements(BalanceKey::new(tenant_id, product_id, location_id))
    }

    pub fn balance(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        location_id: Option<LocationId>,
    ) -> EngineResult<StockBalance> {
        self.ledger
            .balance(BalanceKey::new(tenant_id, product_id, location_id))
    }

    /// Runs with no lock held. Alerting failures never undo a committed movement.
    fn after_commit(&self, entry: &LedgerEntry) {
        let m = &entry.movement;
        info!(
            company_id = %m.tenant_id,
            product_id = %m.product_id,
            location_id = ?m.location_id,
            movement_id = %m.id,
            movement_type = %m.movement_type,
            status = %m.status,
            quantity = m.quantity,
            quantity_after = entry.after.quantity_on_hand,
            "movement recorded"
        );

        if entry.applied() {
            if let Err(err) = self.alerts.evaluate_balance(&entry.after) {
                warn!(
                    company_id = %m.tenant_id,
                    movement_id = %m.id,
                    code = err.code(),
                    error = %err,
                    "threshold evaluation failed"
                );
            }
        }
        self.publish(m);
    }

    fn publish(&self, movement: &Movement) {
        self.publisher.publish_stock(
            *movement.id.as_uuid(),
            &StockEvent::MovementRecorded(MovementRecorded::from(movement)),
        );
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rust_decimal_macros::dec;
    use stockledger_inventory::{AlertRule, AlertType, MovementStatus, MovementType};

    use super::*;
    use crate::alerts::InMemoryAlertStore;
    use crate::catalog::{InMemoryCatalog, LocationRecord, ProductSnapshot};
    use crate::ledger::InMemoryLedgerStore;
    use crate::notifications::LedgerBus;

    struct Fixture {
        processor: MovementProcessor,
        alerts: Arc<AlertGenerator>,
        tenant: TenantId,
        product_id: ProductId,
        location_id: LocationId,
    }

    fn fixture() -> Fixture {
        let catalog = Arc::new(InMemoryCatalog::new());
        let publisher = LedgerPublisher::new(Arc::new(LedgerBus::new()));
        let tenant = TenantId::new();
        let product_id = ProductId::new();
        let location_id = LocationId::new();
        catalog.upsert_product(
            tenant,
            ProductSnapshot {
                product_id,
                sku: "WIDGET".to_string(),
                cost_price: dec!(2.50),
                max_stock_level: None,
            },
        );
        catalog.upsert_location(
            tenant,
            LocationRecord {
                location_id,
                name: "Main".to_string(),
            },
        );

        let alerts = Arc::new(AlertGenerator::new(
            Arc::new(InMemoryAlertStore::new()),
            catalog.clone(),
            catalog.clone(),
            publisher.clone(),
            AlertRule {
                low_stock_threshold: 5,
                critical_stock_threshold: 1,
                overstock_threshold: None,
                expiry_warning_days: 30,
            },
        ));
        let ledger = Arc::new(Ledger::new(
            Arc::new(InMemoryLedgerStore::new()),
            Duration::from_millis(200),
        ));
        Fixture {
            processor: MovementProcessor::new(ledger, catalog.clone(), catalog, alerts.clone(), publisher),
            alerts,
            tenant,
            product_id,
            location_id,
        }
    }

    impl Fixture {
        fn input(&self, t: MovementType, qty: u64, unit_cost: rust_decimal::Decimal) -> MovementInput {
            MovementInput::new(self.product_id, Some(self.location_id), t, qty, unit_cost)
        }
    }

    #[test]
    fn outbound_beyond_balance_reports_available_and_requested() {
        let f = fixture();
        f.processor
            .create(f.tenant, f.input(MovementType::Inbound, 10, dec!(1)))
            .unwrap();

        let err = f
            .processor
            .create(f.tenant, f.input(MovementType::Outbound, 15, dec!(1)))
            .unwrap_err();
        assert_eq!(
            err.as_domain(),
            Some(&DomainError::InsufficientStock {
                available: 10,
                requested: 15
            })
        );
        let balance = f.processor.balance(f.tenant, f.product_id, Some(f.location_id)).unwrap();
        assert_eq!(balance.quantity_on_hand, 10);
    }

    #[test]
    fn inbound_without_cost_is_rejected() {
        let f = fixture();
        let err = f
            .processor
            .create(f.tenant, f.input(MovementType::Inbound, 5, dec!(0)))
            .unwrap_err();
        assert_eq!(err.code(), "UNIT_COST_REQUIRED");
    }

    #[test]
    fn stock_errors_take_precedence_over_catalog_errors() {
        let f = fixture();
        let unknown = MovementInput::new(ProductId::new(), None, MovementType::Outbound, 1, dec!(1));
        let err = f.processor.create(f.tenant, unknown.clone()).unwrap_err();
        assert_eq!(err.code(), "INSUFFICIENT_STOCK");

        let inbound = MovementInput {
            movement_type: MovementType::Inbound,
            ..unknown
        };
        let err = f.processor.create(f.tenant, inbound).unwrap_err();
        assert_eq!(err.code(), "PRODUCT_NOT_FOUND");

        let nowhere = MovementInput::new(
            f.product_id,
            Some(LocationId::new()),
            MovementType::Inbound,
            1,
            dec!(1),
        );
        let err = f.processor.create(f.tenant, nowhere).unwrap_err();
        assert_eq!(err.code(), "LOCATION_NOT_FOUND");
    }

    #[test]
    fn adjustment_inherits_product_cost() {
        let f = fixture();
        let m = f
            .processor
            .create(f.tenant, f.input(MovementType::AdjustmentIn, 4, dec!(0)))
            .unwrap();
        assert_eq!(m.unit_cost, dec!(2.50));
        assert_eq!(m.total_cost, dec!(10.00));
    }

    #[test]
    fn crossing_low_stock_raises_one_alert() {
        let f = fixture();
        f.processor
            .create(f.tenant, f.input(MovementType::Inbound, 6, dec!(1)))
            .unwrap();
        f.processor
            .create(f.tenant, f.input(MovementType::Outbound, 2, dec!(1)))
            .unwrap();

        let pending = f
            .alerts
            .list(f.tenant, Some(stockledger_inventory::AlertStatus::Pending))
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].alert_type, AlertType::LowStock);
        assert_eq!(pending[0].current_quantity, 4);
    }

    #[test]
    fn pending_movement_waits_for_approval() {
        let f = fixture();
        f.processor
            .create(f.tenant, f.input(MovementType::Inbound, 9, dec!(1)))
            .unwrap();
        let pending = f
            .processor
            .create(
                f.tenant,
                f.input(MovementType::Damage, 3, dec!(0)).requiring_approval(),
            )
            .unwrap();
        assert_eq!(pending.status, MovementStatus::Pending);
        assert_eq!(
            f.processor
                .balance(f.tenant, f.product_id, Some(f.location_id))
                .unwrap()
                .quantity_on_hand,
            9
        );

        let approved = f.processor.approve(f.tenant, pending.id).unwrap();
        assert_eq!(approved.quantity_after, Some(6));

        let err = f.processor.reject(f.tenant, pending.id).unwrap_err();
        assert_eq!(err.code(), "INVALID_TRANSITION");
        assert_eq!(
            f.processor
                .list(f.tenant, f.product_id, Some(f.location_id))
                .unwrap()
                .len(),
            2
        );
    }
}
