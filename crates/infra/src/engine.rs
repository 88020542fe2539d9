//! `StockEngine`: the one entry point callers (HTTP, jobs, tests) use.
//!
//! Wires the ledger, movement processor, transfer orchestrator and alert generator
//! over a set of ports, and shares one ledger bus between them.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use stockledger_core::{AlertId, LocationId, MovementId, ProductId, TenantId, TransferId};
use stockledger_inventory::pricing;
use stockledger_inventory::{
    Alert, AlertRule, AlertStatus, Movement, MovementInput, PriceBreakdown, PricingInput,
    StockBalance, Transfer, TransferStatus,
};

use crate::alerts::{AlertGenerator, AlertStore, GenerationReport, InMemoryAlertStore};
use crate::catalog::{BatchSource, InMemoryCatalog, LocationDirectory, ProductCatalog};
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::event_store::{EventStore, InMemoryEventStore};
use crate::ledger::{InMemoryLedgerStore, Ledger, LedgerStore};
use crate::movements::MovementProcessor;
use crate::notifications::{LedgerBus, LedgerPublisher};
use crate::transfers::{TransferInput, TransferOrchestrator};

/// Everything the engine consumes from the outside.
#[derive(Clone)]
pub struct EnginePorts {
    pub ledger: Arc<dyn LedgerStore>,
    pub alerts: Arc<dyn AlertStore>,
    pub events: Arc<dyn EventStore>,
    pub products: Arc<dyn ProductCatalog>,
    pub locations: Arc<dyn LocationDirectory>,
    pub batches: Arc<dyn BatchSource>,
}

impl EnginePorts {
    /// In-memory stores, with `catalog` serving all three catalog ports.
    pub fn in_memory(catalog: Arc<InMemoryCatalog>) -> Self {
        Self {
            ledger: Arc::new(InMemoryLedgerStore::new()),
            alerts: Arc::new(InMemoryAlertStore::new()),
            events: Arc::new(InMemoryEventStore::new()),
            products: catalog.clone(),
            locations: catalog.clone(),
            batches: catalog,
        }
    }
}

pub struct StockEngine {
    config: EngineConfig,
    bus: Arc<LedgerBus>,
    ledger: Arc<Ledger>,
    movements: Arc<MovementProcessor>,
    transfers: TransferOrchestrator,
    alerts: Arc<AlertGenerator>,
    batches: Arc<dyn BatchSource>,
}

impl core::fmt::Debug for StockEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StockEngine")
            .field("config", &self.config)
            .field("transfers", &self.transfers)
            .finish_non_exhaustive()
    }
}

impl StockEngine {
    pub fn new(ports: EnginePorts, config: EngineConfig) -> Self {
        let bus = Arc::new(LedgerBus::new());
        let publisher = LedgerPublisher::new(bus.clone());

        let ledger = Arc::new(Ledger::new(ports.ledger, config.lock_timeout));
        let alerts = Arc::new(AlertGenerator::new(
            ports.alerts,
            ports.products.clone(),
            ports.batches.clone(),
            publisher.clone(),
            config.default_alert_rule.clone(),
        ));
        let movements = Arc::new(MovementProcessor::new(
            ledger.clone(),
            ports.products.clone(),
            ports.locations.clone(),
            alerts.clone(),
            publisher.clone(),
        ));
        let transfers = TransferOrchestrator::new(
            ports.events,
            publisher,
            movements.clone(),
            ports.products,
            ports.locations,
            &config,
        );

        Self {
            config,
            bus,
            ledger,
            movements,
            transfers,
            alerts,
            batches: ports.batches,
        }
    }

    /// Fully in-memory engine; the returned catalog is where products, locations
    /// and batches are registered.
    pub fn in_memory(config: EngineConfig) -> (Self, Arc<InMemoryCatalog>) {
        let catalog = Arc::new(InMemoryCatalog::new());
        let engine = Self::new(EnginePorts::in_memory(catalog.clone()), config);
        (engine, catalog)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Bus every ledger event is published on (movements, alerts, transfer events).
    pub fn bus(&self) -> &Arc<LedgerBus> {
        &self.bus
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    // Movements

    pub fn create_movement(&self, tenant_id: TenantId, input: MovementInput) -> EngineResult<Movement> {
        self.movements.create(tenant_id, input)
    }

    pub fn approve_movement(&self, tenant_id: TenantId, movement_id: MovementId) -> EngineResult<Movement> {
        self.movements.approve(tenant_id, movement_id)
    }

    pub fn reject_movement(&self, tenant_id: TenantId, movement_id: MovementId) -> EngineResult<Movement> {
        self.movements.reject(tenant_id, movement_id)
    }

    pub fn get_movement(&self, tenant_id: TenantId, movement_id: MovementId) -> EngineResult<Movement> {
        self.movements.get(tenant_id, movement_id)
    }

    pub fn list_movements(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        location_id: Option<LocationId>,
    ) -> EngineResult<Vec<Movement>> {
        self.movements.list(tenant_id, product_id, location_id)
    }

    pub fn get_balance(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        location_id: Option<LocationId>,
    ) -> EngineResult<StockBalance> {
        self.movements.balance(tenant_id, product_id, location_id)
    }

    // Transfers

    pub fn create_transfer(&self, tenant_id: TenantId, input: TransferInput) -> EngineResult<Transfer> {
        self.transfers.create(tenant_id, input)
    }

    pub fn update_transfer_status(
        &self,
        tenant_id: TenantId,
        transfer_id: TransferId,
        target: TransferStatus,
    ) -> EngineResult<Transfer> {
        self.transfers.update_status(tenant_id, transfer_id, target)
    }

    pub fn get_transfer(&self, tenant_id: TenantId, transfer_id: TransferId) -> EngineResult<Transfer> {
        self.transfers.get(tenant_id, transfer_id)
    }

    // Alerts

    /// Evaluate every balance and batch of the company as of today.
    pub fn generate_alerts(&self, tenant_id: TenantId) -> EngineResult<GenerationReport> {
        self.generate_alerts_at(tenant_id, Utc::now().date_naive())
    }

    pub fn generate_alerts_at(&self, tenant_id: TenantId, today: NaiveDate) -> EngineResult<GenerationReport> {
        let balances = self.ledger.balances(tenant_id)?;
        self.alerts.generate(tenant_id, &balances, today)
    }

    pub fn list_alerts(&self, tenant_id: TenantId, status: Option<AlertStatus>) -> EngineResult<Vec<Alert>> {
        self.alerts.list(tenant_id, status)
    }

    pub fn acknowledge_alert(&self, tenant_id: TenantId, alert_id: AlertId) -> EngineResult<Alert> {
        self.alerts.acknowledge(tenant_id, alert_id)
    }

    pub fn dismiss_alert(&self, tenant_id: TenantId, alert_id: AlertId) -> EngineResult<Alert> {
        self.alerts.dismiss(tenant_id, alert_id)
    }

    pub fn alert_rule(&self, tenant_id: TenantId) -> EngineResult<AlertRule> {
        self.alerts.rule(tenant_id)
    }

    pub fn set_alert_rule(&self, tenant_id: TenantId, rule: AlertRule) -> EngineResult<AlertRule> {
        self.alerts.set_rule(tenant_id, rule)
    }

    // Misc

    pub fn pricing_preview(&self, input: &PricingInput) -> EngineResult<PriceBreakdown> {
        Ok(pricing::breakdown(input)?)
    }

    /// Companies that hold at least one balance or registered batch.
    pub fn companies(&self) -> EngineResult<Vec<TenantId>> {
        let mut companies: BTreeSet<TenantId> = self.ledger.tenants()?.into_iter().collect();
        companies.extend(self.batches.tenants());
        Ok(companies.into_iter().collect())
    }
}
