//! Transfer orchestration: the transfer state machine driving ledger movements.
//!
//! Each transition holds the transfer's lock, checks the transition on the
//! aggregate, runs exactly one movement, then appends the transition event. When
//! the append fails after the movement committed, the movement is compensated.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use stockledger_core::{
    AggregateId, DomainError, LocationId, ProductId, TenantId, TransferId, UserId,
};
use stockledger_inventory::{
    CancelTransfer, CreateTransfer, Movement, MovementEffect, MovementInput, MovementType,
    ReceiveTransfer, ShipTransfer, Transfer, TransferCommand, TransferStatus,
};

use crate::catalog::{LocationDirectory, ProductCatalog};
use crate::command_dispatcher::CommandDispatcher;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::event_store::EventStore;
use crate::locks::KeyedLocks;
use crate::movements::MovementProcessor;
use crate::notifications::LedgerPublisher;

/// Stream type of transfer aggregates in the event store.
pub const TRANSFER_STREAM: &str = "inventory.transfer";

/// Request to create a transfer. Required fields are optional here so that all
/// missing ones are reported at once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TransferInput {
    #[serde(default)]
    pub product_id: Option<ProductId>,
    #[serde(default)]
    pub from_location_id: Option<LocationId>,
    #[serde(default)]
    pub to_location_id: Option<LocationId>,
    #[serde(default)]
    pub quantity: u64,
    #[serde(default)]
    pub unit_cost: Decimal,
    #[serde(default)]
    pub carrier: Option<String>,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub shipping_cost: Option<Decimal>,
    #[serde(default)]
    pub expected_delivery: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_by: Option<UserId>,
}

fn empty_transfer(_: TenantId, id: AggregateId) -> Transfer {
    Transfer::empty(TransferId(id))
}

pub struct TransferOrchestrator {
    dispatcher: CommandDispatcher<Arc<dyn EventStore>>,
    movements: Arc<MovementProcessor>,
    catalog: Arc<dyn ProductCatalog>,
    locations: Arc<dyn LocationDirectory>,
    locks: KeyedLocks<TransferId>,
    lock_timeout: Duration,
    credit_retry_attempts: u32,
    credit_retry_backoff: Duration,
}

impl core::fmt::Debug for TransferOrchestrator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TransferOrchestrator")
            .field("lock_timeout", &self.lock_timeout)
            .field("credit_retry_attempts", &self.credit_retry_attempts)
            .field("credit_retry_backoff", &self.credit_retry_backoff)
            .finish_non_exhaustive()
    }
}

impl TransferOrchestrator {
    pub fn new(
        events: Arc<dyn EventStore>,
        publisher: LedgerPublisher,
        movements: Arc<MovementProcessor>,
        catalog: Arc<dyn ProductCatalog>,
        locations: Arc<dyn LocationDirectory>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            dispatcher: CommandDispatcher::new(events, publisher),
            movements,
            catalog,
            locations,
            locks: KeyedLocks::new(),
            lock_timeout: config.lock_timeout,
            credit_retry_attempts: config.credit_retry_attempts.max(1),
            credit_retry_backoff: config.credit_retry_backoff,
        }
    }

    /// Create a PENDING transfer. The ledger is not touched and nothing is reserved.
    pub fn create(&self, tenant_id: TenantId, input: TransferInput) -> EngineResult<Transfer> {
        let transfer_id = TransferId::generate();
        let cmd = CreateTransfer {
            tenant_id,
            transfer_id,
            product_id: input.product_id,
            from_location_id: input.from_location_id,
            to_location_id: input.to_location_id,
            quantity: input.quantity,
            unit_cost: input.unit_cost,
            carrier: input.carrier,
            tracking_number: input.tracking_number,
            shipping_cost: input.shipping_cost,
            expected_delivery: input.expected_delivery,
            notes: input.notes,
            created_by: input.created_by,
            occurred_at: Utc::now(),
        };

        let created = self
            .check_references(tenant_id, &cmd)
            .and_then(|()| {
                self.dispatcher.dispatch(
                    tenant_id,
                    transfer_id.0,
                    TRANSFER_STREAM,
                    TransferCommand::Create(cmd),
                    empty_transfer,
                )
            })
            .inspect_err(|err| {
                warn!(company_id = %tenant_id, code = err.code(), error = %err, "transfer rejected");
            })?;

        info!(
            company_id = %tenant_id,
            %transfer_id,
            quantity = created.aggregate.quantity(),
            "transfer created"
        );
        Ok(created.aggregate)
    }

    pub fn get(&self, tenant_id: TenantId, transfer_id: TransferId) -> EngineResult<Transfer> {
        let transfer = self.dispatcher.load(tenant_id, transfer_id.0, empty_transfer)?;
        if !transfer.exists() {
            return Err(DomainError::TransferNotFound(transfer_id).into());
        }
        Ok(transfer)
    }

    /// Drive the transfer to `target`, recording the movement that transition implies.
    ///
    /// A failed movement leaves the status unchanged.
    pub fn update_status(
        &self,
        tenant_id: TenantId,
        transfer_id: TransferId,
        target: TransferStatus,
    ) -> EngineResult<Transfer> {
        debug!(company_id = %tenant_id, %transfer_id, %target, "transfer transition requested");

        let result = self.transition(tenant_id, transfer_id, target);

        match result {
            Ok(transfer) => {
                info!(
                    company_id = %tenant_id,
                    %transfer_id,
                    status = %transfer.status(),
                    "transfer status changed"
                );
                Ok(transfer)
            }
            Err(err) => {
                warn!(
                    company_id = %tenant_id,
                    %transfer_id,
                    %target,
                    code = err.code(),
                    error = %err,
                    "transfer transition rejected"
                );
                Err(err)
            }
        }
    }

    fn transition(
        &self,
        tenant_id: TenantId,
        transfer_id: TransferId,
        target: TransferStatus,
    ) -> EngineResult<Transfer> {
        let _guard = self.locks.acquire(transfer_id, self.lock_timeout)?;

        let transfer = self.get(tenant_id, transfer_id)?;
        transfer.ensure_transition(target)?;
        match target {
            TransferStatus::InTransit => self.ship(tenant_id, &transfer),
            TransferStatus::Completed => self.receive(tenant_id, &transfer),
            TransferStatus::Cancelled => self.cancel(tenant_id, &transfer),
            TransferStatus::Pending => {
                Err(DomainError::invalid_transition(transfer.status(), target).into())
            }
        }
    }

    fn check_references(&self, tenant_id: TenantId, cmd: &CreateTransfer) -> EngineResult<()> {
        let (product_id, to_location_id) = cmd.validate()?;
        if self.catalog.product(tenant_id, product_id).is_none() {
            return Err(DomainError::ProductNotFound(product_id).into());
        }
        for location_id in cmd.from_location_id.into_iter().chain([to_location_id]) {
            if !self.locations.location_exists(tenant_id, location_id) {
                return Err(DomainError::LocationNotFound(location_id).into());
            }
        }
        Ok(())
    }

    /// PENDING -> IN_TRANSIT: debit the source (nothing to debit for an external source).
    fn ship(&self, tenant_id: TenantId, transfer: &Transfer) -> EngineResult<Transfer> {
        let outbound = match transfer.from_location_id() {
            Some(from) => Some(
                self.movements
                    .create(tenant_id, leg(transfer, from, MovementType::TransferOut)?)?,
            ),
            None => None,
        };

        let cmd = TransferCommand::Ship(ShipTransfer {
            tenant_id,
            transfer_id: transfer.id_typed(),
            outbound_movement_id: outbound.as_ref().map(|m| m.id),
            occurred_at: Utc::now(),
        });
        self.append(tenant_id, transfer, cmd, outbound.as_ref())
    }

    /// IN_TRANSIT -> COMPLETED: credit the destination, retrying retryable failures.
    ///
    /// When the credit still fails the transfer stays IN_TRANSIT, so the caller can
    /// retry the receive or cancel.
    fn receive(&self, tenant_id: TenantId, transfer: &Transfer) -> EngineResult<Transfer> {
        let to = transfer
            .to_location_id()
            .ok_or_else(|| DomainError::missing_fields(["to_location_id"]))?;
        let input = leg(transfer, to, MovementType::TransferIn)?;

        let mut attempt = 1;
        let inbound = loop {
            match self.movements.create(tenant_id, input.clone()) {
                Ok(movement) => break movement,
                Err(err) if err.is_retryable() && attempt < self.credit_retry_attempts => {
                    let backoff = self
                        .credit_retry_backoff
                        .saturating_mul(2u32.saturating_pow(attempt - 1));
                    warn!(
                        company_id = %tenant_id,
                        transfer_id = %transfer.id_typed(),
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        code = err.code(),
                        "transfer credit failed, retrying"
                    );
                    thread::sleep(backoff);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        };

        let cmd = TransferCommand::Receive(ReceiveTransfer {
            tenant_id,
            transfer_id: transfer.id_typed(),
            inbound_movement_id: inbound.id,
            occurred_at: Utc::now(),
        });
        self.append(tenant_id, transfer, cmd, Some(&inbound))
    }

    /// -> CANCELLED. Stock already debited for an IN_TRANSIT transfer goes back to the
    /// source through an ADJUSTMENT_IN, leaving the source net-zero.
    fn cancel(&self, tenant_id: TenantId, transfer: &Transfer) -> EngineResult<Transfer> {
        let compensation = match (
            transfer.status(),
            transfer.outbound_movement_id(),
            transfer.from_location_id(),
        ) {
            (TransferStatus::InTransit, Some(outbound_id), Some(from)) => {
                let input = leg(transfer, from, MovementType::AdjustmentIn)?
                    .with_reason(format!("transfer cancelled, reverses movement {outbound_id}"));
                Some(self.movements.create(tenant_id, input)?)
            }
            _ => None,
        };

        let cmd = TransferCommand::Cancel(CancelTransfer {
            tenant_id,
            transfer_id: transfer.id_typed(),
            compensation_movement_id: compensation.as_ref().map(|m| m.id),
            occurred_at: Utc::now(),
        });
        self.append(tenant_id, transfer, cmd, compensation.as_ref())
    }

    fn append(
        &self,
        tenant_id: TenantId,
        transfer: &Transfer,
        cmd: TransferCommand,
        recorded: Option<&Movement>,
    ) -> EngineResult<Transfer> {
        match self.dispatcher.dispatch(
            tenant_id,
            transfer.id_typed().0,
            TRANSFER_STREAM,
            cmd,
            empty_transfer,
        ) {
            Ok(out) => Ok(out.aggregate),
            Err(err) => {
                if let Some(movement) = recorded {
                    self.compensate(tenant_id, movement)?;
                }
                Err(err)
            }
        }
    }

    /// Reverse a movement whose transition event could not be stored.
    ///
    /// When the reversal itself fails the applied movement is orphaned and
    /// `CompensationFailed` names it, so callers do not retry the transition.
    fn compensate(&self, tenant_id: TenantId, movement: &Movement) -> EngineResult<()> {
        let reverse = match movement.movement_type.effect() {
            MovementEffect::Increase => MovementType::AdjustmentOut,
            MovementEffect::Decrease | MovementEffect::SetAbsolute => MovementType::AdjustmentIn,
        };
        let mut input = MovementInput::new(
            movement.product_id,
            movement.location_id,
            reverse,
            movement.quantity,
            movement.unit_cost,
        )
        .with_reason(format!("compensates movement {}", movement.id));
        input.transfer_id = movement.transfer_id;

        match self.movements.create(tenant_id, input) {
            Ok(reversal) => {
                warn!(
                    company_id = %tenant_id,
                    movement_id = %movement.id,
                    compensation_id = %reversal.id,
                    "transfer movement compensated"
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    company_id = %tenant_id,
                    movement_id = %movement.id,
                    code = err.code(),
                    error = %err,
                    "failed to compensate transfer movement"
                );
                Err(EngineError::CompensationFailed {
                    movement_id: movement.id,
                    reason: err.to_string(),
                })
            }
        }
    }
}

fn leg(transfer: &Transfer, location_id: LocationId, movement_type: MovementType) -> EngineResult<MovementInput> {
    let product_id = transfer
        .product_id()
        .ok_or_else(|| DomainError::missing_fields(["product_id"]))?;
    let transfer_id = transfer.id_typed();

    Ok(MovementInput::new(
        product_id,
        Some(location_id),
        movement_type,
        transfer.quantity(),
        transfer.unit_cost(),
    )
    .with_reference(transfer_id.to_string())
    .for_transfer(transfer_id))
}
