use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{
    Aggregate, AggregateRoot, DomainError, LocationId, MovementId, ProductId, TenantId, TransferId,
    UserId,
};
use stockledger_events::Event;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferStatus {
    Pending,
    InTransit,
    Completed,
    Cancelled,
}

impl TransferStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TransferStatus::Pending => "PENDING",
            TransferStatus::InTransit => "IN_TRANSIT",
            TransferStatus::Completed => "COMPLETED",
            TransferStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TransferStatus::Completed | TransferStatus::Cancelled)
    }

    /// `PENDING -> IN_TRANSIT -> COMPLETED`, and `PENDING | IN_TRANSIT -> CANCELLED`.
    pub fn can_transition_to(self, next: TransferStatus) -> bool {
        matches!(
            (self, next),
            (TransferStatus::Pending, TransferStatus::InTransit)
                | (TransferStatus::InTransit, TransferStatus::Completed)
                | (TransferStatus::Pending, TransferStatus::Cancelled)
                | (TransferStatus::InTransit, TransferStatus::Cancelled)
        )
    }
}

impl core::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate root: Transfer.
///
/// Owns exactly the movements it generates; it never touches balances itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transfer {
    id: TransferId,
    tenant_id: Option<TenantId>,
    product_id: Option<ProductId>,
    from_location_id: Option<LocationId>,
    to_location_id: Option<LocationId>,
    quantity: u64,
    unit_cost: Decimal,
    status: TransferStatus,
    outbound_movement_id: Option<MovementId>,
    inbound_movement_id: Option<MovementId>,
    compensation_movement_id: Option<MovementId>,
    carrier: Option<String>,
    tracking_number: Option<String>,
    shipping_cost: Option<Decimal>,
    expected_delivery: Option<NaiveDate>,
    notes: Option<String>,
    created_by: Option<UserId>,
    created_at: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
    received_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    version: u64,
    #[serde(skip)]
    created: bool,
}

impl Transfer {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: TransferId) -> Self {
        Self {
            id,
            tenant_id: None,
            product_id: None,
            from_location_id: None,
            to_location_id: None,
            quantity: 0,
            unit_cost: Decimal::ZERO,
            status: TransferStatus::Pending,
            outbound_movement_id: None,
            inbound_movement_id: None,
            compensation_movement_id: None,
            carrier: None,
            tracking_number: None,
            shipping_cost: None,
            expected_delivery: None,
            notes: None,
            created_by: None,
            created_at: None,
            shipped_at: None,
            received_at: None,
            cancelled_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> TransferId {
        self.id
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn product_id(&self) -> Option<ProductId> {
        self.product_id
    }

    pub fn from_location_id(&self) -> Option<LocationId> {
        self.from_location_id
    }

    pub fn to_location_id(&self) -> Option<LocationId> {
        self.to_location_id
    }

    pub fn quantity(&self) -> u64 {
        self.quantity
    }

    pub fn unit_cost(&self) -> Decimal {
        self.unit_cost
    }

    pub fn status(&self) -> TransferStatus {
        self.status
    }

    pub fn outbound_movement_id(&self) -> Option<MovementId> {
        self.outbound_movement_id
    }

    pub fn inbound_movement_id(&self) -> Option<MovementId> {
        self.inbound_movement_id
    }

    pub fn compensation_movement_id(&self) -> Option<MovementId> {
        self.compensation_movement_id
    }

    /// Check `next` is reachable before any ledger work is attempted.
    pub fn ensure_transition(&self, next: TransferStatus) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::TransferNotFound(self.id));
        }
        if !self.status.can_transition_to(next) {
            return Err(DomainError::invalid_transition(self.status, next));
        }
        Ok(())
    }
}

impl AggregateRoot for Transfer {
    type Id = TransferId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateTransfer.
///
/// `product_id` and `to_location_id` are optional here so that missing fields can be
/// reported together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTransfer {
    pub tenant_id: TenantId,
    pub transfer_id: TransferId,
    pub product_id: Option<ProductId>,
    pub from_location_id: Option<LocationId>,
    pub to_location_id: Option<LocationId>,
    pub quantity: u64,
    pub unit_cost: Decimal,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub shipping_cost: Option<Decimal>,
    pub expected_delivery: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_by: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

impl CreateTransfer {
    /// Field-level validation, independent of any stored state.
    ///
    /// Order: required fields, distinct locations, quantity, prices.
    pub fn validate(&self) -> Result<(ProductId, LocationId), DomainError> {
        let mut missing = Vec::new();
        if self.product_id.is_none() {
            missing.push("product_id");
        }
        if self.to_location_id.is_none() {
            missing.push("to_location_id");
        }
        let (Some(product_id), Some(to_location_id)) = (self.product_id, self.to_location_id) else {
            return Err(DomainError::missing_fields(missing));
        };

        if self.from_location_id == Some(to_location_id) {
            return Err(DomainError::SameLocationTransfer);
        }
        if self.quantity == 0 {
            return Err(DomainError::InvalidQuantity);
        }
        if self.unit_cost < Decimal::ZERO {
            return Err(DomainError::invalid_price("unit cost cannot be negative"));
        }
        if self.shipping_cost.is_some_and(|c| c < Decimal::ZERO) {
            return Err(DomainError::invalid_price("shipping cost cannot be negative"));
        }
        Ok((product_id, to_location_id))
    }
}

/// Command: ShipTransfer (PENDING -> IN_TRANSIT).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipTransfer {
    pub tenant_id: TenantId,
    pub transfer_id: TransferId,
    /// `None` when the source is external (no source location).
    pub outbound_movement_id: Option<MovementId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReceiveTransfer (IN_TRANSIT -> COMPLETED).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveTransfer {
    pub tenant_id: TenantId,
    pub transfer_id: TransferId,
    pub inbound_movement_id: MovementId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelTransfer (PENDING | IN_TRANSIT -> CANCELLED).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelTransfer {
    pub tenant_id: TenantId,
    pub transfer_id: TransferId,
    /// Set when cancelling after the outbound movement was recorded.
    pub compensation_movement_id: Option<MovementId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferCommand {
    Create(CreateTransfer),
    Ship(ShipTransfer),
    Receive(ReceiveTransfer),
    Cancel(CancelTransfer),
}

/// Event: TransferCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferCreated {
    pub tenant_id: TenantId,
    pub transfer_id: TransferId,
    pub product_id: ProductId,
    pub from_location_id: Option<LocationId>,
    pub to_location_id: LocationId,
    pub quantity: u64,
    pub unit_cost: Decimal,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub shipping_cost: Option<Decimal>,
    pub expected_delivery: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_by: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TransferShipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferShipped {
    pub tenant_id: TenantId,
    pub transfer_id: TransferId,
    pub outbound_movement_id: Option<MovementId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TransferReceived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceived {
    pub tenant_id: TenantId,
    pub transfer_id: TransferId,
    pub inbound_movement_id: MovementId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TransferCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferCancelled {
    pub tenant_id: TenantId,
    pub transfer_id: TransferId,
    pub previous_status: TransferStatus,
    pub compensation_movement_id: Option<MovementId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferEvent {
    Created(TransferCreated),
    Shipped(TransferShipped),
    Received(TransferReceived),
    Cancelled(TransferCancelled),
}

impl Event for TransferEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TransferEvent::Created(_) => "inventory.transfer.created",
            TransferEvent::Shipped(_) => "inventory.transfer.shipped",
            TransferEvent::Received(_) => "inventory.transfer.received",
            TransferEvent::Cancelled(_) => "inventory.transfer.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TransferEvent::Created(e) => e.occurred_at,
            TransferEvent::Shipped(e) => e.occurred_at,
            TransferEvent::Received(e) => e.occurred_at,
            TransferEvent::Cancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Transfer {
    type Command = TransferCommand;
    type Event = TransferEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TransferEvent::Created(e) => {
                self.id = e.transfer_id;
                self.tenant_id = Some(e.tenant_id);
                self.product_id = Some(e.product_id);
                self.from_location_id = e.from_location_id;
                self.to_location_id = Some(e.to_location_id);
                self.quantity = e.quantity;
                self.unit_cost = e.unit_cost;
                self.carrier = e.carrier.clone();
                self.tracking_number = e.tracking_number.clone();
                self.shipping_cost = e.shipping_cost;
                self.expected_delivery = e.expected_delivery;
                self.notes = e.notes.clone();
                self.created_by = e.created_by;
                self.created_at = Some(e.occurred_at);
                self.status = TransferStatus::Pending;
                self.created = true;
            }
            TransferEvent::Shipped(e) => {
                self.outbound_movement_id = e.outbound_movement_id;
                self.shipped_at = Some(e.occurred_at);
                self.status = TransferStatus::InTransit;
            }
            TransferEvent::Received(e) => {
                self.inbound_movement_id = Some(e.inbound_movement_id);
                self.received_at = Some(e.occurred_at);
                self.status = TransferStatus::Completed;
            }
            TransferEvent::Cancelled(e) => {
                self.compensation_movement_id = e.compensation_movement_id;
                self.cancelled_at = Some(e.occurred_at);
                self.status = TransferStatus::Cancelled;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            TransferCommand::Create(cmd) => self.handle_create(cmd),
            TransferCommand::Ship(cmd) => self.handle_ship(cmd),
            TransferCommand::Receive(cmd) => self.handle_receive(cmd),
            TransferCommand::Cancel(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl Transfer {
    fn ensure_scope(&self, tenant_id: TenantId, transfer_id: TransferId) -> Result<(), DomainError> {
        // Another company's transfer is indistinguishable from a missing one.
        if !self.created || self.tenant_id != Some(tenant_id) || self.id != transfer_id {
            return Err(DomainError::TransferNotFound(transfer_id));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateTransfer) -> Result<Vec<TransferEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("transfer already exists"));
        }
        let (product_id, to_location_id) = cmd.validate()?;

        Ok(vec![TransferEvent::Created(TransferCreated {
            tenant_id: cmd.tenant_id,
            transfer_id: cmd.transfer_id,
            product_id,
            from_location_id: cmd.from_location_id,
            to_location_id,
            quantity: cmd.quantity,
            unit_cost: cmd.unit_cost,
            carrier: cmd.carrier.clone(),
            tracking_number: cmd.tracking_number.clone(),
            shipping_cost: cmd.shipping_cost,
            expected_delivery: cmd.expected_delivery,
            notes: cmd.notes.clone(),
            created_by: cmd.created_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_ship(&self, cmd: &ShipTransfer) -> Result<Vec<TransferEvent>, DomainError> {
        self.ensure_scope(cmd.tenant_id, cmd.transfer_id)?;
        self.ensure_transition(TransferStatus::InTransit)?;
        if self.from_location_id.is_some() && cmd.outbound_movement_id.is_none() {
            return Err(DomainError::missing_fields(["outbound_movement_id"]));
        }

        Ok(vec![TransferEvent::Shipped(TransferShipped {
            tenant_id: cmd.tenant_id,
            transfer_id: cmd.transfer_id,
            outbound_movement_id: cmd.outbound_movement_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_receive(&self, cmd: &ReceiveTransfer) -> Result<Vec<TransferEvent>, DomainError> {
        self.ensure_scope(cmd.tenant_id, cmd.transfer_id)?;
        self.ensure_transition(TransferStatus::Completed)?;

        Ok(vec![TransferEvent::Received(TransferReceived {
            tenant_id: cmd.tenant_id,
            transfer_id: cmd.transfer_id,
            inbound_movement_id: cmd.inbound_movement_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelTransfer) -> Result<Vec<TransferEvent>, DomainError> {
        self.ensure_scope(cmd.tenant_id, cmd.transfer_id)?;
        self.ensure_transition(TransferStatus::Cancelled)?;
        if self.outbound_movement_id.is_some() && cmd.compensation_movement_id.is_none() {
            return Err(DomainError::missing_fields(["compensation_movement_id"]));
        }

        Ok(vec![TransferEvent::Cancelled(TransferCancelled {
            tenant_id: cmd.tenant_id,
            transfer_id: cmd.transfer_id,
            previous_status: self.status,
            compensation_movement_id: cmd.compensation_movement_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn create_cmd(tenant_id: TenantId, transfer_id: TransferId) -> CreateTransfer {
        CreateTransfer {
            tenant_id,
            transfer_id,
            product_id: Some(ProductId::new()),
            from_location_id: Some(LocationId::new()),
            to_location_id: Some(LocationId::new()),
            quantity: 5,
            unit_cost: dec!(4.20),
            carrier: Some("DHL".to_string()),
            tracking_number: None,
            shipping_cost: Some(dec!(12)),
            expected_delivery: None,
            notes: None,
            created_by: None,
            occurred_at: Utc::now(),
        }
    }

    fn created(tenant_id: TenantId, transfer_id: TransferId) -> Transfer {
        let mut t = Transfer::empty(transfer_id);
        let events = t
            .handle(&TransferCommand::Create(create_cmd(tenant_id, transfer_id)))
            .unwrap();
        for e in &events {
            t.apply(e);
        }
        t
    }

    fn run(t: &mut Transfer, cmd: TransferCommand) -> Result<(), DomainError> {
        let events = t.handle(&cmd)?;
        for e in &events {
            t.apply(e);
        }
        Ok(())
    }

    #[test]
    fn create_emits_event_and_starts_pending() {
        let tenant_id = TenantId::new();
        let transfer_id = TransferId::generate();
        let t = created(tenant_id, transfer_id);

        assert!(t.exists());
        assert_eq!(t.status(), TransferStatus::Pending);
        assert_eq!(t.quantity(), 5);
        assert_eq!(t.version(), 1);
        assert_eq!(t.tenant_id(), Some(tenant_id));
    }

    #[test]
    fn missing_fields_are_reported_together() {
        let mut cmd = create_cmd(TenantId::new(), TransferId::generate());
        cmd.product_id = None;
        cmd.to_location_id = None;
        let err = Transfer::empty(cmd.transfer_id)
            .handle(&TransferCommand::Create(cmd))
            .unwrap_err();
        assert_eq!(
            err,
            DomainError::MissingRequiredFields(vec![
                "product_id".to_string(),
                "to_location_id".to_string()
            ])
        );
    }

    #[test]
    fn same_location_is_rejected_before_quantity() {
        let mut cmd = create_cmd(TenantId::new(), TransferId::generate());
        cmd.from_location_id = cmd.to_location_id;
        cmd.quantity = 0;
        assert_eq!(cmd.validate().unwrap_err(), DomainError::SameLocationTransfer);
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let mut cmd = create_cmd(TenantId::new(), TransferId::generate());
        cmd.quantity = 0;
        assert_eq!(cmd.validate().unwrap_err(), DomainError::InvalidQuantity);
    }

    #[test]
    fn full_lifecycle_records_movements() {
        let tenant_id = TenantId::new();
        let transfer_id = TransferId::generate();
        let mut t = created(tenant_id, transfer_id);
        let out = MovementId::new();
        let inbound = MovementId::new();

        run(
            &mut t,
            TransferCommand::Ship(ShipTransfer {
                tenant_id,
                transfer_id,
                outbound_movement_id: Some(out),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        assert_eq!(t.status(), TransferStatus::InTransit);

        run(
            &mut t,
            TransferCommand::Receive(ReceiveTransfer {
                tenant_id,
                transfer_id,
                inbound_movement_id: inbound,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        assert_eq!(t.status(), TransferStatus::Completed);
        assert_eq!(t.outbound_movement_id(), Some(out));
        assert_eq!(t.inbound_movement_id(), Some(inbound));
        assert_eq!(t.version(), 3);
    }

    #[test]
    fn receive_from_pending_is_invalid_transition() {
        let tenant_id = TenantId::new();
        let transfer_id = TransferId::generate();
        let t = created(tenant_id, transfer_id);
        let err = t
            .handle(&TransferCommand::Receive(ReceiveTransfer {
                tenant_id,
                transfer_id,
                inbound_movement_id: MovementId::new(),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::invalid_transition("PENDING", "COMPLETED"));
    }

    #[test]
    fn cancel_in_transit_requires_compensation() {
        let tenant_id = TenantId::new();
        let transfer_id = TransferId::generate();
        let mut t = created(tenant_id, transfer_id);
        run(
            &mut t,
            TransferCommand::Ship(ShipTransfer {
                tenant_id,
                transfer_id,
                outbound_movement_id: Some(MovementId::new()),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();

        let cancel = |comp| {
            TransferCommand::Cancel(CancelTransfer {
                tenant_id,
                transfer_id,
                compensation_movement_id: comp,
                occurred_at: Utc::now(),
            })
        };
        assert!(matches!(
            t.handle(&cancel(None)),
            Err(DomainError::MissingRequiredFields(_))
        ));
        run(&mut t, cancel(Some(MovementId::new()))).unwrap();
        assert_eq!(t.status(), TransferStatus::Cancelled);
        assert!(t.compensation_movement_id().is_some());
    }

    #[test]
    fn other_company_cannot_see_transfer() {
        let transfer_id = TransferId::generate();
        let t = created(TenantId::new(), transfer_id);
        let err = t
            .handle(&TransferCommand::Cancel(CancelTransfer {
                tenant_id: TenantId::new(),
                transfer_id,
                compensation_movement_id: None,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::TransferNotFound(transfer_id));
    }

    fn any_status() -> impl Strategy<Value = TransferStatus> {
        prop_oneof![
            Just(TransferStatus::Pending),
            Just(TransferStatus::InTransit),
            Just(TransferStatus::Completed),
            Just(TransferStatus::Cancelled),
        ]
    }

    proptest! {
        /// Property: terminal states admit no transitions, and nothing returns to PENDING.
        #[test]
        fn terminal_states_are_closed(from in any_status(), to in any_status()) {
            if from.is_terminal() {
                prop_assert!(!from.can_transition_to(to));
            }
            prop_assert!(!from.can_transition_to(TransferStatus::Pending));
        }
    }
}
