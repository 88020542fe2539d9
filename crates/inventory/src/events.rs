//! Ledger notifications published after a mutation commits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{AlertId, LocationId, MovementId, ProductId, TenantId, TransferId};
use stockledger_events::Event;

use crate::alert::{Alert, AlertSeverity, AlertType};
use crate::movement::{Movement, MovementStatus, MovementType};

/// Event: MovementRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRecorded {
    pub tenant_id: TenantId,
    pub movement_id: MovementId,
    pub product_id: ProductId,
    pub location_id: Option<LocationId>,
    pub movement_type: MovementType,
    pub status: MovementStatus,
    pub quantity: u64,
    pub quantity_before: Option<u64>,
    pub quantity_after: Option<u64>,
    pub transfer_id: Option<TransferId>,
    pub occurred_at: DateTime<Utc>,
}

impl From<&Movement> for MovementRecorded {
    fn from(m: &Movement) -> Self {
        Self {
            tenant_id: m.tenant_id,
            movement_id: m.id,
            product_id: m.product_id,
            location_id: m.location_id,
            movement_type: m.movement_type,
            status: m.status,
            quantity: m.quantity,
            quantity_before: m.quantity_before,
            quantity_after: m.quantity_after,
            transfer_id: m.transfer_id,
            occurred_at: m.occurred_at,
        }
    }
}

/// Event: AlertRaised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRaised {
    pub tenant_id: TenantId,
    pub alert_id: AlertId,
    pub product_id: ProductId,
    pub location_id: Option<LocationId>,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub threshold: u64,
    pub current_quantity: u64,
    pub occurred_at: DateTime<Utc>,
}

impl From<&Alert> for AlertRaised {
    fn from(a: &Alert) -> Self {
        Self {
            tenant_id: a.tenant_id,
            alert_id: a.id,
            product_id: a.product_id,
            location_id: a.location_id,
            alert_type: a.alert_type,
            severity: a.severity,
            threshold: a.threshold,
            current_quantity: a.current_quantity,
            occurred_at: a.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockEvent {
    MovementRecorded(MovementRecorded),
    AlertRaised(AlertRaised),
}

impl StockEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            StockEvent::MovementRecorded(e) => e.tenant_id,
            StockEvent::AlertRaised(e) => e.tenant_id,
        }
    }
}

impl Event for StockEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StockEvent::MovementRecorded(_) => "inventory.movement.recorded",
            StockEvent::AlertRaised(_) => "inventory.alert.raised",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StockEvent::MovementRecorded(e) => e.occurred_at,
            StockEvent::AlertRaised(e) => e.occurred_at,
        }
    }
}
