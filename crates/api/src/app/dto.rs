//! Request bodies and query strings that are not engine types already.
//!
//! Pricing, alert-rule and batch bodies deserialize straight into their domain
//! inputs. Movement and transfer bodies take a signed quantity so that a negative
//! value is reported as `INVALID_QUANTITY` instead of a body rejection.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use stockledger_core::{DomainError, LocationId, ProductId, TransferId, UserId};
use stockledger_infra::catalog::{LocationRecord, ProductSnapshot};
use stockledger_infra::transfers::TransferInput;
use stockledger_inventory::{AlertStatus, MovementInput, MovementType, TransferStatus};

fn unsigned_quantity(raw: i64) -> Result<u64, DomainError> {
    u64::try_from(raw).map_err(|_| DomainError::InvalidQuantity)
}

#[derive(Debug, Deserialize)]
pub struct CreateMovementRequest {
    pub product_id: ProductId,
    #[serde(default)]
    pub location_id: Option<LocationId>,
    pub movement_type: MovementType,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub unit_cost: Decimal,
    #[serde(default)]
    pub total_cost: Option<Decimal>,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub requires_approval: bool,
    #[serde(default)]
    pub created_by: Option<UserId>,
    #[serde(default)]
    pub transfer_id: Option<TransferId>,
}

impl CreateMovementRequest {
    pub fn into_input(self) -> Result<MovementInput, DomainError> {
        let quantity = match self.quantity {
            Some(raw) => unsigned_quantity(raw)?,
            None => return Err(DomainError::missing_fields(["quantity"])),
        };
        Ok(MovementInput {
            product_id: self.product_id,
            location_id: self.location_id,
            movement_type: self.movement_type,
            quantity,
            unit_cost: self.unit_cost,
            total_cost: self.total_cost,
            occurred_at: self.occurred_at,
            reference: self.reference,
            reason: self.reason,
            requires_approval: self.requires_approval,
            created_by: self.created_by,
            transfer_id: self.transfer_id,
        })
    }
}

/// A missing quantity is left at zero for the transfer validation to report.
#[derive(Debug, Default, Deserialize)]
pub struct CreateTransferRequest {
    #[serde(default)]
    pub product_id: Option<ProductId>,
    #[serde(default)]
    pub from_location_id: Option<LocationId>,
    #[serde(default)]
    pub to_location_id: Option<LocationId>,
    #[serde(default)]
    pub quantity: Option<i64>,
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

impl CreateTransferRequest {
    pub fn into_input(self) -> Result<TransferInput, DomainError> {
        let quantity = self.quantity.map(unsigned_quantity).transpose()?.unwrap_or(0);
        Ok(TransferInput {
            product_id: self.product_id,
            from_location_id: self.from_location_id,
            to_location_id: self.to_location_id,
            quantity,
            unit_cost: self.unit_cost,
            carrier: self.carrier,
            tracking_number: self.tracking_number,
            shipping_cost: self.shipping_cost,
            expected_delivery: self.expected_delivery,
            notes: self.notes,
            created_by: self.created_by,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateTransferStatusRequest {
    pub status: TransferStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct LocationQuery {
    pub location_id: Option<LocationId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AlertsQuery {
    pub status: Option<AlertStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateAlertsQuery {
    /// Evaluate expiry as of this date instead of today.
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterProductRequest {
    /// Omit to have one assigned.
    pub product_id: Option<ProductId>,
    pub sku: String,
    #[serde(default)]
    pub cost_price: Decimal,
    #[serde(default)]
    pub max_stock_level: Option<u64>,
}

impl RegisterProductRequest {
    pub fn into_snapshot(self) -> ProductSnapshot {
        ProductSnapshot {
            product_id: self.product_id.unwrap_or_else(ProductId::new),
            sku: self.sku,
            cost_price: self.cost_price,
            max_stock_level: self.max_stock_level,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterLocationRequest {
    pub location_id: Option<LocationId>,
    pub name: String,
}

impl RegisterLocationRequest {
    pub fn into_record(self) -> LocationRecord {
        LocationRecord {
            location_id: self.location_id.unwrap_or_else(LocationId::new),
            name: self.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_movement_quantity_is_invalid() {
        let req: CreateMovementRequest = serde_json::from_value(serde_json::json!({
            "product_id": ProductId::new(),
            "movement_type": "INBOUND",
            "quantity": -5,
        }))
        .unwrap();
        assert_eq!(req.into_input().unwrap_err(), DomainError::InvalidQuantity);
    }

    #[test]
    fn missing_movement_quantity_is_reported() {
        let req: CreateMovementRequest = serde_json::from_value(serde_json::json!({
            "product_id": ProductId::new(),
            "movement_type": "INBOUND",
        }))
        .unwrap();
        assert_eq!(req.into_input().unwrap_err().code(), "MISSING_REQUIRED_FIELDS");
    }

    #[test]
    fn transfer_quantity_defaults_to_zero() {
        let input = CreateTransferRequest::default().into_input().unwrap();
        assert_eq!(input.quantity, 0);

        let negative = CreateTransferRequest {
            quantity: Some(-1),
            ..Default::default()
        };
        assert_eq!(negative.into_input().unwrap_err(), DomainError::InvalidQuantity);
    }
}
