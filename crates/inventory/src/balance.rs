use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, LocationId, MovementId, ProductId, TenantId};

/// Identity of a balance: one per (company, product, location).
///
/// `location_id == None` is the unassigned bucket for stock not yet put away.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BalanceKey {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub location_id: Option<LocationId>,
}

impl BalanceKey {
    pub fn new(tenant_id: TenantId, product_id: ProductId, location_id: Option<LocationId>) -> Self {
        Self {
            tenant_id,
            product_id,
            location_id,
        }
    }
}

/// Current quantity-on-hand for a product at a location.
///
/// A cache over the movement ledger: it can always be rebuilt by replaying the
/// COMPLETED movements for its key. Created on the first movement, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockBalance {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub location_id: Option<LocationId>,
    pub quantity_on_hand: u64,
    /// Always `<= quantity_on_hand`.
    pub reserved_quantity: u64,
    pub last_movement_id: Option<MovementId>,
    /// Incremented on every mutation.
    pub version: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl StockBalance {
    /// Balance for a key that has never seen a movement.
    pub fn zeroed(key: BalanceKey) -> Self {
        Self {
            tenant_id: key.tenant_id,
            product_id: key.product_id,
            location_id: key.location_id,
            quantity_on_hand: 0,
            reserved_quantity: 0,
            last_movement_id: None,
            version: 0,
            updated_at: None,
        }
    }

    pub fn key(&self) -> BalanceKey {
        BalanceKey::new(self.tenant_id, self.product_id, self.location_id)
    }

    pub fn available(&self) -> u64 {
        self.quantity_on_hand.saturating_sub(self.reserved_quantity)
    }

    /// Compute the balance after applying `delta`, without mutating `self`.
    ///
    /// Rejects any delta that would take on-hand below zero or below the reserved
    /// quantity.
    pub fn with_delta(
        &self,
        delta: i64,
        movement_id: MovementId,
        at: DateTime<Utc>,
    ) -> DomainResult<StockBalance> {
        let next = i128::from(self.quantity_on_hand) + i128::from(delta);
        if next < i128::from(self.reserved_quantity) {
            return Err(DomainError::InsufficientStock {
                available: self.available(),
                requested: delta.unsigned_abs(),
            });
        }
        let quantity_on_hand = u64::try_from(next).map_err(|_| DomainError::InvalidQuantity)?;

        Ok(StockBalance {
            quantity_on_hand,
            last_movement_id: Some(movement_id),
            version: self.version + 1,
            updated_at: Some(at),
            ..self.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> BalanceKey {
        BalanceKey::new(TenantId::new(), ProductId::new(), Some(LocationId::new()))
    }

    #[test]
    fn zeroed_balance_has_nothing_available() {
        let b = StockBalance::zeroed(key());
        assert_eq!(b.quantity_on_hand, 0);
        assert_eq!(b.available(), 0);
        assert_eq!(b.version, 0);
        assert!(b.last_movement_id.is_none());
    }

    #[test]
    fn delta_bumps_version_and_records_movement() {
        let b = StockBalance::zeroed(key());
        let m = MovementId::new();
        let next = b.with_delta(12, m, Utc::now()).unwrap();

        assert_eq!(next.quantity_on_hand, 12);
        assert_eq!(next.version, 1);
        assert_eq!(next.last_movement_id, Some(m));
        assert_eq!(b.quantity_on_hand, 0);
    }

    #[test]
    fn delta_below_zero_is_insufficient_stock() {
        let b = StockBalance::zeroed(key())
            .with_delta(10, MovementId::new(), Utc::now())
            .unwrap();
        let err = b.with_delta(-15, MovementId::new(), Utc::now()).unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                available: 10,
                requested: 15
            }
        );
    }

    #[test]
    fn reserved_stock_cannot_be_consumed() {
        let mut b = StockBalance::zeroed(key())
            .with_delta(10, MovementId::new(), Utc::now())
            .unwrap();
        b.reserved_quantity = 4;

        assert!(b.with_delta(-6, MovementId::new(), Utc::now()).is_ok());
        let err = b.with_delta(-7, MovementId::new(), Utc::now()).unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                available: 6,
                requested: 7
            }
        );
    }
}
