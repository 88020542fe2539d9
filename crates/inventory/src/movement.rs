use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{
    DomainError, DomainResult, LocationId, MovementId, ProductId, TenantId, TransferId, UserId,
};

use crate::balance::{BalanceKey, StockBalance};
use crate::pricing;

/// How a movement type changes the balance.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MovementEffect {
    Increase,
    Decrease,
    /// `quantity` is the counted absolute on-hand figure.
    SetAbsolute,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    Inbound,
    Outbound,
    TransferIn,
    TransferOut,
    AdjustmentIn,
    AdjustmentOut,
    ReturnIn,
    ReturnOut,
    Damage,
    Theft,
    CycleCount,
}

impl MovementType {
    pub fn effect(self) -> MovementEffect {
        match self {
            MovementType::Inbound
            | MovementType::TransferIn
            | MovementType::AdjustmentIn
            | MovementType::ReturnIn => MovementEffect::Increase,
            MovementType::Outbound
            | MovementType::TransferOut
            | MovementType::AdjustmentOut
            | MovementType::ReturnOut
            | MovementType::Damage
            | MovementType::Theft => MovementEffect::Decrease,
            MovementType::CycleCount => MovementEffect::SetAbsolute,
        }
    }

    /// Purchases and sales must carry their own cost; everything else may inherit it.
    pub fn requires_unit_cost(self) -> bool {
        matches!(self, MovementType::Inbound | MovementType::Outbound)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MovementType::Inbound => "INBOUND",
            MovementType::Outbound => "OUTBOUND",
            MovementType::TransferIn => "TRANSFER_IN",
            MovementType::TransferOut => "TRANSFER_OUT",
            MovementType::AdjustmentIn => "ADJUSTMENT_IN",
            MovementType::AdjustmentOut => "ADJUSTMENT_OUT",
            MovementType::ReturnIn => "RETURN_IN",
            MovementType::ReturnOut => "RETURN_OUT",
            MovementType::Damage => "DAMAGE",
            MovementType::Theft => "THEFT",
            MovementType::CycleCount => "CYCLE_COUNT",
        }
    }
}

impl core::fmt::Display for MovementType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementStatus {
    Pending,
    Approved,
    Processing,
    Completed,
    Cancelled,
}

impl MovementStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MovementStatus::Pending => "PENDING",
            MovementStatus::Approved => "APPROVED",
            MovementStatus::Processing => "PROCESSING",
            MovementStatus::Completed => "COMPLETED",
            MovementStatus::Cancelled => "CANCELLED",
        }
    }
}

impl core::fmt::Display for MovementStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request to record a movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementInput {
    pub product_id: ProductId,
    #[serde(default)]
    pub location_id: Option<LocationId>,
    pub movement_type: MovementType,
    pub quantity: u64,
    #[serde(default)]
    pub unit_cost: Decimal,
    /// Overrides `unit_cost * quantity` when set.
    #[serde(default)]
    pub total_cost: Option<Decimal>,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    /// Record as PENDING without touching the balance.
    #[serde(default)]
    pub requires_approval: bool,
    #[serde(default)]
    pub created_by: Option<UserId>,
    #[serde(default)]
    pub transfer_id: Option<TransferId>,
}

impl MovementInput {
    pub fn new(
        product_id: ProductId,
        location_id: Option<LocationId>,
        movement_type: MovementType,
        quantity: u64,
        unit_cost: Decimal,
    ) -> Self {
        Self {
            product_id,
            location_id,
            movement_type,
            quantity,
            unit_cost,
            total_cost: None,
            occurred_at: None,
            reference: None,
            reason: None,
            requires_approval: false,
            created_by: None,
            transfer_id: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn for_transfer(mut self, transfer_id: TransferId) -> Self {
        self.transfer_id = Some(transfer_id);
        self
    }

    pub fn requiring_approval(mut self) -> Self {
        self.requires_approval = true;
        self
    }

    /// Fields every ledger check looks at.
    pub fn check(&self) -> StockCheck {
        StockCheck {
            movement_type: self.movement_type,
            quantity: self.quantity,
            unit_cost: self.unit_cost,
        }
    }
}

/// The part of a movement the stock check depends on.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StockCheck {
    pub movement_type: MovementType,
    pub quantity: u64,
    pub unit_cost: Decimal,
}

impl StockCheck {
    /// The single authoritative stock check.
    ///
    /// Fails fast, in order: quantity, availability, unit cost. Returns the signed
    /// delta to apply to `balance` on success.
    pub fn validate(&self, balance: &StockBalance) -> DomainResult<i64> {
        let effect = self.movement_type.effect();

        if self.quantity == 0 && effect != MovementEffect::SetAbsolute {
            return Err(DomainError::InvalidQuantity);
        }
        let quantity = i64::try_from(self.quantity).map_err(|_| DomainError::InvalidQuantity)?;

        if effect == MovementEffect::Decrease && self.quantity > balance.available() {
            return Err(DomainError::InsufficientStock {
                available: balance.available(),
                requested: self.quantity,
            });
        }

        if self.movement_type.requires_unit_cost() && self.unit_cost <= Decimal::ZERO {
            return Err(DomainError::UnitCostRequired);
        }
        if self.unit_cost < Decimal::ZERO {
            return Err(DomainError::invalid_price("unit cost cannot be negative"));
        }

        let delta = match effect {
            MovementEffect::Increase => quantity,
            MovementEffect::Decrease => -quantity,
            MovementEffect::SetAbsolute => {
                let current =
                    i64::try_from(balance.quantity_on_hand).map_err(|_| DomainError::InvalidQuantity)?;
                quantity - current
            }
        };
        Ok(delta)
    }
}

/// Immutable ledger entry.
///
/// Never mutated once COMPLETED; corrections are new offsetting movements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub id: MovementId,
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub location_id: Option<LocationId>,
    pub movement_type: MovementType,
    pub quantity: u64,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    pub occurred_at: DateTime<Utc>,
    pub reference: Option<String>,
    pub reason: Option<String>,
    pub status: MovementStatus,
    pub created_by: Option<UserId>,
    pub quantity_before: Option<u64>,
    pub quantity_after: Option<u64>,
    pub transfer_id: Option<TransferId>,
    pub created_at: DateTime<Utc>,
}

impl Movement {
    /// Build a movement from its input, resolving costs.
    ///
    /// A zero unit cost on a type that does not require one inherits
    /// `product_cost_price`.
    pub fn from_input(
        id: MovementId,
        tenant_id: TenantId,
        input: &MovementInput,
        product_cost_price: Decimal,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let unit_cost = if input.unit_cost.is_zero() && !input.movement_type.requires_unit_cost() {
            product_cost_price
        } else {
            input.unit_cost
        };
        let total_cost = match input.total_cost {
            Some(total) if total < Decimal::ZERO => {
                return Err(DomainError::invalid_price("total cost cannot be negative"));
            }
            Some(total) => total,
            None => pricing::total_cost(unit_cost, input.quantity)?,
        };

        Ok(Self {
            id,
            tenant_id,
            product_id: input.product_id,
            location_id: input.location_id,
            movement_type: input.movement_type,
            quantity: input.quantity,
            unit_cost,
            total_cost,
            occurred_at: input.occurred_at.unwrap_or(now),
            reference: input.reference.clone(),
            reason: input.reason.clone(),
            status: if input.requires_approval {
                MovementStatus::Pending
            } else {
                MovementStatus::Completed
            },
            created_by: input.created_by,
            quantity_before: None,
            quantity_after: None,
            transfer_id: input.transfer_id,
            created_at: now,
        })
    }

    pub fn key(&self) -> BalanceKey {
        BalanceKey::new(self.tenant_id, self.product_id, self.location_id)
    }

    pub fn check(&self) -> StockCheck {
        StockCheck {
            movement_type: self.movement_type,
            quantity: self.quantity,
            unit_cost: self.unit_cost,
        }
    }

    /// Mark COMPLETED with the audit snapshot of the balance around it.
    pub fn complete(&mut self, before: &StockBalance, after: &StockBalance) {
        self.status = MovementStatus::Completed;
        self.quantity_before = Some(before.quantity_on_hand);
        self.quantity_after = Some(after.quantity_on_hand);
    }

    /// Only PENDING movements can be approved or rejected.
    pub fn ensure_pending(&self, target: MovementStatus) -> DomainResult<()> {
        if self.status != MovementStatus::Pending {
            return Err(DomainError::invalid_transition(self.status, target));
        }
        Ok(())
    }

    pub fn reject(&mut self) -> DomainResult<()> {
        self.ensure_pending(MovementStatus::Cancelled)?;
        self.status = MovementStatus::Cancelled;
        Ok(())
    }
}

/// Rebuild a balance from its ledger by re-applying COMPLETED movements in order.
pub fn replay<'a>(key: BalanceKey, movements: impl IntoIterator<Item = &'a Movement>) -> StockBalance {
    let mut balance = StockBalance::zeroed(key);
    for m in movements {
        if m.status != MovementStatus::Completed || m.key() != key {
            continue;
        }
        balance.quantity_on_hand = match m.movement_type.effect() {
            MovementEffect::Increase => balance.quantity_on_hand.saturating_add(m.quantity),
            MovementEffect::Decrease => balance.quantity_on_hand.saturating_sub(m.quantity),
            MovementEffect::SetAbsolute => m.quantity,
        };
        balance.last_movement_id = Some(m.id);
        balance.version += 1;
        balance.updated_at = Some(m.created_at);
    }
    balance
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn key() -> BalanceKey {
        BalanceKey::new(TenantId::new(), ProductId::new(), Some(LocationId::new()))
    }

    fn balance_of(qty: u64) -> StockBalance {
        let mut b = StockBalance::zeroed(key());
        b.quantity_on_hand = qty;
        b
    }

    fn check(t: MovementType, quantity: u64, unit_cost: Decimal) -> StockCheck {
        StockCheck {
            movement_type: t,
            quantity,
            unit_cost,
        }
    }

    #[test]
    fn outbound_beyond_available_is_insufficient() {
        let err = check(MovementType::Outbound, 15, dec!(2))
            .validate(&balance_of(10))
            .unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                available: 10,
                requested: 15
            }
        );
    }

    #[test]
    fn inbound_requires_positive_unit_cost() {
        let err = check(MovementType::Inbound, 5, Decimal::ZERO)
            .validate(&balance_of(0))
            .unwrap_err();
        assert_eq!(err, DomainError::UnitCostRequired);
    }

    #[test]
    fn quantity_is_checked_before_stock_and_cost() {
        let err = check(MovementType::Outbound, 0, Decimal::ZERO)
            .validate(&balance_of(0))
            .unwrap_err();
        assert_eq!(err, DomainError::InvalidQuantity);

        let err = check(MovementType::Outbound, 3, Decimal::ZERO)
            .validate(&balance_of(1))
            .unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStock { .. }));
    }

    #[test]
    fn adjustments_do_not_need_unit_cost() {
        let delta = check(MovementType::Damage, 2, Decimal::ZERO)
            .validate(&balance_of(5))
            .unwrap();
        assert_eq!(delta, -2);
    }

    #[test]
    fn cycle_count_sets_absolute_quantity() {
        let up = check(MovementType::CycleCount, 12, Decimal::ZERO)
            .validate(&balance_of(7))
            .unwrap();
        assert_eq!(up, 5);

        let empty_shelf = check(MovementType::CycleCount, 0, Decimal::ZERO)
            .validate(&balance_of(7))
            .unwrap();
        assert_eq!(empty_shelf, -7);
    }

    #[test]
    fn zero_unit_cost_inherits_product_cost_for_adjustments() {
        let input = MovementInput::new(
            ProductId::new(),
            None,
            MovementType::AdjustmentIn,
            4,
            Decimal::ZERO,
        );
        let m = Movement::from_input(MovementId::new(), TenantId::new(), &input, dec!(2.50), Utc::now())
            .unwrap();
        assert_eq!(m.unit_cost, dec!(2.50));
        assert_eq!(m.total_cost, dec!(10.00));
        assert_eq!(m.status, MovementStatus::Completed);
    }

    #[test]
    fn total_cost_override_wins() {
        let mut input =
            MovementInput::new(ProductId::new(), None, MovementType::Inbound, 4, dec!(3));
        input.total_cost = Some(dec!(11.00));
        let m = Movement::from_input(MovementId::new(), TenantId::new(), &input, dec!(9), Utc::now())
            .unwrap();
        assert_eq!(m.unit_cost, dec!(3));
        assert_eq!(m.total_cost, dec!(11.00));
    }

    #[test]
    fn approval_required_starts_pending_and_can_be_rejected_once() {
        let input = MovementInput::new(ProductId::new(), None, MovementType::Inbound, 1, dec!(1))
            .requiring_approval();
        let mut m =
            Movement::from_input(MovementId::new(), TenantId::new(), &input, dec!(0), Utc::now())
                .unwrap();
        assert_eq!(m.status, MovementStatus::Pending);

        m.reject().unwrap();
        assert_eq!(m.status, MovementStatus::Cancelled);
        assert_eq!(m.reject().unwrap_err().code(), "INVALID_TRANSITION");
    }

    #[test]
    fn movement_types_serialize_screaming_snake() {
        let json = serde_json::to_string(&MovementType::AdjustmentOut).unwrap();
        assert_eq!(json, "\"ADJUSTMENT_OUT\"");
        let t: MovementType = serde_json::from_str("\"CYCLE_COUNT\"").unwrap();
        assert_eq!(t, MovementType::CycleCount);
    }

    fn any_movement_type() -> impl Strategy<Value = MovementType> {
        prop_oneof![
            Just(MovementType::Inbound),
            Just(MovementType::Outbound),
            Just(MovementType::TransferIn),
            Just(MovementType::TransferOut),
            Just(MovementType::AdjustmentIn),
            Just(MovementType::AdjustmentOut),
            Just(MovementType::ReturnIn),
            Just(MovementType::ReturnOut),
            Just(MovementType::Damage),
            Just(MovementType::Theft),
            Just(MovementType::CycleCount),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: for any sequence of movements, accepted or rejected, on-hand
        /// never goes negative and replaying the completed ledger reproduces it.
        #[test]
        fn on_hand_never_negative_and_replay_matches(
            steps in prop::collection::vec((any_movement_type(), 0u64..50u64), 1..40)
        ) {
            let key = key();
            let tenant_id = key.tenant_id;
            let mut balance = StockBalance::zeroed(key);
            let mut ledger: Vec<Movement> = Vec::new();

            for (movement_type, quantity) in steps {
                let input = MovementInput::new(
                    key.product_id,
                    key.location_id,
                    movement_type,
                    quantity,
                    dec!(1.25),
                );
                let Ok(delta) = input.check().validate(&balance) else {
                    continue;
                };
                let mut movement = Movement::from_input(
                    MovementId::new(),
                    tenant_id,
                    &input,
                    Decimal::ZERO,
                    Utc::now(),
                ).unwrap();
                let next = balance.with_delta(delta, movement.id, Utc::now()).unwrap();
                movement.complete(&balance, &next);
                balance = next;
                ledger.push(movement);
            }

            let replayed = replay(key, &ledger);
            prop_assert_eq!(replayed.quantity_on_hand, balance.quantity_on_hand);
            prop_assert_eq!(replayed.version, balance.version);
            prop_assert_eq!(replayed.last_movement_id, balance.last_movement_id);
        }
    }
}
