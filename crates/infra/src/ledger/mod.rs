//! The stock ledger: movements (truth) and balances (cache), mutated under a
//! per-balance lock.

pub mod in_memory;

pub use in_memory::InMemoryLedgerStore;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::debug;

use stockledger_core::{DomainError, MovementId, TenantId};
use stockledger_inventory::movement::replay;
use stockledger_inventory::{BalanceKey, Movement, MovementStatus, StockBalance, StockCheck};

use crate::error::EngineResult;
use crate::locks::{KeyGuard, KeyedLocks};

#[derive(Debug, Error)]
pub enum LedgerStoreError {
    #[error("ledger storage lock poisoned")]
    Poisoned,

    /// A balance write did not follow the stored version.
    #[error("stale balance write (expected version {expected}, stored {stored})")]
    StaleWrite { expected: u64, stored: u64 },
}

/// Persistence boundary for balances and movements.
///
/// `commit` must be atomic: the movement and the balance become visible together
/// or not at all.
pub trait LedgerStore: Send + Sync {
    fn balance(&self, key: &BalanceKey) -> Result<Option<StockBalance>, LedgerStoreError>;

    fn balances(&self, tenant_id: TenantId) -> Result<Vec<StockBalance>, LedgerStoreError>;

    /// Companies that have at least one balance.
    fn tenants(&self) -> Result<Vec<TenantId>, LedgerStoreError>;

    fn movement(
        &self,
        tenant_id: TenantId,
        movement_id: MovementId,
    ) -> Result<Option<Movement>, LedgerStoreError>;

    /// Movements for one balance, in commit order.
    fn movements(&self, key: &BalanceKey) -> Result<Vec<Movement>, LedgerStoreError>;

    /// Persist `movement` (insert or replace by id) and, when given, the new balance.
    ///
    /// A balance is accepted only when its version is exactly one past the stored one.
    fn commit(
        &self,
        movement: Movement,
        balance: Option<StockBalance>,
    ) -> Result<(), LedgerStoreError>;
}

impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    fn balance(&self, key: &BalanceKey) -> Result<Option<StockBalance>, LedgerStoreError> {
        (**self).balance(key)
    }

    fn balances(&self, tenant_id: TenantId) -> Result<Vec<StockBalance>, LedgerStoreError> {
        (**self).balances(tenant_id)
    }

    fn tenants(&self) -> Result<Vec<TenantId>, LedgerStoreError> {
        (**self).tenants()
    }

    fn movement(
        &self,
        tenant_id: TenantId,
        movement_id: MovementId,
    ) -> Result<Option<Movement>, LedgerStoreError> {
        (**self).movement(tenant_id, movement_id)
    }

    fn movements(&self, key: &BalanceKey) -> Result<Vec<Movement>, LedgerStoreError> {
        (**self).movements(key)
    }

    fn commit(
        &self,
        movement: Movement,
        balance: Option<StockBalance>,
    ) -> Result<(), LedgerStoreError> {
        (**self).commit(movement, balance)
    }
}

/// Result of a ledger write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub movement: Movement,
    pub before: StockBalance,
    /// Equal to `before` when the movement was held for approval.
    pub after: StockBalance,
}

impl LedgerEntry {
    pub fn applied(&self) -> bool {
        self.movement.status == MovementStatus::Completed
    }
}

/// Serialized access to balances.
///
/// Every mutation of a balance key runs under that key's lock, so concurrent
/// movements against one balance apply one at a time while unrelated balances
/// proceed in parallel. Reads never take the key lock.
pub struct Ledger {
    store: Arc<dyn LedgerStore>,
    locks: KeyedLocks<BalanceKey>,
    lock_timeout: Duration,
}

impl core::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Ledger")
            .field("lock_timeout", &self.lock_timeout)
            .finish_non_exhaustive()
    }
}

impl Ledger {
    pub fn new(store: Arc<dyn LedgerStore>, lock_timeout: Duration) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
            lock_timeout,
        }
    }

    /// Current balance; zeroed for a key that never saw a movement.
    pub fn balance(&self, key: BalanceKey) -> EngineResult<StockBalance> {
        Ok(self
            .store
            .balance(&key)?
            .unwrap_or_else(|| StockBalance::zeroed(key)))
    }

    pub fn balances(&self, tenant_id: TenantId) -> EngineResult<Vec<StockBalance>> {
        Ok(self.store.balances(tenant_id)?)
    }

    pub fn tenants(&self) -> EngineResult<Vec<TenantId>> {
        Ok(self.store.tenants()?)
    }

    pub fn movement(&self, tenant_id: TenantId, movement_id: MovementId) -> EngineResult<Movement> {
        self.store
            .movement(tenant_id, movement_id)?
            .ok_or_else(|| DomainError::MovementNotFound(movement_id).into())
    }

    pub fn movements(&self, key: BalanceKey) -> EngineResult<Vec<Movement>> {
        Ok(self.store.movements(&key)?)
    }

    /// Rebuild the balance for `key` from its COMPLETED movements.
    pub fn replay(&self, key: BalanceKey) -> EngineResult<StockBalance> {
        let movements = self.store.movements(&key)?;
        Ok(replay(key, &movements))
    }

    /// Hold the lock for `key`. Exposed so callers can fence a balance explicitly.
    pub fn lock(&self, key: BalanceKey) -> EngineResult<KeyGuard<'_, BalanceKey>> {
        Ok(self.locks.acquire(key, self.lock_timeout)?)
    }

    /// Validate and record one movement against the locked balance.
    ///
    /// Runs `check` against the current balance first; only then does `build` produce
    /// the movement (catalog failures surface there). A COMPLETED movement is applied
    /// to the balance and both are committed together; a PENDING one is stored
    /// without touching the balance.
    pub fn record<F>(&self, key: BalanceKey, check: StockCheck, build: F) -> EngineResult<LedgerEntry>
    where
        F: FnOnce(&StockBalance) -> EngineResult<Movement>,
    {
        let _guard = self.lock(key)?;
        let before = self.balance(key)?;

        let delta = check.validate(&before)?;
        let mut movement = build(&before)?;

        if movement.status != MovementStatus::Completed {
            self.store.commit(movement.clone(), None)?;
            return Ok(LedgerEntry {
                movement,
                after: before.clone(),
                before,
            });
        }

        let after = before.with_delta(delta, movement.id, Utc::now())?;
        movement.complete(&before, &after);
        self.store.commit(movement.clone(), Some(after.clone()))?;
        debug!(
            movement_id = %movement.id,
            product_id = %key.product_id,
            delta,
            quantity_on_hand = after.quantity_on_hand,
            "balance updated"
        );

        Ok(LedgerEntry {
            movement,
            before,
            after,
        })
    }

    /// PENDING -> COMPLETED, re-validated against the then-current balance.
    pub fn approve(&self, tenant_id: TenantId, movement_id: MovementId) -> EngineResult<LedgerEntry> {
        let key = self.movement(tenant_id, movement_id)?.key();
        let _guard = self.lock(key)?;

        // Re-read under the lock; a concurrent approve/reject may have won.
        let mut movement = self.movement(tenant_id, movement_id)?;
        movement.ensure_pending(MovementStatus::Completed)?;

        let before = self.balance(key)?;
        let delta = movement.check().validate(&before)?;
        let after = before.with_delta(delta, movement.id, Utc::now())?;
        movement.complete(&before, &after);
        self.store.commit(movement.clone(), Some(after.clone()))?;

        Ok(LedgerEntry {
            movement,
            before,
            after,
        })
    }

    /// PENDING -> CANCELLED. The balance is untouched.
    pub fn reject(&self, tenant_id: TenantId, movement_id: MovementId) -> EngineResult<Movement> {
        let key = self.movement(tenant_id, movement_id)?.key();
        let _guard = self.lock(key)?;

        let mut movement = self.movement(tenant_id, movement_id)?;
        movement.reject()?;
        self.store.commit(movement.clone(), None)?;
        Ok(movement)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use stockledger_core::{LocationId, ProductId};
    use stockledger_inventory::{MovementInput, MovementType};

    use super::*;
    use crate::error::EngineError;

    fn ledger() -> Ledger {
        Ledger::new(Arc::new(InMemoryLedgerStore::new()), Duration::from_millis(50))
    }

    fn key() -> BalanceKey {
        BalanceKey::new(TenantId::new(), ProductId::new(), Some(LocationId::new()))
    }

    fn record(ledger: &Ledger, key: BalanceKey, t: MovementType, qty: u64) -> EngineResult<LedgerEntry> {
        let input = MovementInput::new(key.product_id, key.location_id, t, qty, dec!(1));
        ledger.record(key, input.check(), |_| {
            Ok(Movement::from_input(
                MovementId::new(),
                key.tenant_id,
                &input,
                Decimal::ZERO,
                Utc::now(),
            )?)
        })
    }

    #[test]
    fn unknown_key_reads_as_zero() {
        let l = ledger();
        let k = key();
        let b = l.balance(k).unwrap();
        assert_eq!(b.quantity_on_hand, 0);
        assert_eq!(b.key(), k);
    }

    #[test]
    fn record_commits_movement_and_balance_together() {
        let l = ledger();
        let k = key();
        let entry = record(&l, k, MovementType::Inbound, 10).unwrap();

        assert!(entry.applied());
        assert_eq!(entry.movement.quantity_before, Some(0));
        assert_eq!(entry.movement.quantity_after, Some(10));
        assert_eq!(l.balance(k).unwrap().quantity_on_hand, 10);
        assert_eq!(l.movements(k).unwrap().len(), 1);
    }

    #[test]
    fn rejected_movement_leaves_no_trace() {
        let l = ledger();
        let k = key();
        record(&l, k, MovementType::Inbound, 10).unwrap();

        let err = record(&l, k, MovementType::Outbound, 15).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Domain(DomainError::InsufficientStock {
                available: 10,
                requested: 15
            })
        ));
        assert_eq!(l.balance(k).unwrap().quantity_on_hand, 10);
        assert_eq!(l.movements(k).unwrap().len(), 1);
    }

    #[test]
    fn held_lock_makes_writer_time_out() {
        let l = ledger();
        let k = key();
        let _fence = l.lock(k).unwrap();

        let err = record(&l, k, MovementType::Inbound, 1).unwrap_err();
        assert!(matches!(err, EngineError::LockTimeout(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn approval_applies_against_current_balance() {
        let l = ledger();
        let k = key();
        record(&l, k, MovementType::Inbound, 8).unwrap();

        let input = MovementInput::new(k.product_id, k.location_id, MovementType::Outbound, 5, dec!(1))
            .requiring_approval();
        let pending = l
            .record(k, input.check(), |_| {
                Ok(Movement::from_input(MovementId::new(), k.tenant_id, &input, Decimal::ZERO, Utc::now())?)
            })
            .unwrap();
        assert!(!pending.applied());
        assert_eq!(l.balance(k).unwrap().quantity_on_hand, 8);

        record(&l, k, MovementType::Inbound, 2).unwrap();
        let approved = l.approve(k.tenant_id, pending.movement.id).unwrap();
        assert_eq!(approved.after.quantity_on_hand, 5);
        assert_eq!(l.replay(k).unwrap().quantity_on_hand, 5);

        let again = l.approve(k.tenant_id, pending.movement.id).unwrap_err();
        assert_eq!(again.code(), "INVALID_TRANSITION");
    }

    #[test]
    fn concurrent_outbound_never_oversells() {
        let l = Arc::new(Ledger::new(
            Arc::new(InMemoryLedgerStore::new()),
            Duration::from_secs(5),
        ));
        let k = key();
        record(&l, k, MovementType::Inbound, 20).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let l = l.clone();
                thread::spawn(move || {
                    (0..5)
                        .filter(|_| record(&l, k, MovementType::Outbound, 1).is_ok())
                        .count()
                })
            })
            .collect();
        let shipped: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(shipped, 20);
        assert_eq!(l.balance(k).unwrap().quantity_on_hand, 0);
        assert_eq!(l.replay(k).unwrap().quantity_on_hand, 0);
    }

    fn movement_type() -> impl proptest::strategy::Strategy<Value = MovementType> {
        use proptest::prelude::*;
        prop_oneof![
            Just(MovementType::Inbound),
            Just(MovementType::Outbound),
            Just(MovementType::AdjustmentIn),
            Just(MovementType::Damage),
            Just(MovementType::CycleCount),
        ]
    }

    proptest::proptest! {
        #[test]
        fn stored_balance_always_matches_replay(
            ops in proptest::collection::vec((movement_type(), 0u64..40), 1..40)
        ) {
            let l = ledger();
            let k = key();
            for (t, qty) in ops {
                let before = l.balance(k).unwrap().quantity_on_hand;
                match record(&l, k, t, qty) {
                    Ok(entry) => {
                        proptest::prop_assert_eq!(entry.movement.quantity_before, Some(before));
                    }
                    Err(err) => {
                        proptest::prop_assert!(!err.is_retryable());
                        proptest::prop_assert_eq!(l.balance(k).unwrap().quantity_on_hand, before);
                    }
                }
            }
            proptest::prop_assert_eq!(
                l.replay(k).unwrap().quantity_on_hand,
                l.balance(k).unwrap().quantity_on_hand
            );
        }
    }
}
