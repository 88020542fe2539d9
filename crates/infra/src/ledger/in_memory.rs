use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use stockledger_core::{MovementId, TenantId};
use stockledger_inventory::{BalanceKey, Movement, StockBalance};

use super::{LedgerStore, LedgerStoreError};

#[derive(Debug, Default)]
struct Tables {
    balances: HashMap<BalanceKey, StockBalance>,
    movements: HashMap<(TenantId, MovementId), Movement>,
    /// Movement ids per balance, in commit order.
    ledgers: HashMap<BalanceKey, Vec<MovementId>>,
}

/// In-memory ledger store.
///
/// Intended for tests/dev. One `RwLock` over all tables makes `commit` atomic.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    tables: RwLock<Tables>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn balance(&self, key: &BalanceKey) -> Result<Option<StockBalance>, LedgerStoreError> {
        let tables = self.tables.read().map_err(|_| LedgerStoreError::Poisoned)?;
        Ok(tables.balances.get(key).cloned())
    }

    fn balances(&self, tenant_id: TenantId) -> Result<Vec<StockBalance>, LedgerStoreError> {
        let tables = self.tables.read().map_err(|_| LedgerStoreError::Poisoned)?;
        let mut out: Vec<StockBalance> = tables
            .balances
            .values()
            .filter(|b| b.tenant_id == tenant_id)
            .cloned()
            .collect();
        out.sort_by_key(|b| b.key());
        Ok(out)
    }

    fn tenants(&self) -> Result<Vec<TenantId>, LedgerStoreError> {
        let tables = self.tables.read().map_err(|_| LedgerStoreError::Poisoned)?;
        let tenants: BTreeSet<TenantId> = tables.balances.keys().map(|k| k.tenant_id).collect();
        Ok(tenants.into_iter().collect())
    }

    fn movement(
        &self,
        tenant_id: TenantId,
        movement_id: MovementId,
    ) -> Result<Option<Movement>, LedgerStoreError> {
        let tables = self.tables.read().map_err(|_| LedgerStoreError::Poisoned)?;
        Ok(tables.movements.get(&(tenant_id, movement_id)).cloned())
    }

    fn movements(&self, key: &BalanceKey) -> Result<Vec<Movement>, LedgerStoreError> {
        let tables = self.tables.read().map_err(|_| LedgerStoreError::Poisoned)?;
        let Some(ids) = tables.ledgers.get(key) else {
            return Ok(vec![]);
        };
        Ok(ids
            .iter()
            .filter_map(|id| tables.movements.get(&(key.tenant_id, *id)).cloned())
            .collect())
    }

    fn commit(
        &self,
        movement: Movement,
        balance: Option<StockBalance>,
    ) -> Result<(), LedgerStoreError> {
        let mut tables = self.tables.write().map_err(|_| LedgerStoreError::Poisoned)?;
        let key = movement.key();

        if let Some(balance) = &balance {
            let stored = tables.balances.get(&key).map(|b| b.version).unwrap_or(0);
            if balance.version != stored + 1 {
                return Err(LedgerStoreError::StaleWrite {
                    expected: balance.version.saturating_sub(1),
                    stored,
                });
            }
        }

        // A re-committed movement (approval, rejection) moves to the end of its ledger,
        // so commit order always matches the order balances changed.
        let ledger = tables.ledgers.entry(key).or_default();
        ledger.retain(|id| *id != movement.id);
        ledger.push(movement.id);

        tables
            .movements
            .insert((movement.tenant_id, movement.id), movement);
        if let Some(balance) = balance {
            tables.balances.insert(key, balance);
        }
        Ok(())
    }
}
