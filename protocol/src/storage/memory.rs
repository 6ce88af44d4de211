//! In-memory [`LedgerStore`]. One write lock per commit, so commits are
//! trivially serializable. Nothing survives a drop.

use parking_lot::RwLock;
use std::collections::HashMap;

use super::batch::{PendingWrite, Snapshot, WriteBatch};
use super::{Committed, LedgerStore};
use crate::address::Address;
use crate::error::{LedgerError, LedgerResult};
use crate::state::{BalanceRecord, MintRecord, PendingTransfer, VaultRecord};

#[derive(Debug, Default)]
struct Inner {
    balances: HashMap<Address, BalanceRecord>,
    pending: HashMap<Address, PendingTransfer>,
    vault: Option<VaultRecord>,
    mint: Option<MintRecord>,
    last_slot: u64,
}

/// Volatile store for tests, benches, and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryStore {
    fn balance(&self, address: &Address) -> LedgerResult<Option<BalanceRecord>> {
        Ok(self.inner.read().balances.get(address).cloned())
    }

    fn balances(&self) -> LedgerResult<Vec<BalanceRecord>> {
        let mut records: Vec<_> = self.inner.read().balances.values().cloned().collect();
        records.sort_by_key(|r| r.owner);
        Ok(records)
    }

    fn pending_transfer(&self, address: &Address) -> LedgerResult<Option<PendingTransfer>> {
        Ok(self.inner.read().pending.get(address).cloned())
    }

    fn pending_transfers(&self) -> LedgerResult<Vec<(Address, PendingTransfer)>> {
        let mut entries: Vec<_> = self
            .inner
            .read()
            .pending
            .iter()
            .map(|(a, p)| (*a, p.clone()))
            .collect();
        entries.sort_by_key(|(a, _)| *a);
        Ok(entries)
    }

    fn vault(&self) -> LedgerResult<Option<VaultRecord>> {
        Ok(self.inner.read().vault.clone())
    }

    fn mint(&self) -> LedgerResult<Option<MintRecord>> {
        Ok(self.inner.read().mint.clone())
    }

    fn last_slot(&self) -> LedgerResult<u64> {
        Ok(self.inner.read().last_slot)
    }

    fn commit(&self, batch: &WriteBatch) -> LedgerResult<Committed> {
        let mut inner = self.inner.write();

        let mut snapshot = Snapshot {
            vault: inner.vault.clone(),
            mint: inner.mint.is_some(),
            ..Snapshot::default()
        };
        for address in batch.balance_keys() {
            if let Some(record) = inner.balances.get(address) {
                snapshot.balances.insert(*address, record.clone());
            }
        }
        for address in batch.pending_keys() {
            if inner.pending.contains_key(address) {
                snapshot.pending.insert(*address);
            }
        }

        let vault = batch.resolve(&snapshot)?;
        let slot = inner.last_slot.checked_add(1).ok_or(LedgerError::Overflow)?;

        for write in &batch.balances {
            inner.balances.insert(write.address, write.record.clone());
        }
        for write in &batch.pending {
            match write {
                PendingWrite::Insert(address, pending) => {
                    inner.pending.insert(*address, pending.clone());
                }
                PendingWrite::Remove(address) => {
                    inner.pending.remove(address);
                }
            }
        }
        if let Some(vault) = &vault {
            inner.vault = Some(vault.clone());
        }
        if let Some((_, mint)) = &batch.mint {
            inner.mint = Some(mint.clone());
        }
        inner.last_slot = slot;

        Ok(Committed { slot, vault })
    }
}
