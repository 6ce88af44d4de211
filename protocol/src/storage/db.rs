//! # SledStore: Persistent Ledger Storage
//!
//! The on-disk [`LedgerStore`], built on sled's embedded key-value store.
//!
//! ## Tree Layout
//!
//! | Tree         | Key                   | Value                    |
//! |--------------|-----------------------|--------------------------|
//! | `balances`   | balance address (32B) | `bincode(BalanceRecord)` |
//! | `pending`    | escrow address (32B)  | `bincode(PendingTransfer)` |
//! | `singletons` | `vault`               | `bincode(VaultRecord)`   |
//! | `singletons` | `mint`                | `bincode(MintRecord)`    |
//! | `singletons` | `last_slot`           | slot (8B BE)             |
//!
//! ## Atomicity
//!
//! A commit is one sled transaction across all three trees. The snapshot
//! is read inside the transaction, so preconditions are checked against
//! exactly the state the writes land on. If sled detects a conflicting
//! concurrent transaction it reruns the closure, which re-reads and
//! re-resolves; a batch that no longer fits aborts with the ledger error.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
};
use sled::{Db, Transactional, Tree};
use std::path::Path;

use super::batch::{PendingWrite, Snapshot, WriteBatch};
use super::{Committed, LedgerStore};
use crate::address::Address;
use crate::error::{LedgerError, LedgerResult};
use crate::state::{BalanceRecord, MintRecord, PendingTransfer, VaultRecord};

// ---------------------------------------------------------------------------
// Singleton Keys
// ---------------------------------------------------------------------------

const VAULT_KEY: &[u8] = b"vault";
const MINT_KEY: &[u8] = b"mint";
const LAST_SLOT_KEY: &[u8] = b"last_slot";

// ---------------------------------------------------------------------------
// SledStore
// ---------------------------------------------------------------------------

/// Persistent ledger store.
///
/// Cloning is cheap and clones share the same database, the same way sled
/// handles do.
#[derive(Debug, Clone)]
pub struct SledStore {
    db: Db,
    balances: Tree,
    pending: Tree,
    singletons: Tree,
}

impl SledStore {
    /// Open or create a store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> LedgerResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// A store that lives in a temporary directory and disappears on drop.
    pub fn open_temporary() -> LedgerResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> LedgerResult<Self> {
        let balances = db.open_tree("balances")?;
        let pending = db.open_tree("pending")?;
        let singletons = db.open_tree("singletons")?;
        Ok(Self {
            db,
            balances,
            pending,
            singletons,
        })
    }

    /// Block until every committed write is durable.
    pub fn flush(&self) -> LedgerResult<()> {
        self.db.flush()?;
        Ok(())
    }

    fn get<T: DeserializeOwned>(tree: &Tree, key: &[u8]) -> LedgerResult<Option<T>> {
        match tree.get(key)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }
}

impl LedgerStore for SledStore {
    fn balance(&self, address: &Address) -> LedgerResult<Option<BalanceRecord>> {
        Self::get(&self.balances, address.as_bytes())
    }

    fn balances(&self) -> LedgerResult<Vec<BalanceRecord>> {
        let mut records = Vec::new();
        for entry in self.balances.iter() {
            let (_key, value) = entry?;
            records.push(bincode::deserialize::<BalanceRecord>(&value)?);
        }
        // Keys are derived addresses, so tree order is not owner order.
        records.sort_by_key(|r| r.owner);
        Ok(records)
    }

    fn pending_transfer(&self, address: &Address) -> LedgerResult<Option<PendingTransfer>> {
        Self::get(&self.pending, address.as_bytes())
    }

    fn pending_transfers(&self) -> LedgerResult<Vec<(Address, PendingTransfer)>> {
        let mut entries = Vec::new();
        for entry in self.pending.iter() {
            let (key, value) = entry?;
            let bytes: [u8; 32] = key.as_ref().try_into().map_err(|_| {
                LedgerError::Serialization(format!("pending key is {} bytes", key.len()))
            })?;
            entries.push((Address::from_bytes(bytes), bincode::deserialize(&value)?));
        }
        Ok(entries)
    }

    fn vault(&self) -> LedgerResult<Option<VaultRecord>> {
        Self::get(&self.singletons, VAULT_KEY)
    }

    fn mint(&self) -> LedgerResult<Option<MintRecord>> {
        Self::get(&self.singletons, MINT_KEY)
    }

    fn last_slot(&self) -> LedgerResult<u64> {
        match self.singletons.get(LAST_SLOT_KEY)? {
            Some(bytes) => decode_slot(&bytes),
            None => Ok(0),
        }
    }

    fn commit(&self, batch: &WriteBatch) -> LedgerResult<Committed> {
        let trees = (&self.balances, &self.pending, &self.singletons);
        let result: Result<Committed, TransactionError<LedgerError>> = trees.transaction(
            |(balances, pending, singletons)| {
                let mut snapshot = Snapshot::default();
                for address in batch.balance_keys() {
                    if let Some(bytes) = balances.get(address.as_bytes())? {
                        snapshot.balances.insert(*address, decode_in_tx(&bytes)?);
                    }
                }
                for address in batch.pending_keys() {
                    if pending.get(address.as_bytes())?.is_some() {
                        snapshot.pending.insert(*address);
                    }
                }
                if let Some(bytes) = singletons.get(VAULT_KEY)? {
                    snapshot.vault = Some(decode_in_tx(&bytes)?);
                }
                snapshot.mint = singletons.get(MINT_KEY)?.is_some();

                let vault = batch
                    .resolve(&snapshot)
                    .map_err(ConflictableTransactionError::Abort)?;

                let last_slot = match singletons.get(LAST_SLOT_KEY)? {
                    Some(bytes) => {
                        decode_slot(&bytes).map_err(ConflictableTransactionError::Abort)?
                    }
                    None => 0,
                };
                let slot = last_slot
                    .checked_add(1)
                    .ok_or(ConflictableTransactionError::Abort(LedgerError::Overflow))?;

                for write in &batch.balances {
                    balances.insert(&write.address.as_bytes()[..], encode_in_tx(&write.record)?)?;
                }
                for write in &batch.pending {
                    match write {
                        PendingWrite::Insert(address, record) => {
                            pending.insert(&address.as_bytes()[..], encode_in_tx(record)?)?;
                        }
                        PendingWrite::Remove(address) => {
                            pending.remove(&address.as_bytes()[..])?;
                        }
                    }
                }
                if let Some(vault) = &vault {
                    singletons.insert(VAULT_KEY, encode_in_tx(vault)?)?;
                }
                if let Some((_, mint)) = &batch.mint {
                    singletons.insert(MINT_KEY, encode_in_tx(mint)?)?;
                }
                singletons.insert(LAST_SLOT_KEY, slot.to_be_bytes().to_vec())?;

                Ok(Committed { slot, vault })
            },
        );

        result.map_err(|e| match e {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => LedgerError::from(e),
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn decode_slot(bytes: &[u8]) -> LedgerResult<u64> {
    let be: [u8; 8] = bytes
        .try_into()
        .map_err(|_| LedgerError::Serialization("invalid slot bytes".to_string()))?;
    Ok(u64::from_be_bytes(be))
}

fn decode_in_tx<T: DeserializeOwned>(
    bytes: &[u8],
) -> ConflictableTransactionResult<T, LedgerError> {
    bincode::deserialize(bytes).map_err(|e| ConflictableTransactionError::Abort(e.into()))
}

fn encode_in_tx<T: Serialize>(value: &T) -> ConflictableTransactionResult<Vec<u8>, LedgerError> {
    bincode::serialize(value).map_err(|e| ConflictableTransactionError::Abort(e.into()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
