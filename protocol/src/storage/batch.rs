//! # Write Batches
//!
//! Every ledger operation ends in exactly one [`WriteBatch`]: the full set
//! of records it wants to write, each paired with what it expects to find
//! in storage right now. A store commits a batch by taking a [`Snapshot`]
//! of the touched keys under its own isolation, running
//! [`WriteBatch::resolve`] against it, and only then writing.
//!
//! Balance writes expect the exact record they were computed from, nonce
//! and encoded balance both. If two operations race on the same balance,
//! the first commit wins. When it moved the nonce, the second fails with
//! `InvalidNonce`, the same error a replay gets. When it only moved the
//! balance (a deposit or withdrawal), the second fails with `StaleRecord`.
//! Nothing half-applies and nothing is silently overwritten.
//!
//! The vault is written as a delta rather than a full record, so concurrent
//! deposits from different owners never conflict on custody; they only
//! serialize on it.

use std::collections::{HashMap, HashSet};

use crate::address::Address;
use crate::amount::EncodedAmount;
use crate::error::{LedgerError, LedgerResult};
use crate::state::{BalanceRecord, MintRecord, PendingTransfer, VaultRecord};

// ---------------------------------------------------------------------------
// Preconditions
// ---------------------------------------------------------------------------

/// What a balance write expects to find at its address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// No record yet. Creating writes.
    Absent,
    /// A record with exactly this nonce and encoded balance.
    Matches {
        nonce: u64,
        encoded_balance: EncodedAmount,
    },
}

impl Precondition {
    /// Expect `record` to still be what storage holds.
    pub fn unchanged(record: &BalanceRecord) -> Self {
        Precondition::Matches {
            nonce: record.nonce,
            encoded_balance: record.encoded_balance,
        }
    }
}

/// A balance record to store, guarded by a precondition.
#[derive(Debug, Clone)]
pub struct BalanceWrite {
    pub address: Address,
    pub expect: Precondition,
    pub record: BalanceRecord,
}

/// A pending-transfer mutation.
#[derive(Debug, Clone)]
pub enum PendingWrite {
    /// Create an escrow. The address must be empty.
    Insert(Address, PendingTransfer),
    /// Finalize an escrow. The address must be occupied.
    Remove(Address),
}

impl PendingWrite {
    /// The escrow address this write touches.
    pub fn address(&self) -> &Address {
        match self {
            PendingWrite::Insert(address, _) | PendingWrite::Remove(address) => address,
        }
    }
}

/// A vault mutation.
#[derive(Debug, Clone)]
pub enum VaultWrite {
    /// Bootstrap the singleton. Fails if it already exists.
    Create { address: Address, record: VaultRecord },
    /// Take in custody.
    Credit(u64),
    /// Release custody, keeping `reserve` behind.
    Debit { amount: u64, reserve: u64 },
}

// ---------------------------------------------------------------------------
// WriteBatch
// ---------------------------------------------------------------------------

/// Everything one operation writes, committed all-or-nothing.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    pub balances: Vec<BalanceWrite>,
    pub pending: Vec<PendingWrite>,
    pub vault: Option<VaultWrite>,
    pub mint: Option<(Address, MintRecord)>,
}

impl WriteBatch {
    /// An empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `record` at `address` if `expect` still holds.
    pub fn put_balance(mut self, address: Address, expect: Precondition, record: BalanceRecord) -> Self {
        self.balances.push(BalanceWrite {
            address,
            expect,
            record,
        });
        self
    }

    /// Open an escrow at an empty address.
    pub fn insert_pending(mut self, address: Address, pending: PendingTransfer) -> Self {
        self.pending.push(PendingWrite::Insert(address, pending));
        self
    }

    /// Close the escrow at `address`.
    pub fn remove_pending(mut self, address: Address) -> Self {
        self.pending.push(PendingWrite::Remove(address));
        self
    }

    /// Set the vault mutation. One per batch.
    pub fn vault(mut self, write: VaultWrite) -> Self {
        self.vault = Some(write);
        self
    }

    /// Create the mint singleton.
    pub fn mint(mut self, address: Address, record: MintRecord) -> Self {
        self.mint = Some((address, record));
        self
    }

    /// Balance addresses the batch reads and writes.
    pub fn balance_keys(&self) -> impl Iterator<Item = &Address> {
        self.balances.iter().map(|w| &w.address)
    }

    /// Pending-transfer addresses the batch reads and writes.
    pub fn pending_keys(&self) -> impl Iterator<Item = &Address> {
        self.pending.iter().map(PendingWrite::address)
    }

    /// Check every precondition against `snapshot` and compute the vault
    /// record to store, if the batch touches the vault.
    ///
    /// # Errors
    ///
    /// The first violated precondition, mapped to the error the operation
    /// would have produced had it seen the same state up front.
    pub fn resolve(&self, snapshot: &Snapshot) -> LedgerResult<Option<VaultRecord>> {
        for write in &self.balances {
            let current = snapshot.balances.get(&write.address);
            match (write.expect, current) {
                (Precondition::Absent, None) => {}
                (Precondition::Absent, Some(_)) => {
                    return Err(LedgerError::AlreadyInitialized(write.address));
                }
                (Precondition::Matches { .. }, None) => {
                    return Err(LedgerError::AccountNotInitialized {
                        owner: write.record.owner,
                    });
                }
                (Precondition::Matches { nonce, .. }, Some(record)) if record.nonce != nonce => {
                    return Err(LedgerError::InvalidNonce {
                        current: record.nonce,
                        provided: nonce,
                    });
                }
                (Precondition::Matches { encoded_balance, .. }, Some(record))
                    if record.encoded_balance != encoded_balance =>
                {
                    return Err(LedgerError::StaleRecord(write.address));
                }
                (Precondition::Matches { .. }, Some(_)) => {}
            }
        }

        for write in &self.pending {
            let present = snapshot.pending.contains(write.address());
            match write {
                PendingWrite::Insert(address, _) if present => {
                    return Err(LedgerError::AlreadyExists(*address));
                }
                PendingWrite::Remove(address) if !present => {
                    return Err(LedgerError::AccountNotFound(*address));
                }
                _ => {}
            }
        }

        if let Some((address, _)) = &self.mint {
            if snapshot.mint {
                return Err(LedgerError::AlreadyInitialized(*address));
            }
        }

        match &self.vault {
            None => Ok(None),
            Some(VaultWrite::Create { address, record }) => match snapshot.vault {
                Some(_) => Err(LedgerError::AlreadyInitialized(*address)),
                None => Ok(Some(record.clone())),
            },
            Some(VaultWrite::Credit(amount)) => {
                let vault = snapshot.vault.as_ref().ok_or(LedgerError::VaultNotInitialized)?;
                vault.credit(*amount).map(Some)
            }
            Some(VaultWrite::Debit { amount, reserve }) => {
                let vault = snapshot.vault.as_ref().ok_or(LedgerError::VaultNotInitialized)?;
                vault.debit(*amount, *reserve).map(Some)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Current contents of the keys a batch touches, read under the store's
/// isolation. Absent keys are simply missing.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub balances: HashMap<Address, BalanceRecord>,
    pub pending: HashSet<Address>,
    pub vault: Option<VaultRecord>,
    pub mint: bool,
}
