//! # Ledger: Accounts, Vault, and Escrow
//!
//! The state machine itself. [`Ledger`] owns a [`LedgerStore`], an
//! [`AmountCodec`], and a list of event sinks, and exposes one method per
//! operation:
//!
//! ```text
//! account.rs     - initialize_mint, initialize_balance, deposit, withdraw
//! transfer.rs    - private_transfer and the indexer-field helpers
//! escrow.rs      - create_transfer, claim_transfer, cancel_transfer, queries
//! reconcile.rs   - read-only custody diagnostics
//! instruction.rs - serializable instructions, signing, and `execute`
//! ```
//!
//! ## Shape of an operation
//!
//! 1. Check the caller.
//! 2. Read what the operation needs and compute the next records with the
//!    pure primitives on [`BalanceRecord`] and [`VaultRecord`].
//! 3. Commit one [`WriteBatch`]. The store re-checks every precondition, so
//!    a writer on another handle that got there first turns this commit into
//!    `InvalidNonce` or `StaleRecord` instead of a lost update.
//! 4. Publish one event. Sink failures are logged, never returned.
//!
//! Steps 2 to 4 run under the ledger's write lock. Operations on one
//! `Ledger` are therefore applied one at a time, and every sink sees events
//! in strictly increasing slot order. Queries do not take the lock.
//!
//! Only balance-to-balance movements (transfers, escrow create, claim, and
//! cancel) advance a record's nonce. Deposits and withdrawals change the
//! balance and custody but leave the nonce where it was.
//!
//! Every method returns the published [`LedgerEvent`] as its receipt.
//!
//! ## Two sources of truth
//!
//! Balances are per-owner and encoded; custody is one pooled number. They
//! are kept in step by construction (deposit and withdrawal move both in
//! the same commit, and declared amounts must match the encoded ones) and
//! checked by [`Ledger::reconcile`]. Nothing in this module ever rewrites a
//! balance to paper over a mismatch.

mod account;
mod escrow;
mod instruction;
mod reconcile;
mod transfer;

pub use instruction::{Instruction, SignedInstruction};
pub use reconcile::{AccountDrift, ReconciliationReport, ReconciliationStatus};
pub use transfer::{transfer_commitment, transfer_tag};

use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::address::{balance_address, vault_address, Address};
use crate::amount::{AmountCodec, PlaintextCodec};
use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::events::{EventKind, EventSink, LedgerEvent};
use crate::identity::Identity;
use crate::state::{BalanceRecord, MintRecord, PendingTransfer, VaultRecord};
use crate::storage::{LedgerStore, VaultWrite, WriteBatch};

/// A ledger instance over a store.
pub struct Ledger<S: LedgerStore> {
    store: S,
    codec: Box<dyn AmountCodec>,
    config: LedgerConfig,
    sinks: Vec<Arc<dyn EventSink>>,
    writer: Mutex<()>,
}

impl<S: LedgerStore> Ledger<S> {
    /// Open a ledger over `store`, creating the vault on first use.
    ///
    /// Vault bootstrap is idempotent: reopening a store that already has a
    /// vault leaves custody alone.
    pub fn open(store: S, config: LedgerConfig) -> LedgerResult<Self> {
        let ledger = Self {
            store,
            codec: Box::new(PlaintextCodec),
            config,
            sinks: Vec::new(),
            writer: Mutex::new(()),
        };
        ledger.bootstrap_vault()?;
        Ok(ledger)
    }

    /// Swap in a different amount codec.
    pub fn with_codec(mut self, codec: impl AmountCodec + 'static) -> Self {
        self.codec = Box::new(codec);
        self
    }

    /// Add an event sink.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Parameters the ledger was opened with.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// The backing store. Writing to it directly bypasses authorization
    /// and event publication.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Codec used to decode and combine encoded amounts.
    pub fn codec(&self) -> &dyn AmountCodec {
        self.codec.as_ref()
    }

    fn bootstrap_vault(&self) -> LedgerResult<()> {
        if self.store.vault()?.is_some() {
            return Ok(());
        }
        let (address, bump) = vault_address()?;
        let batch = WriteBatch::new().vault(VaultWrite::Create {
            address,
            record: VaultRecord::new(bump),
        });
        match self.store.commit(&batch) {
            Ok(committed) => {
                info!(slot = committed.slot, %address, "vault bootstrapped");
                Ok(())
            }
            // Another handle on the same store won the race.
            Err(LedgerError::AlreadyInitialized(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    // -- Queries --------------------------------------------------------------

    /// `owner`'s balance record, if it exists.
    pub fn balance_record(&self, owner: &Identity) -> LedgerResult<Option<BalanceRecord>> {
        let (address, _) = balance_address(owner)?;
        self.store.balance(&address)
    }

    /// `owner`'s decoded balance.
    pub fn balance(&self, owner: &Identity) -> LedgerResult<u64> {
        let (_, record) = self.load_balance(owner)?;
        Ok(record.balance(self.codec()))
    }

    /// `owner`'s current nonce, the value the next debit must carry.
    pub fn nonce(&self, owner: &Identity) -> LedgerResult<u64> {
        let (_, record) = self.load_balance(owner)?;
        Ok(record.nonce)
    }

    /// The vault singleton.
    pub fn vault(&self) -> LedgerResult<VaultRecord> {
        self.store.vault()?.ok_or(LedgerError::VaultNotInitialized)
    }

    /// The mint singleton, if initialized.
    pub fn mint(&self) -> LedgerResult<Option<MintRecord>> {
        self.store.mint()
    }

    /// The escrow at `address`, if it is still open.
    pub fn pending_transfer(&self, address: &Address) -> LedgerResult<Option<PendingTransfer>> {
        self.store.pending_transfer(address)
    }

    // -- Internals ------------------------------------------------------------

    fn load_balance(&self, owner: &Identity) -> LedgerResult<(Address, BalanceRecord)> {
        let (address, _) = balance_address(owner)?;
        let record = self
            .store
            .balance(&address)?
            .ok_or(LedgerError::AccountNotInitialized { owner: *owner })?;
        Ok((address, record))
    }

    fn publish(&self, slot: u64, kind: EventKind) -> LedgerEvent {
        let event = LedgerEvent {
            slot,
            timestamp: Utc::now(),
            kind,
        };
        for sink in &self.sinks {
            if let Err(e) = sink.publish(&event) {
                warn!(slot, kind = event.kind.name(), error = %e, "event sink failed");
            }
        }
        event
    }

    /// Run the mutating operation `op` under the write lock, logging a
    /// rejection at `debug`.
    ///
    /// The guard is held until `f` has published, so slot order and
    /// publication order agree.
    fn sequenced<T>(
        &self,
        op: &'static str,
        f: impl FnOnce() -> LedgerResult<T>,
    ) -> LedgerResult<T> {
        let _guard = self.writer.lock();
        f().map_err(|e| {
            debug!(op, error = %e, "operation rejected");
            e
        })
    }
}
