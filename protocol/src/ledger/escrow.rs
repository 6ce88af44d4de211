//! # Escrowed Transfers
//!
//! Two-phase transfers. Creating one debits the sender immediately and
//! parks the amount in a [`PendingTransfer`] at an address derived from
//! `(sender, recipient, sender nonce)`. The recipient claims it, or the
//! sender cancels it; either way the record is deleted in the same commit
//! that credits the funds, so the second attempt finds nothing and fails
//! with `AccountNotFound`.
//!
//! A claim creates the recipient's balance record if it does not exist
//! yet. Direct transfers deliberately do not.

use chrono::Utc;
use tracing::info;

use super::Ledger;
use crate::address::{balance_address, pending_transfer_address, Address};
use crate::amount::EncodedAmount;
use crate::error::{LedgerError, LedgerResult};
use crate::events::{EventKind, LedgerEvent};
use crate::identity::{Caller, Identity};
use crate::state::{BalanceRecord, PendingTransfer, TransferState};
use crate::storage::{LedgerStore, Precondition, WriteBatch};

impl<S: LedgerStore> Ledger<S> {
    /// Escrow `encoded` from `sender` for `recipient`.
    ///
    /// `nonce` must be the sender's current nonce; it is captured into the
    /// escrow and its address.
    ///
    /// # Errors
    ///
    /// `InvalidNonce`, `InsufficientBalance`, `AlreadyExists` if the derived
    /// address is occupied, plus the usual authorization failures.
    pub fn create_transfer(
        &self,
        caller: &Caller,
        sender: &Identity,
        recipient: &Identity,
        encoded: &EncodedAmount,
        nonce: u64,
    ) -> LedgerResult<LedgerEvent> {
        self.sequenced("create_transfer", || {
            caller.require(sender)?;
            let (sender_address, record) = self.load_balance(sender)?;
            let debited = record.apply_debit(self.codec(), encoded, nonce)?;

            let (address, bump) = pending_transfer_address(sender, recipient, nonce)?;
            if self.store.pending_transfer(&address)?.is_some() {
                return Err(LedgerError::AlreadyExists(address));
            }

            let pending = PendingTransfer {
                sender: *sender,
                recipient: *recipient,
                encoded_amount: *encoded,
                nonce,
                created_at: Utc::now(),
                bump,
            };
            let batch = WriteBatch::new()
                .put_balance(sender_address, Precondition::unchanged(&record), debited)
                .insert_pending(address, pending);
            let committed = self.store.commit(&batch)?;
            info!(
                slot = committed.slot,
                %address,
                %sender,
                %recipient,
                nonce,
                state = %TransferState::Created,
                "escrow created"
            );

            Ok(self.publish(
                committed.slot,
                EventKind::TransferCreated {
                    address,
                    sender: *sender,
                    recipient: *recipient,
                    encoded_amount: *encoded,
                    nonce,
                },
            ))
        })
    }

    /// Release the escrow at `address` to its recipient.
    ///
    /// # Errors
    ///
    /// `AccountNotFound` if no escrow is open there, `UnauthorizedAccess`
    /// unless the recipient signed, `Overflow` on the recipient's balance.
    pub fn claim_transfer(&self, caller: &Caller, address: &Address) -> LedgerResult<LedgerEvent> {
        self.sequenced("claim_transfer", || {
            let pending = self.load_pending(address)?;
            caller.require(&pending.recipient)?;

            let (recipient_address, bump) = balance_address(&pending.recipient)?;
            let (expect, base, provisioned) = match self.store.balance(&recipient_address)? {
                Some(record) => (Precondition::unchanged(&record), record, false),
                None => (
                    Precondition::Absent,
                    BalanceRecord::new(pending.recipient, bump, self.codec()),
                    true,
                ),
            };
            let credited = base.apply_credit(self.codec(), &pending.encoded_amount)?;

            let batch = WriteBatch::new()
                .put_balance(recipient_address, expect, credited)
                .remove_pending(*address);
            let committed = self.store.commit(&batch)?;
            info!(
                slot = committed.slot,
                %address,
                recipient = %pending.recipient,
                provisioned,
                state = %TransferState::Claimed,
                "escrow claimed"
            );

            Ok(self.publish(
                committed.slot,
                EventKind::TransferClaimed {
                    address: *address,
                    sender: pending.sender,
                    recipient: pending.recipient,
                    encoded_amount: pending.encoded_amount,
                    recipient_provisioned: provisioned,
                },
            ))
        })
    }

    /// Return the escrow at `address` to its sender.
    ///
    /// The refund is a fresh credit, so the sender's nonce moves again: a
    /// create followed by a cancel leaves it two higher.
    ///
    /// # Errors
    ///
    /// `AccountNotFound` if no escrow is open there, `UnauthorizedAccess`
    /// unless the sender signed.
    pub fn cancel_transfer(&self, caller: &Caller, address: &Address) -> LedgerResult<LedgerEvent> {
        self.sequenced("cancel_transfer", || {
            let pending = self.load_pending(address)?;
            caller.require(&pending.sender)?;

            let (sender_address, record) = self.load_balance(&pending.sender)?;
            let refunded = record.apply_credit(self.codec(), &pending.encoded_amount)?;

            let batch = WriteBatch::new()
                .put_balance(sender_address, Precondition::unchanged(&record), refunded)
                .remove_pending(*address);
            let committed = self.store.commit(&batch)?;
            info!(
                slot = committed.slot,
                %address,
                sender = %pending.sender,
                state = %TransferState::Cancelled,
                "escrow cancelled"
            );

            Ok(self.publish(
                committed.slot,
                EventKind::TransferCancelled {
                    address: *address,
                    sender: pending.sender,
                    recipient: pending.recipient,
                    encoded_amount: pending.encoded_amount,
                },
            ))
        })
    }

    /// Open escrows waiting for `recipient` to claim.
    pub fn pending_transfers_for(
        &self,
        recipient: &Identity,
    ) -> LedgerResult<Vec<(Address, PendingTransfer)>> {
        let mut all = self.store.pending_transfers()?;
        all.retain(|(_, p)| p.recipient == *recipient);
        Ok(all)
    }

    /// Open escrows `sender` has created and could still cancel.
    pub fn pending_transfers_from(
        &self,
        sender: &Identity,
    ) -> LedgerResult<Vec<(Address, PendingTransfer)>> {
        let mut all = self.store.pending_transfers()?;
        all.retain(|(_, p)| p.sender == *sender);
        Ok(all)
    }

    fn load_pending(&self, address: &Address) -> LedgerResult<PendingTransfer> {
        self.store
            .pending_transfer(address)?
            .ok_or(LedgerError::AccountNotFound(*address))
    }
}
