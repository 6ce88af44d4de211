//! # Direct Transfers
//!
//! Balance to balance in one commit, no escrow. The sender names the nonce
//! it expects its record to be at; anything else (a replay of a transfer
//! that already landed, or one submitted ahead of its turn) is
//! `InvalidNonce`.
//!
//! Unlike an escrow claim, a direct transfer never creates the receiver's
//! record. Sending to someone who has not opened an account fails with
//! `AccountNotInitialized`, and the sender's funds stay put.
//!
//! `commitment` and `tag` are opaque to the ledger. It forwards them to the
//! event stream for indexers and never looks inside. The helpers at the
//! bottom are how our own clients fill them in.

use tracing::info;

use super::Ledger;
use crate::amount::EncodedAmount;
use crate::config::{COMMITMENT_SIZE, TRANSFER_COMMITMENT_CONTEXT, TRANSFER_TAG_CONTEXT};
use crate::crypto::hash::blake3_derive;
use crate::error::{LedgerError, LedgerResult};
use crate::events::{EventKind, LedgerEvent};
use crate::identity::{Caller, Identity};
use crate::storage::{LedgerStore, Precondition, WriteBatch};

impl<S: LedgerStore> Ledger<S> {
    /// Move `encoded` from `sender` to `receiver`.
    ///
    /// # Errors
    ///
    /// `MissingSigner`/`UnauthorizedAccess` unless the sender signed,
    /// `AccountNotInitialized` if either side has no record, `SelfTransfer`
    /// if they are the same, `InvalidNonce` if `expected_nonce` is not the
    /// sender's current nonce, `InsufficientBalance`, `Overflow` on the
    /// receiver side.
    #[allow(clippy::too_many_arguments)]
    pub fn private_transfer(
        &self,
        caller: &Caller,
        sender: &Identity,
        receiver: &Identity,
        encoded: &EncodedAmount,
        expected_nonce: u64,
        commitment: [u8; COMMITMENT_SIZE],
        tag: [u8; COMMITMENT_SIZE],
    ) -> LedgerResult<LedgerEvent> {
        self.sequenced("private_transfer", || {
            caller.require(sender)?;
            let (sender_address, sender_record) = self.load_balance(sender)?;
            let (receiver_address, receiver_record) = self.load_balance(receiver)?;
            if sender == receiver {
                return Err(LedgerError::SelfTransfer);
            }

            let debited = sender_record.apply_debit(self.codec(), encoded, expected_nonce)?;
            let credited = receiver_record.apply_credit(self.codec(), encoded)?;

            let batch = WriteBatch::new()
                .put_balance(
                    sender_address,
                    Precondition::unchanged(&sender_record),
                    debited,
                )
                .put_balance(
                    receiver_address,
                    Precondition::unchanged(&receiver_record),
                    credited,
                );
            let committed = self.store.commit(&batch)?;
            info!(
                slot = committed.slot,
                %sender,
                %receiver,
                nonce = expected_nonce,
                "private transfer"
            );

            Ok(self.publish(
                committed.slot,
                EventKind::PrivateTransfer {
                    sender: *sender,
                    receiver: *receiver,
                    encoded_amount: *encoded,
                    commitment: commitment.to_vec(),
                    tag: tag.to_vec(),
                },
            ))
        })
    }
}

// ---------------------------------------------------------------------------
// Indexer Fields
// ---------------------------------------------------------------------------

/// Binds an encoded amount to the sender nonce it was sent at and to the
/// receiver.
pub fn transfer_commitment(
    encoded: &EncodedAmount,
    nonce: u64,
    receiver: &Identity,
) -> [u8; COMMITMENT_SIZE] {
    blake3_derive(
        TRANSFER_COMMITMENT_CONTEXT,
        &[encoded.as_bytes(), &nonce.to_le_bytes(), receiver.as_bytes()],
    )
}

/// A receiver tag only someone holding `sender_secret` could have produced.
pub fn transfer_tag(receiver: &Identity, sender_secret: &[u8; 32]) -> [u8; COMMITMENT_SIZE] {
    blake3_derive(TRANSFER_TAG_CONTEXT, &[receiver.as_bytes(), sender_secret])
}
