//! # Balance Records
//!
//! One [`BalanceRecord`] per owner. It carries the encoded spendable balance
//! and a nonce that moves by exactly one on every balance-to-balance
//! movement: a send, an incoming direct transfer, or an escrow being
//! created, claimed, or refunded into it.
//!
//! Custody movements (deposit and withdrawal) change the balance but leave
//! the nonce alone. The nonce sequences transfers between owners, and a
//! freshly funded account still starts its transfer history at zero. Two
//! owners who only ever transfer to each other keep equal nonces.
//!
//! Every primitive here is pure: it takes `&self` and hands back the next
//! version of the record. Nothing is written until the whole operation
//! commits, so a failure halfway through a transfer leaves nothing behind.

use serde::{Deserialize, Serialize};

use crate::amount::{AmountCodec, EncodedAmount};
use crate::config::OWNER_COMMITMENT_DOMAIN;
use crate::crypto::hash::sha256_concat;
use crate::error::{LedgerError, LedgerResult};
use crate::identity::Identity;

/// Per-owner balance state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceRecord {
    /// Owner identity. Fixed at creation.
    pub owner: Identity,

    /// Opaque commitment to the owner, stored so downstream consumers can
    /// authenticate the record without handling the raw identity.
    pub owner_commitment: [u8; 32],

    /// Current spendable balance.
    pub encoded_balance: EncodedAmount,

    /// Mutation counter. Starts at zero.
    pub nonce: u64,

    /// Bump of the record's derived address. Never changes.
    pub bump: u8,
}

impl BalanceRecord {
    /// A fresh record: zero balance, nonce zero.
    pub fn new(owner: Identity, bump: u8, codec: &dyn AmountCodec) -> Self {
        Self {
            owner,
            owner_commitment: owner_commitment(&owner),
            encoded_balance: codec.encode(0),
            nonce: 0,
            bump,
        }
    }

    /// Decoded balance.
    pub fn balance(&self, codec: &dyn AmountCodec) -> u64 {
        codec.decode(&self.encoded_balance)
    }

    /// Add `delta` and bump the nonce.
    ///
    /// # Errors
    ///
    /// `Overflow` if the balance or the nonce would leave the `u64` range.
    pub fn apply_credit(
        &self,
        codec: &dyn AmountCodec,
        delta: &EncodedAmount,
    ) -> LedgerResult<BalanceRecord> {
        let encoded_balance = codec.add(&self.encoded_balance, delta)?;
        let nonce = self.nonce.checked_add(1).ok_or(LedgerError::Overflow)?;

        Ok(BalanceRecord {
            encoded_balance,
            nonce,
            ..self.clone()
        })
    }

    /// Subtract `delta` and bump the nonce, provided `expected_nonce` is the
    /// record's current nonce.
    ///
    /// The expected nonce is not a sequence number the caller picks. It must
    /// equal what the record holds right now; anything else is a replay or
    /// an out-of-order submission.
    ///
    /// # Errors
    ///
    /// `InvalidNonce` on a nonce mismatch, `InsufficientBalance` if `delta`
    /// exceeds the balance, `Overflow` if the nonce is exhausted.
    pub fn apply_debit(
        &self,
        codec: &dyn AmountCodec,
        delta: &EncodedAmount,
        expected_nonce: u64,
    ) -> LedgerResult<BalanceRecord> {
        if self.nonce != expected_nonce {
            return Err(LedgerError::InvalidNonce {
                current: self.nonce,
                provided: expected_nonce,
            });
        }

        let encoded_balance = codec.sub(&self.encoded_balance, delta)?;
        let nonce = self.nonce.checked_add(1).ok_or(LedgerError::Overflow)?;

        Ok(BalanceRecord {
            encoded_balance,
            nonce,
            ..self.clone()
        })
    }

    /// Add deposited custody. The nonce does not move.
    ///
    /// # Errors
    ///
    /// `Overflow` if the balance would leave the `u64` range.
    pub fn apply_deposit(
        &self,
        codec: &dyn AmountCodec,
        delta: &EncodedAmount,
    ) -> LedgerResult<BalanceRecord> {
        Ok(BalanceRecord {
            encoded_balance: codec.add(&self.encoded_balance, delta)?,
            ..self.clone()
        })
    }

    /// Remove withdrawn custody. The nonce does not move.
    ///
    /// # Errors
    ///
    /// `InsufficientBalance` if `delta` exceeds the balance.
    pub fn apply_withdrawal(
        &self,
        codec: &dyn AmountCodec,
        delta: &EncodedAmount,
    ) -> LedgerResult<BalanceRecord> {
        Ok(BalanceRecord {
            encoded_balance: codec.sub(&self.encoded_balance, delta)?,
            ..self.clone()
        })
    }
}

/// `SHA-256(domain || owner)`.
pub fn owner_commitment(owner: &Identity) -> [u8; 32] {
    sha256_concat(&[OWNER_COMMITMENT_DOMAIN, owner.as_bytes()])
}
