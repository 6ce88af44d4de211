//! # Custody Vault
//!
//! The vault is the pooled record of real value held in trust for every
//! balance in the ledger. It is not sharded per account: a deposit from
//! anyone credits it, a withdrawal by anyone debits it. That makes it the
//! one record every deposit and withdrawal serializes on, which is fine
//! because custody moves far less often than balances do.
//!
//! Arithmetic is checked in both directions. Saturating at the ceiling
//! would silently lose custody, so it is an error instead.

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};

/// The singleton custody record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultRecord {
    /// Real value held in trust.
    pub total_custody: u64,
    /// Bump of the vault's derived address.
    pub bump: u8,
}

impl VaultRecord {
    /// An empty vault.
    pub fn new(bump: u8) -> Self {
        Self {
            total_custody: 0,
            bump,
        }
    }

    /// Custody available to withdrawals when `reserve` must stay behind.
    pub fn withdrawable(&self, reserve: u64) -> u64 {
        self.total_custody.saturating_sub(reserve)
    }

    /// Next vault state after taking in `amount`.
    pub fn credit(&self, amount: u64) -> LedgerResult<VaultRecord> {
        let total_custody = self
            .total_custody
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        Ok(VaultRecord {
            total_custody,
            bump: self.bump,
        })
    }

    /// Next vault state after releasing `amount`, keeping `reserve` behind.
    ///
    /// # Errors
    ///
    /// `InsufficientFunds` if `amount` exceeds custody above the reserve.
    pub fn debit(&self, amount: u64, reserve: u64) -> LedgerResult<VaultRecord> {
        let withdrawable = self.withdrawable(reserve);
        if amount > withdrawable {
            return Err(LedgerError::InsufficientFunds {
                withdrawable,
                requested: amount,
            });
        }
        Ok(VaultRecord {
            total_custody: self.total_custody - amount,
            bump: self.bump,
        })
    }
}
