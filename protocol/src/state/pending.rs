//! # Pending Transfers
//!
//! An escrowed amount that has already left the sender's spendable balance
//! but has not reached the recipient's. The lifecycle is short:
//!
//! ```text
//!            claim (recipient)
//! Created ───────────────────▶ Claimed    (record deleted)
//!    │
//!    └──────────────────────▶ Cancelled  (record deleted)
//!            cancel (sender)
//! ```
//!
//! Only `Created` records exist in storage. Terminal states are reported to
//! callers and indexers but never persisted; once a transfer is finalized,
//! its address is empty and any further claim or cancel fails with
//! `AccountNotFound`. That is the whole at-most-once guarantee, no lock
//! needed.
//!
//! There is no automatic expiry. `created_at` is kept for audit and for
//! whatever expiry policy a client wants to apply before calling cancel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::amount::EncodedAmount;
use crate::identity::Identity;

/// Lifecycle state of an escrowed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferState {
    /// Funds are held in escrow.
    Created,
    /// The recipient took the funds.
    Claimed,
    /// The sender took the funds back.
    Cancelled,
}

impl TransferState {
    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransferState::Created)
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferState::Created => write!(f, "Created"),
            TransferState::Claimed => write!(f, "Claimed"),
            TransferState::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// An in-flight escrowed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransfer {
    /// Who funded the escrow. Only they may cancel.
    pub sender: Identity,
    /// Who may claim it.
    pub recipient: Identity,
    /// Escrowed amount.
    pub encoded_amount: EncodedAmount,
    /// Sender's balance nonce when the escrow was created. Part of the
    /// address seeds.
    pub nonce: u64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Bump of the escrow's derived address.
    pub bump: u8,
}
