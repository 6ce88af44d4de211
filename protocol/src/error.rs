//! # Ledger Errors
//!
//! Every ledger operation that can fail returns a [`LedgerError`]. All
//! validation happens before anything is written, so an error always means
//! "nothing changed". Callers decide whether to retry (typically: refetch the
//! nonce and resubmit) or surface the failure.

use thiserror::Error;

use crate::address::Address;
use crate::identity::Identity;

/// Errors produced by the ledger core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// A record that must be created exactly once already exists.
    #[error("account {0} is already initialized")]
    AlreadyInitialized(Address),

    /// The owner has no balance record.
    #[error("no balance record for {owner}")]
    AccountNotInitialized {
        /// The identity whose balance record is missing.
        owner: Identity,
    },

    /// No record lives at the given address. For pending transfers this is
    /// what a second claim or cancel sees.
    #[error("account {0} not found")]
    AccountNotFound(Address),

    /// A pending transfer already occupies the derived address.
    #[error("account {0} already exists")]
    AlreadyExists(Address),

    /// The supplied nonce is not the record's current nonce. Covers both
    /// replays (stale) and out-of-order submissions (future).
    #[error("invalid nonce: record is at {current}, request carried {provided}")]
    InvalidNonce {
        /// The nonce the record holds.
        current: u64,
        /// The nonce the request carried.
        provided: u64,
    },

    /// The balance record changed between read and commit without its nonce
    /// moving, which only a concurrent deposit or withdrawal does. Refetch
    /// and resubmit.
    #[error("balance record {0} changed since it was read")]
    StaleRecord(Address),

    /// A debit exceeds the spendable balance.
    #[error("insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance {
        /// Decoded balance before the debit.
        available: u64,
        /// Decoded debit amount.
        requested: u64,
    },

    /// The vault cannot release the requested custody.
    #[error("insufficient vault funds: withdrawable {withdrawable}, requested {requested}")]
    InsufficientFunds {
        /// Custody above the reserve.
        withdrawable: u64,
        /// Amount the withdrawal asked for.
        requested: u64,
    },

    /// The caller proved an identity, but not the one the operation needs.
    #[error("unauthorized: operation requires {expected}, caller is {caller}")]
    UnauthorizedAccess {
        /// Identity that must sign.
        expected: Identity,
        /// Identity the caller presented.
        caller: Identity,
    },

    /// No signature was supplied at all.
    #[error("missing required signer")]
    MissingSigner,

    /// Arithmetic would leave the `u64` range. Balances, custody, and nonces
    /// all fail here instead of wrapping or saturating.
    #[error("arithmetic overflow")]
    Overflow,

    /// The declared real amount disagrees with the encoded amount.
    #[error("amount mismatch: declared {declared}, encoded {encoded}")]
    AmountMismatch {
        /// Real amount named by the request.
        declared: u64,
        /// Magnitude the encoded amount decodes to.
        encoded: u64,
    },

    /// Direct transfers need two distinct balance records.
    #[error("sender and receiver must differ")]
    SelfTransfer,

    /// The mint configuration blob is too large.
    #[error("mint config is {len} bytes, limit is {max}")]
    InvalidMintConfig {
        /// Supplied length.
        len: usize,
        /// Allowed maximum.
        max: usize,
    },

    /// The vault singleton has not been bootstrapped.
    #[error("vault is not initialized")]
    VaultNotInitialized,

    /// No bump in `0..=255` produced an off-curve address.
    #[error("could not derive an off-curve address for the given seeds")]
    AddressDerivation,

    /// The backing store failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// A stored record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Shorthand used across the crate.
pub type LedgerResult<T> = Result<T, LedgerError>;

impl From<sled::Error> for LedgerError {
    fn from(e: sled::Error) -> Self {
        LedgerError::Storage(e.to_string())
    }
}

impl From<bincode::Error> for LedgerError {
    fn from(e: bincode::Error) -> Self {
        LedgerError::Serialization(e.to_string())
    }
}
