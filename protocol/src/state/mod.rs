//! # Ledger State
//!
//! The four record kinds the ledger persists:
//!
//! ```text
//! balance.rs  - per-owner encoded balance + nonce, credit/debit primitives
//! vault.rs    - singleton custody total, checked credit/debit
//! pending.rs  - escrowed transfers and their lifecycle states
//! mint.rs     - singleton setup authority and config blob
//! ```
//!
//! Every record derives `Serialize`/`Deserialize` so it can go to sled via
//! bincode or out to indexers via JSON without an intermediate DTO.

pub mod balance;
pub mod mint;
pub mod pending;
pub mod vault;

pub use balance::{owner_commitment, BalanceRecord};
pub use mint::MintRecord;
pub use pending::{PendingTransfer, TransferState};
pub use vault::VaultRecord;
