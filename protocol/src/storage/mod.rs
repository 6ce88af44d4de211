//! # Storage Module
//!
//! Where ledger records live between operations.
//!
//! ```text
//! batch.rs  - WriteBatch, preconditions, and the shared resolve step
//! memory.rs - MemoryStore: HashMaps behind a RwLock, for tests and demos
//! db.rs     - SledStore: sled trees with transactional commits
//! ```
//!
//! ## Design Decisions
//!
//! 1. **Reads are plain, writes are batched.** Operations read whatever
//!    they need, compute a [`WriteBatch`], and hand it to
//!    [`LedgerStore::commit`]. The store re-checks every precondition
//!    under its own isolation, so a batch built from stale reads fails
//!    instead of overwriting.
//!
//! 2. **Every commit gets a slot.** Slots are a per-store sequence that
//!    starts at 1 and survives restarts. Events carry them, which gives
//!    indexers a total order without trusting wall clocks.
//!
//! 3. **Bincode on disk, keyed by derived address.** The memory store keeps
//!    typed values; the sled store keeps `bincode` bytes under the raw
//!    32-byte address.

pub mod batch;
pub mod db;
pub mod memory;

pub use batch::{BalanceWrite, PendingWrite, Precondition, Snapshot, VaultWrite, WriteBatch};
pub use db::SledStore;
pub use memory::MemoryStore;

use crate::address::Address;
use crate::error::LedgerResult;
use crate::state::{BalanceRecord, MintRecord, PendingTransfer, VaultRecord};

/// Backing store for the ledger.
///
/// Implementations must make [`commit`](LedgerStore::commit) atomic and
/// serializable with respect to other commits: the snapshot a batch is
/// resolved against must be exactly the state the batch is applied on top
/// of.
pub trait LedgerStore: Send + Sync {
    /// Balance record at `address`.
    fn balance(&self, address: &Address) -> LedgerResult<Option<BalanceRecord>>;

    /// Every balance record, sorted by owner identity.
    fn balances(&self) -> LedgerResult<Vec<BalanceRecord>>;

    /// Pending transfer at `address`.
    fn pending_transfer(&self, address: &Address) -> LedgerResult<Option<PendingTransfer>>;

    /// Every pending transfer with its address, sorted by address.
    fn pending_transfers(&self) -> LedgerResult<Vec<(Address, PendingTransfer)>>;

    /// The vault singleton.
    fn vault(&self) -> LedgerResult<Option<VaultRecord>>;

    /// The mint singleton.
    fn mint(&self) -> LedgerResult<Option<MintRecord>>;

    /// Slot of the most recent commit, zero before the first.
    fn last_slot(&self) -> LedgerResult<u64>;

    /// Atomically check and apply `batch`.
    fn commit(&self, batch: &WriteBatch) -> LedgerResult<Committed>;
}

/// What a successful commit reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    /// Commit sequence number.
    pub slot: u64,
    /// The vault as written, if the batch touched it.
    pub vault: Option<VaultRecord>,
}
