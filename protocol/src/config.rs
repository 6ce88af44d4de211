//! # Ledger Configuration & Constants
//!
//! Every seed, size, and domain tag in the ledger lives here. If you're
//! hardcoding one of these somewhere else, you're doing it wrong.
//!
//! Seeds and domain tags are part of the address scheme: changing any of
//! them after records have been written orphans every existing record, so
//! treat them as frozen once a ledger has data in it.

use serde::{Deserialize, Serialize};

use crate::identity::Identity;

// ---------------------------------------------------------------------------
// Address Seeds
// ---------------------------------------------------------------------------

/// Seed prefix for the singleton mint/config record.
pub const MINT_SEED: &[u8] = b"mint";

/// Seed prefix for per-owner balance records: `["balance", owner]`.
pub const BALANCE_SEED: &[u8] = b"balance";

/// Seed for the singleton custody vault.
pub const VAULT_SEED: &[u8] = b"vault";

/// Seed prefix for escrowed transfers:
/// `["pending_transfer", sender, recipient, nonce_le]`.
pub const PENDING_TRANSFER_SEED: &[u8] = b"pending_transfer";

/// Program identifier mixed into every derived address so that two ledgers
/// with different identifiers never share an address space.
pub const PROGRAM_ID: &[u8] = b"veilpay.ledger.v1";

/// Trailing marker of the address preimage. Same construction the Solana
/// runtime uses for program-derived addresses.
pub const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

// ---------------------------------------------------------------------------
// Sizes
// ---------------------------------------------------------------------------

/// Size of an encoded amount container in bytes.
pub const ENCODED_AMOUNT_SIZE: usize = 64;

/// Bytes of the container that carry the little-endian magnitude.
pub const MAGNITUDE_SIZE: usize = 8;

/// Size of owner commitments, transfer commitments, and tags.
pub const COMMITMENT_SIZE: usize = 32;

/// Maximum length of the opaque mint configuration blob.
pub const MAX_MINT_CONFIG_SIZE: usize = 64;

// ---------------------------------------------------------------------------
// Domain Tags
// ---------------------------------------------------------------------------

/// Domain tag for owner commitments. Keeps them distinct from any other
/// SHA-256 of the raw identity.
pub const OWNER_COMMITMENT_DOMAIN: &[u8] = b"veilpay:owner-commitment:v1";

/// Domain tag prepended to instruction bytes before signing. A signature over
/// a VeilPay instruction can never be replayed as a signature over anything
/// else.
pub const INSTRUCTION_SIGNING_DOMAIN: &[u8] = b"veilpay:instruction:v1";

/// BLAKE3 `derive_key` context for transfer commitments.
pub const TRANSFER_COMMITMENT_CONTEXT: &str = "veilpay 2026 transfer commitment v1";

/// BLAKE3 `derive_key` context for recipient tags.
pub const TRANSFER_TAG_CONTEXT: &str = "veilpay 2026 recipient tag v1";

/// Suffix hashed with the magnitude to produce the codec filler.
pub const FILLER_SUFFIX: &[u8] = b"noise";

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Default custody kept in the vault that no withdrawal may touch.
pub const DEFAULT_VAULT_RESERVE: u64 = 0;

/// Default dust buffer for drift diagnostics. A balance that exceeds custody
/// by less than this is not flagged.
pub const DEFAULT_DRIFT_TOLERANCE: u64 = 10_000;

/// Crate version, surfaced by the CLI.
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

// ---------------------------------------------------------------------------
// LedgerConfig
// ---------------------------------------------------------------------------

/// Runtime parameters of a ledger instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// The only identity allowed to run `initialize_mint`.
    pub authority: Identity,

    /// Custody the vault always retains. Withdrawals that would dip below it
    /// fail with `InsufficientFunds`.
    #[serde(default = "default_vault_reserve")]
    pub vault_reserve: u64,

    /// Dust buffer used by the reconciliation diagnostics.
    #[serde(default = "default_drift_tolerance")]
    pub drift_tolerance: u64,
}

fn default_vault_reserve() -> u64 {
    DEFAULT_VAULT_RESERVE
}

fn default_drift_tolerance() -> u64 {
    DEFAULT_DRIFT_TOLERANCE
}

impl LedgerConfig {
    /// Config with the given mint authority and default tolerances.
    pub fn new(authority: Identity) -> Self {
        Self {
            authority,
            vault_reserve: DEFAULT_VAULT_RESERVE,
            drift_tolerance: DEFAULT_DRIFT_TOLERANCE,
        }
    }

    /// Builder-style override of the vault reserve.
    pub fn with_vault_reserve(mut self, reserve: u64) -> Self {
        self.vault_reserve = reserve;
        self
    }

    /// Builder-style override of the drift tolerance.
    pub fn with_drift_tolerance(mut self, tolerance: u64) -> Self {
        self.drift_tolerance = tolerance;
        self
    }
}
