// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # VeilPay Protocol: Ledger Core
//!
//! A confidential-balance ledger: owners hold encoded balances, move them
//! to each other directly or through escrow, and deposit and withdraw real
//! value against a pooled custody vault. The "confidential" part is a
//! pluggable codec. Today's default is a cleartext placeholder, and the
//! ledger is written so that swapping it for real ciphertext arithmetic
//! changes nothing above the codec line.
//!
//! ## Architecture
//!
//! - **config** - Seeds, sizes, domain tags, and `LedgerConfig`.
//! - **error** - `LedgerError`. One enum, every failure the ledger can report.
//! - **crypto** - Ed25519 keys and signatures, SHA-256 and BLAKE3 helpers.
//! - **identity** - Owner identities and caller authentication.
//! - **address** - Deterministic off-curve record addresses.
//! - **amount** - `EncodedAmount` and the `AmountCodec` capability.
//! - **state** - Balance, vault, pending-transfer, and mint records.
//! - **storage** - Atomic batch commits over memory or sled.
//! - **events** - The post-commit event stream and its sinks.
//! - **ledger** - The operations themselves.
//!
//! ## Design Philosophy
//!
//! 1. Validate everything, then write everything in one commit.
//! 2. Nonces order every transfer between owners and reject every replay.
//! 3. Drift between balances and custody is reported, never "fixed".
//! 4. If it touches money, it has tests. Plural.

pub mod address;
pub mod amount;
pub mod config;
pub mod crypto;
pub mod error;
pub mod events;
pub mod identity;
pub mod ledger;
pub mod state;
pub mod storage;

pub use address::Address;
pub use amount::{AmountCodec, EncodedAmount, PlaintextCodec};
pub use config::LedgerConfig;
pub use error::{LedgerError, LedgerResult};
pub use events::{EventKind, EventSink, LedgerEvent};
pub use identity::{Caller, Identity};
pub use ledger::{Instruction, Ledger, SignedInstruction};
pub use storage::{LedgerStore, MemoryStore, SledStore};
