//! # Cryptographic Primitives
//!
//! Thin wrappers over audited implementations. Nothing in here is clever,
//! and nothing in here should become clever.
//!
//! - **Ed25519** (`keys`, `signatures`) for instruction signing.
//! - **SHA-256** and **BLAKE3** (`hash`) for addresses, commitments, and
//!   codec filler.

pub mod hash;
pub mod keys;
pub mod signatures;

pub use hash::{blake3_derive, blake3_hash, sha256_array, sha256_concat};
pub use keys::{KeyError, Keypair};
pub use signatures::{verify_raw, SignatureError};
