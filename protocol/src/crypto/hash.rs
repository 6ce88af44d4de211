//! # Hashing Utilities
//!
//! Two hash functions, each with a job:
//!
//! - **SHA-256** for everything wallets must reproduce byte for byte:
//!   program-derived addresses, owner commitments, and the codec filler.
//! - **BLAKE3** for VeilPay-native derivations (indexer commitments and
//!   tags), where nobody outside the ledger needs to reproduce the bytes
//!   with a different toolchain.

use sha2::{Digest, Sha256};

/// SHA-256 over the concatenation of `parts`, without building the
/// concatenation first.
pub fn sha256_concat(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let mut output = [0u8; 32];
    output.copy_from_slice(&hasher.finalize());
    output
}

/// SHA-256 of a single buffer.
pub fn sha256_array(data: &[u8]) -> [u8; 32] {
    sha256_concat(&[data])
}

/// BLAKE3 of a single buffer.
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// BLAKE3 in key-derivation mode over the concatenation of `parts`.
///
/// `context` must be a hardcoded, globally unique string (see the
/// `*_CONTEXT` constants in [`crate::config`]).
pub fn blake3_derive(context: &str, parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}
