//! # Program-Derived Addresses
//!
//! Every record lives at an address derived deterministically from a list
//! of seeds. Same seeds, same address; different seeds, different address
//! (up to SHA-256 collisions). That single property is what makes
//! `initialize` fail on a second call and what stops two escrows with the
//! same `(sender, recipient, nonce)` from overwriting each other.
//!
//! ## Construction
//!
//! ```text
//! address = SHA-256(seed_0 || ... || seed_n || bump || PROGRAM_ID || "ProgramDerivedAddress")
//! ```
//!
//! `bump` is searched from 255 downward until the hash is *not* a valid
//! compressed Ed25519 point, so no private key can ever sign for a record
//! address. The winning bump is stored in the record so the address can be
//! re-derived without searching.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use curve25519_dalek::edwards::CompressedEdwardsY;

use crate::config::{BALANCE_SEED, MINT_SEED, PDA_MARKER, PENDING_TRANSFER_SEED, PROGRAM_ID, VAULT_SEED};
use crate::crypto::hash::sha256_concat;
use crate::error::{LedgerError, LedgerResult};
use crate::identity::{deserialize_key, parse_base58_key, serialize_key, Identity, ParseKeyError};

/// A 32-byte record address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 32]);

impl Address {
    /// Wrap raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw bytes. Also the storage key of the record.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Whether these bytes decode to an Ed25519 point. Derived addresses never
    /// do.
    pub fn is_on_curve(&self) -> bool {
        CompressedEdwardsY(self.0).decompress().is_some()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_base58_key(s).map(Self)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_key(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize_key(deserializer).map(Self)
    }
}

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

/// Hash `seeds` with an explicit bump. Fails if the result lands on the curve.
pub fn create_program_address(seeds: &[&[u8]], bump: u8) -> LedgerResult<Address> {
    let bump_seed = [bump];
    let mut parts: Vec<&[u8]> = Vec::with_capacity(seeds.len() + 3);
    parts.extend_from_slice(seeds);
    parts.push(&bump_seed);
    parts.push(PROGRAM_ID);
    parts.push(PDA_MARKER);

    let address = Address(sha256_concat(&parts));
    if address.is_on_curve() {
        return Err(LedgerError::AddressDerivation);
    }
    Ok(address)
}

/// Find the canonical (highest valid) bump for `seeds`.
pub fn find_program_address(seeds: &[&[u8]]) -> LedgerResult<(Address, u8)> {
    for bump in (0..=u8::MAX).rev() {
        if let Ok(address) = create_program_address(seeds, bump) {
            return Ok((address, bump));
        }
    }
    Err(LedgerError::AddressDerivation)
}

/// Address of `owner`'s balance record.
pub fn balance_address(owner: &Identity) -> LedgerResult<(Address, u8)> {
    find_program_address(&[BALANCE_SEED, owner.as_bytes()])
}

/// Address of the custody vault.
pub fn vault_address() -> LedgerResult<(Address, u8)> {
    find_program_address(&[VAULT_SEED])
}

/// Address of the mint/config record.
pub fn mint_address() -> LedgerResult<(Address, u8)> {
    find_program_address(&[MINT_SEED])
}

/// Address of the escrow created by `sender` for `recipient` when the
/// sender's balance nonce was `nonce`.
pub fn pending_transfer_address(
    sender: &Identity,
    recipient: &Identity,
    nonce: u64,
) -> LedgerResult<(Address, u8)> {
    find_program_address(&[
        PENDING_TRANSFER_SEED,
        sender.as_bytes(),
        recipient.as_bytes(),
        &nonce.to_le_bytes(),
    ])
}
