//! # Identities & Caller Authentication
//!
//! An [`Identity`] is the 32-byte Ed25519 public key of an account owner.
//! It is what balance records are keyed by, what pending transfers name as
//! sender and recipient, and what every authorization check compares
//! against.
//!
//! Identities render as base58, the way wallets show addresses, and
//! serialize as base58 strings in human-readable
//! formats (JSON config, event logs) and as raw bytes everywhere else.
//!
//! ## Authentication
//!
//! The ledger does not verify signatures inline in each operation. A
//! request is first turned into a [`Caller`] (see [`auth`]); operations then
//! ask the caller to prove it is a specific identity.

pub mod auth;

pub use auth::Caller;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Parse failure for base58 identities and addresses.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid base58 key: {0}")]
pub struct ParseKeyError(pub String);

/// A 32-byte owner identity (Ed25519 public key bytes).
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity([u8; 32]);

impl Identity {
    /// Wrap raw public key bytes. No curve validation: identities that are
    /// not valid keys simply can never produce a verified signature.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Base58 rendering.
    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self.to_base58())
    }
}

impl FromStr for Identity {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_base58_key(s).map(Self)
    }
}

impl Serialize for Identity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_key(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Identity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize_key(deserializer).map(Self)
    }
}

// ---------------------------------------------------------------------------
// Shared 32-byte key encoding
// ---------------------------------------------------------------------------

/// Decode a base58 string into exactly 32 bytes.
pub(crate) fn parse_base58_key(s: &str) -> Result<[u8; 32], ParseKeyError> {
    let bytes = bs58::decode(s.trim())
        .into_vec()
        .map_err(|e| ParseKeyError(e.to_string()))?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| ParseKeyError(format!("expected 32 bytes, got {}", bytes.len())))
}

/// Base58 string for human-readable formats, raw bytes otherwise.
pub(crate) fn serialize_key<S: Serializer>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
    if serializer.is_human_readable() {
        serializer.serialize_str(&bs58::encode(bytes).into_string())
    } else {
        bytes.serialize(serializer)
    }
}

/// Inverse of [`serialize_key`].
pub(crate) fn deserialize_key<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
    if deserializer.is_human_readable() {
        let s = String::deserialize(deserializer)?;
        parse_base58_key(&s).map_err(serde::de::Error::custom)
    } else {
        <[u8; 32]>::deserialize(deserializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base58_roundtrip() {
        let id = Identity::from_bytes([42u8; 32]);
        let parsed: Identity = id.to_base58().parse().expect("parse");
        assert_eq!(parsed, id);
    }

    #[test]
    fn wrong_length_rejected() {
        let short = bs58::encode([1u8; 16]).into_string();
        assert!(short.parse::<Identity>().is_err());
        assert!("0OIl".parse::<Identity>().is_err());
    }

    #[test]
    fn json_uses_base58_string() {
        let id = Identity::from_bytes([5u8; 32]);
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, format!("\"{}\"", id));
        let back: Identity = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, id);
    }

    #[test]
    fn bincode_uses_raw_bytes() {
        let id = Identity::from_bytes([5u8; 32]);
        let bytes = bincode::serialize(&id).expect("serialize");
        assert_eq!(bytes.len(), 32);
        let back: Identity = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(back, id);
    }
}
