//! # Encoded Amounts
//!
//! Every amount the ledger stores or moves travels as an [`EncodedAmount`]:
//! a fixed 64-byte container standing in for a confidential-amount
//! ciphertext. The ledger never looks inside one directly; it goes through an
//! [`AmountCodec`].
//!
//! ## Layout of the cleartext codec
//!
//! ```text
//! bytes  0..8   magnitude, u64 little-endian
//! bytes  8..40  SHA-256(magnitude_le || "noise")   (filler)
//! bytes 40..64  zero                               (filler)
//! ```
//!
//! The filler has no meaning to the ledger. It is deterministic so that the
//! same magnitude always encodes to the same bytes, which keeps commitments
//! computed over an encoded amount reproducible.
//!
//! ## Why a trait
//!
//! [`PlaintextCodec`] is a placeholder. It hides nothing. A real deployment
//! swaps in a codec backed by homomorphic commitments, where `add` and `sub`
//! operate on ciphertexts. The rest of the ledger only ever calls the four
//! trait methods, so that swap touches nothing else.

use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::config::{ENCODED_AMOUNT_SIZE, FILLER_SUFFIX, MAGNITUDE_SIZE};
use crate::crypto::hash::sha256_concat;
use crate::error::{LedgerError, LedgerResult};

// ---------------------------------------------------------------------------
// EncodedAmount
// ---------------------------------------------------------------------------

/// An opaque 64-byte encoded amount.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EncodedAmount([u8; ENCODED_AMOUNT_SIZE]);

impl EncodedAmount {
    /// Wrap raw bytes produced by an external encoder.
    pub const fn from_bytes(bytes: [u8; ENCODED_AMOUNT_SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; ENCODED_AMOUNT_SIZE] {
        &self.0
    }
}

impl fmt::Debug for EncodedAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The first eight bytes are enough to tell two amounts apart in logs.
        write!(f, "EncodedAmount({}..)", hex::encode(&self.0[..MAGNITUDE_SIZE]))
    }
}

impl Serialize for EncodedAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&hex::encode(self.0))
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for EncodedAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            let bytes = hex::decode(&s).map_err(de::Error::custom)?;
            let array: [u8; ENCODED_AMOUNT_SIZE] = bytes
                .as_slice()
                .try_into()
                .map_err(|_| de::Error::invalid_length(bytes.len(), &"64 bytes"))?;
            Ok(Self(array))
        } else {
            deserializer.deserialize_bytes(EncodedAmountVisitor)
        }
    }
}

struct EncodedAmountVisitor;

impl<'de> Visitor<'de> for EncodedAmountVisitor {
    type Value = EncodedAmount;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bytes", ENCODED_AMOUNT_SIZE)
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
        let array: [u8; ENCODED_AMOUNT_SIZE] =
            v.try_into().map_err(|_| E::invalid_length(v.len(), &self))?;
        Ok(EncodedAmount(array))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut array = [0u8; ENCODED_AMOUNT_SIZE];
        for (i, slot) in array.iter_mut().enumerate() {
            *slot = seq
                .next_element()?
                .ok_or_else(|| de::Error::invalid_length(i, &self))?;
        }
        Ok(EncodedAmount(array))
    }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// The arithmetic capability the ledger needs over encoded amounts.
pub trait AmountCodec: Send + Sync {
    /// Encode a magnitude.
    fn encode(&self, magnitude: u64) -> EncodedAmount;

    /// Recover the magnitude.
    fn decode(&self, amount: &EncodedAmount) -> u64;

    /// `a + b`, failing with `Overflow` past `u64::MAX`.
    fn add(&self, a: &EncodedAmount, b: &EncodedAmount) -> LedgerResult<EncodedAmount> {
        let sum = self
            .decode(a)
            .checked_add(self.decode(b))
            .ok_or(LedgerError::Overflow)?;
        Ok(self.encode(sum))
    }

    /// `a - b`, failing with `InsufficientBalance` when `b > a`.
    fn sub(&self, a: &EncodedAmount, b: &EncodedAmount) -> LedgerResult<EncodedAmount> {
        let available = self.decode(a);
        let requested = self.decode(b);
        let diff = available
            .checked_sub(requested)
            .ok_or(LedgerError::InsufficientBalance {
                available,
                requested,
            })?;
        Ok(self.encode(diff))
    }
}

/// The cleartext placeholder codec: magnitude in the first eight bytes,
/// deterministic filler after.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlaintextCodec;

impl AmountCodec for PlaintextCodec {
    fn encode(&self, magnitude: u64) -> EncodedAmount {
        encode(magnitude)
    }

    fn decode(&self, amount: &EncodedAmount) -> u64 {
        decode(amount)
    }
}

/// Encode `magnitude` with the cleartext layout.
pub fn encode(magnitude: u64) -> EncodedAmount {
    let le = magnitude.to_le_bytes();
    let filler = sha256_concat(&[&le, FILLER_SUFFIX]);

    let mut bytes = [0u8; ENCODED_AMOUNT_SIZE];
    bytes[..MAGNITUDE_SIZE].copy_from_slice(&le);
    bytes[MAGNITUDE_SIZE..MAGNITUDE_SIZE + filler.len()].copy_from_slice(&filler);
    EncodedAmount(bytes)
}

/// Read the magnitude out of the first eight bytes. Filler is ignored.
pub fn decode(amount: &EncodedAmount) -> u64 {
    let mut le = [0u8; MAGNITUDE_SIZE];
    le.copy_from_slice(&amount.0[..MAGNITUDE_SIZE]);
    u64::from_le_bytes(le)
}
