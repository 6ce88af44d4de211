//! # Digital Signatures
//!
//! Ed25519 verification for incoming instructions. The ledger never signs
//! anything itself; clients do (see [`super::keys::Keypair`]), and this is
//! the single place where their signatures get checked.
//!
//! We use `verify_strict`, which rejects the malleable and small-order edge
//! cases lenient verifiers accept.

use ed25519_dalek::{Signature, VerifyingKey};
use thiserror::Error;

/// Errors during signature verification.
///
/// Intentionally vague: we don't tell attackers why verification failed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature verification failed")]
    VerificationFailed,

    #[error("invalid signature bytes: expected 64 bytes")]
    InvalidSignatureBytes,

    #[error("invalid public key")]
    InvalidPublicKey,
}

/// Verify a signature from raw byte components.
///
/// This is the "I got these bytes off the wire" variant: the signature
/// arrives as a slice of unknown length and the key as 32 raw bytes.
pub fn verify_raw(
    public_key_bytes: &[u8; 32],
    message: &[u8],
    signature_bytes: &[u8],
) -> Result<(), SignatureError> {
    let verifying_key =
        VerifyingKey::from_bytes(public_key_bytes).map_err(|_| SignatureError::InvalidPublicKey)?;

    let signature_array: [u8; 64] = signature_bytes
        .try_into()
        .map_err(|_| SignatureError::InvalidSignatureBytes)?;
    let signature = Signature::from_bytes(&signature_array);

    verifying_key
        .verify_strict(message, &signature)
        .map_err(|_| SignatureError::VerificationFailed)
}
