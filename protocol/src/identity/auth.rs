//! Caller authentication.
//!
//! A [`Caller`] is the outcome of checking a request's signature. The
//! ledger consumes callers, never raw signatures, so the check happens once
//! at the edge and every operation shares the same failure mapping:
//!
//! | Caller            | `require(owner)` result                  |
//! |-------------------|------------------------------------------|
//! | `Unsigned`        | `MissingSigner`                          |
//! | `Unverified(id)`  | `UnauthorizedAccess`                     |
//! | `Verified(id)`    | `Ok` if `id == owner`, else unauthorized |

use serde::{Deserialize, Serialize};

use super::Identity;
use crate::crypto::signatures::verify_raw;
use crate::error::LedgerError;

/// Who is calling, as far as the signature check could tell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Caller {
    /// No signature was attached to the request.
    Unsigned,
    /// A signature was attached but did not verify against the claimed key.
    Unverified(Identity),
    /// The request was signed by this identity.
    Verified(Identity),
}

impl Caller {
    /// Check `signature` over `message` against `signer`.
    pub fn from_signature(signer: Identity, message: &[u8], signature: Option<&[u8]>) -> Self {
        match signature {
            None => Caller::Unsigned,
            Some(sig) => match verify_raw(signer.as_bytes(), message, sig) {
                Ok(()) => Caller::Verified(signer),
                Err(e) => {
                    tracing::debug!(%signer, error = %e, "signature rejected");
                    Caller::Unverified(signer)
                }
            },
        }
    }

    /// Succeeds only if the caller proved it is `owner`.
    pub fn require(&self, owner: &Identity) -> Result<(), LedgerError> {
        match self {
            Caller::Unsigned => Err(LedgerError::MissingSigner),
            Caller::Verified(id) if id == owner => Ok(()),
            Caller::Verified(id) | Caller::Unverified(id) => Err(LedgerError::UnauthorizedAccess {
                expected: *owner,
                caller: *id,
            }),
        }
    }
}
