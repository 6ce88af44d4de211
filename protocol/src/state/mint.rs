//! Mint/config singleton. Holds the setup authority and an opaque
//! configuration blob; not consulted on the accounting hot path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::Identity;

/// The mint/config record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintRecord {
    /// Identity that ran `initialize_mint`.
    pub authority: Identity,
    /// Opaque configuration bytes, at most `MAX_MINT_CONFIG_SIZE`.
    pub config: Vec<u8>,
    /// Bump of the mint's derived address.
    pub bump: u8,
    /// When the mint was initialized.
    pub initialized_at: DateTime<Utc>,
}
