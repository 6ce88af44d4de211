//! # Ledger Events
//!
//! Every successful mutation publishes exactly one [`LedgerEvent`] after its
//! commit lands. Events are an output contract for indexers, not part of
//! the state: the ledger never reads them back, and a sink that fails only
//! costs a `warn!` line. The commit has already happened.
//!
//! ## Ordering
//!
//! `slot` is the store's commit sequence. It is strictly increasing across
//! everything one store commits, including across restarts of a sled-backed
//! ledger, so indexers can order and dedupe without trusting `timestamp`.
//!
//! ## Sinks
//!
//! | Sink            | Goes to                                  |
//! |-----------------|------------------------------------------|
//! | `MemorySink`    | a `Vec`, for tests                       |
//! | `BroadcastSink` | a `tokio::sync::broadcast` channel       |
//! | `JsonLinesSink` | an append-only file, one JSON per line   |
//! | `TracingSink`   | `tracing` at `info`                      |

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use tokio::sync::broadcast;

use crate::address::Address;
use crate::amount::EncodedAmount;
use crate::identity::Identity;

// ---------------------------------------------------------------------------
// Event Types
// ---------------------------------------------------------------------------

/// One published ledger event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Commit sequence of the mutation.
    pub slot: u64,
    /// Wall-clock time of publication.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    #[serde(flatten)]
    pub kind: EventKind,
}

impl LedgerEvent {
    /// Escrow address, for the three escrow events.
    pub fn pending_address(&self) -> Option<Address> {
        match &self.kind {
            EventKind::TransferCreated { address, .. }
            | EventKind::TransferClaimed { address, .. }
            | EventKind::TransferCancelled { address, .. } => Some(*address),
            _ => None,
        }
    }
}

/// The operation an event reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    MintInitialized {
        authority: Identity,
        #[serde(with = "hex_bytes")]
        config: Vec<u8>,
    },
    BalanceInitialized {
        owner: Identity,
        #[serde(with = "hex_bytes")]
        owner_commitment: Vec<u8>,
    },
    Deposit {
        owner: Identity,
        amount: u64,
        encoded_amount: EncodedAmount,
        /// Vault custody after the deposit.
        custody: u64,
    },
    Withdrawal {
        owner: Identity,
        amount: u64,
        encoded_amount: EncodedAmount,
        /// Vault custody after the withdrawal.
        custody: u64,
    },
    /// Direct transfer. `commitment` and `tag` are forwarded untouched.
    PrivateTransfer {
        sender: Identity,
        receiver: Identity,
        encoded_amount: EncodedAmount,
        #[serde(with = "hex_bytes")]
        commitment: Vec<u8>,
        #[serde(with = "hex_bytes")]
        tag: Vec<u8>,
    },
    TransferCreated {
        address: Address,
        sender: Identity,
        recipient: Identity,
        encoded_amount: EncodedAmount,
        /// Sender nonce the escrow was bound to.
        nonce: u64,
    },
    TransferClaimed {
        address: Address,
        sender: Identity,
        recipient: Identity,
        encoded_amount: EncodedAmount,
        /// Whether the claim created the recipient's balance record.
        recipient_provisioned: bool,
    },
    TransferCancelled {
        address: Address,
        sender: Identity,
        recipient: Identity,
        encoded_amount: EncodedAmount,
    },
}

impl EventKind {
    /// Short name, the same string used as the JSON `type` tag.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::MintInitialized { .. } => "mint_initialized",
            EventKind::BalanceInitialized { .. } => "balance_initialized",
            EventKind::Deposit { .. } => "deposit",
            EventKind::Withdrawal { .. } => "withdrawal",
            EventKind::PrivateTransfer { .. } => "private_transfer",
            EventKind::TransferCreated { .. } => "transfer_created",
            EventKind::TransferClaimed { .. } => "transfer_claimed",
            EventKind::TransferCancelled { .. } => "transfer_cancelled",
        }
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Errors a sink may report. The ledger logs them and moves on.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("event sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("event encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Somewhere events go.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &LedgerEvent) -> Result<(), SinkError>;
}

/// Collects events in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<LedgerEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far, in order.
    pub fn events(&self) -> Vec<LedgerEvent> {
        self.events.lock().clone()
    }

    /// Number of events published so far.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether nothing has been published yet.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for MemorySink {
    fn publish(&self, event: &LedgerEvent) -> Result<(), SinkError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

/// Fans events out to async subscribers.
///
/// Publishing with nobody subscribed is not an error; the event is simply
/// not observed. Slow subscribers see `RecvError::Lagged`.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    sender: broadcast::Sender<LedgerEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.sender.subscribe()
    }
}

impl EventSink for BroadcastSink {
    fn publish(&self, event: &LedgerEvent) -> Result<(), SinkError> {
        if self.sender.send(event.clone()).is_err() {
            tracing::trace!(slot = event.slot, "no event subscribers");
        }
        Ok(())
    }
}

/// Appends one JSON object per line to a file.
#[derive(Debug)]
pub struct JsonLinesSink {
    file: Mutex<File>,
}

impl JsonLinesSink {
    /// Open `path` for appending, creating it if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SinkError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl EventSink for JsonLinesSink {
    fn publish(&self, event: &LedgerEvent) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        let mut file = self.file.lock();
        file.write_all(&line)?;
        file.flush()?;
        Ok(())
    }
}

/// Logs every event under the `veilpay::events` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn publish(&self, event: &LedgerEvent) -> Result<(), SinkError> {
        let payload = serde_json::to_string(&event.kind)?;
        tracing::info!(
            target: "veilpay::events",
            slot = event.slot,
            kind = event.kind.name(),
            %payload,
            "ledger event"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::encode;

    fn sample(slot: u64) -> LedgerEvent {
        LedgerEvent {
            slot,
            timestamp: Utc::now(),
            kind: EventKind::PrivateTransfer {
                sender: Identity::from_bytes([1u8; 32]),
                receiver: Identity::from_bytes([2u8; 32]),
                encoded_amount: encode(1_000_000),
                commitment: vec![0xAA; 32],
                tag: vec![0xBB; 32],
            },
        }
    }

    #[test]
    fn json_is_flat_and_tagged() {
        let json = serde_json::to_value(sample(7)).unwrap();
        assert_eq!(json["type"], "private_transfer");
        assert_eq!(json["slot"], 7);
        assert_eq!(json["commitment"], "aa".repeat(32));

        let back: LedgerEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back.kind, sample(7).kind);
    }

    #[test]
    fn memory_sink_keeps_order() {
        let sink = MemorySink::new();
        assert!(sink.is_empty());
        for slot in 1..=3 {
            sink.publish(&sample(slot)).unwrap();
        }
        let slots: Vec<u64> = sink.events().iter().map(|e| e.slot).collect();
        assert_eq!(slots, vec![1, 2, 3]);
    }

    #[test]
    fn json_lines_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");

        let sink = JsonLinesSink::open(&path).unwrap();
        sink.publish(&sample(1)).unwrap();
        drop(sink);
        // Reopening appends rather than truncating.
        let sink = JsonLinesSink::open(&path).unwrap();
        sink.publish(&sample(2)).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let slots: Vec<u64> = text
            .lines()
            .map(|l| serde_json::from_str::<LedgerEvent>(l).unwrap().slot)
            .collect();
        assert_eq!(slots, vec![1, 2]);
    }

    #[test]
    fn broadcast_without_subscribers_is_fine() {
        let sink = BroadcastSink::new(4);
        assert!(sink.publish(&sample(1)).is_ok());
    }

    #[tokio::test]
    async fn broadcast_reaches_subscribers() {
        let sink = BroadcastSink::new(4);
        let mut rx = sink.subscribe();
        sink.publish(&sample(9)).unwrap();
        let got = rx.recv().await.unwrap();
        assert_eq!(got.slot, 9);
    }
}
