//! End-to-end tests for the VeilPay ledger.
//!
//! These drive the ledger the way a client does: keypairs sign
//! instructions, the ledger authenticates and executes them, and the tests
//! check balances, custody, escrows, and the event stream afterwards. The
//! persistent cases run against sled in a temp directory; the rest use the
//! memory store.
//!
//! Each test stands alone. No shared state, no ordering dependencies.

use std::sync::{Arc, Barrier};
use std::thread;

use veilpay_protocol::address::balance_address;
use veilpay_protocol::amount::encode;
use veilpay_protocol::crypto::keys::Keypair;
use veilpay_protocol::events::{
    EventKind, EventSink, JsonLinesSink, LedgerEvent, MemorySink, SinkError,
};
use veilpay_protocol::ledger::{transfer_commitment, transfer_tag, ReconciliationStatus};
use veilpay_protocol::state::PendingTransfer;
use veilpay_protocol::storage::{Precondition, WriteBatch};
use veilpay_protocol::{
    Address, Caller, Identity, Instruction, Ledger, LedgerConfig, LedgerError, LedgerStore,
    MemoryStore, SignedInstruction, SledStore,
};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn keypair(seed: u8) -> Keypair {
    Keypair::from_seed(&[seed; 32])
}

fn memory_ledger(authority: &Keypair) -> (Ledger<MemoryStore>, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let ledger = Ledger::open(MemoryStore::new(), LedgerConfig::new(authority.identity()))
        .expect("open ledger")
        .with_sink(sink.clone());
    (ledger, sink)
}

/// Sign and submit, the way the CLI does.
fn submit<S: LedgerStore>(
    ledger: &Ledger<S>,
    kp: &Keypair,
    ix: Instruction,
) -> Result<LedgerEvent, LedgerError> {
    let signed = SignedInstruction::sign(ix, kp).expect("sign");
    ledger.submit(&signed)
}

fn open_account<S: LedgerStore>(ledger: &Ledger<S>, kp: &Keypair) {
    submit(
        ledger,
        kp,
        Instruction::InitializeBalance {
            owner: kp.identity(),
        },
    )
    .expect("open account");
}

fn deposit<S: LedgerStore>(ledger: &Ledger<S>, kp: &Keypair, amount: u64) {
    submit(
        ledger,
        kp,
        Instruction::Deposit {
            owner: kp.identity(),
            amount,
            encoded_amount: encode(amount),
        },
    )
    .expect("deposit");
}

fn transfer_ix(sender: &Keypair, receiver: &Identity, amount: u64, nonce: u64) -> Instruction {
    let encoded_amount = encode(amount);
    Instruction::PrivateTransfer {
        sender: sender.identity(),
        receiver: *receiver,
        encoded_amount,
        expected_nonce: nonce,
        commitment: transfer_commitment(&encoded_amount, nonce, receiver),
        tag: transfer_tag(receiver, &sender.secret_bytes()),
    }
}

fn create_escrow<S: LedgerStore>(
    ledger: &Ledger<S>,
    sender: &Keypair,
    recipient: &Identity,
    amount: u64,
) -> Address {
    let nonce = ledger.nonce(&sender.identity()).expect("nonce");
    let event = submit(
        ledger,
        sender,
        Instruction::CreateTransfer {
            sender: sender.identity(),
            recipient: *recipient,
            encoded_amount: encode(amount),
            nonce,
        },
    )
    .expect("create escrow");
    event.pending_address().expect("escrow address")
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn deposit_transfer_then_replay() {
    let dir = tempfile::tempdir().expect("tempdir");
    let sender = keypair(1);
    let receiver = keypair(2);
    let ledger = Ledger::open(
        SledStore::open(dir.path()).expect("sled"),
        LedgerConfig::new(sender.identity()),
    )
    .expect("open ledger");

    open_account(&ledger, &sender);
    open_account(&ledger, &receiver);
    deposit(&ledger, &sender, 100_000_000);
    assert_eq!(ledger.vault().unwrap().total_custody, 100_000_000);
    assert_eq!(ledger.balance(&sender.identity()).unwrap(), 100_000_000);
    // Custody movements leave the nonce alone.
    assert_eq!(ledger.nonce(&sender.identity()).unwrap(), 0);

    let ix = transfer_ix(&sender, &receiver.identity(), 1_000_000, 0);
    submit(&ledger, &sender, ix.clone()).expect("first transfer");

    assert_eq!(ledger.balance(&sender.identity()).unwrap(), 99_000_000);
    assert_eq!(ledger.balance(&receiver.identity()).unwrap(), 1_000_000);
    assert_eq!(ledger.nonce(&sender.identity()).unwrap(), 1);
    assert_eq!(ledger.nonce(&receiver.identity()).unwrap(), 1);

    // The exact same signed request, again.
    assert_eq!(
        submit(&ledger, &sender, ix),
        Err(LedgerError::InvalidNonce {
            current: 1,
            provided: 0
        })
    );
    assert_eq!(ledger.balance(&sender.identity()).unwrap(), 99_000_000);
    assert_eq!(ledger.balance(&receiver.identity()).unwrap(), 1_000_000);
    assert_eq!(ledger.vault().unwrap().total_custody, 100_000_000);
}

#[test]
fn over_withdrawal_keeps_custody() {
    let alice = keypair(1);
    let (ledger, _) = memory_ledger(&alice);
    open_account(&ledger, &alice);
    deposit(&ledger, &alice, 1);

    let result = submit(
        &ledger,
        &alice,
        Instruction::Withdraw {
            owner: alice.identity(),
            amount: 2,
            encoded_amount: encode(2),
        },
    );
    assert!(matches!(
        result,
        Err(LedgerError::InsufficientBalance { .. }) | Err(LedgerError::InsufficientFunds { .. })
    ));
    assert_eq!(ledger.vault().unwrap().total_custody, 1);
    assert_eq!(ledger.balance(&alice.identity()).unwrap(), 1);
}

// ---------------------------------------------------------------------------
// Escrow
// ---------------------------------------------------------------------------

#[test]
fn escrow_claim_is_atomic_and_single_use() {
    let alice = keypair(1);
    let bob = keypair(2);
    let (ledger, sink) = memory_ledger(&alice);
    open_account(&ledger, &alice);
    deposit(&ledger, &alice, 10_000);

    let address = create_escrow(&ledger, &alice, &bob.identity(), 2_500);
    // Funds leave at creation, not at claim.
    assert_eq!(ledger.balance(&alice.identity()).unwrap(), 7_500);
    let pending: PendingTransfer = ledger.pending_transfer(&address).unwrap().unwrap();
    assert_eq!(
        (pending.sender, pending.recipient, pending.nonce),
        (alice.identity(), bob.identity(), 0)
    );

    let event = submit(&ledger, &bob, Instruction::ClaimTransfer { address }).unwrap();
    assert!(matches!(
        event.kind,
        EventKind::TransferClaimed {
            recipient_provisioned: true,
            ..
        }
    ));
    assert_eq!(ledger.balance(&bob.identity()).unwrap(), 2_500);
    assert!(ledger.pending_transfer(&address).unwrap().is_none());

    assert_eq!(
        submit(&ledger, &bob, Instruction::ClaimTransfer { address }),
        Err(LedgerError::AccountNotFound(address))
    );
    assert_eq!(
        submit(&ledger, &alice, Instruction::CancelTransfer { address }),
        Err(LedgerError::AccountNotFound(address))
    );

    let kinds: Vec<&str> = sink.events().iter().map(|e| e.kind.name()).collect();
    assert_eq!(
        kinds,
        vec![
            "balance_initialized",
            "deposit",
            "transfer_created",
            "transfer_claimed"
        ]
    );
    let report = ledger.reconcile().unwrap();
    assert_eq!(report.status, ReconciliationStatus::Balanced);
}

#[test]
fn escrow_cancel_refunds_exactly() {
    let alice = keypair(1);
    let bob = keypair(2);
    let (ledger, _) = memory_ledger(&alice);
    open_account(&ledger, &alice);
    deposit(&ledger, &alice, 5_000);
    let nonce_before = ledger.nonce(&alice.identity()).unwrap();

    let address = create_escrow(&ledger, &alice, &bob.identity(), 1_234);
    submit(&ledger, &alice, Instruction::CancelTransfer { address }).unwrap();

    assert_eq!(ledger.balance(&alice.identity()).unwrap(), 5_000);
    assert_eq!(ledger.nonce(&alice.identity()).unwrap(), nonce_before + 2);
    assert!(ledger.balance_record(&bob.identity()).unwrap().is_none());
}

#[test]
fn duplicate_escrow_address_is_already_exists() {
    let alice = keypair(1);
    let bob = keypair(2);
    let (ledger, _) = memory_ledger(&alice);
    open_account(&ledger, &alice);
    deposit(&ledger, &alice, 100);
    let address = create_escrow(&ledger, &alice, &bob.identity(), 10);

    // A second insert at the same address can only come from a raced
    // submission; the store refuses it.
    let pending = ledger.pending_transfer(&address).unwrap().unwrap();
    assert_eq!(
        ledger
            .store()
            .commit(&WriteBatch::new().insert_pending(address, pending)),
        Err(LedgerError::AlreadyExists(address))
    );
}

// ---------------------------------------------------------------------------
// Rejections leave state alone
// ---------------------------------------------------------------------------

#[test]
fn insufficient_balance_changes_nothing() {
    let alice = keypair(1);
    let bob = keypair(2);
    let (ledger, sink) = memory_ledger(&alice);
    open_account(&ledger, &alice);
    open_account(&ledger, &bob);
    deposit(&ledger, &alice, 100);
    let before = ledger.balance_record(&alice.identity()).unwrap().unwrap();
    let events_before = sink.len();

    let nonce = before.nonce;
    let attempts = vec![
        Instruction::Withdraw {
            owner: alice.identity(),
            amount: 101,
            encoded_amount: encode(101),
        },
        transfer_ix(&alice, &bob.identity(), 101, nonce),
        Instruction::CreateTransfer {
            sender: alice.identity(),
            recipient: bob.identity(),
            encoded_amount: encode(101),
            nonce,
        },
    ];
    for ix in attempts {
        assert_eq!(
            submit(&ledger, &alice, ix),
            Err(LedgerError::InsufficientBalance {
                available: 100,
                requested: 101
            })
        );
    }

    assert_eq!(ledger.balance_record(&alice.identity()).unwrap().unwrap(), before);
    assert_eq!(ledger.vault().unwrap().total_custody, 100);
    assert_eq!(sink.len(), events_before);
}

#[test]
fn unsigned_and_forged_requests_are_refused() {
    let alice = keypair(1);
    let mallory = keypair(6);
    let (ledger, _) = memory_ledger(&alice);
    open_account(&ledger, &alice);
    deposit(&ledger, &alice, 100);

    let ix = Instruction::Withdraw {
        owner: alice.identity(),
        amount: 50,
        encoded_amount: encode(50),
    };
    assert_eq!(
        ledger.submit(&SignedInstruction::unsigned(ix.clone(), alice.identity())),
        Err(LedgerError::MissingSigner)
    );
    assert_eq!(
        submit(&ledger, &mallory, ix),
        Err(LedgerError::UnauthorizedAccess {
            expected: alice.identity(),
            caller: mallory.identity()
        })
    );
    assert_eq!(ledger.balance(&alice.identity()).unwrap(), 100);
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[test]
fn sled_ledger_survives_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let alice = keypair(1);
    let bob = keypair(2);
    let config = LedgerConfig::new(alice.identity());

    let (address, last_slot) = {
        let ledger = Ledger::open(SledStore::open(dir.path()).unwrap(), config.clone()).unwrap();
        submit(
            &ledger,
            &alice,
            Instruction::InitializeMint {
                config: b"devnet".to_vec(),
            },
        )
        .unwrap();
        open_account(&ledger, &alice);
        deposit(&ledger, &alice, 900);
        let address = create_escrow(&ledger, &alice, &bob.identity(), 300);
        ledger.store().flush().unwrap();
        (address, ledger.store().last_slot().unwrap())
    };

    let ledger = Ledger::open(SledStore::open(dir.path()).unwrap(), config).unwrap();
    // Reopening does not bootstrap a second vault.
    assert_eq!(ledger.store().last_slot().unwrap(), last_slot);
    assert_eq!(ledger.vault().unwrap().total_custody, 900);
    assert_eq!(ledger.balance(&alice.identity()).unwrap(), 600);
    assert_eq!(ledger.mint().unwrap().unwrap().config, b"devnet".to_vec());
    assert_eq!(ledger.pending_transfers_for(&bob.identity()).unwrap().len(), 1);

    let event = submit(&ledger, &bob, Instruction::ClaimTransfer { address }).unwrap();
    assert_eq!(event.slot, last_slot + 1);
    assert_eq!(ledger.balance(&bob.identity()).unwrap(), 300);
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

fn race_same_nonce<S: LedgerStore + 'static>(ledger: Ledger<S>) {
    let alice = keypair(1);
    let receivers = [keypair(2), keypair(3)];
    open_account(&ledger, &alice);
    for r in &receivers {
        open_account(&ledger, r);
    }
    deposit(&ledger, &alice, 1_000);
    let nonce = ledger.nonce(&alice.identity()).unwrap();

    let ledger = Arc::new(ledger);
    let barrier = Arc::new(Barrier::new(receivers.len()));
    let handles: Vec<_> = receivers
        .iter()
        .map(|r| {
            let ledger = Arc::clone(&ledger);
            let barrier = Arc::clone(&barrier);
            let signed =
                SignedInstruction::sign(transfer_ix(&alice, &r.identity(), 600, nonce), &alice)
                    .expect("sign");
            thread::spawn(move || {
                barrier.wait();
                ledger.submit(&signed)
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let wins = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1, "exactly one same-nonce transfer may land: {results:?}");
    for r in results.iter().filter(|r| r.is_err()) {
        assert!(matches!(r, Err(LedgerError::InvalidNonce { .. })));
    }
    assert_eq!(ledger.balance(&alice.identity()).unwrap(), 400);
    assert_eq!(ledger.nonce(&alice.identity()).unwrap(), nonce + 1);
    let received: u64 = receivers
        .iter()
        .map(|r| ledger.balance(&r.identity()).unwrap())
        .sum();
    assert_eq!(received, 600);
}

#[test]
fn concurrent_same_nonce_memory() {
    let alice = keypair(1);
    race_same_nonce(
        Ledger::open(MemoryStore::new(), LedgerConfig::new(alice.identity())).unwrap(),
    );
}

#[test]
fn concurrent_same_nonce_sled() {
    let alice = keypair(1);
    race_same_nonce(
        Ledger::open(
            SledStore::open_temporary().unwrap(),
            LedgerConfig::new(alice.identity()),
        )
        .unwrap(),
    );
}

#[test]
fn stale_write_is_rejected_by_store() {
    let alice = keypair(1);
    let (ledger, _) = memory_ledger(&alice);
    open_account(&ledger, &alice);
    let stale = ledger.balance_record(&alice.identity()).unwrap().unwrap();
    deposit(&ledger, &alice, 10);

    // The deposit kept the nonce at 0, so only the balance gives the
    // stale read away. A batch computed before it must not overwrite it.
    assert_eq!(ledger.nonce(&alice.identity()).unwrap(), stale.nonce);
    let (address, _) = balance_address(&alice.identity()).unwrap();
    let overwrite = stale.apply_deposit(ledger.codec(), &encode(1)).unwrap();
    assert_eq!(
        ledger.store().commit(&WriteBatch::new().put_balance(
            address,
            Precondition::unchanged(&stale),
            overwrite
        )),
        Err(LedgerError::StaleRecord(address))
    );
    assert_eq!(ledger.balance(&alice.identity()).unwrap(), 10);
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

struct BrokenSink;

impl EventSink for BrokenSink {
    fn publish(&self, _event: &LedgerEvent) -> Result<(), SinkError> {
        Err(SinkError::Io(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "indexer went away",
        )))
    }
}

#[test]
fn failing_sink_does_not_roll_back() {
    let alice = keypair(1);
    let memory = Arc::new(MemorySink::new());
    let ledger = Ledger::open(MemoryStore::new(), LedgerConfig::new(alice.identity()))
        .unwrap()
        .with_sink(Arc::new(BrokenSink))
        .with_sink(memory.clone());

    open_account(&ledger, &alice);
    deposit(&ledger, &alice, 42);

    assert_eq!(ledger.balance(&alice.identity()).unwrap(), 42);
    // Sinks after the broken one still get everything.
    assert_eq!(memory.len(), 2);
}

#[test]
fn event_log_is_ordered_and_parseable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.jsonl");
    let alice = keypair(1);
    let bob = keypair(2);
    let ledger = Ledger::open(MemoryStore::new(), LedgerConfig::new(alice.identity()))
        .unwrap()
        .with_sink(Arc::new(JsonLinesSink::open(&path).unwrap()));

    open_account(&ledger, &alice);
    open_account(&ledger, &bob);
    deposit(&ledger, &alice, 1_000);
    let nonce = ledger.nonce(&alice.identity()).unwrap();
    submit(&ledger, &alice, transfer_ix(&alice, &bob.identity(), 10, nonce)).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let events: Vec<LedgerEvent> = text
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(events.len(), 4);
    assert!(events.windows(2).all(|w| w[0].slot < w[1].slot));
    match &events[3].kind {
        EventKind::PrivateTransfer {
            sender, receiver, ..
        } => {
            assert_eq!(*sender, alice.identity());
            assert_eq!(*receiver, bob.identity());
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn concurrent_writers_publish_in_slot_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.jsonl");
    let authority = keypair(1);
    let ledger = Arc::new(
        Ledger::open(
            SledStore::open_temporary().unwrap(),
            LedgerConfig::new(authority.identity()),
        )
        .unwrap()
        .with_sink(Arc::new(JsonLinesSink::open(&path).unwrap())),
    );

    const WRITERS: u8 = 6;
    const ROUNDS: u64 = 20;
    let barrier = Arc::new(Barrier::new(WRITERS as usize));
    let handles: Vec<_> = (0..WRITERS)
        .map(|i| {
            let ledger = Arc::clone(&ledger);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let owner = keypair(10 + i);
                barrier.wait();
                open_account(&*ledger, &owner);
                for amount in 1..=ROUNDS {
                    deposit(&*ledger, &owner, amount);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let text = std::fs::read_to_string(&path).unwrap();
    let slots: Vec<u64> = text
        .lines()
        .map(|l| serde_json::from_str::<LedgerEvent>(l).unwrap().slot)
        .collect();
    assert_eq!(slots.len(), WRITERS as usize * (ROUNDS as usize + 1));
    assert!(
        slots.windows(2).all(|w| w[0] < w[1]),
        "slots out of order: {slots:?}"
    );
    assert_eq!(slots.last().copied(), Some(ledger.store().last_slot().unwrap()));
    assert_eq!(
        ledger.vault().unwrap().total_custody,
        WRITERS as u64 * ROUNDS * (ROUNDS + 1) / 2
    );
}

#[test]
fn caller_type_is_what_the_ledger_sees() {
    // Typed entry points take a Caller directly, for embedding without
    // signatures at all.
    let alice = keypair(1);
    let (ledger, _) = memory_ledger(&alice);
    ledger
        .initialize_balance(&Caller::Verified(alice.identity()), &alice.identity())
        .unwrap();
    assert_eq!(ledger.nonce(&alice.identity()).unwrap(), 0);
}
