// Ledger benchmarks for VeilPay.
//
// Covers the amount codec, the direct-transfer hot path on both stores,
// escrow create/cancel round trips, and signature checking on submit.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use veilpay_protocol::amount::{decode, encode};
use veilpay_protocol::crypto::keys::Keypair;
use veilpay_protocol::{
    Caller, Identity, Instruction, Ledger, LedgerConfig, LedgerStore, MemoryStore,
    SignedInstruction, SledStore,
};

const FUNDING: u64 = u64::MAX / 2;

fn funded<S: LedgerStore>(store: S, sender: &Identity, receiver: &Identity) -> Ledger<S> {
    let ledger = Ledger::open(store, LedgerConfig::new(*sender)).unwrap();
    ledger
        .initialize_balance(&Caller::Verified(*sender), sender)
        .unwrap();
    ledger
        .initialize_balance(&Caller::Verified(*receiver), receiver)
        .unwrap();
    ledger
        .deposit(&Caller::Verified(*sender), sender, FUNDING, &encode(FUNDING))
        .unwrap();
    ledger
}

fn bench_codec(c: &mut Criterion) {
    c.bench_function("amount/encode", |b| {
        b.iter(|| encode(std::hint::black_box(1_000_000)));
    });
    let encoded = encode(1_000_000);
    c.bench_function("amount/decode", |b| {
        b.iter(|| decode(std::hint::black_box(&encoded)));
    });
}

fn bench_private_transfer(c: &mut Criterion) {
    let sender = Identity::from_bytes([1u8; 32]);
    let receiver = Identity::from_bytes([2u8; 32]);
    let caller = Caller::Verified(sender);
    let amount = encode(1);

    let mut group = c.benchmark_group("ledger/private_transfer");
    group.throughput(Throughput::Elements(1));

    let memory = funded(MemoryStore::new(), &sender, &receiver);
    group.bench_function("memory", |b| {
        b.iter(|| {
            let nonce = memory.nonce(&sender).unwrap();
            memory
                .private_transfer(&caller, &sender, &receiver, &amount, nonce, [0u8; 32], [0u8; 32])
                .unwrap()
        });
    });

    let sled = funded(SledStore::open_temporary().unwrap(), &sender, &receiver);
    group.bench_function("sled", |b| {
        b.iter(|| {
            let nonce = sled.nonce(&sender).unwrap();
            sled.private_transfer(&caller, &sender, &receiver, &amount, nonce, [0u8; 32], [0u8; 32])
                .unwrap()
        });
    });

    group.finish();
}

fn bench_escrow_round_trip(c: &mut Criterion) {
    let sender = Identity::from_bytes([1u8; 32]);
    let recipient = Identity::from_bytes([3u8; 32]);
    let caller = Caller::Verified(sender);
    let ledger = funded(MemoryStore::new(), &sender, &Identity::from_bytes([2u8; 32]));
    let amount = encode(10);

    c.bench_function("ledger/escrow_create_cancel", |b| {
        b.iter(|| {
            let nonce = ledger.nonce(&sender).unwrap();
            let created = ledger
                .create_transfer(&caller, &sender, &recipient, &amount, nonce)
                .unwrap();
            let address = created.pending_address().unwrap();
            ledger.cancel_transfer(&caller, &address).unwrap()
        });
    });
}

fn bench_submit(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger/submit_signed");

    for accounts in [1usize, 16, 128] {
        let ledger = Ledger::open(
            MemoryStore::new(),
            LedgerConfig::new(Identity::from_bytes([9u8; 32])),
        )
        .unwrap();
        let signed: Vec<SignedInstruction> = (0..accounts)
            .map(|i| {
                let kp = Keypair::from_seed(&[i as u8; 32]);
                let owner = kp.identity();
                ledger
                    .initialize_balance(&Caller::Verified(owner), &owner)
                    .unwrap();
                // Zero deposits keep custody flat however long the bench runs.
                SignedInstruction::sign(
                    Instruction::Deposit {
                        owner,
                        amount: 0,
                        encoded_amount: encode(0),
                    },
                    &kp,
                )
                .unwrap()
            })
            .collect();

        group.throughput(Throughput::Elements(accounts as u64));
        group.bench_with_input(BenchmarkId::from_parameter(accounts), &signed, |b, signed| {
            b.iter(|| {
                for ix in signed {
                    ledger.submit(ix).unwrap();
                }
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_codec,
    bench_private_transfer,
    bench_escrow_round_trip,
    bench_submit,
);
criterion_main!(benches);
