// Ledger state machine benchmarks.
//
// Covers envelope verification, the admission check, and a full
// FinalizeBlock + Commit cycle at several block sizes.

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};

use kestrel_protocol::app::abci::{
    CheckTxRequest, FinalizeBlockRequest, InitChainRequest,
};
use kestrel_protocol::app::{Application, LedgerApp};
use kestrel_protocol::config::FAUCET_PUBLIC_KEY;
use kestrel_protocol::crypto::LedgerKeypair;
use kestrel_protocol::storage::LedgerStore;
use kestrel_protocol::transaction::{sign_and_encode, verify_raw_transaction, TransactionBuilder};

/// `n` faucet draws, each signed by a distinct recipient.
fn faucet_draws(n: usize) -> Vec<Vec<u8>> {
    (0..n)
        .map(|i| {
            let mut seed = [0u8; 32];
            seed[..8].copy_from_slice(&(i as u64 + 1).to_le_bytes());
            let kp = LedgerKeypair::from_seed(&seed);
            let tx = TransactionBuilder::new(&kp)
                .nonce(i as u64)
                .transfer(FAUCET_PUBLIC_KEY, kp.public_key_bytes(), 1_000);
            sign_and_encode(&tx, &kp).unwrap()
        })
        .collect()
}

fn genesis_app() -> LedgerApp {
    let app = LedgerApp::new(LedgerStore::in_memory()).unwrap();
    app.init_chain(InitChainRequest {
        chain_id: "bench".into(),
        initial_height: 1,
    })
    .unwrap();
    app
}

fn bench_verify(c: &mut Criterion) {
    let tx = faucet_draws(1).remove(0);
    c.bench_function("tx/verify_raw", |b| {
        b.iter(|| verify_raw_transaction(&tx).unwrap());
    });
}

fn bench_check_tx(c: &mut Criterion) {
    let app = genesis_app();
    let tx = faucet_draws(1).remove(0);
    c.bench_function("app/check_tx", |b| {
        b.iter(|| app.check_tx(CheckTxRequest { tx: tx.clone() }).unwrap());
    });
}

fn bench_finalize_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("app/finalize_commit");

    for size in [1usize, 10, 100, 500] {
        let txs = faucet_draws(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &txs, |b, txs| {
            b.iter_batched(
                || (genesis_app(), txs.clone()),
                |(app, txs)| {
                    app.finalize_block(FinalizeBlockRequest { height: 1, txs })
                        .unwrap();
                    app.commit().unwrap();
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_verify, bench_check_tx, bench_finalize_commit);
criterion_main!(benches);
