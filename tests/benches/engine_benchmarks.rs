//! # Donation Wallet Engine Benchmarks
//!
//! | Area | Operation |
//! |------|-----------|
//! | dw-04 Deposit Conditions | magnet format / parse |
//! | dw-07 Account | input selection over many deposit addresses |
//! | shared-bus | publish fan-out to listeners |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use dw_04_deposit_conditions::{Conditions, DepositConditions};
use dw_07_account::domain::{select_inputs, Candidate};
use shared_bus::{AccountEvent, EventBus, EventFilter, EventPublisher};
use shared_crypto::{derive_address, Seed};
use shared_types::SecurityLevel;
use std::time::Duration;

const SEED: &str = "DONATIONWALLETBENCHSEED";

fn seed() -> Seed {
    Seed::new(SEED).expect("bench seed is valid")
}

// ============================================================================
// DW-04: Magnet Links
// ============================================================================

fn bench_magnet(c: &mut Criterion) {
    let mut group = c.benchmark_group("dw-04-magnet");
    let timeout = chrono::DateTime::from_timestamp(1_700_000_000, 0).expect("valid timestamp");
    let cda = DepositConditions::new(
        derive_address(&seed(), 0, SecurityLevel::DEFAULT),
        &Conditions::single_use(timeout, 1_000),
    )
    .expect("valid conditions");
    let link = cda.to_magnet();

    group.bench_function("format", |b| b.iter(|| black_box(cda.to_magnet())));
    group.bench_function("parse", |b| {
        b.iter(|| black_box(DepositConditions::from_magnet(black_box(&link)).is_ok()))
    });
    group.finish();
}

// ============================================================================
// DW-07: Input Selection
// ============================================================================

fn bench_select_inputs(c: &mut Criterion) {
    let mut group = c.benchmark_group("dw-07-select-inputs");
    let seed = seed();

    for size in [10u64, 100, 1_000] {
        let candidates: Vec<Candidate> = (0..size)
            .map(|i| Candidate {
                address: derive_address(&seed, i, SecurityLevel::DEFAULT),
                key_index: i,
                balance: (i * 7919) % 500 + 1,
            })
            .collect();
        let required = candidates.iter().map(|c| c.balance).sum::<u64>() / 2;

        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &candidates, |b, cands| {
            b.iter(|| black_box(select_inputs(cands.clone(), required).is_ok()))
        });
    }
    group.finish();
}

// ============================================================================
// SHARED-BUS: Publish
// ============================================================================

fn bench_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("shared-bus-publish");
    group.measurement_time(Duration::from_secs(5));

    for listeners in [0usize, 1, 8] {
        let bus = EventBus::new();
        let _held: Vec<_> = (0..listeners)
            .map(|_| bus.subscribe(EventFilter::all()).expect("bus is open"))
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(listeners), &bus, |b, bus| {
            b.iter(|| black_box(bus.publish(AccountEvent::ReceivingDeposit { tails: Vec::new() })))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_magnet, bench_select_inputs, bench_publish);
criterion_main!(benches);
