//! Criterion benchmarks for lid-presale hot paths.
//!
//! Covers: rate curve evaluation, share minting and a full deposit.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use lid_core::constants::ONE;
use lid_core::types::{Address, Call};
use lid_presale::bonus::BonusSchedule;
use lid_presale::config::SaleConfig;

fn sale_schedule() -> BonusSchedule {
    let starts = [0, 1_000 * ONE, 2_000 * ONE, 3_000 * ONE];
    BonusSchedule::new(&starts, &[3_500, 2_500, 1_000, 0]).unwrap()
}

fn bench_rate_per_eth(c: &mut Criterion) {
    let schedule = sale_schedule();
    let supply = 50_000_000 * ONE;

    c.bench_function("rate_per_eth", |b| {
        b.iter(|| schedule.rate_per_eth(black_box(supply), black_box(2_500 * ONE), black_box(4_000 * ONE)))
    });
}

fn bench_shares_for(c: &mut Criterion) {
    let schedule = sale_schedule();

    c.bench_function("shares_for", |b| {
        b.iter(|| schedule.shares_for(black_box(7 * ONE), black_box(1_234 * ONE)))
    });
}

fn bench_deposit(c: &mut Criterion) {
    let cfg = SaleConfig::default();
    let presale = cfg.deploy(0).unwrap();
    let now = cfg.timer.start_time;
    let depositor = Address::repeat_byte(0x42);

    c.bench_function("deposit", |b| {
        b.iter_batched(
            || presale.clone(),
            |mut p| p.deposit(&Call::new(depositor, now), black_box(ONE), None),
            criterion::BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_rate_per_eth, bench_shares_for, bench_deposit);
criterion_main!(benches);
