//! Criterion benchmarks for the per-timeframe hot path.
//!
//! Benchmarks:
//! 1. Indicator enrichment (RSI + Bollinger over a fetched slice)
//! 2. Merge-dedup-trim against a full stored window
//! 3. Table fingerprinting
//! 4. Parquet merge-and-persist round trip

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use barvault_core::domain::{Bar, EnrichedBar, Timeframe};
use barvault_core::indicators::{enrich, IndicatorParams};
use barvault_core::store::{fingerprint, merge, ParquetStore, TableKey};
use chrono::{Duration, NaiveDate};

fn make_bars(start: i64, count: usize) -> Vec<Bar> {
    let base = NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(9, 15, 0)
        .unwrap();
    (0..count as i64)
        .map(|i| {
            let n = start + i;
            let close = 100.0 + (n as f64 * 0.05).sin() * 10.0 + (n as f64 * 0.37).cos();
            Bar {
                timestamp: base + Duration::minutes(15 * n),
                open: close - 0.3,
                high: close + 0.8,
                low: close - 0.9,
                close,
                volume: 10_000.0 + (n % 97) as f64,
            }
        })
        .collect()
}

fn bench_enrich(c: &mut Criterion) {
    let mut group = c.benchmark_group("enrich");
    let params = IndicatorParams::default();

    for &bar_count in &[300, 1000, 5000] {
        let bars = make_bars(0, bar_count);
        group.bench_with_input(BenchmarkId::new("rsi_bb", bar_count), &bars, |b, bars| {
            b.iter(|| enrich(black_box(bars.clone()), black_box(&params)));
        });
    }

    group.finish();
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");
    let params = IndicatorParams::default();
    let stored = enrich(make_bars(0, 300), &params);

    for &overlap in &[0usize, 50, 300] {
        let incoming = enrich(make_bars(300 - overlap as i64, 300), &params);
        group.bench_with_input(
            BenchmarkId::new("window_300_overlap", overlap),
            &incoming,
            |b, incoming| {
                b.iter(|| {
                    merge(
                        black_box(Some(stored.clone())),
                        black_box(incoming.clone()),
                        300,
                    )
                });
            },
        );
    }

    group.finish();
}

fn bench_fingerprint(c: &mut Criterion) {
    let rows: Vec<EnrichedBar> = enrich(make_bars(0, 300), &IndicatorParams::default());
    c.bench_function("fingerprint_300", |b| b.iter(|| fingerprint(black_box(&rows))));
}

fn bench_persist(c: &mut Criterion) {
    let dir = tempfile::TempDir::new().unwrap();
    let store = ParquetStore::new(dir.path());
    let key = TableKey::new("bench", Timeframe::Minute15, "BENCH");
    let params = IndicatorParams::default();
    store
        .save(&key, &enrich(make_bars(0, 300), &params))
        .unwrap();

    let mut start = 300;
    c.bench_function("merge_and_persist_300", |b| {
        b.iter(|| {
            // Fresh bars every iteration so the write is never skipped
            let incoming = enrich(make_bars(start, 10), &params);
            start += 10;
            store
                .merge_and_persist(&key, incoming, 300, None)
                .unwrap()
        });
    });
}

criterion_group!(
    benches,
    bench_enrich,
    bench_merge,
    bench_fingerprint,
    bench_persist,
);
criterion_main!(benches);
