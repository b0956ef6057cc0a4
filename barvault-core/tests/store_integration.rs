//! Integration tests for the series store: cold start, incremental overlap,
//! unchanged re-merge, and failure atomicity.

use barvault_core::data::DataError;
use barvault_core::domain::{Bar, EnrichedBar, Timeframe};
use barvault_core::indicators::{enrich, IndicatorParams};
use barvault_core::store::{MergeOutcome, ParquetStore, TableKey};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::fs;
use tempfile::TempDir;

const WINDOW: usize = 300;

fn t(n: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(9, 15, 0)
        .unwrap()
        + Duration::minutes(15 * n)
}

/// Bars T{from}..=T{to}; `shift` distinguishes refetched values.
fn bars(from: i64, to: i64, shift: f64) -> Vec<Bar> {
    (from..=to)
        .map(|n| {
            let close = 100.0 + (n as f64 * 0.3).sin() * 4.0 + shift;
            Bar {
                timestamp: t(n),
                open: close - 0.5,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1000.0 + n as f64,
            }
        })
        .collect()
}

fn key() -> TableKey {
    TableKey::new("fno", Timeframe::Minute15, "RELIANCE")
}

fn seeded_store(dir: &TempDir) -> ParquetStore {
    let store = ParquetStore::new(dir.path());
    let rows = enrich(bars(1, 300, 0.0), &IndicatorParams::default());
    store
        .merge_and_persist(&key(), rows, WINDOW, None)
        .unwrap();
    store
}

#[test]
fn cold_start_writes_full_enriched_window() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir);

    let table = store.load(&key()).unwrap().unwrap();
    assert_eq!(table.len(), 300);
    assert!(table.windows(2).all(|w| w[0].timestamp() < w[1].timestamp()));

    assert!(table[0].rsi_14.is_none());
    assert!(table[1..].iter().all(|r| r.rsi_14.is_some()));

    assert!(table[..19].iter().all(|r| r.bb_mid.is_none() && r.bb_upper.is_none()));
    assert!(table[19..]
        .iter()
        .all(|r| r.bb_lower.is_some() && r.bb_mid.is_some() && r.bb_upper.is_some()));
}

#[test]
fn incremental_overlap_keeps_last_window_and_prefers_incoming() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir);

    let incoming = enrich(bars(250, 320, 7.0), &IndicatorParams::default());
    let outcome = store
        .merge_and_persist(&key(), incoming, WINDOW, None)
        .unwrap();
    assert_eq!(
        outcome,
        MergeOutcome::Written {
            rows: 300,
            created: false
        }
    );

    let table = store.load(&key()).unwrap().unwrap();
    assert_eq!(table.len(), 300);
    assert_eq!(table.first().unwrap().timestamp(), t(21));
    assert_eq!(table.last().unwrap().timestamp(), t(320));

    let at = |n: i64| table.iter().find(|r| r.timestamp() == t(n)).unwrap();
    for n in 250..=300 {
        assert_eq!(at(n).bar.close, bars(n, n, 7.0)[0].close);
    }
    assert_eq!(at(249).bar.close, bars(249, 249, 0.0)[0].close);
}

#[test]
fn fifty_new_bars_shift_the_window_by_fifty() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir);

    let incoming = enrich(bars(251, 350, 0.0), &IndicatorParams::default());
    store
        .merge_and_persist(&key(), incoming, WINDOW, None)
        .unwrap();

    let table = store.load(&key()).unwrap().unwrap();
    assert_eq!(table.len(), 300);
    assert_eq!(table.first().unwrap().timestamp(), t(51));
    assert_eq!(table.last().unwrap().timestamp(), t(350));
}

#[test]
fn identical_remerge_leaves_file_byte_identical() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir);
    let path = store.table_path(&key());
    let before = fs::read(&path).unwrap();

    let rows = enrich(bars(1, 300, 0.0), &IndicatorParams::default());
    let outcome = store
        .merge_and_persist(&key(), rows, WINDOW, None)
        .unwrap();

    assert_eq!(outcome, MergeOutcome::Unchanged { rows: 300 });
    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn tail_subset_remerge_is_unchanged() {
    // A refetch of bars already stored with the same values writes nothing
    let dir = TempDir::new().unwrap();
    let store = ParquetStore::new(dir.path());
    let rows: Vec<EnrichedBar> = bars(1, 300, 0.0).into_iter().map(EnrichedBar::plain).collect();
    store.save(&key(), &rows).unwrap();

    let outcome = store
        .merge_and_persist(&key(), rows[200..].to_vec(), WINDOW, None)
        .unwrap();
    assert_eq!(outcome, MergeOutcome::Unchanged { rows: 300 });
}

#[test]
fn failed_write_leaves_prior_table_authoritative() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir);
    let path = store.table_path(&key());
    let before = fs::read(&path).unwrap();

    // A directory squatting on the temp path makes the write fail
    fs::create_dir_all(path.with_extension("parquet.tmp")).unwrap();

    let incoming = enrich(bars(301, 310, 0.0), &IndicatorParams::default());
    let err = store
        .merge_and_persist(&key(), incoming, WINDOW, None)
        .unwrap_err();
    assert!(matches!(err, DataError::ParquetError(_)));

    assert_eq!(fs::read(&path).unwrap(), before);
    assert_eq!(store.load(&key()).unwrap().unwrap().len(), 300);
}

#[test]
fn tables_are_isolated_by_bucket_and_timeframe() {
    let dir = TempDir::new().unwrap();
    let store = ParquetStore::new(dir.path());
    let rows: Vec<EnrichedBar> = bars(1, 5, 0.0).into_iter().map(EnrichedBar::plain).collect();

    let daily = TableKey::new("fno", Timeframe::Daily, "RELIANCE");
    let other_bucket = TableKey::new("broader_index", Timeframe::Minute15, "RELIANCE");
    store.save(&key(), &rows).unwrap();

    assert!(store.load(&daily).unwrap().is_none());
    assert!(store.load(&other_bucket).unwrap().is_none());
    assert!(dir.path().join("fno/15m/RELIANCE.parquet").is_file());
}
