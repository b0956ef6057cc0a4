//! Merge-dedup-trim.
//!
//! Reconciles a previously stored series with newly fetched rows:
//! concatenate (stored first, fetched second), keep one row per timestamp
//! with the later-inserted row winning, sort ascending, keep the last
//! `window` rows. The result is bounded, duplicate-free, and strictly
//! increasing, and merging the same input again changes nothing.

use crate::domain::{Bar, EnrichedBar};
use chrono::NaiveDateTime;
use std::collections::BTreeMap;

/// Merge `incoming` into `existing` and trim to the most recent `window` rows.
pub fn merge(
    existing: Option<Vec<EnrichedBar>>,
    incoming: Vec<EnrichedBar>,
    window: usize,
) -> Vec<EnrichedBar> {
    let rows = existing.into_iter().flatten().chain(incoming);
    dedup_sort_trim(rows, EnrichedBar::timestamp, window)
}

/// Sort freshly fetched bars, drop repeated timestamps (last wins), and keep
/// the most recent `window`. Sources may return more than asked for, or out
/// of order.
pub fn normalize(bars: Vec<Bar>, window: usize) -> Vec<Bar> {
    dedup_sort_trim(bars, |b| b.timestamp, window)
}

fn dedup_sort_trim<T>(
    rows: impl IntoIterator<Item = T>,
    key: impl Fn(&T) -> NaiveDateTime,
    window: usize,
) -> Vec<T> {
    let mut by_timestamp = BTreeMap::new();
    for row in rows {
        by_timestamp.insert(key(&row), row);
    }
    let skip = by_timestamp.len().saturating_sub(window);
    by_timestamp.into_values().skip(skip).collect()
}

/// BLAKE3 over every column of every row, in order.
///
/// Hashes raw bit patterns, so NaN values compare equal to themselves and
/// `None` is distinct from any stored value.
pub fn fingerprint(rows: &[EnrichedBar]) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(rows.len() as u64).to_le_bytes());
    for row in rows {
        let bar = &row.bar;
        hasher.update(&bar.timestamp.and_utc().timestamp_millis().to_le_bytes());
        for v in [bar.open, bar.high, bar.low, bar.close, bar.volume] {
            hasher.update(&v.to_bits().to_le_bytes());
        }
        for v in [row.rsi_14, row.bb_upper, row.bb_mid, row.bb_lower] {
            match v {
                Some(v) => {
                    hasher.update(&[1]);
                    hasher.update(&v.to_bits().to_le_bytes());
                }
                None => {
                    hasher.update(&[0]);
                }
            }
        }
    }
    hasher.finalize()
}
