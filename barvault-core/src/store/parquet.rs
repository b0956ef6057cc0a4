//! Parquet-backed series store.
//!
//! Layout: `{root}/{bucket_dir}/{timeframe}/{INSTRUMENT}.parquet`, one file
//! per (bucket, timeframe, instrument).
//!
//! - Writes are atomic: write to `.parquet.tmp`, rename into place. A failed
//!   write leaves the previous table authoritative.
//! - Loads validate the schema; tables without indicator columns load with
//!   those fields missing.
//! - A merge that reproduces the stored table exactly skips the write.

use super::merge::{fingerprint, merge};
use super::schema::{TableSchema, INDICATOR_COLUMNS, PRICE_COLUMNS, TIMESTAMP};
use crate::data::DataError;
use crate::domain::{Bar, EnrichedBar, Timeframe};
use crate::indicators::{self, IndicatorParams};
use chrono::NaiveDateTime;
use polars::prelude::*;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Identity of one stored table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TableKey {
    pub bucket_dir: String,
    pub timeframe: Timeframe,
    pub instrument: String,
}

impl TableKey {
    pub fn new(
        bucket_dir: impl Into<String>,
        timeframe: Timeframe,
        instrument: impl Into<String>,
    ) -> Self {
        Self {
            bucket_dir: bucket_dir.into(),
            timeframe,
            instrument: instrument.into(),
        }
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.bucket_dir, self.timeframe, self.instrument)
    }
}

/// What `merge_and_persist` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The table was (re)written.
    Written { rows: usize, created: bool },
    /// The merged result equals the stored table; nothing was written.
    Unchanged { rows: usize },
}

impl MergeOutcome {
    pub fn rows(&self) -> usize {
        match self {
            MergeOutcome::Written { rows, .. } | MergeOutcome::Unchanged { rows } => *rows,
        }
    }
}

/// Summary of one stored table.
#[derive(Debug, Clone, Serialize)]
pub struct TableStatus {
    pub key: TableKey,
    pub stored: bool,
    pub rows: usize,
    pub first: Option<NaiveDateTime>,
    pub last: Option<NaiveDateTime>,
    pub error: Option<String>,
}

/// The series store.
#[derive(Debug, Clone)]
pub struct ParquetStore {
    root: PathBuf,
}

impl ParquetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path to the table file for a key.
    pub fn table_path(&self, key: &TableKey) -> PathBuf {
        self.root
            .join(&key.bucket_dir)
            .join(key.timeframe.label())
            .join(format!("{}.parquet", key.instrument))
    }

    /// Load a stored table. `Ok(None)` when no table exists yet.
    pub fn load(&self, key: &TableKey) -> Result<Option<Vec<EnrichedBar>>, DataError> {
        let path = self.table_path(key);
        if !path.exists() {
            return Ok(None);
        }
        read_table(&path).map(Some)
    }

    /// Atomically replace the table for `key` with `rows`.
    pub fn save(&self, key: &TableKey, rows: &[EnrichedBar]) -> Result<(), DataError> {
        if rows.is_empty() {
            return Err(DataError::EmptySeries);
        }

        let path = self.table_path(key);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .map_err(|e| DataError::StoreError(format!("failed to create dir: {e}")))?;
        }

        let mut df = rows_to_dataframe(rows)?;
        let tmp_path = path.with_extension("parquet.tmp");

        if let Err(e) = write_parquet(&mut df, &tmp_path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DataError::StoreError(format!("atomic rename failed: {e}"))
        })?;

        Ok(())
    }

    /// Merge `incoming` into the stored table, trim to `window`, persist.
    ///
    /// With `recompute`, indicator columns are recomputed over the whole
    /// merged window before the equality check; otherwise rows keep the
    /// values they were stored or fetched with.
    pub fn merge_and_persist(
        &self,
        key: &TableKey,
        incoming: Vec<EnrichedBar>,
        window: usize,
        recompute: Option<&IndicatorParams>,
    ) -> Result<MergeOutcome, DataError> {
        let existing = self.load(key)?;
        let created = existing.is_none();
        let before = existing.as_deref().map(fingerprint);

        let mut merged = merge(existing, incoming, window);
        if let Some(params) = recompute {
            merged = indicators::recompute(merged, params);
        }

        if before == Some(fingerprint(&merged)) {
            debug!(table = %key, rows = merged.len(), "table unchanged");
            return Ok(MergeOutcome::Unchanged { rows: merged.len() });
        }

        self.save(key, &merged)?;
        debug!(table = %key, rows = merged.len(), created, "table written");
        Ok(MergeOutcome::Written {
            rows: merged.len(),
            created,
        })
    }

    /// Row counts and time span of each table.
    pub fn status(&self, keys: &[TableKey]) -> Vec<TableStatus> {
        keys.iter()
            .map(|key| {
                let mut status = TableStatus {
                    key: key.clone(),
                    stored: false,
                    rows: 0,
                    first: None,
                    last: None,
                    error: None,
                };
                match self.load(key) {
                    Ok(Some(rows)) => {
                        status.stored = true;
                        status.rows = rows.len();
                        status.first = rows.first().map(EnrichedBar::timestamp);
                        status.last = rows.last().map(EnrichedBar::timestamp);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        status.stored = true;
                        status.error = Some(e.to_string());
                    }
                }
                status
            })
            .collect()
    }
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn rows_to_dataframe(rows: &[EnrichedBar]) -> Result<DataFrame, DataError> {
    let timestamps: Vec<i64> = rows
        .iter()
        .map(|r| r.timestamp().and_utc().timestamp_millis())
        .collect();

    let mut columns = vec![Column::new(TIMESTAMP.into(), timestamps)
        .cast(&TableSchema::timestamp_dtype())
        .map_err(|e| DataError::ParquetError(format!("timestamp cast: {e}")))?];

    let price_fields: [fn(&Bar) -> f64; 5] = [
        |b| b.open,
        |b| b.high,
        |b| b.low,
        |b| b.close,
        |b| b.volume,
    ];
    for (name, field) in PRICE_COLUMNS.iter().zip(price_fields) {
        let values: Vec<f64> = rows.iter().map(|r| field(&r.bar)).collect();
        columns.push(Column::new((*name).into(), values));
    }

    let indicator_fields: [fn(&EnrichedBar) -> Option<f64>; 4] = [
        |r| r.rsi_14,
        |r| r.bb_upper,
        |r| r.bb_mid,
        |r| r.bb_lower,
    ];
    for (name, field) in INDICATOR_COLUMNS.iter().zip(indicator_fields) {
        let values: Vec<Option<f64>> = rows.iter().map(field).collect();
        columns.push(Column::new((*name).into(), values));
    }

    DataFrame::new(columns).map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<(), DataError> {
    let file =
        fs::File::create(path).map_err(|e| DataError::ParquetError(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(df)
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;
    Ok(())
}

fn read_table(path: &Path) -> Result<Vec<EnrichedBar>, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::ParquetError(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read: {e}")))?;

    TableSchema::validate(&df).map_err(|e| DataError::ValidationError(e.to_string()))?;
    dataframe_to_rows(&df)
}

fn f64_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>, DataError> {
    let column = df
        .column(name)
        .map_err(|e| DataError::ParquetError(format!("column {name}: {e}")))?;
    let ca = column
        .f64()
        .map_err(|e| DataError::ParquetError(format!("{name} column type: {e}")))?;
    Ok(ca.into_iter().collect())
}

fn dataframe_to_rows(df: &DataFrame) -> Result<Vec<EnrichedBar>, DataError> {
    let timestamps = df
        .column(TIMESTAMP)
        .and_then(|c| c.cast(&DataType::Int64))
        .map_err(|e| DataError::ParquetError(format!("timestamp column: {e}")))?;
    let ts_ca = timestamps
        .i64()
        .map_err(|e| DataError::ParquetError(format!("timestamp column type: {e}")))?;

    let prices = PRICE_COLUMNS
        .iter()
        .map(|name| f64_values(df, name))
        .collect::<Result<Vec<_>, _>>()?;

    let absent = vec![None; df.height()];
    let indicators = INDICATOR_COLUMNS
        .iter()
        .map(|name| {
            if df.schema().contains(name) {
                f64_values(df, name)
            } else {
                Ok(absent.clone())
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let millis = ts_ca
            .get(i)
            .ok_or_else(|| DataError::ParquetError(format!("null timestamp at row {i}")))?;
        let timestamp = chrono::DateTime::from_timestamp_millis(millis)
            .map(|dt| dt.naive_utc())
            .ok_or_else(|| DataError::ParquetError(format!("timestamp out of range at row {i}")))?;
        let price = |c: usize| prices[c][i].unwrap_or(f64::NAN);

        rows.push(EnrichedBar {
            bar: Bar {
                timestamp,
                open: price(0),
                high: price(1),
                low: price(2),
                close: price(3),
                volume: price(4),
            },
            rsi_14: indicators[0][i],
            bb_upper: indicators[1][i],
            bb_mid: indicators[2][i],
            bb_lower: indicators[3][i],
        });
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{enrich, make_bars};
    use tempfile::TempDir;

    fn key() -> TableKey {
        TableKey::new("FNO", Timeframe::Daily, "SBIN")
    }

    fn closes(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect()
    }

    #[test]
    fn table_path_layout() {
        let store = ParquetStore::new("/data");
        assert_eq!(
            store.table_path(&TableKey::new("FNO", Timeframe::Minute15, "SBIN")),
            PathBuf::from("/data/FNO/15m/SBIN.parquet")
        );
    }

    #[test]
    fn missing_table_loads_as_none() {
        let dir = TempDir::new().unwrap();
        let store = ParquetStore::new(dir.path());
        assert!(store.load(&key()).unwrap().is_none());
    }

    #[test]
    fn save_and_load_preserves_values_and_nulls() {
        let dir = TempDir::new().unwrap();
        let store = ParquetStore::new(dir.path());
        let rows = enrich(make_bars(&closes(30)), &IndicatorParams::default());

        store.save(&key(), &rows).unwrap();
        let loaded = store.load(&key()).unwrap().unwrap();

        assert_eq!(loaded, rows);
        assert!(loaded[0].rsi_14.is_none());
        assert!(loaded[25].bb_mid.is_some());
        assert!(!dir.path().join("FNO/D/SBIN.parquet.tmp").exists());
    }

    #[test]
    fn empty_series_is_refused() {
        let dir = TempDir::new().unwrap();
        let store = ParquetStore::new(dir.path());
        assert!(matches!(store.save(&key(), &[]), Err(DataError::EmptySeries)));
        assert!(!store.table_path(&key()).exists());
    }

    #[test]
    fn merge_reports_created_then_unchanged() {
        let dir = TempDir::new().unwrap();
        let store = ParquetStore::new(dir.path());
        let rows = enrich(make_bars(&closes(40)), &IndicatorParams::default());

        let first = store.merge_and_persist(&key(), rows.clone(), 300, None).unwrap();
        assert_eq!(first, MergeOutcome::Written { rows: 40, created: true });

        let second = store.merge_and_persist(&key(), rows, 300, None).unwrap();
        assert_eq!(second, MergeOutcome::Unchanged { rows: 40 });
    }

    #[test]
    fn recompute_rewrites_indicators_over_merged_window() {
        let dir = TempDir::new().unwrap();
        let store = ParquetStore::new(dir.path());
        let params = IndicatorParams::default();
        let bars = make_bars(&closes(60));

        // Stored rows carry no indicators; recompute fills them in
        let plain: Vec<EnrichedBar> = bars[..40].iter().cloned().map(EnrichedBar::plain).collect();
        store.save(&key(), &plain).unwrap();

        let incoming = enrich(bars[40..].to_vec(), &params);
        store
            .merge_and_persist(&key(), incoming, 300, Some(&params))
            .unwrap();

        let loaded = store.load(&key()).unwrap().unwrap();
        assert_eq!(loaded, enrich(bars, &params));
    }

    #[test]
    fn legacy_table_without_indicator_columns_loads() {
        let dir = TempDir::new().unwrap();
        let store = ParquetStore::new(dir.path());
        let rows = enrich(make_bars(&closes(5)), &IndicatorParams::default());

        let df = rows_to_dataframe(&rows).unwrap();
        let mut df = df.drop_many(INDICATOR_COLUMNS);
        let path = store.table_path(&key());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        write_parquet(&mut df, &path).unwrap();

        let loaded = store.load(&key()).unwrap().unwrap();
        assert_eq!(loaded.len(), 5);
        assert!(loaded.iter().all(|r| r.rsi_14.is_none() && r.bb_upper.is_none()));
        assert_eq!(loaded[4].bar, rows[4].bar);
    }

    #[test]
    fn corrupt_table_is_an_error_and_left_in_place() {
        let dir = TempDir::new().unwrap();
        let store = ParquetStore::new(dir.path());
        let path = store.table_path(&key());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"not a parquet file").unwrap();

        let rows = enrich(make_bars(&closes(5)), &IndicatorParams::default());
        assert!(store.merge_and_persist(&key(), rows, 300, None).is_err());
        assert_eq!(fs::read(&path).unwrap(), b"not a parquet file");
    }

    #[test]
    fn status_reports_span() {
        let dir = TempDir::new().unwrap();
        let store = ParquetStore::new(dir.path());
        let rows = enrich(make_bars(&closes(10)), &IndicatorParams::default());
        store.save(&key(), &rows).unwrap();

        let missing = TableKey::new("FNO", Timeframe::Daily, "TCS");
        let status = store.status(&[key(), missing]);
        assert!(status[0].stored);
        assert_eq!(status[0].rows, 10);
        assert_eq!(status[0].first, Some(rows[0].timestamp()));
        assert_eq!(status[0].last, Some(rows[9].timestamp()));
        assert!(!status[1].stored);
        assert!(status[1].error.is_none());
    }
}
