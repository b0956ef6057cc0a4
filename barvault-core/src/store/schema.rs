//! On-disk table schema.

use polars::prelude::*;

pub const TIMESTAMP: &str = "timestamp";

/// OHLCV columns, all `Float64`.
pub const PRICE_COLUMNS: [&str; 5] = ["open", "high", "low", "close", "volume"];

/// Derived columns, nullable `Float64`. Absent columns load as missing.
pub const INDICATOR_COLUMNS: [&str; 4] = ["rsi_14", "bb_upper", "bb_mid", "bb_lower"];

/// Expected schema for a persisted series.
pub struct TableSchema;

impl TableSchema {
    pub fn timestamp_dtype() -> DataType {
        DataType::Datetime(TimeUnit::Milliseconds, None)
    }

    /// Required columns and their types.
    pub fn required() -> Vec<(&'static str, DataType)> {
        let mut cols = vec![(TIMESTAMP, Self::timestamp_dtype())];
        cols.extend(PRICE_COLUMNS.iter().map(|c| (*c, DataType::Float64)));
        cols
    }

    /// Validate a DataFrame read from disk.
    pub fn validate(df: &DataFrame) -> Result<(), SchemaError> {
        let actual = df.schema();

        for (name, expected) in Self::required() {
            let dtype = actual
                .get(name)
                .ok_or_else(|| SchemaError::MissingColumn(name.to_string()))?;
            if dtype != &expected {
                return Err(SchemaError::TypeMismatch {
                    column: name.to_string(),
                    expected,
                    actual: dtype.clone(),
                });
            }
        }

        for name in INDICATOR_COLUMNS {
            if let Some(dtype) = actual.get(name) {
                if dtype != &DataType::Float64 {
                    return Err(SchemaError::TypeMismatch {
                        column: name.to_string(),
                        expected: DataType::Float64,
                        actual: dtype.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("missing required column: {0}")]
    MissingColumn(String),

    #[error("type mismatch in column {column}: expected {expected:?}, got {actual:?}")]
    TypeMismatch {
        column: String,
        expected: DataType,
        actual: DataType,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timestamp_column() -> Column {
        Column::new(TIMESTAMP.into(), &[1704187500000i64])
            .cast(&TableSchema::timestamp_dtype())
            .unwrap()
    }

    fn price_columns() -> Vec<Column> {
        PRICE_COLUMNS
            .iter()
            .map(|c| Column::new((*c).into(), &[100.0]))
            .collect()
    }

    #[test]
    fn accepts_plain_ohlcv() {
        let mut cols = vec![timestamp_column()];
        cols.extend(price_columns());
        let df = DataFrame::new(cols).unwrap();
        assert!(TableSchema::validate(&df).is_ok());
    }

    #[test]
    fn rejects_missing_column() {
        let df = DataFrame::new(vec![timestamp_column(), Column::new("open".into(), &[1.0])]).unwrap();
        assert!(matches!(
            TableSchema::validate(&df),
            Err(SchemaError::MissingColumn(c)) if c == "high"
        ));
    }

    #[test]
    fn rejects_wrong_indicator_type() {
        let mut cols = vec![timestamp_column()];
        cols.extend(price_columns());
        cols.push(Column::new("rsi_14".into(), &["oops"]));
        let df = DataFrame::new(cols).unwrap();
        assert!(matches!(
            TableSchema::validate(&df),
            Err(SchemaError::TypeMismatch { column, .. }) if column == "rsi_14"
        ));
    }
}
