//! CSV export of a stored series.

use super::schema::{INDICATOR_COLUMNS, PRICE_COLUMNS, TIMESTAMP};
use crate::data::DataError;
use crate::domain::EnrichedBar;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render rows as CSV with a header. Missing indicator values are empty cells.
pub fn export_csv(rows: &[EnrichedBar]) -> Result<String, DataError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let csv_err = |e: csv::Error| DataError::Other(format!("csv write: {e}"));

    let header = std::iter::once(TIMESTAMP)
        .chain(PRICE_COLUMNS)
        .chain(INDICATOR_COLUMNS);
    writer.write_record(header).map_err(csv_err)?;

    for row in rows {
        let bar = &row.bar;
        let mut record = vec![bar.timestamp.format(TIMESTAMP_FORMAT).to_string()];
        record.extend(
            [bar.open, bar.high, bar.low, bar.close, bar.volume]
                .iter()
                .map(f64::to_string),
        );
        record.extend(
            [row.rsi_14, row.bb_upper, row.bb_mid, row.bb_lower]
                .iter()
                .map(|v| v.map(|v| v.to_string()).unwrap_or_default()),
        );
        writer.write_record(&record).map_err(csv_err)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| DataError::Other(format!("csv flush: {e}")))?;
    String::from_utf8(bytes).map_err(|e| DataError::Other(format!("csv encoding: {e}")))
}
