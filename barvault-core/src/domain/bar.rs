//! Bar, the fundamental market data unit.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// OHLCV bar for a single instrument at a single timestamp.
///
/// The timestamp is the exchange-local wall clock reported by the source and
/// is the unique key of a bar within one (instrument, timeframe) series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// A bar plus the derived indicator columns persisted alongside it.
///
/// Derived columns are snapshots computed over the slice the bar was fetched
/// with; `None` means the indicator was undefined at that row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedBar {
    pub bar: Bar,
    pub rsi_14: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_mid: Option<f64>,
    pub bb_lower: Option<f64>,
}

impl EnrichedBar {
    /// Wrap a bar with every derived column missing.
    pub fn plain(bar: Bar) -> Self {
        Self {
            bar,
            rsi_14: None,
            bb_upper: None,
            bb_mid: None,
            bb_lower: None,
        }
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.bar.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_bar() -> Bar {
        Bar {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(9, 15, 0)
                .unwrap(),
            open: 100.0,
            high: 105.0,
            low: 98.0,
            close: 103.0,
            volume: 50_000.0,
        }
    }

    #[test]
    fn plain_enriched_bar_has_no_indicators() {
        let row = EnrichedBar::plain(sample_bar());
        assert_eq!(row.timestamp(), sample_bar().timestamp);
        assert!(row.rsi_14.is_none());
        assert!(row.bb_upper.is_none() && row.bb_mid.is_none() && row.bb_lower.is_none());
    }

    #[test]
    fn bar_serialization_roundtrip() {
        let bar = sample_bar();
        let json = serde_json::to_string(&bar).unwrap();
        let deser: Bar = serde_json::from_str(&json).unwrap();
        assert_eq!(bar, deser);
    }
}
