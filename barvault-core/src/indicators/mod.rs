//! Indicator engine.
//!
//! Pure functions over a close-price sequence. `enrich` attaches the derived
//! columns (`rsi_14`, `bb_upper`, `bb_mid`, `bb_lower`) to a bar slice; the
//! values are computed over exactly the bars passed in.

pub mod bollinger;
pub mod rsi;

pub use bollinger::{Bollinger, BollingerBands};
pub use rsi::Rsi;

use crate::domain::{Bar, EnrichedBar};
use serde::{Deserialize, Serialize};

/// Indicator parameters shared by every enriched bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorParams {
    pub rsi_period: usize,
    pub bb_period: usize,
    pub bb_k: f64,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            bb_period: 20,
            bb_k: 2.0,
        }
    }
}

/// Compute every derived column over `bars` and attach it row by row.
pub fn enrich(bars: Vec<Bar>, params: &IndicatorParams) -> Vec<EnrichedBar> {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let rsi = Rsi::new(params.rsi_period).compute(&closes);
    let bands = Bollinger::new(params.bb_period, params.bb_k).compute(&closes);

    bars.into_iter()
        .enumerate()
        .map(|(i, bar)| EnrichedBar {
            bar,
            rsi_14: rsi[i],
            bb_upper: bands.upper[i],
            bb_mid: bands.mid[i],
            bb_lower: bands.lower[i],
        })
        .collect()
}

/// Drop stale derived columns and recompute them over the given rows.
pub fn recompute(rows: Vec<EnrichedBar>, params: &IndicatorParams) -> Vec<EnrichedBar> {
    enrich(rows.into_iter().map(|r| r.bar).collect(), params)
}

/// Create synthetic bars from close prices for testing.
///
/// Generates plausible OHLV: open = prev_close (or close for first bar),
/// high = max(open,close) + 1.0, low = min(open,close) - 1.0, volume = 1000.
/// Timestamps are consecutive days starting 2024-01-02 09:15.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    let base = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(9, 15, 0)
        .unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                timestamp: base + chrono::Duration::days(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
