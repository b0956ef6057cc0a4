//! Intraday resampling for timeframes the upstream source does not serve
//! directly (4H is built from 1H bars).

use crate::domain::Bar;

/// Aggregate consecutive bars into groups of `per_group` within each trading
/// day. The first group of a day is anchored at the day's first bar; the last
/// group of a day may be partial.
///
/// Input must be sorted ascending. Each output bar takes the timestamp and open
/// of its first member, the close of its last, the extreme high/low, and the
/// summed volume.
pub fn resample_intraday(bars: &[Bar], per_group: usize) -> Vec<Bar> {
    if per_group <= 1 {
        return bars.to_vec();
    }

    let mut out = Vec::with_capacity(bars.len() / per_group + 1);
    let mut start = 0;
    while start < bars.len() {
        let day = bars[start].timestamp.date();
        let day_end = bars[start..]
            .iter()
            .position(|b| b.timestamp.date() != day)
            .map_or(bars.len(), |offset| start + offset);

        for chunk in bars[start..day_end].chunks(per_group) {
            out.push(aggregate(chunk));
        }
        start = day_end;
    }
    out
}

fn aggregate(chunk: &[Bar]) -> Bar {
    let first = &chunk[0];
    let last = &chunk[chunk.len() - 1];
    Bar {
        timestamp: first.timestamp,
        open: first.open,
        high: chunk.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max),
        low: chunk.iter().map(|b| b.low).fold(f64::INFINITY, f64::min),
        close: last.close,
        volume: chunk.iter().map(|b| b.volume).sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn hourly_session(day: u32) -> Vec<Bar> {
        // NSE session: 09:15 .. 15:30 → 7 hourly bars (last one partial)
        (0..7)
            .map(|h| {
                let base = 100.0 + h as f64;
                Bar {
                    timestamp: at(day, 9 + h, 15),
                    open: base,
                    high: base + 2.0,
                    low: base - 1.0,
                    close: base + 0.5,
                    volume: 10.0,
                }
            })
            .collect()
    }

    #[test]
    fn groups_of_four_within_a_day() {
        let out = resample_intraday(&hourly_session(4), 4);
        assert_eq!(out.len(), 2);

        assert_eq!(out[0].timestamp, at(4, 9, 15));
        assert_eq!(out[0].open, 100.0);
        assert_eq!(out[0].close, 103.5);
        assert_eq!(out[0].high, 105.0);
        assert_eq!(out[0].low, 99.0);
        assert_eq!(out[0].volume, 40.0);

        // Partial trailing group: 13:15, 14:15, 15:15
        assert_eq!(out[1].timestamp, at(4, 13, 15));
        assert_eq!(out[1].volume, 30.0);
    }

    #[test]
    fn groups_never_span_days() {
        let mut bars = hourly_session(4);
        bars.extend(hourly_session(5));
        let out = resample_intraday(&bars, 4);
        assert_eq!(out.len(), 4);
        assert_eq!(out[2].timestamp, at(5, 9, 15));
    }

    #[test]
    fn group_of_one_is_identity() {
        let bars = hourly_session(4);
        assert_eq!(resample_intraday(&bars, 1), bars);
    }

    #[test]
    fn empty_input() {
        assert!(resample_intraday(&[], 4).is_empty());
    }
}
