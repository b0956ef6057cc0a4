//! Bar aggregation intervals.
//!
//! The label of each timeframe doubles as its storage directory name
//! (`{root}/{bucket}/{label}/{INSTRUMENT}.parquet`) and as its TOML spelling.

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "15m")]
    Minute15,
    #[serde(rename = "30m")]
    Minute30,
    #[serde(rename = "1H")]
    Hour1,
    #[serde(rename = "4H")]
    Hour4,
    #[serde(rename = "D")]
    Daily,
    #[serde(rename = "W")]
    Weekly,
    #[serde(rename = "M")]
    Monthly,
}

impl Timeframe {
    /// Every timeframe, in the order tasks process them.
    pub const ALL: [Timeframe; 7] = [
        Timeframe::Minute15,
        Timeframe::Minute30,
        Timeframe::Hour1,
        Timeframe::Hour4,
        Timeframe::Daily,
        Timeframe::Weekly,
        Timeframe::Monthly,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::Minute15 => "15m",
            Timeframe::Minute30 => "30m",
            Timeframe::Hour1 => "1H",
            Timeframe::Hour4 => "4H",
            Timeframe::Daily => "D",
            Timeframe::Weekly => "W",
            Timeframe::Monthly => "M",
        }
    }

    /// Nominal length of one bar. Months are approximated as 30 days.
    pub fn nominal_duration(&self) -> chrono::Duration {
        match self {
            Timeframe::Minute15 => chrono::Duration::minutes(15),
            Timeframe::Minute30 => chrono::Duration::minutes(30),
            Timeframe::Hour1 => chrono::Duration::hours(1),
            Timeframe::Hour4 => chrono::Duration::hours(4),
            Timeframe::Daily => chrono::Duration::days(1),
            Timeframe::Weekly => chrono::Duration::weeks(1),
            Timeframe::Monthly => chrono::Duration::days(30),
        }
    }

    pub fn is_intraday(&self) -> bool {
        matches!(
            self,
            Timeframe::Minute15 | Timeframe::Minute30 | Timeframe::Hour1 | Timeframe::Hour4
        )
    }

    /// Start of the bar that contains `ts`, for a session opening `session_open`
    /// after midnight.
    ///
    /// Intraday bars step from the session open. Daily, weekly and monthly bars
    /// are stamped with the session open of their day, Monday, or first of the
    /// month.
    pub fn bar_start(&self, ts: NaiveDateTime, session_open: chrono::Duration) -> NaiveDateTime {
        let midnight = ts
            - chrono::Duration::seconds(i64::from(ts.num_seconds_from_midnight()))
            - chrono::Duration::nanoseconds(i64::from(ts.nanosecond()));

        let day_offset = match self {
            Timeframe::Weekly => i64::from(ts.weekday().num_days_from_monday()),
            Timeframe::Monthly => i64::from(ts.day0()),
            _ => 0,
        };
        let open = midnight - chrono::Duration::days(day_offset) + session_open;
        if !self.is_intraday() {
            return open;
        }

        let step = self.nominal_duration().num_seconds();
        let since_open = (ts - open).num_seconds();
        open + chrono::Duration::seconds(since_open.div_euclid(step) * step)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// Error returned when parsing an unknown timeframe label.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown timeframe '{0}' (expected one of 15m, 30m, 1H, 4H, D, W, M)")]
pub struct ParseTimeframeError(pub String);

impl FromStr for Timeframe {
    type Err = ParseTimeframeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Timeframe::ALL
            .into_iter()
            .find(|tf| tf.label() == s)
            .ok_or_else(|| ParseTimeframeError(s.to_string()))
    }
}
