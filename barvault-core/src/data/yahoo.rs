//! Yahoo Finance data provider.
//!
//! Fetches OHLCV bars from Yahoo's v8 chart API. Exchange ids map to Yahoo
//! ticker suffixes (`NSE` → `.NS`, `BSE` → `.BO`); index names that Yahoo
//! spells differently go through the alias table (`NIFTY` → `^NSEI`).
//!
//! Yahoo has no 4-hour interval, so `4H` is fetched as 60-minute bars and
//! resampled. There are no retries here: a failed fetch surfaces as an error
//! and the next collection cycle is the retry.

use super::provider::{BarProvider, DataError, ProviderFactory};
use super::resample::resample_intraday;
use crate::domain::{Bar, Timeframe};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// NSE cash session is 09:15–15:30.
const SESSION_MINUTES: i64 = 375;

/// Session open, in minutes after midnight exchange time.
const SESSION_OPEN_MINUTES: i64 = 9 * 60 + 15;

/// Yahoo only serves this much history for sub-hourly intervals.
const MAX_SUBHOURLY_DAYS: i64 = 59;

/// ... and this much for hourly.
const MAX_HOURLY_DAYS: i64 = 729;

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

/// Yahoo Finance data provider. One instance per fetch task.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    aliases: BTreeMap<String, String>,
}

impl YahooProvider {
    pub fn new(timeout: Duration, aliases: BTreeMap<String, String>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::NetworkUnreachable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, aliases })
    }

    /// Yahoo ticker for an instrument on an exchange.
    fn ticker(&self, instrument: &str, exchange: &str) -> Result<String, DataError> {
        if let Some(alias) = self.aliases.get(instrument) {
            return Ok(alias.clone());
        }
        let suffix = match exchange {
            "NSE" => ".NS",
            "BSE" => ".BO",
            other => return Err(DataError::UnsupportedExchange(other.to_string())),
        };
        Ok(format!("{}{suffix}", instrument.replace('_', "-")))
    }

    /// Build the chart API URL.
    fn chart_url(ticker: &str, interval: &str, period1: i64, period2: i64) -> String {
        format!(
            "https://query2.finance.yahoo.com/v8/finance/chart/{ticker}\
             ?period1={period1}&period2={period2}&interval={interval}\
             &includePrePost=false"
        )
    }

    /// Parse the chart API response into bars stamped with exchange-local time.
    ///
    /// An empty result set is `Ok(None)`, not an error.
    fn parse_response(symbol: &str, resp: ChartResponse) -> Result<Option<Vec<Bar>>, DataError> {
        let result = match resp.chart.result {
            Some(result) => result,
            None => {
                return match resp.chart.error {
                    Some(err) if err.code == "Not Found" => Err(DataError::SymbolNotFound {
                        symbol: symbol.to_string(),
                    }),
                    Some(err) => Err(DataError::ResponseFormatChanged(format!(
                        "{}: {}",
                        err.code, err.description
                    ))),
                    None => Ok(None),
                };
            }
        };

        let Some(data) = result.into_iter().next() else {
            return Ok(None);
        };
        let Some(timestamps) = data.timestamp else {
            return Ok(None);
        };
        let offset = data.meta.and_then(|m| m.gmtoffset).unwrap_or(0);

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

        let mut bars = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let timestamp = chrono::DateTime::from_timestamp(ts + offset, 0)
                .map(|dt| dt.naive_utc())
                .ok_or_else(|| DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}")))?;

            let open = quote.open.get(i).copied().flatten();
            let high = quote.high.get(i).copied().flatten();
            let low = quote.low.get(i).copied().flatten();
            let close = quote.close.get(i).copied().flatten();
            let volume = quote.volume.get(i).copied().flatten();

            // Skip rows where all OHLC are missing (halts, holidays)
            if open.is_none() && high.is_none() && low.is_none() && close.is_none() {
                continue;
            }

            bars.push(Bar {
                timestamp,
                open: open.unwrap_or(f64::NAN),
                high: high.unwrap_or(f64::NAN),
                low: low.unwrap_or(f64::NAN),
                close: close.unwrap_or(f64::NAN),
                volume: volume.unwrap_or(0.0),
            });
        }

        Ok((!bars.is_empty()).then_some(bars))
    }

    fn get_chart(&self, symbol: &str, url: &str) -> Result<ChartResponse, DataError> {
        let resp = self.client.get(url).send().map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                DataError::NetworkUnreachable(e.to_string())
            } else {
                DataError::Other(format!("request failed for {symbol}: {e}"))
            }
        })?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(DataError::RateLimited {
                retry_after_secs: retry_after,
            });
        }
        // Yahoo answers unknown tickers with 404 and a JSON error body
        if !status.is_success() && status != reqwest::StatusCode::NOT_FOUND {
            return Err(DataError::Other(format!("HTTP {status} for {symbol}")));
        }

        resp.json().map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
        })
    }
}

/// Yahoo interval string, the timeframe it delivers, and how many of its bars
/// make one requested bar.
fn yahoo_interval(timeframe: Timeframe) -> (&'static str, Timeframe, usize) {
    match timeframe {
        Timeframe::Hour4 => ("60m", Timeframe::Hour1, 4),
        Timeframe::Minute15 => ("15m", timeframe, 1),
        Timeframe::Minute30 => ("30m", timeframe, 1),
        Timeframe::Hour1 => ("60m", timeframe, 1),
        Timeframe::Daily => ("1d", timeframe, 1),
        Timeframe::Weekly => ("1wk", timeframe, 1),
        Timeframe::Monthly => ("1mo", timeframe, 1),
    }
}

/// Re-stamp bars with the start of their period and keep one bar per period.
///
/// Yahoo stamps the still-forming bar with the latest quote time, so the live
/// row drifts from cycle to cycle. When a response holds several rows for one
/// period, the later row wins. Output is sorted.
fn align_to_periods(bars: Vec<Bar>, timeframe: Timeframe) -> Vec<Bar> {
    let session_open = chrono::Duration::minutes(SESSION_OPEN_MINUTES);
    let mut by_start = BTreeMap::new();
    for mut bar in bars {
        bar.timestamp = timeframe.bar_start(bar.timestamp, session_open);
        by_start.insert(bar.timestamp, bar);
    }
    by_start.into_values().collect()
}

/// Calendar look-back that should cover `max_bars` bars, clamped to what Yahoo
/// serves for the interval.
fn lookback(timeframe: Timeframe, max_bars: usize) -> chrono::Duration {
    let bars = max_bars.max(1) as i64;
    let days = match timeframe {
        Timeframe::Minute15 | Timeframe::Minute30 | Timeframe::Hour1 | Timeframe::Hour4 => {
            let minutes = timeframe.nominal_duration().num_minutes();
            let per_session = (SESSION_MINUTES + minutes - 1) / minutes;
            let sessions = (bars + per_session - 1) / per_session;
            let days = sessions * 7 / 5 + 5;
            let cap = if minutes < 60 {
                MAX_SUBHOURLY_DAYS
            } else {
                MAX_HOURLY_DAYS
            };
            days.min(cap)
        }
        Timeframe::Daily => bars * 7 / 5 + 10,
        Timeframe::Weekly => bars * 7 + 14,
        Timeframe::Monthly => bars * 31 + 31,
    };
    chrono::Duration::days(days)
}

impl BarProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(
        &self,
        instrument: &str,
        exchange: &str,
        timeframe: Timeframe,
        max_bars: usize,
    ) -> Result<Option<Vec<Bar>>, DataError> {
        let ticker = self.ticker(instrument, exchange)?;
        let (interval, delivered, per_bar) = yahoo_interval(timeframe);

        let now = chrono::Utc::now();
        let start = now - lookback(timeframe, max_bars);
        let url = Self::chart_url(&ticker, interval, start.timestamp(), now.timestamp());

        debug!(%ticker, interval, %timeframe, max_bars, "chart request");
        let chart = self.get_chart(&ticker, &url)?;
        let Some(bars) = Self::parse_response(&ticker, chart)? else {
            return Ok(None);
        };

        let mut bars = align_to_periods(bars, delivered);
        if per_bar > 1 {
            bars = resample_intraday(&bars, per_bar);
        }
        Ok(Some(bars))
    }
}

/// Factory handing each task its own Yahoo client.
#[derive(Debug, Clone)]
pub struct YahooFactory {
    pub timeout: Duration,
    pub aliases: BTreeMap<String, String>,
}

impl ProviderFactory for YahooFactory {
    fn connect(&self) -> Result<Box<dyn BarProvider>, DataError> {
        Ok(Box::new(YahooProvider::new(self.timeout, self.aliases.clone())?))
    }
}
