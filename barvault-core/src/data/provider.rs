//! Data provider traits and structured error types.
//!
//! `BarProvider` abstracts over market-data sources so the fetch task can be
//! driven by Yahoo Finance, synthetic data, or a mock in tests. A provider is a
//! connection-like capability: `ProviderFactory::connect` builds a fresh one
//! inside each task and it is never shared between concurrent tasks.

use crate::domain::{Bar, Timeframe};
use thiserror::Error;

/// Structured error types for fetch and persistence operations.
///
/// "No data" is not an error: providers report it as `Ok(None)` or an empty
/// vector.
#[derive(Debug, Clone, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("unsupported exchange '{0}'")]
    UnsupportedExchange(String),

    #[error("store error: {0}")]
    StoreError(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("refusing to persist an empty series")]
    EmptySeries,

    #[error("data error: {0}")]
    Other(String),
}

/// Trait for data providers (Yahoo Finance, synthetic, mocks).
///
/// Implementations may hold non-thread-safe session state, so only `Send` is
/// required.
pub trait BarProvider: Send {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch up to `max_bars` of the most recent bars for an instrument.
    ///
    /// Returns `Ok(None)` (or an empty vector) when the source has no data.
    /// Bars may come back unsorted or longer than requested; callers
    /// normalize them.
    fn fetch(
        &self,
        instrument: &str,
        exchange: &str,
        timeframe: Timeframe,
        max_bars: usize,
    ) -> Result<Option<Vec<Bar>>, DataError>;
}

/// Builds one provider connection per fetch task.
pub trait ProviderFactory: Send + Sync {
    fn connect(&self) -> Result<Box<dyn BarProvider>, DataError>;
}
