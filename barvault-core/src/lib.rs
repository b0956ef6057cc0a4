//! BarVault Core: bar types, indicators, providers, and the series store.
//!
//! This crate holds everything a single fetch touches:
//! - Domain types (bars, enriched rows, timeframes)
//! - RSI and Bollinger Band computation
//! - Provider traits with Yahoo Finance and synthetic implementations
//! - The merge-dedup-trim Parquet store
//! - Collector configuration

pub mod config;
pub mod data;
pub mod domain;
pub mod indicators;
pub mod store;
