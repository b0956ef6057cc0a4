//! Persistent series storage

pub mod export;
pub mod merge;
pub mod parquet;
pub mod schema;

pub use export::export_csv;
pub use merge::{fingerprint, merge, normalize};
pub use parquet::{MergeOutcome, ParquetStore, TableKey, TableStatus};
pub use schema::{SchemaError, TableSchema};
