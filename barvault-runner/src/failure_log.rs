//! Append-only operational log of failed timeframes.
//!
//! One line per failure event:
//! `{timestamp} | {instrument} | {timeframe} | {error}`, with a local
//! timestamp such as `2024-06-03 12:07:45,123`. Successes and no-data skips
//! are never written.

use crate::error::RunnerError;
use crate::task::FailureEvent;
use chrono::NaiveDateTime;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

pub struct FailureLog {
    path: PathBuf,
    file: File,
}

impl FailureLog {
    /// Open (or create) the log for appending.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RunnerError> {
        let path = path.into();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| RunnerError::FailureLog {
                path: path.clone(),
                source,
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| RunnerError::FailureLog {
                path: path.clone(),
                source,
            })?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event stamped with the current local time.
    pub fn append(&mut self, event: &FailureEvent) -> std::io::Result<()> {
        let line = format_line(chrono::Local::now().naive_local(), event);
        writeln!(self.file, "{line}")?;
        self.file.flush()
    }
}

pub fn format_line(at: NaiveDateTime, event: &FailureEvent) -> String {
    format!(
        "{} | {} | {} | {}",
        at.format(TIMESTAMP_FORMAT),
        event.instrument,
        event.timeframe,
        event.error
    )
}
