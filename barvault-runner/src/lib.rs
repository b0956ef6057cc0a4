//! BarVault Runner: fetch tasks, worker pool dispatch, cycle scheduling.
//!
//! This crate builds on `barvault-core` to provide:
//! - The per-instrument fetch task with per-timeframe failure isolation
//! - A bounded worker pool that reports results in completion order
//! - Continuous and single-shot cycle scheduling with shuffle and pacing
//! - The append-only failure log

pub mod dispatch;
pub mod error;
pub mod failure_log;
pub mod scheduler;
pub mod task;

pub use dispatch::{BatchSummary, WorkerPool};
pub use error::RunnerError;
pub use failure_log::FailureLog;
pub use scheduler::{pacing_delay, CycleReporter, Scheduler, StdoutReporter};
pub use task::{run_task, FailureEvent, Job, TaskContext, TaskReport, TimeframeOutcome};
