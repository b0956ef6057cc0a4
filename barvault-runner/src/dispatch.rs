//! Bounded worker pool.
//!
//! A fixed-size rayon pool built once and reused for every cycle. Each job
//! runs as its own pool task and sends its report back over a channel, so the
//! caller sees reports in completion order rather than submission order.

use crate::error::RunnerError;
use crate::task::{run_task, Job, TaskContext, TaskReport, TimeframeOutcome};
use std::any::Any;
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};
use tracing::error;

/// Counters for one dispatched batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub submitted: usize,
    pub completed: usize,
    pub timeframes_updated: usize,
    pub timeframes_unchanged: usize,
    pub timeframes_no_data: usize,
    pub timeframes_failed: usize,
    pub elapsed: Duration,
}

impl BatchSummary {
    fn record(&mut self, report: &TaskReport) {
        self.completed += 1;
        for (_, outcome) in &report.outcomes {
            match outcome {
                TimeframeOutcome::Updated { .. } => self.timeframes_updated += 1,
                TimeframeOutcome::Unchanged { .. } => self.timeframes_unchanged += 1,
                TimeframeOutcome::NoData => self.timeframes_no_data += 1,
                TimeframeOutcome::Failed(_) => self.timeframes_failed += 1,
            }
        }
    }

    /// Tasks that never reported (panicked).
    pub fn lost(&self) -> usize {
        self.submitted.saturating_sub(self.completed)
    }
}

pub struct WorkerPool {
    pool: rayon::ThreadPool,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Result<Self, RunnerError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("barvault-worker-{i}"))
            .panic_handler(|payload| {
                error!(panic = %panic_message(&payload), "fetch task panicked");
            })
            .build()?;
        Ok(Self { pool })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run every job and hand each report to `on_complete` as it arrives.
    ///
    /// Blocks until all tasks have reported or died.
    pub fn run_batch(
        &self,
        jobs: Vec<Job>,
        ctx: &Arc<TaskContext>,
        mut on_complete: impl FnMut(TaskReport),
    ) -> BatchSummary {
        let start = Instant::now();
        let mut summary = BatchSummary {
            submitted: jobs.len(),
            ..Default::default()
        };

        let (tx, rx) = mpsc::channel();
        for job in jobs {
            let tx = tx.clone();
            let ctx = Arc::clone(ctx);
            self.pool.spawn(move || {
                let report = run_task(&job, &ctx);
                // Receiver outlives every sender
                let _ = tx.send(report);
            });
        }
        drop(tx);

        for report in rx {
            summary.record(&report);
            on_complete(report);
        }

        summary.elapsed = start.elapsed();
        summary
    }
}

fn panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
