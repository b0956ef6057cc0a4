//! Cycle scheduler.
//!
//! Continuous mode repeats Begin-Cycle → Dispatch → Wait forever (or until
//! `max_cycles` or the stop flag). Each cycle dispatches a shuffled copy of
//! the worklist, and the wait is whatever remains of the target interval; a
//! cycle that overruns is followed immediately by the next. Single-shot mode
//! runs one unshuffled cycle and returns.

use crate::dispatch::{BatchSummary, WorkerPool};
use crate::error::RunnerError;
use crate::failure_log::FailureLog;
use crate::task::{Job, TaskContext, TaskReport};
use barvault_core::config::CollectorConfig;
use barvault_core::data::ProviderFactory;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Longest single sleep while waiting, so a stop request is noticed promptly.
const WAIT_SLICE: Duration = Duration::from_millis(100);

/// Time left until the next cycle should start.
pub fn pacing_delay(target: Duration, elapsed: Duration) -> Duration {
    target.saturating_sub(elapsed)
}

/// Receives console-level progress from the scheduler.
pub trait CycleReporter {
    /// Called once before the first cycle.
    fn on_start(&self, name: &str);

    /// Called for every finished task, in completion order.
    fn on_task_complete(&self, report: &TaskReport);

    /// Called after every cycle.
    fn on_cycle_complete(&self, cycle: u64, summary: &BatchSummary);

    /// Called when a single-shot run is done.
    fn on_single_shot_done(&self, name: &str);
}

/// Prints banners and completion tokens to stdout.
pub struct StdoutReporter;

impl CycleReporter for StdoutReporter {
    fn on_start(&self, name: &str) {
        println!("🚀 {name} Collector Started");
    }

    fn on_task_complete(&self, report: &TaskReport) {
        println!("{}", report.completion_token());
    }

    fn on_cycle_complete(&self, _cycle: u64, _summary: &BatchSummary) {}

    fn on_single_shot_done(&self, name: &str) {
        println!("✅ {name} Collection Cycle Completed");
    }
}

pub struct Scheduler {
    ctx: Arc<TaskContext>,
    pool: WorkerPool,
    failure_log: FailureLog,
    worklist: Vec<Job>,
    rng: StdRng,
    interval: Duration,
    stop: Arc<AtomicBool>,
    reporter: Box<dyn CycleReporter>,
}

impl Scheduler {
    /// Build the pool, open the failure log, and create the storage tree.
    pub fn new(
        config: Arc<CollectorConfig>,
        providers: Arc<dyn ProviderFactory>,
    ) -> Result<Self, RunnerError> {
        config.validate()?;
        config.ensure_dirs()?;

        let pool = WorkerPool::new(config.max_workers)?;
        let failure_log = FailureLog::open(&config.log_file)?;
        let worklist = Job::worklist(&config);
        let rng = match config.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            interval: config.interval(),
            ctx: Arc::new(TaskContext::new(config, providers)),
            pool,
            failure_log,
            worklist,
            rng,
            stop: Arc::new(AtomicBool::new(false)),
            reporter: Box::new(StdoutReporter),
        })
    }

    pub fn with_reporter(mut self, reporter: Box<dyn CycleReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Override the configured cadence.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Flag that ends continuous mode at the next cycle boundary.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn worklist(&self) -> &[Job] {
        &self.worklist
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// One unshuffled cycle, then the completion banner.
    pub fn run_once(&mut self) -> BatchSummary {
        let name = self.ctx.config.name.clone();
        self.reporter.on_start(&name);
        let summary = self.run_cycle(1, false);
        self.reporter.on_single_shot_done(&name);
        summary
    }

    /// Cycle until stopped or `max_cycles` is reached. Returns cycles run.
    pub fn run_continuous(&mut self, max_cycles: Option<u64>) -> u64 {
        self.reporter.on_start(&self.ctx.config.name);

        let mut cycles = 0u64;
        loop {
            if self.stopped() || max_cycles.is_some_and(|max| cycles >= max) {
                break;
            }

            let started = Instant::now();
            cycles += 1;
            self.run_cycle(cycles, true);

            if max_cycles.is_some_and(|max| cycles >= max) {
                break;
            }
            self.wait(pacing_delay(self.interval, started.elapsed()));
        }
        cycles
    }

    /// The jobs for one cycle: a copy of the worklist, shuffled on request.
    fn cycle_jobs(&mut self, shuffle: bool) -> Vec<Job> {
        let mut jobs = self.worklist.clone();
        if shuffle {
            jobs.shuffle(&mut self.rng);
        }
        jobs
    }

    fn run_cycle(&mut self, cycle: u64, shuffle: bool) -> BatchSummary {
        let jobs = self.cycle_jobs(shuffle);
        let reporter = &self.reporter;
        let failure_log = &mut self.failure_log;

        let summary = self.pool.run_batch(jobs, &self.ctx, |report| {
            reporter.on_task_complete(&report);
            for event in report.failures() {
                if let Err(e) = failure_log.append(&event) {
                    warn!(log = %failure_log.path().display(), error = %e, "failed to append failure log");
                }
            }
        });

        info!(
            cycle,
            submitted = summary.submitted,
            completed = summary.completed,
            updated = summary.timeframes_updated,
            unchanged = summary.timeframes_unchanged,
            no_data = summary.timeframes_no_data,
            failed = summary.timeframes_failed,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "cycle complete"
        );
        if summary.lost() > 0 {
            warn!(cycle, lost = summary.lost(), "tasks ended without reporting");
        }

        self.reporter.on_cycle_complete(cycle, &summary);
        summary
    }

    fn wait(&self, delay: Duration) {
        let deadline = Instant::now() + delay;
        while !self.stopped() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep((deadline - now).min(WAIT_SLICE));
        }
    }
}
