//! The fetch task: one instrument, every timeframe of its bucket.
//!
//! Each timeframe is fetched, normalized, enriched, and merged into its
//! table independently. A failure on one timeframe is recorded and the task
//! moves on to the next; nothing escapes the task as an error.

use barvault_core::config::{BucketConfig, CollectorConfig};
use barvault_core::data::{BarProvider, DataError, ProviderFactory};
use barvault_core::domain::{EnrichedBar, Timeframe};
use barvault_core::indicators::enrich;
use barvault_core::store::{normalize, MergeOutcome, ParquetStore, TableKey};
use std::sync::Arc;
use tracing::{debug, warn};

/// One unit of work: an instrument within a bucket.
#[derive(Debug, Clone)]
pub struct Job {
    pub instrument: String,
    pub bucket: Arc<BucketConfig>,
}

impl Job {
    /// Every (instrument, bucket) pair, buckets in declared order.
    pub fn worklist(config: &CollectorConfig) -> Vec<Job> {
        config
            .buckets
            .iter()
            .flat_map(|bucket| {
                let bucket = Arc::new(bucket.clone());
                bucket
                    .instruments
                    .iter()
                    .map(|instrument| Job {
                        instrument: instrument.clone(),
                        bucket: Arc::clone(&bucket),
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

/// Shared, read-only state every task runs against.
pub struct TaskContext {
    pub config: Arc<CollectorConfig>,
    pub store: ParquetStore,
    pub providers: Arc<dyn ProviderFactory>,
}

impl TaskContext {
    pub fn new(config: Arc<CollectorConfig>, providers: Arc<dyn ProviderFactory>) -> Self {
        let store = ParquetStore::new(config.root_dir.clone());
        Self {
            config,
            store,
            providers,
        }
    }
}

/// Result of one timeframe.
#[derive(Debug, Clone)]
pub enum TimeframeOutcome {
    Updated { rows: usize, created: bool },
    Unchanged { rows: usize },
    NoData,
    Failed(DataError),
}

impl From<MergeOutcome> for TimeframeOutcome {
    fn from(outcome: MergeOutcome) -> Self {
        match outcome {
            MergeOutcome::Written { rows, created } => TimeframeOutcome::Updated { rows, created },
            MergeOutcome::Unchanged { rows } => TimeframeOutcome::Unchanged { rows },
        }
    }
}

/// A failed timeframe, as written to the failure log.
#[derive(Debug, Clone)]
pub struct FailureEvent {
    pub instrument: String,
    pub timeframe: Timeframe,
    pub error: DataError,
}

#[derive(Debug, Clone)]
pub struct TaskReport {
    pub instrument: String,
    pub bucket: String,
    pub label: String,
    /// One entry per configured timeframe, in declared order.
    pub outcomes: Vec<(Timeframe, TimeframeOutcome)>,
}

impl TaskReport {
    /// Console line printed when the task finishes, whatever its outcomes.
    pub fn completion_token(&self) -> String {
        format!("✅ {} {}", self.label, self.instrument)
    }

    pub fn failures(&self) -> impl Iterator<Item = FailureEvent> + '_ {
        self.outcomes.iter().filter_map(|(tf, outcome)| match outcome {
            TimeframeOutcome::Failed(error) => Some(FailureEvent {
                instrument: self.instrument.clone(),
                timeframe: *tf,
                error: error.clone(),
            }),
            _ => None,
        })
    }
}

/// Run every timeframe of `job`. Never fails; errors become outcomes.
pub fn run_task(job: &Job, ctx: &TaskContext) -> TaskReport {
    let bucket = &job.bucket;
    let mut report = TaskReport {
        instrument: job.instrument.clone(),
        bucket: bucket.name.clone(),
        label: bucket.label.clone(),
        outcomes: Vec::with_capacity(bucket.timeframes.len()),
    };

    let provider = match ctx.providers.connect() {
        Ok(provider) => provider,
        Err(error) => {
            warn!(instrument = %job.instrument, bucket = %bucket.name, %error, "provider connection failed");
            report.outcomes = bucket
                .timeframes
                .iter()
                .map(|tf| (*tf, TimeframeOutcome::Failed(error.clone())))
                .collect();
            return report;
        }
    };

    for &timeframe in &bucket.timeframes {
        let outcome = match fetch_and_store(provider.as_ref(), job, timeframe, ctx) {
            Ok(Some(merged)) => merged.into(),
            Ok(None) => {
                debug!(instrument = %job.instrument, %timeframe, "no data");
                TimeframeOutcome::NoData
            }
            Err(error) => {
                warn!(instrument = %job.instrument, %timeframe, %error, "timeframe failed");
                TimeframeOutcome::Failed(error)
            }
        };
        report.outcomes.push((timeframe, outcome));
    }

    report
}

/// `Ok(None)` when the source has nothing for this timeframe.
fn fetch_and_store(
    provider: &dyn BarProvider,
    job: &Job,
    timeframe: Timeframe,
    ctx: &TaskContext,
) -> Result<Option<MergeOutcome>, DataError> {
    let config = &ctx.config;
    let window = config.window;

    let Some(bars) = provider.fetch(&job.instrument, &config.exchange, timeframe, window)? else {
        return Ok(None);
    };
    if bars.is_empty() {
        return Ok(None);
    }

    let bars = normalize(bars, window);
    let rows = if job.bucket.enrich {
        enrich(bars, &config.indicators)
    } else {
        bars.into_iter().map(EnrichedBar::plain).collect()
    };

    let key = TableKey::new(&job.bucket.dir, timeframe, &job.instrument);
    let recompute = (config.recompute_on_merge && job.bucket.enrich).then_some(&config.indicators);
    ctx.store
        .merge_and_persist(&key, rows, window, recompute)
        .map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(outcomes: Vec<(Timeframe, TimeframeOutcome)>) -> TaskReport {
        TaskReport {
            instrument: "SBIN".into(),
            bucket: "fno".into(),
            label: "FNO".into(),
            outcomes,
        }
    }

    #[test]
    fn completion_token_ignores_outcomes() {
        let r = report(vec![(
            Timeframe::Daily,
            TimeframeOutcome::Failed(DataError::EmptySeries),
        )]);
        assert_eq!(r.completion_token(), "✅ FNO SBIN");
    }

    #[test]
    fn failures_yield_only_failed_timeframes() {
        let r = report(vec![
            (Timeframe::Minute15, TimeframeOutcome::NoData),
            (
                Timeframe::Hour1,
                TimeframeOutcome::Failed(DataError::RateLimited {
                    retry_after_secs: 60,
                }),
            ),
            (Timeframe::Daily, TimeframeOutcome::Unchanged { rows: 300 }),
        ]);
        let failures: Vec<_> = r.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].timeframe, Timeframe::Hour1);
        assert_eq!(failures[0].instrument, "SBIN");
    }

    #[test]
    fn worklist_has_one_job_per_instrument_and_bucket() {
        let config = CollectorConfig::default_indices();
        let jobs = Job::worklist(&config);
        assert_eq!(jobs.len(), config.job_count());
        assert_eq!(jobs[0].instrument, "NIFTY");
        assert_eq!(jobs[0].bucket.dir, "broader_index");
        assert_eq!(jobs.last().unwrap().bucket.dir, "sector_index");
    }
}
