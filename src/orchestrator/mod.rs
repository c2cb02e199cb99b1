//! Batch orchestration of collection jobs.
//!
//! A run has two passes. The first pass attempts every selected job; once it
//! has completed for all of them, the second pass re-runs exactly the jobs
//! that failed. No job is attempted more than twice and the second attempt
//! of a location never overlaps its first.
//!
//! Jobs are independent: each one touches only its own location's series,
//! and a failure (error, panic or timeout inside a collector) is recorded on
//! that job alone.

pub mod report;

#[cfg(test)]
pub mod tests;

pub use report::{BatchReport, JobResult};

use crate::collector::Collector;
use crate::config::{BatchConfig, RunMode};
use crate::error::{IngestError, Result};
use crate::runner::{CollectorRunner, RunOutcome};

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Attempts per job: the first pass plus one retry
pub const MAX_ATTEMPTS: u32 = 2;

/// Lifecycle of one job within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// One location and the collector that feeds it
pub struct CollectionJob {
    collector: Arc<dyn Collector>,
    state: JobState,
    attempts: u32,
    last_outcome: Option<RunOutcome>,
}

impl CollectionJob {
    pub fn new(collector: Arc<dyn Collector>) -> Self {
        Self {
            collector,
            state: JobState::Pending,
            attempts: 0,
            last_outcome: None,
        }
    }

    pub fn location(&self) -> &str {
        self.collector.location()
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_outcome(&self) -> Option<&RunOutcome> {
        self.last_outcome.as_ref()
    }

    /// Move to `Running`; allowed from `Pending`, or from `Failed` while
    /// attempts remain
    pub fn start(&mut self) -> Result<()> {
        let allowed = match self.state {
            JobState::Pending => true,
            JobState::Failed => self.attempts < MAX_ATTEMPTS,
            JobState::Running | JobState::Succeeded => false,
        };
        if !allowed {
            return Err(self.transition_error(JobState::Running));
        }

        self.state = JobState::Running;
        self.attempts += 1;
        Ok(())
    }

    /// Record the outcome of the running attempt
    pub fn finish(&mut self, outcome: RunOutcome) -> Result<()> {
        let next = if outcome.is_success() {
            JobState::Succeeded
        } else {
            JobState::Failed
        };
        if self.state != JobState::Running {
            return Err(self.transition_error(next));
        }

        self.state = next;
        self.last_outcome = Some(outcome);
        Ok(())
    }

    fn transition_error(&self, next: JobState) -> IngestError {
        IngestError::Task {
            reason: format!(
                "job for {} cannot go from {} to {} after {} attempts",
                self.location(),
                self.state,
                next,
                self.attempts
            ),
        }
    }

    fn into_result(self) -> JobResult {
        JobResult {
            location: self.location().to_string(),
            outcome: self.last_outcome.unwrap_or(RunOutcome::NoData),
            attempts: self.attempts,
        }
    }
}

impl fmt::Debug for CollectionJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionJob")
            .field("location", &self.location())
            .field("state", &self.state)
            .field("attempts", &self.attempts)
            .field("last_outcome", &self.last_outcome)
            .finish()
    }
}

/// Jobs of one run, at most one per location
#[derive(Debug, Default)]
pub struct JobSet {
    jobs: Vec<CollectionJob>,
    locations: HashSet<String>,
}

impl JobSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a job; a second job for the same location is refused
    pub fn push(&mut self, collector: Arc<dyn Collector>) -> Result<()> {
        let location = collector.location().to_string();
        if !self.locations.insert(location.clone()) {
            return Err(IngestError::DuplicateJob { location });
        }
        self.jobs.push(CollectionJob::new(collector));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn locations(&self) -> impl Iterator<Item = &str> {
        self.jobs.iter().map(|job| job.location())
    }
}

impl TryFrom<Vec<Arc<dyn Collector>>> for JobSet {
    type Error = IngestError;

    fn try_from(collectors: Vec<Arc<dyn Collector>>) -> Result<Self> {
        let mut jobs = JobSet::new();
        for collector in collectors {
            jobs.push(collector)?;
        }
        Ok(jobs)
    }
}

/// Runs a job set with bounded concurrency and a single retry pass
#[derive(Debug, Clone)]
pub struct BatchOrchestrator {
    runner: CollectorRunner,
    parallelism: usize,
    run_mode: RunMode,
    show_progress: bool,
}

impl BatchOrchestrator {
    pub fn new(runner: CollectorRunner, config: &BatchConfig) -> Self {
        Self {
            runner,
            parallelism: config.parallelism.max(1),
            run_mode: config.run_mode,
            show_progress: config.show_progress,
        }
    }

    pub fn runner(&self) -> &CollectorRunner {
        &self.runner
    }

    /// Run every selected job, retry the failures once and report.
    ///
    /// Never fails: every job ends up in exactly one list of the report.
    pub async fn run(&self, job_set: JobSet) -> BatchReport {
        let start_time = Instant::now();

        let (mut jobs, skipped): (Vec<CollectionJob>, Vec<CollectionJob>) = job_set
            .jobs
            .into_iter()
            .partition(|job| self.run_mode == RunMode::Full || job.collector.is_quick());

        let mut skipped: Vec<String> = skipped
            .iter()
            .map(|job| job.location().to_string())
            .collect();
        skipped.sort();
        if !skipped.is_empty() {
            debug!("{} mode skips {} jobs", self.run_mode, skipped.len());
        }

        info!(
            "Starting batch of {} jobs ({} mode, {} workers)",
            jobs.len(),
            self.run_mode,
            self.parallelism
        );

        let progress = self.create_progress_bar(jobs.len() as u64);

        self.run_pass(&mut jobs, JobState::Pending, progress.as_ref())
            .await;

        let retry_count = jobs
            .iter()
            .filter(|job| job.state == JobState::Failed)
            .count();
        if retry_count > 0 {
            info!("Retrying {} failed jobs", retry_count);
            if let Some(pb) = &progress {
                pb.inc_length(retry_count as u64);
                pb.set_message("retrying");
            }
            self.run_pass(&mut jobs, JobState::Failed, progress.as_ref())
                .await;
        }

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        let mut report = BatchReport {
            skipped,
            ..Default::default()
        };
        for job in jobs {
            match job.state {
                JobState::Succeeded => report.succeeded.push(job.into_result()),
                _ => report.failed.push(job.into_result()),
            }
        }
        report.succeeded.sort_by(|a, b| a.location.cmp(&b.location));
        report.failed.sort_by(|a, b| a.location.cmp(&b.location));

        info!(
            "Batch finished in {:.2?}: {} succeeded, {} failed, {} skipped",
            start_time.elapsed(),
            report.succeeded.len(),
            report.failed.len(),
            report.skipped.len()
        );

        report
    }

    /// Attempt every job currently in `from`, at most `parallelism` at a time
    async fn run_pass(
        &self,
        jobs: &mut [CollectionJob],
        from: JobState,
        progress: Option<&ProgressBar>,
    ) {
        let runner = &self.runner;

        stream::iter(jobs.iter_mut().filter(|job| job.state == from))
            .map(move |job| async move {
                if let Err(e) = job.start() {
                    warn!("{}", e);
                    return;
                }

                let outcome = runner.run(job.collector.as_ref()).await;
                match &outcome {
                    RunOutcome::Failed(cause) => {
                        warn!(
                            "Attempt {} for {} failed: {}",
                            job.attempts,
                            job.location(),
                            cause
                        )
                    }
                    other => debug!("Attempt {} for {}: {}", job.attempts, job.location(), other),
                }

                if let Err(e) = job.finish(outcome) {
                    warn!("{}", e);
                }
                if let Some(pb) = progress {
                    pb.inc(1);
                }
            })
            .buffer_unordered(self.parallelism)
            .collect::<Vec<()>>()
            .await;
    }

    fn create_progress_bar(&self, total: u64) -> Option<ProgressBar> {
        if !self.show_progress || total == 0 {
            return None;
        }

        let pb = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .map(|style| style.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb.set_message("collecting");
        Some(pb)
    }
}
