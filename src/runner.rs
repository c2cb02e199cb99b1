//! Executes one collector and hands its output to the store.
//!
//! Everything a collector can do wrong (return an error, panic, hang) ends
//! up as [`RunOutcome::Failed`]; the runner itself never errors or panics
//! on behalf of a collector.

use crate::collector::{Collector, CollectorOutput};
use crate::error::IngestError;
use crate::normalizer::SeriesNormalizer;
use crate::store::{AppendOutcome, SeriesStore};

use futures::FutureExt;
use polars::prelude::DataFrame;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task;
use tracing::{debug, warn};

/// Why an attempt failed
#[derive(Debug, Clone, PartialEq)]
pub enum FailureCause {
    /// The collector returned an error
    Collector(String),
    /// The collector panicked
    Panicked(String),
    /// The collector did not finish within the timeout
    TimedOut(Duration),
    /// The store could not complete the write
    Store(String),
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::Collector(message) => write!(f, "collector error: {}", message),
            FailureCause::Panicked(message) => write!(f, "collector panicked: {}", message),
            FailureCause::TimedOut(limit) => write!(f, "timed out after {:?}", limit),
            FailureCause::Store(message) => write!(f, "store error: {}", message),
        }
    }
}

/// Result of one attempt
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The collector reported nothing
    NoData,
    Appended,
    SkippedStale,
    /// The data was refused; the stored series is unchanged
    Rejected(String),
    /// A full series replaced the stored one
    Replaced { rows: usize },
    Failed(FailureCause),
}

impl RunOutcome {
    /// Everything except a failure counts as a successful run
    pub fn is_success(&self) -> bool {
        !matches!(self, RunOutcome::Failed(_))
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::NoData => write!(f, "no data"),
            RunOutcome::Appended => write!(f, "appended"),
            RunOutcome::SkippedStale => write!(f, "up to date"),
            RunOutcome::Rejected(reason) => write!(f, "rejected: {}", reason),
            RunOutcome::Replaced { rows } => write!(f, "replaced ({} rows)", rows),
            RunOutcome::Failed(cause) => write!(f, "failed: {}", cause),
        }
    }
}

/// Runs collectors against a shared store
#[derive(Debug, Clone)]
pub struct CollectorRunner {
    store: Arc<SeriesStore>,
    timeout: Duration,
}

impl CollectorRunner {
    pub fn new(store: Arc<SeriesStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub fn store(&self) -> &Arc<SeriesStore> {
        &self.store
    }

    /// Run one attempt of a collector; never fails
    pub async fn run(&self, collector: &dyn Collector) -> RunOutcome {
        let location = collector.location().to_string();

        let output = match self.call_collector(collector).await {
            Ok(output) => output,
            Err(cause) => {
                warn!("Collector for {} failed: {}", location, cause);
                return RunOutcome::Failed(cause);
            }
        };

        let outcome = match output {
            CollectorOutput::Nothing => RunOutcome::NoData,
            CollectorOutput::Increment(candidate) => {
                let store = Arc::clone(&self.store);
                let task_location = location.clone();
                let joined =
                    task::spawn_blocking(move || store.append_if_newer(&task_location, &candidate))
                        .await;
                match joined {
                    Ok(Ok(AppendOutcome::Appended)) => RunOutcome::Appended,
                    Ok(Ok(AppendOutcome::SkippedStale)) => RunOutcome::SkippedStale,
                    Ok(Ok(AppendOutcome::Rejected(reason))) => {
                        RunOutcome::Rejected(reason.to_string())
                    }
                    Ok(Err(error)) => store_error_outcome(error),
                    Err(join_error) => {
                        RunOutcome::Failed(FailureCause::Store(join_error.to_string()))
                    }
                }
            }
            CollectorOutput::FullSeries(frame) => self.replace_series(location.clone(), frame).await,
        };

        debug!("Collector for {} finished: {}", location, outcome);
        outcome
    }

    async fn call_collector(
        &self,
        collector: &dyn Collector,
    ) -> Result<CollectorOutput, FailureCause> {
        // Panics while building the future and while polling it are both contained
        let future = std::panic::catch_unwind(AssertUnwindSafe(|| collector.collect()))
            .map_err(|payload| FailureCause::Panicked(panic_message(payload.as_ref())))?;

        match tokio::time::timeout(self.timeout, AssertUnwindSafe(future).catch_unwind()).await {
            Err(_) => Err(FailureCause::TimedOut(self.timeout)),
            Ok(Err(payload)) => Err(FailureCause::Panicked(panic_message(payload.as_ref()))),
            Ok(Ok(Err(error))) => Err(FailureCause::Collector(format!("{:#}", error))),
            Ok(Ok(Ok(output))) => Ok(output),
        }
    }

    async fn replace_series(&self, location: String, frame: DataFrame) -> RunOutcome {
        let store = Arc::clone(&self.store);

        let joined = task::spawn_blocking(move || {
            let normalizer = SeriesNormalizer::new(store.domain(), store.today());
            let normalized = normalizer.normalize(&location, &frame)?;
            store.replace_full_series(&location, normalized.records)
        })
        .await;

        match joined {
            Ok(Ok(rows)) => RunOutcome::Replaced { rows },
            Ok(Err(error)) => store_error_outcome(error),
            Err(join_error) => RunOutcome::Failed(FailureCause::Store(join_error.to_string())),
        }
    }
}

/// Data problems are final, anything else is retryable
fn store_error_outcome(error: IngestError) -> RunOutcome {
    if error.is_data_quality() {
        warn!("{}", error);
        RunOutcome::Rejected(error.to_string())
    } else {
        RunOutcome::Failed(FailureCause::Store(error.to_string()))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::tests::{Behavior, ScriptedCollector, TEST_TIMEOUT, create_test_store};
    use futures::future::BoxFuture;
    use polars::prelude::*;

    /// Panics while building its future rather than while running it
    struct EagerPanic;

    impl Collector for EagerPanic {
        fn location(&self) -> &str {
            "Ghana"
        }

        fn collect(&self) -> BoxFuture<'_, anyhow::Result<CollectorOutput>> {
            panic!("constructor blew up")
        }
    }

    #[tokio::test]
    async fn test_collector_error_becomes_failure() {
        let (_temp_dir, store) = create_test_store();
        let runner = CollectorRunner::new(store, TEST_TIMEOUT);

        let outcome = runner
            .run(&ScriptedCollector::new("Ghana", Behavior::AlwaysFail))
            .await;

        assert!(matches!(
            outcome,
            RunOutcome::Failed(FailureCause::Collector(message)) if message.contains("unavailable")
        ));
    }

    #[tokio::test]
    async fn test_eager_panic_is_contained() {
        let (_temp_dir, store) = create_test_store();
        let runner = CollectorRunner::new(store, TEST_TIMEOUT);

        let outcome = runner.run(&EagerPanic).await;
        assert_eq!(
            outcome,
            RunOutcome::Failed(FailureCause::Panicked("constructor blew up".to_string()))
        );
    }

    #[tokio::test]
    async fn test_nothing_leaves_store_alone() {
        let (_temp_dir, store) = create_test_store();
        let runner = CollectorRunner::new(store.clone(), TEST_TIMEOUT);

        let collector = ScriptedCollector::new("Ghana", Behavior::Succeed)
            .with_output(CollectorOutput::Nothing);

        assert_eq!(runner.run(&collector).await, RunOutcome::NoData);
        assert!(store.locations().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_write_failure_is_retryable() {
        let (_temp_dir, store) = create_test_store();
        std::fs::remove_dir_all(&store.config().root).unwrap();
        let runner = CollectorRunner::new(store, TEST_TIMEOUT);

        let outcome = runner
            .run(&ScriptedCollector::new("Ghana", Behavior::Succeed))
            .await;

        assert!(matches!(outcome, RunOutcome::Failed(FailureCause::Store(_))));
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn test_broken_full_series_is_rejected() {
        let (_temp_dir, store) = create_test_store();
        let runner = CollectorRunner::new(store.clone(), TEST_TIMEOUT);

        let frame = df!(
            "date" => ["2021-05-01", "2021-05-02"],
            "source_url" => ["https://example.org", "https://example.org"],
            "total_vaccinations" => [200i64, 100],
        )
        .unwrap();
        let collector = ScriptedCollector::new("Ghana", Behavior::Succeed)
            .with_output(CollectorOutput::FullSeries(frame));

        let outcome = runner.run(&collector).await;
        assert!(matches!(outcome, RunOutcome::Rejected(_)));
        assert!(outcome.is_success());
        assert!(store.load("Ghana").unwrap().is_empty());
    }
}
