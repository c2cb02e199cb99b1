//! Tests for batch orchestration
//!
//! `ScriptedCollector` stands in for a real source: it can fail a set number
//! of times, fail forever, panic, hang or hand back a whole series.

pub mod retry_tests;

use crate::collector::{Collector, CollectorOutput};
use crate::config::{BatchConfig, StoreConfig};
use crate::models::{Domain, Metric, RawRecord};
use crate::orchestrator::BatchOrchestrator;
use crate::runner::CollectorRunner;
use crate::store::SeriesStore;

use anyhow::anyhow;
use chrono::NaiveDate;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tempfile::TempDir;

pub const TEST_TIMEOUT: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Behavior {
    Succeed,
    /// Error on the first `n` calls, then succeed
    FailTimes(u32),
    AlwaysFail,
    Panic,
    Hang,
}

#[derive(Debug)]
pub struct ScriptedCollector {
    location: String,
    behavior: Behavior,
    output: CollectorOutput,
    quick: bool,
    calls: AtomicU32,
}

impl ScriptedCollector {
    pub fn new(location: &str, behavior: Behavior) -> Self {
        Self {
            location: location.to_string(),
            behavior,
            output: CollectorOutput::Increment(increment(location, "2021-05-01", 1000)),
            quick: false,
            calls: AtomicU32::new(0),
        }
    }

    pub fn with_output(mut self, output: CollectorOutput) -> Self {
        self.output = output;
        self
    }

    pub fn quick(mut self) -> Self {
        self.quick = true;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Collector for ScriptedCollector {
    fn location(&self) -> &str {
        &self.location
    }

    fn is_quick(&self) -> bool {
        self.quick
    }

    fn collect(&self) -> BoxFuture<'_, anyhow::Result<CollectorOutput>> {
        async move {
            let attempt = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            match self.behavior {
                Behavior::FailTimes(n) if attempt <= n => {
                    Err(anyhow!("source unavailable on attempt {}", attempt))
                }
                Behavior::AlwaysFail => Err(anyhow!("source unavailable")),
                Behavior::Panic => panic!("selector matched nothing"),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(CollectorOutput::Nothing)
                }
                _ => Ok(self.output.clone()),
            }
        }
        .boxed()
    }
}

pub fn reference_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 6, 1).unwrap()
}

pub fn increment(location: &str, date: &str, total: u64) -> RawRecord {
    RawRecord::new(location, date, "https://example.org/dashboard")
        .with_label("Oxford/AstraZeneca")
        .with_count(Metric::TotalVaccinations, total)
}

pub fn create_test_store() -> (TempDir, Arc<SeriesStore>) {
    let temp_dir = TempDir::new().unwrap();
    let config = StoreConfig::new(temp_dir.path().join("series"), Domain::Vaccinations)
        .with_reference_date(reference_day());
    let store = Arc::new(SeriesStore::open(config).unwrap());
    (temp_dir, store)
}

pub fn create_orchestrator(store: Arc<SeriesStore>, config: BatchConfig) -> BatchOrchestrator {
    let runner = CollectorRunner::new(store, config.collector_timeout);
    BatchOrchestrator::new(runner, &config)
}

pub fn test_batch_config() -> BatchConfig {
    BatchConfig::default()
        .with_parallelism(4)
        .with_timeout(TEST_TIMEOUT)
}
