//! Configuration management and validation.
//!
//! One `IngestConfig` is built per process and handed by reference to the
//! store and the orchestrator; nothing reads configuration from globals.

use crate::constants::{
    APP_DIR_NAME, DEFAULT_COLLECTOR_TIMEOUT_SECS, MAX_DEFAULT_PARALLELISM,
};
use crate::error::{IngestError, Result};
use crate::models::Domain;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// How equal cumulative values on a newer date are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StalePolicy {
    /// A newer date must raise at least one cumulative metric
    #[default]
    Strict,
    /// Equal values on a newer date are accepted as a re-confirmation
    AllowEqual,
}

impl FromStr for StalePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(StalePolicy::Strict),
            "allow-equal" | "allow_equal" => Ok(StalePolicy::AllowEqual),
            other => Err(format!(
                "unknown stale policy '{}' (expected strict or allow-equal)",
                other
            )),
        }
    }
}

/// Row order of persisted series files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowOrder {
    /// Newest first
    #[default]
    Descending,
    Ascending,
}

/// Which collectors a batch run includes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Only low-latency incremental collectors
    Quick,
    #[default]
    Full,
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "quick" => Ok(RunMode::Quick),
            "full" => Ok(RunMode::Full),
            other => Err(format!("unknown run mode '{}' (expected quick or full)", other)),
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Quick => write!(f, "quick"),
            RunMode::Full => write!(f, "full"),
        }
    }
}

/// Series store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding one file per location
    pub root: PathBuf,

    /// Reporting domain of every series in this store
    pub domain: Domain,

    /// On-disk row order
    pub row_order: RowOrder,

    /// Stale check interpretation
    pub stale_policy: StalePolicy,

    /// Day treated as "today"; `None` means the local calendar day
    pub reference_date: Option<NaiveDate>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: default_store_root(),
            domain: Domain::Vaccinations,
            row_order: RowOrder::default(),
            stale_policy: StalePolicy::default(),
            reference_date: None,
        }
    }
}

impl StoreConfig {
    pub fn new(root: impl Into<PathBuf>, domain: Domain) -> Self {
        Self {
            root: root.into(),
            domain,
            ..Default::default()
        }
    }

    pub fn with_row_order(mut self, row_order: RowOrder) -> Self {
        self.row_order = row_order;
        self
    }

    pub fn with_stale_policy(mut self, stale_policy: StalePolicy) -> Self {
        self.stale_policy = stale_policy;
        self
    }

    /// Pin the reference day (tests, replays)
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    /// The day partial data is measured against
    pub fn today(&self) -> NaiveDate {
        self.reference_date
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }
}

/// Batch orchestration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Maximum in-flight collector attempts; 1 runs jobs sequentially
    pub parallelism: usize,

    /// Upper bound on a single collector call
    pub collector_timeout: Duration,

    /// Quick or full run
    pub run_mode: RunMode,

    /// Draw a progress bar while jobs run
    pub show_progress: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            parallelism: num_cpus::get().clamp(1, MAX_DEFAULT_PARALLELISM),
            collector_timeout: Duration::from_secs(DEFAULT_COLLECTOR_TIMEOUT_SECS),
            run_mode: RunMode::default(),
            show_progress: false,
        }
    }
}

impl BatchConfig {
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.collector_timeout = timeout;
        self
    }

    pub fn with_run_mode(mut self, run_mode: RunMode) -> Self {
        self.run_mode = run_mode;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }
}

/// Global configuration for an ingestion process
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestConfig {
    pub store: StoreConfig,
    pub batch: BatchConfig,
}

impl IngestConfig {
    pub fn new(store: StoreConfig, batch: BatchConfig) -> Self {
        Self { store, batch }
    }

    /// Reject settings no run could work with
    pub fn validate(&self) -> Result<()> {
        if self.batch.parallelism == 0 {
            return Err(IngestError::Configuration {
                message: "parallelism must be at least 1".to_string(),
            });
        }

        if self.batch.collector_timeout.is_zero() {
            return Err(IngestError::Configuration {
                message: "collector timeout must be greater than zero".to_string(),
            });
        }

        if self.store.root.as_os_str().is_empty() {
            return Err(IngestError::Configuration {
                message: "store root must not be empty".to_string(),
            });
        }

        debug!(
            "Configuration valid: store {} ({}), {} workers, {:?} timeout, {} mode",
            self.store.root.display(),
            self.store.domain,
            self.batch.parallelism,
            self.batch.collector_timeout,
            self.batch.run_mode
        );

        Ok(())
    }
}

/// Default store directory under the user data directory
pub fn default_store_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
        .join("series")
}
