//! Incremental ingestion core for per-location COVID-19 series.
//!
//! This library provides:
//! - A pure validator for single candidate records
//! - A per-location series store with stale-aware incremental append and
//!   checked full-series replacement, written atomically
//! - A collector runner that contains errors, panics and timeouts
//! - A batch orchestrator with bounded concurrency and a single retry pass
//! - A batch-mode normalizer for whole-history tables

pub mod collector;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod normalizer;
pub mod orchestrator;
pub mod runner;
pub mod sources;
pub mod store;
pub mod validator;

// CLI modules
pub mod cli {
    pub mod args;
    pub mod commands;
}

// Re-export commonly used types
pub use collector::{Collector, CollectorOutput};
pub use config::{BatchConfig, IngestConfig, RowOrder, RunMode, StalePolicy, StoreConfig};
pub use error::{IngestError, IntegrityViolation, Result, ValidationError};
pub use models::{Domain, Metric, RawRecord, TimeSeriesRecord};
pub use normalizer::{NormalizedSeries, SeriesNormalizer};
pub use orchestrator::{BatchOrchestrator, BatchReport, JobSet, JobState};
pub use runner::{CollectorRunner, FailureCause, RunOutcome};
pub use store::{AppendOutcome, SeriesStore};
pub use validator::RecordValidator;
