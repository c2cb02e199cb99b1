//! Command-line argument definitions
//!
//! Global options select the store and its policies; each subcommand adds
//! its own options on top.

use crate::config::{BatchConfig, RunMode, StalePolicy, StoreConfig, default_store_root};
use crate::models::Domain;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// CLI arguments for the ingestion tool
#[derive(Debug, Clone, Parser)]
#[command(
    name = "covid-ingest",
    version,
    about = "Merge collector output into per-location COVID-19 series",
    long_about = "Runs collectors for many locations, validates each new observation and \
                  appends it to that location's series file only when it is newer than what \
                  is stored. Whole-history tables are normalized and checked before they \
                  replace a stored series. Failed collectors are retried once."
)]
pub struct Args {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Run every collector found in a drop directory
    Run(RunArgs),
    /// Normalize a whole-history CSV and replace the stored series
    Normalize(NormalizeArgs),
    /// Re-check every stored series
    Validate(ValidateArgs),
    /// Show the most recent stored record of a location
    Latest(LatestArgs),
}

/// Options shared by every subcommand
#[derive(Debug, Clone, clap::Args)]
pub struct GlobalArgs {
    /// Series store directory
    ///
    /// Defaults to covid-ingest/series under the user data directory.
    #[arg(long = "store", value_name = "DIR", global = true)]
    pub store: Option<PathBuf>,

    /// Reporting domain of the store (vaccinations or testing)
    #[arg(long = "domain", default_value = "vaccinations", global = true)]
    pub domain: Domain,

    /// Whether equal values on a newer date count as stale
    #[arg(
        long = "stale-policy",
        value_name = "POLICY",
        default_value = "strict",
        global = true,
        help = "Stale check: strict or allow-equal"
    )]
    pub stale_policy: StalePolicy,

    /// Treat this day as today instead of the local calendar day
    #[arg(long = "reference-date", value_name = "YYYY-MM-DD", global = true)]
    pub reference_date: Option<NaiveDate>,

    /// Increase logging verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only show errors. Overrides verbose settings.
    #[arg(short = 'q', long = "quiet", global = true)]
    pub quiet: bool,
}

impl GlobalArgs {
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
        }
    }

    pub fn store_config(&self) -> StoreConfig {
        let root = self.store.clone().unwrap_or_else(default_store_root);
        let config =
            StoreConfig::new(root, self.domain).with_stale_policy(self.stale_policy);
        match self.reference_date {
            Some(date) => config.with_reference_date(date),
            None => config,
        }
    }
}

/// Arguments for the run command
#[derive(Debug, Clone, Parser)]
pub struct RunArgs {
    /// Directory with increments/ and series/ sub-directories of CSV drops
    #[arg(long = "drop-dir", value_name = "DIR")]
    pub drop_dir: PathBuf,

    /// quick runs only single-observation drops; full runs everything
    #[arg(long = "mode", default_value = "full")]
    pub mode: RunMode,

    /// Maximum collectors in flight (1 runs sequentially)
    #[arg(short = 'j', long = "jobs", value_name = "N")]
    pub jobs: Option<usize>,

    /// Per-collector timeout in seconds
    #[arg(long = "timeout", value_name = "SECS")]
    pub timeout: Option<u64>,
}

impl RunArgs {
    pub fn batch_config(&self, show_progress: bool) -> BatchConfig {
        let mut config = BatchConfig::default()
            .with_run_mode(self.mode)
            .with_progress(show_progress);
        if let Some(jobs) = self.jobs {
            config = config.with_parallelism(jobs);
        }
        if let Some(secs) = self.timeout {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        config
    }
}

/// Arguments for the normalize command
#[derive(Debug, Clone, Parser)]
pub struct NormalizeArgs {
    /// Whole-history CSV for one location
    #[arg(value_name = "CSV")]
    pub input: PathBuf,

    /// Location the history belongs to
    #[arg(short = 'l', long = "location")]
    pub location: String,

    /// Write the canonical CSV here instead of replacing the stored series
    #[arg(short = 'o', long = "output", value_name = "CSV")]
    pub output: Option<PathBuf>,
}

/// Arguments for the validate command
#[derive(Debug, Clone, Parser)]
pub struct ValidateArgs {
    /// Only check these locations
    #[arg(value_name = "LOCATION")]
    pub locations: Vec<String>,
}

/// Arguments for the latest command
#[derive(Debug, Clone, Parser)]
pub struct LatestArgs {
    #[arg(value_name = "LOCATION")]
    pub location: String,
}
