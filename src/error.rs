//! Error handling for ingestion operations.
//!
//! Separates data-quality outcomes (a rejected candidate, a broken
//! replacement series) from operational failures (I/O, unreadable files,
//! misconfiguration) so callers can decide which ones are retryable.

use crate::models::{Domain, Metric};
use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

/// Why a single candidate record was refused.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Location missing or blank
    #[error("location is empty")]
    EmptyLocation,

    /// Source URL missing or blank
    #[error("source_url is empty")]
    EmptySourceUrl,

    /// Candidate belongs to another location
    #[error("candidate is for '{found}' but the series belongs to '{expected}'")]
    LocationMismatch { expected: String, found: String },

    /// Date not in YYYY-MM-DD form
    #[error("date '{value}' is not a YYYY-MM-DD calendar date")]
    InvalidDate { value: String },

    /// Date after the reference day
    #[error("date {date} is after the reference day {today}")]
    FutureDate { date: NaiveDate, today: NaiveDate },

    /// Metric of the other reporting domain
    #[error("{metric} is not a {domain} metric")]
    ForeignMetric { metric: Metric, domain: Domain },

    /// NaN or infinite value
    #[error("{metric} is not a finite number")]
    NonFinite { metric: Metric },

    /// Negative count
    #[error("{metric} is negative ({value})")]
    Negative { metric: Metric, value: f64 },

    /// Non-integer count
    #[error("{metric} is fractional ({value})")]
    Fractional { metric: Metric, value: f64 },

    /// Count beyond exact float range
    #[error("{metric} is too large to be an exact count ({value})")]
    OutOfRange { metric: Metric, value: f64 },

    /// Inner count exceeds its enclosing count
    #[error("{outer} ({outer_value}) is smaller than {inner} ({inner_value})")]
    Containment {
        outer: Metric,
        outer_value: u64,
        inner: Metric,
        inner_value: u64,
    },

    /// Cumulative value below the last stored one
    #[error("{metric} would drop from {previous} to {value}")]
    Regression {
        metric: Metric,
        previous: u64,
        value: u64,
    },
}

/// A point in a full series that breaks one of the series invariants.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntegrityViolation {
    /// Two records share a date
    #[error("more than one record for {date}")]
    DuplicateDate { date: NaiveDate },

    /// Cumulative value falls between records
    #[error("{metric} decreases on {date}: {previous} -> {value}")]
    Decrease {
        metric: Metric,
        date: NaiveDate,
        previous: u64,
        value: u64,
    },

    /// Inner count exceeds its enclosing count on one date
    #[error("{date}: {outer} ({outer_value}) is smaller than {inner} ({inner_value})")]
    Containment {
        date: NaiveDate,
        outer: Metric,
        outer_value: u64,
        inner: Metric,
        inner_value: u64,
    },

    /// Record for the reference day or later
    #[error("record dated {date} is not complete yet (reference day {today})")]
    PartialDay { date: NaiveDate, today: NaiveDate },

    /// Record of another location
    #[error("record for '{found}' inside the series of '{expected}'")]
    ForeignLocation { expected: String, found: String },

    /// No records at all
    #[error("replacement series is empty")]
    EmptySeries,
}

/// Errors raised by store, normalizer and batch operations
#[derive(Error, Debug)]
pub enum IngestError {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// DataFrame operation failed
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// Location cannot be used as a file name
    #[error("Invalid location identifier: '{location}'")]
    InvalidLocation { location: String },

    /// Record refused by validation
    #[error("Invalid record for {location}: {source}")]
    Validation {
        location: String,
        #[source]
        source: ValidationError,
    },

    /// Full series breaks a series invariant
    #[error("Series integrity check failed for {location}: {violation}")]
    SeriesIntegrity {
        location: String,
        #[source]
        violation: IntegrityViolation,
    },

    /// Source table cannot be turned into records
    #[error("Normalization failed for {location}: {reason}")]
    Normalization { location: String, reason: String },

    /// Stored series file cannot be parsed
    #[error("Stored series is unreadable: {path} - {reason}")]
    CorruptSeries { path: PathBuf, reason: String },

    /// Atomic write of a series failed
    #[error("Failed to persist series to {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Second job for one location
    #[error("Location '{location}' is already scheduled in this batch")]
    DuplicateJob { location: String },

    /// Invalid configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Illegal job state transition
    #[error("Job lifecycle error: {reason}")]
    Task { reason: String },
}

impl IngestError {
    /// True when the error describes bad data rather than a failed operation.
    ///
    /// Data-quality errors are final for the current run; everything else
    /// is worth another attempt.
    pub fn is_data_quality(&self) -> bool {
        matches!(
            self,
            IngestError::Validation { .. }
                | IngestError::SeriesIntegrity { .. }
                | IngestError::Normalization { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
