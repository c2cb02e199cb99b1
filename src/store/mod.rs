//! Per-location series store.
//!
//! The store is the only writer of series files. Incremental collectors go
//! through [`SeriesStore::append_if_newer`]; batch collectors go through
//! [`SeriesStore::replace_full_series`], which checks the whole sequence
//! before anything is written.
//!
//! # Stale candidates
//!
//! Polling a source that has not updated yet is the normal case, so a
//! candidate that is not newer than the latest stored point is reported as
//! [`AppendOutcome::SkippedStale`] and leaves the file untouched. The exact
//! meaning of "newer" for equal values follows [`StalePolicy`].

pub mod integrity;
pub mod persist;

#[cfg(test)]
pub mod tests;

use crate::config::{StalePolicy, StoreConfig};
use crate::constants::SERIES_FILE_EXTENSION;
use crate::error::{IngestError, IntegrityViolation, Result, ValidationError};
use crate::models::{Domain, RawRecord, TimeSeriesRecord};
use crate::validator::{RecordValidator, check_record_shape};

use chrono::NaiveDate;
use regex::Regex;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// File-name-safe location identifiers
const LOCATION_PATTERN: &str = r"^[\p{L}\p{N}][\p{L}\p{N} .,'()&_-]*$";

/// Result of an incremental append
#[derive(Debug, Clone, PartialEq)]
pub enum AppendOutcome {
    Appended,
    SkippedStale,
    Rejected(ValidationError),
}

/// Directory of per-location series files
#[derive(Debug, Clone)]
pub struct SeriesStore {
    config: StoreConfig,
    location_pattern: Regex,
}

impl SeriesStore {
    /// Open (and create if needed) the store directory
    pub fn open(config: StoreConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.root)?;

        let location_pattern =
            Regex::new(LOCATION_PATTERN).map_err(|e| IngestError::Configuration {
                message: format!("invalid location pattern: {}", e),
            })?;

        debug!(
            "Opened {} series store at {}",
            config.domain,
            config.root.display()
        );

        Ok(Self {
            config,
            location_pattern,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn domain(&self) -> Domain {
        self.config.domain
    }

    pub fn today(&self) -> NaiveDate {
        self.config.today()
    }

    /// Path of the series file for a location
    pub fn path_for(&self, location: &str) -> Result<PathBuf> {
        if !self.location_pattern.is_match(location) || location.ends_with(' ') {
            return Err(IngestError::InvalidLocation {
                location: location.to_string(),
            });
        }
        Ok(self
            .config
            .root
            .join(format!("{}.{}", location, SERIES_FILE_EXTENSION)))
    }

    /// Locations with a stored series, sorted by name
    pub fn locations(&self) -> Result<Vec<String>> {
        let pattern = self
            .config
            .root
            .join(format!("*.{}", SERIES_FILE_EXTENSION));
        let pattern = pattern.to_string_lossy();

        let entries = glob::glob(&pattern).map_err(|e| IngestError::Configuration {
            message: format!("invalid store path pattern: {}", e),
        })?;

        let mut locations = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| IngestError::Io(e.into()))?;
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                locations.push(stem.to_string());
            }
        }
        locations.sort();
        Ok(locations)
    }

    /// Full stored series, ascending by date; empty when nothing is stored
    pub fn load(&self, location: &str) -> Result<Vec<TimeSeriesRecord>> {
        let path = self.path_for(location)?;
        if !path.exists() {
            return Ok(Vec::new());
        }
        persist::read_series(&path, self.domain())
    }

    /// Most recent stored record
    pub fn latest(&self, location: &str) -> Result<Option<TimeSeriesRecord>> {
        Ok(self.load(location)?.pop())
    }

    /// Validate a candidate and append it when it is newer than the latest
    /// stored point.
    ///
    /// Errors are reserved for operational failures; data problems come back
    /// as [`AppendOutcome::Rejected`].
    pub fn append_if_newer(&self, location: &str, candidate: &RawRecord) -> Result<AppendOutcome> {
        let path = self.path_for(location)?;
        let domain = self.domain();
        let validator = RecordValidator::new(domain, self.today());

        let record = match validator.validate(candidate) {
            Ok(record) => record,
            Err(reason) => {
                warn!("Rejected candidate for {}: {}", location, reason);
                return Ok(AppendOutcome::Rejected(reason));
            }
        };

        if record.location != location {
            let reason = ValidationError::LocationMismatch {
                expected: location.to_string(),
                found: record.location,
            };
            warn!("Rejected candidate for {}: {}", location, reason);
            return Ok(AppendOutcome::Rejected(reason));
        }

        let mut series = self.load(location)?;

        if let Some(latest) = series.last() {
            if is_stale(&record, latest, domain, self.config.stale_policy) {
                debug!(
                    "Skipping stale candidate for {} on {} (latest {})",
                    location, record.date, latest.date
                );
                return Ok(AppendOutcome::SkippedStale);
            }
        }

        if let Some(reason) = find_regression(&record, &series, domain) {
            warn!("Rejected candidate for {}: {}", location, reason);
            return Ok(AppendOutcome::Rejected(reason));
        }

        let date = record.date;
        series.push(record);
        series.sort_by_key(|r| r.date);
        persist::write_series_atomic(&path, domain, &series, self.config.row_order)?;

        info!(
            "Appended {} for {} ({} records)",
            date,
            location,
            series.len()
        );
        Ok(AppendOutcome::Appended)
    }

    /// Swap in a whole series after checking every point of it.
    ///
    /// Returns the number of records written. Every record must have a
    /// location, a source URL and only this store's metrics; any violation
    /// anywhere in the sequence leaves the stored series untouched.
    pub fn replace_full_series(
        &self,
        location: &str,
        mut records: Vec<TimeSeriesRecord>,
    ) -> Result<usize> {
        let path = self.path_for(location)?;
        let domain = self.domain();

        let integrity_error = |violation: IntegrityViolation| IngestError::SeriesIntegrity {
            location: location.to_string(),
            violation,
        };

        if records.is_empty() {
            return Err(integrity_error(IntegrityViolation::EmptySeries));
        }

        for record in &records {
            check_record_shape(domain, record).map_err(|source| IngestError::Validation {
                location: location.to_string(),
                source,
            })?;
        }

        records.sort_by_key(|r| r.date);
        integrity::check_series(location, domain, &records, Some(self.today()))
            .map_err(integrity_error)?;

        persist::write_series_atomic(&path, domain, &records, self.config.row_order)?;

        info!("Replaced series for {} ({} records)", location, records.len());
        Ok(records.len())
    }
}

/// Whether a validated candidate adds nothing over the latest stored record
pub fn is_stale(
    candidate: &TimeSeriesRecord,
    latest: &TimeSeriesRecord,
    domain: Domain,
    policy: StalePolicy,
) -> bool {
    if candidate.date <= latest.date {
        return true;
    }

    candidate
        .cumulative_values(domain)
        .all(|(metric, value)| match latest.get(metric) {
            Some(previous) => match policy {
                StalePolicy::Strict => value <= previous,
                StalePolicy::AllowEqual => value < previous,
            },
            None => false,
        })
}

/// A cumulative metric of the candidate that is lower than its last stored
/// value
fn find_regression(
    candidate: &TimeSeriesRecord,
    series: &[TimeSeriesRecord],
    domain: Domain,
) -> Option<ValidationError> {
    candidate.cumulative_values(domain).find_map(|(metric, value)| {
        let previous = series.iter().rev().find_map(|r| r.get(metric))?;
        (value < previous).then_some(ValidationError::Regression {
            metric,
            previous,
            value,
        })
    })
}
