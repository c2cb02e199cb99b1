//! Batch-mode normalization of a whole historical series.
//!
//! Collectors that rebuild their entire history each run hand over a loose
//! `DataFrame`. The normalizer drops the partial current day, coerces every
//! numeric column to exact counts, orders the rows by date and checks the
//! whole sequence before anything reaches the store.

use crate::constants::columns;
use crate::error::{IngestError, Result};
use crate::models::{Domain, Metric, RawRecord, TimeSeriesRecord};
use crate::store::{integrity, persist};
use crate::validator::RecordValidator;

use chrono::NaiveDate;
use polars::prelude::*;
use tracing::{debug, info};

/// A validated, ascending series ready for `replace_full_series`
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSeries {
    pub location: String,
    pub domain: Domain,
    pub records: Vec<TimeSeriesRecord>,
    /// Rows dated on the reference day that were left out
    pub dropped_partial: usize,
}

impl NormalizedSeries {
    /// Canonical frame: domain column order, ascending dates as strings
    pub fn to_frame(&self) -> Result<DataFrame> {
        persist::records_to_frame(self.domain, &self.records)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SeriesNormalizer {
    domain: Domain,
    today: NaiveDate,
}

impl SeriesNormalizer {
    pub fn new(domain: Domain, today: NaiveDate) -> Self {
        Self { domain, today }
    }

    /// Normalize and check a full series for one location.
    ///
    /// Any bad row fails the whole series: a validation problem comes back
    /// as [`IngestError::Validation`], a broken sequence as
    /// [`IngestError::SeriesIntegrity`].
    pub fn normalize(&self, location: &str, frame: &DataFrame) -> Result<NormalizedSeries> {
        let candidates = raw_records_from_frame(location, self.domain, frame)?;
        let validator = RecordValidator::new(self.domain, self.today);

        let mut records = Vec::with_capacity(candidates.len());
        let mut dropped_partial = 0;

        for candidate in &candidates {
            let record = validator
                .validate(candidate)
                .map_err(|source| IngestError::Validation {
                    location: location.to_string(),
                    source,
                })?;

            if record.date >= self.today {
                dropped_partial += 1;
                continue;
            }
            records.push(record);
        }

        if dropped_partial > 0 {
            debug!(
                "Dropped {} partial-day rows for {} (reference day {})",
                dropped_partial, location, self.today
            );
        }

        records.sort_by_key(|r| r.date);
        integrity::check_series(location, self.domain, &records, Some(self.today)).map_err(
            |violation| IngestError::SeriesIntegrity {
                location: location.to_string(),
                violation,
            },
        )?;

        info!("Normalized {} records for {}", records.len(), location);

        Ok(NormalizedSeries {
            location: location.to_string(),
            domain: self.domain,
            records,
            dropped_partial,
        })
    }
}

/// Read each row of a loose frame into a candidate record.
///
/// `location` and the label column are optional; a missing location is
/// filled with the job's location. Metric columns that are absent stay null.
/// Columns outside the domain layout are ignored.
pub fn raw_records_from_frame(
    location: &str,
    domain: Domain,
    frame: &DataFrame,
) -> Result<Vec<RawRecord>> {
    let fail = |reason: String| IngestError::Normalization {
        location: location.to_string(),
        reason,
    };

    let dates = date_strings(frame).map_err(&fail)?;
    let urls = required_strings(frame, columns::SOURCE_URL).map_err(&fail)?;
    let locations = optional_strings(frame, columns::LOCATION).map_err(&fail)?;
    let labels = optional_strings(frame, domain.label_column()).map_err(&fail)?;

    let mut metric_values: Vec<(Metric, Float64Chunked)> = Vec::new();
    for &metric in domain.metrics() {
        if let Some(values) = metric_column(frame, metric).map_err(&fail)? {
            metric_values.push((metric, values));
        }
    }

    let mut candidates = Vec::with_capacity(frame.height());
    for row in 0..frame.height() {
        let row_location = locations
            .as_ref()
            .and_then(|values| values.str().ok()?.get(row).map(str::to_string))
            .unwrap_or_else(|| location.to_string());

        let date = dates.str().map_err(|e| fail(e.to_string()))?.get(row);
        let url = urls.str().map_err(|e| fail(e.to_string()))?.get(row);

        let mut candidate = RawRecord::new(
            row_location,
            date.unwrap_or_default(),
            url.unwrap_or_default(),
        );

        if let Some(label) = labels
            .as_ref()
            .and_then(|values| values.str().ok()?.get(row).map(str::to_string))
        {
            candidate = candidate.with_label(label);
        }

        for (metric, values) in &metric_values {
            if let Some(value) = values.get(row) {
                candidate = candidate.with_metric(*metric, value);
            }
        }

        candidates.push(candidate);
    }

    Ok(candidates)
}

/// Date column as canonical `YYYY-MM-DD` text whatever its input dtype
fn date_strings(frame: &DataFrame) -> std::result::Result<Column, String> {
    let column = frame
        .column(columns::DATE)
        .map_err(|_| format!("missing '{}' column", columns::DATE))?;

    let converted = match column.dtype() {
        DataType::String => Ok(column.clone()),
        DataType::Date => column.cast(&DataType::String),
        DataType::Datetime(_, _) => column
            .cast(&DataType::Date)
            .and_then(|dates| dates.cast(&DataType::String)),
        other => {
            return Err(format!(
                "'{}' column has unsupported type {}",
                columns::DATE,
                other
            ));
        }
    };

    converted.map_err(|e| format!("cannot read '{}' column: {}", columns::DATE, e))
}

fn required_strings(frame: &DataFrame, name: &str) -> std::result::Result<Column, String> {
    let column = frame
        .column(name)
        .map_err(|_| format!("missing '{}' column", name))?;
    as_strings(column, name)
}

fn optional_strings(frame: &DataFrame, name: &str) -> std::result::Result<Option<Column>, String> {
    match frame.column(name) {
        Ok(column) => as_strings(column, name).map(Some),
        Err(_) => Ok(None),
    }
}

fn as_strings(column: &Column, name: &str) -> std::result::Result<Column, String> {
    match column.dtype() {
        DataType::String => Ok(column.clone()),
        DataType::Null => column
            .cast(&DataType::String)
            .map_err(|e| format!("cannot read '{}' column: {}", name, e)),
        other => Err(format!("'{}' column must be text, found {}", name, other)),
    }
}

/// Metric column as floats; text that is not a plain number fails the cast
fn metric_column(
    frame: &DataFrame,
    metric: Metric,
) -> std::result::Result<Option<Float64Chunked>, String> {
    let Ok(column) = frame.column(metric.column()) else {
        return Ok(None);
    };

    let values = column
        .strict_cast(&DataType::Float64)
        .map_err(|e| format!("'{}' is not numeric: {}", metric, e))?;

    values
        .f64()
        .cloned()
        .map(Some)
        .map_err(|e| format!("'{}' is not numeric: {}", metric, e))
}
