//! Shape and numeric sanity checks for a single candidate record.
//!
//! Validation is pure: it never touches the store and always gives the same
//! answer for the same candidate and reference day.

use crate::constants::{DATE_FORMAT, MAX_EXACT_COUNT};
use crate::error::ValidationError;
use crate::models::{Domain, Metric, RawRecord, TimeSeriesRecord};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::debug;

/// Validator bound to one domain and one reference day
#[derive(Debug, Clone, Copy)]
pub struct RecordValidator {
    domain: Domain,
    today: NaiveDate,
}

impl RecordValidator {
    pub fn new(domain: Domain, today: NaiveDate) -> Self {
        Self { domain, today }
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Accept a candidate as a typed record or explain why not
    pub fn validate(&self, candidate: &RawRecord) -> Result<TimeSeriesRecord, ValidationError> {
        let location = candidate.location.trim();
        if location.is_empty() {
            return Err(ValidationError::EmptyLocation);
        }

        let source_url = candidate.source_url.trim();
        if source_url.is_empty() {
            return Err(ValidationError::EmptySourceUrl);
        }

        let date = parse_date(&candidate.date)?;
        if date > self.today {
            return Err(ValidationError::FutureDate {
                date,
                today: self.today,
            });
        }

        let mut metrics = BTreeMap::new();
        for (&metric, &value) in &candidate.metrics {
            if metric.domain() != self.domain {
                return Err(ValidationError::ForeignMetric {
                    metric,
                    domain: self.domain,
                });
            }
            metrics.insert(metric, to_count(metric, value)?);
        }

        check_containment(self.domain, &metrics)?;

        let label = candidate
            .label
            .as_deref()
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .map(str::to_string);

        debug!("Accepted candidate for {} on {}", location, date);

        Ok(TimeSeriesRecord {
            location: location.to_string(),
            date,
            label,
            source_url: source_url.to_string(),
            metrics,
        })
    }
}

/// Shape checks for an already typed record: non-empty identifiers and
/// only metrics of `domain`
pub fn check_record_shape(
    domain: Domain,
    record: &TimeSeriesRecord,
) -> Result<(), ValidationError> {
    if record.location.trim().is_empty() {
        return Err(ValidationError::EmptyLocation);
    }
    if record.source_url.trim().is_empty() {
        return Err(ValidationError::EmptySourceUrl);
    }
    if let Some(&metric) = record.metrics.keys().find(|m| m.domain() != domain) {
        return Err(ValidationError::ForeignMetric { metric, domain });
    }
    Ok(())
}

/// Parse a strict `YYYY-MM-DD` date
pub fn parse_date(value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| {
        ValidationError::InvalidDate {
            value: value.to_string(),
        }
    })
}

/// Turn a reported value into an exact non-negative count
fn to_count(metric: Metric, value: f64) -> Result<u64, ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFinite { metric });
    }
    if value < 0.0 {
        return Err(ValidationError::Negative { metric, value });
    }
    if value.fract() != 0.0 {
        return Err(ValidationError::Fractional { metric, value });
    }
    if value > MAX_EXACT_COUNT {
        return Err(ValidationError::OutOfRange { metric, value });
    }
    Ok(value as u64)
}

/// Present members of the containment chain must be non-increasing
pub(crate) fn check_containment(
    domain: Domain,
    metrics: &BTreeMap<Metric, u64>,
) -> Result<(), ValidationError> {
    let mut outer: Option<(Metric, u64)> = None;

    for &metric in domain.containment_chain() {
        let Some(&value) = metrics.get(&metric) else {
            continue;
        };
        if let Some((outer_metric, outer_value)) = outer {
            if outer_value < value {
                return Err(ValidationError::Containment {
                    outer: outer_metric,
                    outer_value,
                    inner: metric,
                    inner_value: value,
                });
            }
        }
        outer = Some((metric, value));
    }

    Ok(())
}
