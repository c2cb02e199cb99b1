//! Whole-series invariant checks
//!
//! Used before a full replacement, by the normalizer, and when re-checking
//! stored files. Records must already be sorted ascending by date.

use crate::error::{IntegrityViolation, ValidationError};
use crate::models::{Domain, Metric, TimeSeriesRecord};
use crate::validator::check_containment;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Every invariant violation in the series, in date order.
///
/// `partial_day` enables the "no record for today or later" rule; pass
/// `None` when re-checking incrementally built series.
pub fn find_violations(
    location: &str,
    domain: Domain,
    records: &[TimeSeriesRecord],
    partial_day: Option<NaiveDate>,
) -> Vec<IntegrityViolation> {
    let mut violations = Vec::new();
    let mut previous_date: Option<NaiveDate> = None;
    let mut last_seen: BTreeMap<Metric, u64> = BTreeMap::new();

    for record in records {
        if record.location != location {
            violations.push(IntegrityViolation::ForeignLocation {
                expected: location.to_string(),
                found: record.location.clone(),
            });
        }

        if let Some(today) = partial_day {
            if record.date >= today {
                violations.push(IntegrityViolation::PartialDay {
                    date: record.date,
                    today,
                });
            }
        }

        if previous_date == Some(record.date) {
            violations.push(IntegrityViolation::DuplicateDate { date: record.date });
        }
        previous_date = Some(record.date);

        if let Err(ValidationError::Containment {
            outer,
            outer_value,
            inner,
            inner_value,
        }) = check_containment(domain, &record.metrics)
        {
            violations.push(IntegrityViolation::Containment {
                date: record.date,
                outer,
                outer_value,
                inner,
                inner_value,
            });
        }

        for (metric, value) in record.cumulative_values(domain) {
            if let Some(&previous) = last_seen.get(&metric) {
                if value < previous {
                    violations.push(IntegrityViolation::Decrease {
                        metric,
                        date: record.date,
                        previous,
                        value,
                    });
                }
            }
            last_seen.insert(metric, value);
        }
    }

    violations
}

/// First invariant violation, if any
pub fn check_series(
    location: &str,
    domain: Domain,
    records: &[TimeSeriesRecord],
    partial_day: Option<NaiveDate>,
) -> Result<(), IntegrityViolation> {
    match find_violations(location, domain, records, partial_day)
        .into_iter()
        .next()
    {
        Some(violation) => Err(violation),
        None => Ok(()),
    }
}
