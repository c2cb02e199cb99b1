//! Core data structures for per-location series.
//!
//! Defines the two reporting domains, the metric catalogue, the
//! loosely-typed candidate produced by collectors and the validated record
//! that the store persists.

use crate::constants::columns;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Reporting domain of a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Vaccinations,
    Testing,
}

impl Domain {
    /// Canonical column order for files of this domain
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Domain::Vaccinations => columns::VACCINATION_COLUMNS,
            Domain::Testing => columns::TESTING_COLUMNS,
        }
    }

    /// Name of the informational text column (`vaccine` or `units`)
    pub fn label_column(&self) -> &'static str {
        match self {
            Domain::Vaccinations => columns::VACCINE,
            Domain::Testing => columns::UNITS,
        }
    }

    /// Numeric columns of this domain, in canonical order
    pub fn metrics(&self) -> &'static [Metric] {
        match self {
            Domain::Vaccinations => &[
                Metric::TotalVaccinations,
                Metric::PeopleVaccinated,
                Metric::PeopleFullyVaccinated,
            ],
            Domain::Testing => &[Metric::CumulativeTotal, Metric::DailyChange],
        }
    }

    /// Metrics that must never decrease date-over-date
    pub fn cumulative_metrics(self) -> impl Iterator<Item = Metric> {
        self.metrics().iter().copied().filter(Metric::is_cumulative)
    }

    /// Chain of metrics that must be non-increasing within one record,
    /// outermost first
    pub fn containment_chain(&self) -> &'static [Metric] {
        match self {
            Domain::Vaccinations => &[
                Metric::TotalVaccinations,
                Metric::PeopleVaccinated,
                Metric::PeopleFullyVaccinated,
            ],
            Domain::Testing => &[],
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Vaccinations => write!(f, "vaccinations"),
            Domain::Testing => write!(f, "testing"),
        }
    }
}

impl FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "vaccinations" | "vaccination" => Ok(Domain::Vaccinations),
            "testing" | "tests" => Ok(Domain::Testing),
            other => Err(format!(
                "unknown domain '{}' (expected vaccinations or testing)",
                other
            )),
        }
    }
}

/// A numeric column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    TotalVaccinations,
    PeopleVaccinated,
    PeopleFullyVaccinated,
    CumulativeTotal,
    DailyChange,
}

impl Metric {
    pub fn column(&self) -> &'static str {
        match self {
            Metric::TotalVaccinations => columns::TOTAL_VACCINATIONS,
            Metric::PeopleVaccinated => columns::PEOPLE_VACCINATED,
            Metric::PeopleFullyVaccinated => columns::PEOPLE_FULLY_VACCINATED,
            Metric::CumulativeTotal => columns::CUMULATIVE_TOTAL,
            Metric::DailyChange => columns::DAILY_CHANGE,
        }
    }

    /// Whether the metric is a running counter
    pub fn is_cumulative(&self) -> bool {
        !matches!(self, Metric::DailyChange)
    }

    pub fn domain(&self) -> Domain {
        match self {
            Metric::TotalVaccinations | Metric::PeopleVaccinated | Metric::PeopleFullyVaccinated => {
                Domain::Vaccinations
            }
            Metric::CumulativeTotal | Metric::DailyChange => Domain::Testing,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// Candidate observation as produced by a collector adapter.
///
/// Values are kept loose on purpose: the date is the text the source
/// reported and counts are floats, so that fractional or negative input
/// reaches the validator instead of being truncated on the way in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub location: String,
    pub date: String,
    /// Vaccine products or testing units, depending on domain
    pub label: Option<String>,
    pub source_url: String,
    /// Absent metrics are null, never zero
    pub metrics: BTreeMap<Metric, f64>,
}

impl RawRecord {
    pub fn new(
        location: impl Into<String>,
        date: impl Into<String>,
        source_url: impl Into<String>,
    ) -> Self {
        Self {
            location: location.into(),
            date: date.into(),
            label: None,
            source_url: source_url.into(),
            metrics: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_metric(mut self, metric: Metric, value: f64) -> Self {
        self.metrics.insert(metric, value);
        self
    }

    /// Convenience for integral counts
    pub fn with_count(self, metric: Metric, value: u64) -> Self {
        self.with_metric(metric, value as f64)
    }
}

/// Validated observation for one location on one date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSeriesRecord {
    pub location: String,
    pub date: NaiveDate,
    pub label: Option<String>,
    pub source_url: String,
    pub metrics: BTreeMap<Metric, u64>,
}

impl TimeSeriesRecord {
    pub fn get(&self, metric: Metric) -> Option<u64> {
        self.metrics.get(&metric).copied()
    }

    /// Present cumulative metrics of the given domain
    pub fn cumulative_values(&self, domain: Domain) -> impl Iterator<Item = (Metric, u64)> + '_ {
        domain
            .cumulative_metrics()
            .filter_map(move |metric| self.get(metric).map(|value| (metric, value)))
    }

    /// Date in canonical `YYYY-MM-DD` form
    pub fn date_string(&self) -> String {
        self.date.format(crate::constants::DATE_FORMAT).to_string()
    }
}
