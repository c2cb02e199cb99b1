//! Tests for the series store
//!
//! Shared fixtures live here; each file covers one store concern.


use crate::config::{StalePolicy, StoreConfig};
use crate::models::{Domain, Metric, RawRecord, TimeSeriesRecord};
use crate::store::SeriesStore;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tempfile::TempDir;

pub const LOCATION: &str = "Austria";

/// Reference day used by every store fixture
pub fn reference_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 6, 1).unwrap()
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Vaccination store in a fresh temporary directory
pub fn create_test_store() -> (TempDir, SeriesStore) {
    create_store_with_policy(StalePolicy::Strict)
}

pub fn create_store_with_policy(policy: StalePolicy) -> (TempDir, SeriesStore) {
    let temp_dir = TempDir::new().unwrap();
    let config = StoreConfig::new(temp_dir.path().join("series"), Domain::Vaccinations)
        .with_stale_policy(policy)
        .with_reference_date(reference_day());
    let store = SeriesStore::open(config).unwrap();
    (temp_dir, store)
}

/// Candidate carrying only `total_vaccinations`
pub fn candidate(date: &str, total: u64) -> RawRecord {
    RawRecord::new(LOCATION, date, "https://example.org/austria")
        .with_label("Pfizer/BioNTech")
        .with_count(Metric::TotalVaccinations, total)
}

/// Validated record with the given cumulative values
pub fn record(date: NaiveDate, total: Option<u64>, people: Option<u64>) -> TimeSeriesRecord {
    let mut metrics = BTreeMap::new();
    if let Some(total) = total {
        metrics.insert(Metric::TotalVaccinations, total);
    }
    if let Some(people) = people {
        metrics.insert(Metric::PeopleVaccinated, people);
    }
    TimeSeriesRecord {
        location: LOCATION.to_string(),
        date,
        label: Some("Pfizer/BioNTech, Moderna".to_string()),
        source_url: "https://example.org/austria".to_string(),
        metrics,
    }
}

/// Ten days of steadily rising totals starting 2021-01-01
pub fn rising_series() -> Vec<TimeSeriesRecord> {
    (1..=10)
        .map(|d| record(day(2021, 1, d), Some(d as u64 * 100), Some(d as u64 * 60)))
        .collect()
}
