//! Tabular persistence of one location's series
//!
//! Files are CSV in canonical column order with `YYYY-MM-DD` dates, plain
//! integers and empty fields for nulls. Writes go to a temporary file in the
//! same directory that is renamed over the target once fully synced, so a
//! reader sees either the previous file or the new one.

use crate::config::RowOrder;
use crate::constants::columns;
use crate::error::{IngestError, Result};
use crate::models::{Domain, Metric, TimeSeriesRecord};
use crate::validator::parse_date;

use polars::prelude::*;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Polars schema of a series file for the given domain
pub fn series_schema(domain: Domain) -> Schema {
    domain
        .columns()
        .iter()
        .map(|&name| {
            let dtype = if domain.metrics().iter().any(|m| m.column() == name) {
                DataType::UInt64
            } else {
                DataType::String
            };
            Field::new(name.into(), dtype)
        })
        .collect()
}

/// Build a canonical frame from records, keeping their order
pub fn records_to_frame(domain: Domain, records: &[TimeSeriesRecord]) -> Result<DataFrame> {
    let mut frame_columns: Vec<Column> = Vec::with_capacity(domain.columns().len());

    for &name in domain.columns() {
        let column = match name {
            columns::LOCATION => Column::new(
                name.into(),
                records.iter().map(|r| r.location.as_str()).collect::<Vec<_>>(),
            ),
            columns::DATE => Column::new(
                name.into(),
                records.iter().map(|r| r.date_string()).collect::<Vec<_>>(),
            ),
            columns::SOURCE_URL => Column::new(
                name.into(),
                records.iter().map(|r| r.source_url.as_str()).collect::<Vec<_>>(),
            ),
            label if label == domain.label_column() => Column::new(
                name.into(),
                records.iter().map(|r| r.label.as_deref()).collect::<Vec<_>>(),
            ),
            metric_column => {
                let metric = metric_for_column(domain, metric_column)?;
                Column::new(
                    name.into(),
                    records.iter().map(|r| r.get(metric)).collect::<Vec<_>>(),
                )
            }
        };
        frame_columns.push(column);
    }

    Ok(DataFrame::new(frame_columns)?)
}

fn metric_for_column(domain: Domain, column: &str) -> Result<Metric> {
    domain
        .metrics()
        .iter()
        .copied()
        .find(|m| m.column() == column)
        .ok_or_else(|| IngestError::Configuration {
            message: format!("column '{}' is not part of the {} layout", column, domain),
        })
}

/// Read a series file; rows come back sorted ascending by date
pub fn read_series(path: &Path, domain: Domain) -> Result<Vec<TimeSeriesRecord>> {
    check_header(path, domain)?;

    let frame = CsvReadOptions::default()
        .with_has_header(true)
        .with_schema(Some(Arc::new(series_schema(domain))))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .map_err(|e| corrupt(path, format!("unreadable CSV: {}", e)))?;

    let mut records = frame_to_records(path, domain, &frame)?;
    records.sort_by_key(|r| r.date);

    debug!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

fn check_header(path: &Path, domain: Domain) -> Result<()> {
    let mut header = String::new();
    BufReader::new(File::open(path)?).read_line(&mut header)?;

    let expected = domain.columns().join(",");
    let found = header.trim_end_matches(['\r', '\n']);
    if found != expected {
        return Err(corrupt(
            path,
            format!("expected header '{}', found '{}'", expected, found),
        ));
    }
    Ok(())
}

fn frame_to_records(
    path: &Path,
    domain: Domain,
    frame: &DataFrame,
) -> Result<Vec<TimeSeriesRecord>> {
    let locations = frame.column(columns::LOCATION)?.str()?;
    let dates = frame.column(columns::DATE)?.str()?;
    let labels = frame.column(domain.label_column())?.str()?;
    let urls = frame.column(columns::SOURCE_URL)?.str()?;

    let mut metric_columns = Vec::with_capacity(domain.metrics().len());
    for &metric in domain.metrics() {
        metric_columns.push((metric, frame.column(metric.column())?.u64()?));
    }

    let mut records = Vec::with_capacity(frame.height());
    for row in 0..frame.height() {
        let location = locations
            .get(row)
            .ok_or_else(|| corrupt(path, format!("row {} has no location", row + 1)))?;
        let raw_date = dates
            .get(row)
            .ok_or_else(|| corrupt(path, format!("row {} has no date", row + 1)))?;
        let date = parse_date(raw_date).map_err(|e| corrupt(path, e.to_string()))?;
        let source_url = urls
            .get(row)
            .ok_or_else(|| corrupt(path, format!("row {} has no source_url", row + 1)))?;

        let mut metrics = BTreeMap::new();
        for (metric, values) in &metric_columns {
            if let Some(value) = values.get(row) {
                metrics.insert(*metric, value);
            }
        }

        records.push(TimeSeriesRecord {
            location: location.to_string(),
            date,
            label: labels.get(row).map(str::to_string),
            source_url: source_url.to_string(),
            metrics,
        });
    }

    Ok(records)
}

/// Replace the file at `path` with the given series, all or nothing
pub fn write_series_atomic(
    path: &Path,
    domain: Domain,
    records: &[TimeSeriesRecord],
    order: RowOrder,
) -> Result<()> {
    let mut rows: Vec<TimeSeriesRecord> = records.to_vec();
    match order {
        RowOrder::Ascending => rows.sort_by_key(|r| r.date),
        RowOrder::Descending => rows.sort_by(|a, b| b.date.cmp(&a.date)),
    }
    let mut frame = records_to_frame(domain, &rows)?;

    replace_file_atomic(path, |file| {
        CsvWriter::new(file).include_header(true).finish(&mut frame)?;
        Ok(())
    })?;

    debug!("Wrote {} records to {}", rows.len(), path.display());
    Ok(())
}

/// Fill a temporary file next to `path` and rename it over `path` once
/// synced; on any error the temporary file is removed and `path` is left
/// as it was
pub(crate) fn replace_file_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut File) -> Result<()>,
{
    let directory = path.parent().unwrap_or_else(|| Path::new("."));
    let persist_error = |source: std::io::Error| IngestError::Persist {
        path: path.to_path_buf(),
        source,
    };

    let mut temp_file = tempfile::Builder::new()
        .prefix(".series-")
        .suffix(".tmp")
        .tempfile_in(directory)
        .map_err(persist_error)?;

    write(temp_file.as_file_mut())?;

    temp_file.as_file().sync_all().map_err(persist_error)?;
    temp_file
        .persist(path)
        .map_err(|e| persist_error(e.error))?;
    Ok(())
}

fn corrupt(path: &Path, reason: String) -> IngestError {
    IngestError::CorruptSeries {
        path: path.to_path_buf(),
        reason,
    }
}
