//! Collectors backed by files in a drop directory
//!
//! Layout:
//!
//! ```text
//! <drop dir>/increments/<location>.csv   one candidate row, quick
//! <drop dir>/series/<location>.csv       whole history, full runs only
//! ```

use crate::collector::{Collector, CollectorOutput};
use crate::constants::{INCREMENTS_DIR_NAME, SERIES_DIR_NAME, SERIES_FILE_EXTENSION};
use crate::error::{IngestError, Result};
use crate::models::Domain;
use crate::normalizer::raw_records_from_frame;
use crate::orchestrator::JobSet;

use anyhow::{Context, bail};
use futures::FutureExt;
use futures::future::BoxFuture;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// What a drop file holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropKind {
    Increment,
    Series,
}

#[derive(Debug, Clone)]
pub struct DropFileCollector {
    location: String,
    path: PathBuf,
    kind: DropKind,
    domain: Domain,
}

impl DropFileCollector {
    pub fn new(
        location: impl Into<String>,
        path: impl Into<PathBuf>,
        kind: DropKind,
        domain: Domain,
    ) -> Self {
        Self {
            location: location.into(),
            path: path.into(),
            kind,
            domain,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> DropKind {
        self.kind
    }

    async fn read(&self) -> anyhow::Result<CollectorOutput> {
        if !self.path.exists() {
            return Ok(CollectorOutput::Nothing);
        }

        let path = self.path.clone();
        let frame = tokio::task::spawn_blocking(move || read_frame(&path))
            .await?
            .with_context(|| format!("reading {}", self.path.display()))?;

        match self.kind {
            DropKind::Series => Ok(CollectorOutput::FullSeries(frame)),
            DropKind::Increment => {
                if frame.height() != 1 {
                    bail!(
                        "{} must hold exactly one row, found {}",
                        self.path.display(),
                        frame.height()
                    );
                }
                let mut candidates = raw_records_from_frame(&self.location, self.domain, &frame)?;
                match candidates.pop() {
                    Some(candidate) => Ok(CollectorOutput::Increment(candidate)),
                    None => Ok(CollectorOutput::Nothing),
                }
            }
        }
    }
}

impl Collector for DropFileCollector {
    fn location(&self) -> &str {
        &self.location
    }

    fn is_quick(&self) -> bool {
        self.kind == DropKind::Increment
    }

    fn collect(&self) -> BoxFuture<'_, anyhow::Result<CollectorOutput>> {
        self.read().boxed()
    }
}

/// Read a loose CSV, inferring column types from every row
pub fn read_frame(path: &Path) -> Result<DataFrame> {
    let frame = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    Ok(frame)
}

/// One job per drop file; a location present in both sub-directories is
/// refused
pub fn discover_jobs(drop_dir: &Path, domain: Domain) -> Result<JobSet> {
    let mut jobs = JobSet::new();

    for (dir_name, kind) in [
        (INCREMENTS_DIR_NAME, DropKind::Increment),
        (SERIES_DIR_NAME, DropKind::Series),
    ] {
        for path in drop_files(&drop_dir.join(dir_name))? {
            let Some(location) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            debug!("Found {:?} drop file for {}", kind, location);
            let collector = DropFileCollector::new(location, &path, kind, domain);
            jobs.push(Arc::new(collector))?;
        }
    }

    Ok(jobs)
}

fn drop_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = dir.join(format!("*.{}", SERIES_FILE_EXTENSION));
    let entries =
        glob::glob(&pattern.to_string_lossy()).map_err(|e| IngestError::Configuration {
            message: format!("invalid drop directory pattern: {}", e),
        })?;

    let mut files = Vec::new();
    for entry in entries {
        files.push(entry.map_err(|e| IngestError::Io(e.into()))?);
    }
    files.sort();
    Ok(files)
}
