//! Collector contract.
//!
//! A collector knows how to reach one location's source and turn whatever
//! it publishes into the canonical candidate shape. It never writes to the
//! store; the runner does that with whatever the collector returns.

use crate::models::RawRecord;
use futures::future::BoxFuture;
use polars::prelude::DataFrame;

/// What a single collector call produced
#[derive(Debug, Clone)]
pub enum CollectorOutput {
    /// The source had nothing to report
    Nothing,
    /// One new observation to merge into the existing history
    Increment(RawRecord),
    /// The source's whole known history, to be normalized and swapped in
    FullSeries(DataFrame),
}

/// Source integration for one location.
///
/// Any error returned (or panic raised) by `collect` is contained by the
/// runner and reported as a failed attempt for this location only.
pub trait Collector: Send + Sync {
    /// Location this collector reports for
    fn location(&self) -> &str;

    /// Whether the collector is cheap enough for quick runs
    fn is_quick(&self) -> bool {
        false
    }

    /// Fetch and parse the source
    fn collect(&self) -> BoxFuture<'_, anyhow::Result<CollectorOutput>>;
}
