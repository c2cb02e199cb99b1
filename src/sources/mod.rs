//! Built-in collectors.
//!
//! Source-specific scrapers live outside this crate. They hand their output
//! over as CSV files in a drop directory, which [`drop_file`] turns into
//! collection jobs.

pub mod drop_file;

pub use drop_file::{DropFileCollector, DropKind, discover_jobs, read_frame};
