//! `run`: collect every drop file and merge it into the store

use crate::cli::args::{GlobalArgs, RunArgs};
use crate::cli::commands::shared::{build_config, open_store};
use crate::orchestrator::BatchOrchestrator;
use crate::runner::CollectorRunner;
use crate::sources::discover_jobs;
use anyhow::bail;
use tracing::{info, warn};

pub async fn run_ingest(global: &GlobalArgs, args: &RunArgs) -> anyhow::Result<i32> {
    if !args.drop_dir.is_dir() {
        bail!("drop directory {} does not exist", args.drop_dir.display());
    }

    let config = build_config(global, args.batch_config(!global.quiet))?;
    let store = open_store(&config)?;

    let jobs = discover_jobs(&args.drop_dir, config.store.domain)?;
    if jobs.is_empty() {
        warn!("No drop files found in {}", args.drop_dir.display());
    }
    info!(
        "Running {} jobs from {} into {}",
        jobs.len(),
        args.drop_dir.display(),
        config.store.root.display()
    );

    let runner = CollectorRunner::new(store, config.batch.collector_timeout);
    let report = BatchOrchestrator::new(runner, &config.batch).run(jobs).await;

    print!("{}", report.render());
    Ok(report.exit_code())
}
