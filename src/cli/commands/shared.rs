//! Helpers shared by the CLI commands

use crate::cli::args::GlobalArgs;
use crate::config::{BatchConfig, IngestConfig};
use crate::store::SeriesStore;
use anyhow::Context;
use std::sync::Arc;
use tracing::debug;

/// Set up structured logging on stderr.
///
/// `RUST_LOG` takes precedence over the verbosity flags.
pub fn setup_logging(args: &GlobalArgs) -> anyhow::Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("covid_ingest={}", log_level)));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if args.quiet {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
    result.context("failed to initialize logging")?;

    debug!("Logging initialized at level: {}", log_level);
    Ok(())
}

/// Build and check the process configuration
pub fn build_config(args: &GlobalArgs, batch: BatchConfig) -> anyhow::Result<IngestConfig> {
    let config = IngestConfig::new(args.store_config(), batch);
    config.validate()?;
    Ok(config)
}

/// Open the store named by the global options
pub fn open_store(config: &IngestConfig) -> anyhow::Result<Arc<SeriesStore>> {
    let store = SeriesStore::open(config.store.clone()).with_context(|| {
        format!(
            "cannot open series store at {}",
            config.store.root.display()
        )
    })?;
    Ok(Arc::new(store))
}
