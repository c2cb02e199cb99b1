//! Command implementations
//!
//! Each subcommand lives in its own module and returns the process exit
//! code on success; errors are printed by `main`.

pub mod latest;
pub mod normalize;
pub mod run;
pub mod shared;
pub mod validate;

use crate::cli::args::{Args, Commands};

/// Dispatch to the selected subcommand
pub async fn run(args: Args) -> anyhow::Result<i32> {
    shared::setup_logging(&args.global)?;

    match &args.command {
        Commands::Run(run_args) => run::run_ingest(&args.global, run_args).await,
        Commands::Normalize(normalize_args) => {
            normalize::run_normalize(&args.global, normalize_args).await
        }
        Commands::Validate(validate_args) => {
            validate::run_validate(&args.global, validate_args).await
        }
        Commands::Latest(latest_args) => latest::run_latest(&args.global, latest_args).await,
    }
}
