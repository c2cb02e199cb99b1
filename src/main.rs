use clap::Parser;
use covid_ingest::cli::{args::Args, commands};
use covid_ingest::constants::EXIT_CODE_INTERRUPTED;
use std::process;

fn main() {
    let args = Args::parse();

    let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("Failed to create async runtime: {}", e);
        process::exit(1);
    });

    let result = runtime.block_on(async {
        // Series writes are rename-based, so stopping mid-run leaves every
        // file either old or new
        tokio::select! {
            result = commands::run(args) => result,
            signal = tokio::signal::ctrl_c() => match signal {
                Ok(()) => {
                    eprintln!("\nReceived CTRL+C, shutting down...");
                    Ok(EXIT_CODE_INTERRUPTED)
                }
                Err(e) => Err(anyhow::Error::new(e).context("failed to listen for CTRL+C")),
            },
        }
    });

    match result {
        Ok(code) => process::exit(code),
        Err(error) => {
            eprintln!("Error: {:#}", error);
            process::exit(1);
        }
    }
}
