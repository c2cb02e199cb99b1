//! `latest`: print the most recent stored record

use crate::cli::args::{GlobalArgs, LatestArgs};
use crate::cli::commands::shared::{build_config, open_store};
use crate::config::BatchConfig;
use anyhow::bail;

pub async fn run_latest(global: &GlobalArgs, args: &LatestArgs) -> anyhow::Result<i32> {
    let config = build_config(global, BatchConfig::default())?;
    let store = open_store(&config)?;

    let Some(record) = store.latest(&args.location)? else {
        bail!("no series stored for {}", args.location);
    };

    println!("{} on {}", record.location, record.date_string());
    if let Some(label) = &record.label {
        println!("  {}: {}", store.domain().label_column(), label);
    }
    for &metric in store.domain().metrics() {
        match record.get(metric) {
            Some(value) => println!("  {}: {}", metric, value),
            None => println!("  {}: -", metric),
        }
    }
    println!("  source_url: {}", record.source_url);

    Ok(0)
}
