//! `normalize`: batch-mode replacement from a whole-history CSV

use crate::cli::args::{GlobalArgs, NormalizeArgs};
use crate::cli::commands::shared::{build_config, open_store};
use crate::config::BatchConfig;
use crate::normalizer::SeriesNormalizer;
use crate::sources::read_frame;
use anyhow::Context;
use colored::*;
use polars::prelude::{CsvWriter, SerWriter};
use std::fs::File;

pub async fn run_normalize(global: &GlobalArgs, args: &NormalizeArgs) -> anyhow::Result<i32> {
    let config = build_config(global, BatchConfig::default())?;

    let frame = read_frame(&args.input)
        .with_context(|| format!("cannot read {}", args.input.display()))?;

    let normalizer = SeriesNormalizer::new(config.store.domain, config.store.today());
    let series = normalizer
        .normalize(&args.location, &frame)
        .with_context(|| format!("{} was not accepted", args.input.display()))?;

    match &args.output {
        Some(output) => {
            let mut canonical = series.to_frame()?;
            let mut file = File::create(output)
                .with_context(|| format!("cannot create {}", output.display()))?;
            CsvWriter::new(&mut file)
                .include_header(true)
                .finish(&mut canonical)?;
            println!(
                "{} Wrote {} records for {} to {}",
                "✓".green().bold(),
                series.records.len(),
                args.location,
                output.display()
            );
        }
        None => {
            let store = open_store(&config)?;
            let rows = store.replace_full_series(&args.location, series.records)?;
            println!(
                "{} Replaced series for {} ({} records)",
                "✓".green().bold(),
                args.location,
                rows
            );
        }
    }

    if series.dropped_partial > 0 {
        println!(
            "  {} rows dated {} or later left out as partial",
            series.dropped_partial,
            config.store.today()
        );
    }

    Ok(0)
}
