//! `validate`: re-check every stored series

use crate::cli::args::{GlobalArgs, ValidateArgs};
use crate::cli::commands::shared::{build_config, open_store};
use crate::config::BatchConfig;
use crate::constants::EXIT_CODE_PARTIAL_FAILURE;
use crate::store::integrity::find_violations;
use colored::*;
use tracing::debug;

pub async fn run_validate(global: &GlobalArgs, args: &ValidateArgs) -> anyhow::Result<i32> {
    let config = build_config(global, BatchConfig::default())?;
    let store = open_store(&config)?;

    let locations = if args.locations.is_empty() {
        store.locations()?
    } else {
        args.locations.clone()
    };

    let mut broken = 0;
    for location in &locations {
        let records = match store.load(location) {
            Ok(records) => records,
            Err(e) => {
                broken += 1;
                println!("{} {}: {}", "✗".red().bold(), location, e);
                continue;
            }
        };

        // Incrementally built series may legitimately hold today's row
        let violations = find_violations(location, store.domain(), &records, None);
        if violations.is_empty() {
            debug!("{} passed ({} records)", location, records.len());
            println!("{} {} ({} records)", "✓".green(), location, records.len());
        } else {
            broken += 1;
            println!("{} {}", "✗".red().bold(), location);
            for violation in violations {
                println!("    {}", violation.to_string().yellow());
            }
        }
    }

    println!(
        "\n{} of {} series passed",
        locations.len() - broken,
        locations.len()
    );

    Ok(if broken == 0 {
        0
    } else {
        EXIT_CODE_PARTIAL_FAILURE
    })
}
