//! Final per-run report

use crate::constants::EXIT_CODE_PARTIAL_FAILURE;
use crate::runner::RunOutcome;
use colored::*;
use std::fmt;

/// Final state of one job
#[derive(Debug, Clone, PartialEq)]
pub struct JobResult {
    pub location: String,
    pub outcome: RunOutcome,
    /// 1 on first-attempt success, 2 once retried
    pub attempts: u32,
}

/// Outcome of a batch run, sorted by location within each list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// Jobs that succeeded on the first attempt or on the retry
    pub succeeded: Vec<JobResult>,
    /// Jobs still failing after the retry pass
    pub failed: Vec<JobResult>,
    /// Locations left out by the run mode
    pub skipped: Vec<String>,
}

impl BatchReport {
    pub fn succeeded_locations(&self) -> Vec<&str> {
        self.succeeded.iter().map(|r| r.location.as_str()).collect()
    }

    pub fn failed_locations(&self) -> Vec<&str> {
        self.failed.iter().map(|r| r.location.as_str()).collect()
    }

    /// Jobs that needed the retry pass to succeed
    pub fn recovered(&self) -> usize {
        self.succeeded.iter().filter(|r| r.attempts > 1).count()
    }

    /// No location failed
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Process exit code for monitoring: 0 on full success
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            EXIT_CODE_PARTIAL_FAILURE
        }
    }

    /// Two-list operator summary
    pub fn render(&self) -> String {
        let mut out = String::new();

        out.push_str(&format!(
            "{} {} succeeded",
            "✓".green().bold(),
            self.succeeded.len()
        ));
        if self.recovered() > 0 {
            out.push_str(&format!(" ({} after retry)", self.recovered()));
        }
        out.push('\n');
        for result in &self.succeeded {
            out.push_str(&format!("  {} {}\n", result.location, result.outcome.to_string().dimmed()));
        }

        if !self.failed.is_empty() {
            out.push_str(&format!(
                "{} {} failed after retry\n",
                "✗".red().bold(),
                self.failed.len()
            ));
            for result in &self.failed {
                out.push_str(&format!(
                    "  {} {}\n",
                    result.location.red(),
                    result.outcome.to_string().yellow()
                ));
            }
        }

        if !self.skipped.is_empty() {
            out.push_str(&format!(
                "{} {} skipped: {}\n",
                "-".dimmed(),
                self.skipped.len(),
                self.skipped.join(", ")
            ));
        }

        out
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}
