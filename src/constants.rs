//! Application constants for the ingestion core
//!
//! Column names, file layout conventions and default values shared by the
//! store, the normalizer and the CLI.

// =============================================================================
// Column Names
// =============================================================================

pub mod columns {
    pub const LOCATION: &str = "location";
    pub const DATE: &str = "date";
    pub const VACCINE: &str = "vaccine";
    pub const UNITS: &str = "units";
    pub const SOURCE_URL: &str = "source_url";

    pub const TOTAL_VACCINATIONS: &str = "total_vaccinations";
    pub const PEOPLE_VACCINATED: &str = "people_vaccinated";
    pub const PEOPLE_FULLY_VACCINATED: &str = "people_fully_vaccinated";

    pub const CUMULATIVE_TOTAL: &str = "cumulative_total";
    pub const DAILY_CHANGE: &str = "daily_change";

    /// Canonical column order of vaccination files
    pub const VACCINATION_COLUMNS: &[&str] = &[
        LOCATION,
        DATE,
        VACCINE,
        SOURCE_URL,
        TOTAL_VACCINATIONS,
        PEOPLE_VACCINATED,
        PEOPLE_FULLY_VACCINATED,
    ];

    /// Canonical column order of testing files
    pub const TESTING_COLUMNS: &[&str] = &[
        LOCATION,
        DATE,
        UNITS,
        SOURCE_URL,
        CUMULATIVE_TOTAL,
        DAILY_CHANGE,
    ];
}

// =============================================================================
// Formats and Layout
// =============================================================================

/// Canonical date representation
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Extension of per-location series files
pub const SERIES_FILE_EXTENSION: &str = "csv";

/// Drop directory holding single-observation candidate files
pub const INCREMENTS_DIR_NAME: &str = "increments";

/// Drop directory holding whole-history candidate files
pub const SERIES_DIR_NAME: &str = "series";

/// Application directory under the user data directory
pub const APP_DIR_NAME: &str = "covid-ingest";

/// Largest count no other integer rounds onto as a float (2^53 - 1)
pub const MAX_EXACT_COUNT: f64 = 9_007_199_254_740_991.0;

// =============================================================================
// Batch Defaults
// =============================================================================

/// Upper bound on the default worker pool size
pub const MAX_DEFAULT_PARALLELISM: usize = 8;

/// Default per-collector timeout in seconds
pub const DEFAULT_COLLECTOR_TIMEOUT_SECS: u64 = 120;

/// Exit code when at least one location failed after retry
pub const EXIT_CODE_PARTIAL_FAILURE: i32 = 2;

/// Exit code after an interrupt (128 + SIGINT)
pub const EXIT_CODE_INTERRUPTED: i32 = 130;
