//! Error handling for cohort characterization and rate computation.
//!
//! Only conditions that invalidate a computation are errors. Empty cohorts,
//! filters that remove every row, and mismatched time-window catalogs are
//! non-fatal: they are logged and surfaced as empty or `None` results so batch
//! pipelines can tell "nothing to compute" apart from "crashed".

use thiserror::Error;

/// Specialized error type for cohort-metrics operations
#[derive(Debug, Error)]
pub enum CohortMetricsError {
    /// Bad or missing required arguments
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Input table is missing required columns
    #[error("schema error: input table `{table}` is missing required columns: {}", missing_columns.join(", "))]
    Schema {
        /// Name of the offending table
        table: String,
        /// Columns that were required but absent
        missing_columns: Vec<String>,
    },

    /// Input rows violate a structural precondition
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for cohort-metrics operations
pub type Result<T> = std::result::Result<T, CohortMetricsError>;
