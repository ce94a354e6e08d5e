//! A Rust library for characterizing observational health cohorts: temporal
//! covariate reports, incidence and prevalence rates, and standardized
//! differences, with date-span algebra and exact display formatting.

pub mod algorithm;
pub mod error;
pub mod models;
pub mod utils;

// Re-export the most common types for easier use
// Core types
pub use error::{CohortMetricsError, Result};
pub use models::cohort::{CohortData, CohortEpisode, ObservationPeriod, PersonDemographics};
pub use models::covariate::{
    AnalysisRef, ContinuousCovariateRow, CovariateData, CovariateRef, CovariateRow,
    Table1Specification, TimeRef,
};
pub use models::span::{CalendarPeriod, CalendarUnit, DateSpan};
pub use models::table::{Cell, Table};

// Span algebra
pub use algorithm::spans::{
    collapse_date_spans, date_span_to_date_vector, date_vector_to_date_spans,
};

// Time-window catalog
pub use algorithm::windows::{
    PeriodType, SequentialTimePeriod, SettingsTimeWindow, TimeWindow,
    get_common_sequential_time_periods, get_covariate_settings_time_windows,
    get_default_time_windows,
};

// Rates
pub use algorithm::rates::{
    RateConfig, RateRow, RateType, compute_period_rates, render_rate_table,
};
pub use algorithm::rates::daily::{DailyRateRow, compute_daily_rates, regularize_daily_rates};

// Reports and comparisons
pub use algorithm::report::{Report, ReportOptions, build_report};
pub use algorithm::stddiff::{
    StdDiffOptions, StdDiffReport, StdDiffRow, compute_standardized_difference,
};
pub use utils::table_diff::{TableComparison, compare_tables};
