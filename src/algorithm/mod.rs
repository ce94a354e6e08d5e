//! Algorithm implementations for cohort characterization workflows
//!
//! This module contains the computational pieces of the crate: date-span
//! algebra, the time-window catalog, incidence and prevalence rate
//! aggregation, feature-extraction report building, and standardized
//! differences between cohorts.

pub mod rates;
pub mod report;
pub mod spans;
pub mod stddiff;
pub mod windows;

pub use rates::{RateConfig, RateRow, RateType, compute_period_rates, render_rate_table};
pub use rates::daily::{DailyRateRow, compute_daily_rates, regularize_daily_rates};
pub use report::{Report, ReportOptions, ReportRow, build_report};
pub use spans::{collapse_date_spans, date_span_to_date_vector, date_vector_to_date_spans};
pub use stddiff::{StdDiffOptions, StdDiffReport, StdDiffRow, compute_standardized_difference};
pub use windows::{
    PeriodType, SequentialTimePeriod, SettingsTimeWindow, TimeWindow,
    get_common_sequential_time_periods, get_covariate_settings_time_windows,
    get_default_time_windows,
};
