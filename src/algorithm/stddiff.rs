//! Standardized mean differences between two cohorts
//!
//! For every selected time window, each covariate's distribution in the two
//! cohorts is reduced to a mean and standard deviation (binary covariates use
//! the proportion and its Bernoulli deviation), and the standardized
//! difference `(mean1 - mean2) / sqrt((sd1^2 + sd2^2) / 2)` is computed. A
//! covariate present in only one cohort yields a NaN difference rather than
//! an error, and a zero pooled deviation yields NaN rather than infinity.

use log::{info, warn};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::error::{CohortMetricsError, Result};
use crate::models::covariate::{CovariateData, TimeRef};
use crate::utils::table_diff::compare_tables;

/// Options for the standardized-difference computation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StdDiffOptions {
    /// Restrict to these `(startDay, endDay)` windows; `None` keeps every
    /// window the two datasets have in common
    pub time_restriction: Option<Vec<(i32, i32)>>,
    /// Also compute differences over the non-time-varying covariates
    pub include_non_time_varying: bool,
}

/// One covariate's standardized difference in one time window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StdDiffRow {
    /// Covariate identifier
    pub covariate_id: i64,
    /// Covariate name
    pub covariate_name: String,
    /// Window start; `None` on non-time-varying rows
    pub start_day: Option<i32>,
    /// Window end; `None` on non-time-varying rows
    pub end_day: Option<i32>,
    /// Mean (or proportion) in the first cohort; NaN when absent
    pub mean1: f64,
    /// Mean (or proportion) in the second cohort; NaN when absent
    pub mean2: f64,
    /// Standard deviation in the first cohort; 0 when absent
    pub sd1: f64,
    /// Standard deviation in the second cohort; 0 when absent
    pub sd2: f64,
    /// Standardized mean difference; NaN when undefined
    pub std_diff: f64,
}

/// Summary statistics over a standardized-difference result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StdDiffSummary {
    /// Total number of covariate/window rows
    pub total_covariates: usize,
    /// Rows with |standardized difference| above 0.1
    pub imbalanced_covariates: usize,
    /// Maximum |standardized difference| over defined rows
    pub max_absolute_std_diff: f64,
    /// Mean |standardized difference| over defined rows
    pub mean_absolute_std_diff: f64,
}

/// A standardized-difference result with its summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StdDiffReport {
    /// Per-covariate, per-window rows, sorted by window then covariate id
    pub rows: Vec<StdDiffRow>,
    /// Summary statistics
    pub summary: StdDiffSummary,
}

/// Threshold above which a covariate counts as imbalanced
const IMBALANCE_THRESHOLD: f64 = 0.1;

impl StdDiffReport {
    fn from_rows(rows: Vec<StdDiffRow>) -> Self {
        let mut imbalanced = 0;
        let mut max_abs = 0.0f64;
        let mut sum_abs = 0.0f64;
        let mut defined = 0usize;
        for row in &rows {
            let abs = row.std_diff.abs();
            if !abs.is_nan() {
                defined += 1;
                sum_abs += abs;
                max_abs = max_abs.max(abs);
                if abs > IMBALANCE_THRESHOLD {
                    imbalanced += 1;
                }
            }
        }
        let summary = StdDiffSummary {
            total_covariates: rows.len(),
            imbalanced_covariates: imbalanced,
            max_absolute_std_diff: max_abs,
            mean_absolute_std_diff: if defined == 0 {
                0.0
            } else {
                sum_abs / defined as f64
            },
        };
        Self { rows, summary }
    }

    /// Render the report as an aligned text table, most imbalanced first
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut output = format!(
            "Standardized Difference Summary:\n\
             - Total covariate/window rows: {}\n\
             - Imbalanced rows (|std diff| > {IMBALANCE_THRESHOLD}): {}\n\
             - Maximum |std diff|: {:.4}\n\
             - Mean |std diff|: {:.4}\n\n",
            self.summary.total_covariates,
            self.summary.imbalanced_covariates,
            self.summary.max_absolute_std_diff,
            self.summary.mean_absolute_std_diff
        );
        output.push_str(
            "Covariate                                | Window       | Mean 1   | Mean 2   | Std Diff\n\
             -----------------------------------------|--------------|----------|----------|---------\n",
        );
        let mut sorted = self.rows.clone();
        sorted.sort_by(|a, b| {
            b.std_diff
                .abs()
                .total_cmp(&a.std_diff.abs())
        });
        for row in &sorted {
            let window = match (row.start_day, row.end_day) {
                (Some(start), Some(end)) => format!("d{start}d{end}"),
                _ => "nonTimeVarying".to_string(),
            };
            output.push_str(&format!(
                "{:<40} | {:<12} | {:>8.4} | {:>8.4} | {:>8.4}\n",
                truncate(&row.covariate_name, 40),
                window,
                row.mean1,
                row.mean2,
                row.std_diff
            ));
        }
        output
    }
}

fn truncate(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        return text.to_string();
    }
    // Cut at a char boundary; a fixed byte offset could split a
    // multibyte character.
    let cut = text
        .char_indices()
        .map(|(index, _)| index)
        .take_while(|&index| index <= max_len - 3)
        .last()
        .unwrap_or(0);
    format!("{}...", &text[..cut])
}

/// Compute standardized differences between two cohorts' covariates
///
/// Returns `Ok(None)` when there is nothing to compute: no common time
/// windows and `include_non_time_varying` is off. That outcome is logged so
/// batch pipelines can tell it apart from a failure.
pub fn compute_standardized_difference(
    first: Option<&CovariateData>,
    second: Option<&CovariateData>,
    first_cohort_id: i64,
    second_cohort_id: i64,
    options: &StdDiffOptions,
) -> Result<Option<StdDiffReport>> {
    let (first, second) = match (first, second) {
        (Some(first), Some(second)) => (first, second),
        (None, None) => {
            return Err(CohortMetricsError::Configuration(
                "both covariate datasets are NULL".to_string(),
            ));
        }
        _ => {
            return Err(CohortMetricsError::Configuration(
                "standardized differences require two covariate datasets".to_string(),
            ));
        }
    };

    let windows = reconcile_time_windows(first, second, options);
    if windows.is_empty() && !options.include_non_time_varying {
        info!("includeNonTimeVarying is FALSE and no time windows are shared. no results.");
        return Ok(None);
    }

    let names: FxHashMap<i64, &str> = first
        .covariate_ref
        .iter()
        .chain(second.covariate_ref.iter())
        .map(|r| (r.covariate_id, r.covariate_name.as_str()))
        .collect();

    let mut rows: Vec<StdDiffRow> = windows
        .par_iter()
        .map(|window| {
            window_rows(
                first,
                second,
                first_cohort_id,
                second_cohort_id,
                Some(*window),
                &names,
            )
        })
        .reduce(Vec::new, |mut acc, mut chunk| {
            acc.append(&mut chunk);
            acc
        });

    if options.include_non_time_varying {
        rows.extend(window_rows(
            first,
            second,
            first_cohort_id,
            second_cohort_id,
            None,
            &names,
        ));
    }

    if rows.is_empty() {
        info!("no covariates in common scope; no standardized differences computed");
        return Ok(None);
    }

    Ok(Some(StdDiffReport::from_rows(rows)))
}

/// Determine the windows shared by both datasets, warning on any mismatch
fn reconcile_time_windows(
    first: &CovariateData,
    second: &CovariateData,
    options: &StdDiffOptions,
) -> Vec<TimeRef> {
    let comparison = compare_tables(&first.time_ref_table(), &second.time_ref_table());
    if !comparison.identical {
        warn!(
            "time window catalogs differ between the two covariate datasets; \
             restricting to the common subset"
        );
    }

    let second_windows: FxHashSet<TimeRef> = second
        .time_ref
        .as_deref()
        .unwrap_or_default()
        .iter()
        .copied()
        .collect();
    let mut common: Vec<TimeRef> = first
        .time_ref
        .as_deref()
        .unwrap_or_default()
        .iter()
        .filter(|window| second_windows.contains(window))
        .copied()
        .collect();

    if let Some(restriction) = &options.time_restriction {
        common.retain(|window| restriction.contains(&(window.start_day, window.end_day)));
    }
    common.sort_by_key(|window| (window.start_day, window.end_day));
    common
}

/// Standardized differences for one window (or the non-time-varying subset)
fn window_rows(
    first: &CovariateData,
    second: &CovariateData,
    first_cohort_id: i64,
    second_cohort_id: i64,
    window: Option<TimeRef>,
    names: &FxHashMap<i64, &str>,
) -> Vec<StdDiffRow> {
    let time_id = window.map(|w| w.time_id);
    let first_stats = covariate_stats(first, first_cohort_id, time_id);
    let second_stats = covariate_stats(second, second_cohort_id, time_id);

    let mut covariate_ids: Vec<i64> = first_stats
        .keys()
        .chain(second_stats.keys())
        .copied()
        .collect();
    covariate_ids.sort_unstable();
    covariate_ids.dedup();

    covariate_ids
        .into_iter()
        .map(|covariate_id| {
            // A covariate absent from one cohort contributes mean NaN and
            // sd 0, so the difference is NaN instead of a crash.
            let (mean1, sd1) = first_stats
                .get(&covariate_id)
                .copied()
                .unwrap_or((f64::NAN, 0.0));
            let (mean2, sd2) = second_stats
                .get(&covariate_id)
                .copied()
                .unwrap_or((f64::NAN, 0.0));
            StdDiffRow {
                covariate_id,
                covariate_name: names
                    .get(&covariate_id)
                    .map(|name| (*name).to_string())
                    .unwrap_or_default(),
                start_day: window.map(|w| w.start_day),
                end_day: window.map(|w| w.end_day),
                mean1,
                mean2,
                sd1,
                sd2,
                std_diff: standardized_difference(mean1, mean2, sd1, sd2),
            }
        })
        .collect()
}

/// Mean and standard deviation per covariate at one time id
///
/// Binary covariates use the proportion and its Bernoulli standard
/// deviation; continuous covariates use the reported mean and deviation.
fn covariate_stats(
    data: &CovariateData,
    cohort_id: i64,
    time_id: Option<i32>,
) -> FxHashMap<i64, (f64, f64)> {
    let mut stats = FxHashMap::default();
    for row in &data.covariates {
        if row.cohort_id == cohort_id && row.time_id == time_id {
            let sd = (row.average_value * (1.0 - row.average_value)).sqrt();
            stats.insert(row.covariate_id, (row.average_value, sd));
        }
    }
    for row in &data.covariates_continuous {
        if row.cohort_id == cohort_id && row.time_id == time_id {
            stats.insert(row.covariate_id, (row.average_value, row.standard_deviation));
        }
    }
    stats
}

fn standardized_difference(mean1: f64, mean2: f64, sd1: f64, sd2: f64) -> f64 {
    let pooled = ((sd1 * sd1 + sd2 * sd2) / 2.0).sqrt();
    if pooled == 0.0 {
        // Zero pooled variance: undefined, not infinite
        f64::NAN
    } else {
        (mean1 - mean2) / pooled
    }
}
