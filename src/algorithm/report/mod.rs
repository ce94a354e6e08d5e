//! Feature-extraction report building
//!
//! Joins covariate measurements against their reference metadata and the
//! time-window catalog, applies inclusion filters and the binary prevalence
//! floor, formats values for display, and pivots the result into a wide
//! "Table 1"-style comparison table.

pub mod table1;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{CohortMetricsError, Result};
use crate::models::covariate::{
    AnalysisRef, CovariateData, CovariateRef, Table1Specification, decode_cohort_concept_id,
};
use crate::models::table::Table;
use crate::utils::formatting::{
    comma_separated_string_to_int_array, format_count_percent, format_decimal_with_comma,
};
use crate::algorithm::windows::period_name;

use rustc_hash::{FxHashMap, FxHashSet};

/// Period name used for covariates without a time dimension
pub const NON_TIME_VARYING: &str = "nonTimeVarying";

/// A continuous-covariate distribution statistic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistributionStatistic {
    /// Mean value
    Average,
    /// Standard deviation
    StandardDeviation,
    /// Median value
    Median,
    /// 10th percentile
    P10,
    /// 25th percentile
    P25,
    /// 75th percentile
    P75,
    /// 90th percentile
    P90,
}

impl DistributionStatistic {
    /// All statistics, in report column order
    pub const ALL: [Self; 7] = [
        Self::Average,
        Self::StandardDeviation,
        Self::Median,
        Self::P10,
        Self::P25,
        Self::P75,
        Self::P90,
    ];

    /// Short name appended to the covariate name, i.e. the source column
    /// name with its `Value` suffix stripped
    #[must_use]
    pub const fn short_name(&self) -> &'static str {
        match self {
            Self::Average => "average",
            Self::StandardDeviation => "standardDeviation",
            Self::Median => "median",
            Self::P10 => "p10",
            Self::P25 => "p25",
            Self::P75 => "p75",
            Self::P90 => "p90",
        }
    }

    fn extract(&self, row: &crate::models::covariate::ContinuousCovariateRow) -> f64 {
        match self {
            Self::Average => row.average_value,
            Self::StandardDeviation => row.standard_deviation,
            Self::Median => row.median_value,
            Self::P10 => row.p10_value,
            Self::P25 => row.p25_value,
            Self::P75 => row.p75_value,
            Self::P90 => row.p90_value,
        }
    }
}

/// Options controlling report content and presentation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportOptions {
    /// Restrict to these covariate ids (intersected with any Table 1 ids)
    pub included_covariate_ids: Option<Vec<i64>>,
    /// Drop these covariate ids
    pub excluded_covariate_ids: Vec<i64>,
    /// Explicit window start days (parallel to `end_days`)
    pub start_days: Option<Vec<i32>>,
    /// Explicit window end days (parallel to `start_days`)
    pub end_days: Option<Vec<i32>>,
    /// Prevalence floor for binary covariates; rows at or below it are dropped
    pub min_average_value: f64,
    /// Continuous statistics to report
    pub distribution_statistics: Vec<DistributionStatistic>,
    /// Round (true) or truncate (false) formatted decimals
    pub round: bool,
    /// Digits for the percentage in binary cells
    pub percent_digits: usize,
    /// Presentation grouping; an empty list is a configuration error
    pub table1_specifications: Option<Vec<Table1Specification>>,
    /// Optional display header row
    pub cohort_name: Option<String>,
    /// Optional display header row
    pub database_id: Option<String>,
    /// Optional display header row
    pub report_name: Option<String>,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            included_covariate_ids: None,
            excluded_covariate_ids: Vec::new(),
            start_days: None,
            end_days: None,
            min_average_value: 0.01,
            distribution_statistics: DistributionStatistic::ALL.to_vec(),
            round: true,
            percent_digits: 1,
            table1_specifications: None,
            cohort_name: None,
            database_id: None,
            report_name: None,
        }
    }
}

/// One long-format report row before pivoting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    /// Table 1 group label, when grouping is in effect
    pub label: Option<String>,
    /// Covariate identifier; 0 on synthetic group-header rows
    pub covariate_id: i64,
    /// Covariate name, with the statistic suffix for continuous rows
    pub covariate_name: String,
    /// Analysis identifier
    pub analysis_id: i64,
    /// Analysis name
    pub analysis_name: String,
    /// Source domain
    pub domain_id: String,
    /// Concept id, backfilled for synthetic cohort covariates
    pub concept_id: i64,
    /// Period name of the time window (or `"nonTimeVarying"`)
    pub period_name: String,
    /// Subject count (binary) or contributing count (continuous)
    pub sum_value: f64,
    /// Proportion (binary) or statistic value (continuous)
    pub average_value: f64,
    /// Display-formatted value
    pub formatted: String,
}

/// A finished report: long-format raw rows plus the pivoted display table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Long-format rows, one per covariate/window/statistic
    pub raw: Vec<ReportRow>,
    /// Wide display table with one column per period name
    pub formatted: Table,
}

/// Build a covariate report for one cohort
///
/// Returns `Ok(None)` when filtering leaves nothing to report; that is a
/// logged no-data outcome, not an error.
pub fn build_report(
    data: &CovariateData,
    cohort_id: i64,
    options: &ReportOptions,
) -> Result<Option<Report>> {
    let included = resolve_included_ids(options)?;
    let windows = resolve_windows(data, options)?;

    let covariate_refs: FxHashMap<i64, &CovariateRef> = data
        .covariate_ref
        .iter()
        .map(|r| (r.covariate_id, r))
        .collect();
    let analysis_refs: FxHashMap<i64, &AnalysisRef> = data
        .analysis_ref
        .iter()
        .map(|r| (r.analysis_id, r))
        .collect();

    let keep = |covariate_id: i64| {
        !options.excluded_covariate_ids.contains(&covariate_id)
            && included
                .as_ref()
                .is_none_or(|ids| ids.contains(&covariate_id))
    };

    let mut rows = Vec::new();

    for row in &data.covariates {
        if row.cohort_id != cohort_id
            || !keep(row.covariate_id)
            || row.average_value <= options.min_average_value
        {
            continue;
        }
        let Some(period) = windows.period_for(row.time_id) else {
            continue;
        };
        let Some((covariate_ref, analysis_ref)) =
            lookup_refs(&covariate_refs, &analysis_refs, row.covariate_id)
        else {
            continue;
        };
        rows.push(ReportRow {
            label: None,
            covariate_id: row.covariate_id,
            covariate_name: covariate_ref.covariate_name.clone(),
            analysis_id: covariate_ref.analysis_id,
            analysis_name: analysis_ref.analysis_name.clone(),
            domain_id: analysis_ref.domain_id.clone(),
            concept_id: backfill_concept_id(covariate_ref),
            period_name: period.clone(),
            sum_value: row.sum_value,
            average_value: row.average_value,
            formatted: format_count_percent(
                row.sum_value,
                row.average_value,
                options.percent_digits,
            ),
        });
    }

    for row in &data.covariates_continuous {
        if row.cohort_id != cohort_id || !keep(row.covariate_id) {
            continue;
        }
        let Some(period) = windows.period_for(row.time_id) else {
            continue;
        };
        let Some((covariate_ref, analysis_ref)) =
            lookup_refs(&covariate_refs, &analysis_refs, row.covariate_id)
        else {
            continue;
        };
        // One output row per statistic; the count applies once per covariate
        // and period, so it rides along on every statistic row.
        for statistic in &options.distribution_statistics {
            let value = statistic.extract(row);
            rows.push(ReportRow {
                label: None,
                covariate_id: row.covariate_id,
                covariate_name: format!(
                    "{} ({})",
                    covariate_ref.covariate_name,
                    statistic.short_name()
                ),
                analysis_id: covariate_ref.analysis_id,
                analysis_name: analysis_ref.analysis_name.clone(),
                domain_id: analysis_ref.domain_id.clone(),
                concept_id: backfill_concept_id(covariate_ref),
                period_name: period.clone(),
                sum_value: row.count_value,
                average_value: value,
                formatted: format_decimal_with_comma(value, 1, options.round),
            });
        }
    }

    if rows.is_empty() {
        info!("no covariate rows remained after filtering for cohort {cohort_id}; nothing to report");
        return Ok(None);
    }

    let rows = match &options.table1_specifications {
        Some(specifications) => table1::group_rows(rows, specifications),
        None => rows,
    };

    let formatted = table1::pivot_report(
        &rows,
        &windows.period_order,
        options.table1_specifications.is_some(),
        options,
    );

    Ok(Some(Report { raw: rows, formatted }))
}

fn lookup_refs<'a>(
    covariate_refs: &FxHashMap<i64, &'a CovariateRef>,
    analysis_refs: &FxHashMap<i64, &'a AnalysisRef>,
    covariate_id: i64,
) -> Option<(&'a CovariateRef, &'a AnalysisRef)> {
    let covariate_ref = covariate_refs.get(&covariate_id)?;
    let analysis_ref = analysis_refs.get(&covariate_ref.analysis_id)?;
    Some((covariate_ref, analysis_ref))
}

/// Recover the concept id for synthetic cohort covariates, which carry
/// concept id 0 in the reference table
fn backfill_concept_id(covariate_ref: &CovariateRef) -> i64 {
    if covariate_ref.concept_id == 0 {
        decode_cohort_concept_id(covariate_ref.covariate_id, covariate_ref.analysis_id)
    } else {
        covariate_ref.concept_id
    }
}

/// Resolved window selection: time id → period name, plus column order
struct WindowSelection {
    period_by_time_id: FxHashMap<i32, String>,
    period_order: Vec<String>,
}

impl WindowSelection {
    fn period_for(&self, time_id: Option<i32>) -> Option<&String> {
        match time_id {
            None => self.period_order.last().filter(|p| *p == NON_TIME_VARYING),
            Some(id) => self.period_by_time_id.get(&id),
        }
    }
}

fn resolve_windows(data: &CovariateData, options: &ReportOptions) -> Result<WindowSelection> {
    let restriction: Option<FxHashSet<(i32, i32)>> = match (&options.start_days, &options.end_days)
    {
        (None, None) => None,
        (Some(starts), Some(ends)) if starts.len() == ends.len() => {
            Some(starts.iter().copied().zip(ends.iter().copied()).collect())
        }
        _ => {
            return Err(CohortMetricsError::Configuration(
                "startDays and endDays must both be given and have the same length".to_string(),
            ));
        }
    };

    let mut period_by_time_id = FxHashMap::default();
    let mut selected: Vec<(i32, i32, String)> = Vec::new();
    if let Some(time_ref) = &data.time_ref {
        for row in time_ref {
            let pair = (row.start_day, row.end_day);
            if restriction.as_ref().is_none_or(|set| set.contains(&pair)) {
                let name = period_name(Some(row.start_day), Some(row.end_day));
                period_by_time_id.insert(row.time_id, name.clone());
                selected.push((row.start_day, row.end_day, name));
            }
        }
    }
    selected.sort();
    selected.dedup();
    let mut period_order: Vec<String> = selected.into_iter().map(|(_, _, name)| name).collect();
    // Non-time-varying covariates always come last
    period_order.push(NON_TIME_VARYING.to_string());

    Ok(WindowSelection {
        period_by_time_id,
        period_order,
    })
}

fn resolve_included_ids(options: &ReportOptions) -> Result<Option<FxHashSet<i64>>> {
    let spec_ids: Option<FxHashSet<i64>> = match &options.table1_specifications {
        None => None,
        Some(specifications) if specifications.is_empty() => {
            return Err(CohortMetricsError::Configuration(
                "Table 1 specifications are empty".to_string(),
            ));
        }
        Some(specifications) => Some(
            specifications
                .iter()
                .flat_map(|spec| comma_separated_string_to_int_array(&spec.covariate_ids))
                .flatten()
                .collect(),
        ),
    };

    Ok(match (&options.included_covariate_ids, spec_ids) {
        (None, None) => None,
        (Some(explicit), None) => Some(explicit.iter().copied().collect()),
        (None, Some(from_spec)) => Some(from_spec),
        (Some(explicit), Some(from_spec)) => Some(
            explicit
                .iter()
                .copied()
                .filter(|id| from_spec.contains(id))
                .collect(),
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::covariate::{ContinuousCovariateRow, CovariateRow, TimeRef};
    use crate::models::table::Cell;

    fn sample_data() -> CovariateData {
        CovariateData {
            covariates: vec![
                CovariateRow {
                    cohort_id: 1,
                    covariate_id: 8_532_001,
                    time_id: Some(1),
                    sum_value: 10.0,
                    average_value: 0.5,
                },
                CovariateRow {
                    cohort_id: 1,
                    covariate_id: 8_532_001,
                    time_id: Some(2),
                    sum_value: 12.0,
                    average_value: 0.6,
                },
                // Below the default prevalence floor
                CovariateRow {
                    cohort_id: 1,
                    covariate_id: 4_001_002,
                    time_id: Some(1),
                    sum_value: 1.0,
                    average_value: 0.005,
                },
                // Different cohort
                CovariateRow {
                    cohort_id: 2,
                    covariate_id: 8_532_001,
                    time_id: Some(1),
                    sum_value: 99.0,
                    average_value: 0.9,
                },
            ],
            covariates_continuous: vec![ContinuousCovariateRow {
                cohort_id: 1,
                covariate_id: 1_002_003,
                time_id: None,
                count_value: 20.0,
                min_value: 1.0,
                max_value: 99.0,
                average_value: 50.5,
                standard_deviation: 12.3,
                median_value: 51.0,
                p10_value: 30.0,
                p25_value: 40.0,
                p75_value: 60.0,
                p90_value: 70.0,
            }],
            covariate_ref: vec![
                CovariateRef {
                    covariate_id: 8_532_001,
                    covariate_name: "gender = FEMALE".to_string(),
                    analysis_id: 1,
                    concept_id: 8532,
                },
                CovariateRef {
                    covariate_id: 4_001_002,
                    covariate_name: "some condition".to_string(),
                    analysis_id: 2,
                    concept_id: 0,
                },
                CovariateRef {
                    covariate_id: 1_002_003,
                    covariate_name: "age in years".to_string(),
                    analysis_id: 3,
                    concept_id: 0,
                },
            ],
            analysis_ref: vec![
                AnalysisRef {
                    analysis_id: 1,
                    analysis_name: "DemographicsGender".to_string(),
                    domain_id: "Demographics".to_string(),
                    is_binary: true,
                },
                AnalysisRef {
                    analysis_id: 2,
                    analysis_name: "ConditionGroupEraAnyTimePrior".to_string(),
                    domain_id: "Condition".to_string(),
                    is_binary: true,
                },
                AnalysisRef {
                    analysis_id: 3,
                    analysis_name: "DemographicsAge".to_string(),
                    domain_id: "Demographics".to_string(),
                    is_binary: false,
                },
            ],
            time_ref: Some(vec![
                TimeRef {
                    time_id: 1,
                    start_day: -30,
                    end_day: -1,
                },
                TimeRef {
                    time_id: 2,
                    start_day: -365,
                    end_day: -31,
                },
            ]),
        }
    }

    #[test]
    fn test_binary_rows_are_formatted_and_floored() {
        let report = build_report(&sample_data(), 1, &ReportOptions::default())
            .unwrap()
            .unwrap();
        let binary: Vec<_> = report
            .raw
            .iter()
            .filter(|r| r.covariate_id == 8_532_001)
            .collect();
        assert_eq!(binary.len(), 2);
        assert_eq!(binary[0].formatted, "10 (50.0%)");
        // The 0.5% row fell below the default floor
        assert!(!report.raw.iter().any(|r| r.covariate_id == 4_001_002));
        // The other cohort's rows are ignored
        assert!(!report.raw.iter().any(|r| r.sum_value == 99.0));
    }

    #[test]
    fn test_continuous_rows_expand_per_statistic() {
        let report = build_report(&sample_data(), 1, &ReportOptions::default())
            .unwrap()
            .unwrap();
        let continuous: Vec<_> = report
            .raw
            .iter()
            .filter(|r| r.covariate_id == 1_002_003)
            .collect();
        assert_eq!(continuous.len(), DistributionStatistic::ALL.len());
        assert!(
            continuous
                .iter()
                .any(|r| r.covariate_name == "age in years (average)" && r.average_value == 50.5)
        );
        assert!(
            continuous
                .iter()
                .any(|r| r.covariate_name == "age in years (p90)" && r.average_value == 70.0)
        );
        // Count rides along on every statistic row
        assert!(continuous.iter().all(|r| r.sum_value == 20.0));
        assert!(continuous.iter().all(|r| r.period_name == NON_TIME_VARYING));
    }

    #[test]
    fn test_concept_id_backfill() {
        let options = ReportOptions {
            min_average_value: 0.0,
            ..ReportOptions::default()
        };
        let report = build_report(&sample_data(), 1, &options).unwrap().unwrap();
        let backfilled = report
            .raw
            .iter()
            .find(|r| r.covariate_id == 4_001_002)
            .unwrap();
        assert_eq!(backfilled.concept_id, 4001);
    }

    #[test]
    fn test_nothing_to_report_returns_none() {
        let options = ReportOptions {
            excluded_covariate_ids: vec![8_532_001, 4_001_002, 1_002_003],
            ..ReportOptions::default()
        };
        assert!(build_report(&sample_data(), 1, &options).unwrap().is_none());
    }

    #[test]
    fn test_empty_table1_specifications_is_an_error() {
        let options = ReportOptions {
            table1_specifications: Some(Vec::new()),
            ..ReportOptions::default()
        };
        let err = build_report(&sample_data(), 1, &options).unwrap_err();
        assert!(matches!(err, CohortMetricsError::Configuration(_)));
    }

    #[test]
    fn test_mismatched_window_restriction_is_an_error() {
        let options = ReportOptions {
            start_days: Some(vec![-30]),
            end_days: None,
            ..ReportOptions::default()
        };
        let err = build_report(&sample_data(), 1, &options).unwrap_err();
        assert!(matches!(err, CohortMetricsError::Configuration(_)));
    }

    #[test]
    fn test_pivot_orders_periods_and_fills_missing_cells() {
        let report = build_report(&sample_data(), 1, &ReportOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(
            report.formatted.columns(),
            &[
                "covariateId".to_string(),
                "covariateName".to_string(),
                "d-365d-31".to_string(),
                "d-30d-1".to_string(),
                NON_TIME_VARYING.to_string(),
            ]
        );
        // The continuous covariate has no windowed cells
        let age_row = report
            .formatted
            .rows()
            .iter()
            .find(|r| r[1] == Cell::Str("age in years (average)".to_string()))
            .unwrap();
        assert_eq!(age_row[2], Cell::Str(String::new()));
        assert_eq!(age_row[4], Cell::Str("50.5".to_string()));
    }

    #[test]
    fn test_selected_windows_keep_empty_columns() {
        // Only the non-time-varying covariate survives, yet both requested
        // windows keep their (empty) columns.
        let options = ReportOptions {
            included_covariate_ids: Some(vec![1_002_003]),
            start_days: Some(vec![-365, -30]),
            end_days: Some(vec![-31, -1]),
            ..ReportOptions::default()
        };
        let report = build_report(&sample_data(), 1, &options).unwrap().unwrap();
        assert_eq!(
            report.formatted.columns(),
            &[
                "covariateId".to_string(),
                "covariateName".to_string(),
                "d-365d-31".to_string(),
                "d-30d-1".to_string(),
                NON_TIME_VARYING.to_string(),
            ]
        );
        let row = &report.formatted.rows()[0];
        assert_eq!(row[2], Cell::Str(String::new()));
        assert_eq!(row[3], Cell::Str(String::new()));
    }

    #[test]
    fn test_table1_grouping_adds_header_rows_and_label_column() {
        let options = ReportOptions {
            table1_specifications: Some(vec![Table1Specification {
                label: "Demographics".to_string(),
                analysis_id: 1,
                covariate_ids: "8532001,1002003".to_string(),
            }]),
            ..ReportOptions::default()
        };
        let report = build_report(&sample_data(), 1, &options).unwrap().unwrap();
        let header = &report.raw[0];
        assert_eq!(header.covariate_id, 0);
        assert_eq!(header.covariate_name, "Demographics");
        assert_eq!(header.label.as_deref(), Some("Demographics"));
        assert!(report.raw[1..].iter().all(|r| r.label.is_some()));
        assert_eq!(report.formatted.columns()[0], "label");
        // Covariates outside the specification are excluded entirely
        assert!(!report.raw.iter().any(|r| r.covariate_id == 4_001_002));
    }

    #[test]
    fn test_display_headers_are_prepended() {
        let options = ReportOptions {
            cohort_name: Some("Target".to_string()),
            report_name: Some("Characterization".to_string()),
            ..ReportOptions::default()
        };
        let report = build_report(&sample_data(), 1, &options).unwrap().unwrap();
        let rows = report.formatted.rows();
        assert_eq!(rows[0][0], Cell::Str("cohortName".to_string()));
        assert_eq!(rows[0][1], Cell::Str("Target".to_string()));
        assert_eq!(rows[1][0], Cell::Str("reportName".to_string()));
        assert_eq!(rows[0][2], Cell::Null);
    }
}
