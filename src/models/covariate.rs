//! Covariate measurement and reference models
//!
//! These mirror the tables supplied by the external feature-extraction data
//! source: binary covariate measurements, continuous covariate distributions,
//! and the covariate/analysis/time reference tables that describe them.

use serde::{Deserialize, Serialize};

use crate::error::{CohortMetricsError, Result};
use crate::models::table::{Cell, Table};

/// Encode a synthetic cohort-as-covariate identifier
///
/// The convention `covariateId = conceptId * 1000 + analysisId` is relied on
/// elsewhere to recover the concept id, so it must not change.
#[must_use]
pub const fn encode_cohort_covariate_id(concept_id: i64, analysis_id: i64) -> i64 {
    concept_id * 1000 + analysis_id
}

/// Recover the concept id from a synthetic cohort-covariate identifier
#[must_use]
pub const fn decode_cohort_concept_id(covariate_id: i64, analysis_id: i64) -> i64 {
    (covariate_id - analysis_id) / 1000
}

/// A binary covariate measurement: subject count and prevalence per window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CovariateRow {
    /// Cohort the measurement belongs to
    pub cohort_id: i64,
    /// Covariate identifier
    pub covariate_id: i64,
    /// Time-window identifier; `None` for non-time-varying covariates
    pub time_id: Option<i32>,
    /// Number of subjects with the covariate
    pub sum_value: f64,
    /// Proportion of subjects with the covariate
    pub average_value: f64,
}

/// A continuous covariate measurement: distribution statistics per window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuousCovariateRow {
    /// Cohort the measurement belongs to
    pub cohort_id: i64,
    /// Covariate identifier
    pub covariate_id: i64,
    /// Time-window identifier; `None` for non-time-varying covariates
    pub time_id: Option<i32>,
    /// Number of subjects contributing a value
    pub count_value: f64,
    /// Minimum observed value
    pub min_value: f64,
    /// Maximum observed value
    pub max_value: f64,
    /// Mean value
    pub average_value: f64,
    /// Standard deviation
    pub standard_deviation: f64,
    /// Median value
    pub median_value: f64,
    /// 10th percentile
    pub p10_value: f64,
    /// 25th percentile
    pub p25_value: f64,
    /// 75th percentile
    pub p75_value: f64,
    /// 90th percentile
    pub p90_value: f64,
}

/// Covariate reference metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CovariateRef {
    /// Covariate identifier
    pub covariate_id: i64,
    /// Human-readable covariate name
    pub covariate_name: String,
    /// Analysis the covariate belongs to
    pub analysis_id: i64,
    /// Source vocabulary concept; 0 for synthetic cohort covariates
    pub concept_id: i64,
}

/// Analysis reference metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRef {
    /// Analysis identifier
    pub analysis_id: i64,
    /// Human-readable analysis name
    pub analysis_name: String,
    /// Source domain (condition, drug, procedure, ...)
    pub domain_id: String,
    /// Whether covariates of this analysis are binary
    pub is_binary: bool,
}

/// A time-window reference row: the dataset's own window catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRef {
    /// Time-window identifier used by measurement rows
    pub time_id: i32,
    /// Window start, in days relative to the index date
    pub start_day: i32,
    /// Window end, in days relative to the index date
    pub end_day: i32,
}

/// A presentation grouping for "Table 1"-style reports
///
/// Pure labeling: it groups covariates under a header row and has no effect on
/// the aggregated values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table1Specification {
    /// Group label shown as the header row
    pub label: String,
    /// Analysis the grouped covariates belong to
    pub analysis_id: i64,
    /// Comma-joined covariate id list (e.g. `"8532001,8507001"`)
    pub covariate_ids: String,
}

/// A covariate dataset: measurements plus the reference tables describing them
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CovariateData {
    /// Binary covariate measurements
    pub covariates: Vec<CovariateRow>,
    /// Continuous covariate measurements
    pub covariates_continuous: Vec<ContinuousCovariateRow>,
    /// Covariate reference metadata
    pub covariate_ref: Vec<CovariateRef>,
    /// Analysis reference metadata
    pub analysis_ref: Vec<AnalysisRef>,
    /// The dataset's own time-window catalog; `None` when the dataset has no
    /// time dimension at all (everything is non-time-varying)
    pub time_ref: Option<Vec<TimeRef>>,
}

impl CovariateData {
    /// Render the time reference as a dynamic table for catalog comparison
    #[must_use]
    pub fn time_ref_table(&self) -> Table {
        let mut table = Table::new(vec![
            "timeId".to_string(),
            "startDay".to_string(),
            "endDay".to_string(),
        ]);
        if let Some(time_ref) = &self.time_ref {
            for row in time_ref {
                table.push_row(vec![
                    Cell::Int(i64::from(row.time_id)),
                    Cell::Int(i64::from(row.start_day)),
                    Cell::Int(i64::from(row.end_day)),
                ]);
            }
        }
        table
    }

    /// Build a dataset from externally supplied dynamic tables
    ///
    /// This is the schema-validation boundary: every table is checked for its
    /// required columns before any row is parsed, and a missing `timeId`
    /// column on the covariate tables marks the dataset as entirely
    /// non-time-varying.
    pub fn from_tables(
        covariates: &Table,
        covariates_continuous: &Table,
        covariate_ref: &Table,
        analysis_ref: &Table,
        time_ref: Option<&Table>,
    ) -> Result<Self> {
        covariates.require_columns(
            "covariates",
            &["cohortId", "covariateId", "sumValue", "averageValue"],
        )?;
        covariates_continuous.require_columns(
            "covariatesContinuous",
            &[
                "cohortId",
                "covariateId",
                "countValue",
                "minValue",
                "maxValue",
                "averageValue",
                "standardDeviation",
                "medianValue",
                "p10Value",
                "p25Value",
                "p75Value",
                "p90Value",
            ],
        )?;
        covariate_ref.require_columns(
            "covariateRef",
            &["covariateId", "covariateName", "analysisId", "conceptId"],
        )?;
        analysis_ref.require_columns(
            "analysisRef",
            &["analysisId", "analysisName", "domainId", "isBinary"],
        )?;
        if let Some(time_ref) = time_ref {
            time_ref.require_columns("timeRef", &["timeId", "startDay", "endDay"])?;
        }

        let has_time_column = covariates.column_index("timeId").is_some();
        let mut parsed = Self::default();

        for row in 0..covariates.num_rows() {
            parsed.covariates.push(CovariateRow {
                cohort_id: int_cell(covariates, row, "cohortId")?,
                covariate_id: int_cell(covariates, row, "covariateId")?,
                time_id: optional_time_id(covariates, row, has_time_column),
                sum_value: float_cell(covariates, row, "sumValue")?,
                average_value: float_cell(covariates, row, "averageValue")?,
            });
        }

        let has_time_column = covariates_continuous.column_index("timeId").is_some();
        for row in 0..covariates_continuous.num_rows() {
            let t = covariates_continuous;
            parsed.covariates_continuous.push(ContinuousCovariateRow {
                cohort_id: int_cell(t, row, "cohortId")?,
                covariate_id: int_cell(t, row, "covariateId")?,
                time_id: optional_time_id(t, row, has_time_column),
                count_value: float_cell(t, row, "countValue")?,
                min_value: float_cell(t, row, "minValue")?,
                max_value: float_cell(t, row, "maxValue")?,
                average_value: float_cell(t, row, "averageValue")?,
                standard_deviation: float_cell(t, row, "standardDeviation")?,
                median_value: float_cell(t, row, "medianValue")?,
                p10_value: float_cell(t, row, "p10Value")?,
                p25_value: float_cell(t, row, "p25Value")?,
                p75_value: float_cell(t, row, "p75Value")?,
                p90_value: float_cell(t, row, "p90Value")?,
            });
        }

        for row in 0..covariate_ref.num_rows() {
            parsed.covariate_ref.push(CovariateRef {
                covariate_id: int_cell(covariate_ref, row, "covariateId")?,
                covariate_name: string_cell(covariate_ref, row, "covariateName"),
                analysis_id: int_cell(covariate_ref, row, "analysisId")?,
                concept_id: int_cell(covariate_ref, row, "conceptId")?,
            });
        }

        for row in 0..analysis_ref.num_rows() {
            parsed.analysis_ref.push(AnalysisRef {
                analysis_id: int_cell(analysis_ref, row, "analysisId")?,
                analysis_name: string_cell(analysis_ref, row, "analysisName"),
                domain_id: string_cell(analysis_ref, row, "domainId"),
                is_binary: int_cell(analysis_ref, row, "isBinary")? != 0,
            });
        }

        if let Some(time_ref) = time_ref {
            let mut rows = Vec::with_capacity(time_ref.num_rows());
            for row in 0..time_ref.num_rows() {
                rows.push(TimeRef {
                    time_id: int_cell(time_ref, row, "timeId")? as i32,
                    start_day: int_cell(time_ref, row, "startDay")? as i32,
                    end_day: int_cell(time_ref, row, "endDay")? as i32,
                });
            }
            parsed.time_ref = Some(rows);
        }

        Ok(parsed)
    }
}

fn int_cell(table: &Table, row: usize, column: &str) -> Result<i64> {
    match table.cell(row, column) {
        Some(Cell::Int(v)) => Ok(*v),
        Some(Cell::Float(v)) => Ok(*v as i64),
        other => Err(CohortMetricsError::InvalidInput(format!(
            "expected integer in column `{column}` row {row}, found {other:?}"
        ))),
    }
}

fn float_cell(table: &Table, row: usize, column: &str) -> Result<f64> {
    match table.cell(row, column) {
        Some(Cell::Float(v)) => Ok(*v),
        Some(Cell::Int(v)) => Ok(*v as f64),
        Some(Cell::Null) => Ok(f64::NAN),
        other => Err(CohortMetricsError::InvalidInput(format!(
            "expected number in column `{column}` row {row}, found {other:?}"
        ))),
    }
}

fn string_cell(table: &Table, row: usize, column: &str) -> String {
    table
        .cell(row, column)
        .map(Cell::display)
        .unwrap_or_default()
}

fn optional_time_id(table: &Table, row: usize, has_time_column: bool) -> Option<i32> {
    if !has_time_column {
        return None;
    }
    match table.cell(row, "timeId") {
        Some(Cell::Int(v)) => Some(*v as i32),
        Some(Cell::Float(v)) => Some(*v as i32),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cohort_covariate_id_round_trip() {
        let covariate_id = encode_cohort_covariate_id(8532, 1);
        assert_eq!(covariate_id, 8_532_001);
        assert_eq!(decode_cohort_concept_id(covariate_id, 1), 8532);
    }

    #[test]
    fn test_from_tables_missing_columns() {
        let covariates = Table::new(vec!["cohortId".to_string()]);
        let empty = Table::new(vec![]);
        let err = CovariateData::from_tables(&covariates, &empty, &empty, &empty, None)
            .unwrap_err();
        assert!(matches!(err, CohortMetricsError::Schema { .. }));
    }

    #[test]
    fn test_from_tables_coerces_float_time_id() {
        let mut covariates = Table::new(
            ["cohortId", "covariateId", "timeId", "sumValue", "averageValue"]
                .iter()
                .map(ToString::to_string)
                .collect(),
        );
        covariates.push_row(vec![
            Cell::Int(1),
            Cell::Int(8_532_001),
            Cell::Float(2.0),
            Cell::Float(10.0),
            Cell::Float(0.5),
        ]);
        covariates.push_row(vec![
            Cell::Int(1),
            Cell::Int(8_532_001),
            Cell::Null,
            Cell::Float(10.0),
            Cell::Float(0.5),
        ]);
        let continuous = Table::new(
            [
                "cohortId",
                "covariateId",
                "countValue",
                "minValue",
                "maxValue",
                "averageValue",
                "standardDeviation",
                "medianValue",
                "p10Value",
                "p25Value",
                "p75Value",
                "p90Value",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
        );
        let covariate_ref = Table::new(
            ["covariateId", "covariateName", "analysisId", "conceptId"]
                .iter()
                .map(ToString::to_string)
                .collect(),
        );
        let analysis_ref = Table::new(
            ["analysisId", "analysisName", "domainId", "isBinary"]
                .iter()
                .map(ToString::to_string)
                .collect(),
        );

        let data =
            CovariateData::from_tables(&covariates, &continuous, &covariate_ref, &analysis_ref, None)
                .unwrap();
        // Floats coerce like every other integer column; Null stays None
        assert_eq!(data.covariates[0].time_id, Some(2));
        assert_eq!(data.covariates[1].time_id, None);
    }

    #[test]
    fn test_from_tables_without_time_column() {
        let mut covariates = Table::new(
            ["cohortId", "covariateId", "sumValue", "averageValue"]
                .iter()
                .map(ToString::to_string)
                .collect(),
        );
        covariates.push_row(vec![
            Cell::Int(1),
            Cell::Int(8_532_001),
            Cell::Float(10.0),
            Cell::Float(0.5),
        ]);
        let continuous = Table::new(
            [
                "cohortId",
                "covariateId",
                "countValue",
                "minValue",
                "maxValue",
                "averageValue",
                "standardDeviation",
                "medianValue",
                "p10Value",
                "p25Value",
                "p75Value",
                "p90Value",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
        );
        let covariate_ref = Table::new(
            ["covariateId", "covariateName", "analysisId", "conceptId"]
                .iter()
                .map(ToString::to_string)
                .collect(),
        );
        let analysis_ref = Table::new(
            ["analysisId", "analysisName", "domainId", "isBinary"]
                .iter()
                .map(ToString::to_string)
                .collect(),
        );

        let data =
            CovariateData::from_tables(&covariates, &continuous, &covariate_ref, &analysis_ref, None)
                .unwrap();
        assert_eq!(data.covariates.len(), 1);
        assert_eq!(data.covariates[0].time_id, None);
        assert!(data.time_ref.is_none());
    }
}
