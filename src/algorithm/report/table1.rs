//! Table 1 grouping and long-to-wide pivoting
//!
//! A Table 1 specification groups covariates under labeled header rows for
//! presentation; it never changes the underlying values. The pivot turns
//! long-format report rows into a wide table with one column per period name.

use rustc_hash::FxHashMap;

use crate::models::covariate::Table1Specification;
use crate::models::table::{Cell, Table};
use crate::utils::formatting::comma_separated_string_to_int_array;

use super::{NON_TIME_VARYING, ReportOptions, ReportRow};

/// Group report rows under Table 1 labels
///
/// For each specification, in specification order: a synthetic header row
/// (covariate id 0, name = label) followed by the rows whose covariate id is
/// in the specification's id list. A covariate listed in two specifications
/// appears under both labels.
#[must_use]
pub fn group_rows(rows: Vec<ReportRow>, specifications: &[Table1Specification]) -> Vec<ReportRow> {
    let mut grouped = Vec::with_capacity(rows.len() + specifications.len());
    for spec in specifications {
        let ids: Vec<i64> = comma_separated_string_to_int_array(&spec.covariate_ids)
            .into_iter()
            .flatten()
            .collect();
        grouped.push(ReportRow {
            label: Some(spec.label.clone()),
            covariate_id: 0,
            covariate_name: spec.label.clone(),
            analysis_id: spec.analysis_id,
            analysis_name: String::new(),
            domain_id: String::new(),
            concept_id: 0,
            period_name: String::new(),
            sum_value: 0.0,
            average_value: 0.0,
            formatted: String::new(),
        });
        for row in rows.iter().filter(|r| ids.contains(&r.covariate_id)) {
            let mut labeled = row.clone();
            labeled.label = Some(spec.label.clone());
            grouped.push(labeled);
        }
    }
    grouped
}

/// Pivot long-format rows into a wide display table
///
/// Row keys keep their first-appearance order (header rows stay above their
/// group); period columns follow `period_order`. A key with no value for a
/// period gets an empty cell rather than being dropped.
#[must_use]
pub fn pivot_report(
    rows: &[ReportRow],
    period_order: &[String],
    grouped: bool,
    options: &ReportOptions,
) -> Table {
    // Selected windows keep their column even when no row carries a value;
    // only the synthetic non-time-varying column is dropped when unused.
    let periods: Vec<&String> = period_order
        .iter()
        .filter(|period| {
            period.as_str() != NON_TIME_VARYING
                || rows.iter().any(|row| &row.period_name == *period)
        })
        .collect();

    let mut columns: Vec<String> = if grouped {
        vec![
            "label".to_string(),
            "covariateId".to_string(),
            "covariateName".to_string(),
        ]
    } else {
        vec!["covariateId".to_string(), "covariateName".to_string()]
    };
    columns.extend(periods.iter().map(|p| (*p).clone()));

    // Row key → per-period formatted value, in first-appearance order
    type RowKey = (Option<String>, i64, String);
    let mut key_order: Vec<RowKey> = Vec::new();
    let mut cells: FxHashMap<RowKey, Vec<String>> = FxHashMap::default();
    for row in rows {
        let key = (row.label.clone(), row.covariate_id, row.covariate_name.clone());
        let values = cells.entry(key.clone()).or_insert_with(|| {
            key_order.push(key);
            vec![String::new(); periods.len()]
        });
        if let Some(index) = periods.iter().position(|p| **p == row.period_name) {
            values[index] = row.formatted.clone();
        }
    }

    let mut table = Table::new(columns);
    for key in key_order {
        let values = cells.remove(&key).expect("key recorded on insertion");
        let (label, covariate_id, covariate_name) = key;
        let mut table_row: Vec<Cell> = Vec::with_capacity(table.columns().len());
        if grouped {
            table_row.push(Cell::Str(label.unwrap_or_default()));
        }
        table_row.push(Cell::Int(covariate_id));
        table_row.push(Cell::Str(covariate_name));
        table_row.extend(values.into_iter().map(Cell::Str));
        table.push_row(table_row);
    }

    prepend_display_headers(&mut table, options);
    table
}

/// Prepend the optional display header rows (cohort name first)
fn prepend_display_headers(table: &mut Table, options: &ReportOptions) {
    let headers = [
        ("cohortName", &options.cohort_name),
        ("databaseId", &options.database_id),
        ("reportName", &options.report_name),
    ];
    let mut header_rows = Vec::new();
    for (label, value) in headers {
        if let Some(value) = value {
            let mut row = vec![Cell::Str(label.to_string()), Cell::Str(value.clone())];
            row.resize(table.columns().len(), Cell::Null);
            header_rows.push(row);
        }
    }
    if header_rows.is_empty() {
        return;
    }
    let mut rebuilt = Table::new(table.columns().to_vec());
    for row in header_rows {
        rebuilt.push_row(row);
    }
    for row in table.rows() {
        rebuilt.push_row(row.clone());
    }
    *table = rebuilt;
}
