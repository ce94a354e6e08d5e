//! Order-insensitive table comparison
//!
//! Two tables are considered identical when they hold the same columns and the
//! same multiset of rows, regardless of column order or row order. Column sets
//! are compared first; when they differ, row comparison is skipped entirely
//! because rows of differently-shaped tables are not comparable.

use std::cmp::Ordering;

use crate::models::table::{Cell, Table};

/// Result of comparing two tables
#[derive(Debug, Clone)]
pub struct TableComparison {
    /// Whether the tables are identical up to column and row order
    pub identical: bool,
    /// Column names present in the first table but not the second
    pub additional_columns_in_first: Vec<String>,
    /// Column names present in the second table but not the first
    pub additional_columns_in_second: Vec<String>,
    /// Row-count delta (first − second); `None` when rows were not compared
    pub additional_rows_in_first: Option<i64>,
    /// Row-count delta (second − first); `None` when rows were not compared
    pub additional_rows_in_second: Option<i64>,
    /// Rows of the first table absent from the second
    pub present_in_first_not_second: Option<Table>,
    /// Rows of the second table absent from the first
    pub present_in_second_not_first: Option<Table>,
}

impl TableComparison {
    fn identical_result() -> Self {
        Self {
            identical: true,
            additional_columns_in_first: Vec::new(),
            additional_columns_in_second: Vec::new(),
            additional_rows_in_first: None,
            additional_rows_in_second: None,
            present_in_first_not_second: None,
            present_in_second_not_first: None,
        }
    }
}

/// Compare two tables ignoring column order and row order
#[must_use]
pub fn compare_tables(first: &Table, second: &Table) -> TableComparison {
    let mut first_columns: Vec<String> = first.columns().to_vec();
    let mut second_columns: Vec<String> = second.columns().to_vec();
    first_columns.sort();
    second_columns.sort();

    if first_columns != second_columns {
        let additional_in_first = first_columns
            .iter()
            .filter(|c| !second_columns.contains(c))
            .cloned()
            .collect();
        let additional_in_second = second_columns
            .iter()
            .filter(|c| !first_columns.contains(c))
            .cloned()
            .collect();
        return TableComparison {
            identical: false,
            additional_columns_in_first: additional_in_first,
            additional_columns_in_second: additional_in_second,
            additional_rows_in_first: None,
            additional_rows_in_second: None,
            present_in_first_not_second: None,
            present_in_second_not_first: None,
        };
    }

    let first_sorted = first.with_column_order(&first_columns).with_sorted_rows();
    let second_sorted = second.with_column_order(&first_columns).with_sorted_rows();

    if first_sorted == second_sorted {
        return TableComparison::identical_result();
    }

    let (only_in_first, only_in_second) =
        multiset_row_difference(first_sorted.rows(), second_sorted.rows());

    let mut first_diff = Table::new(first_columns.clone());
    for row in only_in_first {
        first_diff.push_row(row);
    }
    let mut second_diff = Table::new(first_columns);
    for row in only_in_second {
        second_diff.push_row(row);
    }

    TableComparison {
        identical: false,
        additional_columns_in_first: Vec::new(),
        additional_columns_in_second: Vec::new(),
        additional_rows_in_first: Some(first.num_rows() as i64 - second.num_rows() as i64),
        additional_rows_in_second: Some(second.num_rows() as i64 - first.num_rows() as i64),
        present_in_first_not_second: Some(first_diff),
        present_in_second_not_first: Some(second_diff),
    }
}

/// Multiset difference of two row lists that are already sorted
fn multiset_row_difference(
    first: &[Vec<Cell>],
    second: &[Vec<Cell>],
) -> (Vec<Vec<Cell>>, Vec<Vec<Cell>>) {
    let mut only_in_first = Vec::new();
    let mut only_in_second = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < first.len() && j < second.len() {
        match first[i].cmp(&second[j]) {
            Ordering::Equal => {
                i += 1;
                j += 1;
            }
            Ordering::Less => {
                only_in_first.push(first[i].clone());
                i += 1;
            }
            Ordering::Greater => {
                only_in_second.push(second[j].clone());
                j += 1;
            }
        }
    }
    only_in_first.extend(first[i..].iter().cloned());
    only_in_second.extend(second[j..].iter().cloned());
    (only_in_first, only_in_second)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(columns: &[&str], rows: &[&[i64]]) -> Table {
        let mut table = Table::new(columns.iter().map(ToString::to_string).collect());
        for row in rows {
            table.push_row(row.iter().map(|&v| Cell::Int(v)).collect());
        }
        table
    }

    #[test]
    fn test_identical_up_to_order() {
        let first = sample(&["a", "b"], &[&[1, 10], &[2, 20]]);
        let second = sample(&["b", "a"], &[&[20, 2], &[10, 1]]);
        let comparison = compare_tables(&first, &second);
        assert!(comparison.identical);
        assert!(comparison.additional_rows_in_first.is_none());
    }

    #[test]
    fn test_column_mismatch_skips_row_comparison() {
        let first = sample(&["a", "b"], &[&[1, 10]]);
        let second = sample(&["a", "c"], &[&[1, 10]]);
        let comparison = compare_tables(&first, &second);
        assert!(!comparison.identical);
        assert_eq!(comparison.additional_columns_in_first, vec!["b".to_string()]);
        assert_eq!(comparison.additional_columns_in_second, vec!["c".to_string()]);
        assert!(comparison.present_in_first_not_second.is_none());
    }

    #[test]
    fn test_extra_row_is_reported() {
        let first = sample(&["a", "b"], &[&[1, 10], &[2, 20], &[3, 30]]);
        let second = sample(&["a", "b"], &[&[1, 10], &[2, 20]]);
        let comparison = compare_tables(&first, &second);
        assert!(!comparison.identical);
        assert_eq!(comparison.additional_rows_in_first, Some(1));
        assert_eq!(comparison.additional_rows_in_second, Some(-1));
        let diff = comparison.present_in_first_not_second.unwrap();
        assert_eq!(diff.num_rows(), 1);
        assert_eq!(diff.rows()[0], vec![Cell::Int(3), Cell::Int(30)]);
        assert_eq!(
            comparison.present_in_second_not_first.unwrap().num_rows(),
            0
        );
    }

    #[test]
    fn test_duplicate_rows_use_multiset_semantics() {
        let first = sample(&["a"], &[&[1], &[1]]);
        let second = sample(&["a"], &[&[1]]);
        let comparison = compare_tables(&first, &second);
        assert!(!comparison.identical);
        assert_eq!(
            comparison.present_in_first_not_second.unwrap().num_rows(),
            1
        );
    }
}
