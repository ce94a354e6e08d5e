//! Lightweight dynamic table
//!
//! A [`Table`] is a column-named grid of [`Cell`] values. It is the exchange
//! format for pivoted report output, for order-insensitive table comparison,
//! and for schema-validated ingestion of externally supplied tabular data.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{CohortMetricsError, Result};

/// A single table cell
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Cell {
    /// Missing value
    Null,
    /// Integer value
    Int(i64),
    /// Floating point value
    Float(f64),
    /// Text value
    Str(String),
}

impl Cell {
    /// Render the cell for display; `Null` renders as the empty string
    #[must_use]
    pub fn display(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Int(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Str(v) => v.clone(),
        }
    }

    /// Interpret the cell as an integer, if possible
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Int(_) => 1,
            Self::Float(_) => 2,
            Self::Str(_) => 3,
        }
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Cell {}

impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cell {
    /// Total order across cell types: nulls first, then integers, floats
    /// (ordered by `total_cmp`), then text
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Str(a), Self::Str(b)) => a.cmp(b),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// A named-column grid of cells
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Create an empty table with the given column names
    #[must_use]
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Column names, in table order
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// All rows, in table order
    #[must_use]
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Number of rows
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Append a row; the row is padded or truncated to the column count
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Null);
        self.rows.push(row);
    }

    /// Index of a column by name
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell at `(row, column-name)`, if both exist
    #[must_use]
    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)
    }

    /// Validate that every named column is present
    ///
    /// Returns a `Schema` error naming all missing columns at once, so a
    /// caller sees the complete deficit rather than one column per attempt.
    pub fn require_columns(&self, table_name: &str, required: &[&str]) -> Result<()> {
        let missing: Vec<String> = required
            .iter()
            .filter(|name| self.column_index(name).is_none())
            .map(|name| (*name).to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(CohortMetricsError::Schema {
                table: table_name.to_string(),
                missing_columns: missing,
            })
        }
    }

    /// Return a copy with columns rearranged into the given order
    ///
    /// Column names absent from the table are ignored.
    #[must_use]
    pub fn with_column_order(&self, order: &[String]) -> Self {
        let indices: Vec<usize> = order
            .iter()
            .filter_map(|name| self.column_index(name))
            .collect();
        let columns = indices.iter().map(|&i| self.columns[i].clone()).collect();
        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();
        Self { columns, rows }
    }

    /// Return a copy with rows sorted lexicographically by every column
    #[must_use]
    pub fn with_sorted_rows(&self) -> Self {
        let mut sorted = self.clone();
        sorted.rows.sort();
        sorted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_columns_reports_all_missing() {
        let table = Table::new(vec!["a".to_string(), "b".to_string()]);
        let err = table.require_columns("demo", &["a", "x", "y"]).unwrap_err();
        match err {
            CohortMetricsError::Schema {
                table,
                missing_columns,
            } => {
                assert_eq!(table, "demo");
                assert_eq!(missing_columns, vec!["x".to_string(), "y".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_cell_ordering_is_total() {
        let mut cells = vec![
            Cell::Str("b".to_string()),
            Cell::Float(1.5),
            Cell::Null,
            Cell::Int(2),
            Cell::Float(f64::NAN),
        ];
        cells.sort();
        assert_eq!(cells[0], Cell::Null);
        assert_eq!(cells[1], Cell::Int(2));
        // NaN sorts after all finite floats under total_cmp
        assert!(matches!(cells[3], Cell::Float(v) if v.is_nan()));
    }

    #[test]
    fn test_column_reorder_and_row_sort() {
        let mut table = Table::new(vec!["b".to_string(), "a".to_string()]);
        table.push_row(vec![Cell::Int(2), Cell::Int(20)]);
        table.push_row(vec![Cell::Int(1), Cell::Int(10)]);
        let reordered = table.with_column_order(&["a".to_string(), "b".to_string()]);
        assert_eq!(reordered.columns(), &["a".to_string(), "b".to_string()]);
        let sorted = reordered.with_sorted_rows();
        assert_eq!(sorted.rows()[0], vec![Cell::Int(10), Cell::Int(1)]);
    }
}
