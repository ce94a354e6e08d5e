//! Utility functions for formatting and table comparison

pub mod formatting;
pub mod table_diff;

pub use formatting::{
    comma_separated_string_to_int_array, format_count_percent, format_decimal_with_comma,
    format_percent, format_with_thousands,
};
pub use table_diff::{TableComparison, compare_tables};
