//! Display formatting for report tables
//!
//! The decimal formatter reproduces a specific legacy behavior: the number is
//! split at its floor, the fractional part is rounded or truncated on its own,
//! and the two halves are concatenated. Downstream report consumers compare
//! these strings byte-for-byte, so the split must not be "simplified" into a
//! single rounding step.

use log::warn;

/// Render an integer with thousands separators (e.g. `-1234568` → `"-1,234,568"`)
#[must_use]
pub fn format_with_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if value < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

/// Format a number with thousands separators and a fixed number of decimals
///
/// The integer part is the floor of the number, so the fractional part is
/// always in `[0, 1)` even for negative inputs. With `round = false` the
/// fraction is truncated instead of rounded. With `decimal_places = 0` the
/// result keeps a trailing `"."` and an empty fraction.
#[must_use]
pub fn format_decimal_with_comma(number: f64, decimal_places: usize, round: bool) -> String {
    let integer_part = number.floor();
    let mut decimal_part = number - integer_part;

    let factor = 10f64.powi(decimal_places as i32);
    decimal_part = if round {
        (decimal_part * factor).round() / factor
    } else {
        (decimal_part * factor).trunc() / factor
    };

    let rendered = format!("{decimal_part:.decimal_places$}");
    let fraction_digits = rendered.split_once('.').map_or("", |(_, digits)| digits);

    format!(
        "{}.{}",
        format_with_thousands(integer_part as i64),
        fraction_digits
    )
}

/// Format a proportion as a percentage string (e.g. `0.789` → `"78.90%"` at 2 digits)
#[must_use]
pub fn format_percent(proportion: f64, digits: usize) -> String {
    format!("{:.digits$}%", proportion * 100.0)
}

/// Format a count with its percentage, e.g. `"123,456 (78.9%)"`
#[must_use]
pub fn format_count_percent(count: f64, percent: f64, percent_digits: usize) -> String {
    format!(
        "{} ({})",
        format_with_thousands(count.round() as i64),
        format_percent(percent, percent_digits)
    )
}

/// Parse a comma-separated integer list
///
/// Empty segments are skipped; segments that fail to parse are kept as `None`
/// (the tabular NA convention) and logged, so a single bad entry does not
/// shift the positions of the remaining values.
#[must_use]
pub fn comma_separated_string_to_int_array(input: &str) -> Vec<Option<i64>> {
    input
        .split(',')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(|segment| match segment.parse::<i64>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("could not parse `{segment}` as an integer; keeping NA");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_decimal_with_comma_rounding() {
        assert_eq!(format_decimal_with_comma(1_234_567.8912, 1, true), "1,234,567.9");
        assert_eq!(
            format_decimal_with_comma(1_234_567.8912, 2, false),
            "1,234,567.89"
        );
    }

    #[test]
    fn test_format_decimal_with_comma_negative() {
        // floor rounds toward negative infinity, so the fraction stays in [0, 1)
        assert_eq!(
            format_decimal_with_comma(-1_234_567.8912, 1, true),
            "-1,234,568.1"
        );
    }

    #[test]
    fn test_format_decimal_with_comma_zero_places() {
        assert_eq!(format_decimal_with_comma(1234.5678, 0, true), "1,234.");
    }

    #[test]
    fn test_format_count_percent() {
        assert_eq!(format_count_percent(123_456.0, 0.789, 1), "123,456 (78.9%)");
        assert_eq!(format_count_percent(0.0, 0.0, 2), "0 (0.00%)");
    }

    #[test]
    fn test_comma_separated_string_to_int_array() {
        assert_eq!(
            comma_separated_string_to_int_array("8,,9,,,10"),
            vec![Some(8), Some(9), Some(10)]
        );
        assert!(comma_separated_string_to_int_array("").is_empty());
        assert_eq!(
            comma_separated_string_to_int_array("14,abc,16"),
            vec![Some(14), None, Some(16)]
        );
    }

    #[test]
    fn test_format_with_thousands() {
        assert_eq!(format_with_thousands(0), "0");
        assert_eq!(format_with_thousands(999), "999");
        assert_eq!(format_with_thousands(1_000), "1,000");
        assert_eq!(format_with_thousands(-1_234_568), "-1,234,568");
    }
}
