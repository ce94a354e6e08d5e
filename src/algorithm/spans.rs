//! Date-span algebra
//!
//! Collapsing merges spans whose gaps are small enough; conversion between
//! date vectors and spans underpins both rate-period construction and the
//! regularization of day-level series.

use chrono::{Duration, NaiveDate, Weekday};
use itertools::Itertools;

use crate::error::{CohortMetricsError, Result};
use crate::models::span::{CalendarUnit, DateSpan};

/// Merge overlapping or near-overlapping spans
///
/// Spans are merged within a group whenever the next span starts no more than
/// `gap` days after the running maximum end date seen so far. The running
/// maximum matters: a wide early span can swallow later spans that a purely
/// pairwise adjacent merge would keep separate. `gap` has no default because
/// legacy call sites disagreed on one; every caller must choose explicitly.
pub fn collapse_date_spans(spans: &[DateSpan], gap: i64) -> Result<Vec<DateSpan>> {
    if gap < 0 {
        return Err(CohortMetricsError::Configuration(format!(
            "gap must be a non-negative number of days, got {gap}"
        )));
    }
    for span in spans {
        if span.end_date < span.start_date {
            return Err(CohortMetricsError::InvalidInput(format!(
                "span ends before it starts: {} > {}",
                span.start_date, span.end_date
            )));
        }
    }

    let mut sorted: Vec<&DateSpan> = spans.iter().collect();
    sorted.sort_by(|a, b| {
        (&a.group_key, a.start_date, a.end_date).cmp(&(&b.group_key, b.start_date, b.end_date))
    });

    let mut collapsed = Vec::new();
    for (group_key, group) in &sorted.iter().chunk_by(|span| span.group_key.clone()) {
        let mut current: Option<(NaiveDate, NaiveDate)> = None;
        for span in group {
            match current {
                Some((run_start, run_end))
                    if span.start_date <= run_end + Duration::days(gap) =>
                {
                    // Cumulative maximum: an earlier span may already reach
                    // beyond this one.
                    current = Some((run_start, run_end.max(span.end_date)));
                }
                Some((run_start, run_end)) => {
                    collapsed.push(DateSpan {
                        group_key: group_key.clone(),
                        start_date: run_start,
                        end_date: run_end,
                    });
                    current = Some((span.start_date, span.end_date));
                }
                None => current = Some((span.start_date, span.end_date)),
            }
        }
        if let Some((run_start, run_end)) = current {
            collapsed.push(DateSpan {
                group_key: group_key.clone(),
                start_date: run_start,
                end_date: run_end,
            });
        }
    }
    Ok(collapsed)
}

/// Expand spans into the sorted, deduplicated vector of dates they cover
#[must_use]
pub fn date_span_to_date_vector(spans: &[DateSpan]) -> Vec<NaiveDate> {
    let mut dates: Vec<NaiveDate> = spans
        .iter()
        .flat_map(|span| {
            let days = span.len_days().max(0) as usize;
            (0..days).map(|offset| span.start_date + Duration::days(offset as i64))
        })
        .collect();
    dates.sort_unstable();
    dates.dedup();
    dates
}

/// Convert a date vector into spans of strictly consecutive days
///
/// Unlike [`collapse_date_spans`] this allows no gap at all: a run breaks as
/// soon as two dates are not consecutive calendar days. When `unit` is given,
/// each run is additionally intersected with the calendar buckets of that
/// unit, producing one span per `(run × intersecting bucket)` with bucket
/// boundaries clipped to the run.
#[must_use]
pub fn date_vector_to_date_spans(
    dates: &[NaiveDate],
    unit: Option<CalendarUnit>,
    week_start: Option<Weekday>,
) -> Vec<DateSpan> {
    let mut sorted = dates.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut runs: Vec<(NaiveDate, NaiveDate)> = Vec::new();
    for date in sorted {
        match runs.last_mut() {
            Some((_, run_end)) if date == *run_end + Duration::days(1) => *run_end = date,
            _ => runs.push((date, date)),
        }
    }

    match unit {
        None => runs
            .into_iter()
            .map(|(start, end)| DateSpan::new(start, end))
            .collect(),
        Some(unit) => {
            let mut spans = Vec::new();
            for (run_start, run_end) in runs {
                let mut cursor = run_start;
                while cursor <= run_end {
                    let bucket_end = unit.ceiling(cursor, week_start).min(run_end);
                    spans.push(DateSpan::new(cursor, bucket_end));
                    cursor = bucket_end + Duration::days(1);
                }
            }
            spans
        }
    }
}
