//! Time-window catalog
//!
//! The catalog of named relative-day windows is static reference data, loaded
//! once per process and never mutated. Windows are identified by their period
//! name, a pure function of the start and end day offsets.

use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::error::{CohortMetricsError, Result};

/// Period granularity of sequential windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeriodType {
    /// 30-day sequential windows
    Month,
    /// Yearly sequential windows
    Year,
}

/// A named relative time window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Window start, in days relative to the index date; `None` = unbounded
    pub start_day: Option<i32>,
    /// Window end, in days relative to the index date; `None` = unbounded
    pub end_day: Option<i32>,
    /// Canonical name, always `"d{startDay}d{endDay}"` with `None` as `"NA"`
    pub period_name: String,
    /// Descriptive window kind; `None` for the unbounded anytime-prior row
    pub window_type: Option<String>,
    /// Constant 1 per row; mapping over a filtered catalog yields the
    /// all-ones vector that aligns count-of-windows arrays
    pub window_count: i32,
}

/// The result of matching caller-supplied day offsets against the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsTimeWindow {
    /// Window start from the caller's settings
    pub start_day: i32,
    /// Window end from the caller's settings
    pub end_day: i32,
    /// Catalog period name; `None` when the pair is not a catalog window
    pub period_name: Option<String>,
    /// Catalog window kind; `None` when the pair is not a catalog window
    pub window_type: Option<String>,
}

/// A fixed sequential analysis period with its time id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequentialTimePeriod {
    /// Time identifier referenced by covariate measurement rows
    pub time_id: i32,
    /// Period start, in days relative to the index date
    pub start_day: i32,
    /// Period end, in days relative to the index date
    pub end_day: i32,
}

/// Render the canonical period name for a day-offset pair
///
/// Unbounded offsets render as the literal text `"NA"`, so the fully
/// unbounded window is named `"dNAdNA"`.
#[must_use]
pub fn period_name(start_day: Option<i32>, end_day: Option<i32>) -> String {
    let render = |day: Option<i32>| day.map_or_else(|| "NA".to_string(), |d| d.to_string());
    format!("d{}d{}", render(start_day), render(end_day))
}

struct CatalogEntry {
    start_day: Option<i32>,
    end_day: Option<i32>,
    window_type: Option<&'static str>,
    cumulative: bool,
    period_type: Option<PeriodType>,
}

impl CatalogEntry {
    fn to_window(&self) -> TimeWindow {
        TimeWindow {
            start_day: self.start_day,
            end_day: self.end_day,
            period_name: period_name(self.start_day, self.end_day),
            window_type: self.window_type.map(ToString::to_string),
            window_count: 1,
        }
    }
}

static CATALOG: LazyLock<Vec<CatalogEntry>> = LazyLock::new(build_catalog);

fn build_catalog() -> Vec<CatalogEntry> {
    let mut entries = Vec::with_capacity(63);

    let fixed = |start: Option<i32>, end: Option<i32>, kind: Option<&'static str>| CatalogEntry {
        start_day: start,
        end_day: end,
        window_type: kind,
        cumulative: false,
        period_type: None,
    };

    // Anytime prior: unbounded on both sides, no window type
    entries.push(fixed(None, None, None));
    entries.push(fixed(Some(-30), Some(0), Some("short term prior")));
    entries.push(fixed(Some(-180), Some(0), Some("medium term prior")));
    entries.push(fixed(Some(-365), Some(0), Some("long term prior")));
    entries.push(fixed(Some(0), Some(0), Some("index date")));

    // 13 sequential 30-day windows on each side of the index date
    for k in 1..=13 {
        entries.push(CatalogEntry {
            start_day: Some(-30 * k),
            end_day: Some(-30 * (k - 1) - 1),
            window_type: Some("30d sequential prior"),
            cumulative: false,
            period_type: Some(PeriodType::Month),
        });
    }
    for k in 1..=13 {
        entries.push(CatalogEntry {
            start_day: Some(30 * (k - 1) + 1),
            end_day: Some(30 * k),
            window_type: Some("30d sequential post"),
            cumulative: false,
            period_type: Some(PeriodType::Month),
        });
    }

    // Cumulative-from-index flavors: prior windows share end day -1 and post
    // windows share start day 1, so their names never collide with the
    // sequential windows above.
    for k in 1..=13 {
        entries.push(CatalogEntry {
            start_day: Some(-(31 + 30 * (k - 1))),
            end_day: Some(-1),
            window_type: Some("30d cumulative prior"),
            cumulative: true,
            period_type: Some(PeriodType::Month),
        });
    }
    for k in 1..=13 {
        entries.push(CatalogEntry {
            start_day: Some(1),
            end_day: Some(31 + 30 * (k - 1)),
            window_type: Some("30d cumulative post"),
            cumulative: true,
            period_type: Some(PeriodType::Month),
        });
    }

    for k in 1i32..=3 {
        entries.push(CatalogEntry {
            start_day: Some(-365 * k),
            end_day: Some(-365 * (k - 1) - 1),
            window_type: Some("yearly sequential prior"),
            cumulative: false,
            period_type: Some(PeriodType::Year),
        });
    }
    for k in 1i32..=3 {
        entries.push(CatalogEntry {
            start_day: Some(365 * (k - 1) + 1),
            end_day: Some(365 * k),
            window_type: Some("yearly sequential post"),
            cumulative: false,
            period_type: Some(PeriodType::Year),
        });
    }

    entries
}

/// Start days of the curated cumulative subset
const SELECTED_START_DAYS: [i32; 5] = [-391, -301, -181, -91, -31];
/// End days of the curated cumulative subset
const SELECTED_END_DAYS: [i32; 6] = [0, 31, 91, 181, 241, 361];

fn is_selected_cumulative(start_day: Option<i32>, end_day: Option<i32>) -> bool {
    let start_matches = start_day.is_some_and(|d| SELECTED_START_DAYS.contains(&d));
    let end_matches = end_day.is_some_and(|d| SELECTED_END_DAYS.contains(&d));
    start_matches || end_matches || (start_day == Some(0) && end_day == Some(0))
}

/// Return the default time-window catalog, optionally filtered
///
/// Each provided flag filters by exact match; `None` leaves that dimension
/// unfiltered. `selected_cumulative = Some(true)` restricts the result to the
/// curated index-anchored subset.
#[must_use]
pub fn get_default_time_windows(
    cumulative: Option<bool>,
    period_types: Option<&[PeriodType]>,
    selected_cumulative: Option<bool>,
) -> Vec<TimeWindow> {
    CATALOG
        .iter()
        .filter(|entry| cumulative.is_none_or(|flag| entry.cumulative == flag))
        .filter(|entry| {
            period_types.is_none_or(|types| {
                entry
                    .period_type
                    .is_some_and(|period_type| types.contains(&period_type))
            })
        })
        .filter(|entry| {
            selected_cumulative != Some(true)
                || is_selected_cumulative(entry.start_day, entry.end_day)
        })
        .map(CatalogEntry::to_window)
        .collect()
}

/// Match caller-supplied covariate-settings day offsets against the catalog
///
/// The two arrays are parallel: pairs are formed positionally and duplicates
/// are preserved, so the output corresponds 1:1 with the input settings. A
/// pair with no catalog counterpart is not an error; it simply carries no
/// period name or window type.
pub fn get_covariate_settings_time_windows(
    temporal_start_days: &[i32],
    temporal_end_days: &[i32],
) -> Result<Vec<SettingsTimeWindow>> {
    if temporal_start_days.len() != temporal_end_days.len() {
        return Err(CohortMetricsError::Configuration(format!(
            "temporalStartDays ({}) and temporalEndDays ({}) must have the same length",
            temporal_start_days.len(),
            temporal_end_days.len()
        )));
    }

    Ok(temporal_start_days
        .iter()
        .zip(temporal_end_days)
        .map(|(&start_day, &end_day)| {
            let matched = CATALOG
                .iter()
                .find(|entry| {
                    entry.start_day == Some(start_day) && entry.end_day == Some(end_day)
                })
                .map(CatalogEntry::to_window);
            SettingsTimeWindow {
                start_day,
                end_day,
                period_name: matched.as_ref().map(|w| w.period_name.clone()),
                window_type: matched.and_then(|w| w.window_type),
            }
        })
        .collect())
}

/// The fixed sequential analysis periods: 13 monthly prior, the index day,
/// and 13 monthly post, sorted ascending by time id
#[must_use]
pub fn get_common_sequential_time_periods() -> Vec<SequentialTimePeriod> {
    let mut periods = Vec::with_capacity(27);
    // time ids 1..=13: monthly prior windows, most distant first
    for time_id in 1..=13 {
        let months_back = 14 - time_id;
        periods.push(SequentialTimePeriod {
            time_id,
            start_day: -30 * months_back,
            end_day: -30 * (months_back - 1) - 1,
        });
    }
    periods.push(SequentialTimePeriod {
        time_id: 14,
        start_day: 0,
        end_day: 0,
    });
    for time_id in 15..=27 {
        let months_forward = time_id - 14;
        periods.push(SequentialTimePeriod {
            time_id,
            start_day: 30 * (months_forward - 1) + 1,
            end_day: 30 * months_forward,
        });
    }
    periods
}
