//! Incidence and prevalence rate computation
//!
//! Given a cohort with its observation periods and demographics, this module
//! computes period-level rate tables stratified by age decade and gender,
//! including marginal rollups, and day-level count series (see [`daily`]).
//!
//! The washout period removes immortal time: a subject contributes to neither
//! numerator nor denominator until `washout_days` have elapsed since the start
//! of their observation period.

pub mod daily;

use chrono::{Datelike, Duration, NaiveDate};
use log::{debug, warn};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{CohortMetricsError, Result};
use crate::models::cohort::{CohortData, CohortEpisode};
use crate::models::span::{CalendarPeriod, CalendarUnit};

pub use daily::{DailyRateRow, compute_daily_rates, regularize_daily_rates};

/// Kind of rate to compute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateType {
    /// Count episodes by their start date
    Incidence,
    /// Count episodes overlapping the period
    Prevalence,
}

/// Parameters for rate computation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateConfig {
    /// Required prior observation time in days before an episode counts
    pub washout_days: i64,
    /// Collapse each subject to their earliest episode before computing
    pub first_occurrence_only: bool,
    /// Incidence or prevalence
    pub rate_type: RateType,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            washout_days: 365,
            first_occurrence_only: false,
            rate_type: RateType::Incidence,
        }
    }
}

/// One row of the period-level rate table
///
/// `age_group`/`gender` are `None` on marginal rollup rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRow {
    /// First date of the calendar period
    pub period_begin: NaiveDate,
    /// Last date of the calendar period (inclusive)
    pub period_end: NaiveDate,
    /// Age decade label `"NN-NN"`; `None` on rows aggregated over age
    pub age_group: Option<String>,
    /// Title-cased gender label; `None` on rows aggregated over gender
    pub gender: Option<String>,
    /// Episode count for the period
    pub numerator_count: u64,
    /// Person-time denominator in years
    pub person_years: f64,
    /// `1000 * numerator / personYears`; NaN when the denominator is zero
    pub rate_per_1000: f64,
}

/// Format an age decade as a zero-padded range label (decade 3 → `"30-39"`)
#[must_use]
pub fn format_age_group(decade: i32) -> String {
    format!("{:02}-{:02}", decade * 10, decade * 10 + 9)
}

/// Title-case a gender concept label (`"FEMALE"` → `"Female"`)
#[must_use]
pub fn format_gender(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

fn age_decade(year: i32, year_of_birth: i32) -> i32 {
    (year - year_of_birth).div_euclid(10)
}

/// Shared preprocessing for the period-level and day-level aggregators
pub(crate) struct RateInput<'a> {
    pub demographics: FxHashMap<i64, (&'a str, i32)>,
    pub spans_by_person: FxHashMap<i64, Vec<(NaiveDate, NaiveDate)>>,
    pub episodes: Vec<CohortEpisode>,
}

pub(crate) fn prepare_rate_input<'a>(
    data: &'a CohortData,
    config: &RateConfig,
) -> Result<RateInput<'a>> {
    if config.washout_days < 0 {
        return Err(CohortMetricsError::Configuration(format!(
            "washout period must be non-negative, got {}",
            config.washout_days
        )));
    }

    let demographics: FxHashMap<i64, (&str, i32)> = data
        .demographics
        .iter()
        .map(|d| (d.person_id, (d.gender.as_str(), d.year_of_birth)))
        .collect();

    let mut spans_by_person: FxHashMap<i64, Vec<(NaiveDate, NaiveDate)>> = FxHashMap::default();
    for period in &data.observation_periods {
        let adjusted_start = period.start_date + Duration::days(config.washout_days);
        if adjusted_start <= period.end_date {
            spans_by_person
                .entry(period.person_id)
                .or_default()
                .push((adjusted_start, period.end_date));
        }
    }

    let episodes = if config.first_occurrence_only {
        collapse_to_first_occurrence(&data.episodes)
    } else {
        data.episodes.clone()
    };

    Ok(RateInput {
        demographics,
        spans_by_person,
        episodes,
    })
}

/// Reduce every subject to their single earliest episode
fn collapse_to_first_occurrence(episodes: &[CohortEpisode]) -> Vec<CohortEpisode> {
    let mut earliest: FxHashMap<i64, &CohortEpisode> = FxHashMap::default();
    for episode in episodes {
        earliest
            .entry(episode.subject_id)
            .and_modify(|current| {
                let candidate = (episode.cohort_start_date, episode.cohort_end_date);
                if candidate < (current.cohort_start_date, current.cohort_end_date) {
                    *current = episode;
                }
            })
            .or_insert(episode);
    }
    let mut collapsed: Vec<CohortEpisode> = earliest.into_values().cloned().collect();
    collapsed.sort_by_key(|e| (e.subject_id, e.cohort_start_date, e.cohort_end_date));
    collapsed
}

impl RateInput<'_> {
    /// Whether the episode start falls inside a washout-adjusted span
    fn qualifies(&self, episode: &CohortEpisode) -> bool {
        self.spans_by_person
            .get(&episode.subject_id)
            .is_some_and(|spans| {
                spans
                    .iter()
                    .any(|&(start, end)| start <= episode.cohort_start_date
                        && episode.cohort_start_date <= end)
            })
    }

    /// Earliest qualifying episode start per subject
    fn first_start_by_subject(&self) -> FxHashMap<i64, NaiveDate> {
        let mut first: FxHashMap<i64, NaiveDate> = FxHashMap::default();
        for episode in &self.episodes {
            first
                .entry(episode.subject_id)
                .and_modify(|date| *date = (*date).min(episode.cohort_start_date))
                .or_insert(episode.cohort_start_date);
        }
        first
    }
}

/// Compute the period-level rate table
///
/// When `periods` is not supplied, yearly periods are derived from the
/// cohort's own episode date range. An empty cohort yields an empty table.
///
/// The output holds four unioned groupings per period: overall, by age, by
/// gender, and by age and gender.
pub fn compute_period_rates(
    data: &CohortData,
    config: &RateConfig,
    periods: Option<Vec<CalendarPeriod>>,
) -> Result<Vec<RateRow>> {
    if data.is_empty() {
        warn!(
            "cohort {} has no records; returning an empty rate table",
            data.cohort_id
        );
        return Ok(Vec::new());
    }

    let input = prepare_rate_input(data, config)?;
    let periods = match periods {
        Some(periods) => periods,
        None => {
            let (min, max) = data
                .episode_date_range()
                .expect("non-empty cohort has a date range");
            CalendarPeriod::cover(min, max, CalendarUnit::Year, None)
        }
    };

    // Numerator: qualifying episodes per (period, age decade, gender)
    let mut numerator: FxHashMap<(usize, i32, String), u64> = FxHashMap::default();
    for episode in &input.episodes {
        if !input.qualifies(episode) {
            continue;
        }
        let Some(&(gender, year_of_birth)) = input.demographics.get(&episode.subject_id) else {
            debug!("no demographics for subject {}; skipping", episode.subject_id);
            continue;
        };
        for (index, period) in periods.iter().enumerate() {
            let in_period = match config.rate_type {
                RateType::Incidence => period.contains(episode.cohort_start_date),
                RateType::Prevalence => {
                    period.intersects(episode.cohort_start_date, episode.cohort_end_date)
                }
            };
            if in_period {
                let decade = age_decade(episode.cohort_start_date.year(), year_of_birth);
                *numerator
                    .entry((index, decade, format_gender(gender)))
                    .or_insert(0) += 1;
            }
        }
    }

    // Denominator: person-years of washout-adjusted observation per stratum
    let first_starts = input.first_start_by_subject();
    let mut denominator: FxHashMap<(usize, i32, String), f64> = FxHashMap::default();
    for (&person_id, spans) in &input.spans_by_person {
        let Some(&(gender, year_of_birth)) = input.demographics.get(&person_id) else {
            debug!("no demographics for person {person_id}; skipping");
            continue;
        };
        for &(span_start, span_end) in spans {
            // When only first occurrences count, at-risk time ends once the
            // subject enters the cohort.
            let span_end = if config.first_occurrence_only {
                match first_starts.get(&person_id) {
                    Some(&first_start) => span_end.min(first_start),
                    None => span_end,
                }
            } else {
                span_end
            };
            for (index, period) in periods.iter().enumerate() {
                let overlap_start = span_start.max(period.period_begin);
                let overlap_end = span_end.min(period.period_end);
                if overlap_start > overlap_end {
                    continue;
                }
                let days = (overlap_end - overlap_start).num_days() + 1;
                let decade = age_decade(overlap_start.year(), year_of_birth);
                *denominator
                    .entry((index, decade, format_gender(gender)))
                    .or_insert(0.0) += days as f64 / 365.25;
            }
        }
    }

    Ok(join_and_roll_up(&periods, &numerator, &denominator))
}

/// Union numerator/denominator keys, compute rates, and add marginal rollups
fn join_and_roll_up(
    periods: &[CalendarPeriod],
    numerator: &FxHashMap<(usize, i32, String), u64>,
    denominator: &FxHashMap<(usize, i32, String), f64>,
) -> Vec<RateRow> {
    let mut strata: FxHashMap<(usize, i32, String), (u64, f64)> = FxHashMap::default();
    for (key, &count) in numerator {
        strata.entry(key.clone()).or_insert((0, 0.0)).0 = count;
    }
    for (key, &person_years) in denominator {
        strata.entry(key.clone()).or_insert((0, 0.0)).1 = person_years;
    }

    // Four groupings: overall, age, gender, age-and-gender
    let mut by_period: FxHashMap<usize, (u64, f64)> = FxHashMap::default();
    let mut by_age: FxHashMap<(usize, i32), (u64, f64)> = FxHashMap::default();
    let mut by_gender: FxHashMap<(usize, String), (u64, f64)> = FxHashMap::default();
    for ((index, decade, gender), &(count, person_years)) in &strata {
        let overall = by_period.entry(*index).or_insert((0, 0.0));
        overall.0 += count;
        overall.1 += person_years;
        let age = by_age.entry((*index, *decade)).or_insert((0, 0.0));
        age.0 += count;
        age.1 += person_years;
        let gender_entry = by_gender
            .entry((*index, gender.clone()))
            .or_insert((0, 0.0));
        gender_entry.0 += count;
        gender_entry.1 += person_years;
    }

    let make_row = |index: usize,
                    age_group: Option<String>,
                    gender: Option<String>,
                    count: u64,
                    person_years: f64| {
        RateRow {
            period_begin: periods[index].period_begin,
            period_end: periods[index].period_end,
            age_group,
            gender,
            numerator_count: count,
            person_years,
            rate_per_1000: rate_per_1000(count, person_years),
        }
    };

    let mut rows = Vec::new();
    for (index, (count, person_years)) in by_period {
        rows.push(make_row(index, None, None, count, person_years));
    }
    for ((index, decade), (count, person_years)) in by_age {
        rows.push(make_row(
            index,
            Some(format_age_group(decade)),
            None,
            count,
            person_years,
        ));
    }
    for ((index, gender), (count, person_years)) in by_gender {
        rows.push(make_row(index, None, Some(gender), count, person_years));
    }
    for ((index, decade, gender), (count, person_years)) in strata {
        rows.push(make_row(
            index,
            Some(format_age_group(decade)),
            Some(gender),
            count,
            person_years,
        ));
    }

    rows.sort_by(|a, b| {
        (a.period_begin, &a.age_group, &a.gender).cmp(&(b.period_begin, &b.age_group, &b.gender))
    });
    rows
}

/// Rate per 1000 person-years; NaN (never infinite) on a zero denominator
fn rate_per_1000(count: u64, person_years: f64) -> f64 {
    if person_years == 0.0 {
        f64::NAN
    } else {
        1000.0 * count as f64 / person_years
    }
}

/// Render a rate table as an aligned text summary
///
/// Marginal rollup rows show `All` in the collapsed stratum columns.
#[must_use]
pub fn render_rate_table(rows: &[RateRow]) -> String {
    let mut output = String::from(
        "Period Start | Period End | Age Group | Gender | Count | Person-Years | Rate/1000\n\
         -------------|------------|-----------|--------|-------|--------------|----------\n",
    );
    for row in rows {
        output.push_str(&format!(
            "{} | {} | {:>9} | {:>6} | {:>5} | {:>12.2} | {:>9.2}\n",
            row.period_begin,
            row.period_end,
            row.age_group.as_deref().unwrap_or("All"),
            row.gender.as_deref().unwrap_or("All"),
            row.numerator_count,
            row.person_years,
            row.rate_per_1000
        ));
    }
    output
}
