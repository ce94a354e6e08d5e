//! Day-level count series
//!
//! The day-level variant tracks, for every calendar date and (age, gender)
//! stratum, how many people are under observation, how many are at risk, and
//! both first-occurrence and all-occurrence incidence and prevalence counts.
//! A regularized form fills every missing date inside each stratum's observed
//! range with zero counts, which downstream time-series consumers require.

use chrono::{Datelike, Duration, NaiveDate};
use log::warn;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::cohort::CohortData;

use super::{RateConfig, format_age_group, format_gender, prepare_rate_input};

/// One row of the day-level count series
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyRateRow {
    /// Calendar date
    pub calendar_date: NaiveDate,
    /// Age decade label `"NN-NN"` as of the calendar date
    pub age_group: String,
    /// Title-cased gender label
    pub gender: String,
    /// People under (washout-adjusted) observation on this date
    pub in_observation: i64,
    /// People at risk: `in_observation - prevalence + incidence`
    pub at_risk: i64,
    /// At-risk count under the first-occurrence convention
    pub at_risk_first: i64,
    /// Episodes starting on this date
    pub incidence: i64,
    /// First-occurrence episodes starting on this date
    pub incidence_first: i64,
    /// Episodes overlapping this date
    pub prevalence: i64,
    /// First-occurrence episodes overlapping this date
    pub prevalence_first: i64,
}

#[derive(Debug, Default, Clone, Copy)]
struct DailyCounts {
    in_observation: i64,
    incidence: i64,
    incidence_first: i64,
    prevalence: i64,
    prevalence_first: i64,
}

/// Compute the day-level count series for a cohort
///
/// The series covers every date of every washout-adjusted observation span.
/// Someone whose episode starts today still counts as at risk today, which is
/// why incidence is added back into the at-risk count.
pub fn compute_daily_rates(data: &CohortData, config: &RateConfig) -> Result<Vec<DailyRateRow>> {
    if data.is_empty() {
        warn!(
            "cohort {} has no records; returning an empty daily series",
            data.cohort_id
        );
        return Ok(Vec::new());
    }

    // First-occurrence counts always need the collapsed view; compute it from
    // an explicitly first-occurrence configuration.
    let first_config = RateConfig {
        first_occurrence_only: true,
        ..config.clone()
    };
    let input = prepare_rate_input(data, config)?;
    let first_input = prepare_rate_input(data, &first_config)?;

    let mut counts: FxHashMap<(NaiveDate, i32, String), DailyCounts> = FxHashMap::default();

    for (&person_id, spans) in &input.spans_by_person {
        let Some(&(gender, year_of_birth)) = input.demographics.get(&person_id) else {
            continue;
        };
        let gender = format_gender(gender);
        let episodes: Vec<_> = input
            .episodes
            .iter()
            .filter(|e| e.subject_id == person_id)
            .collect();
        let first_episodes: Vec<_> = first_input
            .episodes
            .iter()
            .filter(|e| e.subject_id == person_id)
            .collect();

        for &(span_start, span_end) in spans {
            let mut date = span_start;
            while date <= span_end {
                let decade = (date.year() - year_of_birth).div_euclid(10);
                let entry = counts
                    .entry((date, decade, gender.clone()))
                    .or_default();
                entry.in_observation += 1;
                for episode in &episodes {
                    if episode.cohort_start_date <= date && date <= episode.cohort_end_date {
                        entry.prevalence += 1;
                    }
                    if episode.cohort_start_date == date {
                        entry.incidence += 1;
                    }
                }
                for episode in &first_episodes {
                    if episode.cohort_start_date <= date && date <= episode.cohort_end_date {
                        entry.prevalence_first += 1;
                    }
                    if episode.cohort_start_date == date {
                        entry.incidence_first += 1;
                    }
                }
                date += Duration::days(1);
            }
        }
    }

    let mut rows: Vec<DailyRateRow> = counts
        .into_iter()
        .map(|((date, decade, gender), c)| DailyRateRow {
            calendar_date: date,
            age_group: format_age_group(decade),
            gender,
            in_observation: c.in_observation,
            at_risk: c.in_observation - c.prevalence + c.incidence,
            at_risk_first: c.in_observation - c.prevalence_first + c.incidence_first,
            incidence: c.incidence,
            incidence_first: c.incidence_first,
            prevalence: c.prevalence,
            prevalence_first: c.prevalence_first,
        })
        .collect();
    sort_daily(&mut rows);
    Ok(rows)
}

/// Fill missing dates of a day-level series with zero-count rows
///
/// The per-key date index is implicit: for each (age group, gender) stratum
/// the filled range runs from its earliest to its latest present date. Every
/// count column of an inserted row is zero.
#[must_use]
pub fn regularize_daily_rates(rows: &[DailyRateRow]) -> Vec<DailyRateRow> {
    let mut by_key: FxHashMap<(String, String), FxHashMap<NaiveDate, &DailyRateRow>> =
        FxHashMap::default();
    for row in rows {
        by_key
            .entry((row.age_group.clone(), row.gender.clone()))
            .or_default()
            .insert(row.calendar_date, row);
    }

    let mut filled = Vec::with_capacity(rows.len());
    for ((age_group, gender), dates) in by_key {
        let min = dates.keys().min().copied().expect("non-empty key group");
        let max = dates.keys().max().copied().expect("non-empty key group");
        let mut date = min;
        while date <= max {
            match dates.get(&date) {
                Some(&row) => filled.push(row.clone()),
                None => filled.push(DailyRateRow {
                    calendar_date: date,
                    age_group: age_group.clone(),
                    gender: gender.clone(),
                    in_observation: 0,
                    at_risk: 0,
                    at_risk_first: 0,
                    incidence: 0,
                    incidence_first: 0,
                    prevalence: 0,
                    prevalence_first: 0,
                }),
            }
            date += Duration::days(1);
        }
    }
    sort_daily(&mut filled);
    filled
}

fn sort_daily(rows: &mut [DailyRateRow]) {
    rows.sort_by(|a, b| {
        (a.calendar_date, &a.age_group, &a.gender).cmp(&(b.calendar_date, &b.age_group, &b.gender))
    });
}
