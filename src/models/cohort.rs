//! Cohort and observation-period models
//!
//! These are the materialized rows the rate aggregator consumes. The query
//! engine that produces them (SQL against a common-data-model schema) is an
//! external collaborator; this crate only reads the rows.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single cohort episode: one subject's membership interval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortEpisode {
    /// Subject identifier
    pub subject_id: i64,
    /// First day of cohort membership
    pub cohort_start_date: NaiveDate,
    /// Last day of cohort membership (inclusive)
    pub cohort_end_date: NaiveDate,
}

/// A continuous observation interval for one person
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationPeriod {
    /// Person identifier (matches `CohortEpisode::subject_id`)
    pub person_id: i64,
    /// First observed day
    pub start_date: NaiveDate,
    /// Last observed day (inclusive)
    pub end_date: NaiveDate,
}

/// Demographic attributes for one person
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonDemographics {
    /// Person identifier
    pub person_id: i64,
    /// Year of birth
    pub year_of_birth: i32,
    /// Gender concept label (e.g. "male", "FEMALE"); title-cased for output
    pub gender: String,
}

/// A cohort together with the observation and demographic rows needed for rates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohortData {
    /// Identifier of the cohort these episodes belong to
    pub cohort_id: i64,
    /// Cohort episodes
    pub episodes: Vec<CohortEpisode>,
    /// Observation periods for the subjects in the cohort
    pub observation_periods: Vec<ObservationPeriod>,
    /// Demographics for the subjects in the cohort
    pub demographics: Vec<PersonDemographics>,
}

impl CohortData {
    /// Create an empty cohort with the given id
    #[must_use]
    pub const fn new(cohort_id: i64) -> Self {
        Self {
            cohort_id,
            episodes: Vec::new(),
            observation_periods: Vec::new(),
            demographics: Vec::new(),
        }
    }

    /// Whether the cohort has any episodes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }

    /// Date range spanned by the cohort's episodes, if any
    #[must_use]
    pub fn episode_date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let min = self.episodes.iter().map(|e| e.cohort_start_date).min()?;
        let max = self.episodes.iter().map(|e| e.cohort_end_date).max()?;
        Some((min, max))
    }
}
