//! Domain models for cohort characterization
//!
//! This module contains the core entity models used throughout the crate:
//! date spans and calendar periods, cohort episodes with their observation
//! and demographic context, covariate measurements with their reference
//! tables, and the lightweight dynamic table used for report output.

pub mod cohort;
pub mod covariate;
pub mod span;
pub mod table;

// Re-export commonly used types
pub use cohort::{CohortData, CohortEpisode, ObservationPeriod, PersonDemographics};
pub use covariate::{
    AnalysisRef, ContinuousCovariateRow, CovariateData, CovariateRef, CovariateRow,
    Table1Specification, TimeRef, decode_cohort_concept_id, encode_cohort_covariate_id,
};
pub use span::{CalendarPeriod, CalendarUnit, DateSpan};
pub use table::{Cell, Table};
