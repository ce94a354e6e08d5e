//! Date spans and calendar periods
//!
//! A [`DateSpan`] is an inclusive date interval, optionally tagged with a
//! group key (e.g. a subject identifier). A [`CalendarPeriod`] is a
//! non-overlapping interval aligned to a calendar unit, used for period-level
//! rate aggregation.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// An inclusive date interval, optionally tagged with a group key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateSpan {
    /// Optional grouping key (e.g. subject id); spans are only merged within a group
    pub group_key: Option<String>,
    /// First date of the span (inclusive)
    pub start_date: NaiveDate,
    /// Last date of the span (inclusive)
    pub end_date: NaiveDate,
}

impl DateSpan {
    /// Create an ungrouped span
    #[must_use]
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            group_key: None,
            start_date,
            end_date,
        }
    }

    /// Create a span tagged with a group key
    #[must_use]
    pub fn with_group(group_key: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            group_key: Some(group_key.into()),
            start_date,
            end_date,
        }
    }

    /// Number of days covered by the span (inclusive of both endpoints)
    #[must_use]
    pub fn len_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }
}

/// Calendar granularity for flooring/ceiling dates and building periods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalendarUnit {
    /// Individual calendar days
    Day,
    /// Calendar weeks; the boundary weekday is supplied by the caller
    Week,
    /// Calendar months
    Month,
    /// Calendar quarters
    Quarter,
    /// Calendar years
    Year,
}

impl CalendarUnit {
    /// Floor a date to the start of the unit containing it
    ///
    /// For weeks, `week_start` controls which weekday opens the week
    /// (defaults to Monday when not supplied).
    #[must_use]
    pub fn floor(&self, date: NaiveDate, week_start: Option<Weekday>) -> NaiveDate {
        match self {
            Self::Day => date,
            Self::Week => {
                let start = week_start.unwrap_or(Weekday::Mon);
                let offset = (7 + date.weekday().num_days_from_monday()
                    - start.num_days_from_monday())
                    % 7;
                date - Duration::days(i64::from(offset))
            }
            Self::Month => NaiveDate::from_ymd_opt(date.year(), date.month(), 1)
                .unwrap_or(date),
            Self::Quarter => {
                let month = (date.month() - 1) / 3 * 3 + 1;
                NaiveDate::from_ymd_opt(date.year(), month, 1).unwrap_or(date)
            }
            Self::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date),
        }
    }

    /// Ceiling a date to the last day of the unit containing it
    #[must_use]
    pub fn ceiling(&self, date: NaiveDate, week_start: Option<Weekday>) -> NaiveDate {
        match self {
            Self::Day => date,
            Self::Week => self.floor(date, week_start) + Duration::days(6),
            Self::Month => {
                let (year, month) = if date.month() == 12 {
                    (date.year() + 1, 1)
                } else {
                    (date.year(), date.month() + 1)
                };
                NaiveDate::from_ymd_opt(year, month, 1)
                    .and_then(|d| d.pred_opt())
                    .unwrap_or(date)
            }
            Self::Quarter => {
                let quarter = (date.month() - 1) / 3 + 1;
                let (year, next_month) = if quarter == 4 {
                    (date.year() + 1, 1)
                } else {
                    (date.year(), quarter * 3 + 1)
                };
                NaiveDate::from_ymd_opt(year, next_month, 1)
                    .and_then(|d| d.pred_opt())
                    .unwrap_or(date)
            }
            Self::Year => NaiveDate::from_ymd_opt(date.year(), 12, 31).unwrap_or(date),
        }
    }
}

/// A non-overlapping calendar interval used for period-level aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarPeriod {
    /// First date of the period (inclusive)
    pub period_begin: NaiveDate,
    /// Last date of the period (inclusive)
    pub period_end: NaiveDate,
}

impl CalendarPeriod {
    /// Create a period from explicit bounds
    #[must_use]
    pub const fn new(period_begin: NaiveDate, period_end: NaiveDate) -> Self {
        Self {
            period_begin,
            period_end,
        }
    }

    /// Check whether this period contains the given date
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.period_begin <= date && date <= self.period_end
    }

    /// Check whether this period intersects the given inclusive interval
    #[must_use]
    pub fn intersects(&self, start: NaiveDate, end: NaiveDate) -> bool {
        start <= self.period_end && end >= self.period_begin
    }

    /// Build consecutive periods of the given unit covering `[min_date, max_date]`
    ///
    /// The first period begins at the unit floor of `min_date` and the last
    /// ends at the unit ceiling of `max_date`.
    #[must_use]
    pub fn cover(
        min_date: NaiveDate,
        max_date: NaiveDate,
        unit: CalendarUnit,
        week_start: Option<Weekday>,
    ) -> Vec<Self> {
        let mut periods = Vec::new();
        let mut cursor = unit.floor(min_date, week_start);
        let last = unit.ceiling(max_date, week_start);
        while cursor <= last {
            let end = unit.ceiling(cursor, week_start);
            periods.push(Self::new(cursor, end));
            cursor = end + Duration::days(1);
        }
        periods
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_unit_floor_and_ceiling() {
        assert_eq!(CalendarUnit::Month.floor(d(2020, 2, 15), None), d(2020, 2, 1));
        assert_eq!(CalendarUnit::Month.ceiling(d(2020, 2, 15), None), d(2020, 2, 29));
        assert_eq!(CalendarUnit::Quarter.floor(d(2020, 5, 20), None), d(2020, 4, 1));
        assert_eq!(CalendarUnit::Quarter.ceiling(d(2020, 5, 20), None), d(2020, 6, 30));
        assert_eq!(CalendarUnit::Year.floor(d(2020, 5, 20), None), d(2020, 1, 1));
        assert_eq!(CalendarUnit::Year.ceiling(d(2020, 5, 20), None), d(2020, 12, 31));
    }

    #[test]
    fn test_week_floor_respects_week_start() {
        // 2020-01-01 was a Wednesday
        assert_eq!(
            CalendarUnit::Week.floor(d(2020, 1, 1), None),
            d(2019, 12, 30)
        );
        assert_eq!(
            CalendarUnit::Week.floor(d(2020, 1, 1), Some(Weekday::Sun)),
            d(2019, 12, 29)
        );
    }

    #[test]
    fn test_period_cover_yearly() {
        let periods = CalendarPeriod::cover(d(2018, 3, 5), d(2020, 7, 1), CalendarUnit::Year, None);
        assert_eq!(periods.len(), 3);
        assert_eq!(periods[0], CalendarPeriod::new(d(2018, 1, 1), d(2018, 12, 31)));
        assert_eq!(periods[2], CalendarPeriod::new(d(2020, 1, 1), d(2020, 12, 31)));
    }

    #[test]
    fn test_span_len_days() {
        assert_eq!(DateSpan::new(d(2020, 1, 1), d(2020, 1, 1)).len_days(), 1);
        assert_eq!(DateSpan::new(d(2020, 1, 1), d(2020, 1, 31)).len_days(), 31);
    }
}
