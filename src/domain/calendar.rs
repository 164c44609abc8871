//! Public holiday calendar used by the calendar features

use std::collections::HashSet;
use std::ops::RangeInclusive;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Set of dates treated as Sundays by the feature builder
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolidayCalendar {
    dates: HashSet<NaiveDate>,
}

impl HolidayCalendar {
    pub fn new(dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            dates: dates.into_iter().collect(),
        }
    }

    /// Swedish fixed-date public holidays for the given years.
    ///
    /// Movable holidays (Easter, Midsummer, ...) are not included.
    pub fn swedish_fixed(years: RangeInclusive<i32>) -> Self {
        const FIXED: [(u32, u32); 8] = [
            (1, 1),   // New Year's Day
            (1, 6),   // Epiphany
            (5, 1),   // Labour Day
            (6, 6),   // National Day
            (12, 24), // Christmas Eve
            (12, 25), // Christmas Day
            (12, 26), // Boxing Day
            (12, 31), // New Year's Eve
        ];

        let dates = years.flat_map(|year| {
            FIXED
                .iter()
                .filter_map(move |(month, day)| NaiveDate::from_ymd_opt(year, *month, *day))
        });
        Self::new(dates)
    }

    /// Dates of both calendars
    pub fn union(mut self, other: &HolidayCalendar) -> Self {
        self.dates.extend(other.dates.iter().copied());
        self
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }

    pub fn is_holiday(&self, timestamp: NaiveDateTime) -> bool {
        self.contains(timestamp.date())
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swedish_fixed_holidays() {
        let calendar = HolidayCalendar::swedish_fixed(2023..=2024);
        assert_eq!(calendar.len(), 16);
        assert!(calendar.contains(NaiveDate::from_ymd_opt(2024, 6, 6).unwrap()));
        assert!(!calendar.contains(NaiveDate::from_ymd_opt(2024, 6, 7).unwrap()));
    }

    #[test]
    fn test_union_keeps_custom_dates() {
        let custom = HolidayCalendar::new([NaiveDate::from_ymd_opt(2024, 3, 29).unwrap()]);
        let calendar = custom.union(&HolidayCalendar::swedish_fixed(2024..=2024));
        assert_eq!(calendar.len(), 9);
        assert!(calendar.contains(NaiveDate::from_ymd_opt(2024, 3, 29).unwrap()));
        assert!(calendar.contains(NaiveDate::from_ymd_opt(2024, 12, 24).unwrap()));
    }

    #[test]
    fn test_is_holiday_ignores_time_of_day() {
        let calendar = HolidayCalendar::new([NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()]);
        let late = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(23, 0, 0)
            .unwrap();
        assert!(calendar.is_holiday(late));
    }
}
