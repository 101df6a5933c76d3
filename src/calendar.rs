use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Working-day calendar for one factory or job: a weekly work pattern plus a
/// pre-expanded set of holiday dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkCalendar {
    holidays: HashSet<NaiveDate>,
    non_working_days: HashSet<Weekday>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkCalendarConfig {
    working_days: Vec<Weekday>,
    holidays: Vec<NaiveDate>,
}

impl Default for WorkCalendar {
    fn default() -> Self {
        Self::standard_week()
    }
}

impl WorkCalendar {
    pub(crate) const ALL_WEEKDAYS: [Weekday; 7] = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];

    pub const STANDARD_WEEK: [Weekday; 5] = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
    ];

    /// Monday to Friday, no holidays.
    pub fn standard_week() -> Self {
        Self {
            holidays: HashSet::new(),
            non_working_days: HashSet::from([Weekday::Sat, Weekday::Sun]),
        }
    }

    /// Builds a calendar from a work pattern and holiday dates. An empty
    /// pattern falls back to the standard Monday-Friday week.
    pub fn custom<I, J>(working_days: I, holidays: J) -> Self
    where
        I: IntoIterator<Item = Weekday>,
        J: IntoIterator<Item = NaiveDate>,
    {
        let config = WorkCalendarConfig::new(working_days, holidays);
        Self::from_config(&config)
    }

    pub fn from_config(config: &WorkCalendarConfig) -> Self {
        let mut working_set: HashSet<Weekday> = config.working_days.iter().copied().collect();
        if working_set.is_empty() {
            working_set.extend(Self::STANDARD_WEEK);
        }
        let non_working_days = Self::ALL_WEEKDAYS
            .into_iter()
            .filter(|day| !working_set.contains(day))
            .collect();

        Self {
            holidays: config.holidays.iter().copied().collect(),
            non_working_days,
        }
    }

    pub fn to_config(&self) -> WorkCalendarConfig {
        WorkCalendarConfig::from(self)
    }

    /// Add a single holiday
    pub fn add_holiday(&mut self, date: NaiveDate) {
        self.holidays.insert(date);
    }

    pub fn add_holidays<I>(&mut self, dates: I)
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        self.holidays.extend(dates);
    }

    /// Add the same day of the year as a holiday for every year in the range.
    pub fn add_recurring_holiday(&mut self, month: u32, day: u32, start_year: i32, end_year: i32) {
        for year in start_year..=end_year {
            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                self.holidays.insert(date);
            }
        }
    }

    /// Replace the weekly pattern (e.g. Mon-Sat for six-day factories).
    pub fn set_working_days<I>(&mut self, days: I)
    where
        I: IntoIterator<Item = Weekday>,
    {
        let mut working: HashSet<Weekday> = days.into_iter().collect();
        if working.is_empty() {
            working.extend(Self::STANDARD_WEEK);
        }
        self.non_working_days = Self::ALL_WEEKDAYS
            .into_iter()
            .filter(|day| !working.contains(day))
            .collect();
    }

    pub fn holiday_count(&self) -> usize {
        self.holidays.len()
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.contains(&date)
    }

    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        !self.holidays.contains(&date) && !self.non_working_days.contains(&date.weekday())
    }

    /// First working day strictly after `date`.
    pub fn next_working_day(&self, date: NaiveDate) -> NaiveDate {
        let mut current = date + Duration::days(1);
        while !self.is_working_day(current) {
            current += Duration::days(1);
        }
        current
    }

    /// Last working day strictly before `date`.
    pub fn previous_working_day(&self, date: NaiveDate) -> NaiveDate {
        let mut current = date - Duration::days(1);
        while !self.is_working_day(current) {
            current -= Duration::days(1);
        }
        current
    }

    /// `date` itself when it is a working day, otherwise the next one.
    pub fn ensure_working_day(&self, date: NaiveDate) -> NaiveDate {
        if self.is_working_day(date) {
            date
        } else {
            self.next_working_day(date)
        }
    }

    /// Advance `n` working days beyond `date`. An inclusive duration of `d`
    /// days ends at `add_working_days(start, d - 1)`.
    pub fn add_working_days(&self, date: NaiveDate, n: u32) -> NaiveDate {
        let mut current = date;
        for _ in 0..n {
            current = self.next_working_day(current);
        }
        current
    }

    /// Walk back `n` working days from `date`.
    pub fn subtract_working_days(&self, date: NaiveDate, n: u32) -> NaiveDate {
        let mut current = date;
        for _ in 0..n {
            current = self.previous_working_day(current);
        }
        current
    }

    pub fn working_days_in_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        start
            .iter_days()
            .take_while(|day| *day <= end)
            .filter(|day| self.is_working_day(*day))
            .collect()
    }

    /// Inclusive count of working days between `start` and `end`.
    pub fn working_days_between(&self, start: NaiveDate, end: NaiveDate) -> i64 {
        let mut count = 0;
        let mut current = start;
        while current <= end {
            if self.is_working_day(current) {
                count += 1;
            }
            current += Duration::days(1);
        }
        count
    }
}

impl WorkCalendarConfig {
    pub fn new<I, J>(working_days: I, holidays: J) -> Self
    where
        I: IntoIterator<Item = Weekday>,
        J: IntoIterator<Item = NaiveDate>,
    {
        let mut working: Vec<Weekday> = working_days.into_iter().collect();
        if working.is_empty() {
            working.extend(WorkCalendar::STANDARD_WEEK);
        }
        working.sort_by_key(|wd| wd.num_days_from_monday());
        working.dedup_by(|a, b| a.num_days_from_monday() == b.num_days_from_monday());

        let mut holidays: Vec<NaiveDate> = holidays.into_iter().collect();
        holidays.sort();
        holidays.dedup();

        Self {
            working_days: working,
            holidays,
        }
    }

    pub fn working_days(&self) -> &[Weekday] {
        &self.working_days
    }

    pub fn holidays(&self) -> &[NaiveDate] {
        &self.holidays
    }
}

impl Default for WorkCalendarConfig {
    fn default() -> Self {
        WorkCalendarConfig::from(&WorkCalendar::default())
    }
}

impl From<&WorkCalendar> for WorkCalendarConfig {
    fn from(calendar: &WorkCalendar) -> Self {
        let working = WorkCalendar::ALL_WEEKDAYS
            .into_iter()
            .filter(|day| !calendar.non_working_days.contains(day))
            .collect();

        let mut holidays: Vec<NaiveDate> = calendar.holidays.iter().copied().collect();
        holidays.sort();

        Self {
            working_days: working,
            holidays,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn empty_pattern_falls_back_to_standard_week() {
        let cal = WorkCalendar::custom(Vec::new(), Vec::new());
        assert_eq!(cal.to_config().working_days(), &WorkCalendar::STANDARD_WEEK);
        assert!(!cal.is_working_day(d(2024, 1, 6)));
    }

    #[test]
    fn add_zero_working_days_keeps_date() {
        let cal = WorkCalendar::standard_week();
        assert_eq!(cal.add_working_days(d(2024, 1, 5), 0), d(2024, 1, 5));
    }
}
