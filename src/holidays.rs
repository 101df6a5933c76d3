//! Regional holiday calendars and their expansion into concrete dates.
//!
//! A [`HolidayCalendarType`] names a recurring set of holidays. Expanding it
//! over a bounded window is a pure function of `(type, start, end)`, so the
//! result is memoised in a [`HolidayCache`] owned by whoever provides
//! calendars.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HolidayCalendarType {
    /// Fixed and floating national holidays (New Year through Christmas).
    Federal,
    /// New Year, Easter and Christmas/Boxing Day with weekend substitution.
    Public,
    /// `Public` plus the construction trade-union calendar: Christmas
    /// shutdown and a monthly rostered day off.
    Union,
}

impl HolidayCalendarType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HolidayCalendarType::Federal => "federal",
            HolidayCalendarType::Public => "public",
            HolidayCalendarType::Union => "union",
        }
    }
}

impl fmt::Display for HolidayCalendarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HolidayCalendarType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "federal" => Ok(HolidayCalendarType::Federal),
            "public" => Ok(HolidayCalendarType::Public),
            "union" => Ok(HolidayCalendarType::Union),
            other => Err(format!("unknown holiday calendar '{other}'")),
        }
    }
}

/// Every holiday of `calendar` falling within `[start, end]`.
pub fn expand_holidays(
    calendar: HolidayCalendarType,
    start: NaiveDate,
    end: NaiveDate,
) -> BTreeSet<NaiveDate> {
    let (start, end) = if start <= end { (start, end) } else { (end, start) };
    let mut dates = BTreeSet::new();
    for year in start.year()..=end.year() {
        match calendar {
            HolidayCalendarType::Federal => add_federal_holidays(&mut dates, year),
            HolidayCalendarType::Public => add_public_holidays(&mut dates, year),
            HolidayCalendarType::Union => {
                add_public_holidays(&mut dates, year);
                add_union_days(&mut dates, year);
            }
        }
    }
    dates.retain(|date| *date >= start && *date <= end);
    dates
}

fn ymd(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

fn add_federal_holidays(dates: &mut BTreeSet<NaiveDate>, year: i32) {
    let floating = [
        // Martin Luther King Jr. Day, Presidents' Day, Labor Day, Columbus Day, Thanksgiving
        nth_weekday(year, 1, Weekday::Mon, 3),
        nth_weekday(year, 2, Weekday::Mon, 3),
        last_weekday(year, 5, Weekday::Mon),
        nth_weekday(year, 9, Weekday::Mon, 1),
        nth_weekday(year, 10, Weekday::Mon, 2),
        nth_weekday(year, 11, Weekday::Thu, 4),
    ];
    let fixed = [
        ymd(year, 1, 1),
        ymd(year, 7, 4),
        ymd(year, 11, 11),
        ymd(year, 12, 25),
    ];
    dates.extend(floating.into_iter().chain(fixed).flatten());
}

fn add_public_holidays(dates: &mut BTreeSet<NaiveDate>, year: i32) {
    if let Some(new_year) = ymd(year, 1, 1) {
        let day = observed(new_year, dates);
        dates.insert(day);
    }
    if let Some(easter) = easter_sunday(year) {
        dates.insert(easter - Duration::days(2));
        dates.insert(easter + Duration::days(1));
    }
    // Christmas first so Boxing Day substitutes past it.
    for day in [25, 26] {
        if let Some(date) = ymd(year, 12, day) {
            let day = observed(date, dates);
            dates.insert(day);
        }
    }
}

fn add_union_days(dates: &mut BTreeSet<NaiveDate>, year: i32) {
    for day in 27..=31 {
        if let Some(date) = ymd(year, 12, day) {
            if !is_weekend(date) {
                dates.insert(date);
            }
        }
    }
    for month in 1..=12 {
        let Some(mut rdo) = nth_weekday(year, month, Weekday::Mon, 2) else {
            continue;
        };
        while dates.contains(&rdo) || is_weekend(rdo) {
            rdo += Duration::days(1);
        }
        dates.insert(rdo);
    }
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// A fixed-date holiday landing on a weekend or on an already observed
/// holiday is observed on the next free weekday.
fn observed(date: NaiveDate, taken: &BTreeSet<NaiveDate>) -> NaiveDate {
    let mut current = date;
    while is_weekend(current) || taken.contains(&current) {
        current += Duration::days(1);
    }
    current
}

/// Anonymous Gregorian computus.
fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    ymd(year, month as u32, day as u32)
}

/// nth occurrence of a weekday in a month
fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u8) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, n)
}

/// last occurrence of a weekday in a month
fn last_weekday(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    let first_of_next = if month == 12 {
        ymd(year + 1, 1, 1)?
    } else {
        ymd(year, month + 1, 1)?
    };
    let mut date = first_of_next - Duration::days(1);
    while date.weekday() != weekday {
        date -= Duration::days(1);
    }
    Some(date)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct HolidayKey {
    calendar: HolidayCalendarType,
    start: NaiveDate,
    end: NaiveDate,
}

/// Bounded cache of expanded holiday sets.
#[derive(Clone)]
pub struct HolidayCache {
    inner: Cache<HolidayKey, Arc<BTreeSet<NaiveDate>>>,
}

impl HolidayCache {
    pub fn new(capacity: u64) -> Self {
        Self {
            inner: Cache::new(capacity),
        }
    }

    pub fn holidays_in_range(
        &self,
        calendar: HolidayCalendarType,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Arc<BTreeSet<NaiveDate>> {
        let key = HolidayKey {
            calendar,
            start,
            end,
        };
        self.inner.get_with(key, || {
            tracing::debug!(%calendar, %start, %end, "expanding holiday calendar");
            Arc::new(expand_holidays(calendar, start, end))
        })
    }

    pub fn contains(&self, calendar: HolidayCalendarType, start: NaiveDate, end: NaiveDate) -> bool {
        self.inner.contains_key(&HolidayKey {
            calendar,
            start,
            end,
        })
    }
}

impl fmt::Debug for HolidayCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HolidayCache")
            .field("entries", &self.inner.entry_count())
            .finish()
    }
}
