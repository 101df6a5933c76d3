use crate::calendar::WorkCalendar;
use crate::config::EngineConfig;
use crate::entry::{OwnerSettings, ProgrammeEntry};
use crate::holidays::{HolidayCache, HolidayCalendarType};
use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// Factory work patterns and regional holidays.
pub trait CalendarProvider: Send + Sync {
    /// Working weekdays of `factory_id`, or the default pattern when the
    /// factory is unset or unknown. Never empty.
    fn working_days_pattern(&self, factory_id: Option<&str>) -> HashSet<Weekday>;

    fn holidays_in_range(
        &self,
        calendar: HolidayCalendarType,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Arc<BTreeSet<NaiveDate>>;
}

/// Years of holidays expanded before the earliest date a programme can reach
/// from its anchors. FF and SF links schedule backwards from a predecessor.
const LOOKBACK_YEARS: i32 = 1;

/// Assembles the working-day calendar for an owner: its factory pattern plus
/// holidays covering `base_start` over `window_years` and every manual date in
/// `entries`, with a lookback for back-scheduled starts.
pub fn calendar_for_owner(
    provider: &dyn CalendarProvider,
    settings: &OwnerSettings,
    entries: &[ProgrammeEntry],
    base_start: NaiveDate,
    window_years: u32,
) -> WorkCalendar {
    let pattern = provider.working_days_pattern(settings.factory_id.as_deref());
    let mut calendar = WorkCalendar::custom(pattern, std::iter::empty());
    if let Some(holiday_calendar) = settings.holiday_calendar {
        let (start, end) = holiday_window(entries, base_start, window_years);
        let holidays = provider.holidays_in_range(holiday_calendar, start, end);
        calendar.add_holidays(holidays.iter().copied());
    }
    calendar
}

fn holiday_window(
    entries: &[ProgrammeEntry],
    base_start: NaiveDate,
    window_years: u32,
) -> (NaiveDate, NaiveDate) {
    let manual = entries
        .iter()
        .flat_map(|entry| [entry.manual_start_date, entry.manual_end_date])
        .flatten();
    let (earliest, latest) = manual.fold(
        (base_start, shift_years(base_start, window_years as i32)),
        |(lo, hi), date| (lo.min(date), hi.max(date)),
    );
    (shift_years(earliest, -LOOKBACK_YEARS), latest)
}

fn shift_years(date: NaiveDate, years: i32) -> NaiveDate {
    let target_year = date.year() + years;
    date.with_year(target_year)
        .or_else(|| NaiveDate::from_ymd_opt(target_year, date.month(), 28))
        .unwrap_or(if years < 0 { NaiveDate::MIN } else { NaiveDate::MAX })
}

/// Calendar provider backed by [`EngineConfig`] factory patterns and an owned
/// holiday cache.
#[derive(Debug, Clone)]
pub struct ConfiguredCalendarProvider {
    default_working_days: Vec<Weekday>,
    factories: HashMap<String, Vec<Weekday>>,
    cache: HolidayCache,
}

impl ConfiguredCalendarProvider {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            default_working_days: config.default_working_days.clone(),
            factories: config.factories.clone(),
            cache: HolidayCache::new(config.holiday_cache_capacity),
        }
    }

    pub fn cache(&self) -> &HolidayCache {
        &self.cache
    }
}

impl Default for ConfiguredCalendarProvider {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl CalendarProvider for ConfiguredCalendarProvider {
    fn working_days_pattern(&self, factory_id: Option<&str>) -> HashSet<Weekday> {
        let configured = match factory_id {
            Some(id) => match self.factories.get(id) {
                Some(days) => days.as_slice(),
                None => {
                    tracing::debug!(factory = id, "unknown factory; using default work pattern");
                    self.default_working_days.as_slice()
                }
            },
            None => self.default_working_days.as_slice(),
        };
        let pattern: HashSet<Weekday> = configured.iter().copied().collect();
        if pattern.is_empty() {
            WorkCalendar::STANDARD_WEEK.into_iter().collect()
        } else {
            pattern
        }
    }

    fn holidays_in_range(
        &self,
        calendar: HolidayCalendarType,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Arc<BTreeSet<NaiveDate>> {
        self.cache.holidays_in_range(calendar, start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::OwnerId;

    fn d(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn unknown_factory_uses_default_pattern() {
        let config = EngineConfig::default().with_factory("six-day", WorkCalendar::ALL_WEEKDAYS[..6].to_vec());
        let provider = ConfiguredCalendarProvider::new(&config);
        assert!(provider.working_days_pattern(Some("six-day")).contains(&Weekday::Sat));
        assert_eq!(provider.working_days_pattern(Some("other")).len(), 5);
        assert_eq!(provider.working_days_pattern(None).len(), 5);
    }

    #[test]
    fn owner_calendar_includes_regional_holidays() {
        let provider = ConfiguredCalendarProvider::default();
        let mut settings = OwnerSettings::new(OwnerId::from("job"));
        settings.holiday_calendar = Some(HolidayCalendarType::Public);
        let calendar = calendar_for_owner(&provider, &settings, &[], d(2024, 1, 1), 5);
        assert!(!calendar.is_working_day(d(2024, 12, 25)));
        assert!(!calendar.is_working_day(d(2028, 12, 25)));
        assert!(calendar.is_working_day(d(2024, 12, 24)));
        // Back-scheduled starts can land before the base date.
        assert!(!calendar.is_working_day(d(2023, 12, 25)));
    }

    #[test]
    fn window_stretches_to_manual_dates() {
        let owner = OwnerId::from("job");
        let mut early = ProgrammeEntry::new(owner.clone(), "1-GF", 0, 1);
        early.manual_start_date = Some(d(2021, 6, 1));
        let mut late = ProgrammeEntry::new(owner, "1-L1", 1, 1);
        late.manual_end_date = Some(d(2033, 3, 1));
        let (start, end) = holiday_window(&[early, late], d(2025, 1, 6), 5);
        assert_eq!(start, d(2020, 6, 1));
        assert_eq!(end, d(2033, 3, 1));
    }

    #[test]
    fn leap_day_shift_falls_back_to_the_28th() {
        assert_eq!(shift_years(d(2024, 2, 29), 1), d(2025, 2, 28));
        assert_eq!(shift_years(d(2024, 2, 29), -1), d(2023, 2, 28));
    }
}
