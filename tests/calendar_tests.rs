use chrono::{Datelike, NaiveDate, Weekday};
use programme_engine::{HolidayCache, HolidayCalendarType, WorkCalendar, WorkCalendarConfig};

fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn standard_week_excludes_weekends() {
    let cal = WorkCalendar::default();
    // 2025-01-04 is a Saturday, 2025-01-05 is a Sunday
    assert!(!cal.is_working_day(d(2025, 1, 4)));
    assert!(!cal.is_working_day(d(2025, 1, 5)));
    assert!(cal.is_working_day(d(2025, 1, 6)));
}

#[test]
fn next_working_day_is_strictly_after() {
    let cal = WorkCalendar::default();
    let fri = d(2025, 1, 3);
    let next = cal.next_working_day(fri);
    assert_eq!(next.weekday(), Weekday::Mon);
    assert_eq!(next, d(2025, 1, 6));
    assert_eq!(cal.next_working_day(d(2025, 1, 6)), d(2025, 1, 7));
}

#[test]
fn ensure_working_day_keeps_working_days() {
    let cal = WorkCalendar::default();
    assert_eq!(cal.ensure_working_day(d(2025, 1, 6)), d(2025, 1, 6));
    assert_eq!(cal.ensure_working_day(d(2025, 1, 4)), d(2025, 1, 6));
}

#[test]
fn add_working_days_counts_only_workdays() {
    let cal = WorkCalendar::default();
    let mon = d(2025, 1, 6);
    assert_eq!(cal.add_working_days(mon, 0), mon);
    assert_eq!(cal.add_working_days(mon, 4), d(2025, 1, 10));
    assert_eq!(cal.add_working_days(mon, 5), d(2025, 1, 13));
}

#[test]
fn subtract_working_days_walks_back_over_weekend() {
    let cal = WorkCalendar::default();
    assert_eq!(cal.subtract_working_days(d(2025, 1, 13), 1), d(2025, 1, 10));
    assert_eq!(cal.subtract_working_days(d(2025, 1, 10), 4), d(2025, 1, 6));
}

#[test]
fn holidays_are_skipped() {
    let cal = WorkCalendar::custom(WorkCalendar::STANDARD_WEEK, [d(2025, 1, 7)]);
    assert!(!cal.is_working_day(d(2025, 1, 7)));
    assert_eq!(cal.next_working_day(d(2025, 1, 6)), d(2025, 1, 8));
    assert_eq!(cal.add_working_days(d(2025, 1, 6), 2), d(2025, 1, 9));
}

#[test]
fn range_and_count_agree() {
    let cal = WorkCalendar::default();
    let start = d(2025, 1, 6);
    let end = d(2025, 1, 19);
    let days = cal.working_days_in_range(start, end);
    assert_eq!(days.len() as i64, cal.working_days_between(start, end));
    assert_eq!(days.len(), 10);
}

#[test]
fn empty_pattern_falls_back_to_standard_week() {
    let cal = WorkCalendar::custom(Vec::<Weekday>::new(), Vec::new());
    assert!(cal.is_working_day(d(2025, 1, 6)));
    assert!(!cal.is_working_day(d(2025, 1, 4)));
}

#[test]
fn six_day_pattern_includes_saturday() {
    let mut cal = WorkCalendar::default();
    cal.set_working_days(vec![
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
    ]);
    assert!(cal.is_working_day(d(2025, 1, 4)));
    assert_eq!(cal.next_working_day(d(2025, 1, 3)), d(2025, 1, 4));
}

#[test]
fn config_round_trip_through_json() {
    let mut cal = WorkCalendar::default();
    cal.add_recurring_holiday(12, 25, 2024, 2026);
    let json = serde_json::to_string(&cal.to_config()).unwrap();
    let config: WorkCalendarConfig = serde_json::from_str(&json).unwrap();
    let restored = WorkCalendar::from_config(&config);
    assert_eq!(restored, cal);
    assert_eq!(restored.holiday_count(), 3);
}

#[test]
fn union_calendar_shuts_down_between_christmas_and_new_year() {
    let cache = HolidayCache::new(8);
    let holidays = cache.holidays_in_range(HolidayCalendarType::Union, d(2024, 1, 1), d(2025, 1, 31));
    let cal = WorkCalendar::custom(WorkCalendar::STANDARD_WEEK, holidays.iter().copied());
    // Christmas, Boxing Day, shutdown through the 31st, New Year's Day.
    for day in [25, 26, 27, 30, 31] {
        assert!(!cal.is_working_day(d(2024, 12, day)), "2024-12-{day}");
    }
    assert_eq!(cal.next_working_day(d(2024, 12, 24)), d(2025, 1, 2));
}

#[test]
fn holiday_cache_reuses_expansion() {
    let cache = HolidayCache::new(4);
    let start = d(2024, 1, 1);
    let end = d(2028, 12, 31);
    assert!(!cache.contains(HolidayCalendarType::Public, start, end));
    let first = cache.holidays_in_range(HolidayCalendarType::Public, start, end);
    assert!(cache.contains(HolidayCalendarType::Public, start, end));
    let second = cache.holidays_in_range(HolidayCalendarType::Public, start, end);
    assert!(std::sync::Arc::ptr_eq(&first, &second));
}
