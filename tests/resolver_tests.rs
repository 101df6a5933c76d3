use chrono::NaiveDate;
use programme_engine::{
    OwnerId, ProgrammeEntry, ReferenceIssue, Relationship, Resolver, WorkCalendar,
};

fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn entry(order: i32, days: u32) -> ProgrammeEntry {
    ProgrammeEntry::new(OwnerId::from("job-7"), format!("1-L{}", order + 1), order, days)
}

fn dates(entry: &ProgrammeEntry) -> (NaiveDate, NaiveDate) {
    (
        entry.estimated_start_date.unwrap(),
        entry.estimated_end_date.unwrap(),
    )
}

#[test]
fn single_entry_spans_its_cycle() {
    let cal = WorkCalendar::default();
    let out = Resolver::new(&cal).resolve(vec![entry(0, 5)], d(2024, 1, 1));
    assert_eq!(dates(&out.entries[0]), (d(2024, 1, 1), d(2024, 1, 5)));
}

#[test]
fn finish_to_start_begins_next_working_day() {
    let cal = WorkCalendar::default();
    let entries = vec![entry(0, 5), entry(1, 3).with_predecessor(0, Relationship::FS)];
    let out = Resolver::new(&cal).resolve(entries, d(2024, 1, 1));
    assert_eq!(dates(&out.entries[1]), (d(2024, 1, 8), d(2024, 1, 10)));
}

#[test]
fn manual_start_overrides_chaining() {
    let cal = WorkCalendar::default();
    let mut second = entry(1, 3);
    second.manual_start_date = Some(d(2024, 2, 1));
    let out = Resolver::new(&cal).resolve(vec![entry(0, 5), second], d(2024, 1, 1));
    assert_eq!(dates(&out.entries[1]), (d(2024, 2, 1), d(2024, 2, 5)));

    // 2024-02-03 is a Saturday.
    let mut weekend = entry(1, 1);
    weekend.manual_start_date = Some(d(2024, 2, 3));
    let out = Resolver::new(&cal).resolve(vec![entry(0, 5), weekend], d(2024, 1, 1));
    assert_eq!(dates(&out.entries[1]), (d(2024, 2, 5), d(2024, 2, 5)));
}

#[test]
fn start_to_start_shares_predecessor_start() {
    let cal = WorkCalendar::default();
    let entries = vec![
        entry(0, 5),
        entry(1, 2),
        entry(2, 4).with_predecessor(0, Relationship::SS),
    ];
    let out = Resolver::new(&cal).resolve(entries, d(2024, 1, 1));
    assert_eq!(
        out.entries[2].estimated_start_date,
        out.entries[0].estimated_start_date
    );
}

#[test]
fn finish_to_finish_aligns_ends() {
    let cal = WorkCalendar::default();
    let entries = vec![entry(0, 5), entry(1, 3).with_predecessor(0, Relationship::FF)];
    let out = Resolver::new(&cal).resolve(entries, d(2024, 1, 1));
    assert_eq!(dates(&out.entries[1]), (d(2024, 1, 3), d(2024, 1, 5)));
}

#[test]
fn start_to_finish_ends_on_predecessor_start() {
    let cal = WorkCalendar::default();
    let entries = vec![entry(0, 5), entry(1, 3).with_predecessor(0, Relationship::SF)];
    let out = Resolver::new(&cal).resolve(entries, d(2024, 1, 8));
    assert_eq!(dates(&out.entries[1]), (d(2024, 1, 4), d(2024, 1, 8)));
}

#[test]
fn forward_reference_falls_back_to_chaining() {
    let cal = WorkCalendar::default();
    let entries = vec![
        entry(0, 2),
        entry(1, 2).with_predecessor(2, Relationship::SS),
        entry(2, 2),
    ];
    let out = Resolver::new(&cal).resolve(entries, d(2024, 1, 1));
    assert_eq!(out.inconsistencies.len(), 1);
    assert_eq!(out.inconsistencies[0].issue, ReferenceIssue::Forward);
    assert!(!out.inconsistencies[0].cleared);
    assert_eq!(dates(&out.entries[1]), (d(2024, 1, 3), d(2024, 1, 4)));
    // The reference itself survives for the user to fix.
    assert_eq!(out.entries[1].predecessor_sequence_order, Some(2));
}

#[test]
fn holidays_push_dates_out() {
    let cal = WorkCalendar::custom(WorkCalendar::STANDARD_WEEK, [d(2024, 1, 3)]);
    let out = Resolver::new(&cal).resolve(vec![entry(0, 3)], d(2024, 1, 1));
    assert_eq!(dates(&out.entries[0]), (d(2024, 1, 1), d(2024, 1, 4)));
}

#[test]
fn every_entry_ends_on_or_after_start_on_working_days() {
    let cal = WorkCalendar::custom(WorkCalendar::STANDARD_WEEK, [d(2024, 1, 15), d(2024, 1, 26)]);
    let mut entries = vec![
        entry(0, 4),
        entry(1, 6).with_predecessor(0, Relationship::SS),
        entry(2, 1).with_predecessor(1, Relationship::FF),
        entry(3, 7).with_predecessor(2, Relationship::SF),
        entry(4, 3),
        entry(5, 2).with_predecessor(9, Relationship::FS),
    ];
    entries[4].manual_end_date = Some(d(2024, 1, 2));
    let out = Resolver::new(&cal).resolve(entries, d(2024, 1, 6));
    for e in &out.entries {
        let (start, end) = dates(e);
        assert!(end >= start, "{} ends before it starts", e.display_name());
        assert!(cal.is_working_day(start));
        assert!(cal.is_working_day(end));
    }
}

#[test]
fn recalculation_is_idempotent() {
    let cal = WorkCalendar::default();
    let entries = vec![
        entry(3, 2),
        entry(7, 5).with_predecessor(3, Relationship::SS),
        entry(9, 1).with_predecessor(42, Relationship::FS),
    ];
    let resolver = Resolver::new(&cal);
    let first = resolver.resolve(entries, d(2024, 1, 1));
    let second = resolver.resolve(first.entries.clone(), d(2024, 1, 1));
    assert_eq!(first.entries, second.entries);
    assert_eq!(second.changed, 0);
    assert!(second.inconsistencies.is_empty());
}

#[test]
fn unchanged_programme_reports_no_changes() {
    let cal = WorkCalendar::default();
    let out = Resolver::new(&cal).resolve(vec![entry(0, 1), entry(1, 1)], d(2024, 1, 1));
    assert_eq!(out.changed, 2);
    let again = Resolver::new(&cal).resolve(out.entries, d(2024, 1, 1));
    assert_eq!(again.changed, 0);
}
