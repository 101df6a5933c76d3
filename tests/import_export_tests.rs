use chrono::NaiveDate;
use programme_engine::{
    HolidayCalendarType, OwnerId, OwnerSettings, PersistenceError, ProgrammeEntry,
    ProgrammeSnapshot, Relationship, load_programme_from_csv, load_programme_from_json,
    save_programme_to_csv, save_programme_to_json,
};
use std::io::Write;
use tempfile::NamedTempFile;

fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn sample_snapshot() -> ProgrammeSnapshot {
    let owner = OwnerId::from("job-export");
    let mut settings = OwnerSettings::new(owner.clone());
    settings.name = "Export Job".into();
    settings.base_start_date = Some(d(2025, 1, 6));
    settings.holiday_calendar = Some(HolidayCalendarType::Union);
    settings.factory_id = Some("east".into());
    settings.highest_level = 4;

    let mut first = ProgrammeEntry::new(owner.clone(), "1-GF", 0, 5);
    first.pour_label = Some("A".into());
    first.estimated_start_date = Some(d(2025, 1, 6));
    first.estimated_end_date = Some(d(2025, 1, 10));
    first.notes = Some("Pour A, crane booked".into());

    let mut second =
        ProgrammeEntry::new(owner, "1-L1", 1, 3).with_predecessor(0, Relationship::FF);
    second.manual_start_date = Some(d(2025, 1, 8));
    second.manual_end_date = Some(d(2025, 1, 14));

    ProgrammeSnapshot::new(settings, vec![first, second])
}

#[test]
fn json_round_trip_preserves_programme() {
    let snapshot = sample_snapshot();
    let file = NamedTempFile::new().unwrap();
    save_programme_to_json(&snapshot, file.path()).unwrap();
    let loaded = load_programme_from_json(file.path()).unwrap();
    assert_eq!(loaded, snapshot);
}

#[test]
fn csv_round_trip_preserves_programme() {
    let snapshot = sample_snapshot();
    let file = NamedTempFile::new().unwrap();
    save_programme_to_csv(&snapshot, file.path()).unwrap();

    let text = std::fs::read_to_string(file.path()).unwrap();
    let mut lines = text.lines();
    assert!(lines.next().unwrap().starts_with("id,group_key"));
    assert!(lines.next().unwrap().starts_with("__settings__"));

    let loaded = load_programme_from_csv(file.path()).unwrap();
    assert_eq!(loaded, snapshot);
}

#[test]
fn csv_without_settings_row_is_rejected() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        "id,group_key,pour_label,sequence_order,cycle_days,predecessor_sequence_order,relationship,manual_start_date,manual_end_date,estimated_start_date,estimated_end_date,notes,settings_json"
    )
    .unwrap();
    writeln!(
        file,
        "0b6f1c1e-8f0a-4c3e-9d55-5d2a3f0f7a10,1-GF,,0,5,,,,,,,,"
    )
    .unwrap();
    let err = load_programme_from_csv(file.path()).unwrap_err();
    assert!(matches!(err, PersistenceError::InvalidData(_)));
}

#[test]
fn snapshot_with_duplicate_orders_is_not_saved() {
    let mut snapshot = sample_snapshot();
    snapshot.entries[1].sequence_order = 0;
    snapshot.entries[1].clear_predecessor();
    let file = NamedTempFile::new().unwrap();
    let err = save_programme_to_json(&snapshot, file.path()).unwrap_err();
    assert!(matches!(err, PersistenceError::InvalidData(_)));
}
