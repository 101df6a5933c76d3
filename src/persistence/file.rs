use super::{PersistenceError, PersistenceResult};
use crate::entry::{EntryId, OwnerSettings, ProgrammeEntry, Relationship};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use std::str::FromStr;

const SETTINGS_MARKER: &str = "__settings__";

/// An owner's settings and entries, as exchanged through files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgrammeSnapshot {
    pub settings: OwnerSettings,
    pub entries: Vec<ProgrammeEntry>,
}

impl ProgrammeSnapshot {
    pub fn new(settings: OwnerSettings, entries: Vec<ProgrammeEntry>) -> Self {
        Self { settings, entries }
    }

    fn validated(self) -> PersistenceResult<Self> {
        super::validate_entries(&self.settings.owner_id, &self.entries)?;
        Ok(Self {
            settings: self.settings,
            entries: super::sorted(self.entries),
        })
    }
}

pub fn save_programme_to_json<P: AsRef<Path>>(
    snapshot: &ProgrammeSnapshot,
    path: P,
) -> PersistenceResult<()> {
    super::validate_entries(&snapshot.settings.owner_id, &snapshot.entries)?;
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, snapshot)?;
    Ok(())
}

pub fn load_programme_from_json<P: AsRef<Path>>(path: P) -> PersistenceResult<ProgrammeSnapshot> {
    let file = File::open(path)?;
    let snapshot: ProgrammeSnapshot = serde_json::from_reader(file)?;
    snapshot.validated()
}

/// One CSV row. The first row of a file carries the owner settings as JSON in
/// `settings_json` with `id` set to the marker; entry rows leave it empty.
#[derive(Serialize, Deserialize)]
struct EntryCsvRecord {
    id: String,
    group_key: String,
    pour_label: String,
    sequence_order: String,
    cycle_days: String,
    predecessor_sequence_order: String,
    relationship: String,
    manual_start_date: String,
    manual_end_date: String,
    estimated_start_date: String,
    estimated_end_date: String,
    notes: String,
    settings_json: String,
}

impl EntryCsvRecord {
    fn settings_row(settings: &OwnerSettings) -> PersistenceResult<Self> {
        Ok(Self {
            id: SETTINGS_MARKER.to_string(),
            group_key: String::new(),
            pour_label: String::new(),
            sequence_order: String::new(),
            cycle_days: String::new(),
            predecessor_sequence_order: String::new(),
            relationship: String::new(),
            manual_start_date: String::new(),
            manual_end_date: String::new(),
            estimated_start_date: String::new(),
            estimated_end_date: String::new(),
            notes: String::new(),
            settings_json: serde_json::to_string(settings)?,
        })
    }

    fn is_settings(&self) -> bool {
        self.id.trim() == SETTINGS_MARKER
    }

    fn into_entry(self, settings: &OwnerSettings) -> PersistenceResult<ProgrammeEntry> {
        let id = EntryId::from_str(&self.id)
            .map_err(|e| PersistenceError::InvalidData(format!("invalid id '{}': {e}", self.id)))?;
        let sequence_order = parse_i32(&self.sequence_order)?.ok_or_else(|| {
            PersistenceError::InvalidData(format!("entry {id} has no sequence_order"))
        })?;
        let cycle_days = self.cycle_days.trim().parse::<u32>().map_err(|e| {
            PersistenceError::InvalidData(format!("invalid cycle_days '{}': {e}", self.cycle_days))
        })?;
        let relationship = if self.relationship.trim().is_empty() {
            None
        } else {
            Some(Relationship::from_str(&self.relationship).map_err(PersistenceError::InvalidData)?)
        };

        let mut entry = ProgrammeEntry::new(
            settings.owner_id.clone(),
            self.group_key,
            sequence_order,
            cycle_days,
        );
        entry.id = id;
        entry.pour_label = parse_string_option(self.pour_label);
        entry.predecessor_sequence_order = parse_i32(&self.predecessor_sequence_order)?;
        entry.relationship = relationship;
        entry.manual_start_date = parse_date(&self.manual_start_date)?;
        entry.manual_end_date = parse_date(&self.manual_end_date)?;
        entry.estimated_start_date = parse_date(&self.estimated_start_date)?;
        entry.estimated_end_date = parse_date(&self.estimated_end_date)?;
        entry.notes = parse_string_option(self.notes);
        Ok(entry)
    }
}

impl From<&ProgrammeEntry> for EntryCsvRecord {
    fn from(entry: &ProgrammeEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            group_key: entry.group_key.clone(),
            pour_label: entry.pour_label.clone().unwrap_or_default(),
            sequence_order: entry.sequence_order.to_string(),
            cycle_days: entry.cycle_days.to_string(),
            predecessor_sequence_order: format_option_i32(entry.predecessor_sequence_order),
            relationship: entry
                .relationship
                .map(|r| r.as_str().to_string())
                .unwrap_or_default(),
            manual_start_date: format_date(entry.manual_start_date),
            manual_end_date: format_date(entry.manual_end_date),
            estimated_start_date: format_date(entry.estimated_start_date),
            estimated_end_date: format_date(entry.estimated_end_date),
            notes: entry.notes.clone().unwrap_or_default(),
            settings_json: String::new(),
        }
    }
}

pub fn save_programme_to_csv<P: AsRef<Path>>(
    snapshot: &ProgrammeSnapshot,
    path: P,
) -> PersistenceResult<()> {
    super::validate_entries(&snapshot.settings.owner_id, &snapshot.entries)?;
    let file = File::create(path)?;
    let mut writer = csv::Writer::from_writer(file);
    writer.serialize(EntryCsvRecord::settings_row(&snapshot.settings)?)?;
    for entry in &snapshot.entries {
        writer.serialize(EntryCsvRecord::from(entry))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn load_programme_from_csv<P: AsRef<Path>>(path: P) -> PersistenceResult<ProgrammeSnapshot> {
    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(file);
    let mut records = reader.deserialize::<EntryCsvRecord>();

    let settings = match records.next() {
        Some(record) => {
            let record = record?;
            if !record.is_settings() {
                return Err(PersistenceError::InvalidData(
                    "CSV file must start with a settings row".into(),
                ));
            }
            serde_json::from_str::<OwnerSettings>(&record.settings_json)?
        }
        None => {
            return Err(PersistenceError::InvalidData(
                "CSV file contained no settings row".into(),
            ));
        }
    };

    let mut entries = Vec::new();
    for record in records {
        let record = record?;
        if record.is_settings() {
            return Err(PersistenceError::InvalidData(
                "CSV file contained more than one settings row".into(),
            ));
        }
        entries.push(record.into_entry(&settings)?);
    }

    ProgrammeSnapshot::new(settings, entries).validated()
}

fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn parse_date(input: &str) -> PersistenceResult<Option<NaiveDate>> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map(Some)
        .map_err(|e| PersistenceError::InvalidData(format!("invalid date '{input}': {e}")))
}

fn format_option_i32(value: Option<i32>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn parse_i32(input: &str) -> PersistenceResult<Option<i32>> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    input
        .trim()
        .parse::<i32>()
        .map(Some)
        .map_err(|e| PersistenceError::InvalidData(format!("invalid integer '{input}': {e}")))
}

fn parse_string_option(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
