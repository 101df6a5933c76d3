use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(Uuid);

impl EntryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for EntryId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// The job or activity tree a programme belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OwnerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Precedence relationship between an entry and its predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Relationship {
    /// Finish-to-start
    #[default]
    FS,
    /// Start-to-start
    SS,
    /// Finish-to-finish
    FF,
    /// Start-to-finish
    SF,
}

impl Relationship {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relationship::FS => "FS",
            Relationship::SS => "SS",
            Relationship::FF => "FF",
            Relationship::SF => "SF",
        }
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Relationship {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FS" => Ok(Relationship::FS),
            "SS" => Ok(Relationship::SS),
            "FF" => Ok(Relationship::FF),
            "SF" => Ok(Relationship::SF),
            other => Err(format!("unknown relationship '{other}'")),
        }
    }
}

/// One work item in an owner's programme: a building level, a pour, or an
/// activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgrammeEntry {
    pub id: EntryId,
    pub owner_id: OwnerId,
    pub group_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pour_label: Option<String>,
    pub sequence_order: i32,
    /// Inclusive working-day duration.
    pub cycle_days: u32,
    /// Addresses the predecessor by its `sequence_order`, not its id.
    #[serde(default)]
    pub predecessor_sequence_order: Option<i32>,
    #[serde(default)]
    pub relationship: Option<Relationship>,
    #[serde(default)]
    pub manual_start_date: Option<NaiveDate>,
    #[serde(default)]
    pub manual_end_date: Option<NaiveDate>,
    #[serde(default)]
    pub estimated_start_date: Option<NaiveDate>,
    #[serde(default)]
    pub estimated_end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ProgrammeEntry {
    pub fn new(
        owner_id: OwnerId,
        group_key: impl Into<String>,
        sequence_order: i32,
        cycle_days: u32,
    ) -> Self {
        Self {
            id: EntryId::new(),
            owner_id,
            group_key: group_key.into(),
            pour_label: None,
            sequence_order,
            cycle_days,
            predecessor_sequence_order: None,
            relationship: None,
            manual_start_date: None,
            manual_end_date: None,
            estimated_start_date: None,
            estimated_end_date: None,
            notes: None,
        }
    }

    pub fn with_predecessor(mut self, sequence_order: i32, relationship: Relationship) -> Self {
        self.predecessor_sequence_order = Some(sequence_order);
        self.relationship = Some(relationship);
        self
    }

    /// Label shown to users, e.g. `1-L3` or `1-L3 B`.
    pub fn display_name(&self) -> String {
        match &self.pour_label {
            Some(label) => format!("{} {}", self.group_key, label),
            None => self.group_key.clone(),
        }
    }

    /// The relationship that applies when a predecessor is set.
    pub fn effective_relationship(&self) -> Option<Relationship> {
        self.predecessor_sequence_order
            .map(|_| self.relationship.unwrap_or_default())
    }

    pub fn set_predecessor(&mut self, predecessor: Option<i32>, relationship: Option<Relationship>) {
        self.predecessor_sequence_order = predecessor;
        self.relationship = predecessor.map(|_| relationship.unwrap_or_default());
    }

    pub fn clear_predecessor(&mut self) {
        self.set_predecessor(None, None);
    }

    pub fn clear_estimates(&mut self) {
        self.estimated_start_date = None;
        self.estimated_end_date = None;
    }

    /// Applies the present fields of `patch`. Validation happens before this
    /// is called.
    pub fn apply_patch(&mut self, patch: &EntryPatch) {
        if let Some(group_key) = &patch.group_key {
            self.group_key = group_key.clone();
        }
        if let Some(label) = &patch.pour_label {
            self.pour_label = label.clone();
        }
        if let Some(cycle_days) = patch.cycle_days {
            self.cycle_days = cycle_days;
        }
        match (patch.predecessor_sequence_order, patch.relationship) {
            (Some(predecessor), relationship) => {
                let relationship = relationship.flatten().or(self.relationship);
                self.set_predecessor(predecessor, relationship);
            }
            (None, Some(relationship)) => {
                if self.predecessor_sequence_order.is_some() {
                    self.relationship = Some(relationship.unwrap_or_default());
                }
            }
            (None, None) => {}
        }
        if let Some(date) = patch.manual_start_date {
            self.manual_start_date = date;
        }
        if let Some(date) = patch.manual_end_date {
            self.manual_end_date = date;
        }
        if let Some(notes) = &patch.notes {
            self.notes = notes.clone();
        }
    }
}

/// Single-entry edit. Outer `None` leaves a field untouched; `Some(None)`
/// clears a nullable field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_key: Option<String>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub pour_label: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle_days: Option<u32>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub predecessor_sequence_order: Option<Option<i32>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub relationship: Option<Option<Relationship>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub manual_start_date: Option<Option<NaiveDate>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub manual_end_date: Option<Option<NaiveDate>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub notes: Option<Option<String>>,
}

impl EntryPatch {
    pub fn is_empty(&self) -> bool {
        self == &EntryPatch::default()
    }

    /// Names of the fields this patch touches, for audit details.
    pub fn touched_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.group_key.is_some() {
            fields.push("group_key");
        }
        if self.pour_label.is_some() {
            fields.push("pour_label");
        }
        if self.cycle_days.is_some() {
            fields.push("cycle_days");
        }
        if self.predecessor_sequence_order.is_some() {
            fields.push("predecessor_sequence_order");
        }
        if self.relationship.is_some() {
            fields.push("relationship");
        }
        if self.manual_start_date.is_some() {
            fields.push("manual_start_date");
        }
        if self.manual_end_date.is_some() {
            fields.push("manual_end_date");
        }
        if self.notes.is_some() {
            fields.push("notes");
        }
        fields
    }
}

// A present JSON `null` deserializes to `Some(None)`; a missing key hits `default`.
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Coarse per-owner settings used to seed and date a programme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerSettings {
    pub owner_id: OwnerId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub base_start_date: Option<NaiveDate>,
    #[serde(default)]
    pub factory_id: Option<String>,
    #[serde(default)]
    pub holiday_calendar: Option<crate::holidays::HolidayCalendarType>,
    #[serde(default = "OwnerSettings::default_building_count")]
    pub building_count: u32,
    #[serde(default)]
    pub lowest_level: i32,
    #[serde(default)]
    pub highest_level: i32,
    #[serde(default = "OwnerSettings::default_cycle_days")]
    pub default_cycle_days: u32,
}

impl OwnerSettings {
    pub fn new(owner_id: OwnerId) -> Self {
        Self {
            owner_id,
            name: String::new(),
            base_start_date: None,
            factory_id: None,
            holiday_calendar: None,
            building_count: Self::default_building_count(),
            lowest_level: 0,
            highest_level: 0,
            default_cycle_days: Self::default_cycle_days(),
        }
    }

    fn default_building_count() -> u32 {
        1
    }

    fn default_cycle_days() -> u32 {
        5
    }
}

/// An item registered against an owner (e.g. a precast element) that places
/// work on a building level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredItem {
    pub building: u32,
    pub level: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl RegisteredItem {
    pub fn new(building: u32, level: i32) -> Self {
        Self {
            building,
            level,
            reference: None,
        }
    }
}

/// Who performed an operation, for the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub name: String,
}

impl Actor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    pub fn system() -> Self {
        Self::new("system", "System")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_distinguishes_missing_from_null() {
        let patch: EntryPatch =
            serde_json::from_str(r#"{"predecessor_sequence_order": null, "cycle_days": 4}"#).unwrap();
        assert_eq!(patch.predecessor_sequence_order, Some(None));
        assert_eq!(patch.manual_start_date, None);
        assert_eq!(patch.cycle_days, Some(4));
    }

    #[test]
    fn clearing_predecessor_clears_relationship() {
        let mut entry = ProgrammeEntry::new(OwnerId::from("job"), "1-L1", 1, 3)
            .with_predecessor(0, Relationship::SS);
        entry.apply_patch(&EntryPatch {
            predecessor_sequence_order: Some(None),
            ..EntryPatch::default()
        });
        assert_eq!(entry.predecessor_sequence_order, None);
        assert_eq!(entry.relationship, None);
    }

    #[test]
    fn setting_predecessor_defaults_to_finish_to_start() {
        let mut entry = ProgrammeEntry::new(OwnerId::from("job"), "1-L1", 1, 3);
        entry.apply_patch(&EntryPatch {
            predecessor_sequence_order: Some(Some(0)),
            ..EntryPatch::default()
        });
        assert_eq!(entry.relationship, Some(Relationship::FS));
    }
}
