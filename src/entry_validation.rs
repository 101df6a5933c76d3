use crate::entry::{EntryId, EntryPatch, ProgrammeEntry};
use std::collections::HashSet;
use thiserror::Error;

/// Structural problems that reject an operation before anything is mutated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryValidationError {
    #[error("entry {entry} has non-positive duration {cycle_days}")]
    NonPositiveDuration { entry: String, cycle_days: u32 },
    #[error("sequence order {0} is used by more than one entry")]
    DuplicateSequenceOrder(i32),
    #[error("entry id {0} appears more than once")]
    DuplicateEntryId(EntryId),
    #[error("entry {entry} lists itself (sequence order {sequence_order}) as predecessor")]
    SelfReference { entry: String, sequence_order: i32 },
    #[error("entry {entry} references predecessor sequence order {predecessor} which no entry holds")]
    UnknownPredecessor { entry: String, predecessor: i32 },
    #[error("entry {0} has a relationship but no predecessor")]
    RelationshipWithoutPredecessor(String),
    #[error("entry {entry} has manual end {end} before manual start {start}")]
    ManualEndBeforeStart {
        entry: String,
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },
    #[error("entry {entry} belongs to owner {found}, expected {expected}")]
    ForeignOwner {
        entry: String,
        expected: String,
        found: String,
    },
    #[error("reorder lists entry {0} more than once")]
    DuplicateInOrdering(EntryId),
    #[error("reorder must list every entry; {missing} missing")]
    IncompleteOrdering { missing: usize },
    #[error("invalid split of entry {entry}: {reason}")]
    InvalidSplit { entry: String, reason: String },
}

pub fn validate_entry(entry: &ProgrammeEntry) -> Result<(), EntryValidationError> {
    if entry.cycle_days == 0 {
        return Err(EntryValidationError::NonPositiveDuration {
            entry: entry.display_name(),
            cycle_days: entry.cycle_days,
        });
    }

    if entry.predecessor_sequence_order == Some(entry.sequence_order) {
        return Err(EntryValidationError::SelfReference {
            entry: entry.display_name(),
            sequence_order: entry.sequence_order,
        });
    }

    if entry.predecessor_sequence_order.is_none() && entry.relationship.is_some() {
        return Err(EntryValidationError::RelationshipWithoutPredecessor(
            entry.display_name(),
        ));
    }

    if let (Some(start), Some(end)) = (entry.manual_start_date, entry.manual_end_date) {
        if end < start {
            return Err(EntryValidationError::ManualEndBeforeStart {
                entry: entry.display_name(),
                start,
                end,
            });
        }
    }

    Ok(())
}

/// Checks every entry plus the owner-wide invariants: unique ids and unique
/// sequence orders. Predecessor targets are not required to exist here; a
/// dangling reference is handled by the resolver's fallback.
pub fn validate_entry_collection(entries: &[ProgrammeEntry]) -> Result<(), EntryValidationError> {
    let mut seen_ids = HashSet::with_capacity(entries.len());
    let mut seen_orders = HashSet::with_capacity(entries.len());
    for entry in entries {
        if !seen_ids.insert(entry.id) {
            return Err(EntryValidationError::DuplicateEntryId(entry.id));
        }
        if !seen_orders.insert(entry.sequence_order) {
            return Err(EntryValidationError::DuplicateSequenceOrder(
                entry.sequence_order,
            ));
        }
        validate_entry(entry)?;
    }
    Ok(())
}

/// Validates `patch` against the owner's current entries and returns the
/// patched entry without touching the originals.
pub fn validate_patch(
    entries: &[ProgrammeEntry],
    target: &ProgrammeEntry,
    patch: &EntryPatch,
) -> Result<ProgrammeEntry, EntryValidationError> {
    let mut patched = target.clone();
    patched.apply_patch(patch);

    if let Some(Some(_)) = patch.relationship {
        if patched.predecessor_sequence_order.is_none() {
            return Err(EntryValidationError::RelationshipWithoutPredecessor(
                patched.display_name(),
            ));
        }
    }

    if let Some(Some(predecessor)) = patch.predecessor_sequence_order {
        let exists = entries
            .iter()
            .any(|entry| entry.id != target.id && entry.sequence_order == predecessor);
        if predecessor != target.sequence_order && !exists {
            return Err(EntryValidationError::UnknownPredecessor {
                entry: patched.display_name(),
                predecessor,
            });
        }
    }

    validate_entry(&patched)?;
    Ok(patched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{OwnerId, Relationship};

    fn entry(order: i32, days: u32) -> ProgrammeEntry {
        ProgrammeEntry::new(OwnerId::from("job-1"), format!("1-L{order}"), order, days)
    }

    #[test]
    fn rejects_zero_duration() {
        let err = validate_entry(&entry(0, 0)).unwrap_err();
        assert!(matches!(err, EntryValidationError::NonPositiveDuration { .. }));
    }

    #[test]
    fn rejects_duplicate_sequence_orders() {
        let entries = vec![entry(0, 2), entry(0, 3)];
        assert_eq!(
            validate_entry_collection(&entries),
            Err(EntryValidationError::DuplicateSequenceOrder(0))
        );
    }

    #[test]
    fn rejects_self_reference() {
        let e = entry(2, 3).with_predecessor(2, Relationship::FS);
        assert!(matches!(
            validate_entry(&e),
            Err(EntryValidationError::SelfReference { sequence_order: 2, .. })
        ));
    }

    #[test]
    fn patch_to_unknown_predecessor_is_rejected() {
        let entries = vec![entry(0, 2), entry(1, 3)];
        let patch = EntryPatch {
            predecessor_sequence_order: Some(Some(7)),
            ..EntryPatch::default()
        };
        let err = validate_patch(&entries, &entries[1], &patch).unwrap_err();
        assert!(matches!(err, EntryValidationError::UnknownPredecessor { predecessor: 7, .. }));
    }

    #[test]
    fn patch_relationship_without_predecessor_is_rejected() {
        let entries = vec![entry(0, 2)];
        let patch = EntryPatch {
            relationship: Some(Some(Relationship::SS)),
            ..EntryPatch::default()
        };
        assert!(matches!(
            validate_patch(&entries, &entries[0], &patch),
            Err(EntryValidationError::RelationshipWithoutPredecessor(_))
        ));
    }
}
