//! Structural edits to an owner's programme.
//!
//! Predecessors are addressed by sequence order, so every edit that moves
//! entries goes through [`renumber`], which rewrites references through an
//! explicit old-to-new position map. The functions here are pure: they take
//! the current list and return the new one without re-dating it.

use crate::entry::{EntryId, EntryPatch, OwnerId, ProgrammeEntry, Relationship};
use crate::entry_validation::{self, EntryValidationError};
use crate::error::{ProgrammeError, ProgrammeResult};
use crate::graph::{DependencyGraph, ReferenceIssue};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
pub struct MutationOutcome {
    /// Full renumbered list, estimated dates not yet recomputed.
    pub entries: Vec<ProgrammeEntry>,
    /// Entries created, moved or relinked by the edit.
    pub affected: Vec<EntryId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitSummary {
    pub entries: Vec<ProgrammeEntry>,
    pub split: Vec<EntryId>,
    pub not_found: Vec<EntryId>,
    #[serde(skip)]
    pub affected: Vec<EntryId>,
}

/// How a split divides the parent's duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum SplitPolicy {
    /// Equal parts; leftover days go to the earliest parts.
    Even { parts: u32 },
    /// Explicit sub-entry durations; they must add up to the parent's.
    Sizes { sizes: Vec<u32> },
}

impl Default for SplitPolicy {
    fn default() -> Self {
        SplitPolicy::Even { parts: 2 }
    }
}

impl SplitPolicy {
    pub fn durations(&self, cycle_days: u32) -> Result<Vec<u32>, String> {
        match self {
            SplitPolicy::Even { parts } => {
                let parts = *parts;
                if parts < 2 {
                    return Err(format!("a split needs at least 2 parts, got {parts}"));
                }
                if parts > cycle_days {
                    return Err(format!(
                        "cannot split {cycle_days} day(s) into {parts} parts of at least one day"
                    ));
                }
                let base = cycle_days / parts;
                let remainder = cycle_days % parts;
                Ok((0..parts)
                    .map(|idx| base + u32::from(idx < remainder))
                    .collect())
            }
            SplitPolicy::Sizes { sizes } => {
                if sizes.len() < 2 {
                    return Err(format!(
                        "a split needs at least 2 parts, got {}",
                        sizes.len()
                    ));
                }
                if sizes.contains(&0) {
                    return Err("every part needs at least one day".to_string());
                }
                let total: u64 = sizes.iter().map(|&size| u64::from(size)).sum();
                if total != u64::from(cycle_days) {
                    return Err(format!(
                        "part sizes add up to {total} day(s), expected {cycle_days}"
                    ));
                }
                Ok(sizes.clone())
            }
        }
    }
}

/// `A`, `B`, ... `Z`, `AA`, ... for an unlabelled parent; `<label>1`,
/// `<label>2`, ... when the parent already carries a pour label.
pub fn pour_label(parent: Option<&str>, index: usize) -> String {
    match parent {
        Some(label) => format!("{label}{}", index + 1),
        None => {
            let mut n = index + 1;
            let mut letters = Vec::new();
            while n > 0 {
                let rem = (n - 1) % 26;
                letters.push(char::from(b'A' + rem as u8));
                n = (n - 1) / 26;
            }
            letters.iter().rev().collect()
        }
    }
}

/// Assigns contiguous positions to `ordered` and rewrites each predecessor
/// through `remap`. A reference with no mapping is cleared.
fn renumber(mut ordered: Vec<ProgrammeEntry>, remap: &HashMap<i32, i32>) -> Vec<ProgrammeEntry> {
    for (idx, entry) in ordered.iter_mut().enumerate() {
        entry.sequence_order = idx as i32;
        if let Some(predecessor) = entry.predecessor_sequence_order {
            match remap.get(&predecessor) {
                Some(&position) => entry.predecessor_sequence_order = Some(position),
                None => {
                    tracing::warn!(
                        entry = %entry.id,
                        predecessor,
                        "clearing reference to a sequence order no entry holds"
                    );
                    entry.clear_predecessor();
                }
            }
        }
    }
    ordered
}

fn sorted(entries: &[ProgrammeEntry]) -> Vec<ProgrammeEntry> {
    let mut ordered = entries.to_vec();
    ordered.sort_by_key(|entry| entry.sequence_order);
    ordered
}

fn not_found(owner_id: &OwnerId, entry_id: EntryId) -> ProgrammeError {
    ProgrammeError::EntryNotFound {
        owner_id: owner_id.clone(),
        entry_id,
    }
}

pub fn split_entry(
    owner_id: &OwnerId,
    entries: &[ProgrammeEntry],
    entry_id: EntryId,
    policy: &SplitPolicy,
) -> ProgrammeResult<MutationOutcome> {
    let ordered = sorted(entries);
    let idx = ordered
        .iter()
        .position(|entry| entry.id == entry_id)
        .ok_or_else(|| not_found(owner_id, entry_id))?;
    let parent = ordered[idx].clone();
    let sizes = policy
        .durations(parent.cycle_days)
        .map_err(|reason| EntryValidationError::InvalidSplit {
            entry: parent.display_name(),
            reason,
        })?;
    let parts = sizes.len();

    let subs: Vec<ProgrammeEntry> = sizes
        .iter()
        .enumerate()
        .map(|(k, &size)| {
            let mut sub = parent.clone();
            if k > 0 {
                sub.id = EntryId::new();
                sub.manual_start_date = None;
                sub.notes = None;
                sub.clear_predecessor();
            }
            if k + 1 < parts {
                sub.manual_end_date = None;
            }
            sub.pour_label = Some(pour_label(parent.pour_label.as_deref(), k));
            sub.cycle_days = size;
            sub.clear_estimates();
            sub
        })
        .collect();

    let dependents: Vec<EntryId> = ordered
        .iter()
        .filter(|entry| entry.predecessor_sequence_order == Some(parent.sequence_order))
        .map(|entry| entry.id)
        .collect();

    let first_sub = idx as i32;
    let last_sub = first_sub + parts as i32 - 1;
    let shift = parts as i32 - 1;
    let mut remap: HashMap<i32, i32> = HashMap::with_capacity(ordered.len());
    for (old_idx, entry) in ordered.iter().enumerate() {
        let position = match old_idx.cmp(&idx) {
            std::cmp::Ordering::Less => old_idx as i32,
            std::cmp::Ordering::Equal => last_sub,
            std::cmp::Ordering::Greater => old_idx as i32 + shift,
        };
        remap.insert(entry.sequence_order, position);
    }

    let sub_ids: Vec<EntryId> = subs.iter().map(|sub| sub.id).collect();
    let mut next = Vec::with_capacity(ordered.len() + parts - 1);
    next.extend_from_slice(&ordered[..idx]);
    next.extend(subs);
    next.extend_from_slice(&ordered[idx + 1..]);

    // The first sub-entry still carries the parent's own predecessor; the
    // remap would send a reference to the parent's position to the last
    // sub-entry, which is only right for dependents.
    let mut result = renumber(next, &remap);
    for position in (first_sub + 1)..=last_sub {
        result[position as usize].set_predecessor(Some(position - 1), Some(Relationship::FS));
    }

    // FF and SF fix the parent's finish, so that link moves to the last
    // sub-entry and the earlier parts chain in from the previous entry. A
    // manual start overrides the link and stays on the first part.
    let head = &result[first_sub as usize];
    let finish_anchored = head.manual_start_date.is_none()
        && matches!(
            head.effective_relationship(),
            Some(Relationship::FF | Relationship::SF)
        );
    if finish_anchored {
        let predecessor = head.predecessor_sequence_order;
        let relationship = head.effective_relationship();
        result[first_sub as usize].clear_predecessor();
        result[last_sub as usize].set_predecessor(predecessor, relationship);
    }

    tracing::info!(
        owner = %owner_id,
        entry = %entry_id,
        parts,
        relinked = dependents.len(),
        "split entry"
    );

    let mut affected = sub_ids;
    affected.extend(dependents);
    Ok(MutationOutcome {
        entries: result,
        affected,
    })
}

/// Splits each listed entry in turn. Ids that are not in the programme are
/// reported rather than failing the batch.
pub fn split_entries(
    owner_id: &OwnerId,
    entries: &[ProgrammeEntry],
    entry_ids: &[EntryId],
    policy: &SplitPolicy,
) -> ProgrammeResult<SplitSummary> {
    let mut current = sorted(entries);
    let mut split = Vec::new();
    let mut not_found_ids = Vec::new();
    let mut affected = Vec::new();
    for &entry_id in entry_ids {
        match split_entry(owner_id, &current, entry_id, policy) {
            Ok(outcome) => {
                current = outcome.entries;
                affected.extend(outcome.affected);
                split.push(entry_id);
            }
            Err(ProgrammeError::EntryNotFound { .. }) => not_found_ids.push(entry_id),
            Err(err) => return Err(err),
        }
    }
    Ok(SplitSummary {
        entries: current,
        split,
        not_found: not_found_ids,
        affected,
    })
}

pub fn reorder_entries(
    owner_id: &OwnerId,
    entries: &[ProgrammeEntry],
    ordered_ids: &[EntryId],
) -> ProgrammeResult<MutationOutcome> {
    let by_id: HashMap<EntryId, &ProgrammeEntry> =
        entries.iter().map(|entry| (entry.id, entry)).collect();

    let mut seen = HashSet::with_capacity(ordered_ids.len());
    let mut ordered = Vec::with_capacity(ordered_ids.len());
    for &entry_id in ordered_ids {
        let entry = by_id
            .get(&entry_id)
            .ok_or_else(|| not_found(owner_id, entry_id))?;
        if !seen.insert(entry_id) {
            return Err(EntryValidationError::DuplicateInOrdering(entry_id).into());
        }
        ordered.push((*entry).clone());
    }
    if ordered.len() != entries.len() {
        return Err(EntryValidationError::IncompleteOrdering {
            missing: entries.len() - ordered.len(),
        }
        .into());
    }

    let remap: HashMap<i32, i32> = ordered
        .iter()
        .enumerate()
        .map(|(idx, entry)| (entry.sequence_order, idx as i32))
        .collect();
    let before: HashMap<EntryId, i32> = entries
        .iter()
        .map(|entry| (entry.id, entry.sequence_order))
        .collect();

    let result = renumber(ordered, &remap);

    for reference in DependencyGraph::build(&result).unresolved_references() {
        if reference.issue == ReferenceIssue::Forward {
            tracing::warn!(
                owner = %owner_id,
                entry = %reference.entry_id,
                predecessor = reference.predecessor_sequence_order,
                "reorder placed a predecessor after its dependent"
            );
        }
    }

    let affected = result
        .iter()
        .filter(|entry| before.get(&entry.id) != Some(&entry.sequence_order))
        .map(|entry| entry.id)
        .collect();
    Ok(MutationOutcome {
        entries: result,
        affected,
    })
}

/// Removes an entry. Its dependents inherit its predecessor (keeping their own
/// relationship); when it had none they fall back to chaining off the entry
/// before them.
pub fn delete_entry(
    owner_id: &OwnerId,
    entries: &[ProgrammeEntry],
    entry_id: EntryId,
) -> ProgrammeResult<MutationOutcome> {
    let mut ordered = sorted(entries);
    let idx = ordered
        .iter()
        .position(|entry| entry.id == entry_id)
        .ok_or_else(|| not_found(owner_id, entry_id))?;
    let removed = ordered.remove(idx);

    let mut affected = Vec::new();
    for entry in ordered
        .iter_mut()
        .filter(|entry| entry.predecessor_sequence_order == Some(removed.sequence_order))
    {
        match removed.predecessor_sequence_order {
            Some(inherited) if inherited != entry.sequence_order => {
                entry.predecessor_sequence_order = Some(inherited);
            }
            _ => entry.clear_predecessor(),
        }
        affected.push(entry.id);
    }

    let remap: HashMap<i32, i32> = ordered
        .iter()
        .enumerate()
        .map(|(position, entry)| (entry.sequence_order, position as i32))
        .collect();

    tracing::info!(
        owner = %owner_id,
        entry = %entry_id,
        relinked = affected.len(),
        "deleted entry"
    );

    Ok(MutationOutcome {
        entries: renumber(ordered, &remap),
        affected,
    })
}

/// Validates and applies a single-entry patch, returning the full list and the
/// patched entry.
pub fn patch_entry(
    owner_id: &OwnerId,
    entries: &[ProgrammeEntry],
    entry_id: EntryId,
    patch: &EntryPatch,
) -> ProgrammeResult<(Vec<ProgrammeEntry>, ProgrammeEntry)> {
    let target = entries
        .iter()
        .find(|entry| entry.id == entry_id)
        .ok_or_else(|| not_found(owner_id, entry_id))?;
    let patched = entry_validation::validate_patch(entries, target, patch)?;
    let updated = entries
        .iter()
        .map(|entry| {
            if entry.id == entry_id {
                patched.clone()
            } else {
                entry.clone()
            }
        })
        .collect();
    Ok((updated, patched))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> OwnerId {
        OwnerId::from("job-1")
    }

    fn entry(order: i32, days: u32) -> ProgrammeEntry {
        ProgrammeEntry::new(owner(), format!("1-L{order}"), order, days)
    }

    #[test]
    fn even_policy_gives_remainder_to_early_parts() {
        assert_eq!(SplitPolicy::Even { parts: 2 }.durations(5), Ok(vec![3, 2]));
        assert_eq!(SplitPolicy::Even { parts: 3 }.durations(7), Ok(vec![3, 2, 2]));
        assert!(SplitPolicy::Even { parts: 4 }.durations(3).is_err());
        assert!(SplitPolicy::Sizes { sizes: vec![2, 0] }.durations(5).is_err());
        assert_eq!(SplitPolicy::Sizes { sizes: vec![4, 1] }.durations(5), Ok(vec![4, 1]));
        assert!(SplitPolicy::Sizes { sizes: vec![1, 1] }.durations(5).is_err());
    }

    #[test]
    fn labels_count_in_letters_or_extend_existing_label() {
        assert_eq!(pour_label(None, 0), "A");
        assert_eq!(pour_label(None, 25), "Z");
        assert_eq!(pour_label(None, 26), "AA");
        assert_eq!(pour_label(Some("B"), 1), "B2");
    }

    #[test]
    fn split_relinks_dependents_to_last_part() {
        let entries = vec![
            entry(0, 5),
            entry(1, 3).with_predecessor(0, Relationship::FS),
            entry(2, 2).with_predecessor(1, Relationship::SS),
        ];
        let parent = entries[0].id;
        let out = split_entry(&owner(), &entries, parent, &SplitPolicy::default()).unwrap();
        assert_eq!(out.entries.len(), 4);
        assert_eq!(out.entries[0].id, parent);
        assert_eq!(out.entries[0].pour_label.as_deref(), Some("A"));
        assert_eq!(out.entries[1].pour_label.as_deref(), Some("B"));
        assert_eq!(out.entries[1].predecessor_sequence_order, Some(0));
        assert_eq!(out.entries[2].predecessor_sequence_order, Some(1));
        assert_eq!(out.entries[3].predecessor_sequence_order, Some(2));
        assert_eq!(out.entries[3].relationship, Some(Relationship::SS));
    }

    #[test]
    fn first_part_keeps_parent_predecessor() {
        let entries = vec![
            entry(0, 2),
            entry(1, 1),
            entry(2, 4).with_predecessor(0, Relationship::SS),
        ];
        let target = entries[2].id;
        let out = split_entry(&owner(), &entries, target, &SplitPolicy::default()).unwrap();
        assert_eq!(out.entries[2].predecessor_sequence_order, Some(0));
        assert_eq!(out.entries[2].relationship, Some(Relationship::SS));
        assert_eq!(out.entries[3].predecessor_sequence_order, Some(2));
        assert_eq!(out.entries[3].relationship, Some(Relationship::FS));
    }

    #[test]
    fn reorder_follows_logical_predecessor() {
        let entries = vec![
            entry(0, 1),
            entry(1, 1),
            entry(2, 1).with_predecessor(0, Relationship::FS),
        ];
        let ids = vec![entries[1].id, entries[0].id, entries[2].id];
        let out = reorder_entries(&owner(), &entries, &ids).unwrap();
        assert_eq!(out.entries[1].id, entries[0].id);
        assert_eq!(out.entries[2].predecessor_sequence_order, Some(1));
        assert_eq!(out.affected.len(), 2);
    }

    #[test]
    fn reorder_rejects_duplicates_and_omissions() {
        let entries = vec![entry(0, 1), entry(1, 1)];
        let dup = vec![entries[0].id, entries[0].id];
        assert!(matches!(
            reorder_entries(&owner(), &entries, &dup),
            Err(ProgrammeError::ValidationFailed(
                EntryValidationError::DuplicateInOrdering(_)
            ))
        ));
        let partial = vec![entries[1].id];
        assert!(matches!(
            reorder_entries(&owner(), &entries, &partial),
            Err(ProgrammeError::ValidationFailed(
                EntryValidationError::IncompleteOrdering { missing: 1 }
            ))
        ));
        let unknown = vec![EntryId::new(), entries[0].id];
        assert!(matches!(
            reorder_entries(&owner(), &entries, &unknown),
            Err(ProgrammeError::EntryNotFound { .. })
        ));
    }

    #[test]
    fn delete_relinks_dependents_to_grandparent() {
        let entries = vec![
            entry(0, 1),
            entry(1, 1).with_predecessor(0, Relationship::FS),
            entry(2, 1).with_predecessor(1, Relationship::SS),
        ];
        let out = delete_entry(&owner(), &entries, entries[1].id).unwrap();
        assert_eq!(out.entries.len(), 2);
        assert_eq!(out.entries[1].id, entries[2].id);
        assert_eq!(out.entries[1].sequence_order, 1);
        assert_eq!(out.entries[1].predecessor_sequence_order, Some(0));
        assert_eq!(out.entries[1].relationship, Some(Relationship::SS));
        assert_eq!(out.affected, vec![entries[2].id]);
    }

    #[test]
    fn delete_clears_link_when_removed_entry_had_no_predecessor() {
        let entries = vec![entry(0, 1), entry(1, 1).with_predecessor(0, Relationship::FF)];
        let out = delete_entry(&owner(), &entries, entries[0].id).unwrap();
        assert_eq!(out.entries[0].sequence_order, 0);
        assert_eq!(out.entries[0].predecessor_sequence_order, None);
        assert_eq!(out.entries[0].relationship, None);
    }
}
