//! Seeds an owner's programme from its coarse settings or registered items.
//! Generated entries carry no predecessors, so they chain in sequence order.

use crate::entry::{OwnerSettings, ProgrammeEntry, RegisteredItem};
use std::collections::BTreeSet;

/// `GF` for ground, `L<n>` above it and `B<n>` below.
pub fn level_label(level: i32) -> String {
    match level {
        0 => "GF".to_string(),
        n if n > 0 => format!("L{n}"),
        n => format!("B{}", n.unsigned_abs()),
    }
}

pub fn group_key(building: u32, level: i32) -> String {
    format!("{building}-{}", level_label(level))
}

/// One entry per building and level, building-major, lowest level first.
pub fn entries_from_settings(settings: &OwnerSettings) -> Vec<ProgrammeEntry> {
    let (low, high) = if settings.lowest_level <= settings.highest_level {
        (settings.lowest_level, settings.highest_level)
    } else {
        (settings.highest_level, settings.lowest_level)
    };
    let cycle_days = settings.default_cycle_days.max(1);

    let mut entries = Vec::new();
    for building in 1..=settings.building_count {
        for level in low..=high {
            entries.push(ProgrammeEntry::new(
                settings.owner_id.clone(),
                group_key(building, level),
                entries.len() as i32,
                cycle_days,
            ));
        }
    }
    entries
}

/// One entry per distinct `(building, level)` across the registered items.
pub fn entries_from_items(settings: &OwnerSettings, items: &[RegisteredItem]) -> Vec<ProgrammeEntry> {
    let placements: BTreeSet<(u32, i32)> = items.iter().map(|item| (item.building, item.level)).collect();
    let cycle_days = settings.default_cycle_days.max(1);
    placements
        .into_iter()
        .enumerate()
        .map(|(idx, (building, level))| {
            ProgrammeEntry::new(
                settings.owner_id.clone(),
                group_key(building, level),
                idx as i32,
                cycle_days,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::OwnerId;

    #[test]
    fn labels_levels() {
        assert_eq!(level_label(0), "GF");
        assert_eq!(level_label(3), "L3");
        assert_eq!(level_label(-2), "B2");
    }

    #[test]
    fn settings_produce_building_major_order() {
        let mut settings = OwnerSettings::new(OwnerId::from("job"));
        settings.building_count = 2;
        settings.lowest_level = -1;
        settings.highest_level = 1;
        settings.default_cycle_days = 4;
        let entries = entries_from_settings(&settings);
        let keys: Vec<&str> = entries.iter().map(|e| e.group_key.as_str()).collect();
        assert_eq!(keys, vec!["1-B1", "1-GF", "1-L1", "2-B1", "2-GF", "2-L1"]);
        assert!(entries.iter().all(|e| e.cycle_days == 4));
        assert_eq!(entries[5].sequence_order, 5);
    }

    #[test]
    fn items_collapse_to_distinct_levels() {
        let settings = OwnerSettings::new(OwnerId::from("job"));
        let items = vec![
            RegisteredItem::new(2, 1),
            RegisteredItem::new(1, 2),
            RegisteredItem::new(1, 2),
            RegisteredItem::new(1, 1),
        ];
        let keys: Vec<String> = entries_from_items(&settings, &items)
            .into_iter()
            .map(|e| e.group_key)
            .collect();
        assert_eq!(keys, vec!["1-L1", "1-L2", "2-L1"]);
    }
}
