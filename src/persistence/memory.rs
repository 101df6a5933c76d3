use super::{EntryStore, PersistenceError, PersistenceResult};
use crate::entry::{EntryId, EntryPatch, OwnerId, OwnerSettings, ProgrammeEntry, RegisteredItem};
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Default)]
struct OwnerRecord {
    settings: Option<OwnerSettings>,
    entries: Vec<ProgrammeEntry>,
    items: Vec<RegisteredItem>,
}

/// Process-local store. Each call takes the lock once, so a replace is
/// observed whole.
#[derive(Debug, Default)]
pub struct MemoryEntryStore {
    owners: RwLock<HashMap<OwnerId, OwnerRecord>>,
}

impl MemoryEntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_owner(settings: OwnerSettings) -> Self {
        let store = Self::new();
        store.owners.write().insert(
            settings.owner_id.clone(),
            OwnerRecord {
                settings: Some(settings),
                ..OwnerRecord::default()
            },
        );
        store
    }
}

impl EntryStore for MemoryEntryStore {
    fn load_owner(&self, owner_id: &OwnerId) -> PersistenceResult<Option<OwnerSettings>> {
        Ok(self
            .owners
            .read()
            .get(owner_id)
            .and_then(|record| record.settings.clone()))
    }

    fn save_owner(&self, settings: &OwnerSettings) -> PersistenceResult<()> {
        self.owners
            .write()
            .entry(settings.owner_id.clone())
            .or_default()
            .settings = Some(settings.clone());
        Ok(())
    }

    fn load_entries(&self, owner_id: &OwnerId) -> PersistenceResult<Vec<ProgrammeEntry>> {
        let entries = self
            .owners
            .read()
            .get(owner_id)
            .map(|record| record.entries.clone())
            .unwrap_or_default();
        Ok(super::sorted(entries))
    }

    fn replace_entries(
        &self,
        owner_id: &OwnerId,
        entries: &[ProgrammeEntry],
    ) -> PersistenceResult<Vec<ProgrammeEntry>> {
        super::validate_entries(owner_id, entries)?;
        let stored = super::sorted(entries.to_vec());
        self.owners
            .write()
            .entry(owner_id.clone())
            .or_default()
            .entries = stored.clone();
        Ok(stored)
    }

    fn patch_entry(
        &self,
        owner_id: &OwnerId,
        entry_id: EntryId,
        patch: &EntryPatch,
    ) -> PersistenceResult<ProgrammeEntry> {
        let mut owners = self.owners.write();
        let entry = owners
            .get_mut(owner_id)
            .and_then(|record| record.entries.iter_mut().find(|entry| entry.id == entry_id))
            .ok_or(PersistenceError::EntryNotFound(entry_id))?;
        entry.apply_patch(patch);
        Ok(entry.clone())
    }

    fn delete_entry(
        &self,
        owner_id: &OwnerId,
        entry_id: EntryId,
    ) -> PersistenceResult<Vec<ProgrammeEntry>> {
        let mut owners = self.owners.write();
        let record = owners
            .get_mut(owner_id)
            .ok_or_else(|| PersistenceError::OwnerNotFound(owner_id.clone()))?;
        let before = record.entries.len();
        record.entries.retain(|entry| entry.id != entry_id);
        if record.entries.len() == before {
            return Err(PersistenceError::EntryNotFound(entry_id));
        }
        Ok(super::sorted(record.entries.clone()))
    }

    fn registered_items(&self, owner_id: &OwnerId) -> PersistenceResult<Vec<RegisteredItem>> {
        Ok(self
            .owners
            .read()
            .get(owner_id)
            .map(|record| record.items.clone())
            .unwrap_or_default())
    }

    fn register_items(
        &self,
        owner_id: &OwnerId,
        items: &[RegisteredItem],
    ) -> PersistenceResult<()> {
        self.owners
            .write()
            .entry(owner_id.clone())
            .or_default()
            .items
            .extend_from_slice(items);
        Ok(())
    }
}
