use crate::entry::{EntryId, EntryPatch, OwnerId, OwnerSettings, ProgrammeEntry, RegisteredItem};
use crate::entry_validation;
use serde_json::Error as SerdeJsonError;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("serialization error: {0}")]
    Serialization(#[from] SerdeJsonError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("owner {0} not stored")]
    OwnerNotFound(OwnerId),
    #[error("entry {0} not stored")]
    EntryNotFound(EntryId),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Data-access boundary for programme entries and the owner records they hang
/// off. Implementations must make `replace_entries` atomic: readers see
/// either the old list or the new one, never a mix.
pub trait EntryStore: Send + Sync {
    fn load_owner(&self, owner_id: &OwnerId) -> PersistenceResult<Option<OwnerSettings>>;

    fn save_owner(&self, settings: &OwnerSettings) -> PersistenceResult<()>;

    /// Entries of `owner_id` sorted by `sequence_order`.
    fn load_entries(&self, owner_id: &OwnerId) -> PersistenceResult<Vec<ProgrammeEntry>>;

    fn replace_entries(
        &self,
        owner_id: &OwnerId,
        entries: &[ProgrammeEntry],
    ) -> PersistenceResult<Vec<ProgrammeEntry>>;

    /// Applies `patch` to one entry of `owner_id`. Entry ids are only unique
    /// within an owner.
    fn patch_entry(
        &self,
        owner_id: &OwnerId,
        entry_id: EntryId,
        patch: &EntryPatch,
    ) -> PersistenceResult<ProgrammeEntry>;

    /// Removes one entry and returns what remains, without relinking.
    fn delete_entry(
        &self,
        owner_id: &OwnerId,
        entry_id: EntryId,
    ) -> PersistenceResult<Vec<ProgrammeEntry>>;

    fn registered_items(&self, owner_id: &OwnerId) -> PersistenceResult<Vec<RegisteredItem>>;

    fn register_items(&self, owner_id: &OwnerId, items: &[RegisteredItem])
    -> PersistenceResult<()>;
}

pub fn validate_entries(owner_id: &OwnerId, entries: &[ProgrammeEntry]) -> PersistenceResult<()> {
    if let Some(foreign) = entries.iter().find(|entry| &entry.owner_id != owner_id) {
        return Err(PersistenceError::InvalidData(format!(
            "entry {} belongs to owner {}, not {}",
            foreign.id, foreign.owner_id, owner_id
        )));
    }
    entry_validation::validate_entry_collection(entries)
        .map_err(|err| PersistenceError::InvalidData(err.to_string()))
}

pub(crate) fn sorted(mut entries: Vec<ProgrammeEntry>) -> Vec<ProgrammeEntry> {
    entries.sort_by_key(|entry| entry.sequence_order);
    entries
}

pub mod file;
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file::{
    ProgrammeSnapshot, load_programme_from_csv, load_programme_from_json, save_programme_to_csv,
    save_programme_to_json,
};
pub use memory::MemoryEntryStore;
