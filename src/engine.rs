use crate::audit::{AuditAction, AuditRecord, AuditSink, TracingAuditSink};
use crate::calculations::{InconsistentReference, Resolver};
use crate::calendar::WorkCalendar;
use crate::config::EngineConfig;
use crate::entry::{Actor, EntryId, EntryPatch, OwnerId, OwnerSettings, ProgrammeEntry, RegisteredItem};
use crate::entry_validation::{self, EntryValidationError};
use crate::error::{ProgrammeError, ProgrammeResult};
use crate::generate;
use crate::graph::DependencyGraph;
use crate::mutations::{self, SplitPolicy, SplitSummary};
use crate::persistence::{EntryStore, MemoryEntryStore};
use crate::provider::{self, CalendarProvider, ConfiguredCalendarProvider};
use rayon::prelude::*;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recalculation {
    pub owner_id: OwnerId,
    pub entries: Vec<ProgrammeEntry>,
    pub inconsistencies: Vec<InconsistentReference>,
    /// Groups of sequence orders whose predecessor links form a loop.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cycles: Vec<Vec<i32>>,
    pub changed: usize,
}

/// Programme operations over an entry store, a calendar provider and an audit
/// sink. Cheap to clone; all collaborators are shared.
#[derive(Clone)]
pub struct ProgrammeEngine {
    store: Arc<dyn EntryStore>,
    calendars: Arc<dyn CalendarProvider>,
    audit: Arc<dyn AuditSink>,
    config: EngineConfig,
}

impl ProgrammeEngine {
    pub fn new(
        store: Arc<dyn EntryStore>,
        calendars: Arc<dyn CalendarProvider>,
        audit: Arc<dyn AuditSink>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            calendars,
            audit,
            config,
        }
    }

    /// In-memory store, configured calendars and tracing audit.
    pub fn in_memory(config: EngineConfig) -> Self {
        let calendars = ConfiguredCalendarProvider::new(&config);
        Self::new(
            Arc::new(MemoryEntryStore::new()),
            Arc::new(calendars),
            Arc::new(TracingAuditSink),
            config,
        )
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn owner_settings(&self, owner_id: &OwnerId) -> ProgrammeResult<OwnerSettings> {
        self.store
            .load_owner(owner_id)?
            .ok_or_else(|| ProgrammeError::OwnerNotFound(owner_id.clone()))
    }

    pub fn save_settings(&self, settings: &OwnerSettings) -> ProgrammeResult<()> {
        self.store.save_owner(settings)?;
        tracing::info!(owner = %settings.owner_id, "saved owner settings");
        Ok(())
    }

    pub fn register_items(&self, owner_id: &OwnerId, items: &[RegisteredItem]) -> ProgrammeResult<()> {
        self.owner_settings(owner_id)?;
        self.store.register_items(owner_id, items)?;
        Ok(())
    }

    /// Working-day calendar for an owner, anchored at its base start date and
    /// wide enough for the manual dates in `entries`.
    pub fn calendar_for(
        &self,
        settings: &OwnerSettings,
        entries: &[ProgrammeEntry],
    ) -> ProgrammeResult<WorkCalendar> {
        let base_start = Self::base_start(settings)?;
        Ok(provider::calendar_for_owner(
            self.calendars.as_ref(),
            settings,
            entries,
            base_start,
            self.config.holiday_window_years,
        ))
    }

    pub fn entries(&self, owner_id: &OwnerId) -> ProgrammeResult<Vec<ProgrammeEntry>> {
        self.owner_settings(owner_id)?;
        Ok(self.store.load_entries(owner_id)?)
    }

    /// Replaces the owner's programme with `entries` after validating them.
    pub fn save_programme(
        &self,
        owner_id: &OwnerId,
        entries: Vec<ProgrammeEntry>,
        actor: &Actor,
    ) -> ProgrammeResult<Vec<ProgrammeEntry>> {
        self.owner_settings(owner_id)?;
        if let Some(foreign) = entries.iter().find(|entry| &entry.owner_id != owner_id) {
            return Err(EntryValidationError::ForeignOwner {
                entry: foreign.display_name(),
                expected: owner_id.to_string(),
                found: foreign.owner_id.to_string(),
            }
            .into());
        }
        entry_validation::validate_entry_collection(&entries)?;

        let stored = self.store.replace_entries(owner_id, &entries)?;
        self.emit(
            owner_id,
            AuditAction::ProgrammeSaved,
            actor,
            json!({ "entries": stored.len() }),
        );
        Ok(stored)
    }

    pub fn generate_from_settings(
        &self,
        owner_id: &OwnerId,
        actor: &Actor,
    ) -> ProgrammeResult<Vec<ProgrammeEntry>> {
        let settings = self.owner_settings(owner_id)?;
        let entries = generate::entries_from_settings(&settings);
        self.store_generated(&settings, entries, "settings", actor)
    }

    pub fn build_from_registered_items(
        &self,
        owner_id: &OwnerId,
        actor: &Actor,
    ) -> ProgrammeResult<Vec<ProgrammeEntry>> {
        let settings = self.owner_settings(owner_id)?;
        let items = self.store.registered_items(owner_id)?;
        if items.is_empty() {
            return Err(ProgrammeError::precondition(format!(
                "owner {owner_id} has no registered items"
            )));
        }
        let entries = generate::entries_from_items(&settings, &items);
        self.store_generated(&settings, entries, "registered_items", actor)
    }

    fn store_generated(
        &self,
        settings: &OwnerSettings,
        entries: Vec<ProgrammeEntry>,
        source: &str,
        actor: &Actor,
    ) -> ProgrammeResult<Vec<ProgrammeEntry>> {
        let owner_id = &settings.owner_id;
        // Generated programmes are dated straight away when the owner has an
        // anchor; otherwise dates wait for an explicit recalculation.
        let entries = match settings.base_start_date {
            Some(base_start) => {
                let calendar = self.calendar_for(settings, &entries)?;
                Resolver::new(&calendar).resolve(entries, base_start).entries
            }
            None => entries,
        };
        let stored = self.store.replace_entries(owner_id, &entries)?;
        tracing::info!(owner = %owner_id, source, entries = stored.len(), "generated programme");
        self.emit(
            owner_id,
            AuditAction::ProgrammeGenerated,
            actor,
            json!({ "source": source, "entries": stored.len() }),
        );
        Ok(stored)
    }

    /// Re-dates the owner's programme in one forward pass and persists the
    /// result as a single batch.
    pub fn recalculate(&self, owner_id: &OwnerId, actor: &Actor) -> ProgrammeResult<Recalculation> {
        let settings = self.owner_settings(owner_id)?;
        let base_start = Self::base_start(&settings)?;
        let entries = self.store.load_entries(owner_id)?;
        if entries.is_empty() {
            tracing::debug!(owner = %owner_id, "nothing to recalculate");
            return Ok(Recalculation {
                owner_id: owner_id.clone(),
                entries,
                inconsistencies: Vec::new(),
                cycles: Vec::new(),
                changed: 0,
            });
        }
        entry_validation::validate_entry_collection(&entries)?;

        if self.config.strict_predecessors {
            let graph = DependencyGraph::build(&entries);
            if let Some(reference) = graph.unresolved_references().first() {
                let message = match graph.cycles().first() {
                    Some(cycle) => format!(
                        "unresolvable predecessor: {reference} (cycle through sequence orders {cycle:?})"
                    ),
                    None => format!("unresolvable predecessor: {reference}"),
                };
                return Err(ProgrammeError::precondition(message));
            }
        }

        let calendar = self.calendar_for(&settings, &entries)?;
        let resolution = Resolver::new(&calendar).resolve(entries, base_start);
        let cycles = DependencyGraph::build(&resolution.entries).cycles();
        if !cycles.is_empty() {
            tracing::warn!(owner = %owner_id, ?cycles, "predecessor links form a cycle");
        }
        let stored = self.store.replace_entries(owner_id, &resolution.entries)?;

        tracing::info!(
            owner = %owner_id,
            entries = stored.len(),
            changed = resolution.changed,
            fallbacks = resolution.inconsistencies.len(),
            "recalculated programme"
        );
        self.emit(
            owner_id,
            AuditAction::ProgrammeRecalculated,
            actor,
            json!({
                "entries": stored.len(),
                "changed": resolution.changed,
                "fallbacks": resolution.inconsistencies.len(),
            }),
        );

        Ok(Recalculation {
            owner_id: owner_id.clone(),
            entries: stored,
            inconsistencies: resolution.inconsistencies,
            cycles,
            changed: resolution.changed,
        })
    }

    /// Recalculates independent owners in parallel; results keep the input
    /// order.
    pub fn recalculate_many(
        &self,
        owner_ids: &[OwnerId],
        actor: &Actor,
    ) -> Vec<(OwnerId, ProgrammeResult<Recalculation>)> {
        owner_ids
            .par_iter()
            .map(|owner_id| (owner_id.clone(), self.recalculate(owner_id, actor)))
            .collect()
    }

    pub fn split(
        &self,
        owner_id: &OwnerId,
        entry_id: EntryId,
        policy: &SplitPolicy,
        actor: &Actor,
    ) -> ProgrammeResult<Vec<ProgrammeEntry>> {
        let entries = self.entries(owner_id)?;
        let outcome = mutations::split_entry(owner_id, &entries, entry_id, policy)?;
        let stored = self.store.replace_entries(owner_id, &outcome.entries)?;
        self.emit(
            owner_id,
            AuditAction::EntrySplit,
            actor,
            json!({
                "entry_id": entry_id,
                "policy": policy,
                "affected": outcome.affected,
            }),
        );
        Ok(stored)
    }

    pub fn split_many(
        &self,
        owner_id: &OwnerId,
        entry_ids: &[EntryId],
        policy: &SplitPolicy,
        actor: &Actor,
    ) -> ProgrammeResult<SplitSummary> {
        let entries = self.entries(owner_id)?;
        let mut summary = mutations::split_entries(owner_id, &entries, entry_ids, policy)?;
        if summary.split.is_empty() {
            return Ok(summary);
        }
        summary.entries = self.store.replace_entries(owner_id, &summary.entries)?;
        self.emit(
            owner_id,
            AuditAction::EntrySplit,
            actor,
            json!({
                "entry_ids": summary.split,
                "not_found": summary.not_found,
                "policy": policy,
                "affected": summary.affected,
            }),
        );
        Ok(summary)
    }

    pub fn reorder(
        &self,
        owner_id: &OwnerId,
        ordered_ids: &[EntryId],
        actor: &Actor,
    ) -> ProgrammeResult<Vec<ProgrammeEntry>> {
        let entries = self.entries(owner_id)?;
        let outcome = mutations::reorder_entries(owner_id, &entries, ordered_ids)?;
        let stored = self.store.replace_entries(owner_id, &outcome.entries)?;
        self.emit(
            owner_id,
            AuditAction::EntriesReordered,
            actor,
            json!({ "moved": outcome.affected }),
        );
        Ok(stored)
    }

    /// Edits one entry. Dates are left for the next recalculation.
    pub fn patch(
        &self,
        owner_id: &OwnerId,
        entry_id: EntryId,
        patch: &EntryPatch,
        actor: &Actor,
    ) -> ProgrammeResult<ProgrammeEntry> {
        let entries = self.entries(owner_id)?;
        let (_, validated) = mutations::patch_entry(owner_id, &entries, entry_id, patch)?;
        if patch.is_empty() {
            return Ok(validated);
        }
        let stored = self.store.patch_entry(owner_id, entry_id, patch)?;
        self.emit(
            owner_id,
            AuditAction::EntryPatched,
            actor,
            json!({ "entry_id": entry_id, "fields": patch.touched_fields() }),
        );
        Ok(stored)
    }

    pub fn delete(
        &self,
        owner_id: &OwnerId,
        entry_id: EntryId,
        actor: &Actor,
    ) -> ProgrammeResult<Vec<ProgrammeEntry>> {
        let entries = self.entries(owner_id)?;
        let outcome = mutations::delete_entry(owner_id, &entries, entry_id)?;
        let stored = self.store.replace_entries(owner_id, &outcome.entries)?;
        self.emit(
            owner_id,
            AuditAction::EntryDeleted,
            actor,
            json!({ "entry_id": entry_id, "relinked": outcome.affected }),
        );
        Ok(stored)
    }

    fn base_start(settings: &OwnerSettings) -> ProgrammeResult<chrono::NaiveDate> {
        settings.base_start_date.ok_or_else(|| {
            ProgrammeError::precondition(format!(
                "owner {} has no base start date",
                settings.owner_id
            ))
        })
    }

    fn emit(&self, owner_id: &OwnerId, action: AuditAction, actor: &Actor, details: serde_json::Value) {
        self.audit
            .record(AuditRecord::new(owner_id, action, actor, details));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use chrono::NaiveDate;

    fn engine_with_audit(config: EngineConfig) -> (ProgrammeEngine, Arc<MemoryAuditSink>) {
        let audit = Arc::new(MemoryAuditSink::new());
        let engine = ProgrammeEngine::new(
            Arc::new(MemoryEntryStore::new()),
            Arc::new(ConfiguredCalendarProvider::new(&config)),
            audit.clone(),
            config,
        );
        (engine, audit)
    }

    fn owner_with_base(engine: &ProgrammeEngine) -> OwnerId {
        let owner = OwnerId::from("job-1");
        let mut settings = OwnerSettings::new(owner.clone());
        settings.base_start_date = NaiveDate::from_ymd_opt(2024, 1, 1);
        engine.save_settings(&settings).unwrap();
        owner
    }

    #[test]
    fn recalculate_without_base_start_writes_nothing() {
        let (engine, audit) = engine_with_audit(EngineConfig::default());
        let owner = OwnerId::from("job-1");
        engine.save_settings(&OwnerSettings::new(owner.clone())).unwrap();
        let err = engine.recalculate(&owner, &Actor::system()).unwrap_err();
        assert!(matches!(err, ProgrammeError::PreconditionFailed(_)));
        assert!(audit.records().is_empty());
    }

    #[test]
    fn empty_programme_recalculates_silently() {
        let (engine, audit) = engine_with_audit(EngineConfig::default());
        let owner = owner_with_base(&engine);
        let result = engine.recalculate(&owner, &Actor::system()).unwrap();
        assert!(result.entries.is_empty());
        assert!(audit.records().is_empty());
    }

    #[test]
    fn strict_mode_rejects_forward_reference() {
        let (engine, _) = engine_with_audit(EngineConfig::default().strict(true));
        let owner = owner_with_base(&engine);
        let entries = vec![
            ProgrammeEntry::new(owner.clone(), "1-GF", 0, 2)
                .with_predecessor(1, crate::entry::Relationship::FS),
            ProgrammeEntry::new(owner.clone(), "1-L1", 1, 2),
        ];
        engine.save_programme(&owner, entries, &Actor::system()).unwrap();
        let err = engine.recalculate(&owner, &Actor::system()).unwrap_err();
        assert!(matches!(err, ProgrammeError::PreconditionFailed(_)));
    }

    #[test]
    fn strict_mode_names_predecessor_cycle() {
        let (engine, _) = engine_with_audit(EngineConfig::default().strict(true));
        let owner = owner_with_base(&engine);
        let entries = vec![
            ProgrammeEntry::new(owner.clone(), "1-GF", 0, 2)
                .with_predecessor(1, crate::entry::Relationship::FS),
            ProgrammeEntry::new(owner.clone(), "1-L1", 1, 2)
                .with_predecessor(0, crate::entry::Relationship::FS),
        ];
        engine.save_programme(&owner, entries, &Actor::system()).unwrap();
        let err = engine.recalculate(&owner, &Actor::system()).unwrap_err();
        assert!(err.to_string().contains("cycle through sequence orders [0, 1]"));
    }

    #[test]
    fn recalculation_reports_cycles() {
        let (engine, _) = engine_with_audit(EngineConfig::default());
        let owner = owner_with_base(&engine);
        let entries = vec![
            ProgrammeEntry::new(owner.clone(), "1-GF", 0, 2),
            ProgrammeEntry::new(owner.clone(), "1-L1", 1, 2)
                .with_predecessor(2, crate::entry::Relationship::FS),
            ProgrammeEntry::new(owner.clone(), "1-L2", 2, 2)
                .with_predecessor(1, crate::entry::Relationship::SS),
        ];
        engine.save_programme(&owner, entries, &Actor::system()).unwrap();
        let result = engine.recalculate(&owner, &Actor::system()).unwrap();
        assert_eq!(result.cycles, vec![vec![1, 2]]);
        assert_eq!(result.inconsistencies.len(), 1);
    }
}
