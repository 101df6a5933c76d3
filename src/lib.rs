pub mod audit;
pub mod calculations;
pub mod calendar;
pub mod config;
pub mod engine;
pub mod entry;
pub mod entry_validation;
pub mod error;
pub mod frame;
pub mod generate;
pub mod graph;
pub mod holidays;
#[cfg(feature = "http_api")]
pub mod http_api;
pub mod mutations;
pub mod persistence;
pub mod provider;

pub use audit::{AuditAction, AuditRecord, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use calculations::{InconsistentReference, Resolution, Resolver};
pub use calendar::{WorkCalendar, WorkCalendarConfig};
pub use config::{ConfigError, EngineConfig};
pub use engine::{ProgrammeEngine, Recalculation};
pub use entry::{
    Actor, EntryId, EntryPatch, OwnerId, OwnerSettings, ProgrammeEntry, RegisteredItem,
    Relationship,
};
pub use entry_validation::EntryValidationError;
pub use error::{ErrorKind, ProgrammeError, ProgrammeResult};
pub use frame::{entries_to_dataframe, programme_table, render_table};
pub use graph::{DependencyGraph, ReferenceIssue, UnresolvedReference};
pub use holidays::{HolidayCache, HolidayCalendarType};
pub use mutations::{MutationOutcome, SplitPolicy, SplitSummary};
#[cfg(feature = "sqlite")]
pub use persistence::sqlite::{SqliteAuditLog, SqliteEntryStore};
pub use persistence::{
    EntryStore, MemoryEntryStore, PersistenceError, PersistenceResult, ProgrammeSnapshot,
    load_programme_from_csv, load_programme_from_json, save_programme_to_csv,
    save_programme_to_json,
};
pub use provider::{CalendarProvider, ConfiguredCalendarProvider};
