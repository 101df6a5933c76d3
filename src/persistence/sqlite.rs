use super::{EntryStore, PersistenceError, PersistenceResult};
use crate::audit::{AuditRecord, AuditSink};
use crate::entry::{EntryId, EntryPatch, OwnerId, OwnerSettings, ProgrammeEntry, RegisteredItem};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use std::path::Path;
use std::sync::Arc;

/// SQLite-backed store. Rows keep the entry as JSON next to the columns the
/// queries filter on, so the schema does not churn with the entry model.
pub struct SqliteEntryStore {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteEntryStore {
    pub fn new<P: AsRef<Path>>(path: P) -> PersistenceResult<Self> {
        let connection = Connection::open(path)?;
        Self::from_connection(connection)
    }

    pub fn in_memory() -> PersistenceResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(connection: Connection) -> PersistenceResult<Self> {
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// An audit sink writing to the same database.
    pub fn audit_log(&self) -> SqliteAuditLog {
        SqliteAuditLog {
            connection: Arc::clone(&self.connection),
        }
    }

    fn initialize_schema(connection: &Connection) -> PersistenceResult<()> {
        let ddl = r#"
            PRAGMA foreign_keys = ON;
            CREATE TABLE IF NOT EXISTS owners (
                owner_id TEXT PRIMARY KEY,
                settings_json TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS programme_entries (
                id TEXT NOT NULL,
                owner_id TEXT NOT NULL,
                sequence_order INTEGER NOT NULL,
                entry_json TEXT NOT NULL,
                PRIMARY KEY (owner_id, id),
                UNIQUE (owner_id, sequence_order)
            );
            CREATE TABLE IF NOT EXISTS registered_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id TEXT NOT NULL,
                item_json TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id TEXT NOT NULL,
                action TEXT NOT NULL,
                actor_id TEXT NOT NULL,
                actor_name TEXT NOT NULL,
                details_json TEXT NOT NULL,
                recorded_at TEXT NOT NULL
            );
        "#;
        connection.execute_batch(ddl)?;
        Ok(())
    }

    fn read_entries(conn: &Connection, owner_id: &OwnerId) -> PersistenceResult<Vec<ProgrammeEntry>> {
        let mut stmt = conn.prepare(
            "SELECT entry_json FROM programme_entries WHERE owner_id = ?1 ORDER BY sequence_order ASC",
        )?;
        let rows = stmt.query_map(params![owner_id.as_str()], |row| row.get::<_, String>(0))?;
        let mut entries = Vec::new();
        for json in rows {
            entries.push(serde_json::from_str(&json?)?);
        }
        Ok(entries)
    }

    fn write_entries(
        tx: &Transaction,
        owner_id: &OwnerId,
        entries: &[ProgrammeEntry],
    ) -> PersistenceResult<()> {
        tx.execute(
            "DELETE FROM programme_entries WHERE owner_id = ?1",
            params![owner_id.as_str()],
        )?;
        let mut stmt = tx.prepare(
            "INSERT INTO programme_entries (id, owner_id, sequence_order, entry_json) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for entry in entries {
            let json = serde_json::to_string(entry)?;
            stmt.execute(params![
                entry.id.to_string(),
                owner_id.as_str(),
                entry.sequence_order,
                json
            ])?;
        }
        Ok(())
    }
}

impl EntryStore for SqliteEntryStore {
    fn load_owner(&self, owner_id: &OwnerId) -> PersistenceResult<Option<OwnerSettings>> {
        let conn = self.connection.lock();
        let mut stmt = conn.prepare("SELECT settings_json FROM owners WHERE owner_id = ?1")?;
        let json: Option<String> = stmt
            .query_row(params![owner_id.as_str()], |row| row.get(0))
            .optional()?;
        json.map(|json| serde_json::from_str(&json).map_err(PersistenceError::from))
            .transpose()
    }

    fn save_owner(&self, settings: &OwnerSettings) -> PersistenceResult<()> {
        let json = serde_json::to_string(settings)?;
        let conn = self.connection.lock();
        conn.execute(
            "INSERT INTO owners (owner_id, settings_json) VALUES (?1, ?2)
             ON CONFLICT(owner_id) DO UPDATE SET settings_json = excluded.settings_json",
            params![settings.owner_id.as_str(), json],
        )?;
        Ok(())
    }

    fn load_entries(&self, owner_id: &OwnerId) -> PersistenceResult<Vec<ProgrammeEntry>> {
        let conn = self.connection.lock();
        Self::read_entries(&conn, owner_id)
    }

    fn replace_entries(
        &self,
        owner_id: &OwnerId,
        entries: &[ProgrammeEntry],
    ) -> PersistenceResult<Vec<ProgrammeEntry>> {
        super::validate_entries(owner_id, entries)?;
        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;
        Self::write_entries(&tx, owner_id, entries)?;
        tx.commit()?;
        Self::read_entries(&conn, owner_id)
    }

    fn patch_entry(
        &self,
        owner_id: &OwnerId,
        entry_id: EntryId,
        patch: &EntryPatch,
    ) -> PersistenceResult<ProgrammeEntry> {
        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;
        let json: Option<String> = tx
            .query_row(
                "SELECT entry_json FROM programme_entries WHERE owner_id = ?1 AND id = ?2",
                params![owner_id.as_str(), entry_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(json) = json else {
            return Err(PersistenceError::EntryNotFound(entry_id));
        };
        let mut entry: ProgrammeEntry = serde_json::from_str(&json)?;
        entry.apply_patch(patch);
        tx.execute(
            "UPDATE programme_entries SET entry_json = ?3 WHERE owner_id = ?1 AND id = ?2",
            params![
                owner_id.as_str(),
                entry_id.to_string(),
                serde_json::to_string(&entry)?
            ],
        )?;
        tx.commit()?;
        Ok(entry)
    }

    fn delete_entry(
        &self,
        owner_id: &OwnerId,
        entry_id: EntryId,
    ) -> PersistenceResult<Vec<ProgrammeEntry>> {
        let conn = self.connection.lock();
        let removed = conn.execute(
            "DELETE FROM programme_entries WHERE owner_id = ?1 AND id = ?2",
            params![owner_id.as_str(), entry_id.to_string()],
        )?;
        if removed == 0 {
            return Err(PersistenceError::EntryNotFound(entry_id));
        }
        Self::read_entries(&conn, owner_id)
    }

    fn registered_items(&self, owner_id: &OwnerId) -> PersistenceResult<Vec<RegisteredItem>> {
        let conn = self.connection.lock();
        let mut stmt =
            conn.prepare("SELECT item_json FROM registered_items WHERE owner_id = ?1 ORDER BY id")?;
        let rows = stmt.query_map(params![owner_id.as_str()], |row| row.get::<_, String>(0))?;
        let mut items = Vec::new();
        for json in rows {
            items.push(serde_json::from_str(&json?)?);
        }
        Ok(items)
    }

    fn register_items(
        &self,
        owner_id: &OwnerId,
        items: &[RegisteredItem],
    ) -> PersistenceResult<()> {
        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt =
                tx.prepare("INSERT INTO registered_items (owner_id, item_json) VALUES (?1, ?2)")?;
            for item in items {
                stmt.execute(params![owner_id.as_str(), serde_json::to_string(item)?])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

/// Audit sink appending to the `audit_log` table. Write failures are logged
/// and dropped.
#[derive(Clone)]
pub struct SqliteAuditLog {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteAuditLog {
    fn insert(&self, record: &AuditRecord) -> PersistenceResult<()> {
        let details = serde_json::to_string(&record.details)?;
        let conn = self.connection.lock();
        conn.execute(
            "INSERT INTO audit_log (owner_id, action, actor_id, actor_name, details_json, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.owner_id.as_str(),
                record.action.as_str(),
                record.actor_id,
                record.actor_name,
                details,
                record.recorded_at.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    /// Number of audit rows stored for `owner_id`.
    pub fn count_for(&self, owner_id: &OwnerId) -> PersistenceResult<i64> {
        let conn = self.connection.lock();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM audit_log WHERE owner_id = ?1",
            params![owner_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

impl AuditSink for SqliteAuditLog {
    fn record(&self, record: AuditRecord) {
        if let Err(err) = self.insert(&record) {
            tracing::warn!(
                owner = %record.owner_id,
                action = record.action.as_str(),
                error = %err,
                "dropping audit record"
            );
        }
    }
}
