use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::data::{
    Event, EventId, NewEvent, NewSelfie, SelfieId, SelfieRecord, SelfieStatus, StoredSelfie,
};
use super::display::DisplayConfig;
use crate::error::{Error, Result};

const SELFIE_COLUMNS: &str =
    "id, event_id, image_ref, display_name, message, status, revision, created_at, file_size_bytes";

const EVENT_COLUMNS: &str =
    "id, slug, name, description, moderation_enabled, display_config_json, created_at, updated_at";

/// The SelfieStore manages the SQLite catalog database.
/// It stores events, their display settings, and every uploaded selfie
/// with its moderation status.
pub struct SelfieStore {
    conn: Connection,
    db_path: PathBuf,
}

impl SelfieStore {
    /// Open (or create) the catalog at `path` and initialize the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();

        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&db_path)?;
        debug!(path = %db_path.display(), "opened selfie catalog");

        let store = SelfieStore { conn, db_path };
        store.init_schema()?;
        Ok(store)
    }

    /// Private in-memory catalog, used by tests
    pub fn open_in_memory() -> Result<Self> {
        let store = SelfieStore {
            conn: Connection::open_in_memory()?,
            db_path: PathBuf::from(":memory:"),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Get the path where the catalog is stored by default
    ///
    /// - Linux: ~/.local/share/selfie-wall/selfie_wall.db
    /// - macOS: ~/Library/Application Support/selfie-wall/selfie_wall.db
    /// - Windows: %APPDATA%\selfie-wall\selfie_wall.db
    pub fn default_path() -> Result<PathBuf> {
        let mut path = dirs::data_dir()
            .or_else(dirs::home_dir)
            .ok_or(Error::NoDataDir)?;

        path.push("selfie-wall");
        path.push("selfie_wall.db");
        Ok(path)
    }

    /// Create all tables and indexes if they don't exist.
    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS events (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                slug                TEXT NOT NULL UNIQUE,
                name                TEXT NOT NULL,
                description         TEXT,
                moderation_enabled  INTEGER NOT NULL DEFAULT 1,
                display_config_json TEXT NOT NULL,
                created_at          INTEGER NOT NULL,
                updated_at          INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS selfies (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                event_id        INTEGER NOT NULL,
                image_ref       TEXT,
                display_name    TEXT,
                message         TEXT,
                status          TEXT NOT NULL
                                CHECK (status IN ('pending', 'approved', 'rejected')),
                revision        INTEGER NOT NULL DEFAULT 0,
                created_at      INTEGER NOT NULL,
                file_size_bytes INTEGER,
                FOREIGN KEY(event_id) REFERENCES events(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_selfies_event
                ON selfies(event_id);

            CREATE INDEX IF NOT EXISTS idx_selfies_event_status
                ON selfies(event_id, status);

            -- NULL image refs (uploads still resolving) never collide
            CREATE UNIQUE INDEX IF NOT EXISTS idx_selfies_event_image
                ON selfies(event_id, image_ref);",
        )?;
        Ok(())
    }

    /// Get the path to the database file
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    // ========== Events ==========

    pub fn create_event(&self, new: &NewEvent) -> Result<Event> {
        new.display_config.validate()?;
        let now = Utc::now().timestamp_millis();

        let result = self.conn.execute(
            "INSERT INTO events
                (slug, name, description, moderation_enabled,
                 display_config_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                new.slug,
                new.name,
                new.description,
                new.moderation_enabled,
                new.display_config.to_json()?,
                now,
            ],
        );

        match result {
            Ok(_) => {}
            Err(e) if is_constraint_violation(&e) => {
                return Err(Error::DuplicateSlug(new.slug.clone()));
            }
            Err(e) => return Err(e.into()),
        }

        let id = EventId(self.conn.last_insert_rowid());
        info!(event = %new.slug, %id, "created event");
        self.event(id)
    }

    pub fn event(&self, id: EventId) -> Result<Event> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1");
        let raw = self
            .conn
            .query_row(&sql, [id.0], RawEvent::from_row)
            .optional()?
            .ok_or_else(|| Error::EventNotFound(id.to_string()))?;
        raw.into_event()
    }

    pub fn event_by_slug(&self, slug: &str) -> Result<Option<Event>> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE slug = ?1");
        self.conn
            .query_row(&sql, [slug], RawEvent::from_row)
            .optional()?
            .map(RawEvent::into_event)
            .transpose()
    }

    /// Like `event_by_slug`, but a missing event is an error
    pub fn require_event(&self, slug: &str) -> Result<Event> {
        self.event_by_slug(slug)?
            .ok_or_else(|| Error::EventNotFound(slug.to_string()))
    }

    /// Replace an event's display settings
    pub fn update_display_config(&self, id: EventId, config: &DisplayConfig) -> Result<()> {
        config.validate()?;
        let changed = self.conn.execute(
            "UPDATE events SET display_config_json = ?1, updated_at = ?2 WHERE id = ?3",
            params![config.to_json()?, Utc::now().timestamp_millis(), id.0],
        )?;
        if changed == 0 {
            return Err(Error::EventNotFound(id.to_string()));
        }
        info!(event = %id, columns = config.grid_columns, swap = config.swap_interval, "updated display config");
        Ok(())
    }

    pub fn display_config(&self, id: EventId) -> Result<DisplayConfig> {
        Ok(self.event(id)?.display_config)
    }

    // ========== Selfies ==========

    /// Add a selfie. It starts approved unless the event moderates uploads.
    pub fn create_selfie(&self, event: &Event, new: &NewSelfie) -> Result<SelfieId> {
        let status = if event.moderation_enabled {
            SelfieStatus::Pending
        } else {
            SelfieStatus::Approved
        };

        let result = self.conn.execute(
            "INSERT INTO selfies
                (event_id, image_ref, display_name, message, status, created_at, file_size_bytes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                event.id.0,
                new.image_ref,
                new.display_name,
                new.message,
                status,
                Utc::now().timestamp_millis(),
                new.file_size_bytes,
            ],
        );

        match result {
            Ok(_) => {}
            Err(e) if is_constraint_violation(&e) => {
                return Err(Error::DuplicateImage(new.image_ref.clone().unwrap_or_default()));
            }
            Err(e) => return Err(e.into()),
        }

        let id = SelfieId(self.conn.last_insert_rowid());
        debug!(event = %event.slug, %id, %status, "created selfie");
        Ok(id)
    }

    pub fn selfie(&self, id: SelfieId) -> Result<StoredSelfie> {
        let sql = format!("SELECT {SELFIE_COLUMNS} FROM selfies WHERE id = ?1");
        self.conn
            .query_row(&sql, [id.0], stored_selfie_from_row)
            .optional()?
            .ok_or(Error::SelfieNotFound(id))
    }

    /// Approved selfies of an event, newest first. This is the snapshot a
    /// display seeds itself with.
    pub fn list_approved(&self, event: EventId) -> Result<Vec<SelfieRecord>> {
        Ok(self
            .list_by_event(event, Some(SelfieStatus::Approved))?
            .into_iter()
            .map(|s| s.record)
            .collect())
    }

    /// Selfies of an event (optionally filtered by status), newest first
    pub fn list_by_event(
        &self,
        event: EventId,
        status: Option<SelfieStatus>,
    ) -> Result<Vec<StoredSelfie>> {
        let selfies = match status {
            Some(status) => {
                let sql = format!(
                    "SELECT {SELFIE_COLUMNS} FROM selfies
                     WHERE event_id = ?1 AND status = ?2 ORDER BY id DESC"
                );
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt.query_map(params![event.0, status], stored_selfie_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let sql = format!(
                    "SELECT {SELFIE_COLUMNS} FROM selfies WHERE event_id = ?1 ORDER BY id DESC"
                );
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt.query_map([event.0], stored_selfie_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(selfies)
    }

    pub fn count_by_status(&self, event: EventId, status: SelfieStatus) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM selfies WHERE event_id = ?1 AND status = ?2",
            params![event.0, status],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Moderation: move a selfie to a new status
    pub fn update_status(&self, id: SelfieId, status: SelfieStatus) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE selfies SET status = ?1, revision = revision + 1 WHERE id = ?2",
            params![status, id.0],
        )?;
        if changed == 0 {
            return Err(Error::SelfieNotFound(id));
        }
        info!(%id, %status, "moderated selfie");
        Ok(())
    }

    /// Attach the resolved image once the upload pipeline has stored it
    pub fn set_image_ref(&self, id: SelfieId, image_ref: &str) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE selfies SET image_ref = ?1, revision = revision + 1 WHERE id = ?2",
            params![image_ref, id.0],
        )?;
        if changed == 0 {
            return Err(Error::SelfieNotFound(id));
        }
        Ok(())
    }

    /// Edit the attendee-supplied caption
    pub fn set_caption(
        &self,
        id: SelfieId,
        display_name: Option<&str>,
        message: Option<&str>,
    ) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE selfies SET display_name = ?1, message = ?2, revision = revision + 1
             WHERE id = ?3",
            params![display_name, message, id.0],
        )?;
        if changed == 0 {
            return Err(Error::SelfieNotFound(id));
        }
        Ok(())
    }

    pub fn remove(&self, id: SelfieId) -> Result<()> {
        let changed = self.conn.execute("DELETE FROM selfies WHERE id = ?1", [id.0])?;
        if changed == 0 {
            return Err(Error::SelfieNotFound(id));
        }
        info!(%id, "removed selfie");
        Ok(())
    }
}

// Implement Debug for better error messages
impl std::fmt::Debug for SelfieStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelfieStore")
            .field("db_path", &self.db_path)
            .finish()
    }
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation)
}

fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).single().unwrap_or_default()
}

fn stored_selfie_from_row(row: &Row<'_>) -> rusqlite::Result<StoredSelfie> {
    let id: i64 = row.get(0)?;
    Ok(StoredSelfie {
        record: SelfieRecord {
            id: SelfieId(id),
            image_ref: row.get(2)?,
            display_name: row.get(3)?,
            message: row.get(4)?,
            status: row.get(5)?,
            // Row ids are handed out in increasing order
            arrival_order: id as u64,
        },
        event_id: EventId(row.get(1)?),
        revision: row.get(6)?,
        created_at: millis_to_datetime(row.get(7)?),
        file_size_bytes: row.get(8)?,
    })
}

/// Event row before its JSON settings are parsed
struct RawEvent {
    id: i64,
    slug: String,
    name: String,
    description: Option<String>,
    moderation_enabled: bool,
    display_config_json: String,
    created_at: i64,
    updated_at: i64,
}

impl RawEvent {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(RawEvent {
            id: row.get(0)?,
            slug: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            moderation_enabled: row.get(4)?,
            display_config_json: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn into_event(self) -> Result<Event> {
        Ok(Event {
            id: EventId(self.id),
            slug: self.slug,
            name: self.name,
            description: self.description,
            moderation_enabled: self.moderation_enabled,
            display_config: DisplayConfig::from_json(&self.display_config_json)?,
            created_at: millis_to_datetime(self.created_at),
            updated_at: millis_to_datetime(self.updated_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_event(moderation_enabled: bool) -> (SelfieStore, Event) {
        let store = SelfieStore::open_in_memory().unwrap();
        let event = store
            .create_event(&NewEvent {
                slug: "party".into(),
                name: "Summer Party".into(),
                moderation_enabled,
                ..Default::default()
            })
            .unwrap();
        (store, event)
    }

    fn selfie(image: &str) -> NewSelfie {
        NewSelfie {
            image_ref: Some(image.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_and_lookup_event() {
        let (store, event) = store_with_event(true);
        let found = store.require_event("party").unwrap();
        assert_eq!(found, event);
        assert_eq!(found.display_config, DisplayConfig::default());
        assert!(store.event_by_slug("nope").unwrap().is_none());
        assert!(matches!(store.require_event("nope"), Err(Error::EventNotFound(_))));
    }

    #[test]
    fn test_duplicate_slug_is_rejected() {
        let (store, _) = store_with_event(true);
        let again = store.create_event(&NewEvent {
            slug: "party".into(),
            name: "Another".into(),
            ..Default::default()
        });
        assert!(matches!(again, Err(Error::DuplicateSlug(s)) if s == "party"));
    }

    #[test]
    fn test_initial_status_follows_moderation() {
        let (store, moderated) = store_with_event(true);
        let id = store.create_selfie(&moderated, &selfie("a.jpg")).unwrap();
        assert_eq!(store.selfie(id).unwrap().record.status, SelfieStatus::Pending);

        let open = store
            .create_event(&NewEvent {
                slug: "open".into(),
                name: "Open Wall".into(),
                moderation_enabled: false,
                ..Default::default()
            })
            .unwrap();
        let id = store.create_selfie(&open, &selfie("a.jpg")).unwrap();
        assert_eq!(store.selfie(id).unwrap().record.status, SelfieStatus::Approved);
    }

    #[test]
    fn test_list_approved_is_newest_first() {
        let (store, event) = store_with_event(false);
        let a = store.create_selfie(&event, &selfie("a.jpg")).unwrap();
        let b = store.create_selfie(&event, &selfie("b.jpg")).unwrap();
        let c = store.create_selfie(&event, &selfie("c.jpg")).unwrap();
        store.update_status(b, SelfieStatus::Rejected).unwrap();

        let ids: Vec<SelfieId> = store.list_approved(event.id).unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![c, a]);
        assert_eq!(store.count_by_status(event.id, SelfieStatus::Rejected).unwrap(), 1);
        assert_eq!(store.list_by_event(event.id, None).unwrap().len(), 3);
    }

    #[test]
    fn test_writes_bump_revision() {
        let (store, event) = store_with_event(true);
        let id = store.create_selfie(&event, &selfie("a.jpg")).unwrap();
        assert_eq!(store.selfie(id).unwrap().revision, 0);

        store.update_status(id, SelfieStatus::Approved).unwrap();
        store.set_caption(id, Some("Ana"), Some("hi!")).unwrap();
        let stored = store.selfie(id).unwrap();
        assert_eq!(stored.revision, 2);
        assert_eq!(stored.record.display_name.as_deref(), Some("Ana"));
    }

    #[test]
    fn test_duplicate_image_is_rejected() {
        let (store, event) = store_with_event(false);
        store.create_selfie(&event, &selfie("a.jpg")).unwrap();
        let again = store.create_selfie(&event, &selfie("a.jpg"));
        assert!(matches!(again, Err(Error::DuplicateImage(_))));

        // Unresolved uploads never collide with each other
        store.create_selfie(&event, &NewSelfie::default()).unwrap();
        store.create_selfie(&event, &NewSelfie::default()).unwrap();
    }

    #[test]
    fn test_unknown_selfie_errors() {
        let (store, _) = store_with_event(true);
        let ghost = SelfieId(404);
        assert!(matches!(store.update_status(ghost, SelfieStatus::Approved), Err(Error::SelfieNotFound(_))));
        assert!(matches!(store.remove(ghost), Err(Error::SelfieNotFound(_))));
        assert!(matches!(store.selfie(ghost), Err(Error::SelfieNotFound(_))));
    }

    #[test]
    fn test_display_config_update_is_validated() {
        let (store, event) = store_with_event(true);
        let mut config = DisplayConfig::default();
        config.grid_columns = 4;
        store.update_display_config(event.id, &config).unwrap();
        assert_eq!(store.display_config(event.id).unwrap().grid_columns, 4);

        config.swap_interval = 0;
        assert!(matches!(
            store.update_display_config(event.id, &config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("wall.db");
        let store = SelfieStore::open(&path).unwrap();
        assert_eq!(store.path(), path.as_path());
        assert!(path.exists());
    }
}
