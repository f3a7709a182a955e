use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use time::OffsetDateTime;

use crate::config::Settings;
use crate::ledger::TagLedger;
use crate::models::{Item, ItemId, ItemStatus, SyncRecord, SyncService, SyncStatus, TagInfo};
use crate::Database;

const SETTINGS_KEY: &str = "settings";

/// Persistence layer for settings, secrets, items, the tag ledger and sync
/// records.
///
/// Store owns a Database instance and is UI-independent: the CLI, tests and
/// any other front end go through the same methods.
///
/// # Examples
///
/// ```
/// use tagmark::{Database, Store};
///
/// # fn main() -> anyhow::Result<()> {
/// let store = Store::new(Database::in_memory()?);
/// let settings = store.settings()?;
/// assert_eq!(settings.tagging.dedupe_threshold, 82);
/// # Ok(())
/// # }
/// ```
pub struct Store {
    db: Database,
}

impl Store {
    /// Creates a new Store with the given database.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Returns a reference to the underlying database.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Runs `f` inside an immediate (write-locked) transaction.
    ///
    /// Commits on `Ok`, rolls back on `Err`.
    fn in_transaction<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.db.connection();
        conn.execute_batch("BEGIN IMMEDIATE")?;

        match f(conn) {
            Ok(value) => {
                conn.execute_batch("COMMIT")?;
                Ok(value)
            }
            Err(e) => {
                conn.execute_batch("ROLLBACK").ok();
                Err(e)
            }
        }
    }

    // ---- settings & secrets ----

    /// Loads settings, merging whatever is stored over the defaults.
    pub fn settings(&self) -> Result<Settings> {
        let stored: Option<String> = self
            .db
            .connection()
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                [SETTINGS_KEY],
                |row| row.get(0),
            )
            .optional()?;

        match stored {
            Some(json) => serde_json::from_str(&json).context("Stored settings are not valid JSON"),
            None => Ok(Settings::default()),
        }
    }

    /// Validates and saves settings.
    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        settings.validate()?;
        let json = serde_json::to_string(settings)?;
        self.db.connection().execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            (SETTINGS_KEY, json),
        )?;
        Ok(())
    }

    /// Looks up a secret by name. An empty name has no secret.
    pub fn secret(&self, key: &str) -> Result<Option<String>> {
        if key.is_empty() {
            return Ok(None);
        }
        let value = self
            .db
            .connection()
            .query_row("SELECT value FROM secrets WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Resolves an optional `*Ref` setting to its secret value.
    pub fn secret_ref(&self, key: Option<&str>) -> Result<Option<String>> {
        match key {
            Some(key) => self.secret(key),
            None => Ok(None),
        }
    }

    /// Stores a secret; an empty value removes it.
    pub fn set_secret(&self, key: &str, value: &str) -> Result<()> {
        if key.is_empty() {
            anyhow::bail!("Secret name cannot be empty");
        }
        let conn = self.db.connection();
        if value.is_empty() {
            conn.execute("DELETE FROM secrets WHERE key = ?1", [key])?;
        } else {
            conn.execute(
                "INSERT INTO secrets (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                (key, value),
            )?;
        }
        Ok(())
    }

    // ---- items ----

    /// Inserts or replaces an item.
    pub fn upsert_item(&self, item: &Item) -> Result<()> {
        write_item(self.db.connection(), item)
    }

    /// Retrieves an item by its ID.
    ///
    /// Returns `None` if no item exists with the given ID.
    pub fn get_item(&self, id: ItemId) -> Result<Option<Item>> {
        let row = self
            .db
            .connection()
            .query_row(
                "SELECT id, url, domain, title, excerpt, created_at, tags, status, last_error
                 FROM items WHERE id = ?1",
                [id.to_string()],
                ItemRow::from_row,
            )
            .optional()?;

        row.map(ItemRow::into_item).transpose()
    }

    /// Lists the most recent items, newest first.
    pub fn list_items(&self, limit: usize) -> Result<Vec<Item>> {
        let conn = self.db.connection();
        let mut stmt = conn.prepare(
            "SELECT id, url, domain, title, excerpt, created_at, tags, status, last_error
             FROM items ORDER BY created_at DESC, rowid DESC LIMIT ?1",
        )?;

        let rows = stmt.query_map([i64::try_from(limit).unwrap_or(i64::MAX)], ItemRow::from_row)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?.into_item()?);
        }
        Ok(items)
    }

    // ---- tag ledger ----

    /// Loads the whole tag ledger.
    pub fn load_ledger(&self) -> Result<TagLedger> {
        read_ledger(self.db.connection(), None)
    }

    /// Writes every ledger entry, replacing stored counts.
    pub fn save_ledger(&self, ledger: &TagLedger) -> Result<()> {
        self.in_transaction(|conn| {
            for info in ledger.iter() {
                write_tag(conn, info)?;
            }
            Ok(())
        })
    }

    /// Adds external usage counts onto the ledger in one transaction.
    ///
    /// Returns how many tag names were merged.
    pub fn import_tag_counts(&self, counts: Vec<(String, u64)>) -> Result<usize> {
        self.in_transaction(|conn| {
            let mut ledger = read_ledger(conn, None)?;
            let imported = ledger.import_counts(counts);
            for info in ledger.iter() {
                write_tag(conn, info)?;
            }
            Ok(imported)
        })
    }

    /// Persists a freshly tagged item together with its ledger increments.
    ///
    /// The affected ledger rows are re-read under the write lock, so counts
    /// from concurrent saves are never lost, and the item only exists if its
    /// increments were applied.
    pub fn commit_tagging(&self, item: &Item) -> Result<()> {
        self.in_transaction(|conn| {
            let mut ledger = read_ledger(conn, Some(item.tags.as_slice()))?;
            for slug in ledger.record(&item.tags) {
                if let Some(info) = ledger.get(&slug) {
                    write_tag(conn, info)?;
                }
            }
            write_item(conn, item)
        })
        .with_context(|| format!("Failed to save item {}", item.id))
    }

    // ---- sync records ----

    pub fn sync_record(&self, item_id: ItemId, service: SyncService) -> Result<Option<SyncRecord>> {
        let row = self
            .db
            .connection()
            .query_row(
                "SELECT last_hash, status, last_error, updated_at
                 FROM sync_records WHERE item_id = ?1 AND service = ?2",
                (item_id.to_string(), service.to_string()),
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((last_hash, status, last_error, updated_at)) = row else {
            return Ok(None);
        };

        Ok(Some(SyncRecord {
            item_id,
            service,
            last_hash,
            status: status.parse::<SyncStatus>().map_err(anyhow::Error::msg)?,
            last_error,
            updated_at: OffsetDateTime::from_unix_timestamp(updated_at)?,
        }))
    }

    pub fn set_sync_record(&self, record: &SyncRecord) -> Result<()> {
        self.db.connection().execute(
            "INSERT INTO sync_records (item_id, service, last_hash, status, last_error, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(item_id, service) DO UPDATE SET
                 last_hash = excluded.last_hash,
                 status = excluded.status,
                 last_error = excluded.last_error,
                 updated_at = excluded.updated_at",
            rusqlite::params![
                record.item_id.to_string(),
                record.service.to_string(),
                record.last_hash,
                record.status.to_string(),
                record.last_error,
                record.updated_at.unix_timestamp(),
            ],
        )?;
        Ok(())
    }
}

/// Raw column values of an `items` row.
struct ItemRow {
    id: String,
    url: String,
    domain: String,
    title: String,
    excerpt: Option<String>,
    created_at: i64,
    tags: String,
    status: String,
    last_error: Option<String>,
}

impl ItemRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            url: row.get(1)?,
            domain: row.get(2)?,
            title: row.get(3)?,
            excerpt: row.get(4)?,
            created_at: row.get(5)?,
            tags: row.get(6)?,
            status: row.get(7)?,
            last_error: row.get(8)?,
        })
    }

    fn into_item(self) -> Result<Item> {
        Ok(Item {
            id: self.id.parse().context("Invalid item id")?,
            url: self.url,
            domain: self.domain,
            title: self.title,
            excerpt: self.excerpt,
            created_at: OffsetDateTime::from_unix_timestamp(self.created_at)?,
            tags: serde_json::from_str(&self.tags).context("Invalid item tags")?,
            status: self
                .status
                .parse::<ItemStatus>()
                .map_err(anyhow::Error::msg)?,
            last_error: self.last_error,
        })
    }
}

fn write_item(conn: &Connection, item: &Item) -> Result<()> {
    conn.execute(
        "INSERT INTO items (id, url, domain, title, excerpt, created_at, tags, status, last_error)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(id) DO UPDATE SET
             url = excluded.url,
             domain = excluded.domain,
             title = excluded.title,
             excerpt = excluded.excerpt,
             created_at = excluded.created_at,
             tags = excluded.tags,
             status = excluded.status,
             last_error = excluded.last_error",
        rusqlite::params![
            item.id.to_string(),
            item.url,
            item.domain,
            item.title,
            item.excerpt,
            item.created_at.unix_timestamp(),
            serde_json::to_string(&item.tags)?,
            item.status.to_string(),
            item.last_error,
        ],
    )?;
    Ok(())
}

/// Reads ledger rows; `only` restricts the read to the given slugs.
fn read_ledger(conn: &Connection, only: Option<&[String]>) -> Result<TagLedger> {
    let mut stmt = conn.prepare("SELECT slug, display, count, aliases FROM tags")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, Option<String>>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut ledger = TagLedger::new();
    for row in rows {
        let (slug, display, count, aliases) = row?;
        if let Some(only) = only
            && !only.contains(&slug)
        {
            continue;
        }

        let mut info = TagInfo::with_count(slug, u64::try_from(count).unwrap_or(0));
        if let Some(display) = display {
            info.set_display(display);
        }
        info.set_aliases(serde_json::from_str(&aliases).context("Invalid tag aliases")?);
        ledger.insert(info);
    }
    Ok(ledger)
}

fn write_tag(conn: &Connection, info: &TagInfo) -> Result<()> {
    conn.execute(
        "INSERT INTO tags (slug, display, count, aliases) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(slug) DO UPDATE SET
             display = excluded.display,
             count = excluded.count,
             aliases = excluded.aliases",
        rusqlite::params![
            info.slug(),
            info.display(),
            i64::try_from(info.count()).unwrap_or(i64::MAX),
            serde_json::to_string(info.aliases())?,
        ],
    )?;
    Ok(())
}
