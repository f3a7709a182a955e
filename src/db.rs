mod schema;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::Connection;

use schema::INITIAL_SCHEMA;

/// Database wrapper providing connection management and schema initialization.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens an in-memory SQLite database.
    ///
    /// Automatically initializes the schema on connection open.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize_schema()?;
        Ok(db)
    }

    /// Opens a file-based SQLite database at the given path.
    ///
    /// Creates the database file if it does not exist.
    /// Automatically initializes the schema on connection open.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize_schema()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// Uses IF NOT EXISTS for idempotent execution. A busy timeout lets two
    /// processes saving at once queue on the write lock instead of failing.
    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute("PRAGMA foreign_keys = ON", [])?;
        self.conn.busy_timeout(std::time::Duration::from_secs(5))?;
        self.conn.execute_batch(INITIAL_SCHEMA)?;
        Ok(())
    }

    /// Returns a reference to the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Gets the cross-platform database path.
///
/// `TAGMARK_DB` wins when set; otherwise `{data_dir}/tagmark/tagmark.db`
/// where `data_dir` is:
/// - Linux: `~/.local/share`
/// - macOS: `~/Library/Application Support`
/// - Windows: `C:\Users\<user>\AppData\Roaming`
///
/// # Errors
///
/// Returns an error if the data directory cannot be determined.
pub fn default_database_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("TAGMARK_DB")
        && !path.is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    let data_dir =
        dirs::data_dir().ok_or_else(|| anyhow::anyhow!("Failed to determine data directory"))?;

    Ok(data_dir.join("tagmark").join("tagmark.db"))
}

/// Ensures the parent directory of the database file exists.
///
/// # Errors
///
/// Returns an error if directory creation fails.
pub fn ensure_database_directory(db_path: &Path) -> Result<()> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create database directory: {}", parent.display())
        })?;
    }
    Ok(())
}
