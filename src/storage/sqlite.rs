//! SQLite storage implementation

use super::schema;
use crate::value::{Scalar, Value, ValueType};
use crate::{Error, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Path that selects a transient in-memory database.
pub const MEMORY_PATH: &str = ":memory:";

/// Stored in the metadata table to recognise datastore files. Shared with
/// every earlier writer of the format.
pub const DATASTORE_MAGIC: &str = "9e1f63f7-a6b1-4d50-88e8-269ccca04d89";

/// File format version. History:
///
/// 1 - initial version
pub const FORMAT_VERSION: i64 = 1;

pub const META_MAGIC: &str = "SQLiteDatastoreMagic";
pub const META_VERSION: &str = "SQLiteDatastoreVersion";
pub const META_APP_NAME: &str = "SQLiteDatastoreAppName";
pub const META_APP_VERSION: &str = "SQLiteDatastoreAppVersion";

/// Connection tuning applied at open. None of these affect correctness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenOptions {
    /// How long a statement waits on a locked database before failing.
    pub busy_timeout_ms: u64,
    /// Run `PRAGMA optimize` after the schema is in place.
    pub optimize: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5000,
            optimize: true,
        }
    }
}

/// SQLite-backed storage for typed key-value rows
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open a database file (creates if doesn't exist). [`MEMORY_PATH`] opens
    /// an in-memory database.
    pub fn open(path: &Path, options: &OpenOptions) -> Result<Self> {
        let conn = if path == Path::new(MEMORY_PATH) {
            Connection::open_in_memory()
        } else {
            Connection::open(path)
        }
        .map_err(|e| open_failed(path, e))?;

        let store = Self { conn };
        store
            .initialize_schema(options)
            .map_err(|e| match e {
                Error::OpenFailed { .. } => e,
                other => open_failed(path, other),
            })?;
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::open(Path::new(MEMORY_PATH), &OpenOptions::default())
    }

    /// Verify file identity, then create the schema and stamp the metadata.
    fn initialize_schema(&self, options: &OpenOptions) -> Result<()> {
        self.conn
            .busy_timeout(Duration::from_millis(options.busy_timeout_ms))?;

        let tables = self.list_tables()?;
        if tables.is_empty() {
            // Only takes effect before the first table exists.
            self.conn.pragma_update(None, "auto_vacuum", "FULL")?;
        } else {
            self.check_magic(&tables)?;
        }

        for stmt in schema::all_schema_statements() {
            self.conn.execute(stmt, [])?;
        }

        self.metadata_set(META_VERSION, &FORMAT_VERSION.to_string())?;
        self.metadata_set(META_MAGIC, DATASTORE_MAGIC)?;

        if options.optimize {
            self.conn.execute_batch("PRAGMA optimize;")?;
        }
        Ok(())
    }

    fn check_magic(&self, tables: &[String]) -> Result<()> {
        if !tables.iter().any(|t| t == schema::METADATA_TABLE) {
            return Err(Error::Metadata(format!(
                "non-empty database has no {} table",
                schema::METADATA_TABLE
            )));
        }
        match self.metadata_get(META_MAGIC)? {
            Some(magic) if magic == DATASTORE_MAGIC => Ok(()),
            Some(magic) => Err(Error::Metadata(format!(
                "magic '{}' did not match expected '{}'",
                magic, DATASTORE_MAGIC
            ))),
            None => Err(Error::Metadata(
                "missing magic from metadata table".to_string(),
            )),
        }
    }

    // ========== Value Operations ==========

    /// Get the value of `key` from the table of `T`
    pub fn get<T: Scalar>(&self, key: &str) -> Result<Option<T>> {
        self.conn
            .query_row(&schema::select_value_sql(T::TYPE), [key], |row| {
                T::read_column(row, 0)
            })
            .optional()
            .map_err(Into::into)
    }

    /// Upsert `value` under `key` and drop the key from every other type
    /// table, atomically.
    pub fn upsert(&mut self, key: &str, value: &Value) -> Result<()> {
        let target = value.value_type();
        let tx = self.conn.transaction()?;
        for ty in ValueType::all().iter().filter(|ty| **ty != target) {
            tx.execute(&schema::delete_value_sql(*ty), [key])?;
        }
        tx.execute(&schema::upsert_value_sql(target), params![key, value])?;
        tx.commit()?;
        Ok(())
    }

    /// Delete `key` from the table of `ty`, returning the number of rows removed
    pub fn delete(&self, key: &str, ty: ValueType) -> Result<usize> {
        let removed = self.conn.execute(&schema::delete_value_sql(ty), [key])?;
        Ok(removed)
    }

    /// List every table in the database
    pub fn list_tables(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;

        let tables = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;

        Ok(tables)
    }

    /// Walk every `kvp_` table and list its keys.
    ///
    /// Tables carrying the prefix without naming a known type are skipped.
    pub fn keys_and_types(&self) -> Result<Vec<(String, ValueType)>> {
        let mut entries = Vec::new();
        for table in self.list_tables()? {
            if !table.starts_with(crate::value::TABLE_PREFIX) {
                continue;
            }
            let Some(ty) = ValueType::from_table_name(&table) else {
                tracing::warn!("Skipping foreign table {} in kvp_ namespace", table);
                continue;
            };

            let mut stmt = self.conn.prepare(&format!("SELECT key FROM {}", table))?;
            let keys = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            entries.extend(keys.into_iter().map(|key| (key, ty)));
        }
        Ok(entries)
    }

    /// Count rows of one type
    pub fn count(&self, ty: ValueType) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", ty.table_name()),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        Ok(DbStats {
            strings: self.count(ValueType::String)?,
            bools: self.count(ValueType::Bool)?,
            floats: self.count(ValueType::Float)?,
            ints: self.count(ValueType::Int)?,
        })
    }

    // ========== Metadata Operations ==========

    /// Read a metadata entry
    pub fn metadata_get(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(&schema::select_metadata_sql(), [key], |row| row.get(0))
            .optional()
            .map_err(Into::into)
    }

    /// Insert or overwrite a metadata entry
    pub fn metadata_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(&schema::upsert_metadata_sql(), params![key, value])?;
        Ok(())
    }

    /// Close the connection, surfacing any error the engine reports
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| Error::Engine(e))
    }
}

fn open_failed(path: &Path, reason: impl std::fmt::Display) -> Error {
    Error::OpenFailed {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

/// Row counts per value table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DbStats {
    pub strings: usize,
    pub bools: usize,
    pub floats: usize,
    pub ints: usize,
}

impl DbStats {
    pub fn total(&self) -> usize {
        self.strings + self.bools + self.floats + self.ints
    }
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Datastore Statistics:")?;
        writeln!(f, "  Strings: {}", self.strings)?;
        writeln!(f, "  Bools: {}", self.bools)?;
        writeln!(f, "  Floats: {}", self.floats)?;
        writeln!(f, "  Ints: {}", self.ints)
    }
}
